use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    BootArgs, DetectArgs, UploadArgs, run_boot, run_detect, run_list_boards, run_upload,
};

#[derive(Parser)]
#[command(author, version, about = "Boot and flash Ingenic handhelds over USB")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a device from its USB boot ROM and install files from an extracted package.
    Boot(BootArgs),
    /// Upload files to a device already running odbootd.
    Upload(UploadArgs),
    /// List attached Ingenic devices.
    Detect(DetectArgs),
    /// List supported boards.
    ListBoards,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_default_tracing();
    match cli.command {
        Commands::Boot(args) => run_boot(args),
        Commands::Upload(args) => run_upload(args),
        Commands::Detect(args) => run_detect(args),
        Commands::ListBoards => {
            run_list_boards();
            Ok(())
        }
    }
}

pub(crate) fn setup_default_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
