use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use odboot_core::files::slot_file_name;
use odboot_core::{BootReport, BootSequencer, PackageDir};
use odboot_transport_rusb::RusbDiscovery;
use tracing::info;

use super::SequencerArgs;

#[derive(Args, Debug)]
pub struct BootArgs {
    /// Directory holding an extracted package (ubiboot-*.bin, uzImage.bin, *.dtb, ...).
    #[arg(value_name = "PACKAGE_DIR")]
    pub package: PathBuf,
    /// Board to boot; required when the attached SoC drives more than one board.
    #[arg(long)]
    pub board: Option<String>,
    /// Kernel image to boot instead of the package's uzImage.bin.
    #[arg(long, value_name = "PATH")]
    pub kernel: Option<PathBuf>,
    #[command(flatten)]
    pub sequencer: SequencerArgs,
}

pub fn run_boot(args: BootArgs) -> Result<()> {
    let mut package = PackageDir::open(&args.package)
        .with_context(|| format!("opening package {}", args.package.display()))?
        .with_board(args.board)
        .with_kernel(args.kernel);

    eprintln!("Waiting for an Ingenic device in USB boot mode...");
    let mut sequencer = BootSequencer::new(RusbDiscovery::new(), args.sequencer.config());
    let report = sequencer.run(&mut package).context("booting device")?;
    print_report(&report);
    Ok(())
}

pub(super) fn print_report(report: &BootReport) {
    info!(device = %report.device, "sequence complete");
    if let Some(addr) = report.devicetree_addr {
        println!("Booted {} (device tree at {addr:#010x})", report.device);
    }
    for (slot, len) in &report.uploaded {
        println!("  {:<16} {len} bytes", slot_file_name(*slot).unwrap_or("?"));
    }
    for slot in &report.skipped {
        println!("  {:<16} skipped (no source)", slot_file_name(*slot).unwrap_or("?"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        boot: BootArgs,
    }

    #[test]
    fn board_and_kernel_are_optional() {
        let harness = Harness::try_parse_from(["odboot", "/tmp/package"]).unwrap();
        assert_eq!(harness.boot.package, PathBuf::from("/tmp/package"));
        assert!(harness.boot.board.is_none());
        assert!(harness.boot.kernel.is_none());
    }

    #[test]
    fn accepts_board_override() {
        let harness =
            Harness::try_parse_from(["odboot", "pkg", "--board", "rg350m", "--kernel", "zImage"])
                .unwrap();
        assert_eq!(harness.boot.board.as_deref(), Some("rg350m"));
        assert_eq!(harness.boot.kernel, Some(PathBuf::from("zImage")));
    }
}
