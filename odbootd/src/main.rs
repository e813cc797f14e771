use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use odboot_gadget::descriptors::{descriptors, strings};
use odboot_gadget::{GadgetSession, LoopExit, ShutdownSignal, SlotTable, forward_signals, run};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "odbootd", version)]
#[command(about = "FunctionFS daemon receiving files from odboot", long_about = None)]
struct Args {
    /// FunctionFS mount point holding ep0/ep1.
    #[arg(value_name = "FFS_MOUNT")]
    ffs_dir: PathBuf,
    /// configfs UDC attribute of the gadget, e.g. /sys/kernel/config/usb_gadget/g1/UDC.
    #[arg(value_name = "UDC_FILE")]
    udc_file: PathBuf,
    /// Name of the USB device controller to bind to.
    #[arg(value_name = "UDC_NAME")]
    udc_name: String,
    /// Directory receiving uploaded slot files.
    #[arg(long, value_name = "DIR", default_value = odboot_gadget::session::DEFAULT_BOOT_DIR)]
    boot_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let shutdown = Arc::new(ShutdownSignal::new().context("create shutdown eventfd")?);
    // Before any other thread exists, so the reader inherits the blocked mask.
    forward_signals(Arc::clone(&shutdown)).context("install signal forwarding")?;

    let ep0_path = args.ffs_dir.join("ep0");
    let mut ep0 = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&ep0_path)
        .with_context(|| format!("open {}", ep0_path.display()))?;
    write_descriptors(&mut ep0).context("write FunctionFS descriptors")?;

    let ep1_path = args.ffs_dir.join("ep1");
    let ep1 = File::open(&ep1_path).with_context(|| format!("open {}", ep1_path.display()))?;

    bind_udc(&args.udc_file, &args.udc_name)?;
    info!(
        udc = %args.udc_name,
        boot_dir = %args.boot_dir.display(),
        "gadget bound, waiting for host"
    );

    let mut session = GadgetSession::new(ep1, SlotTable::new(&args.boot_dir));
    let exit = run(&mut ep0, &mut session, &shutdown).context("event loop")?;
    match exit {
        LoopExit::Shutdown => info!("shutting down"),
        LoopExit::EndpointClosed => warn!("ep0 closed, shutting down"),
    }
    if session.is_busy() {
        warn!("exiting with a transfer still in flight");
    }
    Ok(())
}

fn write_descriptors(ep0: &mut File) -> Result<()> {
    ep0.write_all(&descriptors()).context("descriptors")?;
    ep0.write_all(&strings()).context("strings")?;
    Ok(())
}

fn bind_udc(udc_file: &Path, udc_name: &str) -> Result<()> {
    let mut udc = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(udc_file)
        .with_context(|| format!("open UDC file {}", udc_file.display()))?;
    udc.write_all(udc_name.as_bytes())
        .with_context(|| format!("bind UDC {udc_name}"))?;
    Ok(())
}
