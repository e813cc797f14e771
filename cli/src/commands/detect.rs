use anyhow::{Context, Result};
use clap::Args;
use odboot_core::board::{BOARD_GROUPS, groups_for_device};
use odboot_core::device::{known_device_ids, soc_label};
use odboot_transport_rusb::{AttachedDevice, scan};

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Also list the boards each detected SoC may be.
    #[arg(long)]
    pub boards: bool,
}

pub fn run_detect(args: DetectArgs) -> Result<()> {
    let devices = scan(&known_device_ids()).context("enumerating USB devices")?;
    if devices.is_empty() {
        println!("No Ingenic devices in USB boot mode detected.");
        return Ok(());
    }
    for device in &devices {
        println!("{}", describe(device));
        if args.boards {
            for group in groups_for_device(device.id) {
                for board in group.boards {
                    println!("    {:<14} {}", board.name, board.description);
                }
            }
        }
    }
    Ok(())
}

pub fn run_list_boards() {
    for group in BOARD_GROUPS {
        println!("{} ({}, {})", group.codename, soc_label(group.device), group.device);
        for board in group.boards {
            println!("    {:<14} {}", board.name, board.description);
        }
    }
}

fn describe(device: &AttachedDevice) -> String {
    format!(
        "{} bus={} addr={} soc={}",
        device.id,
        device.bus,
        device.address,
        soc_label(device.id)
    )
}
