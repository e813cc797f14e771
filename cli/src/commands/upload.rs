use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use odboot_core::files::SLOT_FILES;
use odboot_core::{BootSequencer, SlotJob, UploadOnly};
use odboot_transport_rusb::RusbDiscovery;

use super::SequencerArgs;
use super::boot::print_report;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Files to send, in slot order (rootfs.squashfs, uzImage.bin, devicetree.dtb, ...).
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub sequencer: SequencerArgs,
}

pub fn run_upload(args: UploadArgs) -> Result<()> {
    let jobs = jobs_for(args.files)?;
    let mut payloads = UploadOnly::new(jobs);
    let mut sequencer = BootSequencer::new(RusbDiscovery::new(), args.sequencer.config());
    let report = sequencer.run(&mut payloads).context("uploading files")?;
    print_report(&report);
    Ok(())
}

fn jobs_for(files: Vec<PathBuf>) -> Result<Vec<SlotJob>> {
    if files.len() > SLOT_FILES.len() {
        bail!(
            "{} files given but the daemon only has {} slots",
            files.len(),
            SLOT_FILES.len()
        );
    }
    Ok(SlotJob::sequence(files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_map_to_consecutive_slots() {
        let jobs = jobs_for(vec!["a.squashfs".into(), "b.bin".into()]).unwrap();
        assert_eq!(jobs[0], SlotJob::new(0, "a.squashfs"));
        assert_eq!(jobs[1], SlotJob::new(1, "b.bin"));
    }

    #[test]
    fn too_many_files_is_rejected() {
        let files = (0..=SLOT_FILES.len())
            .map(|i| PathBuf::from(format!("f{i}")))
            .collect();
        assert!(jobs_for(files).is_err());
    }
}
