//! Open/write/close file sub-protocol, host role.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::protocol::{FILE_COMMAND_TIMEOUT, FileCommand, length_prefix};
use crate::transport::Transport;
use crate::upload::ChunkedUploader;

/// Destination files the daemon knows, indexed by slot id.
pub const SLOT_FILES: &[&str] = &[
    "rootfs.squashfs",
    "uzImage.bin",
    "devicetree.dtb",
    "ubiboot.bin",
    "mininit-syspart",
];

pub fn slot_file_name(slot: u16) -> Option<&'static str> {
    SLOT_FILES.get(usize::from(slot)).copied()
}

/// A named file to be written into a daemon slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotJob {
    pub slot: u16,
    pub source: PathBuf,
}

impl SlotJob {
    pub fn new(slot: u16, source: impl Into<PathBuf>) -> Self {
        Self {
            slot,
            source: source.into(),
        }
    }

    /// One job per path, in slot order. Slot ids are `u16` on the wire, so
    /// paths past slot `u16::MAX` are dropped.
    pub fn sequence<I, P>(paths: I) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        (0..=u16::MAX)
            .zip(paths)
            .map(|(slot, path)| Self::new(slot, path))
            .collect()
    }
}

pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| Error::from_read(path, err))
}

/// Sends `data` into `slot`: open, length prefix, body, close.
pub fn upload_file<T: Transport + ?Sized>(
    transport: &mut T,
    uploader: &ChunkedUploader,
    slot: u16,
    data: &[u8],
) -> Result<usize> {
    let len = u32::try_from(data.len())
        .map_err(|_| Error::protocol(format!("file too large: {} bytes", data.len())))?;

    let open = FileCommand::OpenFile(slot).request();
    transport.control_out(open, open.timeout())?;

    let prefix = length_prefix(len);
    let written = transport.bulk_write(&prefix, FILE_COMMAND_TIMEOUT)?;
    if written != prefix.len() {
        return Err(Error::protocol(format!(
            "short length prefix write: {written} of {} bytes",
            prefix.len()
        )));
    }

    let sent = uploader.upload(transport, data)?;

    let close = FileCommand::CloseFile.request();
    transport.control_out(close, close.timeout())?;
    info!(slot, bytes = sent, "uploaded file");
    Ok(sent)
}

/// Reads the job's source and uploads it. A missing source surfaces as
/// [`Error::NotFound`] before anything is sent.
pub fn upload_slot<T: Transport + ?Sized>(
    transport: &mut T,
    uploader: &ChunkedUploader,
    job: &SlotJob,
) -> Result<usize> {
    let data = read_source(&job.source)?;
    upload_file(transport, uploader, job.slot, &data)
}
