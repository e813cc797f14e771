//! Where the sequencer gets its stage payloads and slot files from.
//!
//! Archive extraction and board prompting live outside this crate; the
//! sequencer only sees a [`PayloadProvider`] consulted once the device
//! identity is known.

use std::path::PathBuf;

use tracing::debug;

use crate::board::{Board, boards_for_device, find_board};
use crate::device::{DeviceId, soc_label};
use crate::error::{Error, Result};
use crate::files::{SlotJob, read_source};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootImages {
    pub stage1: Vec<u8>,
    pub kernel: Vec<u8>,
    pub devicetree: Vec<u8>,
}

pub trait PayloadProvider {
    /// Stage payloads for `device`, or `None` when the device is expected to
    /// already be running the upload daemon.
    fn boot_images(&mut self, device: DeviceId) -> Result<Option<BootImages>>;

    fn slot_jobs(&mut self, device: DeviceId) -> Result<Vec<SlotJob>>;
}

/// Post-boot uploads only, the device is already running `odbootd`.
#[derive(Clone, Debug, Default)]
pub struct UploadOnly {
    pub jobs: Vec<SlotJob>,
}

impl UploadOnly {
    pub fn new(jobs: Vec<SlotJob>) -> Self {
        Self { jobs }
    }
}

impl PayloadProvider for UploadOnly {
    fn boot_images(&mut self, _device: DeviceId) -> Result<Option<BootImages>> {
        Ok(None)
    }

    fn slot_jobs(&mut self, _device: DeviceId) -> Result<Vec<SlotJob>> {
        Ok(self.jobs.clone())
    }
}

/// An extracted firmware package laid out as plain files.
#[derive(Clone, Debug)]
pub struct PackageDir {
    root: PathBuf,
    board: Option<String>,
    kernel: Option<PathBuf>,
}

impl PackageDir {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotFound(root));
        }
        Ok(Self {
            root,
            board: None,
            kernel: None,
        })
    }

    pub fn with_board(mut self, board: Option<String>) -> Self {
        self.board = board;
        self
    }

    /// Use a kernel image from outside the package.
    pub fn with_kernel(mut self, kernel: Option<PathBuf>) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn select_board(&self, device: DeviceId) -> Result<&'static Board> {
        if let Some(name) = self.board.as_deref() {
            let (group, board) =
                find_board(name).ok_or_else(|| Error::Payload(format!("unknown board {name}")))?;
            if group.device != device {
                return Err(Error::Payload(format!(
                    "board {} needs a {} device, found {} ({device})",
                    board.name,
                    soc_label(group.device),
                    soc_label(device)
                )));
            }
            return Ok(board);
        }
        match boards_for_device(device).as_slice() {
            [board] => Ok(*board),
            [] => Err(Error::Payload(format!(
                "no known boards for {} ({device})",
                soc_label(device)
            ))),
            boards => {
                let names: Vec<_> = boards.iter().map(|board| board.name).collect();
                Err(Error::Payload(format!(
                    "several boards use {}; pick one of {}",
                    soc_label(device),
                    names.join(", ")
                )))
            }
        }
    }

    pub fn stage1_path(&self, board: &Board) -> PathBuf {
        self.root.join(format!("ubiboot-{}.bin", board.bootloader))
    }

    pub fn kernel_path(&self) -> PathBuf {
        self.kernel
            .clone()
            .unwrap_or_else(|| self.root.join("uzImage.bin"))
    }

    pub fn devicetree_path(&self, board: &Board) -> PathBuf {
        self.root.join(format!("{}.dtb", board.devicetree))
    }
}

impl PayloadProvider for PackageDir {
    fn boot_images(&mut self, device: DeviceId) -> Result<Option<BootImages>> {
        let board = self.select_board(device)?;
        debug!(board = board.name, "resolved board");
        Ok(Some(BootImages {
            stage1: read_source(&self.stage1_path(board))?,
            kernel: read_source(&self.kernel_path())?,
            devicetree: read_source(&self.devicetree_path(board))?,
        }))
    }

    fn slot_jobs(&mut self, device: DeviceId) -> Result<Vec<SlotJob>> {
        let board = self.select_board(device)?;
        Ok(SlotJob::sequence([
            self.root.join("rootfs.squashfs"),
            self.kernel_path(),
            self.devicetree_path(board),
            self.stage1_path(board),
            self.root.join("mininit-syspart"),
        ]))
    }
}
