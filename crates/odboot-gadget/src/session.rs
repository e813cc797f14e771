//! Device role of the file sub-protocol: one destination file at a time,
//! filled by a reader thread draining the bulk endpoint.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use odboot_core::files::slot_file_name;
use tracing::{debug, info};

use crate::error::GadgetError;

pub const READ_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_BOOT_DIR: &str = "/boot";

/// Hands out a reader on the bulk OUT endpoint for each opened file.
pub trait BulkEndpoint {
    type Reader: Read + Send + 'static;

    fn reader(&self) -> io::Result<Self::Reader>;
}

impl BulkEndpoint for File {
    type Reader = File;

    fn reader(&self) -> io::Result<File> {
        self.try_clone()
    }
}

/// Maps slot ids onto files below a fixed directory.
#[derive(Clone, Debug)]
pub struct SlotTable {
    root: PathBuf,
}

impl SlotTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, slot: u16) -> Option<PathBuf> {
        slot_file_name(slot).map(|name| self.root.join(name))
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new(DEFAULT_BOOT_DIR)
    }
}

/// Result of a completed open/close pair.
#[derive(Debug)]
pub struct Closed {
    pub slot: u16,
    pub path: PathBuf,
    pub received: io::Result<u64>,
}

struct ActiveFile {
    slot: u16,
    path: PathBuf,
    reader: JoinHandle<(File, io::Result<u64>)>,
}

pub struct GadgetSession<B: BulkEndpoint> {
    bulk: B,
    slots: SlotTable,
    active: Option<ActiveFile>,
}

impl<B: BulkEndpoint> GadgetSession<B> {
    pub fn new(bulk: B, slots: SlotTable) -> Self {
        Self {
            bulk,
            slots,
            active: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Truncates the slot's destination and starts draining the endpoint
    /// into it. Refused while a previous file is still open.
    pub fn open_file(&mut self, slot: u16) -> Result<(), GadgetError> {
        if let Some(active) = &self.active {
            return Err(GadgetError::protocol(format!(
                "open of slot {slot} while slot {} is still open",
                active.slot
            )));
        }
        let path = self
            .slots
            .path(slot)
            .ok_or_else(|| GadgetError::protocol(format!("unknown slot {slot}")))?;
        info!(slot, path = %path.display(), "opening file");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| GadgetError::Open {
                path: path.clone(),
                source,
            })?;
        let reader = self.bulk.reader().map_err(GadgetError::Endpoint)?;
        let handle = thread::Builder::new()
            .name("odbootd-reader".to_string())
            .spawn(move || {
                let received = receive(reader, &mut file);
                (file, received)
            })
            .map_err(GadgetError::ThreadSpawn)?;

        self.active = Some(ActiveFile {
            slot,
            path,
            reader: handle,
        });
        Ok(())
    }

    /// Waits for the reader to finish, then syncs and closes the destination.
    pub fn close_file(&mut self) -> Result<Closed, GadgetError> {
        let Some(active) = self.active.take() else {
            return Err(GadgetError::protocol("close without an open file"));
        };
        let (file, mut received) = active
            .reader
            .join()
            .map_err(|_| GadgetError::ReaderPanicked)?;
        if let Err(err) = file.sync_all() {
            if received.is_ok() {
                received = Err(err);
            }
        }
        drop(file);

        match &received {
            Ok(bytes) => info!(
                slot = active.slot,
                path = %active.path.display(),
                bytes,
                "file closed"
            ),
            Err(err) => info!(
                slot = active.slot,
                path = %active.path.display(),
                %err,
                "read thread exited with error"
            ),
        }
        Ok(Closed {
            slot: active.slot,
            path: active.path,
            received,
        })
    }
}

/// Reads a 4-byte little-endian length, then exactly that many bytes.
pub fn receive<R: Read, W: Write>(mut reader: R, out: &mut W) -> io::Result<u64> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let declared = u32::from_le_bytes(prefix);
    debug!(bytes = declared, "data size");

    let mut remaining = declared as usize;
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let read = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("endpoint closed with {remaining} bytes outstanding"),
                ));
            }
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        out.write_all(&buf[..read])?;
        remaining -= read;
    }
    Ok(u64::from(declared))
}
