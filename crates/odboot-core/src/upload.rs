use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{BootCommand, ControlRequest};
use crate::transport::Transport;

/// Largest slice handed to a single bulk transfer.
pub const MAX_TRANSFER_SIZE: usize = 1024 * 1024;

/// Splits a buffer into bounded bulk transfers and drives them to completion.
#[derive(Clone, Copy, Debug)]
pub struct ChunkedUploader {
    chunk_size: usize,
    timeout: Duration,
}

impl Default for ChunkedUploader {
    fn default() -> Self {
        Self {
            chunk_size: MAX_TRANSFER_SIZE,
            timeout: Duration::ZERO,
        }
    }
}

impl ChunkedUploader {
    pub fn new(chunk_size: usize, timeout: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            timeout,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sends all of `data`, returning the number of bytes the device accepted.
    ///
    /// The transport may accept less than a full chunk per call; the rest of
    /// the chunk is resent until it drains. A call accepting nothing means the
    /// endpoint stalled.
    pub fn upload<T: Transport + ?Sized>(&self, transport: &mut T, data: &[u8]) -> Result<usize> {
        let total = data.len();
        let mut sent = 0usize;
        for chunk in data.chunks(self.chunk_size) {
            let mut remaining = chunk;
            while !remaining.is_empty() {
                let written = transport.bulk_write(remaining, self.timeout)?;
                if written == 0 {
                    return Err(Error::protocol(format!(
                        "bulk endpoint stalled after {sent} of {total} bytes"
                    )));
                }
                if written > remaining.len() {
                    return Err(Error::protocol(format!(
                        "device reported {written} bytes for a {} byte transfer",
                        remaining.len()
                    )));
                }
                sent += written;
                remaining = &remaining[written..];
            }
            debug!(sent, total, "bulk chunk complete");
        }
        Ok(sent)
    }
}

/// Places `data` at `addr` in device memory through the boot ROM.
pub fn upload_to_address<T: Transport + ?Sized>(
    transport: &mut T,
    uploader: &ChunkedUploader,
    addr: u32,
    data: &[u8],
) -> Result<usize> {
    let len = u32::try_from(data.len())
        .map_err(|_| Error::protocol(format!("payload too large: {} bytes", data.len())))?;
    let set_len = ControlRequest::boot_with_arg(BootCommand::SetDataLen, len);
    transport.control_out(set_len, set_len.timeout())?;
    let set_addr = ControlRequest::boot_with_arg(BootCommand::SetDataAddr, addr);
    transport.control_out(set_addr, set_addr.timeout())?;
    let sent = uploader.upload(transport, data)?;
    info!(bytes = sent, addr = %format!("{addr:#010x}"), "uploaded payload");
    Ok(sent)
}
