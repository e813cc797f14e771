//! Vendor control requests understood by the boot ROM and by `odbootd`.

use std::time::Duration;

/// Bulk OUT endpoint carrying every payload byte.
pub const BULK_OUT_ENDPOINT: u8 = 0x01;
/// Interface claimed on both the boot ROM and the daemon gadget.
pub const CONTROL_INTERFACE: u8 = 0;
pub const CPU_INFO_LEN: usize = 8;

pub const BOOT_ROM_TIMEOUT: Duration = Duration::from_secs(10);
pub const FILE_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
}

/// Boot ROM requests, addressed to the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BootCommand {
    GetCpuInfo = 0,
    SetDataAddr = 1,
    SetDataLen = 2,
    FlushCaches = 3,
    Start1 = 4,
    Start2 = 5,
}

/// File sub-protocol requests, addressed to interface 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileCommand {
    Exit,
    OpenFile(u16),
    CloseFile,
}

impl FileCommand {
    pub const EXIT: u8 = 0;
    pub const OPEN_FILE: u8 = 1;
    pub const CLOSE_FILE: u8 = 2;

    pub fn code(self) -> u8 {
        match self {
            Self::Exit => Self::EXIT,
            Self::OpenFile(_) => Self::OPEN_FILE,
            Self::CloseFile => Self::CLOSE_FILE,
        }
    }

    pub fn request(self) -> ControlRequest {
        let value = match self {
            Self::OpenFile(slot) => slot,
            Self::Exit | Self::CloseFile => 0,
        };
        ControlRequest {
            recipient: Recipient::Interface,
            request: self.code(),
            value,
            index: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlRequest {
    pub recipient: Recipient,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlRequest {
    pub fn boot(command: BootCommand) -> Self {
        Self {
            recipient: Recipient::Device,
            request: command as u8,
            value: 0,
            index: 0,
        }
    }

    /// Boot ROM request carrying a 32-bit argument: high half in wValue,
    /// low half in wIndex.
    pub fn boot_with_arg(command: BootCommand, arg: u32) -> Self {
        let (value, index) = split_u32(arg);
        Self {
            recipient: Recipient::Device,
            request: command as u8,
            value,
            index,
        }
    }

    pub fn arg(&self) -> u32 {
        join_u32(self.value, self.index)
    }

    pub fn timeout(&self) -> Duration {
        match self.recipient {
            Recipient::Device => BOOT_ROM_TIMEOUT,
            Recipient::Interface => FILE_COMMAND_TIMEOUT,
        }
    }
}

pub fn split_u32(arg: u32) -> (u16, u16) {
    ((arg >> 16) as u16, (arg & 0xffff) as u16)
}

pub fn join_u32(hi: u16, lo: u16) -> u32 {
    (u32::from(hi) << 16) | u32::from(lo)
}

/// 4-byte little-endian prefix sent ahead of every slotted file body.
pub fn length_prefix(len: u32) -> [u8; 4] {
    len.to_le_bytes()
}

/// Decodes the boot ROM's CPU info reply, e.g. `JZ4770V1`.
pub fn decode_cpu_info(reply: &[u8]) -> String {
    reply
        .iter()
        .take_while(|byte| **byte != 0)
        .map(|byte| {
            if byte.is_ascii_graphic() {
                *byte as char
            } else {
                '.'
            }
        })
        .collect()
}
