use odboot_core::protocol::FileCommand;

/// Size of `struct usb_functionfs_event`.
pub const EVENT_SIZE: usize = 12;

/// bmRequestType of file commands: host to device, vendor, interface.
pub const FILE_REQUEST_TYPE: u8 = 0x41;

/// `struct usb_ctrlrequest`, decoded from little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CtrlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl CtrlRequest {
    pub fn parse(raw: &[u8; 8]) -> Self {
        Self {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    pub fn encode(&self) -> [u8; 8] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Interprets the request as a file sub-protocol command. Only vendor
    /// OUT requests addressed to the interface carry one.
    pub fn command(&self) -> Option<FileCommand> {
        if self.request_type != FILE_REQUEST_TYPE {
            return None;
        }
        match self.request {
            FileCommand::EXIT => Some(FileCommand::Exit),
            FileCommand::OPEN_FILE => Some(FileCommand::OpenFile(self.value)),
            FileCommand::CLOSE_FILE => Some(FileCommand::CloseFile),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Bind,
    Unbind,
    Enable,
    Disable,
    Setup(CtrlRequest),
    Suspend,
    Resume,
    Unknown(u8),
}

impl Event {
    pub fn parse(raw: &[u8; EVENT_SIZE]) -> Self {
        let mut setup = [0u8; 8];
        setup.copy_from_slice(&raw[..8]);
        match raw[8] {
            0 => Self::Bind,
            1 => Self::Unbind,
            2 => Self::Enable,
            3 => Self::Disable,
            4 => Self::Setup(CtrlRequest::parse(&setup)),
            5 => Self::Suspend,
            6 => Self::Resume,
            other => Self::Unknown(other),
        }
    }

    pub fn setup(request: CtrlRequest) -> [u8; EVENT_SIZE] {
        let mut raw = [0u8; EVENT_SIZE];
        raw[..8].copy_from_slice(&request.encode());
        raw[8] = 4;
        raw
    }
}
