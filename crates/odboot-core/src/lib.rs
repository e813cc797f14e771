//! Host side of the odboot protocol: boot-ROM stage injection for Ingenic
//! SoCs and the open/write/close file upload spoken by `odbootd`.

pub mod board;
pub mod device;
pub mod error;
pub mod files;
pub mod payload;
pub mod protocol;
pub mod sequencer;
pub mod transport;
pub mod upload;

pub use device::{DeviceId, SocFamily};
pub use error::{Error, Result};
pub use files::SlotJob;
pub use payload::{BootImages, PackageDir, PayloadProvider, UploadOnly};
pub use sequencer::{BootReport, BootSequencer, BootState, SequencerConfig};
pub use transport::{Clock, DeviceDiscovery, StdClock, Transport, TransportError};
pub use upload::{ChunkedUploader, MAX_TRANSFER_SIZE};
