use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("stage-1 loader did not answer after {attempts} attempts")]
    Stage1Timeout { attempts: u32 },
    #[error("device did not reappear after {attempts} attempts")]
    ReconnectTimeout { attempts: u32 },
    #[error("boot payloads unavailable: {0}")]
    Payload(String),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Maps a file read failure, keeping a missing file distinguishable.
    pub fn from_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
