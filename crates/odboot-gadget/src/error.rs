use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GadgetError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("opening {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("endpoint I/O: {0}")]
    Endpoint(#[source] io::Error),
    #[error("shutdown signal: {0}")]
    Shutdown(#[source] nix::Error),
    #[error("poll: {0}")]
    Poll(#[source] nix::Error),
    #[error("spawning thread: {0}")]
    ThreadSpawn(#[source] io::Error),
    #[error("reader thread panicked")]
    ReaderPanicked,
}

impl GadgetError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
