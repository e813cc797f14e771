use std::os::fd::{AsFd, BorrowedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use nix::sys::eventfd::{EfdFlags, EventFd};
use nix::sys::signal::{SigSet, Signal};
use tracing::{debug, info, warn};

use crate::error::GadgetError;

/// One-shot, level-triggered stop request backed by an eventfd so the event
/// loop can poll it next to `ep0`.
pub struct ShutdownSignal {
    fd: EventFd,
    signaled: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Result<Self, GadgetError> {
        let fd = EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)
            .map_err(GadgetError::Shutdown)?;
        Ok(Self {
            fd,
            signaled: AtomicBool::new(false),
        })
    }

    /// Returns `true` for the call that actually fired the signal.
    pub fn signal(&self) -> bool {
        if self.signaled.swap(true, Ordering::SeqCst) {
            return false;
        }
        loop {
            match self.fd.write(1) {
                Ok(_) => break,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(err) => {
                    warn!(%err, "unable to notify shutdown eventfd");
                    break;
                }
            }
        }
        true
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

pub const SHUTDOWN_SIGNALS: [Signal; 4] = [
    Signal::SIGHUP,
    Signal::SIGPIPE,
    Signal::SIGINT,
    Signal::SIGTERM,
];

/// Blocks the shutdown signals in the calling thread and routes them to
/// `shutdown` from a dedicated `sigwait` thread.
///
/// Call before spawning any other thread so they inherit the mask.
pub fn forward_signals(shutdown: Arc<ShutdownSignal>) -> Result<JoinHandle<()>, GadgetError> {
    let mut set = SigSet::empty();
    for signal in SHUTDOWN_SIGNALS {
        set.add(signal);
    }
    set.thread_block().map_err(GadgetError::Shutdown)?;
    std::thread::Builder::new()
        .name("odbootd-signals".to_string())
        .spawn(move || {
            loop {
                match set.wait() {
                    Ok(signal) => {
                        info!(?signal, "received signal");
                        shutdown.signal();
                        break;
                    }
                    Err(err) => {
                        debug!(%err, "sigwait failed");
                        if shutdown.is_signaled() {
                            break;
                        }
                    }
                }
            }
        })
        .map_err(GadgetError::ThreadSpawn)
}
