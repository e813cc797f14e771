use std::io::{self, Read};
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use odboot_core::protocol::FileCommand;
use tracing::{debug, info, warn};

use crate::error::GadgetError;
use crate::event::{CtrlRequest, EVENT_SIZE, Event};
use crate::session::{BulkEndpoint, GadgetSession};
use crate::shutdown::ShutdownSignal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    /// `ep0` reported end of file, the function was torn down.
    EndpointClosed,
}

/// Serves `ep0` until the shutdown signal fires.
///
/// Handler failures are logged only: the control protocol has no way to
/// report them back to the host.
pub fn run<C, B>(
    ep0: &mut C,
    session: &mut GadgetSession<B>,
    shutdown: &ShutdownSignal,
) -> Result<LoopExit, GadgetError>
where
    C: Read + AsFd,
    B: BulkEndpoint,
{
    loop {
        let (control_ready, stop_ready) = {
            let mut fds = [
                PollFd::new(ep0.as_fd(), PollFlags::POLLIN),
                PollFd::new(shutdown.as_fd(), PollFlags::POLLIN),
            ];
            poll_nointr(&mut fds)?;
            (
                is_ready(&fds[0], PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP),
                is_ready(&fds[1], PollFlags::POLLIN),
            )
        };

        if stop_ready {
            info!("shutdown requested");
            return Ok(LoopExit::Shutdown);
        }
        if !control_ready {
            continue;
        }

        let mut raw = [0u8; EVENT_SIZE];
        let read = match ep0.read(&mut raw) {
            Ok(0) => return Ok(LoopExit::EndpointClosed),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(GadgetError::Endpoint(err)),
        };
        if read != EVENT_SIZE {
            warn!(read, "short event read on ep0");
        } else {
            match Event::parse(&raw) {
                Event::Setup(request) => handle_setup(session, &request, shutdown),
                other => debug!(event = ?other, "gadget event"),
            }
        }

        // Clears errors left on ep0 when an endpoint was closed mid-transfer.
        if let Err(err) = ep0.read(&mut []) {
            debug!(%err, "ep0 status read failed");
        }
    }
}

pub fn handle_setup<B: BulkEndpoint>(
    session: &mut GadgetSession<B>,
    request: &CtrlRequest,
    shutdown: &ShutdownSignal,
) {
    match request.command() {
        Some(FileCommand::Exit) => {
            info!("exit requested by host");
            shutdown.signal();
        }
        Some(FileCommand::OpenFile(slot)) => {
            if let Err(err) = session.open_file(slot) {
                warn!(slot, %err, "unable to open file");
            }
        }
        Some(FileCommand::CloseFile) => {
            if let Err(err) = session.close_file() {
                warn!(%err, "unable to close file");
            }
        }
        None => debug!(
            request_type = request.request_type,
            request = request.request,
            "ignoring non-command request"
        ),
    }
}

fn poll_nointr(fds: &mut [PollFd<'_>]) -> Result<(), GadgetError> {
    loop {
        match poll(fds, PollTimeout::NONE) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(GadgetError::Poll(err)),
        }
    }
}

fn is_ready(fd: &PollFd<'_>, flags: PollFlags) -> bool {
    fd.revents().is_some_and(|events| events.intersects(flags))
}
