use std::time::Duration;

use thiserror::Error;

use crate::device::DeviceId;
use crate::protocol::ControlRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transfer timed out")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("device error: {0}")]
    Device(String),
}

/// Minimal USB operations the boot and upload protocols need.
///
/// Implementations block for at most the supplied timeout; a zero timeout on
/// [`Transport::bulk_write`] means "no bound".
pub trait Transport {
    fn control_out(
        &mut self,
        request: ControlRequest,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    fn control_in(
        &mut self,
        request: ControlRequest,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn control_out(
        &mut self,
        request: ControlRequest,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        (**self).control_out(request, timeout)
    }

    fn control_in(
        &mut self,
        request: ControlRequest,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        (**self).control_in(request, buf, timeout)
    }

    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).bulk_write(data, timeout)
    }
}

/// Finds and opens a device matching one of a set of identities.
pub trait DeviceDiscovery {
    type Transport: Transport;

    /// Single scan. `Ok(None)` when nothing matching is plugged in; an error
    /// means a device matched but could not be claimed.
    fn open_first(
        &mut self,
        ids: &[DeviceId],
    ) -> Result<Option<(DeviceId, Self::Transport)>, TransportError>;

    /// Tear down and recreate the underlying USB context.
    fn reinitialize(&mut self) -> Result<(), TransportError>;
}

/// Source of blocking delays, swapped out in tests.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StdClock;

impl Clock for StdClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
