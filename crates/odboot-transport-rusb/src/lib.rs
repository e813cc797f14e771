use std::time::Duration;

use odboot_core::protocol::{BULK_OUT_ENDPOINT, CONTROL_INTERFACE, ControlRequest, Recipient};
use odboot_core::{DeviceDiscovery, DeviceId, Transport, TransportError};
use rusb::{Context, DeviceHandle, Direction, RequestType, UsbContext as _};
use tracing::{debug, trace, warn};

pub struct RusbTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
}

impl RusbTransport {
    pub fn from_handle(handle: DeviceHandle<Context>, interface: u8) -> Result<Self, TransportError> {
        let _ = handle.set_auto_detach_kernel_driver(true);
        if let Ok(true) = handle.kernel_driver_active(interface) {
            let _ = handle.detach_kernel_driver(interface);
        }
        handle.claim_interface(interface).map_err(map_usb_error)?;
        Ok(Self { handle, interface })
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(self.interface);
    }
}

impl Transport for RusbTransport {
    fn control_out(
        &mut self,
        request: ControlRequest,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        trace!(request = request.request, value = request.value, index = request.index, "control out");
        self.handle
            .write_control(
                request_type(Direction::Out, request.recipient),
                request.request,
                request.value,
                request.index,
                &[],
                timeout,
            )
            .map_err(map_usb_error)?;
        Ok(())
    }

    fn control_in(
        &mut self,
        request: ControlRequest,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.handle
            .read_control(
                request_type(Direction::In, request.recipient),
                request.request,
                request.value,
                request.index,
                buf,
                timeout,
            )
            .map_err(map_usb_error)
    }

    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        self.handle
            .write_bulk(BULK_OUT_ENDPOINT, data, timeout)
            .map_err(map_usb_error)
    }
}

/// Opens Ingenic devices by identity. The libusb context is created lazily
/// and dropped on [`DeviceDiscovery::reinitialize`].
#[derive(Default)]
pub struct RusbDiscovery {
    context: Option<Context>,
}

impl RusbDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&mut self) -> Result<&Context, TransportError> {
        if self.context.is_none() {
            let context = Context::new().map_err(map_usb_error)?;
            debug!("created USB context");
            self.context = Some(context);
        }
        self.context
            .as_ref()
            .ok_or_else(|| TransportError::Device("USB context unavailable".to_string()))
    }
}

impl DeviceDiscovery for RusbDiscovery {
    type Transport = RusbTransport;

    fn open_first(
        &mut self,
        ids: &[DeviceId],
    ) -> Result<Option<(DeviceId, Self::Transport)>, TransportError> {
        let context = self.context()?;
        for id in ids {
            let Some(handle) = context.open_device_with_vid_pid(id.vendor_id, id.product_id)
            else {
                continue;
            };
            debug!(device = %id, "opened device");
            let transport = RusbTransport::from_handle(handle, CONTROL_INTERFACE).inspect_err(
                |err| warn!(device = %id, %err, "unable to claim interface {CONTROL_INTERFACE}"),
            )?;
            return Ok(Some((*id, transport)));
        }
        Ok(None)
    }

    fn reinitialize(&mut self) -> Result<(), TransportError> {
        self.context = None;
        self.context()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachedDevice {
    pub id: DeviceId,
    pub bus: u8,
    pub address: u8,
}

/// Lists attached devices whose identity is in `ids`, without opening them.
pub fn scan(ids: &[DeviceId]) -> Result<Vec<AttachedDevice>, TransportError> {
    let context = Context::new().map_err(map_usb_error)?;
    let devices = context.devices().map_err(map_usb_error)?;
    let mut found = Vec::new();
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(err) => {
                debug!(%err, "skipping USB device: unable to read descriptor");
                continue;
            }
        };
        let id = DeviceId::new(desc.vendor_id(), desc.product_id());
        if ids.contains(&id) {
            found.push(AttachedDevice {
                id,
                bus: device.bus_number(),
                address: device.address(),
            });
        }
    }
    Ok(found)
}

fn request_type(direction: Direction, recipient: Recipient) -> u8 {
    let recipient = match recipient {
        Recipient::Device => rusb::Recipient::Device,
        Recipient::Interface => rusb::Recipient::Interface,
    };
    rusb::request_type(direction, RequestType::Vendor, recipient)
}

fn map_usb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::Timeout => TransportError::Timeout,
        rusb::Error::NoDevice => TransportError::Disconnected,
        other => TransportError::Device(other.to_string()),
    }
}
