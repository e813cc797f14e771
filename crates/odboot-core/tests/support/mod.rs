#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use odboot_core::protocol::{BootCommand, ControlRequest, Recipient};
use odboot_core::{Clock, DeviceDiscovery, DeviceId, Transport, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireEvent {
    Control(ControlRequest),
    CpuInfo { answered: bool },
    Bulk(Vec<u8>),
    Reinitialize,
}

#[derive(Default)]
pub struct Wire {
    pub events: Vec<WireEvent>,
    /// `GetCpuInfo` calls answered with an error before the loader is "up".
    pub cpu_busy_polls: Option<u32>,
    pub cpu_polls: u32,
    /// Fail every bulk write once this many have gone through.
    pub bulk_fail_after: Option<usize>,
    pub bulk_writes: usize,
}

impl Wire {
    pub fn controls(&self) -> Vec<ControlRequest> {
        self.events
            .iter()
            .filter_map(|event| match event {
                WireEvent::Control(req) => Some(*req),
                _ => None,
            })
            .collect()
    }

    pub fn addresses(&self) -> Vec<u32> {
        self.controls()
            .into_iter()
            .filter(|req| {
                req.recipient == Recipient::Device && req.request == BootCommand::SetDataAddr as u8
            })
            .map(|req| req.arg())
            .collect()
    }

    pub fn bulk_bytes(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                WireEvent::Bulk(data) => Some(data.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}

pub struct FakeTransport {
    wire: Rc<RefCell<Wire>>,
}

impl Transport for FakeTransport {
    fn control_out(
        &mut self,
        request: ControlRequest,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        self.wire
            .borrow_mut()
            .events
            .push(WireEvent::Control(request));
        Ok(())
    }

    fn control_in(
        &mut self,
        _request: ControlRequest,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut wire = self.wire.borrow_mut();
        wire.cpu_polls += 1;
        let busy = wire.cpu_busy_polls.is_none_or(|busy| wire.cpu_polls <= busy);
        wire.events.push(WireEvent::CpuInfo { answered: !busy });
        if busy {
            return Err(TransportError::Timeout);
        }
        buf[..8].copy_from_slice(b"JZ4770V1");
        Ok(8)
    }

    fn bulk_write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut wire = self.wire.borrow_mut();
        if wire.bulk_fail_after == Some(wire.bulk_writes) {
            return Err(TransportError::Device("pipe".to_string()));
        }
        wire.bulk_writes += 1;
        wire.events.push(WireEvent::Bulk(data.to_vec()));
        Ok(data.len())
    }
}

pub struct FakeDiscovery {
    pub wire: Rc<RefCell<Wire>>,
    pub device: DeviceId,
    /// Empty scans before the device appears; `None` never appears.
    pub initial_misses: Option<u32>,
    pub reconnect_misses: Option<u32>,
    pub reinitialized: u32,
    pub scans: u32,
}

impl FakeDiscovery {
    pub fn new(wire: Rc<RefCell<Wire>>, device: DeviceId) -> Self {
        Self {
            wire,
            device,
            initial_misses: Some(0),
            reconnect_misses: Some(0),
            reinitialized: 0,
            scans: 0,
        }
    }
}

impl DeviceDiscovery for FakeDiscovery {
    type Transport = FakeTransport;

    fn open_first(
        &mut self,
        ids: &[DeviceId],
    ) -> Result<Option<(DeviceId, Self::Transport)>, TransportError> {
        self.scans += 1;
        assert!(ids.contains(&self.device));
        let misses = if self.reinitialized == 0 {
            &mut self.initial_misses
        } else {
            &mut self.reconnect_misses
        };
        match misses {
            None => Ok(None),
            Some(0) => Ok(Some((
                self.device,
                FakeTransport {
                    wire: Rc::clone(&self.wire),
                },
            ))),
            Some(left) => {
                *left -= 1;
                Ok(None)
            }
        }
    }

    fn reinitialize(&mut self) -> Result<(), TransportError> {
        self.reinitialized += 1;
        self.wire.borrow_mut().events.push(WireEvent::Reinitialize);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeClock {
    pub sleeps: Vec<Duration>,
}

impl Clock for FakeClock {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

pub fn shared_wire() -> Rc<RefCell<Wire>> {
    Rc::new(RefCell::new(Wire {
        cpu_busy_polls: Some(0),
        ..Wire::default()
    }))
}
