//! Host side of the boot: stage-1 loader, kernel + device tree, reconnect,
//! then slot uploads to the freshly booted daemon.

use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::device::{DeviceId, SocFamily, known_device_ids, soc_family, soc_label};
use crate::error::{Error, Result};
use crate::files::upload_slot;
use crate::payload::{BootImages, PayloadProvider};
use crate::protocol::{BootCommand, CPU_INFO_LEN, ControlRequest, FileCommand, decode_cpu_info};
use crate::transport::{Clock, DeviceDiscovery, StdClock, Transport};
use crate::upload::{ChunkedUploader, upload_to_address};

pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const READY_POLL_ATTEMPTS: u32 = 100;
pub const RECONNECT_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootState {
    Discovering,
    Stage1Upload,
    Stage1Exec,
    AwaitStage1Ready,
    Stage2Upload,
    Stage2Exec,
    AwaitReconnect,
    PostBootUpload,
    Done,
    Failed,
}

#[derive(Clone, Debug)]
pub struct SequencerConfig {
    pub device_ids: Vec<DeviceId>,
    pub discovery_interval: Duration,
    pub ready_poll_interval: Duration,
    pub ready_poll_attempts: u32,
    /// Bound on each `GetCpuInfo` request while the loader runs.
    pub ready_poll_timeout: Duration,
    pub reconnect_grace: Duration,
    /// `None` waits forever for the booted device to come back.
    pub reconnect_attempts: Option<u32>,
    pub uploader: ChunkedUploader,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            device_ids: known_device_ids(),
            discovery_interval: DISCOVERY_INTERVAL,
            ready_poll_interval: READY_POLL_INTERVAL,
            ready_poll_attempts: READY_POLL_ATTEMPTS,
            ready_poll_timeout: READY_POLL_INTERVAL,
            reconnect_grace: RECONNECT_GRACE,
            reconnect_attempts: None,
            uploader: ChunkedUploader::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootReport {
    pub device: DeviceId,
    /// Where the device tree was placed, if the boot stages ran.
    pub devicetree_addr: Option<u32>,
    pub uploaded: Vec<(u16, usize)>,
    pub skipped: Vec<u16>,
}

pub struct BootSequencer<D: DeviceDiscovery, C: Clock = StdClock> {
    discovery: D,
    clock: C,
    config: SequencerConfig,
    state: BootState,
}

impl<D: DeviceDiscovery> BootSequencer<D, StdClock> {
    pub fn new(discovery: D, config: SequencerConfig) -> Self {
        Self::with_clock(discovery, StdClock, config)
    }
}

impl<D: DeviceDiscovery, C: Clock> BootSequencer<D, C> {
    pub fn with_clock(discovery: D, clock: C, config: SequencerConfig) -> Self {
        Self {
            discovery,
            clock,
            config,
            state: BootState::Discovering,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn run<P: PayloadProvider + ?Sized>(&mut self, payloads: &mut P) -> Result<BootReport> {
        match self.run_inner(payloads) {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(state = ?self.state, %err, "boot sequence failed");
                self.state = BootState::Failed;
                Err(err)
            }
        }
    }

    fn run_inner<P: PayloadProvider + ?Sized>(&mut self, payloads: &mut P) -> Result<BootReport> {
        self.enter(BootState::Discovering);
        let (device, session) = self.discover(None)?;
        info!(%device, soc = soc_label(device), "found device");

        let mut report = BootReport {
            device,
            devicetree_addr: None,
            uploaded: Vec::new(),
            skipped: Vec::new(),
        };

        let mut session = match payloads.boot_images(device)? {
            Some(images) => {
                let soc = soc_family(device)
                    .ok_or_else(|| Error::protocol(format!("no load addresses for {device}")))?;
                let mut session = session;
                report.devicetree_addr = Some(self.boot_stages(&mut session, soc, &images)?);

                self.enter(BootState::AwaitReconnect);
                drop(session);
                self.discovery.reinitialize()?;
                self.clock.sleep(self.config.reconnect_grace);
                let (again, session) = self.discover(self.config.reconnect_attempts)?;
                info!(device = %again, "device reconnected");
                session
            }
            None => session,
        };

        self.enter(BootState::PostBootUpload);
        for job in payloads.slot_jobs(device)? {
            match upload_slot(&mut session, &self.config.uploader, &job) {
                Ok(sent) => report.uploaded.push((job.slot, sent)),
                Err(err) if err.is_not_found() => {
                    warn!(slot = job.slot, %err, "skipping slot");
                    report.skipped.push(job.slot);
                }
                Err(err) => return Err(err),
            }
        }

        self.enter(BootState::Done);
        let exit = FileCommand::Exit.request();
        session.control_out(exit, exit.timeout())?;
        drop(session);
        info!(
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            "operation complete"
        );
        Ok(report)
    }

    fn enter(&mut self, state: BootState) {
        debug!(from = ?self.state, to = ?state, "boot state");
        self.state = state;
    }

    /// Scans every `discovery_interval` until a device shows up. `limit`
    /// bounds the number of empty scans.
    fn discover(&mut self, limit: Option<u32>) -> Result<(DeviceId, D::Transport)> {
        let ids = self.config.device_ids.clone();
        let mut misses: u32 = 0;
        loop {
            if let Some(found) = self.discovery.open_first(&ids)? {
                return Ok(found);
            }
            misses = misses.saturating_add(1);
            if let Some(limit) = limit {
                if misses >= limit {
                    return Err(Error::ReconnectTimeout { attempts: misses });
                }
            }
            if misses == 1 {
                info!("waiting for device");
            } else if misses.is_multiple_of(10) {
                debug!(misses, "still waiting for device");
            }
            self.clock.sleep(self.config.discovery_interval);
        }
    }

    /// Runs stage 1 then stage 2 and returns the device tree address.
    fn boot_stages<T: Transport>(
        &mut self,
        session: &mut T,
        soc: &SocFamily,
        images: &BootImages,
    ) -> Result<u32> {
        let uploader = self.config.uploader;

        self.enter(BootState::Stage1Upload);
        upload_to_address(session, &uploader, soc.stage1_load_addr, &images.stage1)?;

        self.enter(BootState::Stage1Exec);
        let start1 = ControlRequest::boot_with_arg(BootCommand::Start1, soc.stage1_load_addr);
        session.control_out(start1, start1.timeout())?;

        self.enter(BootState::AwaitStage1Ready);
        self.await_stage1(session)?;

        self.enter(BootState::Stage2Upload);
        let kernel_len = u32::try_from(images.kernel.len())
            .map_err(|_| Error::protocol("kernel image exceeds 4 GiB"))?;
        upload_to_address(session, &uploader, soc.stage2_load_addr, &images.kernel)?;
        let devicetree_addr = soc
            .stage2_load_addr
            .checked_add(kernel_len)
            .ok_or_else(|| Error::protocol("device tree address overflows"))?;
        upload_to_address(session, &uploader, devicetree_addr, &images.devicetree)?;

        self.enter(BootState::Stage2Exec);
        let flush = ControlRequest::boot(BootCommand::FlushCaches);
        session.control_out(flush, flush.timeout())?;
        let start2 = ControlRequest::boot_with_arg(BootCommand::Start2, soc.stage2_load_addr);
        session.control_out(start2, start2.timeout())?;
        Ok(devicetree_addr)
    }

    fn await_stage1<T: Transport>(&mut self, session: &mut T) -> Result<()> {
        let request = ControlRequest::boot(BootCommand::GetCpuInfo);
        let attempts = self.config.ready_poll_attempts;
        for attempt in 1..=attempts {
            let mut reply = [0u8; CPU_INFO_LEN];
            match session.control_in(request, &mut reply, self.config.ready_poll_timeout) {
                Ok(CPU_INFO_LEN) => {
                    info!(cpu = %decode_cpu_info(&reply), attempt, "stage-1 loader ready");
                    return Ok(());
                }
                Ok(len) => trace!(attempt, len, "short CPU info reply"),
                Err(err) => trace!(attempt, %err, "CPU info not available yet"),
            }
            self.clock.sleep(self.config.ready_poll_interval);
        }
        Err(Error::Stage1Timeout { attempts })
    }
}
