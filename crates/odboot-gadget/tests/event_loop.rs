use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use odboot_core::protocol::FileCommand;
use odboot_gadget::event::{CtrlRequest, Event, FILE_REQUEST_TYPE};
use odboot_gadget::{GadgetSession, LoopExit, ShutdownSignal, SlotTable, run};

fn pipe_files() -> (File, File) {
    let (reader, writer) = std::io::pipe().expect("pipe");
    (
        File::from(OwnedFd::from(reader)),
        File::from(OwnedFd::from(writer)),
    )
}

/// ep0 whose zero-length status reads always fail.
struct StalledEp0 {
    inner: File,
    status_reads: usize,
}

impl Read for StalledEp0 {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            self.status_reads += 1;
            return Err(io::ErrorKind::ResourceBusy.into());
        }
        self.inner.read(buf)
    }
}

impl AsFd for StalledEp0 {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

fn setup(command: FileCommand) -> [u8; 12] {
    setup_typed(FILE_REQUEST_TYPE, command)
}

fn setup_typed(request_type: u8, command: FileCommand) -> [u8; 12] {
    let request = command.request();
    Event::setup(CtrlRequest {
        request_type,
        request: request.request,
        value: request.value,
        index: request.index,
        length: 0,
    })
}

#[test]
fn exit_stops_the_loop_without_further_traffic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, mut host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    host_ctrl.write_all(&setup(FileCommand::Exit)).unwrap();

    let exit = run(&mut ep0, &mut session, &shutdown).unwrap();
    assert_eq!(exit, LoopExit::Shutdown);
    assert!(shutdown.is_signaled());
    assert!(!shutdown.signal());
    drop(host_ctrl);
}

#[test]
fn open_body_close_lands_in_the_slot_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, mut host_ctrl) = pipe_files();
    let (ep1, mut host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    let body = b"squashfs image bytes";
    host_bulk
        .write_all(&(body.len() as u32).to_le_bytes())
        .unwrap();
    host_bulk.write_all(body).unwrap();
    for command in [
        FileCommand::OpenFile(0),
        FileCommand::CloseFile,
        FileCommand::Exit,
    ] {
        host_ctrl.write_all(&setup(command)).unwrap();
    }

    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::Shutdown
    );
    assert!(!session.is_busy());
    assert_eq!(fs::read(dir.path().join("rootfs.squashfs")).unwrap(), body);
}

#[test]
fn handler_errors_do_not_stop_the_loop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, mut host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    for command in [
        FileCommand::CloseFile,
        FileCommand::OpenFile(77),
        FileCommand::Exit,
    ] {
        host_ctrl.write_all(&setup(command)).unwrap();
    }

    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::Shutdown
    );
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn signal_before_any_event_exits_immediately() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, _host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    shutdown.signal();
    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::Shutdown
    );
}

#[test]
fn closed_control_endpoint_ends_the_loop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    drop(host_ctrl);
    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::EndpointClosed
    );
    assert!(!shutdown.is_signaled());
}

#[test]
fn events_after_exit_are_not_processed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, mut host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    host_ctrl.write_all(&setup(FileCommand::Exit)).unwrap();
    host_ctrl
        .write_all(&setup(FileCommand::OpenFile(0)))
        .unwrap();

    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::Shutdown
    );
    assert!(!session.is_busy());
    assert!(!dir.path().join("rootfs.squashfs").exists());
}

#[test]
fn class_requests_with_command_codes_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut ep0, mut host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));

    // class OUT to the interface, then vendor IN, both reusing Exit/OpenFile codes
    host_ctrl
        .write_all(&setup_typed(0x21, FileCommand::Exit))
        .unwrap();
    host_ctrl
        .write_all(&setup_typed(0xc1, FileCommand::OpenFile(0)))
        .unwrap();
    drop(host_ctrl);

    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::EndpointClosed
    );
    assert!(!shutdown.is_signaled());
    assert!(!session.is_busy());
    assert!(!dir.path().join("rootfs.squashfs").exists());
}

#[test]
fn failed_status_reads_do_not_stop_the_loop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (ep0, mut host_ctrl) = pipe_files();
    let (ep1, _host_bulk) = pipe_files();
    let shutdown = ShutdownSignal::new().unwrap();
    let mut session = GadgetSession::new(ep1, SlotTable::new(dir.path()));
    let mut ep0 = StalledEp0 {
        inner: ep0,
        status_reads: 0,
    };

    host_ctrl.write_all(&setup(FileCommand::CloseFile)).unwrap();
    host_ctrl.write_all(&setup(FileCommand::Exit)).unwrap();

    assert_eq!(
        run(&mut ep0, &mut session, &shutdown).unwrap(),
        LoopExit::Shutdown
    );
    assert_eq!(ep0.status_reads, 2);
}
