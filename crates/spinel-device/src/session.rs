//! Request/response correlation over one byte transport.
//!
//! A background reader thread owns the inbound half of the link. Replies are
//! routed to the waiting request by signature. Unsolicited reports (response
//! codes `0x0A..=0x0F`) go to a bounded queue instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use spinel_frame::{
    is_unsolicited, Ack, FrameReader, FrameWriter, FramerConfig, FramerEvent, Message,
    UNICAST_ADDRESS,
};
use spinel_transport::{ByteTransport, TransportError};
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};

/// Default time to wait for a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capacity of the unsolicited report queue.
pub const DEFAULT_UNSOLICITED_CAPACITY: usize = 256;

/// Runtime session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device address stamped on outgoing requests.
    pub address: u8,
    /// How long a request waits for its reply.
    pub timeout: Duration,
    /// Unsolicited reports held before new arrivals are dropped.
    ///
    /// Zero is treated as one; the queue never blocks the reader thread.
    pub unsolicited_capacity: usize,
    /// Read timeout applied to the reader transport at start, if any.
    ///
    /// `None` keeps whatever timeout the transport was opened with.
    pub poll_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: UNICAST_ADDRESS,
            timeout: DEFAULT_TIMEOUT,
            unsolicited_capacity: DEFAULT_UNSOLICITED_CAPACITY,
            poll_interval: None,
        }
    }
}

type Pending = HashMap<u8, SyncSender<Message>>;

struct Shared {
    pending: Mutex<Pending>,
    running: AtomicBool,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a waiter for `signature`.
    ///
    /// The reader thread clears `pending` after it stops, so a waiter added
    /// once `running` is false would never be answered.
    fn register(&self, signature: u8, waiter: SyncSender<Message>) -> Result<()> {
        if self.pending().insert(signature, waiter).is_some() {
            warn!(signature, "replacing pending request with the same signature");
        }
        if !self.running.load(Ordering::Acquire) {
            self.pending().remove(&signature);
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

/// A request/response session with one device.
///
/// The reader transport must have a finite read timeout so the reader thread
/// notices shutdown. Serial ports opened through
/// [`SerialTransport`](spinel_transport::SerialTransport) always do.
pub struct DeviceSession<W: ByteTransport> {
    writer: FrameWriter<W>,
    shared: Arc<Shared>,
    unsolicited: Receiver<Message>,
    reader: Option<JoinHandle<()>>,
    next_signature: u8,
    config: SessionConfig,
}

impl<W: ByteTransport> DeviceSession<W> {
    /// Start a session over separate inbound and outbound transports.
    ///
    /// Bytes already buffered on `reader` are discarded first so a stale
    /// reply cannot be matched to a new request.
    pub fn new<R>(mut reader: R, writer: W, config: SessionConfig) -> Result<Self>
    where
        R: ByteTransport + Send + 'static,
    {
        reader.discard_input()?;
        if let Some(interval) = config.poll_interval {
            reader.set_read_timeout(interval)?;
        }

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
        });
        let (unsolicited_tx, unsolicited) =
            mpsc::sync_channel(config.unsolicited_capacity.max(1));

        let frames = FrameReader::with_config(
            reader,
            FramerConfig {
                check_response_code: false,
            },
        );
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("spinel-reader".into())
            .spawn(move || read_loop(frames, thread_shared, unsolicited_tx))
            .map_err(TransportError::from)?;

        debug!(address = config.address, timeout = ?config.timeout, "session started");

        Ok(Self {
            writer: FrameWriter::new(writer),
            shared,
            unsolicited,
            reader: Some(handle),
            next_signature: 0,
            config,
        })
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true while the reader thread is running.
    pub fn is_open(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Send an instruction to the configured address and wait for the reply.
    pub fn request(&mut self, instruction: u8, payload: impl Into<Bytes>) -> Result<Message> {
        let signature = self.allocate_signature();
        let message = Message::new(signature, instruction)
            .with_address(self.config.address)
            .with_payload(payload);
        self.request_message(message)
    }

    /// Send a prepared message and wait for the reply with its signature.
    ///
    /// Replies carrying a device error code surface as
    /// [`SessionError::Device`].
    pub fn request_message(&mut self, message: Message) -> Result<Message> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }

        let signature = message.signature;
        let (tx, rx) = mpsc::sync_channel(1);
        self.shared.register(signature, tx)?;

        if let Err(err) = self.writer.send(&message) {
            self.shared.pending().remove(&signature);
            return Err(err.into());
        }
        debug!(%message, "request sent");

        let reply = match rx.recv_timeout(self.config.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending().remove(&signature);
                if !self.is_open() {
                    return Err(SessionError::Closed);
                }
                debug!(signature, "request timed out");
                return Err(SessionError::Timeout(self.config.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Closed),
        };

        match Ack::classify(reply.instruction)? {
            Ack::Ok => Ok(reply),
            Ack::Error(error) => Err(SessionError::Device { error, reply }),
            Ack::Unsolicited(code) => Err(SessionError::UnexpectedReply {
                instruction: message.instruction,
                reason: format!("unsolicited code 0x{code:02x} routed as reply"),
            }),
        }
    }

    /// Send a message without waiting for any reply.
    ///
    /// Used for broadcast instructions, which devices do not answer.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }
        self.writer.send(message)?;
        debug!(%message, "message sent");
        Ok(())
    }

    /// Wait up to `timeout` for the next unsolicited report.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    pub fn recv_unsolicited(&self, timeout: Duration) -> Result<Option<Message>> {
        match self.unsolicited.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Closed),
        }
    }

    /// Take a queued unsolicited report without blocking.
    pub fn try_recv_unsolicited(&self) -> Option<Message> {
        self.unsolicited.try_recv().ok()
    }

    /// Stop the reader thread and wait for it to exit.
    pub fn close(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("reader thread panicked");
            }
            debug!("session closed");
        }
    }

    /// Next signature not currently awaiting a reply.
    fn allocate_signature(&mut self) -> u8 {
        let pending = self.shared.pending();
        let mut signature = self.next_signature;
        for _ in 0..=u8::MAX {
            if !pending.contains_key(&signature) {
                break;
            }
            signature = signature.wrapping_add(1);
        }
        self.next_signature = signature.wrapping_add(1);
        signature
    }
}

impl<W: ByteTransport> Drop for DeviceSession<W> {
    fn drop(&mut self) {
        // The thread exits on its next poll; not joined here.
        self.shared.running.store(false, Ordering::Release);
    }
}

fn read_loop<R: ByteTransport>(
    mut frames: FrameReader<R>,
    shared: Arc<Shared>,
    unsolicited: SyncSender<Message>,
) {
    while shared.running.load(Ordering::Acquire) {
        match frames.poll_event() {
            Ok(Some(FramerEvent::Frame(message))) => dispatch(&shared, &unsolicited, message),
            Ok(Some(FramerEvent::Discarded { error, .. })) => debug!(%error, "frame dropped"),
            Ok(Some(FramerEvent::BadHeader(header))) => debug!(?header, "resynchronized"),
            Ok(Some(FramerEvent::Skipped(byte))) => trace!(byte, "noise"),
            Ok(None) => {}
            Err(err) => {
                if shared.running.load(Ordering::Acquire) {
                    warn!(%err, "reader stopped");
                }
                break;
            }
        }
    }

    shared.running.store(false, Ordering::Release);
    // Dropping the senders wakes every waiting request with `Closed`.
    shared.pending().clear();
}

fn dispatch(shared: &Shared, unsolicited: &SyncSender<Message>, message: Message) {
    if is_unsolicited(message.instruction) {
        match unsolicited.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!(%message, "unsolicited queue full, dropping report");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
        return;
    }

    let waiter = shared.pending().remove(&message.signature);
    match waiter {
        Some(tx) => {
            trace!(%message, "reply routed");
            let _ = tx.send(message);
        }
        None => debug!(%message, "reply without pending request"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;

    use spinel_frame::{DeviceError, UNSOLICITED_CODES};
    use spinel_transport::IoTransport;

    use super::*;

    const POLL: Duration = Duration::from_millis(10);

    type Handler = Box<dyn FnMut(&Message) -> Vec<Message> + Send>;

    fn reply_to(request: &Message, code: u8, payload: &[u8]) -> Message {
        Message::new(request.signature, code)
            .with_address(request.address)
            .with_payload(payload.to_vec())
    }

    fn silent() -> Handler {
        Box::new(|_: &Message| Vec::new())
    }

    /// Session plus a fake device answering through `handler`.
    fn harness(
        config: SessionConfig,
        mut handler: Handler,
    ) -> (
        DeviceSession<IoTransport<UnixStream>>,
        JoinHandle<Vec<Message>>,
    ) {
        let (host, device) = UnixStream::pair().unwrap();
        host.set_read_timeout(Some(POLL)).unwrap();
        let host_reader = host.try_clone().unwrap();
        let session =
            DeviceSession::new(IoTransport::new(host_reader), IoTransport::new(host), config)
                .unwrap();

        let device_thread = thread::spawn(move || {
            let device_writer = device.try_clone().unwrap();
            let mut reader = FrameReader::with_config(
                IoTransport::new(device),
                FramerConfig {
                    check_response_code: false,
                },
            );
            let mut writer = FrameWriter::new(IoTransport::new(device_writer));
            let mut seen = Vec::new();
            while let Ok(request) = reader.read_message(None) {
                for reply in handler(&request) {
                    if writer.send(&reply).is_err() {
                        return seen;
                    }
                }
                seen.push(request);
            }
            seen
        });

        (session, device_thread)
    }

    fn finish(
        mut session: DeviceSession<IoTransport<UnixStream>>,
        device: JoinHandle<Vec<Message>>,
    ) -> Vec<Message> {
        session.close();
        // Closing the writer half ends the device loop.
        drop(session);
        device.join().unwrap()
    }

    #[test]
    fn request_receives_matching_reply() {
        let (mut session, device) = harness(
            SessionConfig::default(),
            Box::new(|req: &Message| vec![reply_to(req, 0x00, b"D20")]),
        );

        let reply = session.request(0xF3, Bytes::new()).unwrap();
        assert_eq!(reply.payload.as_ref(), b"D20");
        assert_eq!(reply.instruction, 0x00);

        let seen = finish(session, device);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].instruction, 0xF3);
        assert_eq!(seen[0].address, UNICAST_ADDRESS);
    }

    #[test]
    fn signatures_advance_per_request() {
        let (mut session, device) = harness(
            SessionConfig::default(),
            Box::new(|req: &Message| vec![reply_to(req, 0x00, &[])]),
        );

        for _ in 0..3 {
            session.request(0x41, Bytes::new()).unwrap();
        }

        let seen = finish(session, device);
        let signatures: Vec<u8> = seen.iter().map(|m| m.signature).collect();
        assert_eq!(signatures, vec![0, 1, 2]);
    }

    #[test]
    fn device_error_code_surfaces() {
        let (mut session, device) = harness(
            SessionConfig::default(),
            Box::new(|req: &Message| vec![reply_to(req, 0x03, &[])]),
        );

        let err = session.request(0x40, vec![9, 1]).unwrap_err();
        match err {
            SessionError::Device { error, reply } => {
                assert_eq!(error, DeviceError::MalformedData);
                assert_eq!(reply.instruction, 0x03);
            }
            other => panic!("expected device error, got {other:?}"),
        }

        finish(session, device);
    }

    #[test]
    fn invalid_response_code_is_frame_error() {
        let (mut session, device) = harness(
            SessionConfig::default(),
            Box::new(|req: &Message| vec![reply_to(req, 0x07, &[])]),
        );

        let err = session.request(0x40, vec![1, 1]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(spinel_frame::FrameError::InvalidResponseCode(0x07))
        ));

        finish(session, device);
    }

    #[test]
    fn silent_device_times_out() {
        let config = SessionConfig {
            timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let (mut session, device) = harness(config, silent());

        let err = session.request(0xF3, Bytes::new()).unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(err.is_retryable());

        finish(session, device);
    }

    #[test]
    fn late_reply_does_not_satisfy_next_request() {
        let config = SessionConfig {
            timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        };
        let mut held: Option<Message> = None;
        let (mut session, device) = harness(
            config,
            Box::new(move |req: &Message| {
                // Withhold the first reply; send it ahead of the second.
                if req.signature == 0 {
                    held = Some(reply_to(req, 0x00, b"stale"));
                    Vec::new()
                } else {
                    let mut out: Vec<Message> = held.take().into_iter().collect();
                    out.push(reply_to(req, 0x00, b"fresh"));
                    out
                }
            }),
        );

        assert!(matches!(
            session.request(0xF3, Bytes::new()),
            Err(SessionError::Timeout(_))
        ));
        let reply = session.request(0xF3, Bytes::new()).unwrap();
        assert_eq!(reply.payload.as_ref(), b"fresh");
        assert_eq!(reply.signature, 1);

        finish(session, device);
    }

    #[test]
    fn unsolicited_reports_are_queued() {
        let (mut session, device) = harness(
            SessionConfig::default(),
            Box::new(|req: &Message| {
                vec![
                    Message::new(0x77, *UNSOLICITED_CODES.start())
                        .with_payload(vec![1, 0, 0, 100, 0, 0, 0]),
                    reply_to(req, 0x00, &[]),
                ]
            }),
        );

        session.request(0x45, vec![1]).unwrap();
        let report = session
            .recv_unsolicited(Duration::from_secs(1))
            .unwrap()
            .expect("report queued");
        assert_eq!(report.instruction, 0x0A);
        assert_eq!(report.signature, 0x77);
        assert!(session.try_recv_unsolicited().is_none());

        finish(session, device);
    }

    #[test]
    fn full_unsolicited_queue_drops_newest() {
        let config = SessionConfig {
            unsolicited_capacity: 1,
            ..SessionConfig::default()
        };
        let (mut session, device) = harness(
            config,
            Box::new(|req: &Message| {
                vec![
                    Message::new(1, 0x0A),
                    Message::new(2, 0x0B),
                    reply_to(req, 0x00, &[]),
                ]
            }),
        );

        session.request(0x45, vec![1]).unwrap();
        let first = session.try_recv_unsolicited().expect("first report kept");
        assert_eq!(first.signature, 1);
        assert!(session.try_recv_unsolicited().is_none());

        finish(session, device);
    }

    #[test]
    fn zero_capacity_still_queues_reports() {
        let config = SessionConfig {
            unsolicited_capacity: 0,
            ..SessionConfig::default()
        };
        let (mut session, device) = harness(
            config,
            Box::new(|req: &Message| vec![Message::new(9, 0x0C), reply_to(req, 0x00, &[])]),
        );

        // Nobody is receiving while the report arrives.
        session.request(0x45, vec![1]).unwrap();
        let report = session.try_recv_unsolicited().expect("report kept");
        assert_eq!(report.signature, 9);

        finish(session, device);
    }

    #[test]
    fn send_does_not_wait() {
        let (mut session, device) = harness(SessionConfig::default(), silent());

        let msg = Message::new(5, 0x45)
            .with_address(spinel_frame::BROADCAST_ADDRESS)
            .with_payload(vec![0]);
        session.send(&msg).unwrap();

        // Give the device a moment to read before the link closes.
        thread::sleep(Duration::from_millis(50));
        let seen = finish(session, device);
        assert_eq!(seen, vec![msg]);
    }

    #[test]
    fn requests_after_close_fail() {
        let (mut session, device) = harness(SessionConfig::default(), silent());
        session.close();
        assert!(!session.is_open());

        assert!(matches!(
            session.request(0xF3, Bytes::new()),
            Err(SessionError::Closed)
        ));
        assert!(matches!(
            session.recv_unsolicited(POLL),
            Err(SessionError::Closed)
        ));

        finish(session, device);
    }

    #[test]
    fn waiter_registered_after_reader_exit_is_refused() {
        let (mut session, device) = harness(SessionConfig::default(), silent());
        session.close();

        let (tx, _rx) = mpsc::sync_channel(1);
        assert!(matches!(
            session.shared.register(4, tx),
            Err(SessionError::Closed)
        ));
        assert!(session.shared.pending().is_empty());

        finish(session, device);
    }

    #[test]
    fn device_hangup_closes_session() {
        let (host, device) = UnixStream::pair().unwrap();
        host.set_read_timeout(Some(POLL)).unwrap();
        let reader = host.try_clone().unwrap();
        let mut session = DeviceSession::new(
            IoTransport::new(reader),
            IoTransport::new(host),
            SessionConfig::default(),
        )
        .unwrap();

        drop(device);
        // EOF stops the reader promptly.
        thread::sleep(Duration::from_millis(50));
        assert!(!session.is_open());
        assert!(matches!(
            session.request(0xF3, Bytes::new()),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn signature_allocation_skips_in_flight() {
        let (mut session, device) = harness(SessionConfig::default(), silent());
        {
            let (tx, _rx) = mpsc::sync_channel(1);
            session.shared.pending().insert(0, tx);
            let (tx, _rx) = mpsc::sync_channel(1);
            session.shared.pending().insert(1, tx);
        }
        assert_eq!(session.allocate_signature(), 2);
        assert_eq!(session.allocate_signature(), 3);
        session.shared.pending().clear();

        session.next_signature = u8::MAX;
        assert_eq!(session.allocate_signature(), u8::MAX);
        assert_eq!(session.allocate_signature(), 0);

        finish(session, device);
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Discard,
        Timeout(Duration),
    }

    struct RecordingTransport {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl ByteTransport for RecordingTransport {
        fn write_all(&mut self, _data: &[u8]) -> spinel_transport::Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> spinel_transport::Result<()> {
            Ok(())
        }

        fn read_byte(&mut self) -> spinel_transport::Result<Option<u8>> {
            thread::sleep(Duration::from_millis(1));
            Ok(None)
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> spinel_transport::Result<()> {
            self.calls.lock().unwrap().push(Call::Timeout(timeout));
            Ok(())
        }

        fn discard_input(&mut self) -> spinel_transport::Result<()> {
            self.calls.lock().unwrap().push(Call::Discard);
            Ok(())
        }
    }

    #[test]
    fn start_discards_stale_input_then_sets_poll_interval() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reader = RecordingTransport {
            calls: Arc::clone(&calls),
        };
        let config = SessionConfig {
            poll_interval: Some(Duration::from_millis(5)),
            ..SessionConfig::default()
        };
        let mut session = DeviceSession::new(
            reader,
            IoTransport::new(Cursor::new(Vec::<u8>::new())),
            config,
        )
        .unwrap();
        session.close();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Discard, Call::Timeout(Duration::from_millis(5))]
        );
    }

    #[test]
    fn default_config_leaves_read_timeout_alone() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reader = RecordingTransport {
            calls: Arc::clone(&calls),
        };
        let mut session = DeviceSession::new(
            reader,
            IoTransport::new(Cursor::new(Vec::<u8>::new())),
            SessionConfig::default(),
        )
        .unwrap();
        session.close();

        assert_eq!(*calls.lock().unwrap(), vec![Call::Discard]);
    }
}
