//! Routes frames received from the bus to the state store, pending waits and event subscribers
//!
//! The bus has no request/response pairing: a query is answered, if at all, by a report frame
//! that looks exactly like an unsolicited one. Callers wanting an answer register a wait for the
//! next report of a given kind *before* sending their query, every received event is first applied
//! to the state store, then resolves all matching waits, then gets broadcast to subscribers.

use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
    time::Duration,
};

use cec_protocol::{Event, EventKind, Frame, LogicalAddress};
use futures::{
    channel::oneshot,
    stream::{SplitSink, SplitStream},
    Future, SinkExt, StreamExt,
};
use pin_project::{pin_project, pinned_drop};
use tokio::sync::{broadcast, OwnedMutexGuard};

use super::{BusRequest, CecError, Transport};
use crate::{config::PortMapping, ingest, state::StateStore, utils::OwnedJoinHandle};

type Waiter = (u64, EventKind, Option<LogicalAddress>, oneshot::Sender<Event>);

#[derive(Default)]
struct Waiters {
    next_id: u64,
    pending: Vec<Waiter>,
}

impl Waiters {
    /// Hands `event` to every waiter interested in it
    fn resolve(&mut self, event: &Event) -> usize {
        let kind = event.kind();
        let source = event.source();
        let (matching, rest): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|(_, k, from, _)| *k == kind && from.map_or(true, |from| from == source));
        self.pending = rest;

        let count = matching.len();
        for (_, _, _, tx) in matching {
            // The waiter may have given up already
            let _ = tx.send(event.clone());
        }
        count
    }
}

/// Shared between the multiplexer and its receive task
struct Shared {
    waiters: Mutex<Waiters>,

    /// The sending side of the broadcast channel used for events, `None` once the transport closed
    event_tx: Mutex<Option<broadcast::Sender<Event>>>,

    /// Set once the transport is being closed on purpose
    stopping: AtomicBool,

    store: Arc<StateStore>,
    mapping: PortMapping,
}

impl Shared {
    fn ingest(&self, event: Event) {
        log::trace!("recv: {:?}", event);
        ingest::apply(&self.store, &self.mapping, &event);

        let resolved = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(&event);
        if resolved > 0 {
            log::trace!("{} report resolved {} waiter(s)", event.kind(), resolved);
        }

        if let Some(tx) = self
            .event_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            // Having no subscribers isn't an error
            let _ = tx.send(event);
        }
    }

    fn close(&self) {
        self.event_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        // Dropping the senders wakes every waiter with a closed transport error
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .clear();
    }
}

pub struct Multiplexer {
    shared: Arc<Shared>,

    /// Sink for sending requests, locked for the duration of multi-frame sequences
    write: Arc<tokio::sync::Mutex<Sender>>,

    #[allow(dead_code)]
    recv_task: OwnedJoinHandle<()>,
}

impl Multiplexer {
    pub fn new(transport: Transport, store: Arc<StateStore>, mapping: PortMapping) -> Arc<Self> {
        let (tx, rx) = transport.split();
        let (event_tx, _) = broadcast::channel::<Event>(64);

        let shared = Arc::new(Shared {
            waiters: Mutex::new(Waiters::default()),
            event_tx: Mutex::new(Some(event_tx)),
            stopping: AtomicBool::new(false),
            store,
            mapping,
        });

        let recv_task = {
            let shared = shared.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::recv_loop(&shared, rx).await {
                    let stopping = shared.stopping.load(Ordering::SeqCst);
                    log::log!(exit_level(stopping, &e), "recv loop exit: {}", e);
                }
                shared.close();
            })
            .into()
        };

        Arc::new(Self {
            shared,
            write: Arc::new(tokio::sync::Mutex::new(Sender { write: tx })),
            recv_task,
        })
    }

    async fn recv_loop(shared: &Shared, mut stream: SplitStream<Transport>) -> Result<(), CecError> {
        loop {
            let frame: Frame = stream.next().await.ok_or(CecError::TransportClosed)??;

            match Event::from_frame(frame) {
                Ok(event) => shared.ingest(event),
                Err(e) => log::warn!("dropping malformed frame: {}", e),
            }
        }
    }

    /// Registers interest in the next event of the given kind, optionally restricted to a single
    /// source. Must be called before sending the query that should trigger it.
    pub fn wait_for(&self, kind: EventKind, source: Option<LogicalAddress>) -> PendingEvent {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.shared.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let id = waiters.next_id;
        waiters.next_id += 1;
        waiters.pending.push((id, kind, source, tx));

        PendingEvent {
            shared: self.shared.clone(),
            id,
            kind,
            channel: rx,
        }
    }

    /// Number of registered waits that haven't been resolved or dropped yet
    pub fn pending_waits(&self) -> usize {
        self.shared
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .len()
    }

    /// Subscribes to every decoded event
    pub fn subscribe(&self) -> Result<broadcast::Receiver<Event>, CecError> {
        let event_tx = self.shared.event_tx.lock().unwrap_or_else(|e| e.into_inner());
        match event_tx.as_ref() {
            Some(tx) => Ok(tx.subscribe()),
            None => Err(CecError::TransportClosed),
        }
    }

    pub async fn send(&self, request: BusRequest) -> Result<(), CecError> {
        self.send_lock().await.send(request).await
    }

    /// Exclusive access to the sink, so a sequence of frames isn't interleaved with other callers
    pub async fn send_lock(&self) -> OwnedMutexGuard<Sender> {
        self.write.clone().lock_owned().await
    }

    /// Closes the transport, which ends the adapter session
    pub async fn stop(&self) -> Result<(), CecError> {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let mut sender = self.send_lock().await;
        sender.write.close().await
    }
}

/// A transport closing after [`Multiplexer::stop`] is the expected way for the session to end
fn exit_level(stopping: bool, error: &CecError) -> log::Level {
    match error {
        CecError::TransportClosed if stopping => log::Level::Debug,
        _ => log::Level::Error,
    }
}

pub struct Sender {
    write: SplitSink<Transport, BusRequest>,
}

impl Sender {
    pub async fn send(&mut self, request: BusRequest) -> Result<(), CecError> {
        log::trace!("send: {}", request.to_line());
        self.write.send(request).await
    }
}

/// Resolves with the next matching event. Dropping it unregisters the wait.
#[pin_project(PinnedDrop)]
pub struct PendingEvent {
    shared: Arc<Shared>,
    id: u64,
    kind: EventKind,
    #[pin]
    channel: oneshot::Receiver<Event>,
}

impl PendingEvent {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Waits for the event for at most `timeout`
    pub async fn timeout(self, timeout: Duration) -> Result<Event, CecError> {
        let expected = self.kind;
        tokio::time::timeout(timeout, self)
            .await
            .map_err(|_| CecError::Timeout { expected })?
    }
}

impl Future for PendingEvent {
    type Output = Result<Event, CecError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project()
            .channel
            .poll(cx)
            .map(|res| res.map_err(|_| CecError::TransportClosed))
    }
}

#[pinned_drop]
impl PinnedDrop for PendingEvent {
    fn drop(self: Pin<&mut Self>) {
        let id = self.id;
        self.shared
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .retain(|(waiter_id, ..)| *waiter_id != id);
    }
}

#[cfg(test)]
mod test {
    use cec_protocol::{AudioStatus, Command, PowerStatus};
    use futures::channel::mpsc;

    use super::*;
    use crate::utils::Combine;

    fn make() -> (
        Arc<Multiplexer>,
        Arc<StateStore>,
        mpsc::UnboundedReceiver<BusRequest>,
        mpsc::UnboundedSender<Result<Frame, CecError>>,
    ) {
        let (sink_tx, sink_rx) = mpsc::unbounded::<BusRequest>();
        let (stream_tx, stream_rx) = mpsc::unbounded::<Result<Frame, CecError>>();
        let sink_tx = sink_tx.sink_map_err(|_| CecError::TransportClosed);
        let transport = Box::pin(Combine::new(stream_rx, sink_tx)) as Transport;
        let store = Arc::new(StateStore::new());
        let mplex = Multiplexer::new(transport, store.clone(), PortMapping::default());
        (mplex, store, sink_rx, stream_tx)
    }

    fn frame(hex: &str) -> Result<Frame, CecError> {
        Ok(Frame::from_hex(hex).unwrap())
    }

    #[tokio::test]
    async fn test_wait_resolves_all() {
        let (mplex, store, mut sink_rx, stream_tx) = make();

        let first = mplex.wait_for(EventKind::AudioStatus, None);
        let second = mplex.wait_for(EventKind::AudioStatus, Some(LogicalAddress::AudioSystem));
        let power = mplex.wait_for(EventKind::PowerStatus, None);
        assert_eq!(mplex.pending_waits(), 3);

        let query = Command::GiveAudioStatus.to_frame(LogicalAddress::FreeUse, LogicalAddress::AudioSystem);
        mplex.send(BusRequest::Frame(query.clone())).await.unwrap();
        assert_eq!(sink_rx.next().await, Some(BusRequest::Frame(query)));

        stream_tx.unbounded_send(frame("50:7a:28")).unwrap();
        let expected = Event::ReportAudioStatus {
            source: LogicalAddress::AudioSystem,
            status: AudioStatus::new(40, false),
        };
        assert_eq!(first.await.unwrap(), expected);
        assert_eq!(second.await.unwrap(), expected);

        // The store is updated before waiters are woken up
        assert_eq!(store.audio(), Some(AudioStatus::new(40, false)));

        drop(power);
        assert_eq!(mplex.pending_waits(), 0);
    }

    #[tokio::test]
    async fn test_source_filter() {
        let (mplex, store, _sink_rx, stream_tx) = make();
        let tv = mplex.wait_for(EventKind::PowerStatus, Some(LogicalAddress::Tv));

        stream_tx.unbounded_send(frame("5e:90:00")).unwrap();
        stream_tx.unbounded_send(frame("0e:90:01")).unwrap();

        let event = tv.await.unwrap();
        assert_eq!(event.source(), LogicalAddress::Tv);
        assert_eq!(store.power(LogicalAddress::AudioSystem), PowerStatus::On);
        assert_eq!(store.power(LogicalAddress::Tv), PowerStatus::Standby);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (mplex, _store, _sink_rx, _stream_tx) = make();
        let pending = mplex.wait_for(EventKind::AudioStatus, None);
        let err = pending.timeout(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(
            err,
            CecError::Timeout {
                expected: EventKind::AudioStatus
            }
        ));
        assert_eq!(mplex.pending_waits(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_close() {
        let (mplex, _store, _sink_rx, stream_tx) = make();
        let mut events = mplex.subscribe().unwrap();
        let pending = mplex.wait_for(EventKind::AudioStatus, None);

        // Malformed frames are skipped
        stream_tx.unbounded_send(frame("50:7a")).unwrap();
        stream_tx.unbounded_send(frame("0f:82:11:42")).unwrap();
        assert_eq!(events.recv().await.unwrap().kind(), EventKind::ActiveSource);

        drop(stream_tx);
        assert!(matches!(pending.await, Err(CecError::TransportClosed)));
        tokio::task::yield_now().await;
        assert!(mplex.subscribe().is_err());
    }

    #[test]
    fn test_exit_level() {
        assert_eq!(exit_level(true, &CecError::TransportClosed), log::Level::Debug);
        assert_eq!(exit_level(false, &CecError::TransportClosed), log::Level::Error);
        assert_eq!(
            exit_level(true, &CecError::TransportFailure("gone".to_string())),
            log::Level::Error
        );
    }

    #[tokio::test]
    async fn test_stop() {
        let (mplex, _store, mut sink_rx, _stream_tx) = make();
        mplex.stop().await.unwrap();
        assert!(mplex.shared.stopping.load(Ordering::SeqCst));
        assert_eq!(sink_rx.next().await, None);
    }
}
