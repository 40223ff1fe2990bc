use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use cec_protocol::Frame;
use futures::{channel::mpsc, pin_mut, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;

use super::{BusRequest, CecError, Transport};
use crate::utils::{mock_device::MockBus, Combine, OwnedJoinHandle};

/// Transport backed by a simulated bus running in a background task
pub struct MockTransport {
    pub bus: Arc<Mutex<MockBus>>,

    // Handle to the task answering requests
    #[allow(dead_code)]
    task: OwnedJoinHandle<()>,

    transport: Transport,
}

impl MockTransport {
    pub fn new(bus: MockBus) -> Self {
        let bus = Arc::new(Mutex::new(bus));
        let (requests_tx, requests_rx) = mpsc::unbounded::<BusRequest>();
        let (frames_tx, frames_rx) = mpsc::unbounded::<Frame>();
        let task = tokio::spawn(Self::task(bus.clone(), requests_rx, frames_tx)).into();

        let requests_tx = requests_tx.sink_map_err(|_| CecError::TransportClosed);
        let frames_rx = frames_rx.map(Ok::<_, CecError>);
        let transport = Box::pin(Combine::new(frames_rx, requests_tx)) as Transport;

        Self {
            bus,
            task,
            transport,
        }
    }

    async fn task(
        bus: Arc<Mutex<MockBus>>,
        requests_rx: impl Stream<Item = BusRequest>,
        frames_tx: impl Sink<Frame>,
    ) {
        pin_mut!(requests_rx);
        pin_mut!(frames_tx);

        while let Some(request) = requests_rx.next().await {
            let (frames, delay) = {
                let mut bus = bus.lock().await;
                (bus.execute(&request), bus.response_delay)
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            for frame in frames {
                if frames_tx.send(frame).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(MockBus::default())
    }
}

impl Stream for MockTransport {
    type Item = Result<Frame, CecError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.transport.as_mut().poll_next(cx)
    }
}

impl Sink<BusRequest> for MockTransport {
    type Error = CecError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.as_mut().poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: BusRequest) -> Result<(), Self::Error> {
        self.transport.as_mut().start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.as_mut().poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.transport.as_mut().poll_close(cx)
    }
}
