#![allow(dead_code)]
use std::sync::Arc;

use cecbridge::{
    config::{Config, VolumeConfig},
    transport::{mock::MockTransport, BusRequest, CecError, Transport},
    utils::{mock_device::MockBus, Combine},
    CecBridge, Frame,
};
use futures::{
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    pin_mut, Future, FutureExt, SinkExt, StreamExt,
};
use tokio::sync::Mutex;

/// Volume timings short enough to keep tests fast
pub fn fast_volume() -> VolumeConfig {
    VolumeConfig {
        near_delay_ms: 5,
        settle_delay_ms: 10,
        status_timeout_ms: 200,
        debounce_deadline_ms: 500,
        debounce_interval_ms: 5,
        ..Default::default()
    }
}

pub fn test_config() -> Config {
    Config {
        volume: fast_volume(),
        ..Default::default()
    }
}

/// Builds a bridge over a simulated bus, returning a handle to inspect and alter the bus
pub fn mock_bridge(bus: MockBus) -> (CecBridge, Arc<Mutex<MockBus>>) {
    let transport = MockTransport::new(bus);
    let bus = transport.bus.clone();
    let bridge = CecBridge::new(Box::pin(transport), test_config());
    (bridge, bus)
}

/// A bus where every request is checked against an expected line and answered with scripted
/// frames
pub struct TestBus {
    requests_rx: UnboundedReceiver<BusRequest>,
    frames_tx: UnboundedSender<Result<Frame, CecError>>,
}

impl TestBus {
    pub fn make_transport() -> (
        Transport,
        UnboundedReceiver<BusRequest>,
        UnboundedSender<Result<Frame, CecError>>,
    ) {
        let (requests_tx, requests_rx) = mpsc::unbounded::<BusRequest>();
        let (frames_tx, frames_rx) = mpsc::unbounded::<Result<Frame, CecError>>();

        let requests_tx = requests_tx.sink_map_err(|_| CecError::TransportClosed);
        let transport = Box::pin(Combine::new(frames_rx, requests_tx)) as Transport;

        (transport, requests_rx, frames_tx)
    }

    pub fn new(config: Config) -> (Self, CecBridge) {
        let (transport, requests_rx, frames_tx) = Self::make_transport();
        let bridge = CecBridge::new(transport, config);
        (
            Self {
                requests_rx,
                frames_tx,
            },
            bridge,
        )
    }

    /// Drives `fut` to completion. Each request it sends must match the next entry of `expect`
    /// (the adapter line, such as `tx E5:71`), and is answered with the associated frames.
    pub async fn run<T>(
        &mut self,
        fut: impl Future<Output = T>,
        expect: &[(&str, &[&str])],
    ) -> T {
        let fut = fut.fuse();
        pin_mut!(fut);
        let mut expect = expect.iter();

        loop {
            futures::select! {
                ret = &mut fut => {
                    // Requests sent right before returning are still queued
                    while let Ok(Some(request)) = self.requests_rx.try_next() {
                        self.answer(request, &mut expect).await;
                    }
                    assert!(expect.next().is_none(), "not every expected request was sent");
                    return ret;
                },
                request = self.requests_rx.next() => {
                    let request = request.expect("transport closed");
                    self.answer(request, &mut expect).await;
                }
            }
        }
    }

    async fn answer(
        &mut self,
        request: BusRequest,
        expect: &mut std::slice::Iter<'_, (&str, &[&str])>,
    ) {
        let (line, responses) = expect
            .next()
            .unwrap_or_else(|| panic!("unexpected request: {}", request.to_line()));
        assert_eq!(&request.to_line(), line);
        for response in responses.iter() {
            let frame = Frame::from_hex(response).unwrap();
            self.frames_tx.send(Ok(frame)).await.unwrap();
        }
    }

    /// Feeds an unsolicited frame, as if a device had sent it on its own
    pub async fn inject(&mut self, hex: &str) {
        self.frames_tx
            .send(Ok(Frame::from_hex(hex).unwrap()))
            .await
            .unwrap();
    }
}
