use std::{path::PathBuf, sync::Arc};

use cec_protocol::Frame;
use futures::{pin_mut, StreamExt};
use tokio::sync::Mutex;

use crate::{
    transport::{BusRequest, Transport},
    utils::{self, decoder::Decoder, logger, recorder::Recorder},
};

/// Wraps a transport so its traffic is printed to stderr (`verbose` > 0) and/or recorded to a file
pub fn transport_logging(transport: Transport, verbose: u8, log: Option<PathBuf>) -> Transport {
    if verbose == 0 && log.is_none() {
        return transport;
    }

    let (log_tx, log_rx) =
        futures::channel::mpsc::unbounded::<utils::Message<BusRequest, Frame>>();
    let transport = logger(transport, log_tx);

    tokio::spawn(async move {
        let result = async move {
            let decoder = if verbose > 0 {
                use termcolor::{ColorChoice, StandardStream};
                let writer = StandardStream::stderr(ColorChoice::Auto);
                Some(Arc::new(Mutex::new(Decoder::new(
                    Box::new(writer),
                    verbose == 1,
                ))))
            } else {
                None
            };

            let mut recorder = match log {
                Some(filename) => Some(Recorder::new(tokio::fs::File::create(filename).await?)),
                _ => None,
            };

            pin_mut!(log_rx);

            while let Some(msg) = log_rx.next().await {
                match msg {
                    utils::Message::Sent(request) => {
                        if let Some(decoder) = &decoder {
                            decoder.lock().await.feed_sent(&request);
                        }
                        if let Some(recorder) = recorder.as_mut() {
                            recorder.feed_sent(&request);
                        }
                    }
                    utils::Message::Received(frame) => {
                        if let Some(decoder) = &decoder {
                            decoder.lock().await.feed_recv(&frame);
                        }
                        if let Some(recorder) = recorder.as_mut() {
                            recorder.feed_recv(&frame);
                        }
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        };

        if let Err(e) = result.await {
            log::error!("transport logging exiting: {}", e);
        }
    });

    Box::pin(transport)
}
