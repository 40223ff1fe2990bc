//! Transport base types for talking to the bus
//!
//! A [`Transport`] is a stream of frames received from the bus, combined with a sink accepting
//! [`BusRequest`]s. The stream is expected to skip the adapter's echo of our own frames.

use std::pin::Pin;

use async_trait::async_trait;
use cec_protocol::{EventKind, Frame, ParseError};
use thiserror::Error;

use crate::{config::BusConfig, utils::StreamSink};

pub type Transport =
    Pin<Box<dyn StreamSink<'static, Result<Frame, CecError>, BusRequest, CecError> + Send>>;

pub mod cec_client;
#[cfg(feature = "mock")]
pub mod mock;
pub mod multiplexer;
pub use multiplexer::Multiplexer;

/// Something written to the bus adapter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusRequest {
    /// A frame to transmit
    Frame(Frame),

    /// An adapter-level command, such as `scan`
    Raw(String),
}

impl BusRequest {
    /// The line written to the adapter's standard input
    pub fn to_line(&self) -> String {
        match self {
            BusRequest::Frame(frame) => format!("tx {}", frame.to_hex()),
            BusRequest::Raw(line) => line.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CecError {
    #[error("Transport error: {0}")]
    TransportFailure(String),

    #[error("Transport has closed")]
    TransportClosed,

    #[error("Timed out waiting for a {expected} report")]
    Timeout { expected: EventKind },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

impl CecError {
    pub fn invalid_target(what: impl ToString) -> Self {
        CecError::InvalidTarget(what.to_string())
    }
}

#[async_trait]
pub trait Openable {
    async fn open(&self) -> Result<Transport, CecError>;

    /// Short human readable description, used in logs
    fn describe(&self) -> String;
}

#[async_trait]
impl Openable for BusConfig {
    async fn open(&self) -> Result<Transport, CecError> {
        use crate::config::Backend;

        log::info!("opening bus: {}", self.describe());
        match self.backend {
            Backend::CecClient => Ok(Box::pin(cec_client::CecClientTransport::spawn(
                &self.command,
                &self.args,
                self.port.as_deref(),
            )?)),
            #[cfg(feature = "mock")]
            Backend::Mock => Ok(Box::pin(mock::MockTransport::default())),
            #[cfg(not(feature = "mock"))]
            Backend::Mock => Err(CecError::TransportFailure(
                "built without the mock bus".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        use crate::config::Backend;

        match self.backend {
            Backend::CecClient => format!(
                "{} {} {}",
                self.command,
                self.args.join(" "),
                self.port.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            Backend::Mock => "mock".to_string(),
        }
    }
}
