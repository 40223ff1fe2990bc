pub mod decoder;
pub mod recorder;

#[cfg(feature = "mock")]
pub mod mock_device;

mod err_into;
pub use err_into::ErrInto;
mod stream_sink;
pub use stream_sink::StreamSink;

mod logger;
pub use logger::{logger, Logger, Message};

mod drop_join_handle;
pub use drop_join_handle::OwnedJoinHandle;

mod combine;
pub use combine::Combine;
