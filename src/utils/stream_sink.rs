use futures::{Sink, Stream};

/// Implemented for anything that is both a `Stream` and a `Sink`, so both halves can live behind a
/// single trait object
pub trait StreamSink<'a, StreamItem, SinkItem, SinkError>:
    Stream<Item = StreamItem> + Sink<SinkItem, Error = SinkError> + 'a
{
}

impl<'a, T, StreamItem, SinkItem, SinkError> StreamSink<'a, StreamItem, SinkItem, SinkError> for T where
    T: Stream<Item = StreamItem> + Sink<SinkItem, Error = SinkError> + 'a
{
}
