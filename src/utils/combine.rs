//! Joins a stream of received frames and a sink of outgoing requests into a single transport

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Sink, Stream};
use pin_project::pin_project;

/// Forwards `Stream` calls to `stream`, and `Sink` calls to `sink`
#[pin_project]
pub struct Combine<TStream, TSink> {
    #[pin]
    stream: TStream,
    #[pin]
    sink: TSink,
}

impl<TStream, TSink> Combine<TStream, TSink> {
    pub fn new(stream: TStream, sink: TSink) -> Self {
        Self { stream, sink }
    }

    pub fn into_parts(self) -> (TStream, TSink) {
        (self.stream, self.sink)
    }
}

impl<TStream: Stream, TSink> Stream for Combine<TStream, TSink> {
    type Item = TStream::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().stream.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

impl<TStream, TSink, Item> Sink<Item> for Combine<TStream, TSink>
where
    TSink: Sink<Item>,
{
    type Error = TSink::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Item) -> Result<(), Self::Error> {
        self.project().sink.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().sink.poll_close(cx)
    }
}

#[cfg(test)]
mod test {
    use futures::{channel::mpsc, SinkExt, StreamExt};

    use super::*;

    #[tokio::test]
    async fn test_loopback() {
        let (tx, rx) = mpsc::unbounded::<u8>();
        let mut combined = Combine::new(rx, tx);
        combined.send(4).await.unwrap();
        combined.send(2).await.unwrap();
        assert_eq!(combined.next().await, Some(4));
        assert_eq!(combined.next().await, Some(2));
    }
}
