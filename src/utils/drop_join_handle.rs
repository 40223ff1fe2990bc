use std::{
    future::Future,
    ops::Deref,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::JoinHandle;

/// A task handle aborting its task once dropped, so background loops don't outlive their owner
pub struct OwnedJoinHandle<T>(JoinHandle<T>);

impl<T> OwnedJoinHandle<T> {
    pub fn new(inner: JoinHandle<T>) -> Self {
        Self(inner)
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl<T> Deref for OwnedJoinHandle<T> {
    type Target = JoinHandle<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Drop for OwnedJoinHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> From<JoinHandle<T>> for OwnedJoinHandle<T> {
    fn from(inner: JoinHandle<T>) -> Self {
        Self::new(inner)
    }
}

impl<T> Future for OwnedJoinHandle<T> {
    type Output = Result<T, tokio::task::JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}
