//! Server-sent event stream for one subscriber.
//!
//! The stream ends when the subscriber's queue closes (eviction) or when
//! shutdown is signalled. Dropping it, for any reason including the peer
//! going away, deregisters the subscriber.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::sse::Event;
use futures::Stream;
use pin_project_lite::pin_project;
use sensorcast_core::SubscriberId;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::info;

use crate::service::{BroadcastService, Subscription};

/// Removes the subscriber from the registry when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard {
    service: Arc<BroadcastService>,
    id: SubscriberId,
}

impl SubscriptionGuard {
    /// Guard `id` on `service`.
    pub fn new(service: Arc<BroadcastService>, id: SubscriberId) -> Self {
        Self { service, id }
    }

    /// The guarded subscriber.
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let _ = self.service.unsubscribe(&self.id);
        info!(
            subscriber_id = %self.id,
            client_count = self.service.subscriber_count(),
            "event stream closed"
        );
    }
}

pin_project! {
    /// Stream of SSE events fed by a subscriber queue.
    pub struct EventStream {
        inner: ReceiverStream<Arc<str>>,
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        done: bool,
        guard: SubscriptionGuard,
    }
}

impl EventStream {
    /// Wrap a subscription; `shutdown` ends the stream when cancelled.
    pub fn new(
        service: Arc<BroadcastService>,
        subscription: Subscription,
        shutdown: CancellationToken,
    ) -> Self {
        let Subscription { id, rx } = subscription;
        Self {
            inner: ReceiverStream::new(rx),
            cancelled: shutdown.cancelled_owned(),
            done: false,
            guard: SubscriptionGuard::new(service, id),
        }
    }

    /// The subscriber behind this stream.
    pub fn subscriber_id(&self) -> &SubscriberId {
        self.guard.id()
    }
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if this.cancelled.poll(cx).is_ready() {
            *this.done = true;
            return Poll::Ready(None);
        }
        match Pin::new(this.inner).poll_next(cx) {
            Poll::Ready(Some(payload)) => Poll::Ready(Some(Ok(Event::default().data(&*payload)))),
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
