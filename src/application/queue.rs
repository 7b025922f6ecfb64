use crate::domain::payment::{PaymentRequest, Route};
use crate::error::{PaymentError, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Producer side of one bounded per-route queue.
///
/// Cloning shares the same queue. Ownership of a request passes to whoever
/// receives it; the queue never holds two copies of one request.
#[derive(Debug, Clone)]
pub struct PaymentQueue {
    route: Route,
    capacity: usize,
    sender: mpsc::Sender<PaymentRequest>,
}

/// Consumer side of a [`PaymentQueue`].
pub type QueueReceiver = mpsc::Receiver<PaymentRequest>;

/// Request handed back by [`PaymentQueue::try_enqueue`] along with the reason.
#[derive(Debug)]
pub struct Rejected {
    pub error: PaymentError,
    pub request: PaymentRequest,
}

impl PaymentQueue {
    pub fn bounded(route: Route, capacity: usize) -> (Self, QueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                route,
                capacity,
                sender,
            },
            receiver,
        )
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of requests waiting in the queue.
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for a free slot when the queue is full.
    pub async fn enqueue(&self, request: PaymentRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| PaymentError::QueueClosed(self.route))
    }

    /// Waits for a free slot and holds it. Dropping the permit releases the
    /// slot, so a cancelled wait leaves the queue untouched.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, PaymentRequest>> {
        self.sender
            .reserve()
            .await
            .map_err(|_| PaymentError::QueueClosed(self.route))
    }

    /// Fails immediately when the queue is full, returning the request.
    pub fn try_enqueue(&self, request: PaymentRequest) -> std::result::Result<(), Rejected> {
        self.sender.try_send(request).map_err(|e| match e {
            TrySendError::Full(request) => Rejected {
                error: PaymentError::QueueFull(self.route),
                request,
            },
            TrySendError::Closed(request) => Rejected {
                error: PaymentError::QueueClosed(self.route),
                request,
            },
        })
    }
}

/// The two route queues, created once by the dispatcher and handed out
/// explicitly to admission and the workers.
#[derive(Debug, Clone)]
pub struct DispatchQueues {
    pub primary: PaymentQueue,
    pub fallback: PaymentQueue,
}

impl DispatchQueues {
    pub fn bounded(capacity: usize) -> (Self, QueueReceiver, QueueReceiver) {
        let (primary, primary_rx) = PaymentQueue::bounded(Route::Primary, capacity);
        let (fallback, fallback_rx) = PaymentQueue::bounded(Route::Fallback, capacity);
        (Self { primary, fallback }, primary_rx, fallback_rx)
    }

    pub fn for_route(&self, route: Route) -> &PaymentQueue {
        match route {
            Route::Primary => &self.primary,
            Route::Fallback => &self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, CorrelationId};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use uuid::Uuid;

    fn request() -> PaymentRequest {
        PaymentRequest::admitted(
            CorrelationId::new(Uuid::new_v4()),
            Amount::new(dec!(5)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_try_enqueue_rejects_when_full() {
        let (queue, mut rx) = PaymentQueue::bounded(Route::Primary, 2);
        queue.try_enqueue(request()).unwrap();
        queue.try_enqueue(request()).unwrap();
        assert_eq!(queue.len(), 2);

        let extra = request();
        let id = extra.correlation_id;
        let rejected = queue.try_enqueue(extra).unwrap_err();
        assert!(matches!(rejected.error, PaymentError::QueueFull(Route::Primary)));
        assert_eq!(rejected.request.correlation_id, id);
        assert_eq!(queue.len(), 2);

        rx.recv().await.unwrap();
        assert_eq!(queue.len(), 1);
        queue.try_enqueue(request()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_blocks_until_slot_frees() {
        let (queue, mut rx) = PaymentQueue::bounded(Route::Fallback, 1);
        queue.enqueue(request()).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.enqueue(request())).await;
        assert!(blocked.is_err(), "enqueue on a full queue must wait");

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(request()).await })
        };
        rx.recv().await.unwrap();
        producer.await.unwrap().unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_on_closed_queue() {
        let (queue, rx) = PaymentQueue::bounded(Route::Primary, 1);
        drop(rx);
        assert!(matches!(
            queue.enqueue(request()).await,
            Err(PaymentError::QueueClosed(Route::Primary))
        ));
    }
}
