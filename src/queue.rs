use super::errors::PoolError;
use std::{
    fmt,
    sync::{PoisonError, RwLock},
    time::Duration,
};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};


/// Bounded FIFO queue shared by producers and worker threads.
///
/// Enqueueing never blocks: a full queue rejects the item and hands it
/// back. Dequeueing blocks until an item is available, and every item is
/// delivered to exactly one dequeuer.
///
/// Closing the queue drops the only sender. Items already queued can still
/// be dequeued; once the queue is drained every blocked dequeuer wakes up
/// with `None`.
pub struct BoundedWorkQueue<T> {
    sender: RwLock<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T: Send> BoundedWorkQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "queue capacity must be greater than zero".into(),
            ));
        }

        let (sender, receiver) = channel::bounded(capacity);
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            capacity,
        })
    }

    /// Appends `item` at the tail unless the queue is full or closed.
    #[inline]
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.try_send(item).map_err(TrySendError::into_inner),
            None => Err(item),
        }
    }

    /// Blocks until the head item can be taken. Returns `None` once the
    /// queue is closed and empty.
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Stops accepting new items. Calling it again is a no-op.
    pub fn close(&self) {
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.receiver.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for BoundedWorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedWorkQueue")
            .field("len", &self.receiver.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
