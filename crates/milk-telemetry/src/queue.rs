use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO hand-off between a read loop and a poller.
///
/// Safe for one producer and one consumer on different threads; each operation
/// takes the internal lock once, so a drain never observes half of a push.
#[derive(Debug)]
pub struct SampleQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for SampleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SampleQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Take everything queued, oldest first.
    pub fn drain_all(&self) -> Vec<T> {
        self.inner.lock().drain(..).collect()
    }

    /// Empty the queue and keep only the newest item.
    pub fn drain_latest(&self) -> Option<T> {
        let mut q = self.inner.lock();
        let latest = q.pop_back();
        q.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
