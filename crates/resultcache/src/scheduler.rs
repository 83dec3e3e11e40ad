//! Background removal of entries whose residency has expired.

use crate::fingerprint::QueryFingerprint;
use crate::stats::CacheStats;
use crate::store::ResultStore;
use parking_lot::{Condvar, Mutex};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// A pending removal. Ordered by deadline, with the insertion sequence
/// breaking ties so ordering is total.
struct Removal {
    deadline: Instant,
    seq: u64,
    key: QueryFingerprint,
}

impl PartialEq for Removal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Removal {}

impl PartialOrd for Removal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Removal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct TimerQueue {
    heap: BinaryHeap<Reverse<Removal>>,
    next_seq: u64,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<TimerQueue>,
    wakeup: Condvar,
}

/// Min-heap timer serviced by one worker thread.
///
/// The worker sleeps until the earliest deadline and re-peeks after every
/// wakeup, since `schedule` may have pushed an earlier deadline in the
/// meantime. Store removal happens with the queue lock released, so the
/// store lock is never nested inside the scheduler lock. Stale deadlines
/// (for entries already evicted or rewritten) are harmless: removal is
/// idempotent.
pub(crate) struct RemovalScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl RemovalScheduler {
    pub fn new(store: Arc<ResultStore>, stats: Arc<CacheStats>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TimerQueue {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("resultcache-removal".into())
            .spawn(move || Self::run(worker_shared, store, stats))
            .expect("failed to spawn cache removal thread");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Schedules `key` for removal at `now + delay`, waking the worker when
    /// the new deadline becomes the earliest.
    pub fn schedule(&self, delay: Duration, key: QueryFingerprint) {
        let deadline = Instant::now() + delay;
        let mut queue = self.shared.queue.lock();
        let preempts = queue
            .heap
            .peek()
            .map_or(true, |Reverse(head)| deadline < head.deadline);
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Reverse(Removal { deadline, seq, key }));
        drop(queue);
        if preempts {
            self.shared.wakeup.notify_one();
        }
    }

    /// Stops the worker. Pending removals are discarded; the entries they
    /// covered fall to weight pressure instead.
    pub fn stop(&self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wakeup.notify_one();
    }

    fn run(shared: Arc<Shared>, store: Arc<ResultStore>, stats: Arc<CacheStats>) {
        let mut queue = shared.queue.lock();
        loop {
            if queue.shutdown {
                break;
            }
            let deadline = match queue.heap.peek() {
                Some(Reverse(head)) => head.deadline,
                None => {
                    shared.wakeup.wait(&mut queue);
                    continue;
                }
            };
            if deadline <= Instant::now() {
                let expired = match queue.heap.pop() {
                    Some(Reverse(removal)) => removal,
                    None => continue,
                };
                drop(queue);
                if store.remove(&expired.key) {
                    stats.record_expiration();
                    debug!("removed expired query result");
                }
                queue = shared.queue.lock();
            } else {
                shared.wakeup.wait_until(&mut queue, deadline);
            }
        }
    }
}

impl Drop for RemovalScheduler {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
