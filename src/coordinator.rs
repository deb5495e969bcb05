//! Per-resource reader/writer coordinator.
//!
//! Readers (`GET`, `HEAD`, `OPTIONS` by default) may run concurrently against
//! the same resource. A writer excludes every other reader and writer, but
//! the same logical requester may re-enter its own write lock without
//! deadlocking (e.g. a handler that recurses into another route for the same
//! resource). Entries are created lazily on first acquire and dropped the
//! moment the last holder releases, so an idle server holds no coordinator
//! state at all.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Identity of the requester that currently owns a resource as a writer.
///
/// Re-entrant acquisition is recognized by equality of this pair, not by any
/// per-language object identity trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OwnerId {
    pub(crate) worker_id: usize,
    pub(crate) request_id: u64,
}

struct Entry {
    readers: usize,
    /// Set the instant a writer starts waiting to drain readers, not only
    /// once it's confirmed ownership — this is what turns away new readers
    /// (see the reader path's `writer.is_some()` check) while a writer's
    /// drain is still in flight. `processes == 0` is what distinguishes a
    /// not-yet-confirmed hold from a confirmed one; see `acquire`.
    writer: Option<OwnerId>,
    /// Re-entrant acquisitions by `writer`, balanced 1:1 against releases.
    /// Zero while a writer is still draining readers and hasn't yet
    /// confirmed ownership.
    processes: usize,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.readers == 0 && self.processes == 0 && self.writer.is_none()
    }
}

/// The delay between polls while a writer waits for in-flight readers to
/// drain off a resource it intends to take.
const DRAIN_POLL_DELAY: Duration = Duration::from_millis(50);

pub(crate) struct Coordinator {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Coordinator {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to acquire `resource` for `owner`. Non-blocking for readers;
    /// for writers, blocks internally (polling, not spinning) only to drain
    /// readers already in flight once no other writer stands in the way.
    ///
    /// Returns `true` on success. A re-entrant writer acquire (same `owner`
    /// already holding the write lock) always succeeds immediately and only
    /// increments the process counter once ownership is confirmed.
    pub(crate) fn acquire(&self, owner: OwnerId, resource: &str, writer: bool) -> bool {
        if !writer {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(resource.to_string()).or_insert(Entry {
                readers: 0,
                writer: None,
                processes: 0,
            });
            if entry.writer.is_some() {
                if entry.is_empty() {
                    entries.remove(resource);
                }
                return false;
            }
            entry.readers += 1;
            return true;
        }

        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(resource.to_string()).or_insert(Entry {
            readers: 0,
            writer: None,
            processes: 0,
        });

        // Re-entrant fast path: only a *confirmed* hold (processes > 0)
        // counts. A writer still draining readers has recorded itself as
        // `writer` but left `processes` at zero precisely so this check
        // cannot be mistaken for an already-held lock — otherwise a nested
        // acquire from the same owner mid-drain would return `true` while
        // readers are still active, violating `readers > 0 => no writer`.
        if entry.writer == Some(owner) && entry.processes > 0 {
            entry.processes += 1;
            return true;
        }

        if entry.writer.is_some() {
            // Another writer holds, or is itself mid-drain, toward ownership.
            if entry.is_empty() {
                entries.remove(resource);
            }
            return false;
        }

        if entry.readers == 0 {
            entry.writer = Some(owner);
            entry.processes = 1;
            return true;
        }

        // Readers present: record ourselves as the pending writer so the
        // reader path's `writer.is_some()` check turns away new readers,
        // then poll until the existing readers drain off. `processes` stays
        // zero the whole time, so a concurrent re-entrant acquire from this
        // same owner can't take the fast path above until drain completes.
        entry.writer = Some(owner);
        drop(entries);

        loop {
            thread::sleep(DRAIN_POLL_DELAY);
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.get_mut(resource).expect("entry removed mid-wait");
            if entry.readers == 0 {
                entry.processes = 1;
                return true;
            }
            drop(entries);
        }
    }

    /// Releases `resource`, removing the entry once both counters reach zero.
    /// Releasing a resource that isn't held is a programmer error.
    pub(crate) fn release(&self, resource: &str, writer: bool) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(resource) else {
            panic!("release of unheld resource {resource:?}");
        };

        if writer {
            if entry.processes == 0 {
                panic!("release of unheld write lock on {resource:?}");
            }
            entry.processes -= 1;
            if entry.processes == 0 {
                entry.writer = None;
            }
        } else {
            if entry.readers == 0 {
                panic!("release of unheld read lock on {resource:?}");
            }
            entry.readers -= 1;
        }

        if entry.is_empty() {
            entries.remove(resource);
        }
    }

    /// Evicts every entry owned (as writer) by a dead worker, called by the
    /// manager once it has observed the worker's death.
    pub(crate) fn clean(&self, worker_id: usize) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.writer.map(|o| o.worker_id) != Some(worker_id));
    }

    /// Drops every held lock, called once the selector has joined the
    /// manager and every worker on server shutdown.
    pub(crate) fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, resource: &str) -> bool {
        self.entries.lock().unwrap().contains_key(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn owner(worker_id: usize, request_id: u64) -> OwnerId {
        OwnerId {
            worker_id,
            request_id,
        }
    }

    #[test]
    fn readers_run_concurrently() {
        let c = Coordinator::new();
        assert!(c.acquire(owner(1, 1), "/a", false));
        assert!(c.acquire(owner(2, 2), "/a", false));
        c.release("/a", false);
        c.release("/a", false);
        assert!(!c.contains("/a"));
    }

    #[test]
    fn writer_excludes_reader() {
        let c = Coordinator::new();
        assert!(c.acquire(owner(1, 1), "/a", true));
        assert!(!c.acquire(owner(2, 2), "/a", false));
        c.release("/a", true);
        assert!(!c.contains("/a"));
    }

    #[test]
    fn writer_excludes_other_writer() {
        let c = Coordinator::new();
        assert!(c.acquire(owner(1, 1), "/a", true));
        assert!(!c.acquire(owner(2, 2), "/a", true));
        c.release("/a", true);
    }

    #[test]
    fn reentrant_writer_balances_with_releases() {
        let c = Coordinator::new();
        let o = owner(1, 1);
        assert!(c.acquire(o, "/a", true));
        assert!(c.acquire(o, "/a", true));
        assert!(c.acquire(o, "/a", true));
        assert!(c.contains("/a"));
        c.release("/a", true);
        assert!(c.contains("/a"));
        c.release("/a", true);
        assert!(c.contains("/a"));
        c.release("/a", true);
        assert!(!c.contains("/a"));
    }

    #[test]
    fn entry_absent_once_all_holders_release() {
        let c = Coordinator::new();
        assert!(c.acquire(owner(1, 1), "/x", false));
        assert!(c.acquire(owner(2, 2), "/x", false));
        c.release("/x", false);
        assert!(c.contains("/x"));
        c.release("/x", false);
        assert!(!c.contains("/x"));
    }

    #[test]
    fn clean_evicts_dead_workers_writer_entries() {
        let c = Coordinator::new();
        assert!(c.acquire(owner(7, 100), "/a", true));
        c.clean(7);
        assert!(!c.contains("/a"));
    }

    #[test]
    #[should_panic(expected = "release of unheld resource")]
    fn release_unheld_resource_panics() {
        let c = Coordinator::new();
        c.release("/nope", false);
    }

    /// Regression test: a writer waiting to drain an in-flight reader must
    /// not return `true` (directly, or via a nested same-owner acquire)
    /// until that reader has actually released. Holding the reader past
    /// `DRAIN_POLL_DELAY` forces the writer to observe `readers > 0` on at
    /// least one poll before it can possibly succeed.
    #[test]
    fn writer_waits_for_active_reader_to_drain_before_granting_lock() {
        let c = Arc::new(Coordinator::new());
        let reader = owner(1, 1);
        let writer = owner(2, 2);

        assert!(c.acquire(reader, "/a", false));

        let writer_holds = Arc::new(AtomicBool::new(false));
        let c2 = c.clone();
        let writer_holds2 = writer_holds.clone();
        let handle = thread::spawn(move || {
            assert!(c2.acquire(writer, "/a", true));
            writer_holds2.store(true, Ordering::SeqCst);
        });

        thread::sleep(DRAIN_POLL_DELAY * 3);
        assert!(
            !writer_holds.load(Ordering::SeqCst),
            "writer must not hold the lock while a reader is still active"
        );
        // Same owner, still mid-drain: must not take the re-entrant fast
        // path while readers > 0 (this is what the original bug did).
        assert!(!c.acquire(writer, "/a", true));

        c.release("/a", false);
        handle.join().unwrap();
        assert!(writer_holds.load(Ordering::SeqCst));

        c.release("/a", true);
        assert!(!c.contains("/a"));
    }
}
