//! One worker thread: a private FIFO of in-flight connections, cycled to
//! completion or requeued, fed by the shared "connection available" signal.

use crate::server::connection::{run_cycle, Connection, CycleOutcome, Stream};
use crate::server::shared::{Shared, ALL_WORKERS_SHUTDOWN};
use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// One entry in a worker's local FIFO.
struct Slot {
    conn: Connection,
    initial_timeout: Option<Duration>,
    /// Mirrors the source's "already handled" flag: `false` means this slot
    /// is a lock-wait retry and should sleep a beat before its next attempt.
    already_handled: bool,
}

/// Runs this worker's main loop until told to shut down, either by name (its
/// own index) or globally. Never returns early on a transient error; only a
/// shutdown signal or a fatal listener error ends the loop.
pub(crate) fn run(shared: Arc<Shared>, listener: Arc<TcpListener>, worker_id: usize) {
    let mut queue: VecDeque<Slot> = VecDeque::new();
    let available = shared.available_receiver();

    loop {
        let target = shared.worker_shutdown.load(Ordering::SeqCst);
        if target == ALL_WORKERS_SHUTDOWN || target == worker_id as isize {
            break;
        }

        // Mirrors the source's `get(block=queue.empty(), poll_interval)`:
        // block waiting for a signal only when there's nothing local to do
        // already; otherwise just peek without waiting.
        let signaled = if queue.is_empty() {
            available
                .recv_timeout(shared.server_limits.poll_interval)
                .is_ok()
        } else {
            available.try_recv().is_ok()
        };

        if signaled {
            match accept_one(&listener, &shared) {
                Ok(Some(conn)) => {
                    queue.push_back(Slot {
                        conn,
                        initial_timeout: None,
                        already_handled: true,
                    });
                    shared.requests.fetch_add(1, Ordering::SeqCst);
                }
                Ok(None) => {}
                Err(_) => continue,
            }
        }

        let Some(mut slot) = queue.pop_front() else {
            continue;
        };

        if !slot.already_handled {
            std::thread::sleep(shared.server_limits.poll_interval);
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_cycle(&shared, worker_id, &mut slot.conn, slot.initial_timeout)
        }))
        .unwrap_or_else(|_| {
            log::error!("worker {worker_id} panicked handling a connection");
            CycleOutcome::Done { keep_alive: false }
        });

        match outcome {
            CycleOutcome::NotYetHandled => {
                slot.already_handled = false;
                queue.push_back(slot);
                shared.requests.fetch_add(1, Ordering::SeqCst);
            }
            CycleOutcome::Done { keep_alive: true } => {
                slot.initial_timeout = shared.server_limits.keepalive_timeout;
                slot.already_handled = true;
                queue.push_back(slot);
                shared.requests.fetch_add(1, Ordering::SeqCst);
            }
            CycleOutcome::Done { keep_alive: false } | CycleOutcome::PeerGone => {
                slot.conn.close();
            }
        }

        shared.requests.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Attempts a non-blocking accept. `Ok(None)` means no connection was
/// waiting (a spurious wakeup, or another worker got there first, or the TLS
/// handshake failed); `Err` means the listener itself is dead and this
/// worker should give up this iteration.
fn accept_one(listener: &TcpListener, shared: &Shared) -> std::io::Result<Option<Connection>> {
    match listener.accept() {
        Ok((stream, peer_addr)) => {
            let _ = stream.set_nodelay(true);
            let request_id = shared.next_request_id();

            match shared.tls.accept(stream) {
                Ok(stream) => Ok(Some(Connection::new(
                    stream as Box<dyn Stream>,
                    peer_addr,
                    request_id,
                ))),
                Err(err) => {
                    log::warn!("TLS handshake failed with {peer_addr}: {err}");
                    Ok(None)
                }
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
        Err(err) => Err(err),
    }
}
