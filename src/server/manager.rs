//! Supervises the worker pool: spawns the initial set, restarts any that
//! die, and grows or shrinks the pool in response to sustained load.

use crate::server::shared::{Shared, ALL_WORKERS_SHUTDOWN, NO_WORKER_SHUTDOWN};
use crate::server::worker;
use std::net::TcpListener;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn spawn_worker(shared: Arc<Shared>, listener: Arc<TcpListener>, idx: usize) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("threadweb-worker-{idx}"))
        .spawn(move || worker::run(shared, listener, idx))
        .expect("failed to spawn worker thread")
}

/// Runs the manager loop until `shared.manager_shutdown` is set, then tears
/// every worker down before returning. Called on the selector's own thread,
/// blocking it until the manager itself exits.
pub(crate) fn run(shared: Arc<Shared>, listener: Arc<TcpListener>) {
    shared.processes.store(0, Ordering::SeqCst);
    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    for idx in 0..shared.server_limits.num_processes {
        workers.push(spawn_worker(shared.clone(), listener.clone(), idx));
        shared.processes.fetch_add(1, Ordering::SeqCst);
    }

    while !shared.manager_shutdown.load(Ordering::SeqCst) {
        for idx in 0..workers.len() {
            if workers[idx].is_finished() {
                log::warn!("worker {idx} died: cleaning its locks and starting another in its place");
                shared.coordinator.clean(idx);
                // Swap in a placeholder so we can join the dead handle without
                // borrowing `workers` mutably twice.
                let dead = std::mem::replace(&mut workers[idx], spawn_worker(shared.clone(), listener.clone(), idx));
                let _ = dead.join();
            }
        }

        if let Some(max_queue) = shared.server_limits.max_queue {
            let requests = shared.requests.load(Ordering::SeqCst);
            let at_ceiling = workers.len() >= shared.server_limits.max_processes;
            if requests >= max_queue && !at_ceiling {
                let idx = workers.len();
                workers.push(spawn_worker(shared.clone(), listener.clone(), idx));
                shared.processes.fetch_add(1, Ordering::SeqCst);
            } else if workers.len() > shared.server_limits.num_processes && requests == 0 {
                let idx = workers.len() - 1;
                shared.worker_shutdown.store(idx as isize, Ordering::SeqCst);
                if let Some(handle) = workers.pop() {
                    let _ = handle.join();
                }
                shared.processes.fetch_sub(1, Ordering::SeqCst);
                shared.worker_shutdown.store(NO_WORKER_SHUTDOWN, Ordering::SeqCst);
            }
        }

        thread::sleep(shared.server_limits.poll_interval);
    }

    shared.worker_shutdown.store(ALL_WORKERS_SHUTDOWN, Ordering::SeqCst);
    for handle in workers {
        let _ = handle.join();
    }
    shared.worker_shutdown.store(NO_WORKER_SHUTDOWN, Ordering::SeqCst);
    shared.processes.store(0, Ordering::SeqCst);
}
