//! The acceptor thread: waits for the listening socket to become readable
//! and fans that readiness out to the worker pool as an "available" signal.
//! Also owns the manager's lifetime — it is started here and joined here.

use crate::server::manager;
use crate::server::shared::Shared;
use mio::net::TcpListener as MioListener;
use mio::{Events, Interest, Poll, Token};
use std::net::TcpListener;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

const LISTENER: Token = Token(0);

/// Runs until `shared.server_shutdown` is observed, then signals and joins
/// the manager (which in turn joins every worker) before returning.
pub(crate) fn run(shared: Arc<Shared>, listener: Arc<TcpListener>) {
    let manager_shared = shared.clone();
    let manager_listener = listener.clone();
    let manager_thread = thread::Builder::new()
        .name("threadweb-manager".into())
        .spawn(move || manager::run(manager_shared, manager_listener))
        .expect("failed to spawn manager thread");

    let mut poll = Poll::new().expect("failed to create mio poll");
    let mut events = Events::with_capacity(1);

    let cloned = listener
        .try_clone()
        .expect("failed to clone listener for the selector's poll registration");
    let mut mio_listener = MioListener::from_std(cloned);
    poll.registry()
        .register(&mut mio_listener, LISTENER, Interest::READABLE)
        .expect("failed to register listener with mio");

    while !shared.server_shutdown.load(Ordering::SeqCst) {
        match poll.poll(&mut events, Some(shared.server_limits.poll_interval)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                log::error!("selector poll failed: {err}");
                break;
            }
        }

        for event in &events {
            if event.token() != LISTENER || !event.is_readable() {
                continue;
            }

            // One readable event can mean several pending connections; signal
            // repeatedly until the bounded channel would block, giving each
            // worker a fair shot without the selector stalling indefinitely.
            while !shared.server_shutdown.load(Ordering::SeqCst) {
                let workers = shared.processes.load(Ordering::SeqCst).max(1);
                let budget = shared.server_limits.poll_interval / (workers as u32 + 1);
                match shared.available_sender().send_timeout((), budget) {
                    Ok(()) => break,
                    Err(crossbeam::channel::SendTimeoutError::Timeout(())) => continue,
                    Err(crossbeam::channel::SendTimeoutError::Disconnected(())) => break,
                }
            }
        }
    }

    shared.manager_shutdown.store(true, Ordering::SeqCst);
    let _ = manager_thread.join();
    shared.manager_shutdown.store(false, Ordering::SeqCst);
    shared.coordinator.clear();
}
