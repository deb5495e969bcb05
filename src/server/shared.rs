//! State shared by the selector, manager, and every worker thread.
//!
//! Everything here is reached through an `Arc<Shared>`; there is no per-role
//! copy. The "connection available" signal mirrors a bounded queue the
//! selector feeds and workers drain, sized to the listen backlog, so a burst
//! of ready sockets can outrun a momentarily busy worker pool without the
//! selector blocking indefinitely.

use crate::coordinator::Coordinator;
use crate::limits::{ReqLimits, RespLimits, ServerLimits};
use crate::routing::RouteTable;
use crate::server::tls::TlsConfig;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize};

/// Sentinel for [`Shared::worker_shutdown`] meaning "no worker is being
/// targeted for shutdown".
pub(crate) const NO_WORKER_SHUTDOWN: isize = -1;
/// Sentinel meaning "every worker should exit".
pub(crate) const ALL_WORKERS_SHUTDOWN: isize = -2;

pub(crate) struct Shared {
    pub(crate) routes: RouteTable,
    pub(crate) error_routes: RouteTable,
    pub(crate) coordinator: Coordinator,

    pub(crate) server_limits: ServerLimits,
    pub(crate) req_limits: ReqLimits,
    pub(crate) resp_limits: RespLimits,
    pub(crate) tls: TlsConfig,

    /// Requests currently held by some worker's local FIFO, across every
    /// worker. Drives the manager's grow/shrink decision.
    pub(crate) requests: AtomicUsize,
    /// Live worker count, kept in lockstep with the manager's worker list.
    pub(crate) processes: AtomicUsize,

    pub(crate) server_shutdown: AtomicBool,
    pub(crate) manager_shutdown: AtomicBool,
    /// `NO_WORKER_SHUTDOWN`, `ALL_WORKERS_SHUTDOWN`, or a specific worker index.
    pub(crate) worker_shutdown: AtomicIsize,

    /// Fed by the selector on a readable listener event, drained by workers
    /// before they attempt a non-blocking accept.
    available_tx: Sender<()>,
    available_rx: Receiver<()>,

    request_id_seq: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        routes: RouteTable,
        error_routes: RouteTable,
        server_limits: ServerLimits,
        req_limits: ReqLimits,
        resp_limits: RespLimits,
        tls: TlsConfig,
    ) -> Self {
        let (available_tx, available_rx) = bounded(server_limits.backlog as usize);
        Shared {
            routes,
            error_routes,
            coordinator: Coordinator::new(),
            server_limits,
            req_limits,
            resp_limits,
            tls,
            requests: AtomicUsize::new(0),
            processes: AtomicUsize::new(0),
            server_shutdown: AtomicBool::new(false),
            manager_shutdown: AtomicBool::new(false),
            worker_shutdown: AtomicIsize::new(NO_WORKER_SHUTDOWN),
            available_tx,
            available_rx,
            request_id_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn available_sender(&self) -> &Sender<()> {
        &self.available_tx
    }

    pub(crate) fn available_receiver(&self) -> &Receiver<()> {
        &self.available_rx
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.request_id_seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
