use dnsreplay_domain::{Query, SendAs, Transport};
use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::active_list::{ActiveList, SlotId};
use super::connection::{Connection, ConnectionState, Progress};
use super::queue::{BoundedQueue, PopOutcome};
use super::stats::EngineStats;

/// Longest the engine waits for the queue lock before trying again later.
const POP_WAIT: Duration = Duration::from_micros(200);

/// Stands in for deadlines that do not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// State shared between a [`super::ClientPool`] handle and its engine thread.
pub(crate) struct PoolShared {
    pub(crate) queue: BoundedQueue<Query>,
    pub(crate) wake: Notify,
    pub(crate) shutdown: CancellationToken,
    pub(crate) stats: EngineStats,
}

impl PoolShared {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self {
            queue: BoundedQueue::new(queue_capacity),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            stats: EngineStats::default(),
        }
    }
}

/// Read-only engine configuration.
#[derive(Debug, Clone)]
pub(crate) struct EngineSettings {
    pub(crate) target: SocketAddr,
    pub(crate) max_clients: usize,
    pub(crate) client_ttl: Duration,
    pub(crate) max_reuse_clients: usize,
    pub(crate) send_as: SendAs,
    pub(crate) skip_reply: bool,
    pub(crate) retry_interval: Duration,
}

struct ActiveSlot {
    reap: CancellationToken,
    closing: bool,
    deferred: bool,
}

/// Resolves with the connection and whether the TTL reaped it.
type Driver = LocalBoxFuture<'static, (SlotId, Connection, bool)>;

fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Single threaded event loop of one client pool.
///
/// Every busy connection is driven by its own future inside `drivers`; the
/// loop itself only reacts to four kinds of events: a driver finishing, the
/// TTL timer, the retry timer and queries becoming available.
pub(crate) struct Engine {
    settings: Arc<EngineSettings>,
    shared: Arc<PoolShared>,
    active: ActiveList<ActiveSlot>,
    drivers: FuturesUnordered<Driver>,
    idle: Vec<Connection>,
    retained: Option<Query>,
    ttl_deadline: Option<Instant>,
    retry_deadline: Option<Instant>,
    /// Set on stop: a query that still cannot connect after this is lost.
    give_up_at: Option<Instant>,
    query_signalled: bool,
    stopping: bool,
    finished: bool,
}

impl Engine {
    pub(crate) fn new(settings: Arc<EngineSettings>, shared: Arc<PoolShared>) -> Self {
        Self {
            settings,
            shared,
            active: ActiveList::new(),
            drivers: FuturesUnordered::new(),
            idle: Vec::new(),
            retained: None,
            ttl_deadline: None,
            retry_deadline: None,
            give_up_at: None,
            // pick up anything queued before the loop started
            query_signalled: true,
            stopping: false,
            finished: false,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(target: "network", target_addr = %self.settings.target, "client pool engine running");

        while !self.finished {
            let now = Instant::now();
            let ttl = self.ttl_deadline;
            let retry = self.retry_deadline;

            tokio::select! {
                biased;
                Some((slot, conn, reaped)) = self.drivers.next(), if !self.drivers.is_empty() => {
                    self.on_connection_event(slot, conn, reaped);
                }
                _ = self.shared.shutdown.cancelled(), if !self.stopping => self.on_stop(),
                _ = sleep_until(ttl.unwrap_or(now)), if ttl.is_some() => self.on_ttl_timeout(),
                _ = sleep_until(retry.unwrap_or(now)), if retry.is_some() => self.on_retry_timeout(),
                _ = std::future::ready(()), if self.query_signalled => self.on_query_available(),
                _ = self.shared.wake.notified() => self.query_signalled = true,
            }
        }

        self.shutdown();
    }

    fn on_query_available(&mut self) {
        self.query_signalled = false;

        if self.retry_deadline.is_some() {
            return;
        }
        if self.active.len() >= self.settings.max_clients {
            // a completion will signal again
            return;
        }

        let query = match self.retained.take() {
            Some(query) => query,
            None => match self.shared.queue.try_pop(POP_WAIT) {
                PopOutcome::Item(query) => query,
                PopOutcome::Empty => {
                    // reaped drivers still owe their byte counters
                    if self.stopping && self.active.is_empty() && self.drivers.is_empty() {
                        debug!(target: "network", "queue drained, client pool engine stopping");
                        self.finished = true;
                    }
                    return;
                }
                PopOutcome::Contended => {
                    self.query_signalled = true;
                    return;
                }
            },
        };

        self.dispatch(query);
        self.query_signalled = true;
    }

    fn dispatch(&mut self, query: Query) {
        let Some(transport) = self.settings.send_as.resolve(query.transport()) else {
            warn!(target: "network", "query without transport, lost");
            self.shared.stats.record_lost();
            return;
        };

        let query = match (transport, self.idle.pop()) {
            (Transport::Udp, Some(mut conn)) => match conn.reuse(query) {
                Ok(()) => {
                    self.shared.stats.record_reused();
                    debug!(
                        target: "network",
                        active = self.active.len(),
                        max = self.settings.max_clients,
                        uses = conn.uses(),
                        "reuse client"
                    );
                    let progress = conn.send();
                    self.after_send(conn, progress);
                    return;
                }
                Err(query) => {
                    self.close(conn);
                    query
                }
            },
            (_, Some(conn)) => {
                self.idle.push(conn);
                query
            }
            (_, None) => query,
        };

        let mut conn = match Connection::new(query, transport, self.settings.skip_reply) {
            Ok(conn) => conn,
            Err(e) => {
                error!(target: "network", error = %e, "unable to create client, query lost");
                self.shared.stats.record_lost();
                return;
            }
        };

        let progress = conn.connect(self.settings.target);
        match (progress, conn.state()) {
            (Progress::Pending(_), _) => {
                self.shared.stats.record_created();
                debug!(
                    target: "network",
                    active = self.active.len() + 1,
                    max = self.settings.max_clients,
                    "new client"
                );
                self.track(conn, false);
            }
            (Progress::Ready, ConnectionState::Connected) => {
                self.shared.stats.record_created();
                debug!(
                    target: "network",
                    active = self.active.len(),
                    max = self.settings.max_clients,
                    "new client"
                );
                let progress = conn.send();
                self.after_send(conn, progress);
            }
            (Progress::Ready, state) => {
                let error = conn.last_error().map(|e| e.to_string()).unwrap_or_default();
                let now = Instant::now();

                if self.give_up_at.is_some_and(|at| now >= at) {
                    warn!(
                        target: "network",
                        state = %state,
                        error = %error,
                        "unable to connect client while stopping, query lost"
                    );
                    self.shared.stats.record_lost();
                    return;
                }

                warn!(
                    target: "network",
                    state = %state,
                    error = %error,
                    retry_ms = self.settings.retry_interval.as_millis() as u64,
                    "unable to connect client, retrying query"
                );
                let mut retry_at = deadline_after(now, self.settings.retry_interval);
                if let Some(at) = self.give_up_at {
                    retry_at = retry_at.min(at);
                }
                self.retained = Some(conn.into_query());
                self.retry_deadline = Some(retry_at);
                self.shared.stats.record_retry();
            }
        }
    }

    fn after_send(&mut self, conn: Connection, progress: Progress) {
        match progress {
            Progress::Pending(_) => self.track(conn, false),
            Progress::Ready => self.finish(conn),
        }
    }

    fn on_connection_event(&mut self, slot: SlotId, mut conn: Connection, reaped: bool) {
        if reaped {
            // the TTL scan already removed the slot and counted the timeout
            self.finish(conn);
            self.query_signalled = true;
            return;
        }

        if conn.state() == ConnectionState::Connected {
            debug!(target: "network", "client connected");
            if let Progress::Pending(_) = conn.send() {
                self.rearm(slot, conn);
                return;
            }
        }

        if self.active.remove(slot).is_none() {
            warn!(target: "network", state = %conn.state(), "completion for unknown client");
        }
        if self.active.is_empty() {
            self.ttl_deadline = None;
        }

        self.finish(conn);
        self.query_signalled = true;
    }

    /// Dispatches on a connection that no longer waits on its socket.
    fn finish(&mut self, mut conn: Connection) {
        let (sent, received) = conn.take_io_counters();
        self.shared.stats.record_io(sent, received);

        match conn.state() {
            ConnectionState::Success => {
                self.shared.stats.record_success();
                debug!(target: "network", "client success");
                self.recycle(conn);
            }
            ConnectionState::Failed => {
                self.shared.stats.record_failed();
                debug!(target: "network", peer = ?conn.peer(), "client failed");
                self.close(conn);
            }
            ConnectionState::ErrnoError => {
                self.shared.stats.record_error();
                warn!(
                    target: "network",
                    errno = conn.errno().unwrap_or_default(),
                    error = %conn.last_error().map(|e| e.to_string()).unwrap_or_default(),
                    "client state errno"
                );
                self.close(conn);
            }
            ConnectionState::Closed => {
                debug!(target: "network", "client closed");
            }
            ConnectionState::Aborted => {
                debug!(target: "network", "client aborted");
            }
            state => {
                error!(target: "network", state = %state, "client in unexpected state, dropped");
            }
        }
    }

    fn recycle(&mut self, conn: Connection) {
        if conn.is_reusable() && self.idle.len() < self.settings.max_reuse_clients {
            self.idle.push(conn);
            self.shared.stats.observe_idle(self.idle.len());
        } else {
            self.close(conn);
        }
    }

    fn close(&mut self, mut conn: Connection) {
        self.shared.stats.record_closed();
        match conn.close() {
            Progress::Pending(_) => self.track(conn, true),
            Progress::Ready => {
                let (sent, received) = conn.take_io_counters();
                self.shared.stats.record_io(sent, received);
            }
        }
    }

    /// Appends a busy connection to the active list and starts driving it.
    fn track(&mut self, conn: Connection, closing: bool) {
        let now = Instant::now();
        let reap = CancellationToken::new();
        let slot = self.active.push_back(
            now,
            ActiveSlot {
                reap: reap.clone(),
                closing,
                deferred: false,
            },
        );
        self.spawn_driver(slot, conn, reap);

        if self.ttl_deadline.is_none() {
            self.ttl_deadline = Some(deadline_after(now, self.settings.client_ttl));
        }
        self.shared.stats.observe_active(self.active.len());
    }

    /// Keeps driving a connection that is still in the active list.
    fn rearm(&mut self, slot: SlotId, conn: Connection) {
        let reap = match self.active.get_mut(slot) {
            Some(entry) => entry.value.reap.clone(),
            None => {
                warn!(target: "network", "rearm for unknown client, dropped");
                return;
            }
        };
        self.spawn_driver(slot, conn, reap);
    }

    fn spawn_driver(&mut self, slot: SlotId, mut conn: Connection, reap: CancellationToken) {
        let driver = async move {
            let reaped = tokio::select! {
                biased;
                _ = reap.cancelled() => true,
                _ = conn.drive() => false,
            };
            if reaped {
                conn.abort();
            }
            (slot, conn, reaped)
        };
        self.drivers.push(driver.boxed_local());
    }

    fn on_ttl_timeout(&mut self) {
        self.ttl_deadline = None;
        let now = Instant::now();
        let ttl = self.settings.client_ttl;

        // every entry is visited at most once
        let mut budget = self.active.len();
        while budget > 0 {
            budget -= 1;

            let Some((slot, started, closing, deferred)) = self
                .active
                .front()
                .map(|(slot, e)| (slot, e.started, e.value.closing, e.value.deferred))
            else {
                break;
            };
            if deadline_after(started, ttl) > now {
                break;
            }

            if closing && !deferred {
                if let Some(entry) = self.active.get_mut(slot) {
                    entry.value.deferred = true;
                }
                self.active.move_to_back(slot, now);
                debug!(target: "network", "client closing at timeout, deferred");
                continue;
            }

            if let Some((_, entry)) = self.active.pop_front() {
                entry.value.reap.cancel();
                self.shared.stats.record_timeout();
                debug!(target: "network", closing, "client timeout");
            }
        }

        if let Some((_, oldest)) = self.active.front() {
            self.ttl_deadline = Some(deadline_after(oldest.started, ttl));
        }
        self.query_signalled = true;
    }

    fn on_retry_timeout(&mut self) {
        self.retry_deadline = None;
        debug!(target: "network", "retry timer fired");
        self.query_signalled = true;
    }

    fn on_stop(&mut self) {
        debug!(target: "network", active = self.active.len(), "client pool stop requested");
        self.stopping = true;

        // a query held back for retry gets one more TTL to connect
        let give_up_at = deadline_after(Instant::now(), self.settings.client_ttl);
        self.give_up_at = Some(give_up_at);
        if let Some(retry) = self.retry_deadline {
            self.retry_deadline = Some(retry.min(give_up_at));
        }
        self.query_signalled = true;
    }

    fn shutdown(&mut self) {
        for (_, entry) in self.active.drain() {
            entry.value.reap.cancel();
        }
        self.drivers.clear();

        let idle = self.idle.len();
        for mut conn in self.idle.drain(..) {
            conn.close();
        }
        if self.retained.take().is_some() {
            self.shared.stats.record_lost();
        }
        self.shared.queue.close();

        debug!(target: "network", idle, "client pool engine exited");
    }
}
