use crate::{
    AmqError, AmqResult,
    commands::{Command, CommandBody},
    conn::{BrokerUri, CompositeUri},
    transport::{Transport, TransportListener, factory, failover::ConnectionStateTracker},
};
use rand::seq::SliceRandom;
use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// The failover layer's knobs, all settable through the composite URI's
/// outer query string.
#[derive(Clone, Debug)]
pub struct FailoverConfig {
    pub randomize: bool,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub use_exponential_backoff: bool,
    pub backoff_multiplier: f64,
    pub max_reconnect_attempts: i32,
    pub startup_max_reconnect_attempts: i32,
    pub backup: bool,
    pub backup_pool_size: usize,
    pub track_messages: bool,
    pub max_cache_size: usize,
    pub timeout: i64,
    pub priority_backup: bool,
    pub priority_uris: Vec<BrokerUri>,
    pub update_uris_supported: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            randomize: true,
            initial_reconnect_delay: Duration::from_millis(10),
            max_reconnect_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
            backoff_multiplier: 2.0,
            max_reconnect_attempts: -1,
            startup_max_reconnect_attempts: 0,
            backup: false,
            backup_pool_size: 1,
            track_messages: false,
            max_cache_size: 131_072,
            timeout: -1,
            priority_backup: false,
            priority_uris: Vec::new(),
            update_uris_supported: true,
        }
    }
}

impl FailoverConfig {
    #[allow(clippy::cast_sign_loss)]
    pub fn from_composite(uri: &CompositeUri) -> AmqResult<Self> {
        let d = Self::default();
        let priority_uris = match uri.option("priorityURIs") {
            Some(list) => list
                .split(',')
                .filter(|u| !u.trim().is_empty())
                .map(|u| BrokerUri::parse(u.trim()))
                .collect::<AmqResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            randomize: uri.bool_option("randomize", d.randomize),
            initial_reconnect_delay: Duration::from_millis(
                uri.i64_option("initialReconnectDelay", 10).max(0) as u64,
            ),
            max_reconnect_delay: Duration::from_millis(
                uri.i64_option("maxReconnectDelay", 30_000).max(0) as u64,
            ),
            use_exponential_backoff: uri
                .bool_option("useExponentialBackOff", d.use_exponential_backoff),
            backoff_multiplier: uri.f64_option("backOffMultiplier", d.backoff_multiplier),
            max_reconnect_attempts: uri
                .i32_option("maxReconnectAttempts", d.max_reconnect_attempts),
            startup_max_reconnect_attempts: uri.i32_option(
                "startupMaxReconnectAttempts",
                d.startup_max_reconnect_attempts,
            ),
            backup: uri.bool_option("backup", d.backup),
            backup_pool_size: uri.i32_option("backupPoolSize", 1).max(0) as usize,
            track_messages: uri.bool_option("trackMessages", d.track_messages),
            max_cache_size: uri.i32_option("maxCacheSize", 131_072).max(0) as usize,
            timeout: uri.i64_option("timeout", d.timeout),
            priority_backup: uri.bool_option("priorityBackup", d.priority_backup),
            priority_uris,
            update_uris_supported: uri
                .bool_option("updateURIsSupported", d.update_uris_supported),
        })
    }
}

struct ConnectedTransport {
    transport: Arc<dyn Transport>,
    uri: BrokerUri,
    generation: u64,
    priority: bool,
}

struct BackupTransport {
    transport: Arc<dyn Transport>,
    uri: BrokerUri,
}

#[derive(Default)]
struct FailoverState {
    uris: Vec<BrokerUri>,
    connected: Option<ConnectedTransport>,
    backups: Vec<BackupTransport>,
    generation: u64,
    attempts: i32,
    delay: Duration,
    first_connection_done: bool,
    terminal_failure: bool,
}

/// A transport that multiplexes over a pool of broker URIs.
///
/// One background thread drives connection establishment, backoff, backup
/// maintenance and priority migration; callers block (bounded by the
/// configured `timeout`) while no broker is reachable, unless the state
/// tracker takes their command for replay.
pub struct FailoverTransport {
    shared: Arc<FailoverShared>,
    reconnect_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for FailoverTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "FailoverTransport {{ connected: {}, .. }}",
            self.is_connected()
        )
    }
}

struct FailoverShared {
    config: FailoverConfig,
    state: Mutex<FailoverState>,
    changed: Condvar,
    // its own lock, distinct from the state lock, so tracking cannot form a
    // lock cycle with the reconnect thread
    tracker: Mutex<ConnectionStateTracker>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl FailoverTransport {
    /// Builds the transport from a parsed `failover://(...)` URI.
    pub fn from_composite(uri: &CompositeUri) -> AmqResult<Arc<Self>> {
        let config = FailoverConfig::from_composite(uri)?;
        Ok(Self::new(uri.components.clone(), config))
    }

    pub fn new(uris: Vec<BrokerUri>, config: FailoverConfig) -> Arc<Self> {
        let tracker = ConnectionStateTracker::new(config.track_messages, config.max_cache_size);
        let state = FailoverState {
            uris: dedupe(uris),
            delay: config.initial_reconnect_delay,
            ..FailoverState::default()
        };
        Arc::new(Self {
            shared: Arc::new(FailoverShared {
                config,
                state: Mutex::new(state),
                changed: Condvar::new(),
                tracker: Mutex::new(tracker),
                listener: Mutex::new(None),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            reconnect_thread: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.shared.config
    }

    /// True once the active transport is one of the priority URIs.
    pub fn is_connected_to_priority(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|s| s.connected.as_ref().is_some_and(|c| c.priority))
            .unwrap_or(false)
    }

    /// The URI the transport is currently connected to.
    pub fn connected_uri(&self) -> Option<BrokerUri> {
        self.shared
            .state
            .lock()
            .ok()
            .and_then(|s| s.connected.as_ref().map(|c| c.uri.clone()))
    }

    /// Replaces the URI pool. With `rebalance` the current connection is
    /// dropped even when its URI is still in the new pool.
    pub fn update_uris(&self, rebalance: bool, uris: Vec<BrokerUri>) -> AmqResult<()> {
        self.shared.update_uris(rebalance, uris)
    }

    /// Adds URIs to the pool.
    pub fn add_uris(&self, rebalance: bool, uris: Vec<BrokerUri>) -> AmqResult<()> {
        let mut pool = self.shared.state.lock()?.uris.clone();
        pool.extend(uris);
        self.update_uris(rebalance, pool)
    }

    /// Removes URIs from the pool; a removed active connection reconnects.
    pub fn remove_uris(&self, rebalance: bool, uris: &[BrokerUri]) -> AmqResult<()> {
        let pool: Vec<BrokerUri> = self
            .shared
            .state
            .lock()?
            .uris
            .iter()
            .filter(|u| !uris.iter().any(|r| r.base() == u.base()))
            .cloned()
            .collect();
        self.update_uris(rebalance, pool)
    }
}

fn dedupe(uris: Vec<BrokerUri>) -> Vec<BrokerUri> {
    let mut seen: Vec<BrokerUri> = Vec::new();
    for uri in uris {
        if !seen.iter().any(|s| s.base() == uri.base()) {
            seen.push(uri);
        }
    }
    seen
}

fn drop_connected(state: &mut FailoverState) {
    if let Some(connected) = state.connected.take() {
        let _ = connected.transport.close();
    }
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_sign_loss)]
fn mul_duration(duration: Duration, factor: f64) -> Duration {
    Duration::from_millis(((duration.as_millis() as f64) * factor).min(3_600_000.0) as u64)
}

fn pick_backup(backups: &mut Vec<BackupTransport>) -> Option<BackupTransport> {
    while !backups.is_empty() {
        let backup = backups.remove(0);
        if backup.transport.is_connected() && !backup.transport.is_closed() {
            return Some(backup);
        }
        let _ = backup.transport.close();
    }
    None
}

impl FailoverShared {
    fn is_priority_uri(&self, uri: &BrokerUri, pool: &[BrokerUri]) -> bool {
        if self.config.priority_uris.is_empty() {
            // without an explicit subset the first pool member is preferred
            pool.first().is_some_and(|first| first.base() == uri.base())
        } else {
            self.config
                .priority_uris
                .iter()
                .any(|p| p.base() == uri.base())
        }
    }

    fn user_listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }

    fn update_uris(&self, rebalance: bool, uris: Vec<BrokerUri>) -> AmqResult<()> {
        if !self.config.update_uris_supported {
            return Ok(());
        }
        let interrupted = {
            let mut state = self.state.lock()?;
            state.uris = dedupe(uris);
            state.terminal_failure = false;
            state.attempts = 0;
            state.delay = self.config.initial_reconnect_delay;
            let keep = match &state.connected {
                Some(connected) => {
                    !rebalance && state.uris.iter().any(|u| u.base() == connected.uri.base())
                }
                None => true,
            };
            if !keep {
                debug!("dropping the active transport for a URI update");
                drop_connected(&mut state);
            }
            !keep
        };
        self.changed.notify_all();
        if interrupted {
            if let Some(listener) = self.user_listener() {
                listener.transport_interrupted();
            }
        }
        Ok(())
    }

    // Replays the tracked state onto a started candidate. A replay failure
    // counts as a connection failure.
    fn replay_onto(&self, transport: &Arc<dyn Transport>) -> AmqResult<()> {
        let replay = self.tracker.lock()?.replay_commands();
        if !replay.is_empty() {
            debug!(
                "replaying {} tracked commands to {}",
                replay.len(),
                transport.remote_address()
            );
        }
        for command in replay {
            transport.one_way(command)?;
        }
        Ok(())
    }

    // Builds, starts and replays onto a candidate stack. The state lock is
    // not held while connecting.
    fn try_connect(
        this: &Arc<Self>,
        uri: &BrokerUri,
        generation: u64,
    ) -> AmqResult<Arc<dyn Transport>> {
        let transport = factory::create_inner_stack(uri)?;
        transport.set_listener(Some(Arc::new(FailoverListener {
            shared: Arc::clone(this),
            generation,
        }) as Arc<dyn TransportListener>));
        transport.start()?;
        if let Err(error) = this.replay_onto(&transport) {
            let _ = transport.close();
            return Err(error);
        }
        Ok(transport)
    }

    fn install_connected(
        &self,
        transport: Arc<dyn Transport>,
        uri: BrokerUri,
        generation: u64,
    ) {
        info!("connected to {uri}");
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let priority = self.is_priority_uri(&uri, &state.uris);
            state.connected = Some(ConnectedTransport {
                transport,
                uri,
                generation,
                priority,
            });
            state.attempts = 0;
            state.delay = self.config.initial_reconnect_delay;
            state.first_connection_done = true;
            state.terminal_failure = false;
        }
        self.changed.notify_all();
        if let Some(listener) = self.user_listener() {
            listener.transport_resumed();
        }
    }

    // One pass over backups and the candidate list; true when connected.
    fn reconnect_pass(this: &Arc<Self>) -> bool {
        let (maybe_backup, generation) = {
            let Ok(mut state) = this.state.lock() else {
                return false;
            };
            if state.connected.is_some() {
                return true;
            }
            state.generation += 1;
            (pick_backup(&mut state.backups), state.generation)
        };

        if let Some(backup) = maybe_backup {
            debug!("promoting backup transport to {}", backup.uri);
            backup
                .transport
                .set_listener(Some(Arc::new(FailoverListener {
                    shared: Arc::clone(this),
                    generation,
                }) as Arc<dyn TransportListener>));
            if this.replay_onto(&backup.transport).is_ok() {
                this.install_connected(backup.transport, backup.uri, generation);
                return true;
            }
            let _ = backup.transport.close();
        }

        let candidates = {
            let Ok(state) = this.state.lock() else {
                return false;
            };
            this.candidate_uris(&state)
        };
        for uri in candidates {
            if this.closed.load(Ordering::Acquire) {
                return false;
            }
            match Self::try_connect(this, &uri, generation) {
                Ok(transport) => {
                    this.install_connected(transport, uri, generation);
                    return true;
                }
                Err(error) => {
                    debug!("connect to {uri} failed: {error}");
                }
            }
        }
        false
    }

    fn candidate_uris(&self, state: &FailoverState) -> Vec<BrokerUri> {
        let mut candidates = state.uris.clone();
        if self.config.randomize {
            candidates.shuffle(&mut rand::thread_rng());
        }
        if self.config.priority_backup {
            // prefer the priority subset when it is reachable
            candidates.sort_by_key(|uri| !self.is_priority_uri(uri, &state.uris));
        }
        candidates
    }

    // Called when the active transport reports a failure or a send fails.
    fn handle_connection_failure(&self, generation: u64) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            match &state.connected {
                Some(connected) if connected.generation == generation => {
                    warn!("transport to {} failed, reconnecting", connected.uri);
                }
                // a stale transport's event, already replaced
                _ => return,
            }
            drop_connected(&mut state);
        }
        self.changed.notify_all();
        if let Some(listener) = self.user_listener() {
            listener.transport_interrupted();
        }
    }

    fn maintain_backups(&self) {
        if !self.config.backup {
            return;
        }
        let wanted: Vec<BrokerUri> = {
            let Ok(state) = self.state.lock() else {
                return;
            };
            if state.connected.is_none() {
                return;
            }
            let connected_base = state.connected.as_ref().map(|c| c.uri.base());
            let held: Vec<String> = state.backups.iter().map(|b| b.uri.base()).collect();
            state
                .uris
                .iter()
                .filter(|u| Some(u.base()) != connected_base)
                .filter(|u| !held.contains(&u.base()))
                .take(
                    self.config
                        .backup_pool_size
                        .saturating_sub(state.backups.len()),
                )
                .cloned()
                .collect()
        };
        for uri in wanted {
            match factory::create_inner_stack(&uri) {
                Ok(transport) => {
                    if transport.start().is_err() {
                        continue;
                    }
                    debug!("holding backup transport to {uri}");
                    if let Ok(mut state) = self.state.lock() {
                        state.backups.push(BackupTransport { transport, uri });
                    }
                }
                Err(error) => trace!("backup connect to {uri} failed: {error}"),
            }
        }
    }

    // Migrates to a priority URI when connected to a lesser one.
    fn maintain_priority(this: &Arc<Self>) {
        if !this.config.priority_backup {
            return;
        }
        let (candidates, generation) = {
            let Ok(mut state) = this.state.lock() else {
                return;
            };
            let Some(connected) = &state.connected else {
                return;
            };
            if connected.priority {
                return;
            }
            state.generation += 1;
            let candidates: Vec<BrokerUri> = state
                .uris
                .iter()
                .filter(|u| this.is_priority_uri(u, &state.uris))
                .cloned()
                .collect();
            (candidates, state.generation)
        };
        for uri in candidates {
            if this.closed.load(Ordering::Acquire) {
                return;
            }
            if let Ok(transport) = Self::try_connect(this, &uri, generation) {
                info!("migrating to priority broker {uri}");
                if let Some(listener) = this.user_listener() {
                    listener.transport_interrupted();
                }
                if let Ok(mut state) = this.state.lock() {
                    drop_connected(&mut state);
                }
                this.install_connected(transport, uri, generation);
                return;
            }
        }
    }

    fn reconnect_loop(this: &Arc<Self>) {
        loop {
            if this.closed.load(Ordering::Acquire) {
                return;
            }

            let connected = this
                .state
                .lock()
                .map(|s| s.connected.is_some())
                .unwrap_or(false);

            if connected {
                this.maintain_backups();
                Self::maintain_priority(this);
                let Ok(state) = this.state.lock() else { return };
                if state.connected.is_some() {
                    // idle; wake up periodically while maintenance work may
                    // become possible
                    let wait = if this.config.priority_backup || this.config.backup {
                        Duration::from_millis(1000)
                    } else {
                        Duration::from_secs(3600)
                    };
                    let _ = this.changed.wait_timeout(state, wait);
                }
                continue;
            }

            let paused = {
                let Ok(state) = this.state.lock() else { return };
                state.terminal_failure || !this.started.load(Ordering::Acquire)
            };
            if paused {
                let Ok(state) = this.state.lock() else { return };
                let _ = this.changed.wait_timeout(state, Duration::from_millis(500));
                continue;
            }

            if Self::reconnect_pass(this) || this.closed.load(Ordering::Acquire) {
                continue;
            }

            let Ok(mut state) = this.state.lock() else { return };
            state.attempts += 1;
            let limit = if !state.first_connection_done
                && this.config.startup_max_reconnect_attempts != 0
            {
                this.config.startup_max_reconnect_attempts
            } else {
                this.config.max_reconnect_attempts
            };
            if limit >= 0 && state.attempts >= limit {
                error!("giving up after {} reconnect attempts", state.attempts);
                state.terminal_failure = true;
                drop(state);
                this.changed.notify_all();
                if let Some(listener) = this.user_listener() {
                    listener.on_exception(AmqError::NoMoreBrokers);
                }
                continue;
            }
            let delay = state.delay;
            trace!(
                "reconnect attempt {} failed, sleeping {delay:?}",
                state.attempts
            );
            if this.config.use_exponential_backoff {
                state.delay = mul_duration(state.delay, this.config.backoff_multiplier)
                    .min(this.config.max_reconnect_delay);
            }
            let _ = this.changed.wait_timeout(state, delay);
        }
    }

    fn current_transport(&self) -> Option<(Arc<dyn Transport>, u64)> {
        self.state.lock().ok().and_then(|s| {
            s.connected
                .as_ref()
                .map(|c| (Arc::clone(&c.transport), c.generation))
        })
    }
}

impl Transport for FailoverTransport {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        let deadline = if self.shared.config.timeout > 0 {
            Some(Instant::now() + Duration::from_millis(self.shared.config.timeout.unsigned_abs()))
        } else {
            None
        };

        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(AmqError::Closed);
            }
            if self.shared.state.lock()?.terminal_failure {
                return Err(AmqError::NoMoreBrokers);
            }

            if let Some((transport, generation)) = self.shared.current_transport() {
                let tracked = self.shared.tracker.lock()?.track(&command);
                match transport.one_way(command.clone()) {
                    Ok(()) => return Ok(()),
                    Err(error) => {
                        debug!("send failed: {error}");
                        self.shared.handle_connection_failure(generation);
                        if tracked.is_some()
                            || self.shared.tracker.lock()?.is_trackable(&command)
                        {
                            // the tracker replays it after the reconnect
                            return Ok(());
                        }
                        continue;
                    }
                }
            }

            // disconnected: hand the command to the tracker when possible,
            // otherwise wait for a connection
            {
                let mut tracker = self.shared.tracker.lock()?;
                if tracker.is_trackable(&command) {
                    tracker.track(&command);
                    return Ok(());
                }
            }
            let state = self.shared.state.lock()?;
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(AmqError::Io {
                            source: std::io::Error::new(
                                std::io::ErrorKind::TimedOut,
                                "failover send timeout while disconnected",
                            ),
                        });
                    }
                    remaining.min(Duration::from_millis(500))
                }
                None => Duration::from_millis(500),
            };
            let _ = self.shared.changed.wait_timeout(state, wait)?;
        }
    }

    fn request(&self, command: Command, timeout: Option<Duration>) -> AmqResult<Command> {
        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(AmqError::Closed);
            }
            if self.shared.state.lock()?.terminal_failure {
                return Err(AmqError::NoMoreBrokers);
            }
            if let Some((transport, generation)) = self.shared.current_transport() {
                let tracked = self.shared.tracker.lock()?.track(&command);
                return match transport.request(command, timeout) {
                    Ok(response) => {
                        if let Some(token) = tracked {
                            self.shared.tracker.lock()?.complete(token);
                        }
                        Ok(response)
                    }
                    Err(error) => {
                        if error.is_fatal_to_transport()
                            || matches!(error, AmqError::TransportClosed)
                        {
                            self.shared.handle_connection_failure(generation);
                        }
                        Err(error)
                    }
                };
            }
            let state = self.shared.state.lock()?;
            let _ = self
                .shared
                .changed
                .wait_timeout(state, Duration::from_millis(500))?;
        }
    }

    fn start(&self) -> AmqResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(AmqError::Closed);
        }
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(
            "starting failover over {:?}",
            self.shared
                .state
                .lock()?
                .uris
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("amq-failover".to_string())
            .spawn(move || FailoverShared::reconnect_loop(&shared))?;
        *self.reconnect_thread.lock()? = Some(handle);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn stop(&self) -> AmqResult<()> {
        self.shared.started.store(false, Ordering::Release);
        if let Some((transport, _)) = self.shared.current_transport() {
            transport.stop()?;
        }
        Ok(())
    }

    fn close(&self) -> AmqResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shared.started.store(false, Ordering::Release);
        self.shared.changed.notify_all();
        let handle = self.reconnect_thread.lock()?.take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        let (connected, backups) = {
            let mut state = self.shared.state.lock()?;
            (state.connected.take(), std::mem::take(&mut state.backups))
        };
        if let Some(connected) = connected {
            let _ = connected.transport.close();
        }
        for backup in backups {
            let _ = backup.transport.close();
        }
        self.shared.tracker.lock()?.clear();
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = None;
        }
        Ok(())
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = listener;
        }
    }

    fn is_connected(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|s| s.connected.is_some())
            .unwrap_or(false)
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn remote_address(&self) -> String {
        self.connected_uri()
            .map_or_else(|| "failover (disconnected)".to_string(), |u| u.to_string())
    }
}

impl Drop for FailoverTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// The listener each inner stack reports to; tagged with the generation it
// was installed under so events from replaced transports are ignored.
struct FailoverListener {
    shared: Arc<FailoverShared>,
    generation: u64,
}

impl std::fmt::Debug for FailoverListener {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "FailoverListener {{ generation: {} }}", self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_comes_from_the_outer_query_string() {
        let uri = CompositeUri::parse(
            "failover://(tcp://a:61616,tcp://b:61616)?randomize=false&initialReconnectDelay=100\
             &maxReconnectDelay=5000&useExponentialBackOff=true&backOffMultiplier=3.0\
             &maxReconnectAttempts=7&backup=true&backupPoolSize=2&trackMessages=true\
             &maxCacheSize=4096&timeout=2500&priorityBackup=true\
             &priorityURIs=tcp://a:61616&updateURIsSupported=false",
        )
        .unwrap();
        let config = FailoverConfig::from_composite(&uri).unwrap();
        assert!(!config.randomize);
        assert_eq!(config.initial_reconnect_delay, Duration::from_millis(100));
        assert_eq!(config.max_reconnect_delay, Duration::from_millis(5000));
        assert_eq!(config.backoff_multiplier, 3.0);
        assert_eq!(config.max_reconnect_attempts, 7);
        assert!(config.backup);
        assert_eq!(config.backup_pool_size, 2);
        assert!(config.track_messages);
        assert_eq!(config.max_cache_size, 4096);
        assert_eq!(config.timeout, 2500);
        assert!(config.priority_backup);
        assert_eq!(config.priority_uris.len(), 1);
        assert!(!config.update_uris_supported);
    }

    #[test]
    fn backoff_delays_are_non_decreasing_up_to_the_cap() {
        let cap = Duration::from_secs(30);
        let mut delay = Duration::from_millis(10);
        let mut previous = delay;
        for _ in 0..64 {
            delay = mul_duration(delay, 2.0).min(cap);
            assert!(delay >= previous);
            assert!(delay <= cap);
            previous = delay;
        }
        assert_eq!(delay, cap);
    }

    #[test]
    fn uri_pools_are_deduplicated_by_base() {
        let uris = vec![
            BrokerUri::parse("tcp://a:1?x=1").unwrap(),
            BrokerUri::parse("tcp://a:1?x=2").unwrap(),
            BrokerUri::parse("tcp://b:1").unwrap(),
        ];
        let pool = dedupe(uris);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].option("x"), Some("1"));
    }
}

impl TransportListener for FailoverListener {
    fn on_command(&self, command: Command) {
        if let CommandBody::ConnectionControl(control) = &command.body {
            if control.rebalance_connection && self.shared.config.update_uris_supported {
                if let Some(reconnect_to) = &control.reconnect_to {
                    debug!("broker asks to rebalance to {reconnect_to}");
                    let uris: Vec<BrokerUri> = reconnect_to
                        .split(',')
                        .filter(|u| !u.trim().is_empty())
                        .filter_map(|u| BrokerUri::parse(u.trim()).ok())
                        .collect();
                    if !uris.is_empty() {
                        let _ = self.shared.update_uris(true, uris);
                    }
                }
            }
        }
        if let Some(listener) = self.shared.user_listener() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: AmqError) {
        debug!("inner transport failed: {error}");
        self.shared.handle_connection_failure(self.generation);
    }
}
