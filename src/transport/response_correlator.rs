use crate::{
    AmqError, AmqResult,
    commands::Command,
    transport::{Transport, TransportListener},
};
use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

// A slot one requester waits on until the matching response (or a failure)
// arrives.
#[derive(Debug, Default)]
struct FutureResponse {
    slot: Mutex<Option<AmqResult<Command>>>,
    arrived: Condvar,
}

impl FutureResponse {
    fn complete(&self, outcome: AmqResult<Command>) {
        if let Ok(mut slot) = self.slot.lock() {
            if slot.is_none() {
                *slot = Some(outcome);
            }
        }
        self.arrived.notify_all();
    }

    fn await_outcome(&self, timeout: Option<Duration>) -> AmqResult<Command> {
        let mut slot = self.slot.lock()?;
        match timeout {
            Some(timeout) => {
                let deadline = std::time::Instant::now() + timeout;
                loop {
                    if let Some(outcome) = slot.take() {
                        return outcome;
                    }
                    let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                    if remaining.is_zero() {
                        return Err(AmqError::RequestTimedOut);
                    }
                    let (guard, _timed_out) = self.arrived.wait_timeout(slot, remaining)?;
                    slot = guard;
                }
            }
            None => loop {
                if let Some(outcome) = slot.take() {
                    return outcome;
                }
                slot = self.arrived.wait(slot)?;
            },
        }
    }
}

/// What to do with a response when it arrives.
type ResponseCallback = Box<dyn FnOnce(AmqResult<Command>) + Send>;

enum Pending {
    Waiter(Arc<FutureResponse>),
    Callback(ResponseCallback),
}

impl Pending {
    fn complete(self, outcome: AmqResult<Command>) {
        match self {
            Self::Waiter(future) => future.complete(outcome),
            Self::Callback(callback) => callback(outcome),
        }
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Self::Waiter(_) => write!(f, "Pending::Waiter"),
            Self::Callback(_) => write!(f, "Pending::Callback"),
        }
    }
}

/// Matches responses to their requests by command id.
///
/// All outbound commands receive an id from the same sequence; requests
/// additionally park a future the reader thread completes when the matching
/// correlation id comes back.
#[derive(Debug)]
pub struct ResponseCorrelator {
    inner: Arc<dyn Transport>,
    shared: Arc<CorrelatorShared>,
}

#[derive(Debug)]
struct CorrelatorShared {
    next_id: Mutex<i32>,
    pending: Mutex<HashMap<i32, Pending>>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    // once set, every new and pending request fails with a clone of this
    failure: Mutex<Option<AmqError>>,
}

impl ResponseCorrelator {
    pub fn wrap(inner: Arc<dyn Transport>) -> Arc<Self> {
        let shared = Arc::new(CorrelatorShared {
            next_id: Mutex::new(0),
            pending: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
            failure: Mutex::new(None),
        });
        let correlator = Arc::new(Self {
            inner: Arc::clone(&inner),
            shared: Arc::clone(&shared),
        });
        inner.set_listener(Some(
            Arc::new(CorrelatorListener { shared }) as Arc<dyn TransportListener>
        ));
        correlator
    }

    fn next_command_id(&self) -> AmqResult<i32> {
        let mut next = self.shared.next_id.lock()?;
        *next += 1;
        Ok(*next)
    }

    /// Like [`request`](Transport::request), but the caller's thread moves
    /// on; the callback runs when the response (or a failure) arrives.
    pub fn async_request(
        &self,
        mut command: Command,
        on_complete: ResponseCallback,
    ) -> AmqResult<()> {
        let command_id = self.next_command_id()?;
        command.command_id = command_id;
        command.response_required = true;
        {
            let failure = self.shared.failure.lock()?;
            if let Some(error) = &*failure {
                on_complete(Err(error.clone()));
                return Ok(());
            }
            self.shared
                .pending
                .lock()?
                .insert(command_id, Pending::Callback(on_complete));
        }
        if let Err(error) = self.inner.one_way(command) {
            if let Some(entry) = self.shared.pending.lock()?.remove(&command_id) {
                entry.complete(Err(error.clone()));
            }
            return Err(error);
        }
        Ok(())
    }
}

impl CorrelatorShared {
    fn upper(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }

    // Fails every pending and future request; used on close and on a fatal
    // transport error.
    fn dispose(&self, error: &AmqError) {
        if let Ok(mut failure) = self.failure.lock() {
            if failure.is_none() {
                *failure = Some(error.clone());
            }
        }
        let drained: Vec<_> = match self.pending.lock() {
            Ok(mut pending) => pending.drain().collect(),
            Err(_) => return,
        };
        for (_, entry) in drained {
            entry.complete(Err(error.clone()));
        }
    }
}

impl Transport for ResponseCorrelator {
    fn one_way(&self, mut command: Command) -> AmqResult<()> {
        command.command_id = self.next_command_id()?;
        command.response_required = false;
        self.inner.one_way(command)
    }

    fn request(&self, mut command: Command, timeout: Option<Duration>) -> AmqResult<Command> {
        let command_id = self.next_command_id()?;
        command.command_id = command_id;
        command.response_required = true;

        let future = Arc::new(FutureResponse::default());
        {
            // holding the failure lock across the insert keeps dispose()
            // from draining between the check and the insert
            let failure = self.shared.failure.lock()?;
            if let Some(error) = &*failure {
                return Err(error.clone());
            }
            self.shared
                .pending
                .lock()?
                .insert(command_id, Pending::Waiter(Arc::clone(&future)));
        }

        if let Err(error) = self.inner.one_way(command) {
            self.shared.pending.lock()?.remove(&command_id);
            return Err(error);
        }

        let outcome = future.await_outcome(timeout);
        if outcome.is_err() {
            self.shared.pending.lock()?.remove(&command_id);
        }
        outcome
    }

    fn start(&self) -> AmqResult<()> {
        self.inner.start()
    }

    fn stop(&self) -> AmqResult<()> {
        self.inner.stop()
    }

    fn close(&self) -> AmqResult<()> {
        self.shared.dispose(&AmqError::TransportClosed);
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = None;
        }
        self.inner.close()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = listener;
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn remote_address(&self) -> String {
        self.inner.remote_address()
    }
}

#[derive(Debug)]
struct CorrelatorListener {
    shared: Arc<CorrelatorShared>,
}

impl TransportListener for CorrelatorListener {
    fn on_command(&self, command: Command) {
        if command.is_response() {
            let correlation_id = command.correlation_id().unwrap_or_default();
            let entry = self
                .shared
                .pending
                .lock()
                .ok()
                .and_then(|mut pending| pending.remove(&correlation_id));
            match entry {
                Some(entry) => entry.complete(Ok(command)),
                None => debug!("response for unknown request {correlation_id}"),
            }
            return;
        }
        if let Some(listener) = self.shared.upper() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: AmqError) {
        self.shared.dispose(&error);
        if let Some(listener) = self.shared.upper() {
            listener.on_exception(error);
        }
    }

    fn transport_interrupted(&self) {
        if let Some(listener) = self.shared.upper() {
            listener.transport_interrupted();
        }
    }

    fn transport_resumed(&self) {
        if let Some(listener) = self.shared.upper() {
            listener.transport_resumed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::CommandBody,
        transport::mock::MockTransport,
    };

    #[test]
    fn assigns_unique_ids_and_matches_responses() {
        let mock = MockTransport::stand_alone(true);
        let correlator = ResponseCorrelator::wrap(mock.clone() as Arc<dyn Transport>);
        correlator.start().unwrap();

        let first = correlator
            .request(
                Command::new(CommandBody::KeepAliveInfo),
                Some(Duration::from_secs(1)),
            )
            .unwrap();
        let second = correlator
            .request(
                Command::new(CommandBody::KeepAliveInfo),
                Some(Duration::from_secs(1)),
            )
            .unwrap();
        assert_ne!(first.correlation_id(), second.correlation_id());

        let sent = mock.outgoing();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].command_id, sent[1].command_id);
        correlator.close().unwrap();
    }

    #[test]
    fn request_times_out_when_nothing_answers() {
        let mock = MockTransport::stand_alone(false);
        let correlator = ResponseCorrelator::wrap(mock as Arc<dyn Transport>);
        correlator.start().unwrap();

        let started = std::time::Instant::now();
        let outcome = correlator.request(
            Command::new(CommandBody::KeepAliveInfo),
            Some(Duration::from_millis(500)),
        );
        assert!(matches!(outcome, Err(AmqError::RequestTimedOut)));
        assert!(started.elapsed() >= Duration::from_millis(450));
        // the transport stays usable
        assert!(correlator.is_connected());
        correlator.close().unwrap();
    }

    #[test]
    fn async_request_completes_through_the_callback() {
        let mock = MockTransport::stand_alone(true);
        let correlator = ResponseCorrelator::wrap(mock as Arc<dyn Transport>);
        correlator.start().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        correlator
            .async_request(
                Command::new(CommandBody::KeepAliveInfo),
                Box::new(move |outcome| {
                    tx.send(outcome).unwrap();
                }),
            )
            .unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(outcome.unwrap().is_response());
        correlator.close().unwrap();
    }

    #[test]
    fn close_releases_waiters() {
        let mock = MockTransport::stand_alone(false);
        let correlator = ResponseCorrelator::wrap(mock as Arc<dyn Transport>);
        correlator.start().unwrap();

        let waiter = {
            let correlator = Arc::clone(&correlator);
            std::thread::spawn(move || {
                correlator.request(Command::new(CommandBody::KeepAliveInfo), None)
            })
        };
        std::thread::sleep(Duration::from_millis(100));
        correlator.close().unwrap();
        let outcome = waiter.join().unwrap();
        assert!(matches!(outcome, Err(AmqError::TransportClosed)));
    }
}
