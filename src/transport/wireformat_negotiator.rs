use crate::{
    AmqError, AmqResult,
    commands::{Command, CommandBody},
    transport::{Transport, TransportListener},
    wireformat::WireFormat,
};
use std::{
    sync::{Arc, Condvar, Mutex},
    thread,
    time::Duration,
};

/// Default window for the wire format handshake.
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Default)]
struct NegotiationState {
    ready: bool,
    closed: bool,
    buffered: Vec<Command>,
}

/// Drives the OpenWire handshake: sends the local preferences on start,
/// buffers outbound traffic until the peer's `WireFormatInfo` arrives, then
/// applies the negotiated options and drains the buffer in order.
#[derive(Debug)]
pub struct WireFormatNegotiator {
    inner: Arc<dyn Transport>,
    shared: Arc<NegotiatorShared>,
    watchdog: Mutex<Option<thread::JoinHandle<()>>>,
}

#[derive(Debug)]
struct NegotiatorShared {
    inner: Arc<dyn Transport>,
    wire_format: Arc<dyn WireFormat>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    state: Mutex<NegotiationState>,
    changed: Condvar,
    timeout: Duration,
}

impl WireFormatNegotiator {
    pub fn wrap(
        inner: Arc<dyn Transport>,
        wire_format: Arc<dyn WireFormat>,
        timeout: Duration,
    ) -> Arc<Self> {
        let shared = Arc::new(NegotiatorShared {
            inner: Arc::clone(&inner),
            wire_format,
            listener: Mutex::new(None),
            state: Mutex::new(NegotiationState::default()),
            changed: Condvar::new(),
            timeout,
        });
        let negotiator = Arc::new(Self {
            inner: Arc::clone(&inner),
            shared: Arc::clone(&shared),
            watchdog: Mutex::new(None),
        });
        inner.set_listener(Some(
            Arc::new(NegotiatorListener { shared }) as Arc<dyn TransportListener>
        ));
        negotiator
    }
}

impl NegotiatorShared {
    fn upper(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }

    fn fail(&self, error: AmqError) {
        if let Some(listener) = self.upper() {
            listener.on_exception(error);
        }
        let _ = self.inner.close();
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.changed.notify_all();
    }
}

impl Transport for WireFormatNegotiator {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        // the handshake command itself always goes straight down
        if !command.is_wire_format_info() {
            let mut state = self.shared.state.lock()?;
            if state.closed {
                return Err(AmqError::Closed);
            }
            if !state.ready {
                trace!("buffering a command until the handshake completes");
                state.buffered.push(command);
                return Ok(());
            }
        }
        self.inner.one_way(command)
    }

    fn start(&self) -> AmqResult<()> {
        self.inner.start()?;
        let info = self
            .shared
            .wire_format
            .preferred_wire_format_info()
            .ok_or(AmqError::Usage("wire format has nothing to negotiate"))?;
        debug!("sending wire format preferences");
        self.inner.one_way(info)?;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("amq-negotiator".to_string())
            .spawn(move || {
                let Ok(state) = shared.state.lock() else {
                    return;
                };
                let deadline = shared.timeout;
                let outcome = shared
                    .changed
                    .wait_timeout_while(state, deadline, |s| !s.ready && !s.closed);
                match outcome {
                    Ok((state, _)) => {
                        if !state.ready && !state.closed {
                            drop(state);
                            warn!("wire format negotiation timed out");
                            shared.fail(AmqError::HandshakeTimeout);
                        }
                    }
                    Err(_) => trace!("negotiator state lock poisoned"),
                }
            })?;
        *self.watchdog.lock()? = Some(handle);
        Ok(())
    }

    fn stop(&self) -> AmqResult<()> {
        self.inner.stop()
    }

    fn close(&self) -> AmqResult<()> {
        {
            let mut state = self.shared.state.lock()?;
            state.closed = true;
            state.buffered.clear();
        }
        self.shared.changed.notify_all();
        let handle = self.watchdog.lock()?.take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
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
        self.shared
            .state
            .lock()
            .map(|s| s.ready && !s.closed)
            .unwrap_or(false)
            && self.inner.is_connected()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn remote_address(&self) -> String {
        self.inner.remote_address()
    }
}

#[derive(Debug)]
struct NegotiatorListener {
    shared: Arc<NegotiatorShared>,
}

impl TransportListener for NegotiatorListener {
    fn on_command(&self, command: Command) {
        if let CommandBody::WireFormatInfo(info) = &command.body {
            debug!(
                "peer speaks wire format version {} with {} options",
                info.version,
                info.properties.len()
            );
            if let Err(error) = self.shared.wire_format.renegotiate(info) {
                self.shared.fail(error);
                return;
            }
            let drained = {
                let Ok(mut state) = self.shared.state.lock() else {
                    return;
                };
                state.ready = true;
                std::mem::take(&mut state.buffered)
            };
            self.shared.changed.notify_all();
            for buffered in drained {
                if let Err(error) = self.shared.inner.one_way(buffered) {
                    self.shared.fail(error);
                    return;
                }
            }
            return;
        }
        // nothing but the handshake is legal before negotiation completes
        let ready = self.shared.state.lock().map(|s| s.ready).unwrap_or(false);
        if !ready {
            self.shared.fail(crate::amq_error::malformed!(
                "peer sent a type {} command before its wire format info",
                command.data_structure_type()
            ));
            return;
        }
        if let Some(listener) = self.shared.upper() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: AmqError) {
        // the transport underneath is gone; let the watchdog retire quietly
        if let Ok(mut state) = self.shared.state.lock() {
            state.closed = true;
        }
        self.shared.changed.notify_all();
        if let Some(listener) = self.shared.upper() {
            listener.on_exception(error);
        }
    }
}
