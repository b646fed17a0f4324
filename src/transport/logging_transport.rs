use crate::{
    AmqError, AmqResult,
    commands::Command,
    transport::{Transport, TransportListener},
};
use std::sync::{Arc, Mutex};

/// Traces every command crossing this point, both directions.
#[derive(Debug)]
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
}

impl LoggingTransport {
    pub fn wrap(inner: Arc<dyn Transport>) -> Arc<Self> {
        let filter = Arc::new(Self {
            inner: Arc::clone(&inner),
            listener: Mutex::new(None),
        });
        inner.set_listener(Some(Arc::clone(&filter) as Arc<dyn TransportListener>));
        filter
    }

    fn upper(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }
}

impl Transport for LoggingTransport {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        trace!("OUT {:?}", command);
        self.inner.one_way(command)
    }

    fn start(&self) -> AmqResult<()> {
        self.inner.start()
    }

    fn stop(&self) -> AmqResult<()> {
        self.inner.stop()
    }

    fn close(&self) -> AmqResult<()> {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = None;
        }
        self.inner.close()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.listener.lock() {
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

impl TransportListener for LoggingTransport {
    fn on_command(&self, command: Command) {
        trace!("IN  {:?}", command);
        if let Some(listener) = self.upper() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: AmqError) {
        trace!("ERR {error}");
        if let Some(listener) = self.upper() {
            listener.on_exception(error);
        }
    }
}
