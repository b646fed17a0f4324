use crate::{
    AmqResult,
    commands::Command,
    transport::{Transport, TransportListener},
};
use std::sync::{Arc, Mutex};

/// Serializes outbound writes so two callers cannot interleave frames.
/// Reads pass through untouched; dispatch order is already total because a
/// transport stack has a single reader thread.
#[derive(Debug)]
pub struct MutexTransport {
    inner: Arc<dyn Transport>,
    write_lock: Mutex<()>,
}

impl MutexTransport {
    pub fn wrap(inner: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            write_lock: Mutex::new(()),
        })
    }
}

impl Transport for MutexTransport {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        let _guard = self.write_lock.lock()?;
        self.inner.one_way(command)
    }

    fn start(&self) -> AmqResult<()> {
        self.inner.start()
    }

    fn stop(&self) -> AmqResult<()> {
        self.inner.stop()
    }

    fn close(&self) -> AmqResult<()> {
        self.inner.close()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        self.inner.set_listener(listener);
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
