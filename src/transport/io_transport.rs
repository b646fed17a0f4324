use crate::{
    AmqError, AmqResult,
    commands::Command,
    transport::{Transport, TransportListener, tcp::TcpConnection},
    wireformat::WireFormat,
};
use std::{
    io::{Read, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

/// The transport that owns the socket: a dedicated reader thread feeds
/// decoded commands to the listener, writers marshal under the write lock.
#[derive(Debug)]
pub struct IoTransport {
    shared: Arc<IoShared>,
    reader_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

struct IoShared {
    wire_format: Arc<dyn WireFormat>,
    connection: Mutex<TcpConnection>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    started: AtomicBool,
    closed: AtomicBool,
    exception_reported: AtomicBool,
    remote: String,
}

impl std::fmt::Debug for IoShared {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "IoShared {{ remote: {:?}, .. }}", self.remote)
    }
}

impl IoTransport {
    pub(crate) fn new(connection: TcpConnection, wire_format: Arc<dyn WireFormat>) -> Self {
        let remote = connection.remote().to_string();
        Self {
            shared: Arc::new(IoShared {
                wire_format,
                connection: Mutex::new(connection),
                listener: Mutex::new(None),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                exception_reported: AtomicBool::new(false),
                remote,
            }),
            reader_thread: Mutex::new(None),
        }
    }

}

impl IoShared {
    fn fire_command(&self, command: Command) {
        // commands that sneak in while closing are dropped
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let listener = self.listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.on_command(command);
        }
    }

    fn fire_exception(&self, error: AmqError) {
        // one report per transport; a close-induced read error is no report
        if self.closed.load(Ordering::Acquire)
            || self.exception_reported.swap(true, Ordering::AcqRel)
        {
            trace!("swallowing follow-up transport exception: {error}");
            return;
        }
        let listener = self.listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.on_exception(error);
        }
    }

    fn run(&self, mut reader: Box<dyn Read + Send>) {
        trace!("reader thread for {} running", self.remote);
        while self.started.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire) {
            match self.wire_format.unmarshal(&mut *reader) {
                Ok(command) => self.fire_command(command),
                Err(error) => {
                    self.fire_exception(error);
                    break;
                }
            }
        }
        trace!("reader thread for {} done", self.remote);
    }
}

impl Transport for IoTransport {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(AmqError::Closed);
        }
        if !self.shared.started.load(Ordering::Acquire) {
            return Err(AmqError::Usage("transport is not started"));
        }
        let fed_back = {
            let mut connection = self.shared.connection.lock()?;
            let writer: &mut (dyn Write + Send) = connection.writer();
            self.shared.wire_format.marshal(&command, writer)?
        };
        // a format may answer locally for commands it cannot express
        if let Some(response) = fed_back {
            self.shared.fire_command(response);
        }
        Ok(())
    }

    fn start(&self) -> AmqResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(AmqError::Closed);
        }
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let reader = self
            .shared
            .connection
            .lock()?
            .take_reader()
            .ok_or(AmqError::Usage("transport was started before"))?;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("amq-reader {}", self.shared.remote))
            .spawn(move || shared.run(reader))?;
        *self.reader_thread.lock()? = Some(handle);
        Ok(())
    }

    fn stop(&self) -> AmqResult<()> {
        self.shared.started.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> AmqResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("closing transport to {}", self.shared.remote);
        *self.shared.listener.lock()? = None;

        // input first: this wakes the reader thread out of its blocking
        // read so the join below cannot hang
        {
            let connection = self.shared.connection.lock()?;
            // a socket that already died makes these fail; that is fine
            if let Err(error) = connection.shutdown_input() {
                trace!("input shutdown: {error}");
            }
            if let Err(error) = connection.shutdown_output() {
                trace!("output shutdown: {error}");
            }
        }
        let handle = self.reader_thread.lock()?.take();
        if let Some(handle) = handle {
            // a close initiated from a dispatch callback runs on the reader
            // thread itself and must not join it
            if handle.thread().id() == thread::current().id() {
                trace!("close on the reader thread, skipping the join");
            } else {
                let _ = handle.join();
            }
        }
        Ok(())
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.shared.listener.lock() {
            *slot = listener;
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.started.load(Ordering::Acquire) && !self.shared.closed.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn remote_address(&self) -> String {
        self.shared.remote.clone()
    }
}

impl Drop for IoTransport {
    fn drop(&mut self) {
        // closing before drop is the contract; recover if it was violated
        if self.shared.started.load(Ordering::Acquire) && !self.shared.closed.load(Ordering::Acquire)
        {
            warn!("transport to {} dropped while running", self.shared.remote);
            let _ = self.close();
        }
    }
}
