use crate::{
    AmqError, AmqResult,
    commands::{Command, CommandBody},
    transport::{Transport, TransportListener},
    wireformat::WireFormat,
};
use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// Keep-alive supervision: a read watchdog that declares the connection dead
/// after the negotiated silence window, and a write pulse that sends a
/// `KeepAliveInfo` whenever half the window passes without outbound traffic.
///
/// Disabled entirely while the negotiated window is zero.
#[derive(Debug)]
pub struct InactivityMonitor {
    inner: Arc<dyn Transport>,
    shared: Arc<MonitorShared>,
    timer: Mutex<Option<thread::JoinHandle<()>>>,
}

#[derive(Debug)]
struct MonitorShared {
    inner: Arc<dyn Transport>,
    wire_format: Arc<dyn WireFormat>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    last_read: Mutex<Instant>,
    last_write: Mutex<Instant>,
    stopper: Mutex<bool>,
    stop_signal: Condvar,
    failed: AtomicBool,
}

impl InactivityMonitor {
    pub fn wrap(inner: Arc<dyn Transport>, wire_format: Arc<dyn WireFormat>) -> Arc<Self> {
        let shared = Arc::new(MonitorShared {
            inner: Arc::clone(&inner),
            wire_format,
            listener: Mutex::new(None),
            last_read: Mutex::new(Instant::now()),
            last_write: Mutex::new(Instant::now()),
            stopper: Mutex::new(false),
            stop_signal: Condvar::new(),
            failed: AtomicBool::new(false),
        });
        let monitor = Arc::new(Self {
            inner: Arc::clone(&inner),
            shared: Arc::clone(&shared),
            timer: Mutex::new(None),
        });
        inner.set_listener(Some(
            Arc::new(MonitorListener {
                shared: Arc::clone(&shared),
            }) as Arc<dyn TransportListener>,
        ));
        monitor
    }
}

impl MonitorShared {
    fn upper(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }

    fn touch_read(&self) {
        if let Ok(mut last) = self.last_read.lock() {
            *last = Instant::now();
        }
    }

    fn touch_write(&self) {
        if let Ok(mut last) = self.last_write.lock() {
            *last = Instant::now();
        }
    }

    // Sleeps up to `period`, returns true when the monitor should retire.
    fn sleep(&self, period: Duration) -> bool {
        let Ok(stopped) = self.stopper.lock() else {
            return true;
        };
        match self
            .stop_signal
            .wait_timeout_while(stopped, period, |stopped| !*stopped)
        {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }

    fn run(&self) {
        // give the handshake a head start before judging silence
        let initial_delay = self.wire_format.max_inactivity_initial_delay().max(0);
        if initial_delay > 0 && self.sleep(Duration::from_millis(initial_delay.unsigned_abs())) {
            return;
        }
        loop {
            let max_inactivity = self.wire_format.max_inactivity_duration();
            if max_inactivity <= 0 {
                // not negotiated (yet, or at all): idle along
                if self.sleep(Duration::from_millis(1000)) {
                    return;
                }
                continue;
            }
            let window = Duration::from_millis(max_inactivity.unsigned_abs());
            let pulse = window / 2;

            let read_elapsed = self
                .last_read
                .lock()
                .map(|last| last.elapsed())
                .unwrap_or_default();
            if read_elapsed > window {
                warn!(
                    "no traffic from {} for {read_elapsed:?}",
                    self.inner.remote_address()
                );
                if !self.failed.swap(true, Ordering::AcqRel) {
                    if let Some(listener) = self.upper() {
                        listener.on_exception(AmqError::InactivityTimeout);
                    }
                    let _ = self.inner.close();
                }
                return;
            }

            let write_elapsed = self
                .last_write
                .lock()
                .map(|last| last.elapsed())
                .unwrap_or_default();
            if write_elapsed >= pulse {
                trace!("sending a keep-alive to {}", self.inner.remote_address());
                if self
                    .inner
                    .one_way(Command::new(CommandBody::KeepAliveInfo))
                    .is_ok()
                {
                    self.touch_write();
                }
            }

            if self.sleep(pulse.min(Duration::from_millis(1000))) {
                return;
            }
        }
    }
}

impl Transport for InactivityMonitor {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        self.inner.one_way(command)?;
        self.shared.touch_write();
        Ok(())
    }

    fn start(&self) -> AmqResult<()> {
        self.inner.start()?;
        let mut timer = self.timer.lock()?;
        if timer.is_none() {
            self.shared.touch_read();
            self.shared.touch_write();
            let shared = Arc::clone(&self.shared);
            *timer = Some(
                thread::Builder::new()
                    .name("amq-inactivity".to_string())
                    .spawn(move || shared.run())?,
            );
        }
        Ok(())
    }

    fn stop(&self) -> AmqResult<()> {
        self.inner.stop()
    }

    fn close(&self) -> AmqResult<()> {
        if let Ok(mut stopped) = self.shared.stopper.lock() {
            *stopped = true;
        }
        self.shared.stop_signal.notify_all();
        let handle = self.timer.lock()?.take();
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
struct MonitorListener {
    shared: Arc<MonitorShared>,
}

impl TransportListener for MonitorListener {
    fn on_command(&self, command: Command) {
        self.shared.touch_read();
        if command.is_keep_alive() {
            trace!("swallowing an inbound keep-alive");
            return;
        }
        if let Some(listener) = self.shared.upper() {
            listener.on_command(command);
        }
    }

    fn on_exception(&self, error: AmqError) {
        if let Some(listener) = self.shared.upper() {
            listener.on_exception(error);
        }
    }
}
