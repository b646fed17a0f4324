//! An in-process transport for tests and examples: it records outgoing
//! commands, answers `response_required` commands with a positive response,
//! and lets a test inject inbound commands or simulate a connection loss.
//!
//! Selected by the `mock://` scheme. A process-global registry makes the
//! most recently created instance reachable by its `name` option, and an
//! availability table lets tests take individual addresses down and up.

use crate::{
    AmqError, AmqResult,
    commands::{Command, CommandBody, Response},
    conn::BrokerUri,
    transport::{Transport, TransportListener},
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, OnceLock, Weak,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
};

fn name_registry() -> &'static Mutex<HashMap<String, Weak<MockTransport>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Weak<MockTransport>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn down_addresses() -> &'static Mutex<HashSet<String>> {
    static DOWN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    DOWN.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Takes a mock address (`host:port`) down or up for subsequent connects.
pub fn set_available(addr: &str, available: bool) {
    if let Ok(mut down) = down_addresses().lock() {
        if available {
            down.remove(addr);
        } else {
            down.insert(addr.to_string());
        }
    }
}

pub fn is_available(addr: &str) -> bool {
    down_addresses()
        .lock()
        .map(|down| !down.contains(addr))
        .unwrap_or(true)
}

/// The most recently created instance registered under `name`, if it is
/// still alive.
pub fn get(name: &str) -> Option<Arc<MockTransport>> {
    name_registry()
        .lock()
        .ok()
        .and_then(|registry| registry.get(name).and_then(Weak::upgrade))
}

#[derive(Debug)]
pub struct MockTransport {
    name: Option<String>,
    remote: String,
    auto_respond: bool,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    outgoing: Mutex<Vec<Command>>,
    outgoing_listener: Mutex<Option<Arc<dyn TransportListener>>>,
    started: AtomicBool,
    closed: AtomicBool,
    // >= 0 means: fail the nth send and everything after it
    fail_sends_after: AtomicI32,
}

impl MockTransport {
    /// Builds an instance from a `mock://` URI, honoring `failOnCreate`,
    /// `name`, `noResponse` and the availability table.
    pub fn create(uri: &BrokerUri) -> AmqResult<Arc<Self>> {
        if uri.bool_option("failOnCreate", false) {
            return Err(AmqError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("mock {} is configured to fail on create", uri.addr()),
                ),
            });
        }
        if !is_available(&uri.addr()) {
            return Err(AmqError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("mock {} is down", uri.addr()),
                ),
            });
        }
        let transport = Arc::new(Self {
            name: uri.option("name").map(str::to_string),
            remote: uri.to_string(),
            auto_respond: !uri.bool_option("noResponse", false),
            listener: Mutex::new(None),
            outgoing: Mutex::new(Vec::new()),
            outgoing_listener: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends_after: AtomicI32::new(i32::MAX),
        });
        if let Some(name) = &transport.name {
            if let Ok(mut registry) = name_registry().lock() {
                registry.insert(name.clone(), Arc::downgrade(&transport));
            }
        }
        Ok(transport)
    }

    /// A free-standing instance for unit tests, not tied to any URI.
    pub fn stand_alone(auto_respond: bool) -> Arc<Self> {
        Arc::new(Self {
            name: None,
            remote: "mock://stand-alone".to_string(),
            auto_respond,
            listener: Mutex::new(None),
            outgoing: Mutex::new(Vec::new()),
            outgoing_listener: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends_after: AtomicI32::new(i32::MAX),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Everything sent through this transport so far.
    pub fn outgoing(&self) -> Vec<Command> {
        self.outgoing.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// A listener observing each outgoing command, for counting tests.
    pub fn set_outgoing_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.outgoing_listener.lock() {
            *slot = listener;
        }
    }

    /// Feeds a command to the stack above, as if the broker had sent it.
    pub fn inject(&self, command: Command) {
        let listener = self.listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.on_command(command);
        }
    }

    /// Reports a connection loss to the stack above.
    pub fn simulate_failure(&self) {
        let listener = self.listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.on_exception(AmqError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "simulated connection loss",
                ),
            });
        }
    }

    /// Makes every send after the next `count` sends fail.
    pub fn fail_sends_after(&self, count: i32) {
        self.fail_sends_after.store(count, Ordering::Release);
    }
}

impl Transport for MockTransport {
    fn one_way(&self, command: Command) -> AmqResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AmqError::Closed);
        }
        if self.fail_sends_after.fetch_sub(1, Ordering::AcqRel) <= 0 {
            return Err(AmqError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated send failure",
                ),
            });
        }
        let respond_to =
            (self.auto_respond && command.response_required).then_some(command.command_id);
        {
            self.outgoing.lock()?.push(command.clone());
        }
        let outgoing_listener = self.outgoing_listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = outgoing_listener {
            listener.on_command(command);
        }
        if let Some(correlation_id) = respond_to {
            self.inject(Command::new(CommandBody::Response(Response {
                correlation_id,
            })));
        }
        Ok(())
    }

    fn start(&self) -> AmqResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AmqError::Closed);
        }
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> AmqResult<()> {
        self.started.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> AmqResult<()> {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut slot) = self.listener.lock() {
            *slot = None;
        }
        Ok(())
    }

    fn set_listener(&self, listener: Option<Arc<dyn TransportListener>>) {
        if let Ok(mut slot) = self.listener.lock() {
            *slot = listener;
        }
    }

    fn is_connected(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn remote_address(&self) -> String {
        self.remote.clone()
    }
}
