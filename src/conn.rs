//! Broker addressing: plain transport URIs and the composite
//! `failover://(...)` form.

mod broker_uri;

pub use broker_uri::{BrokerUri, CompositeUri};
