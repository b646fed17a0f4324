//! Builds transport stacks from URIs.
//!
//! A plain URI yields the inner stack
//! `correlator(mutex(negotiator(inactivity(io))))`; a composite
//! `failover://(...)` URI puts the failover transport on top, which builds
//! one inner stack per reconnect attempt.

use crate::{
    AmqError, AmqResult,
    conn::{BrokerUri, CompositeUri},
    transport::{
        InactivityMonitor, IoTransport, LoggingTransport, MutexTransport, ResponseCorrelator,
        Transport, WireFormatNegotiator, failover::FailoverTransport, mock::MockTransport,
        tcp::TcpConnection,
    },
    wireformat::{
        WireFormat,
        openwire::{OpenWireFormat, WireFormatOptions},
        stomp::StompFormat,
    },
};
use std::{sync::Arc, time::Duration};

/// Creates a started-when-you-say-so transport for the given URI; the
/// returned stack still needs `set_listener` and `start`.
pub fn create(uri: &str) -> AmqResult<Arc<dyn Transport>> {
    if uri.starts_with("failover:") {
        let composite = CompositeUri::parse(uri)?;
        let failover = FailoverTransport::from_composite(&composite)?;
        return Ok(failover as Arc<dyn Transport>);
    }
    create_inner_stack(&BrokerUri::parse(uri)?)
}

// Which codec a URI asks for.
fn wants_stomp(uri: &BrokerUri) -> bool {
    uri.scheme().starts_with("stomp") || uri.option("wireFormat") == Some("stomp")
}

pub(crate) fn create_inner_stack(uri: &BrokerUri) -> AmqResult<Arc<dyn Transport>> {
    let stack: Arc<dyn Transport> = match uri.scheme() {
        "mock" => MockTransport::create(uri)? as Arc<dyn Transport>,

        "tcp" | "ssl" | "stomp" | "stomp+ssl" => {
            let ssl = uri.scheme().ends_with("ssl");
            let connection = if ssl {
                TcpConnection::connect_ssl(uri)?
            } else {
                TcpConnection::connect(uri)?
            };

            if wants_stomp(uri) {
                let format: Arc<dyn WireFormat> = Arc::new(StompFormat::default());
                let io = Arc::new(IoTransport::new(connection, format));
                maybe_traced(io as Arc<dyn Transport>, uri)
            } else {
                let format: Arc<dyn WireFormat> =
                    Arc::new(OpenWireFormat::new(WireFormatOptions::from_uri(uri)));
                let io = Arc::new(IoTransport::new(connection, Arc::clone(&format)));
                let lower = maybe_traced(io as Arc<dyn Transport>, uri);
                let monitored = InactivityMonitor::wrap(lower, Arc::clone(&format));
                let timeout = Duration::from_millis(
                    uri.i64_option("negotiationTimeout", 15_000).unsigned_abs(),
                );
                WireFormatNegotiator::wrap(monitored as Arc<dyn Transport>, format, timeout)
                    as Arc<dyn Transport>
            }
        }

        other => {
            return Err(AmqError::Unsupported(format!(
                "no transport for scheme {other:?}"
            )));
        }
    };

    let serialized = MutexTransport::wrap(stack);
    Ok(ResponseCorrelator::wrap(serialized as Arc<dyn Transport>) as Arc<dyn Transport>)
}

fn maybe_traced(transport: Arc<dyn Transport>, uri: &BrokerUri) -> Arc<dyn Transport> {
    if uri.bool_option("trace", false) {
        LoggingTransport::wrap(transport) as Arc<dyn Transport>
    } else {
        transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            create("carrier-pigeon://coop:1"),
            Err(AmqError::Unsupported(_))
        ));
    }

    #[test]
    fn mock_stack_supports_request() {
        let transport = create("mock://localhost:61616").unwrap();
        transport.start().unwrap();
        let response = transport
            .request(
                crate::commands::Command::new(crate::commands::CommandBody::KeepAliveInfo),
                Some(Duration::from_secs(1)),
            )
            .unwrap();
        assert!(response.is_response());
        transport.close().unwrap();
    }

    #[test]
    fn fail_on_create_mocks_refuse() {
        assert!(create("mock://localhost:61616?failOnCreate=true").is_err());
    }
}
