use crate::commands::BrokerId;

/// Broker self-description sent right after connect.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrokerInfo {
    pub broker_id: Option<BrokerId>,
    pub broker_url: Option<String>,
    pub peer_broker_infos: Vec<BrokerInfo>,
    pub broker_name: Option<String>,
    pub slave_broker: bool,
    pub master_broker: bool,
    pub fault_tolerant_configuration: bool,
    pub duplex_connection: bool,
    pub network_connection: bool,
    pub connection_id: i64,
    pub broker_upload_url: Option<String>,
    pub network_properties: Option<String>,
}

/// A discovery agent's sighting of a broker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscoveryEvent {
    pub service_name: Option<String>,
    pub broker_name: Option<String>,
}
