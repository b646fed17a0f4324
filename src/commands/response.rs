use crate::commands::{BrokerError, data_structure::DataStructure};

/// The broker's positive answer to a `response_required` command.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    pub correlation_id: i32,
}

/// The broker's negative answer, carrying the remote exception.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExceptionResponse {
    pub correlation_id: i32,
    pub exception: Option<BrokerError>,
}

/// A response carrying one nested data structure.
#[derive(Clone, Debug, PartialEq)]
pub struct DataResponse {
    pub correlation_id: i32,
    pub data: Option<DataStructure>,
}

/// A response carrying an array of nested data structures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataArrayResponse {
    pub correlation_id: i32,
    pub data: Vec<DataStructure>,
}

/// A response carrying a single integer, used for transaction recovery.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegerResponse {
    pub correlation_id: i32,
    pub result: i32,
}
