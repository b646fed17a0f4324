use crate::commands::{ConnectionId, TransactionId};

/// Drives the transaction state machine on the broker.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionInfo {
    pub connection_id: ConnectionId,
    pub transaction_id: Option<TransactionId>,
    pub transaction_type: u8,
}

impl TransactionInfo {
    pub const BEGIN: u8 = 0;
    pub const PREPARE: u8 = 1;
    pub const COMMIT_ONE_PHASE: u8 = 2;
    pub const COMMIT_TWO_PHASE: u8 = 3;
    pub const ROLLBACK: u8 = 4;
    pub const RECOVER: u8 = 5;
    pub const FORGET: u8 = 6;
    pub const END: u8 = 7;

    pub fn new(
        connection_id: ConnectionId,
        transaction_id: TransactionId,
        transaction_type: u8,
    ) -> Self {
        Self {
            connection_id,
            transaction_id: Some(transaction_id),
            transaction_type,
        }
    }

    /// True for the operations that terminate a transaction.
    pub fn is_completion(&self) -> bool {
        matches!(
            self.transaction_type,
            Self::COMMIT_ONE_PHASE | Self::COMMIT_TWO_PHASE | Self::ROLLBACK | Self::FORGET
        )
    }
}
