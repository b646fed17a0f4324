use crate::{AmqError, AmqResult};

/// Identifies one client connection to a broker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub value: String,
}

impl ConnectionId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Identifies a session within a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionId {
    pub connection_id: String,
    pub value: i64,
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.connection_id, self.value)
    }
}

/// Identifies a consumer within a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConsumerId {
    pub connection_id: String,
    pub session_id: i64,
    pub value: i64,
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.connection_id, self.session_id, self.value)
    }
}

/// Identifies a producer within a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProducerId {
    pub connection_id: String,
    pub session_id: i64,
    pub value: i64,
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.connection_id, self.session_id, self.value)
    }
}

/// Identifies a single message sent by a producer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub producer_id: ProducerId,
    pub producer_sequence_id: i64,
    pub broker_sequence_id: i64,
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.producer_id, self.producer_sequence_id)
    }
}

/// Identifies one broker in a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BrokerId {
    pub value: String,
}

/// Identifies a transaction, either connection-local or distributed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransactionId {
    Local(LocalTransactionId),
    Xa(XaTransactionId),
}

impl TransactionId {
    pub fn local<S: Into<String>>(connection_id: S, value: i64) -> Self {
        Self::Local(LocalTransactionId {
            connection_id: connection_id.into(),
            value,
        })
    }

    pub fn is_xa(&self) -> bool {
        matches!(self, Self::Xa(_))
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Local(id) => write!(f, "TX:{}:{}", id.connection_id, id.value),
            Self::Xa(id) => {
                write!(f, "XID:{}:", id.format_id)?;
                for b in &id.global_transaction_id {
                    write!(f, "{b:02x}")?;
                }
                write!(f, ":")?;
                for b in &id.branch_qualifier {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalTransactionId {
    pub connection_id: String,
    pub value: i64,
}

/// An X/Open XA transaction branch identifier.
///
/// Branch qualifier and global transaction id are limited to 64 bytes each.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct XaTransactionId {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

pub(crate) const MAX_XID_PART: usize = 64;

impl XaTransactionId {
    pub fn new(
        format_id: i32,
        global_transaction_id: Vec<u8>,
        branch_qualifier: Vec<u8>,
    ) -> AmqResult<Self> {
        if global_transaction_id.len() > MAX_XID_PART {
            return Err(AmqError::Invalid("global transaction id exceeds 64 bytes"));
        }
        if branch_qualifier.len() > MAX_XID_PART {
            return Err(AmqError::Invalid("branch qualifier exceeds 64 bytes"));
        }
        Ok(Self {
            format_id,
            global_transaction_id,
            branch_qualifier,
        })
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xid_parts_are_bounded() {
        assert!(XaTransactionId::new(1, vec![1; 64], vec![2; 64]).is_ok());
        assert!(XaTransactionId::new(1, vec![1; 65], vec![]).is_err());
        assert!(XaTransactionId::new(1, vec![], vec![2; 65]).is_err());
    }

    #[test]
    fn id_string_forms() {
        let consumer = ConsumerId {
            connection_id: "ID:client-1".to_string(),
            session_id: 2,
            value: 5,
        };
        assert_eq!(consumer.to_string(), "ID:client-1:2:5");

        let message = MessageId {
            producer_id: ProducerId {
                connection_id: "ID:client-1".to_string(),
                session_id: 1,
                value: 3,
            },
            producer_sequence_id: 7,
            broker_sequence_id: 0,
        };
        assert_eq!(message.to_string(), "ID:client-1:1:3:7");
    }
}
