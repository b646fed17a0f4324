use crate::commands::{
    Command, CommandBody, DataStructure, TransactionId,
};

// What a tracked entry is, which decides when it leaves the tracker again.
#[derive(Debug, PartialEq)]
enum EntryKind {
    // connection, session, consumer, producer announcements; replayed until
    // explicitly removed
    Structural,
    // an open transaction's operations, dropped when it completes
    Transaction(TransactionId),
    // an in-flight send, dropped on completion or byte-cap eviction
    Message,
}

#[derive(Debug)]
struct TrackedEntry {
    token: u64,
    kind: EntryKind,
    command: Command,
    weight: usize,
}

/// The commands that must survive a reconnect, in insertion order.
///
/// Structural state stays until its RemoveInfo arrives and is never evicted;
/// only tracked message sends count against the byte cap.
#[derive(Debug)]
pub(crate) struct ConnectionStateTracker {
    track_messages: bool,
    max_cache_size: usize,
    message_bytes: usize,
    next_token: u64,
    entries: Vec<TrackedEntry>,
}

impl ConnectionStateTracker {
    pub fn new(track_messages: bool, max_cache_size: usize) -> Self {
        Self {
            track_messages,
            max_cache_size,
            message_bytes: 0,
            next_token: 0,
            entries: Vec::new(),
        }
    }

    /// Whether this command would be kept for replay.
    pub fn is_trackable(&self, command: &Command) -> bool {
        match &command.body {
            CommandBody::ConnectionInfo(_)
            | CommandBody::SessionInfo(_)
            | CommandBody::ConsumerInfo(_)
            | CommandBody::ProducerInfo(_) => true,
            CommandBody::TransactionInfo(info) => !info.is_completion(),
            CommandBody::Message(_) => self.track_messages,
            _ => false,
        }
    }

    /// Records or applies a command. Returns a token when an entry was
    /// added that the caller may later complete (message sends).
    pub fn track(&mut self, command: &Command) -> Option<u64> {
        match &command.body {
            CommandBody::ConnectionInfo(_)
            | CommandBody::SessionInfo(_)
            | CommandBody::ConsumerInfo(_)
            | CommandBody::ProducerInfo(_) => {
                // a re-announcement replaces the older entry in place of its
                // original position; order within the list stays insertion
                self.entries
                    .retain(|e| e.kind != EntryKind::Structural || e.command.body != command.body);
                self.push(EntryKind::Structural, command, 0);
                None
            }

            CommandBody::RemoveInfo(info) => {
                self.remove_structural(&info.object_id);
                None
            }

            CommandBody::ShutdownInfo => {
                self.entries.clear();
                self.message_bytes = 0;
                None
            }

            CommandBody::TransactionInfo(info) => {
                let Some(transaction_id) = info.transaction_id.clone() else {
                    return None;
                };
                if info.is_completion() {
                    self.remove_transaction(&transaction_id);
                    None
                } else {
                    self.push(EntryKind::Transaction(transaction_id), command, 0);
                    None
                }
            }

            CommandBody::Message(message) if self.track_messages => {
                let weight = message
                    .marshalled_content()
                    .ok()
                    .flatten()
                    .map_or(0, |c| c.len())
                    + 64;
                let token = self.push(EntryKind::Message, command, weight);
                self.message_bytes += weight;
                self.evict_messages();
                Some(token)
            }

            _ => None,
        }
    }

    /// Drops a message entry once its response arrived.
    pub fn complete(&mut self, token: u64) {
        if let Some(index) = self.entries.iter().position(|e| e.token == token) {
            let entry = self.entries.remove(index);
            if entry.kind == EntryKind::Message {
                self.message_bytes = self.message_bytes.saturating_sub(entry.weight);
            }
        }
    }

    /// The commands to replay on a fresh transport, in insertion order.
    pub fn replay_commands(&self) -> Vec<Command> {
        self.entries.iter().map(|e| e.command.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.message_bytes = 0;
    }

    fn push(&mut self, kind: EntryKind, command: &Command, weight: usize) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.entries.push(TrackedEntry {
            token,
            kind,
            command: command.clone(),
            weight,
        });
        token
    }

    fn evict_messages(&mut self) {
        while self.message_bytes > self.max_cache_size {
            let Some(index) = self
                .entries
                .iter()
                .position(|e| e.kind == EntryKind::Message)
            else {
                break;
            };
            let evicted = self.entries.remove(index);
            self.message_bytes = self.message_bytes.saturating_sub(evicted.weight);
            trace!("evicted a tracked message of {} bytes", evicted.weight);
        }
    }

    fn remove_structural(&mut self, object_id: &DataStructure) {
        self.entries.retain(|entry| {
            if entry.kind != EntryKind::Structural {
                return true;
            }
            !removes(object_id, &entry.command)
        });
    }

    fn remove_transaction(&mut self, transaction_id: &TransactionId) {
        self.entries.retain(|entry| match &entry.kind {
            EntryKind::Transaction(id) => id != transaction_id,
            EntryKind::Message => match &entry.command.body {
                CommandBody::Message(message) => {
                    message.transaction_id.as_ref() != Some(transaction_id)
                }
                _ => true,
            },
            EntryKind::Structural => true,
        });
        self.message_bytes = self
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Message)
            .map(|e| e.weight)
            .sum();
    }
}

// Does removing `object_id` retire the given tracked announcement?
// Removing a connection retires everything announced under it.
fn removes(object_id: &DataStructure, tracked: &Command) -> bool {
    match (object_id, &tracked.body) {
        (DataStructure::ConnectionId(id), CommandBody::ConnectionInfo(info)) => {
            info.connection_id == *id
        }
        (DataStructure::ConnectionId(id), CommandBody::SessionInfo(info)) => {
            info.session_id.connection_id == id.value
        }
        (DataStructure::ConnectionId(id), CommandBody::ConsumerInfo(info)) => {
            info.consumer_id.connection_id == id.value
        }
        (DataStructure::ConnectionId(id), CommandBody::ProducerInfo(info)) => {
            info.producer_id.connection_id == id.value
        }
        (DataStructure::SessionId(id), CommandBody::SessionInfo(info)) => info.session_id == *id,
        (DataStructure::SessionId(id), CommandBody::ConsumerInfo(info)) => {
            info.consumer_id.connection_id == id.connection_id
                && info.consumer_id.session_id == id.value
        }
        (DataStructure::SessionId(id), CommandBody::ProducerInfo(info)) => {
            info.producer_id.connection_id == id.connection_id
                && info.producer_id.session_id == id.value
        }
        (DataStructure::ConsumerId(id), CommandBody::ConsumerInfo(info)) => {
            info.consumer_id == *id
        }
        (DataStructure::ProducerId(id), CommandBody::ProducerInfo(info)) => {
            info.producer_id == *id
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{
        ConnectionId, ConnectionInfo, ConsumerId, ConsumerInfo, Destination, Message, RemoveInfo,
        SessionId, SessionInfo, TransactionInfo,
    };

    fn connection_info() -> Command {
        Command::new(CommandBody::ConnectionInfo(ConnectionInfo::new(
            ConnectionId::new("c1"),
        )))
    }

    fn session_info(value: i64) -> Command {
        Command::new(CommandBody::SessionInfo(SessionInfo {
            session_id: SessionId {
                connection_id: "c1".to_string(),
                value,
            },
        }))
    }

    fn consumer_info(value: i64) -> Command {
        let id = ConsumerId {
            connection_id: "c1".to_string(),
            session_id: 1,
            value,
        };
        Command::new(CommandBody::ConsumerInfo(Box::new(ConsumerInfo::new(
            id,
            Destination::queue("Q"),
        ))))
    }

    #[test]
    fn replays_in_insertion_order() {
        let mut tracker = ConnectionStateTracker::new(false, 1024);
        let commands = vec![
            connection_info(),
            session_info(1),
            session_info(2),
            session_info(3),
            consumer_info(1),
            consumer_info(2),
        ];
        for command in &commands {
            tracker.track(command);
        }
        assert_eq!(tracker.replay_commands(), commands);
    }

    #[test]
    fn remove_info_retires_the_announcement() {
        let mut tracker = ConnectionStateTracker::new(false, 1024);
        tracker.track(&connection_info());
        tracker.track(&consumer_info(1));
        tracker.track(&consumer_info(2));
        let remove = Command::new(CommandBody::RemoveInfo(RemoveInfo::for_consumer(
            ConsumerId {
                connection_id: "c1".to_string(),
                session_id: 1,
                value: 1,
            },
        )));
        tracker.track(&remove);
        let replay = tracker.replay_commands();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[1], consumer_info(2));
    }

    #[test]
    fn removing_the_connection_retires_everything_under_it() {
        let mut tracker = ConnectionStateTracker::new(false, 1024);
        tracker.track(&connection_info());
        tracker.track(&session_info(1));
        tracker.track(&consumer_info(1));
        tracker.track(&Command::new(CommandBody::RemoveInfo(
            RemoveInfo::for_connection(ConnectionId::new("c1")),
        )));
        assert!(tracker.replay_commands().is_empty());
    }

    #[test]
    fn transactions_are_dropped_on_completion() {
        let mut tracker = ConnectionStateTracker::new(true, 1024);
        let tx = crate::commands::TransactionId::local("c1", 9);
        let begin = Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
            ConnectionId::new("c1"),
            tx.clone(),
            TransactionInfo::BEGIN,
        )));
        tracker.track(&begin);
        let mut message = Message::text("in tx");
        message.transaction_id = Some(tx.clone());
        tracker.track(&Command::message(message));
        assert_eq!(tracker.replay_commands().len(), 2);

        let commit = Command::new(CommandBody::TransactionInfo(TransactionInfo::new(
            ConnectionId::new("c1"),
            tx,
            TransactionInfo::COMMIT_ONE_PHASE,
        )));
        tracker.track(&commit);
        assert!(tracker.replay_commands().is_empty());
    }

    #[test]
    fn message_cache_is_byte_capped() {
        let mut tracker = ConnectionStateTracker::new(true, 1000);
        tracker.track(&connection_info());
        for _ in 0..10 {
            // each entry weighs ~200 bytes of body plus overhead
            tracker.track(&Command::message(Message::text("x".repeat(200))));
        }
        let replay = tracker.replay_commands();
        // the structural entry survives, old messages were evicted
        assert_eq!(replay[0], connection_info());
        assert!(replay.len() < 11);
    }

    #[test]
    fn completion_drops_a_tracked_message() {
        let mut tracker = ConnectionStateTracker::new(true, 100_000);
        let token = tracker
            .track(&Command::message(Message::text("payload")))
            .unwrap();
        assert_eq!(tracker.replay_commands().len(), 1);
        tracker.complete(token);
        assert!(tracker.replay_commands().is_empty());
    }

    #[test]
    fn untracked_commands_are_ignored() {
        let mut tracker = ConnectionStateTracker::new(false, 1024);
        tracker.track(&Command::message(Message::text("not tracked")));
        tracker.track(&Command::new(CommandBody::KeepAliveInfo));
        assert!(tracker.replay_commands().is_empty());
    }
}
