/// The four destination flavors a broker knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Queue,
    Topic,
    TempQueue,
    TempTopic,
}

impl DestinationKind {
    pub fn is_temporary(self) -> bool {
        matches!(self, Self::TempQueue | Self::TempTopic)
    }

    pub fn is_queue(self) -> bool {
        matches!(self, Self::Queue | Self::TempQueue)
    }

    pub fn is_topic(self) -> bool {
        matches!(self, Self::Topic | Self::TempTopic)
    }
}

/// A named destination on the broker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    pub kind: DestinationKind,
    pub physical_name: String,
}

impl Destination {
    pub fn queue<S: Into<String>>(name: S) -> Self {
        Self {
            kind: DestinationKind::Queue,
            physical_name: name.into(),
        }
    }

    pub fn topic<S: Into<String>>(name: S) -> Self {
        Self {
            kind: DestinationKind::Topic,
            physical_name: name.into(),
        }
    }

    pub fn temp_queue<S: Into<String>>(name: S) -> Self {
        Self {
            kind: DestinationKind::TempQueue,
            physical_name: name.into(),
        }
    }

    pub fn temp_topic<S: Into<String>>(name: S) -> Self {
        Self {
            kind: DestinationKind::TempTopic,
            physical_name: name.into(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.kind.is_temporary()
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let prefix = match self.kind {
            DestinationKind::Queue => "queue://",
            DestinationKind::Topic => "topic://",
            DestinationKind::TempQueue => "temp-queue://",
            DestinationKind::TempTopic => "temp-topic://",
        };
        write!(f, "{prefix}{}", self.physical_name)
    }
}
