use std::fmt;

/// Which replica a transaction reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Durability of the data a transaction reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConcern {
    Local,
    Majority,
    Snapshot,
}

/// Acknowledgement required before a commit returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteConcern {
    /// Acknowledged by the given number of nodes
    Nodes(u32),
    Majority,
}

/// Options applied when a transaction starts.
///
/// `Default` is the policy used for every transaction a unit of work opens:
/// primary reads, majority read concern, majority write concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub read_preference: ReadPreference,
    pub read_concern: ReadConcern,
    pub write_concern: WriteConcern,
}

impl TransactionOptions {
    pub fn majority() -> Self {
        Self {
            read_preference: ReadPreference::Primary,
            read_concern: ReadConcern::Majority,
            write_concern: WriteConcern::Majority,
        }
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self::majority()
    }
}

impl fmt::Display for TransactionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "readPreference={:?}, readConcern={:?}, writeConcern={:?}",
            self.read_preference, self.read_concern, self.write_concern
        )
    }
}
