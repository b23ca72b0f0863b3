//! Backend commands grouped for a single round trip

use std::time::Duration;

/// A single write against the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add `member` to the set stored at `set`
    AddMember { set: String, member: String },

    /// Store `value` at `key`, replacing whatever was there
    Put {
        key: String,
        value: String,
        expiry: Option<Duration>,
    },

    /// Remove `key`; a missing key is not an error
    Delete { key: String },
}

impl Command {
    /// The backend key this command touches
    pub fn key(&self) -> &str {
        match self {
            Command::AddMember { set, .. } => set,
            Command::Put { key, .. } => key,
            Command::Delete { key } => key,
        }
    }
}

/// An ordered list of commands sent together.
///
/// Whether the batch is applied all-or-nothing or merely pipelined is decided
/// by the [`Storage`](crate::storage::Storage) method it is handed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn add_member(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::AddMember {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        expiry: Option<Duration>,
    ) -> &mut Self {
        self.commands.push(Command::Put {
            key: key.into(),
            value: value.into(),
            expiry,
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Delete { key: key.into() });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
