//! Opaque identifiers used on the wire and for event correlation.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a node, unique across all partitions of a repository.
    NodeId
);

string_id!(
    /// Identifier of a command, unique per participation.
    CommandId
);

string_id!(
    /// Identifier of one participant's session with a repository.
    ParticipationId
);

string_id!(
    /// Identifier correlating a query request with its response.
    QueryId
);

/// The origin of one command: which participation issued it, under which id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSource {
    /// Participation that issued the command
    pub participation_id: ParticipationId,
    /// Command id within that participation
    pub command_id: CommandId,
}

impl CommandSource {
    /// Create a new command source.
    #[must_use]
    pub fn new(
        participation_id: impl Into<ParticipationId>,
        command_id: impl Into<CommandId>,
    ) -> Self {
        Self {
            participation_id: participation_id.into(),
            command_id: command_id.into(),
        }
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.participation_id, self.command_id)
    }
}

/// Correlation key of a semantic partition event.
///
/// Events produced by local mutations get a forest-local counter value.
/// Events produced from received commands or events keep the full list of
/// command sources they stem from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventId {
    /// Minted by the forest for a local mutation
    Local(u64),
    /// Stems from one or more commands, in origin order
    Commands(Vec<CommandSource>),
}

impl EventId {
    /// Correlation key for an event caused by a single command.
    #[must_use]
    pub fn command(source: CommandSource) -> Self {
        Self::Commands(vec![source])
    }

    /// Whether this event was produced by a mutation of the local forest.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The command sources this event stems from; empty for local events.
    #[must_use]
    pub fn sources(&self) -> &[CommandSource] {
        match self {
            Self::Local(_) => &[],
            Self::Commands(sources) => sources,
        }
    }
}
