//! Stable message kinds and message categories.
//!
//! Every catalogue enum carries its variant name as the `messageKind` tag on
//! the wire, and exposes the same string through `kind()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a catalogue enum tagged by `messageKind` with a matching `kind()`.
macro_rules! message_kinds {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident $({
                    $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)?
                })?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        #[serde(tag = "messageKind", rename_all_fields = "camelCase")]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant $({ $($(#[$fmeta])* $field: $ty),* })?
            ),*
        }

        impl $name {
            /// Stable discriminant, also the `messageKind` tag on the wire.
            #[must_use]
            pub fn kind(&self) -> &'static str {
                match self {
                    $(Self::$variant { .. } => stringify!($variant)),*
                }
            }
        }
    };
}

pub(crate) use message_kinds;

/// Version string sent with `SignOn`.
pub const DELTA_PROTOCOL_VERSION: &str = "2025.1";

/// The independently dispatchable message categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageCategory {
    /// Request to mutate
    Command,
    /// Agreed fact, sequenced
    Event,
    /// Session or subscription request
    QueryRequest,
    /// Answer to a query request
    QueryResponse,
    /// Acknowledgement of a command
    CommandResponse,
    /// Rejection of a command
    Error,
}

impl MessageCategory {
    /// All categories, in declaration order.
    pub const ALL: [MessageCategory; 6] = [
        MessageCategory::Command,
        MessageCategory::Event,
        MessageCategory::QueryRequest,
        MessageCategory::QueryResponse,
        MessageCategory::CommandResponse,
        MessageCategory::Error,
    ];

    /// Wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageCategory::Command => "command",
            MessageCategory::Event => "event",
            MessageCategory::QueryRequest => "queryRequest",
            MessageCategory::QueryResponse => "queryResponse",
            MessageCategory::CommandResponse => "commandResponse",
            MessageCategory::Error => "error",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category name that is not part of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for MessageCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
