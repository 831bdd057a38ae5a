//! # lionsync protocol
//!
//! Delta protocol message catalogue and wire encodings.
//!
//! ## Messages
//!
//! - `DeltaCommand`: single or composite requests to mutate shared state
//! - `SequencedEvent`: agreed facts with old and new state, stamped with a
//!   stream sequence number
//! - `QueryRequest`/`QueryResponse`: session and subscription handling
//! - `CommandResponse`/`ErrorEvent`: acknowledgement and rejection
//!
//! Every catalogue variant has a stable `kind()`, which is also the
//! `messageKind` tag on the wire. [`DeltaMessage`] encodes to JSON and CBOR.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod event;
pub mod kind;
pub mod message;
pub mod query;

pub use command::{CommandKind, CompositeCommand, DeltaCommand, SingleCommand};
pub use event::{CompositeEvent, DeltaEvent, EventKind, SequencedEvent, SingleEvent};
pub use kind::{MessageCategory, UnknownCategory, DELTA_PROTOCOL_VERSION};
pub use message::{
    CommandResponse, DeltaMessage, ErrorEvent, MessageError, ProtocolMessage, ProtocolMessageData,
};
pub use query::{QueryRequest, QueryRequestKind, QueryResponse, QueryResponseKind};
