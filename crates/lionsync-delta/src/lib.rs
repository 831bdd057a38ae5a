//! # lionsync delta
//!
//! Moves changes between a forest and the delta protocol.
//!
//! Four mappers translate between semantic partition events and wire
//! messages:
//!
//! | Mapper | From | To |
//! |---|---|---|
//! | [`ApplyMapper`] | received command | partition event |
//! | [`PublishMapper`] | local partition event | command |
//! | [`ReplicateUpMapper`] | partition event | sequenced event |
//! | [`ReplicateDownMapper`] | received event | partition event |
//!
//! Receivers drive the inbound mappers and apply their output to a forest
//! all-or-nothing. Senders hook the outbound mappers onto the forest's
//! event bus.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod publish;
pub mod receiver;
pub mod replicate_down;
pub mod replicate_up;
mod resolve;
pub mod sender;
pub mod sequence;

pub use apply::ApplyMapper;
pub use publish::PublishMapper;
pub use receiver::{CommandReceiver, EventReceiver, EventReceiverConfig};
pub use replicate_down::ReplicateDownMapper;
pub use replicate_up::ReplicateUpMapper;
pub use sender::{CommandSender, EventSender};
pub use sequence::{Admission, SequenceTracker};
