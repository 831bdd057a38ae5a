//! Sources of command ids, participation ids and sequence numbers.
//!
//! Providers take `&self` so one instance can be shared between a sender and
//! the code that issues commands; wrap it in an [`Arc`] to share ownership.

use crate::ids::{CommandId, ParticipationId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Issues command ids, unique per participation.
pub trait CommandIdProvider {
    /// The next unused command id.
    fn next_command_id(&self) -> CommandId;
}

/// Names the participation this process takes part in.
pub trait ParticipationIdProvider {
    /// The current participation id.
    fn participation_id(&self) -> ParticipationId;
}

/// Issues sequence numbers for one event stream.
pub trait SequenceNumberProvider {
    /// The next sequence number, strictly greater than all previous ones.
    fn next_sequence_number(&self) -> u64;
}

impl<T: CommandIdProvider + ?Sized> CommandIdProvider for Arc<T> {
    fn next_command_id(&self) -> CommandId {
        (**self).next_command_id()
    }
}

impl<T: ParticipationIdProvider + ?Sized> ParticipationIdProvider for Arc<T> {
    fn participation_id(&self) -> ParticipationId {
        (**self).participation_id()
    }
}

impl<T: SequenceNumberProvider + ?Sized> SequenceNumberProvider for Arc<T> {
    fn next_sequence_number(&self) -> u64 {
        (**self).next_sequence_number()
    }
}

/// Random v4 UUIDs as command ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCommandIds;

impl CommandIdProvider for UuidCommandIds {
    fn next_command_id(&self) -> CommandId {
        CommandId::new(Uuid::new_v4().to_string())
    }
}

/// Command ids of the form `{prefix}-{n}`, counting from zero.
#[derive(Debug)]
pub struct PrefixedCommandIds {
    prefix: String,
    next: AtomicU64,
}

impl PrefixedCommandIds {
    /// Create a counter with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl CommandIdProvider for PrefixedCommandIds {
    fn next_command_id(&self) -> CommandId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        CommandId::new(format!("{}-{n}", self.prefix))
    }
}

/// A participation id fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedParticipation(ParticipationId);

impl FixedParticipation {
    /// Use the given participation id.
    #[must_use]
    pub fn new(id: impl Into<ParticipationId>) -> Self {
        Self(id.into())
    }

    /// Generate a random participation id.
    #[must_use]
    pub fn random() -> Self {
        Self(ParticipationId::new(Uuid::new_v4().to_string()))
    }
}

impl ParticipationIdProvider for FixedParticipation {
    fn participation_id(&self) -> ParticipationId {
        self.0.clone()
    }
}

/// Monotonic, gap-free sequence numbers.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: AtomicU64,
}

impl SequenceCounter {
    /// Start counting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`, e.g. after a reconnect.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// The number the next call will return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl SequenceNumberProvider for SequenceCounter {
    fn next_sequence_number(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequence_is_strictly_increasing_without_gaps() {
        let counter = SequenceCounter::starting_at(5);
        let numbers: Vec<u64> = (0..4).map(|_| counter.next_sequence_number()).collect();

        assert_eq!(numbers, vec![5, 6, 7, 8]);
        assert_eq!(counter.peek(), 9);
    }

    #[test]
    fn shared_counter_advances_once_per_call() {
        let counter = Arc::new(SequenceCounter::new());
        let other = Arc::clone(&counter);

        assert_eq!(counter.next_sequence_number(), 0);
        assert_eq!(other.next_sequence_number(), 1);
    }

    #[test]
    fn command_ids_are_unique() {
        let prefixed = PrefixedCommandIds::new("cmd");
        assert_eq!(prefixed.next_command_id(), CommandId::from("cmd-0"));
        assert_eq!(prefixed.next_command_id(), CommandId::from("cmd-1"));

        let ids: HashSet<_> = (0..100).map(|_| UuidCommandIds.next_command_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn fixed_participation_is_stable() {
        let participation = FixedParticipation::new("p-1");
        assert_eq!(participation.participation_id(), participation.participation_id());
        assert_ne!(FixedParticipation::random(), FixedParticipation::random());
    }
}
