//! Ordering checks for received event streams.

use lionsync_core::{DeltaError, Result};

/// What to do with a received sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The next number in the stream
    Accept,
    /// Already seen; drop the event
    Duplicate,
}

/// Tracks the next expected sequence number of one stream.
///
/// Duplicates are dropped and gaps are reported; nothing is buffered or
/// reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    expected: Option<u64>,
}

impl SequenceTracker {
    /// Accept whatever number arrives first.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the stream to continue at `next`, e.g. after a reconnect.
    #[must_use]
    pub fn expecting(next: u64) -> Self {
        Self { expected: Some(next) }
    }

    /// The number the next accepted event must carry, if known.
    #[must_use]
    pub fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// Classify a received number without recording it.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::SequenceGap`] if numbers were skipped.
    pub fn check(&self, received: u64) -> Result<Admission> {
        match self.expected {
            None => Ok(Admission::Accept),
            Some(expected) if received == expected => Ok(Admission::Accept),
            Some(expected) if received < expected => Ok(Admission::Duplicate),
            Some(expected) => Err(DeltaError::SequenceGap { expected, received }),
        }
    }

    /// Record that the event numbered `received` was applied.
    pub fn record(&mut self, received: u64) {
        self.expected = Some(received.saturating_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_sets_the_expectation() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.check(41).unwrap(), Admission::Accept);
        tracker.record(41);

        assert_eq!(tracker.expected(), Some(42));
        assert_eq!(tracker.check(42).unwrap(), Admission::Accept);
    }

    #[test]
    fn duplicates_are_dropped_and_gaps_reported() {
        let mut tracker = SequenceTracker::expecting(5);
        tracker.record(5);

        assert_eq!(tracker.check(5).unwrap(), Admission::Duplicate);
        assert_eq!(tracker.check(2).unwrap(), Admission::Duplicate);
        assert_eq!(
            tracker.check(8),
            Err(DeltaError::SequenceGap {
                expected: 6,
                received: 8
            })
        );
    }

    #[test]
    fn check_does_not_advance() {
        let tracker = SequenceTracker::expecting(0);
        assert_eq!(tracker.check(0).unwrap(), Admission::Accept);
        assert_eq!(tracker.check(0).unwrap(), Admission::Accept);
    }
}
