//! Per-session request numbering.
//!
//! A session is owned by exactly one task, so the counter is a plain integer
//! behind `&mut self`.  Sequence number 0 never labels a request: an agent
//! that cannot read a header answers with 0, and a requester must never
//! mistake that for a reply to one of its own requests.

/// Hands out request sequence numbers `1, 2, 3, ...` for one session.
///
/// ```rust
/// use woop_core::protocol::SequenceCounter;
///
/// let mut seq = SequenceCounter::new();
/// assert_eq!(seq.next(), 1);
/// assert_eq!(seq.next(), 2);
/// assert_eq!(seq.last_issued(), Some(2));
/// ```
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    last: u64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next request number.  Wraps from `u64::MAX` to 1, skipping 0.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        self.last = self.last.checked_add(1).unwrap_or(1);
        self.last
    }

    /// Most recently issued number, if any.
    pub fn last_issued(&self) -> Option<u64> {
        (self.last != 0).then_some(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_one() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.last_issued(), None);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn test_wrap_skips_zero() {
        // Arrange
        let mut seq = SequenceCounter { last: u64::MAX - 1 };

        // Act
        let numbers = [seq.next(), seq.next()];

        // Assert
        assert_eq!(numbers, [u64::MAX, 1]);
    }

    #[test]
    fn test_last_issued_tracks_next() {
        let mut seq = SequenceCounter::new();
        seq.next();
        seq.next();
        assert_eq!(seq.last_issued(), Some(2));
    }
}
