//! Message Log
//!
//! Append-only ordered record of session events for display. Entries are
//! never removed, mutated, or reordered; insertion order is display order.

/// Who produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Payload dispatched by the caller
    Sent,
    /// Payload delivered by the transport, forwarded verbatim
    Received,
    /// Connection lifecycle event recorded by the handle
    System,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Sent => write!(f, "sent"),
            Direction::Received => write!(f, "received"),
            Direction::System => write!(f, "system"),
        }
    }
}

/// An immutable log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub direction: Direction,
    pub payload: String,
    /// Monotonic index assigned at append time
    pub sequence: u64,
}

/// Append-only session log keyed by a monotonically increasing sequence
/// number. No capacity bound is imposed here; a presentation layer may cap
/// what it renders.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    next_sequence: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its sequence number. Always succeeds.
    pub fn append(&mut self, direction: Direction, payload: &str) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(LogEntry {
            direction,
            payload: payload.to_string(),
            sequence,
        });
        sequence
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries with a sequence number at or above `sequence`.
    pub fn entries_since(&self, sequence: u64) -> &[LogEntry] {
        let start = self
            .entries
            .partition_point(|entry| entry.sequence < sequence);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(Direction::Sent, "first");
        log.append(Direction::Received, "second");
        log.append(Direction::System, "third");

        let payloads: Vec<&str> = log.entries().iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_sequences_strictly_increase() {
        let mut log = MessageLog::new();
        let a = log.append(Direction::Sent, "a");
        let b = log.append(Direction::Received, "b");
        let c = log.append(Direction::Sent, "c");
        assert!(a < b && b < c);

        for pair in log.entries().windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
        }
    }

    #[test]
    fn test_entries_since() {
        let mut log = MessageLog::new();
        log.append(Direction::Sent, "a");
        let b = log.append(Direction::Sent, "b");
        log.append(Direction::Sent, "c");

        let tail = log.entries_since(b);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].payload, "b");

        assert!(log.entries_since(100).is_empty());
    }

    #[test]
    fn test_empty_log() {
        let log = MessageLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.entries().is_empty());
    }
}
