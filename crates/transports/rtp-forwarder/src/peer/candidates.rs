//! Buffer for local ICE candidates gathered before negotiation completes
//!
//! The engine reports local candidates from its own tasks as soon as the
//! local description is applied, which for the answer flow is before the
//! remote description is. Candidates found in that window are held here
//! and flushed, in discovery order, once the remote description is in.

use parking_lot::Mutex;

/// Where a candidate went when it was offered to the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<C> {
    /// Held until the buffer is drained
    Buffered,
    /// Buffer already drained; the caller must transmit the candidate itself
    Closed(C),
}

#[derive(Debug)]
struct BufferState<C> {
    pending: Vec<C>,
    drained: bool,
}

/// Ordered, append-only candidate queue with a one-shot drain
///
/// Append and drain share one lock, and the drain transmits while holding
/// it. A candidate is therefore either flushed by the drain or handed back
/// to its caller, never both and never lost, and no candidate appended
/// after the drain can overtake a buffered one.
#[derive(Debug)]
pub struct CandidateBuffer<C> {
    state: Mutex<BufferState<C>>,
}

impl<C> Default for CandidateBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CandidateBuffer<C> {
    /// Create an empty, open buffer
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                pending: Vec::new(),
                drained: false,
            }),
        }
    }

    /// Append a candidate, or hand it back if the buffer was already drained
    pub fn append(&self, candidate: C) -> Admission<C> {
        let mut state = self.state.lock();
        if state.drained {
            return Admission::Closed(candidate);
        }
        state.pending.push(candidate);
        Admission::Buffered
    }

    /// Transmit every buffered candidate in insertion order, then close
    ///
    /// Returns how many candidates were passed to `sink`. Later calls find
    /// the buffer empty and transmit nothing.
    pub fn drain_and_transmit<F>(&self, mut sink: F) -> usize
    where
        F: FnMut(C),
    {
        let mut state = self.state.lock();
        state.drained = true;
        let pending = std::mem::take(&mut state.pending);
        let count = pending.len();
        for candidate in pending {
            sink(candidate);
        }
        count
    }

    /// Number of candidates waiting for the drain
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether no candidate is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_preserves_discovery_order() {
        let buffer = CandidateBuffer::new();
        for i in 0..5 {
            assert_eq!(buffer.append(i), Admission::Buffered);
        }
        assert_eq!(buffer.len(), 5);

        let mut sent = Vec::new();
        assert_eq!(buffer.drain_and_transmit(|c| sent.push(c)), 5);
        assert_eq!(sent, vec![0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.append(5), Admission::Closed(5));
    }

    #[test]
    fn test_append_after_drain_is_handed_back() {
        let buffer = CandidateBuffer::new();
        buffer.append("a");
        buffer.drain_and_transmit(|_| {});

        assert_eq!(buffer.append("b"), Admission::Closed("b"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_second_drain_transmits_nothing() {
        let buffer = CandidateBuffer::new();
        buffer.append(1);
        buffer.append(2);

        let mut sent = Vec::new();
        buffer.drain_and_transmit(|c| sent.push(c));
        assert_eq!(buffer.drain_and_transmit(|c| sent.push(c)), 0);
        assert_eq!(sent, vec![1, 2]);
    }

    #[test]
    fn test_concurrent_append_and_drain_is_exactly_once() {
        const PER_THREAD: usize = 500;
        let buffer = Arc::new(CandidateBuffer::new());
        let sent = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let appenders: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                let sent = Arc::clone(&sent);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let candidate = t * PER_THREAD + i;
                        if let Admission::Closed(c) = buffer.append(candidate) {
                            sent.lock().push(c);
                        }
                    }
                })
            })
            .collect();

        let drainer = {
            let buffer = Arc::clone(&buffer);
            let sent = Arc::clone(&sent);
            thread::spawn(move || {
                thread::yield_now();
                buffer.drain_and_transmit(|c| sent.lock().push(c));
            })
        };

        for handle in appenders {
            handle.join().unwrap();
        }
        drainer.join().unwrap();

        let sent = sent.lock();
        assert_eq!(sent.len(), 4 * PER_THREAD);
        let unique: HashSet<_> = sent.iter().copied().collect();
        assert_eq!(unique.len(), 4 * PER_THREAD);

        // Each appender's candidates go out in that appender's order
        for t in 0..4 {
            let mine: Vec<_> = sent
                .iter()
                .copied()
                .filter(|c| c / PER_THREAD == t)
                .collect();
            let mut sorted = mine.clone();
            sorted.sort_unstable();
            assert_eq!(mine, sorted);
        }
    }
}
