//! `TraceChannel` over a streamed edge channel

use super::TraceChannel;
use crate::runtime::{BitState, Edge, Receiver, channel};
use tracing::{debug, trace};

/// Cursor over a channel of run-length encoded [`Edge`]s
///
/// The first edge received gives the level at the start of the capture.
/// Lookahead blocks on the channel until the producer sends the next edge or
/// closes the stream, so a cursor can follow a capture that is still being
/// read. Nothing is consumed before the first call that moves or looks ahead;
/// until then the level reads as `Low`.
pub struct EdgeCursor {
    name: String,
    edges: Receiver<Edge>,
    level: BitState,
    position: u64,
    primed: bool,
}

impl EdgeCursor {
    pub fn new(name: impl Into<String>, edges: Receiver<Edge>) -> Self {
        Self {
            name: name.into(),
            edges,
            level: BitState::Low,
            position: 0,
            primed: false,
        }
    }

    /// Cursor over a recorded, already complete list of edges
    pub fn from_edges(name: impl Into<String>, edges: impl IntoIterator<Item = Edge>) -> Self {
        let (tx, rx) = channel::<Edge>(None);
        for edge in edges {
            // The receiver is alive, so an unbounded send cannot fail
            let _ = tx.send(edge);
        }
        tx.close();
        Self::new(name, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the initial level from the first edge of the stream
    fn prime(&mut self) {
        if self.primed {
            return;
        }
        self.primed = true;
        match self.edges.recv() {
            Ok(first) => {
                self.level = first.level;
                trace!("[{}] initial level {:?}", self.name, first.level);
            }
            Err(_) => debug!("[{}] empty channel", self.name),
        }
    }

    /// Next edge that actually changes the level, without consuming it
    fn peek_transition(&mut self) -> Option<Edge> {
        loop {
            let next = *self.edges.peek().ok()?;
            if next.level != self.level {
                return Some(next);
            }
            // Repeated level, not a transition
            let _ = self.edges.recv();
        }
    }
}

impl TraceChannel for EdgeCursor {
    fn sample_number(&self) -> u64 {
        self.position
    }

    fn bit_state(&self) -> BitState {
        self.level
    }

    fn advance_to_next_edge(&mut self) -> Option<u64> {
        self.prime();
        let next = self.peek_transition()?;
        let _ = self.edges.recv();
        self.level = next.level;
        self.position = self.position.max(next.start_sample);
        Some(self.position)
    }

    fn advance_to_abs_position(&mut self, sample: u64) {
        self.prime();
        if sample < self.position {
            trace!(
                "[{}] ignoring move back from {} to {}",
                self.name, self.position, sample
            );
            return;
        }
        while let Some(next) = self.peek_transition() {
            if next.start_sample > sample {
                break;
            }
            let _ = self.edges.recv();
            self.level = next.level;
        }
        self.position = sample;
    }

    fn sample_of_next_edge(&mut self) -> Option<u64> {
        self.prime();
        self.peek_transition().map(|edge| edge.start_sample)
    }
}
