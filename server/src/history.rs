use std::collections::VecDeque;
use system::{DrawingEvent, ServerMessage};

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Which channel a buffered event arrived on. Both kinds share one buffer and
/// one cap; the kind only decides the tag it is relayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Stroke,
    Shape,
}

impl DrawKind {
    pub fn into_message(self, event: DrawingEvent) -> ServerMessage {
        match self {
            DrawKind::Stroke => ServerMessage::Draw(event),
            DrawKind::Shape => ServerMessage::DrawShape(event),
        }
    }
}

/// Ordered log of drawing events replayed to late joiners.
///
/// Holds at most `capacity` entries. Appending past the cap evicts the
/// oldest entries first; survivors keep their relative order.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<(DrawKind, DrawingEvent)>,
    capacity: usize,
}

impl HistoryBuffer {
    /// `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_LIMIT)),
            capacity,
        }
    }

    /// Returns how many old entries were evicted to make room.
    pub fn append(&mut self, kind: DrawKind, event: DrawingEvent) -> usize {
        self.entries.push_back((kind, event));
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn snapshot(&self) -> Vec<DrawingEvent> {
        self.entries.iter().map(|(_, event)| event.clone()).collect()
    }

    /// Returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let len = self.entries.len();
        self.entries.clear();
        len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self, kind: DrawKind) -> usize {
        self.entries.iter().filter(|(k, _)| *k == kind).count()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
