use crate::application::events::CoordinatorInput;
use std::collections::VecDeque;

/// Serialized FIFO in front of the coordinator
#[derive(Debug)]
pub struct InboundQueue {
    queue: VecDeque<CoordinatorInput>,
    max_size: usize,
}

impl InboundQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push an input (returns error if full)
    pub fn push(&mut self, input: CoordinatorInput) -> Result<(), QueueError> {
        if self.queue.len() >= self.max_size {
            return Err(QueueError::Full { max: self.max_size });
        }
        self.queue.push_back(input);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<CoordinatorInput> {
        self.queue.pop_front()
    }

    pub fn has_room(&self) -> bool {
        self.queue.len() < self.max_size
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is full (max size: {max})")]
    Full { max: usize },
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new(256)
    }
}
