//! Fan-in synchronization barrier.
//!
//! One barrier exists per fan-in edge. Each declared source owns a FIFO queue;
//! a wave is released only when every queue holds at least one message, and
//! it is assembled in source-declaration order, never arrival order.

use std::collections::VecDeque;

use nodes::Message;

use crate::models::Edge;

#[derive(Debug)]
pub(crate) struct Barrier {
    target: String,
    sources: Vec<String>,
    queues: Vec<VecDeque<Message>>,
}

impl Barrier {
    pub(crate) fn new(edge: &Edge) -> Self {
        Self {
            target: edge.targets.first().cloned().unwrap_or_default(),
            sources: edge.sources.clone(),
            queues: vec![VecDeque::new(); edge.sources.len()],
        }
    }

    pub(crate) fn target(&self) -> &str {
        &self.target
    }

    /// Record `message` from `source`. Returns the completed wave, if any.
    ///
    /// Messages from ids that are not declared sources are ignored.
    pub(crate) fn record(&mut self, source: &str, message: Message) -> Option<Vec<Message>> {
        let slot = self.sources.iter().position(|s| s == source)?;
        self.queues[slot].push_back(message);

        if self.queues.iter().any(VecDeque::is_empty) {
            return None;
        }
        self.queues.iter_mut().map(VecDeque::pop_front).collect()
    }

    /// Declared sources that have not reported for the current wave.
    pub(crate) fn missing(&self) -> Vec<String> {
        self.filter_sources(|queue| queue.is_empty())
    }

    /// Declared sources that have reported for the current wave.
    pub(crate) fn received(&self) -> Vec<String> {
        self.filter_sources(|queue| !queue.is_empty())
    }

    /// Some but not all sources have reported.
    pub(crate) fn is_partial(&self) -> bool {
        let reported = self.queues.iter().filter(|q| !q.is_empty()).count();
        reported > 0 && reported < self.queues.len()
    }

    fn filter_sources(&self, keep: impl Fn(&VecDeque<Message>) -> bool) -> Vec<String> {
        self.sources
            .iter()
            .zip(&self.queues)
            .filter(|(_, queue)| keep(queue))
            .map(|(source, _)| source.clone())
            .collect()
    }
}
