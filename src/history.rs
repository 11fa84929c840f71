//! Bounded record of past builds
//!
//! Oldest first. Pushing beyond capacity evicts from the front.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::layer::Layer;
use crate::view::LayerView;

/// Default number of builds kept
pub const DEFAULT_CAPACITY: usize = 5;

/// Frozen result of one successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSnapshot {
    pub layers: Vec<Layer>,
    pub total_size: u64,
    pub total_seconds: f64,
    pub view: LayerView,
    pub comment: String,
    pub built_at: DateTime<Utc>,
}

impl BuildSnapshot {
    pub fn new(layers: Vec<Layer>, view: LayerView, comment: impl Into<String>) -> Self {
        let total_size = layers.iter().map(|l| l.size).sum();
        let total_seconds = layers.iter().map(Layer::seconds).sum();
        Self {
            layers,
            total_size,
            total_seconds,
            view,
            comment: comment.into(),
            built_at: Utc::now(),
        }
    }
}

/// FIFO of build snapshots
#[derive(Debug, Clone)]
pub struct BuildHistory {
    entries: VecDeque<BuildSnapshot>,
    capacity: usize,
}

impl Default for BuildHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl BuildHistory {
    /// A history keeping at most `capacity` builds (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a build, evicting the oldest when full
    pub fn push(&mut self, snapshot: BuildSnapshot) -> Option<BuildSnapshot> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(snapshot);
        if evicted.is_some() {
            tracing::debug!("History full ({}), evicted oldest build", self.capacity);
        }
        evicted
    }

    /// Most recent build
    pub fn latest(&self) -> Option<&BuildSnapshot> {
        self.entries.back()
    }

    pub fn latest_mut(&mut self) -> Option<&mut BuildSnapshot> {
        self.entries.back_mut()
    }

    /// Build before the latest one, by recency (0 = the one just before)
    pub fn prior(&self, recency: usize) -> Option<&BuildSnapshot> {
        let len = self.entries.len();
        let index = len.checked_sub(2)?.checked_sub(recency)?;
        self.entries.get(index)
    }

    /// Number of builds available as comparison targets
    pub fn prior_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Comments, oldest first
    pub fn comments(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.comment.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildSnapshot> {
        self.entries.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
