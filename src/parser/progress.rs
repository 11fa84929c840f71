//! Progress log parsing
//!
//! The progress log is a sequence of blank-line separated blocks. A block
//! counts as a layer step when it carries a step counter (`[n/m]`), a
//! completion marker (`DONE 1.23s` or `CACHED`) and names a layer
//! instruction. Surviving blocks are ordered by step number and paired with
//! layers.

use std::collections::HashSet;

use crate::layer::{BuildDuration, Layer};

use super::{AlignmentMismatch, LogFormat};

/// Progress block describing one finished build step
#[derive(Debug, Clone, PartialEq)]
pub struct StepBlock<'a> {
    /// Step number `n` of `[n/m]`
    pub step: usize,
    /// Step count `m` of `[n/m]`
    pub total: usize,
    /// Reported duration or cache hit
    pub completion: BuildDuration,
    /// Raw block text
    pub text: &'a str,
}

/// Accumulates streamed stderr output into the full progress log
#[derive(Debug, Clone, Default)]
pub struct LogAccumulator {
    buf: String,
}

impl LogAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one streamed chunk (a line without its terminator)
    pub fn push_line(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Extract finished layer steps from the progress log, ordered by step number
///
/// Exact duplicate blocks are dropped, keeping the first occurrence.
pub fn step_blocks<'a, F: LogFormat>(format: &F, log: &'a str) -> Vec<StepBlock<'a>> {
    let mut seen = HashSet::new();
    let mut blocks: Vec<StepBlock<'a>> = format
        .split_blocks(log)
        .into_iter()
        .filter(|block| seen.insert(*block))
        .filter_map(|block| {
            let (step, total) = format.step_of(block)?;
            let completion = format.completion_of(block)?;
            if !format.names_layer(block) {
                return None;
            }
            Some(StepBlock {
                step,
                total,
                completion,
                text: block,
            })
        })
        .collect();

    // Stable: blocks sharing a step keep log order
    blocks.sort_by_key(|b| b.step);
    blocks
}

/// Pair step blocks with layers and record their durations
///
/// When every block reports a step count equal to the number of layers, the
/// step number is used as the key (`[n/m]` belongs to layer `n - 1`) and the
/// first block per step wins. Otherwise blocks are paired by position.
///
/// Returns the mismatch when blocks could not be paired one to one.
pub fn assign_durations(layers: &mut [Layer], blocks: &[StepBlock<'_>]) -> Option<AlignmentMismatch> {
    let mismatch = AlignmentMismatch {
        blocks: blocks.len(),
        layers: layers.len(),
    };

    let keyed = !blocks.is_empty() && blocks.iter().all(|b| b.total == layers.len());
    if keyed {
        let mut out_of_range = false;
        for block in blocks {
            match block.step.checked_sub(1).and_then(|i| layers.get_mut(i)) {
                Some(layer) if layer.duration.is_none() => layer.duration = Some(block.completion),
                Some(_) => {}
                None => out_of_range = true,
            }
        }
        return out_of_range.then_some(mismatch);
    }

    for (layer, block) in layers.iter_mut().zip(blocks) {
        layer.duration = Some(block.completion);
    }
    (blocks.len() != layers.len()).then_some(mismatch)
}

// ============================================================================
// Tests
// ============================================================================
