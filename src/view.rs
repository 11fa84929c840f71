//! Layer view state handed to the rendering collaborator
//!
//! One `LayerViewRecord` per layer line in the build description, plus an
//! aggregate row for the whole image. Records carry bar geometry for the
//! relative view and, once a prior build is selected, for the diff view.
//!
//! ```text
//!   y = line_height + y_offset          aggregate row
//!   y = line_height * 5 + y_offset      layer 0
//!   y += line_height + line_space       layer 1, 2, ...
//!
//!   size bars start at size_x, duration bars at size_x + 100*scale + 110
//!   diff bars start at the centre of their relative bar (+ 50*scale)
//! ```
//!
//! The view also tracks where each layer's instruction sits in the source
//! document while it is being edited, and which layers are highlighted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::diff::{BuildDiff, DiffBar, MetricDelta};
use crate::instruction::Keyword;
use crate::layer::{format_seconds, format_size, Layer};

/// Colour of a relative bar
pub const DEFAULT_BAR_COLOR: &str = "lightblue";
/// Info text of a layer bar before a diff is applied
pub const LAYER_INFO: &str = "New Layer";
/// Info text of the aggregate bar before a diff is applied
pub const AGGREGATE_INFO: &str = "New Image";

// ============================================================================
// Source document
// ============================================================================

/// Read access to the build description being edited
pub trait SourceDocument {
    /// Full text
    fn text(&self) -> &str;

    /// Line `n` (0-based) without its terminator
    fn line(&self, n: usize) -> Option<&str>;

    fn line_count(&self) -> usize;
}

/// Local copy of the build description, kept in sync from edit events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryDocument {
    text: String,
    line_starts: Vec<usize>,
}

impl InMemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let mut doc = Self::default();
        doc.replace(text);
        doc
    }

    /// Replace the full text
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.line_starts = std::iter::once(0)
            .chain(self.text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
    }
}

impl SourceDocument for InMemoryDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn line(&self, n: usize) -> Option<&str> {
        let start = *self.line_starts.get(n)?;
        let end = self
            .line_starts
            .get(n + 1)
            .map_or(self.text.len(), |next| next - 1);
        Some(self.text[start..end].trim_end_matches('\r'))
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Bar chart geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewGeometry {
    /// Multiplier applied to every bar width
    pub scale: f64,
    /// X coordinate of the size bars
    pub size_x: f64,
    /// Bar height
    pub line_height: f64,
    /// Vertical gap between rows
    pub line_space: f64,
    /// Vertical offset of the first row
    pub y_offset: f64,
}

impl Default for ViewGeometry {
    fn default() -> Self {
        Self {
            scale: 1.4,
            size_x: 145.0,
            line_height: 23.0,
            line_space: 7.0,
            y_offset: 80.0,
        }
    }
}

impl ViewGeometry {
    /// Width of a bar at 100%
    pub fn full_width(&self) -> f64 {
        100.0 * self.scale
    }

    /// Width of a diff bar at the largest magnitude
    pub fn half_width(&self) -> f64 {
        50.0 * self.scale
    }

    /// X coordinate of the duration bars
    pub fn duration_x(&self) -> f64 {
        self.size_x + self.full_width() + 110.0
    }

    /// Y coordinate of layer row `k`
    pub fn row_y(&self, k: usize) -> f64 {
        self.line_height * 5.0 + self.y_offset + k as f64 * (self.line_height + self.line_space)
    }

    /// Y coordinate of the aggregate row
    pub fn aggregate_y(&self) -> f64 {
        self.line_height + self.y_offset
    }
}

/// One bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub info: String,
    pub color: String,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64, info: &str) -> Self {
        Self {
            x,
            y,
            width,
            height,
            info: info.to_string(),
            color: DEFAULT_BAR_COLOR.to_string(),
        }
    }

    fn diff(x: f64, y: f64, height: f64, bar: &DiffBar) -> Self {
        Self {
            x,
            y,
            width: bar.width,
            height,
            info: String::new(),
            color: bar.color.to_string(),
        }
    }
}

/// Widths of bars relative to their total; values of `None` get width 0
pub fn relative_widths(values: &[Option<f64>], scale: f64) -> Vec<f64> {
    let total: f64 = values.iter().flatten().sum();
    values
        .iter()
        .map(|v| match v {
            Some(v) if total != 0.0 => v / total * 100.0 * scale,
            _ => 0.0,
        })
        .collect()
}

/// Total duration truncated (not rounded) to two decimals
pub fn truncate2(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

// ============================================================================
// Records
// ============================================================================

/// One row of the layer view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerViewRecord {
    pub index: usize,
    pub instruction: Keyword,
    /// 0-based line of the instruction in the source document
    pub line_num: usize,
    pub size: u64,
    pub converted_size: String,
    pub duration: String,
    /// Layer would miss the build cache on rebuild
    pub rebuild: bool,
    pub size_bar: Rectangle,
    pub duration_bar: Rectangle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_diff_bar: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_diff_bar: Option<Rectangle>,
}

/// Whole-image row of the layer view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub size: u64,
    pub converted_size: String,
    pub duration: String,
    pub size_bar: Rectangle,
    pub duration_bar: Rectangle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_diff_bar: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_diff_bar: Option<Rectangle>,
}

/// Source lines that start a layer instruction, with their keyword
pub fn layer_lines(text: &str) -> Vec<(usize, Keyword)> {
    text.split('\n')
        .enumerate()
        .filter_map(|(n, line)| {
            Keyword::ALL
                .into_iter()
                .find(|k| line.starts_with(k.as_str()))
                .map(|k| (n, k))
        })
        .collect()
}

/// Line range highlighted for a layer (inclusive, `end_column` is exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Rendered layer view of one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerView {
    pub records: Vec<LayerViewRecord>,
    pub aggregate: AggregateRecord,
    #[serde(skip)]
    highlighted: BTreeSet<usize>,
}

impl LayerView {
    /// Map layers onto the instruction lines of `source` and lay out their bars
    ///
    /// Layers beyond the last instruction line get no record.
    pub fn build(geometry: &ViewGeometry, source: &str, layers: &[Layer]) -> Self {
        let size_widths = relative_widths(
            &layers.iter().map(|l| Some(l.size as f64)).collect::<Vec<_>>(),
            geometry.scale,
        );
        let duration_widths = relative_widths(
            &layers
                .iter()
                .map(|l| l.duration.and_then(|d| d.measured()))
                .collect::<Vec<_>>(),
            geometry.scale,
        );

        let records: Vec<LayerViewRecord> = layer_lines(source)
            .into_iter()
            .zip(layers)
            .enumerate()
            .map(|(k, ((line_num, keyword), layer))| {
                let y = geometry.row_y(k);
                LayerViewRecord {
                    index: layer.index,
                    instruction: keyword,
                    line_num,
                    size: layer.size,
                    converted_size: format_size(layer.size as i64),
                    duration: layer.duration_text(),
                    rebuild: false,
                    size_bar: Rectangle::new(geometry.size_x, y, size_widths[k], geometry.line_height, LAYER_INFO),
                    duration_bar: Rectangle::new(
                        geometry.duration_x(),
                        y,
                        duration_widths[k],
                        geometry.line_height,
                        LAYER_INFO,
                    ),
                    size_diff_bar: None,
                    duration_diff_bar: None,
                }
            })
            .collect();

        let total_size: u64 = layers.iter().map(|l| l.size).sum();
        let total_seconds: f64 = layers.iter().map(Layer::seconds).sum();
        let y = geometry.aggregate_y();
        let aggregate = AggregateRecord {
            size: total_size,
            converted_size: format_size(total_size as i64),
            duration: format_seconds(truncate2(total_seconds)),
            size_bar: Rectangle::new(geometry.size_x, y, geometry.full_width(), geometry.line_height, AGGREGATE_INFO),
            duration_bar: Rectangle::new(
                geometry.duration_x(),
                y,
                if total_seconds != 0.0 { geometry.full_width() } else { 0.0 },
                geometry.line_height,
                AGGREGATE_INFO,
            ),
            size_diff_bar: None,
            duration_diff_bar: None,
        };

        Self {
            records,
            aggregate,
            highlighted: BTreeSet::new(),
        }
    }

    /// Record for layer `index`
    pub fn record(&self, index: usize) -> Option<&LayerViewRecord> {
        self.records.get(index)
    }

    /// Put diff text into the bar info fields and lay out the diff bars
    pub fn apply_diff(&mut self, geometry: &ViewGeometry, diff: &BuildDiff) {
        let size_x = geometry.size_x + geometry.half_width();
        let duration_x = geometry.duration_x() + geometry.half_width();

        fn apply(
            size_bar: &mut Rectangle,
            duration_bar: &mut Rectangle,
            size_diff: &mut Option<Rectangle>,
            duration_diff: &mut Option<Rectangle>,
            delta: &MetricDelta,
            (size_x, duration_x): (f64, f64),
        ) {
            size_bar.info = delta.size_text.clone();
            duration_bar.info = delta.duration_text.clone();
            *size_diff = Some(Rectangle::diff(size_x, size_bar.y, size_bar.height, &delta.size_bar));
            *duration_diff = Some(Rectangle::diff(
                duration_x,
                duration_bar.y,
                duration_bar.height,
                &delta.duration_bar,
            ));
        }

        for (record, delta) in self.records.iter_mut().zip(&diff.layers) {
            apply(
                &mut record.size_bar,
                &mut record.duration_bar,
                &mut record.size_diff_bar,
                &mut record.duration_diff_bar,
                delta,
                (size_x, duration_x),
            );
        }
        let agg = &mut self.aggregate;
        apply(
            &mut agg.size_bar,
            &mut agg.duration_bar,
            &mut agg.size_diff_bar,
            &mut agg.duration_diff_bar,
            &diff.aggregate,
            (size_x, duration_x),
        );
    }

    /// Copy rebuild flags from the tracker
    pub fn set_rebuild_flags(&mut self, flags: &[bool]) {
        for record in &mut self.records {
            record.rebuild = flags.get(record.index).copied().unwrap_or(false);
        }
    }

    /// Keep record line numbers in step with an edit of `start..=end`
    ///
    /// `document` is the text after the edit.
    pub fn shift_lines(&mut self, document: &dyn SourceDocument, start: usize, end: usize, inserted: &str) {
        let inserted_lines = inserted.matches('\n').count() as i64;
        let (pivot, delta) = if end == start {
            if inserted_lines == 0 {
                return;
            }
            let line_is_empty = document.line(start).map_or(true, str::is_empty);
            let pivot = if line_is_empty { start } else { start + 1 };
            (pivot, inserted_lines)
        } else if end > start {
            (end, inserted_lines - (end - start) as i64)
        } else {
            return;
        };

        if delta == 0 {
            return;
        }
        for record in &mut self.records {
            if record.line_num >= pivot {
                record.line_num = (record.line_num as i64 + delta).max(0) as usize;
            }
        }
    }

    /// Range highlighted for layer `index`
    ///
    /// From the start of its line to the line before the next layer (or the
    /// last line), cut short before the first blank line.
    pub fn highlight_range(&self, document: &dyn SourceDocument, index: usize) -> Option<TextRange> {
        let start = self.records.get(index)?.line_num;
        let last = document.line_count().checked_sub(1)?;
        let mut end = self
            .records
            .get(index + 1)
            .map_or(last, |next| next.line_num.saturating_sub(1))
            .min(last)
            // The document may have shrunk below this layer's line
            .max(start);

        if let Some(blank) = (start..=end).find(|&n| document.line(n).is_some_and(|l| l.trim().is_empty())) {
            end = blank.saturating_sub(1).max(start);
        }

        Some(TextRange {
            start_line: start,
            start_column: 0,
            end_line: end,
            end_column: document.line(end).map_or(0, |l| l.chars().count()),
        })
    }

    /// Highlight layer `index`; `None` if it is already highlighted or unknown
    pub fn highlight(&mut self, document: &dyn SourceDocument, index: usize) -> Option<TextRange> {
        if self.highlighted.contains(&index) {
            return None;
        }
        let range = self.highlight_range(document, index)?;
        self.highlighted.insert(index);
        Some(range)
    }

    /// Clear the highlight of layer `index`; false if it was not highlighted
    pub fn clear_highlight(&mut self, index: usize) -> bool {
        self.highlighted.remove(&index)
    }

    /// Clear every highlight, returning the cleared indices
    pub fn clear_all_highlights(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.highlighted).into_iter().collect()
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.contains(&index)
    }
}
