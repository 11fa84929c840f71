//! Inspection listing (image history) parsing
//!
//! Rows are newest first. The third column is the instruction that created
//! the row's layer; any later column starting with a digit is a byte size.
//! Rows below the authored layers belong to the inherited base image and are
//! folded into layer 0.

use crate::instruction::{InstructionGroup, LAYER_KEYWORDS};
use crate::layer::Layer;

use super::LogFormat;

/// One tokenized listing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow<'a> {
    pub fields: Vec<&'a str>,
}

impl<'a> ListingRow<'a> {
    pub fn new(fields: Vec<&'a str>) -> Self {
        Self { fields }
    }

    /// Instruction column
    pub fn created_by(&self) -> Option<&'a str> {
        self.fields.get(2).copied()
    }

    /// Whether the instruction column starts with a layer keyword
    pub fn starts_with_layer_keyword(&self) -> bool {
        self.created_by()
            .is_some_and(|c| LAYER_KEYWORDS.iter().any(|k| c.starts_with(k)))
    }

    /// Whether the instruction column mentions a layer keyword anywhere
    pub fn mentions_layer_keyword(&self) -> bool {
        self.created_by()
            .is_some_and(|c| LAYER_KEYWORDS.iter().any(|k| c.contains(k)))
    }

    /// Sizes in columns after the instruction, in column order
    pub fn sizes(&self) -> impl Iterator<Item = u64> + '_ {
        self.fields
            .iter()
            .skip(3)
            .filter_map(|f| leading_integer(f))
    }
}

/// Parse the leading decimal digits of a field (`"123MB"` -> 123)
pub fn leading_integer(field: &str) -> Option<u64> {
    let end = field
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(field.len());
    if end == 0 {
        return None;
    }
    field[..end].parse().ok()
}

/// Row index just below the last authored layer
///
/// Counts rows whose instruction starts with a layer keyword until the count
/// matches the number of authored groups. Returns 0 if it never does.
pub fn base_boundary(rows: &[ListingRow<'_>], authored: usize) -> usize {
    let mut count = 0;
    for (i, row) in rows.iter().enumerate() {
        if row.starts_with_layer_keyword() {
            count += 1;
        }
        if count == authored {
            return i + 1;
        }
    }
    0
}

/// Total size of the base image rows (boundary row through the last row)
pub fn base_size(rows: &[ListingRow<'_>], boundary: usize) -> u64 {
    rows.iter()
        .skip(boundary)
        .filter(|row| row.fields.len() >= 3)
        .filter_map(|row| row.sizes().next())
        .sum()
}

/// Build layer 0 from the base rows and one layer per authored size, oldest first
pub fn parse_listing<F: LogFormat>(
    format: &F,
    groups: &[InstructionGroup],
    listing: &str,
) -> (Vec<Layer>, usize) {
    let rows: Vec<ListingRow<'_>> = listing
        .lines()
        .map(|line| ListingRow::new(format.split_row(line)))
        .collect();

    let authored = groups.len().saturating_sub(1);
    let boundary = base_boundary(&rows, authored);

    let base_instruction = groups.first().map(|g| g.text.as_str()).unwrap_or_default();
    let mut layers = vec![Layer::new(0, base_instruction, base_size(&rows, boundary))];

    for row in rows[..boundary.min(rows.len())].iter().rev() {
        if row.fields.len() < 3 || !row.mentions_layer_keyword() {
            continue;
        }
        let instruction = row.created_by().unwrap_or_default();
        for size in row.sizes() {
            let index = layers.len();
            layers.push(Layer::new(index, instruction, size));
        }
    }

    tracing::debug!(
        "Listing parsed: {} rows, base boundary {}, {} layers",
        rows.len(),
        boundary,
        layers.len()
    );

    (layers, boundary)
}

// ============================================================================
// Tests
// ============================================================================
