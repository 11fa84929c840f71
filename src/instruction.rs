//! Dockerfile instruction segmentation
//!
//! Splits Dockerfile source text into ordered instruction groups, one per
//! layer-producing directive. Group 0 is always the base image declaration
//! (`FROM ...` up to the end of its line).
//!
//! Segmentation is text based and deliberately shallow: it does not validate
//! Dockerfile syntax. Keywords are matched positionally and case-sensitively,
//! so a keyword embedded in a longer token (`ENVIRONMENT` contains `ENV`)
//! still terminates the current group.
//!
//! ```text
//! FROM base          -> group 0  "FROM base"
//! RUN a              -> group 1  "RUN a\n"
//! COPY f /x          -> group 2  "COPY f /x\n"
//! ```

use serde::{Deserialize, Serialize};

/// Keyword that declares the base image
pub const BASE_KEYWORD: &str = "FROM";

/// Keywords whose instructions produce a filesystem layer
pub const LAYER_KEYWORDS: [&str; 4] = ["RUN", "ADD", "COPY", "WORKDIR"];

/// Every instruction keyword that can terminate a group
pub const INSTRUCTION_KEYWORDS: [&str; 17] = [
    "RUN",
    "ADD",
    "COPY",
    "WORKDIR",
    "LABEL",
    "CMD",
    "MAINTAINER",
    "EXPOSE",
    "ENV",
    "ENTRYPOINT",
    "VOLUME",
    "USER",
    "ARG",
    "ONBUILD",
    "STOPSIGNAL",
    "HEALTHCHECK",
    "SHELL",
];

// ============================================================================
// Keywords
// ============================================================================

/// Instruction keyword of a layer (base image included)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Keyword {
    From,
    Run,
    Add,
    Copy,
    Workdir,
}

impl Keyword {
    /// All keywords that map to a layer, in display order
    pub const ALL: [Keyword; 5] = [
        Keyword::From,
        Keyword::Run,
        Keyword::Add,
        Keyword::Copy,
        Keyword::Workdir,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From => "FROM",
            Self::Run => "RUN",
            Self::Add => "ADD",
            Self::Copy => "COPY",
            Self::Workdir => "WORKDIR",
        }
    }

    /// Keyword the text starts with, ignoring leading whitespace
    pub fn leading(text: &str) -> Option<Keyword> {
        let trimmed = text.trim_start();
        Self::ALL
            .into_iter()
            .find(|k| trimmed.starts_with(k.as_str()))
    }

    /// Whether this keyword produces an authored layer (everything but FROM)
    pub fn is_layer(&self) -> bool {
        !matches!(self, Self::From)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Instruction Groups
// ============================================================================

/// Source text span of one layer-producing instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionGroup {
    /// Ordinal position (0 = base image)
    pub index: usize,
    /// Raw text, original line breaks included
    pub text: String,
    /// Leading keyword, if the text starts with one
    pub keyword: Option<Keyword>,
}

impl InstructionGroup {
    fn new(index: usize, text: &str) -> Self {
        Self {
            index,
            text: text.to_string(),
            keyword: Keyword::leading(text),
        }
    }

    /// Text with every line break character removed
    pub fn normalized(&self) -> String {
        self.text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
    }

    /// Compare two groups ignoring line breaks
    pub fn same_as(&self, other: &InstructionGroup) -> bool {
        self.normalized() == other.normalized()
    }
}

/// Replace comment lines with blank lines, keeping line endings in place
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content.trim_start().starts_with('#') {
            if line.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Split source text into instruction groups
///
/// Returns an empty list when the text has no base image declaration.
pub fn segment(text: &str) -> Vec<InstructionGroup> {
    let processed = strip_comments(text);

    let Some(from_pos) = processed.find(BASE_KEYWORD) else {
        return Vec::new();
    };
    let from_end = processed[from_pos..]
        .find('\n')
        .map_or(processed.len(), |p| from_pos + p);

    let mut groups = vec![InstructionGroup::new(0, &processed[from_pos..from_end])];
    let mut cursor = from_end;

    while cursor < processed.len() {
        let Some((start, keyword)) = earliest(&processed, cursor, &LAYER_KEYWORDS) else {
            break;
        };

        let index = groups.len();
        match earliest(&processed, start + keyword.len(), &INSTRUCTION_KEYWORDS) {
            Some((end, _)) => {
                groups.push(InstructionGroup::new(index, &processed[start..end]));
                cursor = end;
            }
            None => {
                groups.push(InstructionGroup::new(index, &processed[start..]));
                break;
            }
        }
    }

    groups
}

/// First index where two group sequences differ, over the shorter length
pub fn first_divergence(original: &[InstructionGroup], current: &[InstructionGroup]) -> Option<usize> {
    original
        .iter()
        .zip(current)
        .position(|(a, b)| !a.same_as(b))
}

/// Leftmost occurrence of any keyword at or after `from`
fn earliest<'k>(text: &str, from: usize, keywords: &[&'k str]) -> Option<(usize, &'k str)> {
    let haystack = text.get(from..)?;
    keywords
        .iter()
        .filter_map(|k| haystack.find(k).map(|p| (from + p, *k)))
        .min_by_key(|(pos, _)| *pos)
}

// ============================================================================
// Tests
// ============================================================================
