//! Segment command handler - print a Dockerfile's instruction groups

use crate::cli::{OutputFormat, SegmentArgs};
use crate::commands::{to_json, CommandContext};
use crate::error::{LayerprofError, Result};
use crate::fs_utils::read_lossy;
use crate::instruction::segment;

pub fn run_segment(args: &SegmentArgs, ctx: &CommandContext) -> Result<String> {
    if !args.dockerfile.is_file() {
        return Err(LayerprofError::SourceNotFound {
            path: args.dockerfile.display().to_string(),
        });
    }
    let groups = segment(&read_lossy(&args.dockerfile)?);

    match ctx.format {
        OutputFormat::Json => to_json(&groups),
        OutputFormat::Text => {
            if groups.is_empty() {
                return Ok("No base image declaration (FROM) found\n".to_string());
            }
            let mut out = String::new();
            for group in &groups {
                let keyword = group.keyword.map_or("?", |k| k.as_str());
                out.push_str(&format!("[{}] {}\n", group.index, keyword));
                for line in group.text.trim_end_matches('\n').lines() {
                    out.push_str(&format!("    {}\n", line));
                }
            }
            Ok(out)
        }
    }
}
