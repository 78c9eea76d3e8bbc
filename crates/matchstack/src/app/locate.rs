//! Node marker parsing and lookup.
//!
//! Everything this crate assumes about how arsonc labels nodes in its
//! decompiled output lives in this module.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::MatchstackError;
use crate::domain::model::{AnnotatedText, NodeMatch, TargetId};

/// arsonc labels node `N` as `N - 1` in `decompile -l` output.
pub const DEFAULT_LABEL_OFFSET: i64 = -1;

/// Block comment carrying a node label, e.g. `/* ID: 41 */`. The match never
/// runs past the end of an earlier comment on the same line.
pub const MARKER_PATTERN: &str = r"/\*(?:[^*]|\*[^/])*?ID:\s*(\d+)\s*\*/";

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(MARKER_PATTERN).expect("marker pattern must compile"));
static BRACE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s+").expect("brace pattern must compile"));

/// First marker value embedded in `line`, if any.
pub fn parse_marker(line: &str) -> Option<u32> {
    parse_markers(line).next()
}

/// Every marker value embedded in `line`, left to right.
pub fn parse_markers(line: &str) -> impl Iterator<Item = u32> + '_ {
    MARKER
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .filter_map(|value| value.as_str().parse().ok())
}

/// Split a decompiled line into its marker and the script text without it.
///
/// The marker comment is removed, whitespace after an opening brace is
/// collapsed and trailing whitespace is trimmed.
pub fn strip_marker(line: &str) -> (Option<u32>, String) {
    let marker = parse_marker(line);
    let code = if marker.is_some() {
        MARKER.replace_all(line, "")
    } else {
        line.into()
    };
    let code = BRACE_GAP.replace_all(&code, "{");
    (marker, code.trim_end().to_owned())
}

/// Marker value arsonc prints for `target`, or `None` when the adjusted
/// value cannot be a label.
pub fn marker_for(target: TargetId, offset: i64) -> Option<u32> {
    i64::from(target)
        .checked_add(offset)
        .and_then(|marker| u32::try_from(marker).ok())
}

/// Finds the decompiled line that carries a node's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLocator {
    offset: i64,
}

impl Default for NodeLocator {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_OFFSET)
    }
}

impl NodeLocator {
    pub fn new(offset: i64) -> Self {
        Self { offset }
    }

    /// Locate `target` in `text`. The first labelled line in document order
    /// wins; later duplicates are recorded in [`NodeMatch::occurrences`].
    pub fn locate(
        &self,
        text: &AnnotatedText,
        target: TargetId,
    ) -> Result<NodeMatch, MatchstackError> {
        let marker = marker_for(target, self.offset);
        let not_found = || MatchstackError::NodeNotFound { target, marker };
        let wanted = marker.ok_or_else(not_found)?;

        let occurrences: Vec<usize> = text
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| parse_markers(line).any(|marker| marker == wanted))
            .map(|(index, _)| index)
            .collect();

        let line_index = *occurrences.first().ok_or_else(not_found)?;
        if occurrences.len() > 1 {
            tracing::warn!(
                target_id = target,
                marker = wanted,
                count = occurrences.len(),
                "marker appears more than once; using the first occurrence"
            );
        }
        tracing::debug!(target_id = target, marker = wanted, line = line_index + 1, "located node");

        Ok(NodeMatch {
            line_index,
            marker: wanted,
            occurrences,
        })
    }
}
