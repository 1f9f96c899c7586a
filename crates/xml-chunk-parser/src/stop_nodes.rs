//! Stop-node matching and the raw-capture scanner used once a stop node has
//! been entered.
//!
//! Matching an element against the configured `stop_nodes` patterns and
//! scanning its raw content are kept in one module because both key off the
//! same [`StopNodePattern`] list and the same notion of "tag name at the
//! current depth".

use crate::options::StopNodePattern;
use regex::Regex;
use rustc_hash::FxHashMap;

/// Whether the element at `path` (root-to-current tag names) is configured
/// as a stop node.
///
/// A dotted [`StopNodePattern::Path`] is compared against the *tail* of
/// `path`: a pattern with as many segments as `path` is effectively an exact
/// full-path match, a shorter one is a suffix match, and a `*` segment
/// matches any single tag name. A [`StopNodePattern::Simple`] pattern only
/// ever looks at the innermost tag name, independent of depth.
///
/// Path patterns are checked before simple-name patterns, giving the
/// priority order *exact path > suffix path > wildcard path > simple name*
/// the data model calls for whenever both kinds could match the same tag (an
/// exact full-length path match is itself the most specific suffix match, so
/// no separate exact-vs-suffix distinction is needed here).
pub(crate) fn is_stop_node(patterns: &[StopNodePattern], path: &[&str]) -> bool {
    let Some(&tag) = path.last() else {
        return false;
    };

    let path_match = patterns.iter().any(|pattern| match pattern {
        StopNodePattern::Path(dotted) => path_pattern_matches(dotted, path),
        StopNodePattern::Simple(_) => false,
    });
    if path_match {
        return true;
    }

    patterns.iter().any(|pattern| match pattern {
        StopNodePattern::Simple(name) => &**name == tag,
        StopNodePattern::Path(_) => false,
    })
}

fn path_pattern_matches(pattern: &str, path: &[&str]) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    if pattern_segments.len() > path.len() {
        return false;
    }
    let tail = &path[path.len() - pattern_segments.len()..];
    pattern_segments
        .iter()
        .zip(tail.iter())
        .all(|(p, s)| *p == "*" || p == s)
}

/// The result of one [`StopNodeScanners::scan`] call over a delta of newly
/// arrived bytes.
pub(crate) enum ScanOutcome {
    /// The matching close was found inside this delta. Offsets are relative
    /// to the scanned slice: content runs up to `content_end`, and the
    /// closing tag itself runs up to `full_end`.
    Found { content_end: usize, full_end: usize },
    /// Still open; `depth` is the updated nesting count to pass back in on
    /// the next call once more bytes arrive.
    Pending { depth: i32 },
}

/// Compiled scanners keyed by tag name, built lazily since most sessions only
/// ever enter a handful of distinct stop-node tags.
#[derive(Default)]
pub(crate) struct StopNodeScanners {
    cache: FxHashMap<Box<str>, Regex>,
}

impl StopNodeScanners {
    /// Scans `delta` — a slice of newly arrived bytes, *not* the whole
    /// stop-node body accumulated so far — for same-named opens/closes of
    /// `tag_name`, continuing a nesting count that started at 1 when the
    /// stop node was entered and is carried across calls in
    /// [`crate::incomplete_state::IncompleteState::StopNodeContent`].
    ///
    /// Comments and CDATA sections nested inside the stop node are skipped
    /// whole, so a literal `<` inside either never confuses the depth count;
    /// a nested opening tag with the same name increments depth, a closing
    /// one decrements it, and the scan stops at the close that brings depth
    /// back to zero.
    pub(crate) fn scan(&mut self, tag_name: &str, delta: &str, initial_depth: i32) -> ScanOutcome {
        let scanner = self
            .cache
            .entry(tag_name.into())
            .or_insert_with(|| build_scanner(tag_name));

        let mut depth = initial_depth;
        for m in scanner.find_iter(delta) {
            let text = m.as_str();
            if text.starts_with("<!--") || text.starts_with("<![CDATA[") {
                continue;
            }
            if text.starts_with("</") {
                depth -= 1;
                if depth == 0 {
                    return ScanOutcome::Found { content_end: m.start(), full_end: m.end() };
                }
            } else {
                depth += 1;
            }
        }
        ScanOutcome::Pending { depth }
    }
}

fn build_scanner(tag_name: &str) -> Regex {
    let escaped = regex::escape(tag_name);
    let pattern = format!(
        r"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<{escaped}(?:\s[^>]*)?>|</{escaped}\s*>"
    );
    Regex::new(&pattern).expect("generated stop-node pattern is valid regex")
}
