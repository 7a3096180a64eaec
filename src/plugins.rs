//! Reader capabilities.
//!
//! The capability set is closed: a capability that doesn't exist cannot be
//! named, so "unknown plugin" is not a runtime condition. Search is a
//! linear scan over chapter text (no index); theming is carried at its
//! interface boundary only.

use std::collections::BTreeSet;

use crate::cfi::{Cfi, ContentRange};
use crate::dom::Document;
use crate::error::Result;

/// Optional reader features a host can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    Annotate,
    Search,
    Theme,
}

/// Which capabilities a reader instance runs with.
#[derive(Debug, Default)]
pub struct PluginSet {
    enabled: BTreeSet<Capability>,
}

impl PluginSet {
    pub fn new(capabilities: &[Capability]) -> Self {
        Self {
            enabled: capabilities.iter().copied().collect(),
        }
    }

    pub fn enable(&mut self, capability: Capability) {
        self.enabled.insert(capability);
    }

    pub fn disable(&mut self, capability: Capability) {
        self.enabled.remove(&capability);
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }
}

/// One hit from a chapter scan.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    /// Range address of the matched text.
    pub cfi: Cfi,
    /// The match with some surrounding text.
    pub excerpt: String,
}

/// Scan one chapter's text nodes for a query, producing range CFIs.
///
/// Matching is exact; offsets are character offsets within each text node.
pub fn search_chapter(doc: &Document, spine_index: usize, query: &str) -> Result<Vec<SearchMatch>> {
    let mut matches = Vec::new();
    if query.is_empty() {
        return Ok(matches);
    }

    for node in doc.text_nodes() {
        let Some(text) = doc.text(node) else {
            continue;
        };
        for (byte_start, matched) in text.match_indices(query) {
            let start = text[..byte_start].chars().count() as u32;
            let end = start + matched.chars().count() as u32;
            let range = ContentRange::new(node, start, node, end);
            let cfi = Cfi::from_range(doc, &range, Cfi::base_for_spine(spine_index))?;
            matches.push(SearchMatch {
                cfi,
                excerpt: excerpt_around(text, byte_start, byte_start + matched.len()),
            });
        }
    }

    Ok(matches)
}

/// Up to 20 characters of context on each side of a match.
fn excerpt_around(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(19)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(20)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].to_string()
}

/// Theme variables, interface boundary only: the engine stores them, a
/// host stylesheet applies them.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    vars: Vec<(String, String)>,
}

impl Theme {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(entry) = self.vars.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value.into();
        } else {
            self.vars.push((name, value.into()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    #[test]
    fn test_search_produces_resolvable_ranges() {
        let doc = parse_document(
            "<html><head/><body><p>the cat sat</p><p>another cat</p></body></html>",
        )
        .unwrap();

        let matches = search_chapter(&doc, 0, "cat").unwrap();
        assert_eq!(matches.len(), 2);

        for hit in &matches {
            assert!(hit.cfi.is_range());
            assert!(hit.cfi.resolve_range(&doc).is_ok());
            assert!(hit.excerpt.contains("cat"));
        }

        let first = &matches[0];
        assert_eq!(first.cfi.start().unwrap().terminal.offset, Some(4));
        assert_eq!(first.cfi.end().unwrap().terminal.offset, Some(7));
    }

    #[test]
    fn test_search_empty_query() {
        let doc = parse_document("<body><p>text</p></body>").unwrap();
        assert!(search_chapter(&doc, 0, "").unwrap().is_empty());
    }

    #[test]
    fn test_theme_vars() {
        let mut theme = Theme::default();
        theme.set("--font-size", "18px");
        theme.set("--font-size", "20px");
        assert_eq!(theme.get("--font-size"), Some("20px"));
        assert_eq!(theme.vars().len(), 1);
    }
}
