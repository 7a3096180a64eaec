//! Parsing and creation of EPUB Canonical Fragment Identifiers.
//!
//! Implements the character-offset and simple-range subset of
//! <http://www.idpf.org/epub/linking/cfi/epub-cfi.html>:
//!
//! - Character offset: `epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/2/1:3)`
//! - Simple range: `epubcfi(/6/4[chap01ref]!/4[body01]/10[para05],/2/1:1,/3:4)`
//!
//! Not implemented: temporal (`~`) and spatial (`@`) offsets, and text
//! location assertions beyond capturing the bracketed string.
//!
//! A [`Cfi`] is immutable once built. It is constructed through the named
//! factories only: [`Cfi::parse`] for the string form, [`Cfi::from_position`]
//! and [`Cfi::from_range`] for live document positions. Resolution back into
//! a document ([`Cfi::resolve`]) never consumes the address, so the same
//! value can be resolved any number of times.

mod position;

use std::fmt;
use std::str::FromStr;

use memchr::memchr;

pub use position::ContentRange;

use crate::error::{Error, Result};

const ENVELOPE_PREFIX: &str = "epubcfi(";

/// Whether a step addresses element or text siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Element,
    Text,
}

/// One level of a path through document structure.
///
/// `index` is positional: the node's rank among same-kind siblings at the
/// time the step was created. The optional `id` token is carried for
/// readability only and never consulted during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub index: usize,
    pub id: Option<String>,
}

impl Step {
    pub fn element(index: usize) -> Self {
        Self {
            kind: StepKind::Element,
            index,
            id: None,
        }
    }

    pub fn element_with_id(index: usize, id: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Element,
            index,
            id: Some(id.into()),
        }
    }

    pub fn text(index: usize) -> Self {
        Self {
            kind: StepKind::Text,
            index,
            id: None,
        }
    }

    /// The external numeric token: even for elements, odd for text.
    pub fn token(&self) -> usize {
        match self.kind {
            StepKind::Element => 2 * (self.index + 1),
            StepKind::Text => 2 * self.index + 1,
        }
    }
}

/// Leaf-level character offset plus optional captured text assertion.
///
/// The wire format cannot distinguish an offset of zero from no offset at
/// all: `:0` is never emitted. Internally the distinction is kept, but
/// nothing may rely on offset presence as a semantic signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Terminal {
    pub offset: Option<u32>,
    pub assertion: Option<String>,
}

/// A `/`-separated run of steps with an optional terminal; one block of a
/// serialized CFI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    pub steps: Vec<Step>,
    pub terminal: Terminal,
}

/// A position or range within a book, independent of any rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfi {
    base: Segment,
    path: Segment,
    start: Option<Segment>,
    end: Option<Segment>,
}

impl Cfi {
    /// Parse a canonical `epubcfi(...)` string.
    ///
    /// The envelope splits into a chapter block, an optional content block
    /// (`!` delimiter) and an optional two-part range block (`,`
    /// delimiters). The chapter block must carry at least two steps; the
    /// second names the spine position.
    pub fn parse(s: &str) -> Result<Self> {
        if !s.starts_with(ENVELOPE_PREFIX) || !s.ends_with(')') {
            return Err(Error::MalformedCfi(format!(
                "missing epubcfi(...) envelope: {s}"
            )));
        }
        let inner = &s[ENVELOPE_PREFIX.len()..s.len() - 1];

        let (chapter, content) = match memchr(b'!', inner.as_bytes()) {
            Some(pos) => {
                if memchr(b'!', &inner.as_bytes()[pos + 1..]).is_some() {
                    return Err(Error::MalformedCfi(format!(
                        "expected one or two top-level blocks: {inner}"
                    )));
                }
                (&inner[..pos], Some(&inner[pos + 1..]))
            }
            None => (inner, None),
        };

        if chapter.is_empty() {
            return Err(Error::MalformedCfi("chapter block is missing".into()));
        }
        let base = parse_segment(chapter)?;
        if base.steps.len() < 2 {
            return Err(Error::MalformedCfi(format!(
                "chapter block needs at least two steps: {chapter}"
            )));
        }

        let mut path = Segment::default();
        let mut start = None;
        let mut end = None;

        if let Some(content) = content
            && !content.is_empty()
        {
            let parts: Vec<&str> = content.split(',').collect();
            match parts.len() {
                1 => path = parse_segment(parts[0])?,
                3 => {
                    path = parse_segment(parts[0])?;
                    start = Some(parse_segment(parts[1])?);
                    end = Some(parse_segment(parts[2])?);
                }
                _ => {
                    return Err(Error::MalformedCfi(format!(
                        "a range needs exactly two extra blocks: {content}"
                    )));
                }
            }
        }

        Ok(Self {
            base,
            path,
            start,
            end,
        })
    }

    /// Base segment for the chapter at `spine_index`, equivalent to the
    /// `/6/N` package path.
    pub fn base_for_spine(spine_index: usize) -> Segment {
        Segment {
            steps: vec![Step::element(2), Step::element(spine_index)],
            terminal: Terminal::default(),
        }
    }

    /// 0-based spine position of the addressed chapter.
    pub fn spine_index(&self) -> usize {
        self.base.steps[1].index
    }

    pub fn base(&self) -> &Segment {
        &self.base
    }

    pub fn path(&self) -> &Segment {
        &self.path
    }

    pub fn start(&self) -> Option<&Segment> {
        self.start.as_ref()
    }

    pub fn end(&self) -> Option<&Segment> {
        self.end.as_ref()
    }

    pub fn is_range(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// The character offset driving scroll correction: the range start's
    /// terminal for ranges, the path terminal otherwise.
    pub fn terminal_offset(&self) -> Option<u32> {
        if let Some(start) = &self.start {
            start.terminal.offset
        } else {
            self.path.terminal.offset
        }
    }

    pub(crate) fn from_parts(
        base: Segment,
        path: Segment,
        start: Option<Segment>,
        end: Option<Segment>,
    ) -> Self {
        Self {
            base,
            path,
            start,
            end,
        }
    }
}

fn parse_segment(s: &str) -> Result<Segment> {
    let (steps_part, terminal_part) = match s.split_once(':') {
        Some((steps, terminal)) => (steps, Some(terminal)),
        None => (s, None),
    };

    let mut steps = Vec::new();
    if !steps_part.is_empty() {
        let mut tokens = steps_part.split('/');
        if steps_part.starts_with('/') {
            tokens.next();
        }
        for token in tokens {
            steps.push(parse_step(token)?);
        }
    }

    let terminal = terminal_part.map(parse_terminal).unwrap_or_default();

    Ok(Segment { steps, terminal })
}

fn parse_step(s: &str) -> Result<Step> {
    let (number, id) = split_bracketed(s);

    let token: usize = number
        .parse()
        .map_err(|_| Error::MalformedCfi(format!("invalid step: {s}")))?;

    if token % 2 == 0 {
        // Even = element; token 0 would name a -1st sibling
        if token == 0 {
            return Err(Error::MalformedCfi(format!("invalid step: {s}")));
        }
        Ok(Step {
            kind: StepKind::Element,
            index: token / 2 - 1,
            id,
        })
    } else {
        Ok(Step {
            kind: StepKind::Text,
            index: (token - 1) / 2,
            id,
        })
    }
}

fn parse_terminal(s: &str) -> Terminal {
    let (number, assertion) = split_bracketed(s);
    Terminal {
        offset: number.parse().ok(),
        assertion,
    }
}

/// Split `"3[tok]"` into the part before the brackets and the bracketed
/// token. Empty brackets count as no token.
fn split_bracketed(s: &str) -> (&str, Option<String>) {
    match s.find('[') {
        Some(open) => {
            let token = s
                .rfind(']')
                .filter(|&close| close > open)
                .map(|close| s[open + 1..close].to_string())
                .filter(|token| !token.is_empty());
            (&s[..open], token)
        }
        None => (s, None),
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.token())?;
        if let Some(ref id) = self.id {
            write!(f, "[{id}]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        // An offset of zero serializes as no terminal at all
        if let Some(offset) = self.terminal.offset
            && offset > 0
        {
            write!(f, ":{offset}")?;
        }
        if let Some(ref assertion) = self.terminal.assertion {
            write!(f, "[{assertion}]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}!{}", ENVELOPE_PREFIX, self.base, self.path)?;
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            write!(f, ",{start},{end}")?;
        }
        write!(f, ")")
    }
}

impl FromStr for Cfi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_character_offset_form() {
        let cfi = Cfi::parse("epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/2/1:3)").unwrap();

        assert_eq!(cfi.spine_index(), 1);
        assert_eq!(cfi.base().steps[0], Step::element(2));
        assert_eq!(cfi.base().steps[1], Step::element_with_id(1, "chap01ref"));

        let path = cfi.path();
        assert_eq!(path.steps.len(), 4);
        assert_eq!(path.steps[0], Step::element_with_id(1, "body01"));
        assert_eq!(path.steps[1], Step::element_with_id(4, "para05"));
        assert_eq!(path.steps[2], Step::element(0));
        assert_eq!(path.steps[3], Step::text(0));
        assert_eq!(path.terminal.offset, Some(3));
        assert!(!cfi.is_range());
    }

    #[test]
    fn test_parse_simple_range_form() {
        let cfi = Cfi::parse("epubcfi(/6/4[chap01ref]!/4[body01]/10[para05],/2/1:1,/3:4)").unwrap();

        assert!(cfi.is_range());
        assert_eq!(cfi.path().steps.last(), Some(&Step::element_with_id(4, "para05")));

        let start = cfi.start().unwrap();
        assert_eq!(start.steps, vec![Step::element(0), Step::text(0)]);
        assert_eq!(start.terminal.offset, Some(1));

        // token 3 is the second text sibling: index (3-1)/2 = 1
        let end = cfi.end().unwrap();
        assert_eq!(end.steps, vec![Step::text(1)]);
        assert_eq!(end.terminal.offset, Some(4));
    }

    #[test]
    fn test_parity_encoding() {
        for index in 0..5 {
            let element = Step::element(index);
            assert_eq!(element.token() % 2, 0);
            assert_eq!(element.token() / 2 - 1, index);

            let text = Step::text(index);
            assert_eq!(text.token() % 2, 1);
            assert_eq!((text.token() - 1) / 2, index);
        }
    }

    #[test]
    fn test_serialize_round_trips() {
        for s in [
            "epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/2/1:3)",
            "epubcfi(/6/4[chap01ref]!/4[body01]/10[para05],/2/1:1,/3:4)",
            "epubcfi(/6/2!)",
            "epubcfi(/6/14!/4/2:9[don't stop])",
        ] {
            assert_eq!(Cfi::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_zero_offset_omitted() {
        let mut cfi = Cfi::parse("epubcfi(/6/4!/4/1:5)").unwrap();
        cfi.path.terminal.offset = Some(0);
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/1)");
    }

    #[test]
    fn test_malformed_inputs() {
        for s in [
            "cfi(/6/4!/2)",
            "epubcfi(/6/4!/2",
            "epubcfi(!/2)",
            "epubcfi(/6)",
            "epubcfi(/6/4!/2!/4)",
            "epubcfi(/6/4!/x)",
            "epubcfi(/6/4!/2,/4)",
            "epubcfi(/6/4!/0)",
            "epubcfi(/6/-4!/2)",
        ] {
            assert!(
                matches!(Cfi::parse(s), Err(Error::MalformedCfi(_))),
                "expected MalformedCfi for {s:?}"
            );
        }
    }

    #[test]
    fn test_empty_content_block() {
        let cfi = Cfi::parse("epubcfi(/6/8!)").unwrap();
        assert_eq!(cfi.spine_index(), 3);
        assert!(cfi.path().steps.is_empty());
    }

    #[test]
    fn test_terminal_assertion_captured() {
        let cfi = Cfi::parse("epubcfi(/6/4!/4/1:3[leading text])").unwrap();
        assert_eq!(cfi.path().terminal.offset, Some(3));
        assert_eq!(cfi.path().terminal.assertion.as_deref(), Some("leading text"));
    }
}
