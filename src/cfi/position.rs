//! Conversion between live document positions and CFI step paths.

use super::{Cfi, Segment, Step, StepKind, Terminal};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// A selection inside one chapter document, analogous to a DOM `Range`.
///
/// Offsets are character offsets when the node is a text node, child
/// offsets otherwise (only text offsets influence the produced CFI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start_node: NodeId,
    pub start_offset: u32,
    pub end_node: NodeId,
    pub end_offset: u32,
}

impl ContentRange {
    pub fn new(start_node: NodeId, start_offset: u32, end_node: NodeId, end_offset: u32) -> Self {
        Self {
            start_node,
            start_offset,
            end_node,
            end_offset,
        }
    }

    /// Collapse a position into an empty range.
    pub fn collapsed(node: NodeId, offset: u32) -> Self {
        Self::new(node, offset, node, offset)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start_node == self.end_node && self.start_offset == self.end_offset
    }
}

impl Cfi {
    /// Build a CFI from a node (and optional character offset) inside a
    /// chapter document.
    ///
    /// Walks from the node up to the chapter root, recording each level's
    /// kind and rank among same-kind siblings. When an offset is supplied it
    /// becomes the terminal offset, and the deepest step is guaranteed to be
    /// a text step (synthesizing `text(0)` under an element target).
    pub fn from_position(
        doc: &Document,
        node: NodeId,
        offset: Option<u32>,
        base: Segment,
    ) -> Result<Self> {
        check_base(&base)?;
        let path = path_to(doc, node, offset);
        Ok(Self::from_parts(base, path, None, None))
    }

    /// Build a CFI from a selection inside a chapter document.
    ///
    /// A collapsed range behaves as [`Cfi::from_position`]. Otherwise the
    /// longest common step prefix of the two endpoint paths is promoted into
    /// the shared `path`, and each endpoint keeps only its diverging suffix.
    /// Endpoints that turn out fully identical degrade to a non-range CFI.
    pub fn from_range(doc: &Document, range: &ContentRange, base: Segment) -> Result<Self> {
        check_base(&base)?;

        if range.is_collapsed() {
            let path = path_to(doc, range.start_node, Some(range.start_offset));
            return Ok(Self::from_parts(base, path, None, None));
        }

        let mut start = path_to(doc, range.start_node, Some(range.start_offset));
        let mut end = path_to(doc, range.end_node, Some(range.end_offset));

        let mut shared = Segment::default();
        let len = start.steps.len();
        for i in 0..len {
            if end.steps.get(i) != Some(&start.steps[i]) {
                break;
            }
            if i == len - 1 {
                // Last step matches too; equal terminals mean the "range"
                // is a single position
                if start.terminal == end.terminal {
                    shared.steps.push(start.steps[i].clone());
                    shared.terminal = start.terminal;
                    return Ok(Self::from_parts(base, shared, None, None));
                }
            } else {
                shared.steps.push(start.steps[i].clone());
            }
        }

        start.steps.drain(..shared.steps.len());
        end.steps.drain(..shared.steps.len());

        Ok(Self::from_parts(base, shared, Some(start), Some(end)))
    }

    /// Resolve the deepest addressable element named by `path`.
    ///
    /// Only element steps move the cursor; a trailing text step resolves no
    /// further than its parent element. The walk operates on borrowed steps
    /// and leaves the CFI untouched.
    pub fn resolve(&self, doc: &Document) -> Result<NodeId> {
        resolve_steps(doc, self.path.steps.iter())
    }

    /// Resolve both endpoints of a range CFI (`path` + each suffix).
    ///
    /// For a non-range CFI both endpoints are the [`Cfi::resolve`] target.
    pub fn resolve_range(&self, doc: &Document) -> Result<(NodeId, NodeId)> {
        let (Some(start), Some(end)) = (&self.start, &self.end) else {
            let node = self.resolve(doc)?;
            return Ok((node, node));
        };
        let start_node = resolve_steps(doc, self.path.steps.iter().chain(&start.steps))?;
        let end_node = resolve_steps(doc, self.path.steps.iter().chain(&end.steps))?;
        Ok((start_node, end_node))
    }
}

fn check_base(base: &Segment) -> Result<()> {
    if base.steps.len() < 2 {
        return Err(Error::MalformedCfi(
            "chapter base needs at least two steps".into(),
        ));
    }
    Ok(())
}

fn path_to(doc: &Document, node: NodeId, offset: Option<u32>) -> Segment {
    let mut steps = Vec::new();
    let mut current = node;

    loop {
        if current == doc.root() {
            break;
        }
        let Some(parent) = doc.parent(current) else {
            break;
        };

        let step = if doc.get(current).is_text() {
            Step::text(doc.sibling_rank(current))
        } else {
            Step {
                kind: StepKind::Element,
                index: doc.sibling_rank(current),
                id: doc.element_id(current).map(str::to_string),
            }
        };
        steps.push(step);
        current = parent;
    }
    steps.reverse();

    let mut segment = Segment {
        steps,
        terminal: Terminal::default(),
    };

    if let Some(offset) = offset {
        segment.terminal.offset = Some(offset);
        // An offset only makes sense against text content
        let deepest_is_text = segment
            .steps
            .last()
            .is_some_and(|step| step.kind == StepKind::Text);
        if !deepest_is_text {
            segment.steps.push(Step::text(0));
        }
    }

    segment
}

fn resolve_steps<'a>(
    doc: &Document,
    steps: impl Iterator<Item = &'a Step>,
) -> Result<NodeId> {
    let mut node = doc.root();
    for step in steps {
        if step.kind == StepKind::Element {
            node = doc.child_element_at(node, step.index).ok_or_else(|| {
                Error::UnresolvableCfi(format!("element step /{} out of range", step.token()))
            })?;
        }
    }
    Ok(node)
}
