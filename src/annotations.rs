//! Annotation registry, at its interface boundary.
//!
//! Annotations consume CFI ranges and produce mark records; actually
//! painting highlights is the host overlay's job. The registry binds each
//! annotation to its spine view and resolves it to concrete nodes and
//! boxes on demand.

use std::collections::BTreeMap;

use crate::cfi::Cfi;
use crate::dom::NodeId;
use crate::geometry::Rect;
use crate::layout::ViewLayout;

/// Supported annotation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Highlight,
    Underline,
}

/// Registry-assigned annotation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnnotationId(u64);

/// One stored annotation.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: AnnotationId,
    pub kind: AnnotationKind,
    pub cfi: Cfi,
    pub class_list: Vec<String>,
}

/// A resolved annotation, ready for an overlay to draw.
#[derive(Debug, Clone)]
pub struct Mark {
    pub annotation: AnnotationId,
    pub kind: AnnotationKind,
    pub view_index: usize,
    pub start: NodeId,
    pub end: NodeId,
    pub rects: Vec<Rect>,
    pub class_list: Vec<String>,
}

/// Id-keyed annotation store for one rendition.
#[derive(Debug, Default)]
pub struct Annotations {
    items: BTreeMap<AnnotationId, Annotation>,
    next_id: u64,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: AnnotationKind, cfi: Cfi, class_list: Vec<String>) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.items.insert(
            id,
            Annotation {
                id,
                kind,
                cfi,
                class_list,
            },
        );
        id
    }

    pub fn highlight(&mut self, cfi: Cfi) -> AnnotationId {
        self.add(AnnotationKind::Highlight, cfi, Vec::new())
    }

    pub fn underline(&mut self, cfi: Cfi) -> AnnotationId {
        self.add(AnnotationKind::Underline, cfi, Vec::new())
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        self.items.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve all annotations into mark records against the given layout.
    ///
    /// Annotations whose view is missing or whose address no longer
    /// resolves are skipped with a warning; one bad annotation must not
    /// take the overlay down.
    pub fn marks(&self, layout: &ViewLayout) -> Vec<Mark> {
        let mut marks = Vec::new();

        for annotation in self.items.values() {
            let view_index = annotation.cfi.spine_index();
            let Some(view) = layout.view(view_index) else {
                log::warn!("annotation {:?}: view {view_index} not found", annotation.id);
                continue;
            };
            let Ok(doc) = view.document() else {
                continue;
            };
            let (start, end) = match annotation.cfi.resolve_range(doc) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    log::warn!("annotation {:?} does not resolve: {e}", annotation.id);
                    continue;
                }
            };

            let mut rects = Vec::new();
            if let Some(rect) = layout.node_rect(view_index, start) {
                rects.push(rect);
            }
            if start != end
                && let Some(rect) = layout.node_rect(view_index, end)
            {
                rects.push(rect);
            }

            marks.push(Mark {
                annotation: annotation.id,
                kind: annotation.kind,
                view_index,
                start,
                end,
                rects,
                class_list: annotation.class_list.clone(),
            });
        }

        marks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut annotations = Annotations::new();
        let cfi = Cfi::parse("epubcfi(/6/2!/4/2,/1:0,/1:4)").unwrap();
        let id = annotations.highlight(cfi.clone());
        let other = annotations.underline(cfi);

        assert_eq!(annotations.len(), 2);
        assert_ne!(id, other);
        assert!(annotations.remove(id));
        assert!(!annotations.remove(id));
        assert_eq!(annotations.len(), 1);

        annotations.clear();
        assert!(annotations.is_empty());
    }
}
