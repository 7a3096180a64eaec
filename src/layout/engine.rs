//! The windowed layout engine.
//!
//! All chapter views are measured up front (the virtual region) so the
//! document has a stable total extent; only a contiguous slice around the
//! viewport (the real region) is ever connected. Navigation against an
//! unconnected chapter happens in two phases: a coarse jump to the
//! chapter's cumulative offset right away, and a single fine correction
//! once the view reports itself connected and post-attachment layout has
//! settled.

use std::collections::VecDeque;

use crate::cfi::{Cfi, Segment};
use crate::error::{Error, Result};
use crate::events::ReaderEvent;
use crate::geometry::Size;
use crate::view::{ChapterView, Measurer};

use super::animation::ScrollAnimation;
use super::{DEFAULT_GAP, LayoutMode};

/// Engine construction options.
pub struct LayoutOptions {
    pub mode: LayoutMode,
    /// Window the views (default). When off, every view stays connected.
    pub virtual_views: bool,
    pub viewport: Size,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Scroll,
            virtual_views: true,
            viewport: Size::new(600.0, 800.0),
        }
    }
}

/// Lifecycle of a layout instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Idle,
    Materializing,
    Measuring,
    Windowed,
}

/// Work deferred past a layout boundary.
enum DeferredTask {
    /// Microtask: read back sizes from the hidden measurement pass.
    FinishMeasurePass,
    /// Microtask: recompute the virtual extent after a size change.
    RefreshExtent,
    /// Macrotask: fine-correct a pending jump after view connection.
    FineCorrect { view_index: usize },
}

/// The virtualized layout engine.
pub struct ViewLayout {
    mode: LayoutMode,
    virtual_views: bool,
    viewport: Size,
    views: Vec<ChapterView>,
    measurer: Box<dyn Measurer>,
    state: LayoutState,
    scroll_offset: f64,
    virtual_extent: f64,
    real_slice: (usize, usize),
    real_offset: f64,
    micro_tasks: VecDeque<DeferredTask>,
    macro_tasks: VecDeque<DeferredTask>,
    pending_jumps: Vec<(usize, Cfi)>,
    animation: Option<ScrollAnimation>,
    percent: f64,
    events: VecDeque<ReaderEvent>,
    fine_corrections: usize,
}

impl ViewLayout {
    pub fn new(views: Vec<ChapterView>, measurer: Box<dyn Measurer>, options: LayoutOptions) -> Self {
        Self {
            mode: options.mode,
            virtual_views: options.virtual_views,
            viewport: options.viewport,
            views,
            measurer,
            state: LayoutState::Idle,
            scroll_offset: 0.0,
            virtual_extent: 0.0,
            real_slice: (0, 0),
            real_offset: 0.0,
            micro_tasks: VecDeque::new(),
            macro_tasks: VecDeque::new(),
            pending_jumps: Vec::new(),
            animation: None,
            percent: 0.0,
            events: VecDeque::new(),
            fine_corrections: 0,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn views(&self) -> &[ChapterView] {
        &self.views
    }

    pub fn view(&self, index: usize) -> Option<&ChapterView> {
        self.views.get(index)
    }

    /// Bounds of the currently connected slice (inclusive).
    pub fn real_slice(&self) -> (usize, usize) {
        self.real_slice
    }

    /// Document offset the real region is shifted by.
    pub fn real_offset(&self) -> f64 {
        self.real_offset
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// How many two-phase fine corrections have run.
    pub fn fine_corrections(&self) -> usize {
        self.fine_corrections
    }

    /// Drain events recorded since the last poll.
    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        self.events.drain(..).collect()
    }

    /// Parse every chapter and kick off measurement.
    ///
    /// In virtual mode sizes are read back only after the deferred
    /// measurement pass runs ([`ViewLayout::pump`]); reading them earlier
    /// would observe pre-layout zeros.
    pub fn render(&mut self) -> Result<()> {
        self.state = LayoutState::Materializing;
        for view in &mut self.views {
            view.materialize()?;
        }

        if self.virtual_views {
            self.state = LayoutState::Measuring;
            self.micro_tasks.push_back(DeferredTask::FinishMeasurePass);
        } else {
            self.measure_all();
            self.refresh_extent();
            let all = 0..self.views.len();
            for index in all {
                if !self.views[index].connected() {
                    self.views[index].set_connected(true);
                    self.on_view_connected(index);
                }
            }
            self.state = LayoutState::Windowed;
        }

        self.events.push_back(ReaderEvent::Rendered);
        Ok(())
    }

    /// Drain deferred work: all microtasks, then macrotasks (each of which
    /// may queue further microtasks that run first).
    pub fn pump(&mut self) {
        loop {
            let task = if let Some(task) = self.micro_tasks.pop_front() {
                task
            } else if let Some(task) = self.macro_tasks.pop_front() {
                task
            } else {
                break;
            };
            self.run_task(task);
        }
    }

    /// Advance an in-flight smooth scroll by one frame.
    pub fn tick(&mut self) {
        let Some(mut animation) = self.animation.take() else {
            return;
        };
        let position = animation.advance();
        self.scroll_to(position);
        if !animation.is_done() {
            self.animation = Some(animation);
        }
    }

    fn run_task(&mut self, task: DeferredTask) {
        match task {
            DeferredTask::FinishMeasurePass => {
                self.measure_all();
                self.refresh_extent();
                self.update_real_content();
                self.state = LayoutState::Windowed;
            }
            DeferredTask::RefreshExtent => {
                self.refresh_extent();
                self.update_real_content();
                self.state = LayoutState::Windowed;
            }
            DeferredTask::FineCorrect { view_index } => {
                let Some(position) = self
                    .pending_jumps
                    .iter()
                    .position(|(index, _)| *index == view_index)
                else {
                    return;
                };
                let (_, cfi) = self.pending_jumps.remove(position);
                match self.fine_position(view_index, &cfi) {
                    Ok(to) => {
                        self.to_position(to, false);
                        self.fine_corrections += 1;
                    }
                    Err(e) => {
                        log::warn!("dropping fine correction for view {view_index}: {e}");
                    }
                }
            }
        }
    }

    fn measure_all(&mut self) {
        for index in 0..self.views.len() {
            let mut size = self.measurer.measure_view(&self.views[index]);
            if self.mode.is_horizontal() {
                // A view occupies at least one full page; overflowing
                // column content keeps its trailing gap
                let page = self.page_width();
                size.width = if size.width > page {
                    size.width + DEFAULT_GAP
                } else {
                    page
                };
            }
            self.views[index].set_size(size);
        }
    }

    fn refresh_extent(&mut self) {
        self.virtual_extent = self.views_size_before(self.views.len());
    }

    /// Cumulative size of all views strictly before `upto`, along the
    /// reading direction. The chapter-to-pixel conversion.
    pub fn views_size_before(&self, upto: usize) -> f64 {
        self.views[..upto.min(self.views.len())]
            .iter()
            .map(|view| self.mode.metric(view.size()))
            .sum()
    }

    /// Total document extent along the reading direction.
    pub fn total_extent(&self) -> f64 {
        self.virtual_extent
    }

    /// The chapter containing a document offset, and the offset local to it.
    pub fn view_at_offset(&self, offset: f64) -> Option<(usize, f64)> {
        let mut cursor = 0.0;
        for (index, view) in self.views.iter().enumerate() {
            let metric = self.mode.metric(view.size());
            if offset < cursor + metric {
                return Some((index, offset - cursor));
            }
            cursor += metric;
        }
        None
    }

    /// Slice of views covering the viewport plus one viewport of buffer on
    /// each side, as inclusive indices.
    ///
    /// `start` past `end` means the sizes the window was computed from have
    /// gone stale; the window stretches to the last view and the extent is
    /// re-measured in place.
    pub fn real_content_slice(&mut self) -> (usize, usize) {
        let extent = self.mode.viewport_extent(self.viewport);
        let start_pos = (self.scroll_offset - extent).max(0.0);
        let end_pos = (self.scroll_offset + extent * 2.0).min(self.virtual_extent);

        let mut start: isize = -1;
        let mut end: isize = -1;
        let mut size = 0.0;

        for (index, view) in self.views.iter().enumerate() {
            size += self.mode.metric(view.size());
            if start == -1 && size > start_pos {
                start = index as isize;
            }
            if end == -1 && size > end_pos {
                end = index as isize;
            }
            if start != -1 && end != -1 {
                break;
            }
        }

        if start > end {
            log::debug!("stale view measurements for slice [{start}, {end}], re-measuring");
            end = self.views.len() as isize - 1;
            self.refresh_extent();
        }

        (start.max(0) as usize, end.max(0) as usize)
    }

    /// Reconnect the real region around the current scroll position.
    fn update_real_content(&mut self) {
        if !self.virtual_views || self.views.is_empty() {
            return;
        }

        let (start, end) = self.real_content_slice();
        self.real_slice = (start, end);
        self.real_offset = self.views_size_before(start);

        let mut newly_connected = Vec::new();
        for (index, view) in self.views.iter_mut().enumerate() {
            let in_window = index >= start && index <= end;
            if in_window && !view.connected() {
                view.set_connected(true);
                newly_connected.push(index);
            } else if !in_window && view.connected() {
                view.set_connected(false);
            }
        }
        for index in newly_connected {
            self.on_view_connected(index);
        }
    }

    /// One-shot connection notification: fires the event and schedules the
    /// fine correction for any jump waiting on this view.
    fn on_view_connected(&mut self, index: usize) {
        self.events.push_back(ReaderEvent::ViewConnected(index));
        if self.pending_jumps.iter().any(|(i, _)| *i == index) {
            // Timer-based so the post-attachment reflow settles before
            // geometry is read back
            self.macro_tasks
                .push_back(DeferredTask::FineCorrect { view_index: index });
        }
    }

    /// Set the scroll position (host scroll events come through here too)
    /// and rebuild the window around it.
    pub fn scroll_to(&mut self, position: f64) {
        let extent = self.mode.viewport_extent(self.viewport);
        let max = (self.virtual_extent - extent).max(0.0);
        self.scroll_offset = position.clamp(0.0, max);
        if self.virtual_views && self.state == LayoutState::Windowed {
            self.update_real_content();
        }
    }

    /// Scroll directly or smoothly. Any request made while an animated
    /// scroll is in flight is dropped, not queued.
    pub fn to_position(&mut self, to: f64, smooth: bool) {
        if self.animation.is_some() {
            log::debug!("animated scroll in flight, dropping request to {to}");
            return;
        }

        if smooth {
            self.animation = Some(ScrollAnimation::new(self.scroll_offset, to));
        } else {
            self.scroll_to(to);
        }
    }

    /// Display the position a CFI names.
    ///
    /// The in-chapter path is validated before anything moves, so an
    /// unresolvable address never partially scrolls. Jumps into
    /// unconnected chapters run in two phases: coarse to the chapter
    /// start now, fine once the view connects.
    pub fn display(&mut self, cfi: &Cfi) -> Result<()> {
        let view_index = cfi.spine_index();
        if view_index >= self.views.len() {
            return Err(Error::UnresolvableCfi(format!(
                "spine index {view_index} out of range"
            )));
        }

        let doc = self.views[view_index].document()?;
        cfi.resolve(doc)?;

        if self.virtual_views && !self.views[view_index].connected() {
            self.pending_jumps.push((view_index, cfi.clone()));
            let coarse = self.views_size_before(view_index);
            self.to_position(coarse, false);
        } else {
            let to = self.fine_position(view_index, cfi)?;
            self.to_position(to, false);
        }

        Ok(())
    }

    /// Exact scroll target for a CFI inside a connected view.
    fn fine_position(&self, view_index: usize, cfi: &Cfi) -> Result<f64> {
        let view = &self.views[view_index];
        let doc = view.document()?;
        let node = cfi.resolve(doc)?;
        let rect = self.measurer.node_rect(view, node).unwrap_or_default();
        let metrics = self.measurer.font_metrics(view, node);
        let char_offset = f64::from(cfi.terminal_offset().unwrap_or(0));
        let pre = self.views_size_before(view_index);

        match self.mode {
            LayoutMode::Scroll => {
                let mut text_offset =
                    ((metrics.font_size * char_offset) / rect.width).ceil() * metrics.line_height;
                if !text_offset.is_finite() {
                    text_offset = 0.0;
                }
                Ok(pre + rect.y + text_offset - self.viewport.height / 4.0)
            }
            LayoutMode::Paginated { spread } => {
                let page_width = self.page_width();
                let mut text_offset =
                    ((metrics.font_size * char_offset) / rect.width) * metrics.line_height;
                if !text_offset.is_finite() {
                    text_offset = 0.0;
                }
                // Overflow estimate: does the target text run past the
                // visible page? Only accounts for a single extra page; a
                // run long enough to spill further still lands one page
                // short.
                let over = if rect.y + text_offset > self.viewport.height {
                    1.0
                } else {
                    0.0
                };
                let inset_pages = (rect.x / page_width).floor();

                if spread {
                    let pre_pages = (pre / page_width).floor();
                    let target_page = inset_pages + pre_pages;
                    if (target_page as i64) % 2 == 0 {
                        // Even pages accumulated: target lands in the first
                        // column
                        Ok(target_page * page_width)
                    } else if over > 0.0 {
                        Ok((target_page + 1.0) * page_width)
                    } else {
                        Ok((target_page - 1.0) * page_width)
                    }
                } else {
                    Ok(pre + (inset_pages + over) * page_width)
                }
            }
        }
    }

    /// Column width in paginated mode (half the viewport when spread).
    pub fn page_width(&self) -> f64 {
        match self.mode {
            LayoutMode::Paginated { spread: true } => self.viewport.width * 0.5,
            _ => self.viewport.width,
        }
    }

    /// The view under the focus line, plus the focus position in document
    /// coordinates. Scroll mode focuses the top third of the viewport,
    /// paginated mode the leading edge.
    pub fn current_view_index(&self) -> Result<(usize, f64)> {
        if self.views.is_empty() {
            return Err(Error::UnresolvableCfi("no views to focus".into()));
        }

        let focus = match self.mode {
            LayoutMode::Scroll => self.scroll_offset + self.viewport.height / 3.0,
            LayoutMode::Paginated { .. } => self.scroll_offset,
        };

        let last = self.views.len() - 1;
        let (start, end) = if self.virtual_views {
            self.real_slice
        } else {
            (0, last)
        };
        let end = end.min(last);

        let mut cursor = self.views_size_before(start);
        for index in start..=end {
            let metric = self.mode.metric(self.views[index].size());
            let hit = if self.mode.is_horizontal() {
                cursor + metric > focus
            } else {
                cursor + metric >= focus
            };
            if hit {
                return Ok((index, focus));
            }
            cursor += metric;
        }

        Err(Error::UnresolvableCfi(
            "no view intersects the focus line".into(),
        ))
    }

    /// Build a CFI for the reading position under the focus line.
    ///
    /// Descends from the focused view's body to the deepest element at or
    /// past the focus line and addresses it.
    pub fn current_cfi(&self) -> Result<Cfi> {
        let (view_index, focus) = self.current_view_index()?;
        let view = &self.views[view_index];
        let doc = view.document()?;
        let origin = self.views_size_before(view_index);

        let mut target = doc.body();
        'descend: loop {
            for child in doc.child_elements(target) {
                let Some(rect) = self.measurer.node_rect(view, child) else {
                    continue;
                };
                let hit = if self.mode.is_horizontal() {
                    origin + rect.x >= focus
                } else {
                    origin + rect.bottom() >= focus
                };
                if hit {
                    target = child;
                    if doc.child_elements(child).next().is_some() {
                        continue 'descend;
                    }
                    break 'descend;
                }
            }
            break;
        }

        Cfi::from_position(doc, target, None, Cfi::base_for_spine(view_index))
    }

    /// Step forward one viewport, smoothly.
    pub fn next_page(&mut self) {
        let to = match self.mode {
            LayoutMode::Scroll => {
                ((self.scroll_offset / self.viewport.height).floor() + 1.0) * self.viewport.height
            }
            LayoutMode::Paginated { .. } => self.scroll_offset + self.viewport.width,
        };
        self.to_position(to, true);
    }

    /// Step back one viewport, smoothly.
    pub fn prev_page(&mut self) {
        let to = match self.mode {
            LayoutMode::Scroll => {
                ((self.scroll_offset / self.viewport.height).floor() - 1.0) * self.viewport.height
            }
            LayoutMode::Paginated { .. } => self.scroll_offset - self.viewport.width,
        };
        self.to_position(to, true);
    }

    /// Jump to the start of the next chapter.
    pub fn next_view(&mut self) -> Result<()> {
        let (view_index, _) = self.current_view_index()?;
        let next = view_index + 1;
        if next >= self.views.len() {
            return Ok(());
        }
        self.display(&chapter_cfi(next))
    }

    /// Jump to the start of the previous chapter.
    pub fn prev_view(&mut self) -> Result<()> {
        let (view_index, _) = self.current_view_index()?;
        let Some(prev) = view_index.checked_sub(1) else {
            return Ok(());
        };
        self.display(&chapter_cfi(prev))
    }

    /// Scroll ratio display. Unsupported while windowing is on.
    pub fn set_percent(&mut self, percent: f64) {
        if self.virtual_views {
            log::warn!("virtual layout does not support percent display");
            return;
        }
        self.to_position(self.total_extent() * percent, false);
        self.percent = percent;
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Resize the container; re-enters measurement.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        if self.state == LayoutState::Windowed {
            self.state = LayoutState::Measuring;
            self.micro_tasks.push_back(DeferredTask::FinishMeasurePass);
        }
    }

    /// A view changed size (font load, reflow, annotation attach): refresh
    /// the virtual extent before cumulative sizes are trusted again.
    pub fn set_view_size(&mut self, index: usize, size: Size) {
        let Some(view) = self.views.get_mut(index) else {
            return;
        };
        if view.set_size(size) {
            self.events.push_back(ReaderEvent::ViewSizeChanged(index));
            if self.state == LayoutState::Windowed {
                self.state = LayoutState::Measuring;
            }
            self.micro_tasks.push_back(DeferredTask::RefreshExtent);
        }
    }

    /// Measured box of a node, view-local. Consumers like the annotation
    /// overlay read geometry through here.
    pub fn node_rect(&self, view_index: usize, node: crate::dom::NodeId) -> Option<crate::geometry::Rect> {
        let view = self.views.get(view_index)?;
        self.measurer.node_rect(view, node)
    }

    pub(crate) fn push_event(&mut self, event: ReaderEvent) {
        self.events.push_back(event);
    }
}

/// A CFI addressing a chapter's start (`epubcfi(/6/N!)`).
fn chapter_cfi(spine_index: usize) -> Cfi {
    Cfi::from_parts(
        Cfi::base_for_spine(spine_index),
        Segment::default(),
        None,
        None,
    )
}
