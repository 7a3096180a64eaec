//! Reader events.
//!
//! Components record events into their own queue; the owning reader drains
//! them with `poll_events`. There is no global event bus: every queue's
//! lifetime is tied to the instance that owns it.

/// Observable transitions a host may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The layout finished its initial render pass.
    Rendered,
    /// A chapter view entered the visible window.
    ViewConnected(usize),
    /// A chapter view's measured size changed.
    ViewSizeChanged(usize),
    /// An intercepted in-content link was followed.
    LinkClicked(String),
}
