//! UI Surface
//!
//! The host page as a capability passed into each component instead of an
//! ambient global document.
//!
//! Lookups are late-bound: every call queries the surface again and returns
//! fresh handles, so elements may appear or disappear between calls. A handle
//! whose element is gone is stale; writes through it are silent no-ops that
//! return `false`.

mod page;

pub use page::{ElementSnapshot, Page, PageEvent, PageEventKind, PageSnapshot};

use serde::Serialize;
use std::fmt;

/// Opaque reference to one element of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementHandle(pub usize);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Mutable view of a host page
pub trait UiSurface: Send + Sync {
    /// Look up the element carrying `id`
    fn element_by_id(&self, id: &str) -> Option<ElementHandle>;

    /// All elements carrying `class`, in document order
    fn elements_by_class(&self, class: &str) -> Vec<ElementHandle>;

    /// Replace the text content of an element
    fn set_text(&self, element: ElementHandle, text: &str) -> bool;

    /// Add a class to an element. Adding a class already present changes nothing.
    fn add_class(&self, element: ElementHandle, class: &str) -> bool;

    /// Navigate the page to `path`, unloading the current document
    fn navigate(&self, path: &str);
}
