//! In-Memory Page
//!
//! A host page held entirely in memory. Used as the surface for tests and
//! for the simulator, and records a journal of every visible change.

use super::{ElementHandle, UiSurface};
use crate::scheduler::Scheduler;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: String,
}

struct PageState {
    nodes: Vec<Option<Node>>,
    location: String,
    events: Vec<PageEvent>,
}

/// One recorded change to the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEvent {
    /// Milliseconds on the page timeline, when one is attached
    pub at_ms: Option<u64>,
    pub kind: PageEventKind,
}

/// What changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEventKind {
    ClassAdded { element: ElementHandle, class: String },
    TextChanged { element: ElementHandle, text: String },
    Navigated { path: String },
}

/// Serializable view of a page
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub title: String,
    pub location: String,
    pub elements: Vec<ElementSnapshot>,
    pub events: Vec<PageEvent>,
}

/// Serializable view of one element
#[derive(Debug, Clone, Serialize)]
pub struct ElementSnapshot {
    pub handle: ElementHandle,
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: String,
}

/// In-memory host page
pub struct Page {
    title: String,
    state: Mutex<PageState>,
    timeline: Option<Weak<dyn Scheduler>>,
}

impl Page {
    /// Create an empty page at `/`
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: Mutex::new(PageState {
                nodes: Vec::new(),
                location: "/".to_string(),
                events: Vec::new(),
            }),
            timeline: None,
        }
    }

    /// Build the login splash layout: a clock display, `dots` indicator
    /// elements and a login button
    pub fn login_splash(title: impl Into<String>, dots: usize) -> Self {
        let page = Self::new(title);
        page.append_element("div", Some(crate::splash::CLOCK_ELEMENT_ID), &["clock"]);
        for _ in 0..dots {
            page.append_element("span", None, &[crate::splash::DOT_CLASS]);
        }
        let button = page.append_element("button", Some("login"), &["login-button"]);
        page.write_text(button, "Connexion");
        page
    }

    /// Stamp journal entries with the scheduler's elapsed time
    pub fn with_timeline(mut self, scheduler: &Arc<dyn Scheduler>) -> Self {
        self.timeline = Some(Arc::downgrade(scheduler));
        self
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timestamp(&self) -> Option<u64> {
        self.timeline
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|scheduler| duration_ms(scheduler.now()))
    }

    /// Append an element at the end of the document
    pub fn append_element(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> ElementHandle {
        let mut state = self.lock();
        let mut unique: Vec<String> = Vec::with_capacity(classes.len());
        for class in classes {
            if !unique.iter().any(|c| c == class) {
                unique.push((*class).to_string());
            }
        }

        state.nodes.push(Some(Node {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            classes: unique,
            text: String::new(),
        }));
        ElementHandle(state.nodes.len() - 1)
    }

    /// Remove an element; its handle becomes stale
    pub fn remove(&self, element: ElementHandle) -> bool {
        let mut state = self.lock();
        match state.nodes.get_mut(element.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn write_text(&self, element: ElementHandle, text: &str) -> bool {
        let mut state = self.lock();
        match state.nodes.get_mut(element.0).and_then(Option::as_mut) {
            Some(node) => {
                node.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Text content of an element
    pub fn text(&self, element: ElementHandle) -> Option<String> {
        self.lock()
            .nodes
            .get(element.0)
            .and_then(Option::as_ref)
            .map(|node| node.text.clone())
    }

    /// Whether an element carries `class`
    pub fn has_class(&self, element: ElementHandle, class: &str) -> bool {
        self.lock()
            .nodes
            .get(element.0)
            .and_then(Option::as_ref)
            .map_or(false, |node| node.classes.iter().any(|c| c == class))
    }

    /// Current location path
    pub fn location(&self) -> String {
        self.lock().location.clone()
    }

    /// Every path navigated to, in order
    pub fn navigations(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match &event.kind {
                PageEventKind::Navigated { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Journal of recorded changes
    pub fn events(&self) -> Vec<PageEvent> {
        self.lock().events.clone()
    }

    /// Journal entries for `class` being added, in the order they happened
    pub fn class_activations(&self, class: &str) -> Vec<(ElementHandle, Option<u64>)> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match &event.kind {
                PageEventKind::ClassAdded { element, class: added } if added == class => {
                    Some((*element, event.at_ms))
                }
                _ => None,
            })
            .collect()
    }

    /// Capture the whole page
    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.lock();
        let elements = state
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| {
                node.as_ref().map(|node| ElementSnapshot {
                    handle: ElementHandle(idx),
                    tag: node.tag.clone(),
                    id: node.id.clone(),
                    classes: node.classes.clone(),
                    text: node.text.clone(),
                })
            })
            .collect();

        PageSnapshot {
            title: self.title.clone(),
            location: state.location.clone(),
            elements,
            events: state.events.clone(),
        }
    }
}

impl UiSurface for Page {
    fn element_by_id(&self, id: &str) -> Option<ElementHandle> {
        self.lock()
            .nodes
            .iter()
            .position(|node| {
                node.as_ref()
                    .and_then(|node| node.id.as_deref())
                    .map_or(false, |node_id| node_id == id)
            })
            .map(ElementHandle)
    }

    fn elements_by_class(&self, class: &str) -> Vec<ElementHandle> {
        self.lock()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.as_ref()
                    .map_or(false, |node| node.classes.iter().any(|c| c == class))
            })
            .map(|(idx, _)| ElementHandle(idx))
            .collect()
    }

    fn set_text(&self, element: ElementHandle, text: &str) -> bool {
        let at_ms = self.timestamp();
        let mut state = self.lock();
        let Some(node) = state.nodes.get_mut(element.0).and_then(Option::as_mut) else {
            return false;
        };

        if node.text != text {
            node.text = text.to_string();
            state.events.push(PageEvent {
                at_ms,
                kind: PageEventKind::TextChanged {
                    element,
                    text: text.to_string(),
                },
            });
        }
        true
    }

    fn add_class(&self, element: ElementHandle, class: &str) -> bool {
        let at_ms = self.timestamp();
        let mut state = self.lock();
        let Some(node) = state.nodes.get_mut(element.0).and_then(Option::as_mut) else {
            return false;
        };

        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
            state.events.push(PageEvent {
                at_ms,
                kind: PageEventKind::ClassAdded {
                    element,
                    class: class.to_string(),
                },
            });
        }
        true
    }

    fn navigate(&self, path: &str) {
        let at_ms = self.timestamp();
        let mut state = self.lock();
        state.location = path.to_string();
        state.events.push(PageEvent {
            at_ms,
            kind: PageEventKind::Navigated {
                path: path.to_string(),
            },
        });
    }
}

impl fmt::Display for PageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} @ {}", self.title, self.location)?;
        for element in &self.elements {
            write!(f, "  {} <{}", element.handle, element.tag)?;
            if let Some(id) = &element.id {
                write!(f, " id=\"{}\"", id)?;
            }
            if !element.classes.is_empty() {
                write!(f, " class=\"{}\"", element.classes.join(" "))?;
            }
            write!(f, ">")?;
            if !element.text.is_empty() {
                write!(f, " {}", element.text)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "events:")?;
        for event in &self.events {
            let at = event
                .at_ms
                .map(|ms| format!("{:>6}ms", ms))
                .unwrap_or_else(|| "      -".to_string());
            match &event.kind {
                PageEventKind::ClassAdded { element, class } => {
                    writeln!(f, "  {} {} +{}", at, element, class)?
                }
                PageEventKind::TextChanged { element, text } => {
                    writeln!(f, "  {} {} = {}", at, element, text)?
                }
                PageEventKind::Navigated { path } => writeln!(f, "  {} -> {}", at, path)?,
            }
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
