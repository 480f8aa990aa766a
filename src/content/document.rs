//! In-memory model of the parts of a live page the content side touches:
//! head stylesheets, inline styles, the overlay frame and window messages.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

pub type ListenerId = u64;
pub type WindowId = u64;
pub type ElementId = usize;

pub type SharedDocument = Arc<Mutex<PageDocument>>;

/// Inline `style` attribute of one element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineStyle {
    properties: BTreeMap<String, String>,
}

impl InlineStyle {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: &str, value: impl Into<String>) {
        self.properties.insert(property.to_string(), value.into());
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        self.properties.remove(property)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// `a: b; c: d` in property order.
    pub fn css_text(&self) -> String {
        self.properties
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub style: InlineStyle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleNode {
    pub id: String,
    pub css: String,
}

/// An `<iframe>` appended to the body, with its own content window.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameElement {
    pub id: String,
    pub src: String,
    pub style: InlineStyle,
    pub window: WindowId,
    /// Messages posted into the frame's content window, oldest first.
    pub posted: Vec<Value>,
}

/// A `message` event on the page window.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowEvent {
    /// Content window the message came from; `None` for the page itself.
    pub source: Option<WindowId>,
    pub data: Value,
}

pub type WindowListener = Arc<dyn Fn(&mut PageDocument, &WindowEvent) + Send + Sync>;

/// Product data scraped from the page, as far as it has loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductSnapshot {
    pub title: Option<String>,
    pub vendor_html: Option<String>,
    pub review_payload: Option<Value>,
}

pub struct PageDocument {
    url: String,
    head: Vec<StyleNode>,
    elements: Vec<Element>,
    body_style: InlineStyle,
    frames: Vec<FrameElement>,
    listeners: BTreeMap<ListenerId, WindowListener>,
    next_listener: ListenerId,
    next_window: WindowId,
    product: ProductSnapshot,
}

impl PageDocument {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            head: Vec::new(),
            elements: Vec::new(),
            body_style: InlineStyle::default(),
            frames: Vec::new(),
            listeners: BTreeMap::new(),
            next_listener: 1,
            next_window: 1,
            product: ProductSnapshot::default(),
        }
    }

    pub fn shared(url: impl Into<String>) -> SharedDocument {
        Arc::new(Mutex::new(Self::new(url)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // Head stylesheets

    pub fn style_node(&self, id: &str) -> Option<&str> {
        self.head
            .iter()
            .find(|node| node.id == id)
            .map(|node| node.css.as_str())
    }

    /// Remove any node with `id`, then append a fresh one.
    pub fn replace_style_node(&mut self, id: &str, css: impl Into<String>) {
        self.remove_style_node(id);
        self.head.push(StyleNode {
            id: id.to_string(),
            css: css.into(),
        });
    }

    pub fn remove_style_node(&mut self, id: &str) -> bool {
        let before = self.head.len();
        self.head.retain(|node| node.id != id);
        before != self.head.len()
    }

    pub fn style_nodes(&self) -> &[StyleNode] {
        &self.head
    }

    // Elements

    pub fn add_element(&mut self, tag: impl Into<String>) -> ElementId {
        self.elements.push(Element {
            tag: tag.into(),
            style: InlineStyle::default(),
        });
        self.elements.len() - 1
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.iter_mut()
    }

    pub fn body_style(&self) -> &InlineStyle {
        &self.body_style
    }

    pub fn body_style_mut(&mut self) -> &mut InlineStyle {
        &mut self.body_style
    }

    /// Remove the named inline properties from every element.
    pub fn strip_inline_properties(&mut self, properties: &[&str]) {
        for element in &mut self.elements {
            for property in properties {
                element.style.remove(property);
            }
        }
    }

    // Frames

    /// Append an iframe to the body and give it a fresh content window.
    pub fn append_frame(&mut self, id: &str, src: impl Into<String>, style: InlineStyle) -> WindowId {
        let window = self.next_window;
        self.next_window += 1;
        self.frames.push(FrameElement {
            id: id.to_string(),
            src: src.into(),
            style,
            window,
            posted: Vec::new(),
        });
        window
    }

    pub fn frame(&self, id: &str) -> Option<&FrameElement> {
        self.frames.iter().find(|frame| frame.id == id)
    }

    pub fn frame_mut(&mut self, id: &str) -> Option<&mut FrameElement> {
        self.frames.iter_mut().find(|frame| frame.id == id)
    }

    pub fn remove_frame(&mut self, id: &str) -> Option<FrameElement> {
        let index = self.frames.iter().position(|frame| frame.id == id)?;
        Some(self.frames.remove(index))
    }

    /// `frame.contentWindow.postMessage(message)`. False when the frame is absent.
    pub fn post_to_frame(&mut self, id: &str, message: Value) -> bool {
        match self.frame_mut(id) {
            Some(frame) => {
                frame.posted.push(message);
                true
            }
            None => false,
        }
    }

    // Window messages

    pub fn add_window_listener(&mut self, listener: WindowListener) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(id, listener);
        id
    }

    pub fn remove_window_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn window_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Dispatch a `message` event to every registered listener.
    pub fn post_window_message(&mut self, source: Option<WindowId>, data: Value) {
        let event = WindowEvent { source, data };
        let listeners: Vec<WindowListener> = self.listeners.values().cloned().collect();
        for listener in listeners {
            listener(self, &event);
        }
    }

    // Scraped product data

    pub fn product(&self) -> &ProductSnapshot {
        &self.product
    }

    pub fn product_mut(&mut self) -> &mut ProductSnapshot {
        &mut self.product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_style_node_keeps_one_node() {
        let mut doc = PageDocument::new("https://shop.example/");
        doc.replace_style_node("font", "a { }");
        doc.replace_style_node("mode", "b { }");
        doc.replace_style_node("font", "c { }");

        assert_eq!(doc.style_nodes().len(), 2);
        assert_eq!(doc.style_node("font"), Some("c { }"));
        // Re-created nodes go to the end of the head.
        assert_eq!(doc.style_nodes()[1].id, "font");
        assert!(doc.remove_style_node("font"));
        assert!(!doc.remove_style_node("font"));
    }

    #[test]
    fn test_strip_inline_properties() {
        let mut doc = PageDocument::new("https://shop.example/");
        let p = doc.add_element("p");
        {
            let style = &mut doc.element_mut(p).unwrap().style;
            style.set("font-size", "20px");
            style.set("color", "red");
        }
        doc.strip_inline_properties(&["font-size", "filter"]);

        let style = &doc.element(p).unwrap().style;
        assert_eq!(style.get("font-size"), None);
        assert_eq!(style.css_text(), "color: red");
    }

    #[test]
    fn test_window_listeners_see_source() {
        let mut doc = PageDocument::new("https://shop.example/");
        let window = doc.append_frame("frame", "about:blank", InlineStyle::default());
        let listener = doc.add_window_listener(Arc::new(move |doc: &mut PageDocument, event: &WindowEvent| {
            if event.source == Some(window) {
                doc.body_style_mut().set("outline", "1px");
            }
        }));

        doc.post_window_message(None, json!({}));
        assert!(doc.body_style().is_empty());
        doc.post_window_message(Some(window), json!({}));
        assert_eq!(doc.body_style().get("outline"), Some("1px"));

        assert!(doc.remove_window_listener(listener));
        assert_eq!(doc.window_listener_count(), 0);
    }
}
