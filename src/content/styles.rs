//! Stylesheet text and fixed identifiers injected into pages.

use crate::settings::models::{FontStyle, ThemeMode};

pub const FONT_STYLE_ID: &str = "a11y-bridge-font-style";
pub const MODE_STYLE_ID: &str = "a11y-bridge-mode-style";
pub const OVERLAY_FRAME_ID: &str = "a11y-bridge-overlay-frame";

pub const FONT_FAMILY: &str = "KoddiUDOnGothic, sans-serif";

/// Elements whose text follows the font settings.
pub const TARGET_SELECTORS: [&str; 17] = [
    "p", "span", "a", "li", "td", "th", "label", "button", "strong", "em", "div", "h1", "h2",
    "h3", "h4", "h5", "h6",
];

/// Inline properties stripped from every element when styles are disabled.
pub const STRIPPED_PROPERTIES: [&str; 4] = ["font-size", "font-weight", "filter", "background-color"];

const DARK_FILTER: &str = "invert(1) hue-rotate(180deg)";

pub fn is_target(tag: &str) -> bool {
    TARGET_SELECTORS.contains(&tag)
}

/// Font stylesheet. Font family is always forced; size and weight only when set.
pub fn font_css(style: &FontStyle) -> String {
    let selectors = TARGET_SELECTORS.join(", ");
    let mut css = format!("{selectors} {{ font-family: {FONT_FAMILY} !important; }}\n");
    if let Some(size) = style.font_size {
        css.push_str(&format!("{selectors} {{ font-size: {} !important; }}\n", size.css_value()));
    }
    if let Some(weight) = style.font_weight {
        css.push_str(&format!(
            "{selectors} {{ font-weight: {} !important; }}\n",
            weight.css_value()
        ));
    }
    css
}

/// Mode stylesheet, or `None` when light mode needs no rules.
pub fn mode_css(mode: ThemeMode) -> Option<String> {
    match mode {
        ThemeMode::Light => None,
        ThemeMode::Dark => Some(format!(
            "html {{ filter: {DARK_FILTER} !important; background-color: #fff !important; }}\n\
             img, video, picture, iframe {{ filter: {DARK_FILTER} !important; }}\n"
        )),
    }
}

pub fn cursor_value(url: &str) -> String {
    format!("url(\"{url}\"), auto")
}

/// Inline geometry of the overlay frame.
pub fn overlay_geometry(expanded: bool) -> [(&'static str, &'static str); 4] {
    if expanded {
        [("width", "100%"), ("height", "100%"), ("top", "0"), ("right", "0")]
    } else {
        [("width", "65px"), ("height", "65px"), ("top", "70px"), ("right", "20px")]
    }
}

/// Fixed part of the overlay frame's inline style.
pub const OVERLAY_BASE_STYLE: [(&str, &str); 4] = [
    ("position", "fixed"),
    ("border", "none"),
    ("background", "transparent"),
    ("z-index", "2147483647"),
];
