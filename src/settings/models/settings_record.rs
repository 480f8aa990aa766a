use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Keys of the synchronized namespace.
pub mod keys {
    pub const FONT_SIZE: &str = "fontSize";
    pub const FONT_WEIGHT: &str = "fontWeight";
    pub const THEME_MODE: &str = "themeMode";
    pub const IS_CURSOR_ENABLED: &str = "isCursorEnabled";
    pub const CURSOR_SIZE: &str = "cursorSize";
    pub const CURSOR_THEME: &str = "cursorTheme";
    pub const STYLES_ENABLED: &str = "stylesEnabled";
    pub const IFRAME_VISIBLE: &str = "iframeVisible";

    pub const ALL: [&str; 8] = [
        FONT_SIZE,
        FONT_WEIGHT,
        THEME_MODE,
        IS_CURSOR_ENABLED,
        CURSOR_SIZE,
        CURSOR_THEME,
        STYLES_ENABLED,
        IFRAME_VISIBLE,
    ];

    pub const THEME_GROUP: [&str; 3] = [FONT_SIZE, FONT_WEIGHT, THEME_MODE];
    pub const CURSOR_GROUP: [&str; 3] = [IS_CURSOR_ENABLED, CURSOR_SIZE, CURSOR_THEME];
}

/// Keys of the local namespace.
pub mod local_keys {
    pub const CART_ITEMS: &str = "cartItems";
    pub const BIRTH_YEAR: &str = "birthYear";
    pub const GENDER: &str = "gender";
    pub const ALLERGIES: &str = "allergies";
    pub const OVERLAY_HIDDEN_REASON: &str = "overlayHiddenReason";

    const REVIEW_SUMMARY_PREFIX: &str = "review_summary_";

    pub fn review_summary(product_id: &str) -> String {
        format!("{REVIEW_SUMMARY_PREFIX}{product_id}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Xs,
    S,
    #[default]
    M,
    L,
    Xl,
}

impl FontSize {
    pub const ALL: [FontSize; 5] = [Self::Xs, Self::S, Self::M, Self::L, Self::Xl];

    /// Parse a `SET_FONT_SIZE_*` message tag.
    pub fn from_command(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.command() == tag)
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Xs => "SET_FONT_SIZE_XS",
            Self::S => "SET_FONT_SIZE_S",
            Self::M => "SET_FONT_SIZE_M",
            Self::L => "SET_FONT_SIZE_L",
            Self::Xl => "SET_FONT_SIZE_XL",
        }
    }

    pub fn css_value(self) -> &'static str {
        match self {
            Self::Xs => "14px",
            Self::S => "16px",
            Self::M => "18px",
            Self::L => "20px",
            Self::Xl => "24px",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Regular,
    #[default]
    Bold,
    Xbold,
}

impl FontWeight {
    pub const ALL: [FontWeight; 3] = [Self::Regular, Self::Bold, Self::Xbold];

    /// Parse a `SET_FONT_WEIGHT_*` message tag.
    pub fn from_command(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|weight| weight.command() == tag)
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Regular => "SET_FONT_WEIGHT_REGULAR",
            Self::Bold => "SET_FONT_WEIGHT_BOLD",
            Self::Xbold => "SET_FONT_WEIGHT_XBOLD",
        }
    }

    pub fn css_value(self) -> &'static str {
        match self {
            Self::Regular => "400",
            Self::Bold => "700",
            Self::Xbold => "800",
        }
    }
}

/// Light/dark page theme.
///
/// Stored as `"light"`/`"dark"`; the `SET_MODE_*` command spellings written by
/// older builds are accepted when reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    #[serde(alias = "SET_MODE_LIGHT")]
    Light,
    #[serde(alias = "SET_MODE_DARK")]
    Dark,
}

impl ThemeMode {
    pub fn from_command(tag: &str) -> Option<Self> {
        match tag {
            "SET_MODE_LIGHT" => Some(Self::Light),
            "SET_MODE_DARK" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Light => "SET_MODE_LIGHT",
            Self::Dark => "SET_MODE_DARK",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl CursorSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorTheme {
    #[default]
    White,
    Black,
    Custom,
}

impl CursorTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Custom => "custom",
        }
    }
}

/// The user's accessibility preferences as persisted in the synchronized namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    pub font_size: FontSize,
    pub font_weight: FontWeight,
    pub theme_mode: ThemeMode,
    pub is_cursor_enabled: bool,
    pub cursor_size: CursorSize,
    pub cursor_theme: CursorTheme,
    pub styles_enabled: bool,
    pub iframe_visible: bool,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            font_size: FontSize::default(),
            font_weight: FontWeight::default(),
            theme_mode: ThemeMode::default(),
            is_cursor_enabled: true,
            cursor_size: CursorSize::default(),
            cursor_theme: CursorTheme::default(),
            styles_enabled: true,
            iframe_visible: true,
        }
    }
}

impl SettingsRecord {
    /// Build a record from a partial store read. Missing or malformed fields
    /// fall back to their defaults.
    pub fn from_items(items: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            font_size: field_or(items, keys::FONT_SIZE, defaults.font_size),
            font_weight: field_or(items, keys::FONT_WEIGHT, defaults.font_weight),
            theme_mode: field_or(items, keys::THEME_MODE, defaults.theme_mode),
            is_cursor_enabled: field_or(items, keys::IS_CURSOR_ENABLED, defaults.is_cursor_enabled),
            cursor_size: field_or(items, keys::CURSOR_SIZE, defaults.cursor_size),
            cursor_theme: field_or(items, keys::CURSOR_THEME, defaults.cursor_theme),
            styles_enabled: field_or(items, keys::STYLES_ENABLED, defaults.styles_enabled),
            iframe_visible: field_or(items, keys::IFRAME_VISIBLE, defaults.iframe_visible),
        }
    }

    /// Every field as a store item map, used for install and reset.
    pub fn to_items(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Read one field from a partial store map.
///
/// `None` when the key is absent; malformed values are logged and treated as absent.
pub fn parse_field<T: DeserializeOwned>(items: &Map<String, Value>, key: &str) -> Option<T> {
    let value = items.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, value = %value, error = %e, "Ignoring malformed stored setting");
            None
        }
    }
}

fn field_or<T: DeserializeOwned>(items: &Map<String, Value>, key: &str, default: T) -> T {
    parse_field(items, key).unwrap_or(default)
}

/// A partial settings update. Only the fields that are set are written, so
/// concurrent writers interleave per key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_mode: Option<ThemeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cursor_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_size: Option<CursorSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_theme: Option<CursorTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iframe_visible: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.to_items().is_empty()
    }

    pub fn to_items(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// The font part of the settings, as applied to a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
}

impl FontStyle {
    pub fn new(font_size: FontSize, font_weight: FontWeight) -> Self {
        Self {
            font_size: Some(font_size),
            font_weight: Some(font_weight),
        }
    }

    /// Overlay the fields that are set in `other`.
    pub fn merged(self, other: FontStyle) -> Self {
        Self {
            font_size: other.font_size.or(self.font_size),
            font_weight: other.font_weight.or(self.font_weight),
        }
    }
}
