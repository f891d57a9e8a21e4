//! Placement and style of the student-name overlay.
//!
//! The browser captures this record while the administrator drags the name
//! box over the template preview. Values arrive as JSON numbers or as CSS-ish
//! strings (`"24px"`), so every field is normalized to a string at the
//! deserialization boundary and parsed with a fallback when read.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_MAX_WIDTH: f32 = 400.0;
pub const DEFAULT_FONT_SIZE: f32 = 24.0;
/// Base sizes above this are clamped.
pub const MAX_FONT_SIZE: f32 = 1000.0;
pub const DEFAULT_COLOR: &str = "black";

/// A JSON value the client may send either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn into_dimension(self) -> String {
        match self {
            Self::Number(n) => format!("{}px", n),
            Self::Text(s) => s,
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPositioningConfig {
    #[serde(rename = "Top", alias = "top")]
    top: Option<NumberOrString>,
    #[serde(rename = "Left", alias = "left")]
    left: Option<NumberOrString>,
    #[serde(rename = "Width", alias = "width", alias = "MaxWidth", alias = "maxWidth")]
    width: Option<NumberOrString>,
    #[serde(rename = "Height", alias = "height")]
    height: Option<NumberOrString>,
    #[serde(rename = "FontFamily", alias = "fontFamily")]
    font_family: Option<NumberOrString>,
    #[serde(rename = "FontSize", alias = "fontSize")]
    font_size: Option<NumberOrString>,
    #[serde(rename = "BaseFontSize", alias = "baseFontSize")]
    base_font_size: Option<NumberOrString>,
    #[serde(rename = "Color", alias = "color")]
    color: Option<NumberOrString>,
    #[serde(rename = "FontWeight", alias = "fontWeight")]
    font_weight: Option<NumberOrString>,
    #[serde(rename = "TextAlign", alias = "textAlign")]
    text_align: Option<NumberOrString>,
}

/// Normalized positioning record. Dimensions keep their unit suffix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPositioningConfig", rename_all = "PascalCase")]
pub struct PositioningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_font_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
}

impl From<RawPositioningConfig> for PositioningConfig {
    fn from(raw: RawPositioningConfig) -> Self {
        Self {
            top: raw.top.map(NumberOrString::into_dimension),
            left: raw.left.map(NumberOrString::into_dimension),
            width: raw.width.map(NumberOrString::into_dimension),
            height: raw.height.map(NumberOrString::into_dimension),
            font_family: raw.font_family.map(NumberOrString::into_text),
            font_size: raw.font_size.map(NumberOrString::into_dimension),
            base_font_size: raw.base_font_size.map(NumberOrString::into_dimension),
            color: raw.color.map(NumberOrString::into_text),
            font_weight: raw.font_weight.map(NumberOrString::into_text),
            text_align: raw.text_align.map(NumberOrString::into_text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    SansSerif,
    Monospace,
}

impl PositioningConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn top(&self) -> f32 {
        self.top.as_deref().and_then(parse_dimension).unwrap_or(0.0)
    }

    pub fn left(&self) -> f32 {
        self.left.as_deref().and_then(parse_dimension).unwrap_or(0.0)
    }

    pub fn max_width(&self) -> f32 {
        self.width
            .as_deref()
            .and_then(parse_dimension)
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_MAX_WIDTH)
    }

    /// `BaseFontSize` wins over `FontSize`; the latter is the size the
    /// preview ended up at after its own auto-fit.
    pub fn base_font_size(&self) -> f32 {
        self.base_font_size
            .as_deref()
            .or(self.font_size.as_deref())
            .and_then(parse_dimension)
            .filter(|s| *s > 0.0)
            .map(|s| s.min(MAX_FONT_SIZE))
            .unwrap_or(DEFAULT_FONT_SIZE)
    }

    pub fn color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    pub fn font_weight(&self) -> FontWeight {
        let Some(raw) = self.font_weight.as_deref() else {
            return FontWeight::Regular;
        };
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("bold") || raw.eq_ignore_ascii_case("bolder") {
            return FontWeight::Bold;
        }
        match raw.parse::<u16>() {
            Ok(weight) if weight >= 600 => FontWeight::Bold,
            _ => FontWeight::Regular,
        }
    }

    pub fn font_family(&self) -> FontFamily {
        let family = self.font_family.as_deref().unwrap_or_default().to_lowercase();
        if family.contains("courier") || family.contains("mono") {
            FontFamily::Monospace
        } else {
            FontFamily::SansSerif
        }
    }

    pub fn text_align(&self) -> TextAlign {
        match self
            .text_align
            .as_deref()
            .map(|a| a.trim().to_lowercase())
            .as_deref()
        {
            Some("left") => TextAlign::Left,
            Some("right") => TextAlign::Right,
            _ => TextAlign::Center,
        }
    }
}

fn dimension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*([+-]?(?:\d+(?:[.,]\d*)?|[.,]\d+))\s*(?:px|pt)?\s*$")
            .expect("dimension pattern is valid")
    })
}

/// Parses `"24"`, `"24px"`, `"24.5pt"` or `"24,5px"`. Anything else is `None`.
pub fn parse_dimension(raw: &str) -> Option<f32> {
    let captures = dimension_pattern().captures(raw)?;
    captures[1]
        .replace(',', ".")
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_payload_with_mixed_types() {
        let json = r##"{
            "Top": "120px", "Left": "35px", "TranslateX": "0px", "TranslateY": "0px",
            "Width": 520, "Height": 24, "FontFamily": "Arial", "FontSize": "22px",
            "BaseFontSize": "32px", "Color": "#1a2b3c", "FontWeight": "bold", "TextAlign": "right"
        }"##;
        let config = PositioningConfig::from_json(json.as_bytes()).unwrap();

        assert_eq!(config.width.as_deref(), Some("520px"));
        assert_eq!(config.height.as_deref(), Some("24px"));
        assert_eq!(config.top(), 120.0);
        assert_eq!(config.left(), 35.0);
        assert_eq!(config.max_width(), 520.0);
        assert_eq!(config.base_font_size(), 32.0);
        assert_eq!(config.color(), "#1a2b3c");
        assert_eq!(config.font_weight(), FontWeight::Bold);
        assert_eq!(config.text_align(), TextAlign::Right);
        assert_eq!(config.font_family(), FontFamily::SansSerif);
    }

    #[test]
    fn test_camel_case_keys_are_accepted() {
        let json = r#"{"top": 50, "left": "50px", "maxWidth": 0, "baseFontSize": "40px"}"#;
        let config = PositioningConfig::from_json(json.as_bytes()).unwrap();

        assert_eq!(config.top(), 50.0);
        assert_eq!(config.left(), 50.0);
        assert_eq!(config.max_width(), DEFAULT_MAX_WIDTH);
        assert_eq!(config.base_font_size(), 40.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PositioningConfig::from_json(b"{}").unwrap();

        assert_eq!(config, PositioningConfig::default());
        assert_eq!(config.top(), 0.0);
        assert_eq!(config.left(), 0.0);
        assert_eq!(config.max_width(), 400.0);
        assert_eq!(config.base_font_size(), 24.0);
        assert_eq!(config.color(), "black");
        assert_eq!(config.font_weight(), FontWeight::Regular);
        assert_eq!(config.text_align(), TextAlign::Center);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let json = r#"{"Top": "abc", "Left": "12qq", "Width": "-3px", "BaseFontSize": "huge",
                       "FontSize": "30px", "TextAlign": "justify", "FontWeight": "300"}"#;
        let config = PositioningConfig::from_json(json.as_bytes()).unwrap();

        assert_eq!(config.top(), 0.0);
        assert_eq!(config.left(), 0.0);
        assert_eq!(config.max_width(), 400.0);
        // a present but malformed BaseFontSize does not fall through to FontSize
        assert_eq!(config.base_font_size(), 24.0);
        assert_eq!(config.text_align(), TextAlign::Center);
        assert_eq!(config.font_weight(), FontWeight::Regular);
    }

    #[test]
    fn test_font_size_used_when_base_missing() {
        let config = PositioningConfig::from_json(br#"{"FontSize": 18}"#).unwrap();
        assert_eq!(config.base_font_size(), 18.0);
    }

    #[test]
    fn test_huge_base_font_size_is_clamped() {
        let config = PositioningConfig::from_json(br#"{"BaseFontSize": "100000000px"}"#).unwrap();
        assert_eq!(config.base_font_size(), MAX_FONT_SIZE);
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("24"), Some(24.0));
        assert_eq!(parse_dimension(" 24px "), Some(24.0));
        assert_eq!(parse_dimension("24,5px"), Some(24.5));
        assert_eq!(parse_dimension("12.25PT"), Some(12.25));
        assert_eq!(parse_dimension("-4px"), Some(-4.0));
        assert_eq!(parse_dimension(".5"), Some(0.5));
        assert_eq!(parse_dimension(""), None);
        assert_eq!(parse_dimension("px"), None);
        assert_eq!(parse_dimension("1e3"), None);
        assert_eq!(parse_dimension("10em"), None);
    }

    #[test]
    fn test_monospace_family_and_numeric_weight() {
        let config =
            PositioningConfig::from_json(br#"{"FontFamily": "Courier New", "FontWeight": 700}"#).unwrap();
        assert_eq!(config.font_family(), FontFamily::Monospace);
        assert_eq!(config.font_weight(), FontWeight::Bold);
    }

    #[test]
    fn test_serializes_with_client_field_names() {
        let config = PositioningConfig::from_json(br#"{"top": 10, "Color": "red"}"#).unwrap();
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value, serde_json::json!({"Top": "10px", "Color": "red"}));
        let again = PositioningConfig::from_json(value.to_string().as_bytes()).unwrap();
        assert_eq!(again, config);
    }
}
