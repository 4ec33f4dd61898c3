//! Style strings, named stylesheets, and style resolution.
//!
//! A cell carries a raw style string of the form
//! `name1;name2;key=value;...`. Leading tokens without `=` are references
//! into the named-style table; `key=value` tokens are inline overrides.
//! Resolution merges the kind default, the named styles, and the inline
//! overrides in order, later keys winning.

use crate::cell::CellKind;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known style keys.
pub mod keys {
    pub const FILL_COLOR: &str = "fillColor";
    pub const STROKE_COLOR: &str = "strokeColor";
    pub const STROKE_WIDTH: &str = "strokeWidth";
    pub const FONT_COLOR: &str = "fontColor";
    pub const FONT_SIZE: &str = "fontSize";
    pub const OPACITY: &str = "opacity";
    pub const ROUNDED: &str = "rounded";
    pub const DASHED: &str = "dashed";
    pub const EDGE_STYLE: &str = "edgeStyle";
    pub const SHAPE: &str = "shape";
}

/// Name of the implicit base style for vertices and groups.
pub const DEFAULT_VERTEX_STYLE: &str = "defaultVertex";
/// Name of the implicit base style for edges.
pub const DEFAULT_EDGE_STYLE: &str = "defaultEdge";

/// A flat key-value style map.
pub type StyleMap = HashMap<String, String>;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RgbaColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl From<Color> for RgbaColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<RgbaColor> for Color {
    fn from(color: RgbaColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Parse a `#rgb`, `#rrggbb`, or `#rrggbbaa` color string.
/// `none` parses as fully transparent; anything unrecognized is `None`.
pub fn parse_color(value: &str) -> Option<RgbaColor> {
    if value == "none" || value == "transparent" {
        return Some(RgbaColor::transparent());
    }
    let hex = value.strip_prefix('#')?.trim();
    match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RgbaColor::new(r, g, b, 255))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RgbaColor::new(r, g, b, 255))
        }
        8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
            Some(RgbaColor::new(r, g, b, a))
        }
        _ => None,
    }
}

/// The effective style of a cell after resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStyle {
    map: StyleMap,
}

impl ResolvedStyle {
    pub fn from_map(map: StyleMap) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn color(&self, key: &str) -> Option<RgbaColor> {
        self.get(key).and_then(parse_color)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Boolean keys use `1`/`0` in style strings.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("1") | Some("true") => true,
            Some(_) => false,
            None => default,
        }
    }

    /// The routing function name for an edge, if one is set.
    pub fn edge_style(&self) -> Option<&str> {
        self.get(keys::EDGE_STYLE)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Resolves a raw style string into an effective style map.
///
/// Treated as a pure function of the style string and the named-style
/// table; the view caches results per cell and never mutates them.
pub trait StyleResolver {
    fn resolve(&self, kind: CellKind, style: &str) -> ResolvedStyle;
}

/// Named-style table with the default resolution rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stylesheet {
    styles: HashMap<String, StyleMap>,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Stylesheet {
    /// Create a stylesheet with the built-in vertex and edge defaults.
    pub fn new() -> Self {
        let mut styles = HashMap::new();
        styles.insert(
            DEFAULT_VERTEX_STYLE.to_string(),
            style_map(&[
                (keys::FILL_COLOR, "#ffffff"),
                (keys::STROKE_COLOR, "#000000"),
                (keys::STROKE_WIDTH, "1"),
                (keys::FONT_COLOR, "#000000"),
                (keys::FONT_SIZE, "12"),
            ]),
        );
        styles.insert(
            DEFAULT_EDGE_STYLE.to_string(),
            style_map(&[
                (keys::STROKE_COLOR, "#000000"),
                (keys::STROKE_WIDTH, "1"),
                (keys::FONT_COLOR, "#000000"),
                (keys::FONT_SIZE, "11"),
            ]),
        );
        Self { styles }
    }

    /// Register or replace a named style.
    pub fn put(&mut self, name: impl Into<String>, style: StyleMap) {
        self.styles.insert(name.into(), style);
    }

    /// Look up a named style.
    pub fn get(&self, name: &str) -> Option<&StyleMap> {
        self.styles.get(name)
    }
}

impl StyleResolver for Stylesheet {
    fn resolve(&self, kind: CellKind, style: &str) -> ResolvedStyle {
        let mut merged: StyleMap = StyleMap::new();

        let base = match kind {
            CellKind::Edge => DEFAULT_EDGE_STYLE,
            CellKind::Vertex | CellKind::Group => DEFAULT_VERTEX_STYLE,
        };
        // An explicit leading `;` suppresses the kind default.
        if !style.starts_with(';') {
            if let Some(map) = self.styles.get(base) {
                merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        for token in style.split(';') {
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => {
                    merged.insert(key.to_string(), value.to_string());
                }
                None => {
                    if let Some(map) = self.styles.get(token) {
                        merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
            }
        }

        ResolvedStyle::from_map(merged)
    }
}

fn style_map(pairs: &[(&str, &str)]) -> StyleMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(parse_color("#fff"), Some(RgbaColor::white()));
        assert_eq!(parse_color("#000000"), Some(RgbaColor::black()));
        assert_eq!(
            parse_color("#11223344"),
            Some(RgbaColor::new(0x11, 0x22, 0x33, 0x44))
        );
        assert_eq!(parse_color("none"), Some(RgbaColor::transparent()));
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn test_inline_overrides_default() {
        let sheet = Stylesheet::new();
        let resolved = sheet.resolve(CellKind::Vertex, "fillColor=#ff0000");
        assert_eq!(resolved.get(keys::FILL_COLOR), Some("#ff0000"));
        // Untouched defaults survive the merge.
        assert_eq!(resolved.get(keys::STROKE_COLOR), Some("#000000"));
    }

    #[test]
    fn test_named_reference_then_override() {
        let mut sheet = Stylesheet::new();
        sheet.put(
            "warning",
            style_map(&[(keys::FILL_COLOR, "#ffcc00"), (keys::ROUNDED, "1")]),
        );
        let resolved = sheet.resolve(CellKind::Vertex, "warning;fillColor=#00ff00");
        // Later keys win.
        assert_eq!(resolved.get(keys::FILL_COLOR), Some("#00ff00"));
        assert!(resolved.flag(keys::ROUNDED, false));
    }

    #[test]
    fn test_edge_gets_edge_default() {
        let sheet = Stylesheet::new();
        let resolved = sheet.resolve(CellKind::Edge, "");
        assert_eq!(resolved.get(keys::FONT_SIZE), Some("11"));
        assert_eq!(resolved.get(keys::FILL_COLOR), None);
    }

    #[test]
    fn test_leading_semicolon_suppresses_default() {
        let sheet = Stylesheet::new();
        let resolved = sheet.resolve(CellKind::Vertex, ";strokeColor=#123456");
        assert_eq!(resolved.get(keys::STROKE_COLOR), Some("#123456"));
        assert_eq!(resolved.get(keys::FILL_COLOR), None);
    }

    #[test]
    fn test_typed_accessors() {
        let sheet = Stylesheet::new();
        let resolved =
            sheet.resolve(CellKind::Vertex, "strokeWidth=2.5;dashed=1;opacity=0.5");
        assert_eq!(resolved.number(keys::STROKE_WIDTH), Some(2.5));
        assert!(resolved.flag(keys::DASHED, false));
        assert_eq!(resolved.number(keys::OPACITY), Some(0.5));
        assert_eq!(
            resolved.color(keys::STROKE_COLOR),
            Some(RgbaColor::black())
        );
    }
}
