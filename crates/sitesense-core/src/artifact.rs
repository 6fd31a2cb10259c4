//! Rendered page snapshot shared by every analyzer.
//!
//! A `PageArtifact` is produced once per scan and never mutated afterwards;
//! analyzers hold it behind an `Arc` and read it concurrently.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Immutable snapshot of a rendered page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageArtifact {
    /// PNG screenshot of the viewport
    #[serde(skip)]
    pub screenshot: Vec<u8>,
    /// Viewport the page was rendered at
    pub viewport: Viewport,
    /// Serialized DOM after load
    pub dom_html: String,
    /// Headers of the main document response
    pub headers: HashMap<String, String>,
    /// Cookies set for the page
    pub cookies: Vec<CookieInfo>,
    /// Every request issued while loading
    pub network_log: Vec<NetworkRequest>,
    /// Geometry of clickable elements
    pub clickable_elements: Vec<ClickableElement>,
}

impl PageArtifact {
    /// Look up a response header case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// Security-relevant cookie attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieInfo {
    /// Cookie name
    pub name: String,
    /// `Secure` attribute
    pub secure: bool,
    /// `HttpOnly` attribute
    #[serde(rename = "httpOnly")]
    pub http_only: bool,
}

/// One outgoing request observed during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Browser resource type (document, script, image, ...)
    pub resource_type: String,
}

/// A clickable element and its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickableElement {
    /// Tag name as reported by the DOM (usually upper case)
    pub tag: String,
    /// Visible text
    #[serde(default)]
    pub text: String,
    /// Link target, if any; non-string values (SVG `href`) read as absent
    #[serde(default, deserialize_with = "lenient_string")]
    pub href: Option<String>,
    /// Bounding rectangle; absent when the element has no layout box
    #[serde(default)]
    pub rect: Option<Rect>,
}

/// Bounding rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.is_empty() => Ok(Some(s)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let artifact = PageArtifact {
            screenshot: Vec::new(),
            viewport: Viewport::default(),
            dom_html: String::new(),
            headers: HashMap::from([(
                "Strict-Transport-Security".to_string(),
                "max-age=63072000".to_string(),
            )]),
            cookies: Vec::new(),
            network_log: Vec::new(),
            clickable_elements: Vec::new(),
        };

        assert_eq!(
            artifact.header("strict-transport-security"),
            Some("max-age=63072000")
        );
        assert!(artifact.header("content-security-policy").is_none());
    }

    #[test]
    fn test_clickable_element_from_dom_json() {
        let json = r#"{"tag":"A","text":"Pricing","href":"https://example.com/pricing",
            "rect":{"x":10.5,"y":20,"width":80,"height":24}}"#;
        let el: ClickableElement = serde_json::from_str(json).expect("parse element");
        assert_eq!(el.tag, "A");
        assert_eq!(el.href.as_deref(), Some("https://example.com/pricing"));
        assert_eq!(el.rect.expect("rect").width, 80.0);

        let bare: ClickableElement =
            serde_json::from_str(r#"{"tag":"BUTTON","href":null}"#).expect("parse bare element");
        assert!(bare.rect.is_none());
        assert!(bare.text.is_empty());
    }

    #[test]
    fn test_svg_link_href_reads_as_absent() {
        let json = r#"[
            {"tag":"a","text":"","href":{},"rect":{"x":0,"y":0,"width":16,"height":16}},
            {"tag":"A","text":"Docs","href":"/docs","rect":{"x":0,"y":20,"width":40,"height":16}},
            {"tag":"BUTTON","text":"Go","href":42}
        ]"#;
        let elements: Vec<ClickableElement> = serde_json::from_str(json).expect("parse elements");
        assert_eq!(elements.len(), 3);
        assert!(elements[0].href.is_none());
        assert_eq!(elements[0].rect.expect("rect").width, 16.0);
        assert_eq!(elements[1].href.as_deref(), Some("/docs"));
        assert!(elements[2].href.is_none());
    }
}
