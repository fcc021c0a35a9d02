//! Packaged assets
//!
//! An [`Asset`] is one processed source file. Its content is either an opaque
//! byte payload or, for HTML, a structured [`HtmlContent`] record.

use base64::Engine;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::Result;
use crate::markup::Element;

pub const MIME_BINARY: &str = "application/octet-stream";
pub const MIME_CSS: &str = "text/css";
pub const MIME_XML: &str = "text/xml";
pub const MIME_HTML: &str = "text/html";
pub const MIME_JAVASCRIPT: &str = "text/javascript";

/// One packaged file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Logical path: lower-case, forward slashes, no leading slash
    pub name: String,
    pub mime_type: String,
    pub content: AssetContent,
    /// Security policies required to view the asset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub demands: Vec<String>,
}

impl Asset {
    /// The asset payload as plain bytes
    ///
    /// Compressed payloads are inflated; HTML assets are serialized back to
    /// markup.
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        match &self.content {
            AssetContent::Raw { data } => Ok(data.clone()),
            AssetContent::Compressed { data } => decompress(data),
            AssetContent::Html(html) => Ok(html.html.to_markup().into_bytes()),
        }
    }

    /// The structured HTML content, if this is an HTML asset
    pub fn html(&self) -> Option<&HtmlContent> {
        match &self.content {
            AssetContent::Html(html) => Some(html),
            _ => None,
        }
    }
}

/// Asset payload shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum AssetContent {
    Raw {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// Gzip compressed bytes
    Compressed {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Html(Box<HtmlContent>),
}

/// A string tagged with a language code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleString {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub value: String,
}

/// A script referenced from markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptReference {
    pub reference: String,
    /// Static scripts are loaded with the page, dynamic ones on demand
    pub is_static: bool,
}

/// Structured content of an HTML asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlContent {
    /// Markup with every applet-namespace node removed
    pub html: Element,
    #[serde(default)]
    pub titles: Vec<LocaleString>,
    #[serde(default)]
    pub bundles: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<ScriptReference>,
    #[serde(default)]
    pub styles: Vec<String>,
    pub kind: HtmlKind,
}

impl HtmlContent {
    pub fn widget(&self) -> Option<&WidgetDescriptor> {
        match &self.kind {
            HtmlKind::Widget(w) => Some(w),
            HtmlKind::View(_) => None,
        }
    }

    pub fn view(&self) -> Option<&ViewDefinition> {
        match &self.kind {
            HtmlKind::View(v) => Some(v),
            HtmlKind::Widget(_) => None,
        }
    }
}

/// An HTML asset is either a widget or a view-bearing page, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HtmlKind {
    View(ViewDefinition),
    Widget(WidgetDescriptor),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ViewState>,
}

/// A routable view state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub views: Vec<View>,
}

/// A named view slot inside a state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default)]
    pub titles: Vec<LocaleString>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetType {
    #[default]
    Panel,
    Tab,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Alternate views a widget offers besides its main one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetView {
    Edit,
    Settings,
    Alternate,
}

/// Descriptor of a dashboard widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub widget_type: WidgetType,
    pub size: WidgetSize,
    /// Empty when the widget has no alternate views
    #[serde(default)]
    pub alternate_views: Vec<WidgetView>,
    pub header_class: String,
    pub priority: i32,
    pub max_stack: i32,
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub description: Vec<LocaleString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Expressions that must all hold for the widget to be shown
    #[serde(default)]
    pub guards: Vec<String>,
}

/// Gzip compress a payload
///
/// The gzip header carries no timestamp so identical input always yields
/// identical output.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a gzip payload
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Serde adapter storing byte payloads as base64 strings
pub(crate) mod base64_bytes {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Same as [`base64_bytes`] for optional payloads
pub(crate) mod base64_opt {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|t| {
            base64::engine::general_purpose::STANDARD
                .decode(t.as_bytes())
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_is_deterministic() {
        let data = b"body { color: red }".repeat(10);
        let a = compress(&data).unwrap();
        let b = compress(&data).unwrap();
        assert_eq!(a, b);
        assert_eq!(decompress(&a).unwrap(), data);
    }

    #[test]
    fn test_asset_json_uses_base64() {
        let asset = Asset {
            name: "img/logo.png".to_string(),
            mime_type: MIME_BINARY.to_string(),
            content: AssetContent::Raw {
                data: vec![0, 1, 2, 255],
            },
            demands: vec![],
        };
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains("\"AAEC/w==\""));
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
        assert_eq!(back.content_bytes().unwrap(), vec![0, 1, 2, 255]);
    }
}
