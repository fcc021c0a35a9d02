//! HTML packer
//!
//! Pages are authored as XHTML with extra elements in the applet namespace:
//!
//! ```xml
//! <html xmlns="http://www.w3.org/1999/xhtml"
//!       xmlns:ap="urn:appletpak:applet" ap:layout="layouts/main.html">
//!   <head>
//!     <ap:title lang="en">Patients</ap:title>
//!     <ap:script static="false">js/patients.js</ap:script>
//!     <ap:demand>1.3.6.1.4.1.33349.3.1.5.9.2.1</ap:demand>
//!     <ap:state name="patients.search" route="/patients" priority="1">
//!       <ap:view name="content" controller="PatientSearchController"/>
//!     </ap:state>
//!   </head>
//!   <body>...</body>
//! </html>
//! ```
//!
//! A page that declares `<ap:widget>` is packed as a widget instead of a
//! view. Every applet-namespace node is removed from the stored markup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{FilePacker, file_name};
use crate::asset::{
    Asset, AssetContent, HtmlContent, HtmlKind, LocaleString, MIME_HTML, ScriptReference, View,
    ViewDefinition, ViewState, WidgetDescriptor, WidgetSize, WidgetType, WidgetView,
};
use crate::error::{CoreError, Result};
use crate::markup::{self, Element, XHTML_NS};
use crate::version::translate_path;

/// Namespace of the applet metadata elements
pub const APPLET_NS: &str = "urn:appletpak:applet";

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Include target that is resolved at render time and never rewritten
const CONTENT_INCLUDE: &str = "content";

static INCLUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\s*#include\s+virtual=")([^"]*)("\s*)$"#).expect("valid regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPacker;

impl FilePacker for HtmlPacker {
    fn extensions(&self) -> &'static [&'static str] {
        &[".html", ".htm"]
    }

    fn process(&self, file: &Path, optimize: bool) -> Result<Asset> {
        let source = std::fs::read_to_string(file)?;
        let mut root = markup::parse_document(&source, file)?;

        if root.namespace.is_none() {
            root.assign_default_namespace(XHTML_NS);
        }
        root.rewrite_comments(&|comment: &str| rewrite_comment(comment, optimize));

        let applet = |name: &'static str| {
            root.descendants()
                .into_iter()
                .filter(move |e| e.is(APPLET_NS, name))
        };

        let titles = applet("title").map(locale_string).collect();
        let bundles = applet("bundle").map(|e| e.text().trim().to_string()).collect();
        let styles = applet("style").map(|e| e.text().trim().to_string()).collect();
        let demands = applet("demand").map(|e| e.text().trim().to_string()).collect();
        let scripts = applet("script")
            .map(|e| {
                Ok(ScriptReference {
                    reference: e.text().trim().to_string(),
                    is_static: parse_bool(e.attribute(None, "static"), true, file)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let kind = match find_widget(&root) {
            Some(widget) => HtmlKind::Widget(parse_widget(widget, file)?),
            None => HtmlKind::View(parse_view(&root, file)?),
        };

        root.strip_namespace(APPLET_NS);

        Ok(Asset {
            name: file_name(file),
            mime_type: MIME_HTML.to_string(),
            content: AssetContent::Html(Box::new(HtmlContent {
                html: root,
                titles,
                bundles,
                scripts,
                styles,
                kind,
            })),
            demands,
        })
    }
}

/// Normalize include directives; drop other comments when optimizing
fn rewrite_comment(comment: &str, optimize: bool) -> Option<String> {
    if let Some(caps) = INCLUDE.captures(comment) {
        let target = &caps[2];
        if target == CONTENT_INCLUDE {
            return Some(comment.to_string());
        }
        let normalized = translate_path(Some(target)).unwrap_or_default();
        let normalized = normalized.strip_prefix("./").unwrap_or(&normalized);
        return Some(format!("{}{}{}", &caps[1], normalized, &caps[3]));
    }

    // Other server-side directives survive optimization as well
    if !optimize || comment.trim_start().starts_with('#') {
        Some(comment.to_string())
    } else {
        None
    }
}

/// The widget declaration, a direct child of the root
fn find_widget(root: &Element) -> Option<&Element> {
    root.elements().find(|e| e.is(APPLET_NS, "widget"))
}

fn parse_view(root: &Element, file: &Path) -> Result<ViewDefinition> {
    let layout = translate_path(root.attribute(Some(APPLET_NS), "layout"));
    let is_static = parse_bool(root.attribute(Some(APPLET_NS), "static"), false, file)?;

    let state = match root.descendants().into_iter().find(|e| e.is(APPLET_NS, "state")) {
        Some(state) => Some(ViewState {
            name: state.attribute(None, "name").unwrap_or_default().to_string(),
            route: state.attribute(None, "route").map(str::to_string),
            priority: parse_number(state.attribute(None, "priority"), 0, file)?,
            is_abstract: parse_bool(state.attribute(None, "abstract"), false, file)?,
            views: state
                .elements()
                .filter(|e| e.is(APPLET_NS, "view"))
                .map(|view| View {
                    name: view.attribute(None, "name").unwrap_or_default().to_string(),
                    controller: view.attribute(None, "controller").map(str::to_string),
                    titles: view
                        .elements()
                        .filter(|e| e.is(APPLET_NS, "title"))
                        .map(locale_string)
                        .collect(),
                })
                .collect(),
        }),
        None => None,
    };

    Ok(ViewDefinition {
        layout,
        is_static,
        state,
    })
}

fn parse_widget(widget: &Element, file: &Path) -> Result<WidgetDescriptor> {
    let attr = |name: &str| widget.attribute(None, name);
    let child_texts = |name: &'static str| {
        widget
            .elements()
            .filter(move |e| e.is(APPLET_NS, name))
            .map(|e| e.text().trim().to_string())
    };

    let widget_type = match attr("type") {
        None => WidgetType::default(),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "panel" => WidgetType::Panel,
            "tab" => WidgetType::Tab,
            _ => return Err(invalid_value(file, "type", v)),
        },
    };

    let size = match attr("size") {
        None => WidgetSize::default(),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "small" => WidgetSize::Small,
            "medium" => WidgetSize::Medium,
            "large" => WidgetSize::Large,
            _ => return Err(invalid_value(file, "size", v)),
        },
    };

    let mut alternate_views = Vec::new();
    for flag in attr("altViews")
        .unwrap_or("None")
        .split([',', ' ', '|'])
        .filter(|f| !f.is_empty())
    {
        let view = match flag.to_ascii_lowercase().as_str() {
            "none" => continue,
            "edit" => WidgetView::Edit,
            "settings" => WidgetView::Settings,
            "alternate" => WidgetView::Alternate,
            _ => return Err(invalid_value(file, "altViews", flag)),
        };
        if !alternate_views.contains(&view) {
            alternate_views.push(view);
        }
    }

    Ok(WidgetDescriptor {
        name: attr("name")
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(file)),
        icon: attr("icon")
            .map(str::to_string)
            .or_else(|| child_texts("icon").next()),
        widget_type,
        size,
        alternate_views,
        header_class: attr("headerClass").unwrap_or("bg-light").to_string(),
        priority: parse_number(attr("priority"), 0, file)?,
        max_stack: parse_number(attr("maxStack"), 2, file)?,
        order: parse_number(attr("order"), 0, file)?,
        context: attr("context").map(str::to_string),
        description: widget
            .elements()
            .filter(|e| e.is(APPLET_NS, "description"))
            .map(locale_string)
            .collect(),
        controller: attr("controller").map(str::to_string),
        guards: child_texts("guard").collect(),
    })
}

fn locale_string(element: &Element) -> LocaleString {
    LocaleString {
        lang: element
            .attribute(None, "lang")
            .or_else(|| element.attribute(Some(XML_NS), "lang"))
            .map(str::to_string),
        value: element.text().trim().to_string(),
    }
}

fn parse_bool(value: Option<&str>, default: bool, file: &Path) -> Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" => Ok(true),
        Some(v) if v == "false" => Ok(false),
        Some(v) => Err(invalid_value(file, "boolean", &v)),
    }
}

fn parse_number(value: Option<&str>, default: i32, file: &Path) -> Result<i32> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| invalid_value(file, "number", v)),
    }
}

fn invalid_value(file: &Path, what: &str, value: &str) -> CoreError {
    CoreError::Processing {
        file: file.to_path_buf(),
        message: format!("invalid {} value '{}'", what, value),
    }
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pack(source: &str, optimize: bool) -> Result<Asset> {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Index.html");
        std::fs::write(&path, source).unwrap();
        HtmlPacker.process(&path, optimize)
    }

    const VIEW_PAGE: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:ap="urn:appletpak:applet" ap:layout="Layouts\Main.HTML" ap:static="true">
  <head>
    <ap:title lang="en">Patients</ap:title>
    <ap:title lang="fr">Patients FR</ap:title>
    <ap:bundle>bundles/core.js</ap:bundle>
    <ap:script>js/a.js</ap:script>
    <ap:script static="false">js/b.js</ap:script>
    <ap:style>css/site.css</ap:style>
    <ap:state name="patients.search" route="/patients" priority="2" abstract="false">
      <ap:view name="content" controller="SearchController">
        <ap:title lang="en">Search</ap:title>
      </ap:view>
    </ap:state>
  </head>
  <body>
    <!-- a plain comment -->
    <!--#include virtual="./Partials\Foo.JS"-->
    <!--#include virtual="content"-->
    <div><ap:demand>1.2.3.4</ap:demand>Hello</div>
  </body>
</html>"#;

    #[test]
    fn test_view_page() {
        let asset = pack(VIEW_PAGE, true).unwrap();
        assert_eq!(asset.name, "index.html");
        assert_eq!(asset.mime_type, MIME_HTML);
        assert_eq!(asset.demands, vec!["1.2.3.4"]);

        let html = asset.html().unwrap();
        assert_eq!(html.titles.len(), 3);
        assert_eq!(html.titles[0].lang.as_deref(), Some("en"));
        assert_eq!(html.titles[0].value, "Patients");
        assert_eq!(html.bundles, vec!["bundles/core.js"]);
        assert_eq!(html.styles, vec!["css/site.css"]);
        assert_eq!(
            html.scripts,
            vec![
                ScriptReference {
                    reference: "js/a.js".to_string(),
                    is_static: true
                },
                ScriptReference {
                    reference: "js/b.js".to_string(),
                    is_static: false
                },
            ]
        );

        let view = html.view().unwrap();
        assert!(html.widget().is_none());
        assert_eq!(view.layout.as_deref(), Some("layouts/main.html"));
        assert!(view.is_static);
        let state = view.state.as_ref().unwrap();
        assert_eq!(state.name, "patients.search");
        assert_eq!(state.route.as_deref(), Some("/patients"));
        assert_eq!(state.priority, 2);
        assert!(!state.is_abstract);
        assert_eq!(state.views.len(), 1);
        assert_eq!(state.views[0].controller.as_deref(), Some("SearchController"));
        assert_eq!(state.views[0].titles[0].value, "Search");
    }

    #[test]
    fn test_applet_markup_is_stripped() {
        let asset = pack(VIEW_PAGE, true).unwrap();
        let markup = String::from_utf8(asset.content_bytes().unwrap()).unwrap();
        assert!(!markup.contains(APPLET_NS));
        assert!(!markup.contains("ap:"));
        assert!(!markup.contains("Patients"));
        assert!(markup.contains("<div>Hello</div>"));
    }

    #[test]
    fn test_comments_when_optimizing() {
        let asset = pack(VIEW_PAGE, true).unwrap();
        let markup = String::from_utf8(asset.content_bytes().unwrap()).unwrap();
        assert!(!markup.contains("a plain comment"));
        assert!(markup.contains(r#"<!--#include virtual="partials/foo.js"-->"#));
        assert!(markup.contains(r#"<!--#include virtual="content"-->"#));
    }

    #[test]
    fn test_comments_kept_without_optimizing() {
        let asset = pack(VIEW_PAGE, false).unwrap();
        let markup = String::from_utf8(asset.content_bytes().unwrap()).unwrap();
        assert!(markup.contains("<!-- a plain comment -->"));
        assert!(markup.contains(r#"<!--#include virtual="partials/foo.js"-->"#));
    }

    #[test]
    fn test_widget_defaults() {
        let asset = pack(
            r#"<div xmlns:ap="urn:appletpak:applet">
  <ap:widget name="patient.summary" context="patient">
    <ap:description lang="en">Summary of the patient</ap:description>
    <ap:guard>patient.deceased == null</ap:guard>
  </ap:widget>
  <span>Summary</span>
</div>"#,
            true,
        )
        .unwrap();

        let html = asset.html().unwrap();
        assert!(html.view().is_none());
        let widget = html.widget().unwrap();
        assert_eq!(widget.name, "patient.summary");
        assert_eq!(widget.widget_type, WidgetType::Panel);
        assert_eq!(widget.size, WidgetSize::Medium);
        assert!(widget.alternate_views.is_empty());
        assert_eq!(widget.header_class, "bg-light");
        assert_eq!((widget.priority, widget.max_stack, widget.order), (0, 2, 0));
        assert_eq!(widget.context.as_deref(), Some("patient"));
        assert_eq!(widget.description[0].value, "Summary of the patient");
        assert_eq!(widget.guards, vec!["patient.deceased == null"]);

        // The root had no namespace and is moved into XHTML
        assert_eq!(html.html.namespace.as_deref(), Some(XHTML_NS));
    }

    #[test]
    fn test_widget_attributes() {
        let asset = pack(
            r#"<div xmlns:ap="urn:appletpak:applet"><ap:widget name="w" type="Tab" size="Large" altViews="Edit,Settings" headerClass="bg-dark" priority="5" maxStack="1" order="3" controller="WCtrl" icon="fa-user"/></div>"#,
            false,
        )
        .unwrap();
        let widget = asset.html().unwrap().widget().unwrap().clone();
        assert_eq!(widget.widget_type, WidgetType::Tab);
        assert_eq!(widget.size, WidgetSize::Large);
        assert_eq!(widget.alternate_views, vec![WidgetView::Edit, WidgetView::Settings]);
        assert_eq!(widget.header_class, "bg-dark");
        assert_eq!((widget.priority, widget.max_stack, widget.order), (5, 1, 3));
        assert_eq!(widget.controller.as_deref(), Some("WCtrl"));
        assert_eq!(widget.icon.as_deref(), Some("fa-user"));
    }

    #[test]
    fn test_nested_widget_is_not_a_declaration() {
        let asset = pack(
            r#"<div xmlns:ap="urn:appletpak:applet"><section><ap:widget name="inner"/></section></div>"#,
            true,
        )
        .unwrap();
        let html = asset.html().unwrap();
        assert!(html.widget().is_none());
        assert!(html.view().is_some());
        let markup = String::from_utf8(asset.content_bytes().unwrap()).unwrap();
        assert!(!markup.contains("widget"));
    }

    #[test]
    fn test_invalid_widget_size() {
        let err = pack(
            r#"<div xmlns:ap="urn:appletpak:applet"><ap:widget name="w" size="Huge"/></div>"#,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Processing { .. }));
    }

    #[test]
    fn test_malformed_markup() {
        let err = pack("<html>\n<body>\n<p>unclosed</body></html>", true).unwrap_err();
        match err {
            CoreError::MalformedSource { file, line, .. } => {
                assert!(file.ends_with("Index.html"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
