//! Stylesheet packer

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{FilePacker, file_name};
use crate::asset::{Asset, AssetContent, MIME_CSS, compress};
use crate::error::Result;

/// Quoted strings and comments; everything else is minified
static LITERALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|/\*.*?\*/"#).expect("valid regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([:;,{}])\s*").expect("valid regex"));
static TRAILING_SEMICOLON: Lazy<Regex> = Lazy::new(|| Regex::new(r";+\}").expect("valid regex"));
// `%` is not a length unit here: `0%` is a keyframe selector and a flex basis
static ZERO_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^0-9.A-Za-z_#-])0(?:px|em|rem|ex|ch|vw|vh|vmin|vmax|cm|mm|in|pt|pc)\b")
        .expect("valid regex")
});

/// Minifies stylesheets when optimizing and stores them compressed
#[derive(Debug, Clone, Copy, Default)]
pub struct CssPacker;

impl FilePacker for CssPacker {
    fn extensions(&self) -> &'static [&'static str] {
        &[".css"]
    }

    fn process(&self, file: &Path, optimize: bool) -> Result<Asset> {
        let source = std::fs::read_to_string(file)?;
        let name = file_name(file);

        let text = if optimize && !name.ends_with(".min.css") {
            minify_css(&source)
        } else {
            source
        };

        Ok(Asset {
            name,
            mime_type: MIME_CSS.to_string(),
            content: AssetContent::Compressed {
                data: compress(text.as_bytes())?,
            },
            demands: Vec::new(),
        })
    }
}

/// Strip comments and redundant whitespace from a stylesheet
///
/// Also drops the last `;` of each block and the unit of zero lengths
/// (`0px` becomes `0`). Quoted strings are copied unchanged.
pub fn minify_css(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut code = String::new();
    let mut last = 0;

    for literal in LITERALS.find_iter(source) {
        code.push_str(&source[last..literal.start()]);
        last = literal.end();
        if literal.as_str().starts_with("/*") {
            continue;
        }
        out.push_str(&minify_code(&code));
        out.push_str(literal.as_str());
        code.clear();
    }
    code.push_str(&source[last..]);
    out.push_str(&minify_code(&code));

    out.trim().to_string()
}

/// Minify a run of stylesheet text containing no strings or comments
fn minify_code(code: &str) -> String {
    let text = WHITESPACE.replace_all(code, " ");
    let text = PUNCTUATION.replace_all(&text, "$1");
    let text = TRAILING_SEMICOLON.replace_all(&text, "}");
    // Run twice so adjacent zeros sharing a separator are both caught
    let text = ZERO_UNITS.replace_all(&text, "${1}0");
    let text = ZERO_UNITS.replace_all(&text, "${1}0");
    text.into_owned()
}
