//! Content parsers: plain text, Markdown source and HTML.
//!
//! None of these render markup. They normalize the text and record the
//! document's headings so other components (titles, tables of contents)
//! can use them.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use quire_shared::Result;

use crate::capability::{Content, ContentParser};
use crate::plugin::{Capability, Plugin, PluginContext, PluginDescriptor};

static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+(.+?)[ \t]*#*[ \t]*$").expect("valid regex"));

static MD_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^(```|~~~).*?^(```|~~~)[ \t]*$").expect("valid regex"));

static HTML_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]\s*>").expect("valid regex"));

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

pub const TEXT: PluginDescriptor = PluginDescriptor {
    name: "text",
    capabilities: &[Capability::ContentParser],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: None,
    construct: build_text,
};

pub const MARKDOWN_SOURCE: PluginDescriptor = PluginDescriptor {
    name: "markdown-source",
    capabilities: &[Capability::ContentParser],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: None,
    construct: build_markdown_source,
};

pub const HTML: PluginDescriptor = PluginDescriptor {
    name: "html",
    capabilities: &[Capability::ContentParser],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: None,
    construct: build_html,
};

fn build_text(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(TextParser))
}

fn build_markdown_source(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(MarkdownSourceParser))
}

fn build_html(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(HtmlParser))
}

/// Normalize line endings and drop a leading byte-order mark.
fn normalize(text: &str) -> String {
    text.trim_start_matches('\u{feff}').replace("\r\n", "\n")
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct TextParser;

impl ContentParser for TextParser {
    fn extensions(&self) -> &[&'static str] {
        &["txt", "text"]
    }

    fn parse_str(&self, text: &str) -> Result<Content> {
        Ok(Content {
            format: "text".into(),
            text: normalize(text),
            headings: Vec::new(),
        })
    }
}

impl Plugin for TextParser {
    fn as_content_parser(&self) -> Option<&dyn ContentParser> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Keeps Markdown as source; ATX headings outside code fences are recorded.
pub struct MarkdownSourceParser;

impl ContentParser for MarkdownSourceParser {
    fn extensions(&self) -> &[&'static str] {
        &["md", "markdown"]
    }

    fn parse_str(&self, text: &str) -> Result<Content> {
        let text = normalize(text);
        let without_code = MD_FENCE.replace_all(&text, "");
        let headings = MD_HEADING
            .captures_iter(&without_code)
            .map(|c| c[1].trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(Content {
            format: "markdown".into(),
            text,
            headings,
        })
    }
}

impl Plugin for MarkdownSourceParser {
    fn as_content_parser(&self) -> Option<&dyn ContentParser> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

pub struct HtmlParser;

impl ContentParser for HtmlParser {
    fn extensions(&self) -> &[&'static str] {
        &["html", "htm"]
    }

    fn parse_str(&self, text: &str) -> Result<Content> {
        let text = normalize(text);
        let headings = HTML_HEADING
            .captures_iter(&text)
            .map(|c| {
                let inner = HTML_TAG.replace_all(&c[1], "");
                inner.split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .filter(|h| !h.is_empty())
            .collect();
        Ok(Content {
            format: "html".into(),
            text,
            headings,
        })
    }
}

impl Plugin for HtmlParser {
    fn as_content_parser(&self) -> Option<&dyn ContentParser> {
        Some(self)
    }
}
