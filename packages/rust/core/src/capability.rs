//! Collaborator capabilities the engine calls by trait, never by concrete type.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use quire_shared::{QuireError, Result, SiteConfig};

use crate::assembler::Bundle;
use crate::ignore::IgnoreFilter;

// ---------------------------------------------------------------------------
// Content parsing
// ---------------------------------------------------------------------------

/// Parsed bundle content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    /// Name of the parser that produced this content.
    pub format: String,
    pub text: String,
    /// Section headings found in the source, in document order.
    pub headings: Vec<String>,
}

/// Parses content from a byte stream or literal text.
pub trait ContentParser: Send + Sync {
    /// File extensions (without the dot) this parser accepts.
    fn extensions(&self) -> &[&'static str];

    fn parse_str(&self, text: &str) -> Result<Content>;

    fn parse(&self, reader: &mut dyn Read) -> Result<Content> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| QuireError::parse(format!("content is not valid UTF-8 text: {e}")))?;
        self.parse_str(&text)
    }
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

/// Which template to render.
#[derive(Debug, Clone, Copy)]
pub enum TemplateRef<'a> {
    /// A template the renderer resolves by name.
    Named(&'a str),
    /// Template source carried by the bundle itself.
    Inline { name: &'a str, source: &'a str },
}

impl TemplateRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Inline { name, .. } => name,
        }
    }
}

/// Template source a bundle carries in its own `template` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSource {
    pub name: String,
    pub source: String,
}

/// Renders a template against a JSON context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: TemplateRef<'_>, context: &Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Engine lifecycle
// ---------------------------------------------------------------------------

/// What lifecycle hooks get to see.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub config: &'a SiteConfig,
    pub output_dir: &'a Path,
    pub bundles: &'a [Bundle],
}

/// Engine lifecycle hooks. Both default to doing nothing.
pub trait EngineHook: Send + Sync {
    fn initialize(&self, _ctx: HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn finalize(&self, _ctx: HookContext<'_>) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle discovery
// ---------------------------------------------------------------------------

/// What bundle finders get to see.
#[derive(Clone, Copy)]
pub struct DiscoveryContext<'a> {
    pub src_path: &'a Path,
    pub config: &'a SiteConfig,
    pub ignore: &'a IgnoreFilter,
}

/// Contributes bundle directories beyond the configured `bundle_dirs`.
pub trait BundleDiscovery: Send + Sync {
    /// `(key, directory)` pairs to assemble. Keys already found elsewhere are skipped.
    fn find_bundles(&self, ctx: DiscoveryContext<'_>) -> Result<Vec<(String, PathBuf)>>;
}
