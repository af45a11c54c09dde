//! Built-in bundle components: `meta`, `content`, `title` and `template`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use quire_shared::{MetaData, QuireError, Result};

use crate::capability::{Content, ContentParser, TemplateSource};
use crate::component::{Component, ComponentDeps, ComponentFile, ComponentFiles, ComponentValue};
use crate::plugin::{Capability, ComponentSpec, Plugin, PluginContext, PluginDescriptor};

pub const META: PluginDescriptor = PluginDescriptor {
    name: "meta",
    capabilities: &[Capability::Component],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: Some(ComponentSpec {
        basenames: &["meta"],
        depends_on: &[],
    }),
    construct: build_meta,
};

pub const CONTENT: PluginDescriptor = PluginDescriptor {
    name: "content",
    capabilities: &[Capability::Component],
    dependencies: &[
        ("text", "text"),
        ("markdown", "markdown-source"),
        ("html", "html"),
    ],
    config: &[],
    is_abstract: false,
    component: Some(ComponentSpec {
        basenames: &["content", "body"],
        depends_on: &["meta"],
    }),
    construct: build_content,
};

pub const TITLE: PluginDescriptor = PluginDescriptor {
    name: "title",
    capabilities: &[Capability::Component],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: Some(ComponentSpec {
        basenames: &["title"],
        depends_on: &["content"],
    }),
    construct: build_title,
};

pub const TEMPLATE: PluginDescriptor = PluginDescriptor {
    name: "template",
    capabilities: &[Capability::Component],
    dependencies: &[],
    config: &[],
    is_abstract: false,
    component: Some(ComponentSpec {
        basenames: &["template"],
        depends_on: &[],
    }),
    construct: build_template,
};

fn build_meta(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(MetaComponent))
}

fn build_title(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(TitleComponent))
}

fn build_template(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(TemplateComponent))
}

fn build_content(ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    let mut parsers = Vec::with_capacity(CONTENT.dependencies.len());
    for (local, _) in CONTENT.dependencies {
        let plugin = ctx.dependency(local)?;
        if plugin.as_content_parser().is_none() {
            return Err(QuireError::config(format!(
                "content dependency `{local}` is not a content parser"
            )));
        }
        parsers.push(plugin);
    }
    Ok(Arc::new(ContentComponent { parsers }))
}

// ---------------------------------------------------------------------------
// meta
// ---------------------------------------------------------------------------

/// Reads `meta.{yaml,yml,json,toml}`. Always applicable.
pub struct MetaComponent;

impl MetaComponent {
    fn parse(file: &ComponentFile) -> Result<MetaData> {
        let text = file.read_to_string()?;
        if text.trim().is_empty() {
            return Ok(MetaData::new());
        }
        let parsed = match file.extension.as_str() {
            "json" => serde_json::from_str(&text).map_err(|e| e.to_string()),
            "toml" => toml::from_str(&text).map_err(|e| e.to_string()),
            "yaml" | "yml" | "" => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            other => Err(format!("unsupported meta format `.{other}`")),
        };
        parsed.map_err(|e| QuireError::parse(format!("{}: {e}", file.path.display())))
    }
}

impl Component for MetaComponent {
    fn load(&self, _deps: &ComponentDeps<'_>, files: &ComponentFiles) -> Result<Option<ComponentValue>> {
        let data = match files.get("meta") {
            Some(file) => Self::parse(file)?,
            None => MetaData::new(),
        };
        Ok(Some(ComponentValue::new(data)))
    }
}

impl Plugin for MetaComponent {
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// content
// ---------------------------------------------------------------------------

/// Parses `content.*` / `body.*` by extension, or a literal `content` in meta.
pub struct ContentComponent {
    parsers: Vec<Arc<dyn Plugin>>,
}

impl ContentComponent {
    fn parsers(&self) -> impl Iterator<Item = &dyn ContentParser> {
        self.parsers.iter().filter_map(|p| p.as_content_parser())
    }

    fn parser_for(&self, extension: &str) -> Option<&dyn ContentParser> {
        let extension = extension.to_ascii_lowercase();
        self.parsers()
            .find(|p| p.extensions().contains(&extension.as_str()))
    }

    /// The parser for `extension`, falling back to plain text.
    fn parser_or_text(&self, extension: &str) -> Result<&dyn ContentParser> {
        if let Some(parser) = self.parser_for(extension) {
            return Ok(parser);
        }
        debug!(extension, "no parser for extension, reading as text");
        self.parser_for("txt")
            .ok_or_else(|| QuireError::parse("no plain text parser is registered"))
    }
}

impl Component for ContentComponent {
    fn load(&self, deps: &ComponentDeps<'_>, files: &ComponentFiles) -> Result<Option<ComponentValue>> {
        if let Some((_, file)) = files.first_of(&["content", "body"]) {
            let parser = self.parser_or_text(&file.extension)?;
            let mut reader = file.open()?;
            let content = parser
                .parse(&mut reader)
                .map_err(|e| QuireError::parse(format!("{}: {e}", file.path.display())))?;
            return Ok(Some(ComponentValue::new(content)));
        }

        let Some(meta) = deps.get::<MetaData>("meta") else {
            return Ok(None);
        };
        let Some(literal) = meta.get("content").and_then(Value::as_str) else {
            return Ok(None);
        };
        let format = meta
            .get("content_format")
            .and_then(Value::as_str)
            .unwrap_or("txt");
        let parser = self.parser_for(format).ok_or_else(|| {
            QuireError::parse(format!("unknown content_format `{format}`"))
        })?;
        Ok(Some(ComponentValue::new(parser.parse_str(literal)?)))
    }
}

impl Plugin for ContentComponent {
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// title
// ---------------------------------------------------------------------------

/// First line of `title.*`, else the first heading of the bundle's content.
pub struct TitleComponent;

impl Component for TitleComponent {
    fn load(&self, deps: &ComponentDeps<'_>, files: &ComponentFiles) -> Result<Option<ComponentValue>> {
        if let Some(file) = files.get("title") {
            let text = file.read_to_string()?;
            if let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                return Ok(Some(ComponentValue::new(line.to_string())));
            }
        }

        let heading = deps
            .get::<Content>("content")
            .and_then(|c| c.headings.first())
            .cloned();
        Ok(heading.map(ComponentValue::new))
    }
}

impl Plugin for TitleComponent {
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// template
// ---------------------------------------------------------------------------

/// A template shipped inside the bundle itself.
pub struct TemplateComponent;

impl Component for TemplateComponent {
    fn load(&self, _deps: &ComponentDeps<'_>, files: &ComponentFiles) -> Result<Option<ComponentValue>> {
        let Some(file) = files.get("template") else {
            return Ok(None);
        };
        Ok(Some(ComponentValue::new(TemplateSource {
            name: file.path.display().to_string(),
            source: file.read_to_string()?,
        })))
    }
}

impl Plugin for TemplateComponent {
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
}
