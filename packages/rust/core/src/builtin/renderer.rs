//! The `templates` renderer.
//!
//! Substitutes `{{ dotted.path }}` placeholders from the render context.
//! Named templates are files under the configured template directories,
//! then each pack's `templates/`; `name` resolves to `name` or `name.html`,
//! first directory first.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use quire_shared::{PACK_TEMPLATE_DIR, QuireError, Result, lookup_path};

use crate::capability::{TemplateRef, TemplateRenderer};
use crate::plugin::{Capability, Plugin, PluginContext, PluginDescriptor};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid regex")
});

/// Template directories used when `templates.dirs` is not configured.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

pub const TEMPLATES: PluginDescriptor = PluginDescriptor {
    name: "templates",
    capabilities: &[Capability::Renderer],
    dependencies: &[],
    config: &[("dirs", "templates.dirs")],
    is_abstract: false,
    component: None,
    construct: build_templates,
};

fn build_templates(ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
    let dirs: Vec<PathBuf> = ctx
        .config_value("dirs")?
        .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_TEMPLATE_DIR)]);
    let src_path = &ctx.engine.src_path;
    let dirs = dirs
        .into_iter()
        .map(|d| if d.is_absolute() { d } else { src_path.join(d) })
        .chain(
            ctx.engine
                .config
                .pack_dirs(src_path)
                .into_iter()
                .map(|pack| pack.join(PACK_TEMPLATE_DIR)),
        )
        .collect();
    Ok(Arc::new(TemplateRendererPlugin::new(dirs)))
}

/// File-backed placeholder renderer. Loaded templates are cached by name.
pub struct TemplateRendererPlugin {
    dirs: Vec<PathBuf>,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl TemplateRendererPlugin {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn load(&self, name: &str) -> Result<Arc<str>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(source) = cache.get(name) {
                return Ok(Arc::clone(source));
            }
        }

        let escapes = name.split(['/', '\\']).any(|segment| segment == "..")
            || Path::new(name)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(QuireError::render(format!(
                "template name `{name}` escapes the template directories"
            )));
        }

        let candidates = self
            .dirs
            .iter()
            .flat_map(|dir| [dir.join(name), dir.join(format!("{name}.html"))]);
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            let source: Arc<str> = std::fs::read_to_string(&path)
                .map_err(|e| QuireError::io(&path, e))?
                .into();
            debug!(template = name, path = %path.display(), "template loaded");
            if let Ok(mut cache) = self.cache.write() {
                cache.insert(name.to_string(), Arc::clone(&source));
            }
            return Ok(source);
        }

        let searched: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        Err(QuireError::render(format!(
            "template `{name}` not found in [{}]",
            searched.join(", ")
        )))
    }
}

/// Replace every placeholder in `source` with its value from `context`.
///
/// Strings are inserted as-is, missing and null values as nothing, and
/// other values as compact JSON.
pub fn interpolate(source: &str, context: &Value) -> String {
    PLACEHOLDER
        .replace_all(source, |caps: &Captures<'_>| match lookup_path(context, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

impl TemplateRenderer for TemplateRendererPlugin {
    fn render(&self, template: TemplateRef<'_>, context: &Value) -> Result<String> {
        match template {
            TemplateRef::Named(name) => {
                let source = self.load(name)?;
                Ok(interpolate(&source, context))
            }
            TemplateRef::Inline { source, .. } => Ok(interpolate(source, context)),
        }
    }
}

impl Plugin for TemplateRendererPlugin {
    fn as_renderer(&self) -> Option<&dyn TemplateRenderer> {
        Some(self)
    }
}
