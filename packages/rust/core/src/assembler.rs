//! Bundle assembler.
//!
//! Takes one bundle directory, filters and groups its files by owning
//! component, then drives every component loader in dependency order to
//! build the bundle's component map and its layered metadata view.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use quire_shared::{META_DIRECTORY, META_KEY, Meta, MetaData, QuireError, Result};

use crate::component::{ComponentDeps, ComponentFile, ComponentFiles, ComponentValue, split_file_name};
use crate::ignore::IgnoreFilter;
use crate::order::ComponentSet;

/// Name of the component whose data backs a bundle's [`Meta`].
pub const META_COMPONENT: &str = "meta";

/// Basename used when a bundle without a meta file gets one written.
const DEFAULT_META_FILE: &str = "meta.yaml";

/// One non-ignored file in a bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub file_name: String,
    pub basename: String,
    pub extension: String,
    pub path: PathBuf,
}

/// A fully assembled bundle.
#[derive(Debug)]
pub struct Bundle {
    key: String,
    directory: PathBuf,
    files: Vec<BundleFile>,
    components: BTreeMap<String, ComponentValue>,
    meta: Meta,
}

impl Bundle {
    /// A bundle with metadata only and no files or components.
    pub fn with_meta(key: impl Into<String>, directory: impl Into<PathBuf>, meta: Meta) -> Self {
        Self {
            key: key.into(),
            directory: directory.into(),
            files: Vec::new(),
            components: BTreeMap::new(),
            meta,
        }
    }

    /// Unique key: directory-relative path with the extension stripped.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Source directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Every non-ignored file, sorted by name.
    pub fn files(&self) -> &[BundleFile] {
        &self.files
    }

    /// Loaded component names, sorted.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// A loaded component's value, if present and of type `T`.
    ///
    /// For `meta` this is the data as read from disk; use [`Bundle::meta`]
    /// for the live view.
    pub fn component<T: std::any::Any>(&self, name: &str) -> Option<&T> {
        self.components.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn component_value(&self, name: &str) -> Option<&ComponentValue> {
        self.components.get(name)
    }

    /// Add or replace a component value, returning the previous one.
    pub fn insert_component(
        &mut self,
        name: impl Into<String>,
        value: ComponentValue,
    ) -> Option<ComponentValue> {
        self.components.insert(name.into(), value)
    }

    /// Live metadata: own data (with injected key and directory) over site defaults.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Extension of rendered output, from meta `output_ext` (default `html`).
    pub fn output_ext(&self) -> String {
        match self.meta.get("output_ext") {
            Some(Value::String(ext)) => ext.trim_start_matches('.').to_string(),
            Some(Value::Null) => String::new(),
            _ => "html".to_string(),
        }
    }

    /// Output path relative to the output directory.
    pub fn output_path(&self) -> PathBuf {
        let mut path = self.key.clone();
        if path.is_empty() || path.ends_with('/') {
            path.push_str("index");
        }
        let ext = self.output_ext();
        if !ext.is_empty() {
            path.push('.');
            path.push_str(&ext);
        }
        PathBuf::from(path)
    }

    /// Public URL of the rendered bundle, with a trailing `index.html` dropped.
    pub fn url(&self) -> String {
        let url = format!("/{}", self.output_path().to_string_lossy().replace('\\', "/"));
        match url.strip_suffix("index.html") {
            Some(stripped) => stripped.to_string(),
            None => url,
        }
    }

    /// JSON view of every component plus the live meta, for templates.
    pub fn to_value(&self) -> Value {
        let mut components = Map::new();
        for (name, value) in &self.components {
            components.insert(name.clone(), value.to_json());
        }
        components.insert(META_COMPONENT.to_string(), self.meta.to_value());

        serde_json::json!({
            "key": self.key,
            "directory": self.directory.to_string_lossy(),
            "url": self.url(),
            "components": components,
            "meta": self.meta.to_value(),
        })
    }

    /// Persist the bundle's own metadata, minus injected fields.
    ///
    /// Writes to the bundle's meta file (format chosen by extension), or
    /// creates `meta.yaml` when the bundle has none.
    pub fn write_meta(&self) -> Result<PathBuf> {
        let mut data = self.meta.data().clone();
        data.remove(META_KEY);
        data.remove(META_DIRECTORY);

        let target = self
            .files
            .iter()
            .find(|f| f.basename == META_COMPONENT)
            .map(|f| (f.path.clone(), f.extension.clone()))
            .unwrap_or_else(|| (self.directory.join(DEFAULT_META_FILE), "yaml".to_string()));

        let (path, ext) = target;
        let text = match ext.as_str() {
            "json" => serde_json::to_string_pretty(&data)
                .map_err(|e| QuireError::validation(format!("meta serialization failed: {e}")))?,
            "toml" => toml::to_string_pretty(&data)
                .map_err(|e| QuireError::validation(format!("meta serialization failed: {e}")))?,
            _ => serde_yaml::to_string(&data)
                .map_err(|e| QuireError::validation(format!("meta serialization failed: {e}")))?,
        };

        std::fs::write(&path, text).map_err(|e| QuireError::io(&path, e))?;
        debug!(key = %self.key, path = %path.display(), "wrote bundle meta");
        Ok(path)
    }
}

/// Assembles bundles against a fixed component set and ignore filter.
///
/// Holds only shared references, so one assembler can serve many threads.
#[derive(Debug, Clone, Copy)]
pub struct BundleAssembler<'a> {
    components: &'a ComponentSet,
    ignore: &'a IgnoreFilter,
    defaults: &'a Arc<MetaData>,
}

impl<'a> BundleAssembler<'a> {
    pub fn new(
        components: &'a ComponentSet,
        ignore: &'a IgnoreFilter,
        defaults: &'a Arc<MetaData>,
    ) -> Self {
        Self {
            components,
            ignore,
            defaults,
        }
    }

    /// Assemble the bundle rooted at `directory`.
    #[instrument(skip_all, fields(key = %key))]
    pub fn assemble(&self, key: &str, directory: &Path) -> Result<Bundle> {
        self.assemble_inner(key, directory)
            .map_err(|e| e.in_bundle(key))
    }

    fn assemble_inner(&self, key: &str, directory: &Path) -> Result<Bundle> {
        let files = self.list_files(directory)?;
        let grouped = self.group_files(key, &files);

        let mut components: BTreeMap<String, ComponentValue> = BTreeMap::new();
        let empty = ComponentFiles::new();

        for entry in self.components.ordered() {
            let Some(loader) = entry.component() else {
                continue;
            };

            let mut deps = ComponentDeps::new();
            for dep in &entry.depends_on {
                if let Some((name, value)) = components.get_key_value(*dep) {
                    deps.insert(name.as_str(), value);
                }
            }

            let owned = grouped.get(entry.name).unwrap_or(&empty);
            match loader.load(&deps, owned)? {
                Some(value) => {
                    debug!(component = entry.name, "component loaded");
                    components.insert(entry.name.to_string(), value);
                }
                None => debug!(component = entry.name, "component not applicable"),
            }
        }

        let mut data = components
            .get(META_COMPONENT)
            .and_then(|v| v.downcast_ref::<MetaData>())
            .cloned()
            .unwrap_or_default();
        data.insert(META_KEY.to_string(), Value::String(key.to_string()));
        data.insert(
            META_DIRECTORY.to_string(),
            Value::String(directory.to_string_lossy().into_owned()),
        );

        Ok(Bundle {
            key: key.to_string(),
            directory: directory.to_path_buf(),
            files,
            components,
            meta: Meta::new(data, Arc::clone(self.defaults)),
        })
    }

    /// Non-ignored regular files directly inside `directory`, sorted by name.
    fn list_files(&self, directory: &Path) -> Result<Vec<BundleFile>> {
        let entries = std::fs::read_dir(directory).map_err(|e| QuireError::io(directory, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuireError::io(directory, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if self.ignore.is_ignored(&file_name) {
                debug!(file = %file_name, "ignored");
                continue;
            }
            let (basename, extension) = split_file_name(&file_name);
            files.push(BundleFile {
                file_name,
                basename,
                extension,
                path,
            });
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    /// Group files by owning component. Unowned files are skipped; for a
    /// repeated basename the lexically first file name wins.
    fn group_files(&self, key: &str, files: &[BundleFile]) -> BTreeMap<&'static str, ComponentFiles> {
        let ownership = self.components.ownership();
        let mut grouped: BTreeMap<&'static str, ComponentFiles> = BTreeMap::new();

        for file in files {
            let Some(owner) = ownership.owner(&file.basename) else {
                debug!(bundle = key, file = %file.file_name, "no component owns this file");
                continue;
            };
            let inserted = grouped.entry(owner).or_default().insert(
                file.basename.clone(),
                ComponentFile {
                    extension: file.extension.clone(),
                    path: file.path.clone(),
                },
            );
            if !inserted {
                warn!(
                    bundle = key,
                    file = %file.file_name,
                    component = owner,
                    "basename already provided by an earlier file, skipping"
                );
            }
        }

        grouped
    }
}

/// Turn a bundle directory's path relative to its bundle root into a key.
///
/// Segments lose their extensions and are joined with `/`, so a nested
/// directory shares its parent bundle's key prefix.
pub fn bundle_key(relative: &Path) -> String {
    relative
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .map(|c| split_file_name(&c.as_os_str().to_string_lossy()).0)
        .collect::<Vec<_>>()
        .join("/")
}
