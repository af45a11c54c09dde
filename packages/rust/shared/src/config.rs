//! Site configuration for quire.
//!
//! A site is configured by `site.yaml` (or `site.toml`) at the root of the
//! source directory. Known keys are typed fields; everything else is kept in
//! [`SiteConfig::extra`] for plugins to pick up through their config mappings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QuireError, Result};

/// Preferred configuration file name.
pub const YAML_CONFIG_FILE: &str = "site.yaml";

/// Fallback configuration file name.
pub const TOML_CONFIG_FILE: &str = "site.toml";

/// Bundle directory inside a pack.
pub const PACK_CONTENT_DIR: &str = "content";

/// Template directory inside a pack.
pub const PACK_TEMPLATE_DIR: &str = "templates";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level site config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Directories scanned for bundles, in priority order.
    #[serde(default = "default_bundle_dirs")]
    pub bundle_dirs: Vec<PathBuf>,

    /// Glob patterns for file and directory names excluded from assembly.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Named pipelines run by `render_all`, in order.
    #[serde(default)]
    pub entries: Vec<PipelineDef>,

    /// Extra input directories (`dir:<path>`), each with its own
    /// `content/` bundles and `templates/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packs: Vec<PackSource>,

    /// Output directory, overriding the CLI default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Site-wide metadata defaults every bundle's meta falls back to.
    #[serde(default)]
    pub bundle_defaults: Map<String, Value>,

    /// Any other keys, consumed by plugin config mappings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            bundle_dirs: default_bundle_dirs(),
            ignore: Vec::new(),
            entries: Vec::new(),
            packs: Vec::new(),
            output: None,
            bundle_defaults: Map::new(),
            extra: Map::new(),
        }
    }
}

fn default_bundle_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("content")]
}

/// Where a pack comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PackSource {
    /// A directory, relative to the site source unless absolute.
    Dir(PathBuf),
}

impl TryFrom<String> for PackSource {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        match raw.split_once(':') {
            Some(("dir", path)) if !path.is_empty() => Ok(Self::Dir(PathBuf::from(path))),
            Some((kind, _)) if kind != "dir" => {
                Err(format!("unknown pack type `{kind}` in `{raw}` (expected `dir:<path>`)"))
            }
            _ => Err(format!("invalid pack `{raw}` (expected `dir:<path>`)")),
        }
    }
}

impl From<PackSource> for String {
    fn from(pack: PackSource) -> Self {
        match pack {
            PackSource::Dir(path) => format!("dir:{}", path.display()),
        }
    }
}

/// Sort key for pack directories: leading number of the directory name
/// (unnumbered first), then the rest of the name.
fn pack_order(path: &Path) -> (Option<u64>, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
    let rest = name[digits.len()..].to_string();
    (digits.parse().ok(), rest)
}

/// A named pipeline: an ordered list of stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
}

/// One `(operation, argument)` pair.
///
/// Written in configuration as a single-key mapping: `{limit: {n: 2}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct PipelineStage {
    pub operation: String,
    pub argument: Value,
}

impl PipelineStage {
    pub fn new(operation: impl Into<String>, argument: Value) -> Self {
        Self {
            operation: operation.into(),
            argument,
        }
    }
}

impl TryFrom<Map<String, Value>> for PipelineStage {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        if map.len() != 1 {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            return Err(format!(
                "pipeline stage must have exactly one operation key, found [{}]",
                keys.join(", ")
            ));
        }
        let Some((operation, argument)) = map.into_iter().next() else {
            return Err("empty pipeline stage".into());
        };
        Ok(Self {
            operation,
            argument,
        })
    }
}

impl From<PipelineStage> for Map<String, Value> {
    fn from(stage: PipelineStage) -> Self {
        let mut map = Map::new();
        map.insert(stage.operation, stage.argument);
        map
    }
}

impl SiteConfig {
    /// The whole config as one JSON tree, for dotted-path lookups.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Resolve a dotted path (`templates.dirs`) against the config.
    ///
    /// Returns `None` when any segment is absent.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        lookup_path(&self.to_value(), path).cloned()
    }

    /// Resolved pack directories, ordered by their numeric name prefix.
    pub fn pack_dirs(&self, src_path: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .packs
            .iter()
            .map(|pack| match pack {
                PackSource::Dir(dir) if dir.is_absolute() => dir.clone(),
                PackSource::Dir(dir) => src_path.join(dir),
            })
            .collect();
        dirs.sort_by_cached_key(|dir| pack_order(dir));
        dirs
    }

    /// Look up a pipeline definition by name.
    pub fn pipeline(&self, name: &str) -> Option<&PipelineDef> {
        self.entries.iter().find(|p| p.name == name)
    }
}

/// Walk a dotted path through nested JSON objects.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Locate the config file for a site source directory.
pub fn config_file_path(src_path: &Path) -> Result<PathBuf> {
    [YAML_CONFIG_FILE, TOML_CONFIG_FILE]
        .iter()
        .map(|name| src_path.join(name))
        .find(|p| p.exists())
        .ok_or_else(|| QuireError::ConfigurationMissing {
            path: src_path.to_path_buf(),
        })
}

/// Load the site config from a source directory.
pub fn load_config(src_path: &Path) -> Result<SiteConfig> {
    let path = config_file_path(src_path)?;
    tracing::debug!(?path, "loading site config");
    load_config_from(&path)
}

/// Load the site config from a specific file, by extension.
pub fn load_config_from(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QuireError::io(path, e))?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let parsed = if is_toml {
        toml::from_str(&content).map_err(|e| e.to_string())
    } else if content.trim().is_empty() {
        Ok(SiteConfig::default())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|e| QuireError::config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_config_with_pipelines() {
        let yaml = r#"
bundle_dirs: [posts, pages]
ignore: ["*.draft.*", ".*"]
entries:
  - name: front
    stages:
      - filter: {tag: x}
      - sort: {by: recent, desc: true}
      - limit: {n: 2}
templates:
  dirs: [layouts]
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.bundle_dirs, vec![PathBuf::from("posts"), PathBuf::from("pages")]);
        assert_eq!(config.ignore.len(), 2);

        let front = config.pipeline("front").expect("pipeline");
        assert_eq!(front.stages.len(), 3);
        assert_eq!(front.stages[1].operation, "sort");
        assert_eq!(front.stages[2].argument["n"], 2);

        assert!(config.extra.contains_key("templates"));
        assert!(!config.extra.contains_key("entries"));
    }

    #[test]
    fn stage_with_two_operations_is_rejected() {
        let yaml = r#"
entries:
  - name: bad
    stages:
      - {filter: {tag: x}, limit: 2}
"#;
        let err = serde_yaml::from_str::<SiteConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("exactly one operation key"));
    }

    #[test]
    fn toml_config_parses() {
        let toml_str = r#"
bundle_dirs = ["content"]
ignore = ["*.bak"]

[bundle_defaults]
author = "someone"

[[entries]]
name = "all"
stages = [{ render = true }]
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.bundle_defaults["author"], "someone");
        assert_eq!(config.entries[0].stages[0], PipelineStage::new("render", Value::Bool(true)));
    }

    #[test]
    fn dotted_lookup_resolves_nested_and_missing_keys() {
        let mut config = SiteConfig::default();
        config
            .extra
            .insert("templates".into(), serde_json::json!({"dirs": ["t"]}));

        assert_eq!(config.lookup("templates.dirs"), Some(serde_json::json!(["t"])));
        assert_eq!(config.lookup("bundle_dirs"), Some(serde_json::json!(["content"])));
        assert_eq!(config.lookup("templates.missing"), None);
        assert_eq!(config.lookup("nope.deeper"), None);
    }

    #[test]
    fn packs_parse_and_sort_by_number() {
        let yaml = "packs: ['dir:themes/20-blog', 'dir:/opt/10-base', 'dir:shared']\n";
        let config: SiteConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.packs[0], PackSource::Dir(PathBuf::from("themes/20-blog")));

        let dirs = config.pack_dirs(Path::new("/site"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/site/shared"),
                PathBuf::from("/opt/10-base"),
                PathBuf::from("/site/themes/20-blog"),
            ]
        );
        assert!(config.extra.get("packs").is_none());
    }

    #[test]
    fn unknown_pack_types_are_rejected() {
        let err = serde_yaml::from_str::<SiteConfig>("packs: ['zip:theme.zip']\n").unwrap_err();
        assert!(err.to_string().contains("unknown pack type `zip`"));
        let err = serde_yaml::from_str::<SiteConfig>("packs: ['theme']\n").unwrap_err();
        assert!(err.to_string().contains("expected `dir:<path>`"));
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = std::env::temp_dir().join(format!("quire-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let err = load_config(&dir).unwrap_err();
        assert!(matches!(err, QuireError::ConfigurationMissing { .. }));

        std::fs::write(dir.join("site.yaml"), "ignore: ['*.tmp']\n").unwrap();
        let config = load_config(&dir).unwrap();
        assert_eq!(config.ignore, vec!["*.tmp".to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
