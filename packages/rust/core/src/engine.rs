//! Engine orchestration.
//!
//! `load` reads the site config; `prepare` builds plugins, resolves the
//! component order and assembles every bundle; `build` then runs the
//! lifecycle hooks and every configured pipeline.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use quire_shared::{
    MetaData, PACK_CONTENT_DIR, PipelineDef, QuireError, Result, SiteConfig, load_config,
};

use crate::assembler::{Bundle, BundleAssembler, BundleFile};
use crate::capability::{DiscoveryContext, HookContext, TemplateRenderer};
use crate::discovery::bundles_under;
use crate::ignore::IgnoreFilter;
use crate::order::ComponentSet;
use crate::plugin::{Capability, EngineHandle, Plugin, PluginInstance, PluginRegistry};
use crate::query::{QueryContext, QueryPipeline, matches_criteria};

/// Output directory used when neither the config nor the caller picks one.
pub const DEFAULT_OUTPUT_DIR: &str = "_build";

/// Progress callback for reporting engine status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each bundle is assembled (from worker threads).
    fn bundle_assembled(&self, key: &str, current: usize, total: usize);
    /// Called when a build completes.
    fn done(&self, summary: &BuildSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn bundle_assembled(&self, _key: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &BuildSummary) {}
}

/// What a build did.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub bundles: usize,
    pub pipelines: usize,
    pub output_dir: PathBuf,
    pub elapsed_ms: u64,
}

/// One site: its config, plugins, bundles and pipelines.
pub struct Engine {
    src_path: PathBuf,
    config: Arc<SiteConfig>,
    output_dir: PathBuf,
    registry: PluginRegistry,
    query: QueryPipeline,
    components: ComponentSet,
    ignore: IgnoreFilter,
    hooks: Vec<PluginInstance>,
    finders: Vec<PluginInstance>,
    renderer: Option<Arc<dyn Plugin>>,
    bundles: Vec<Bundle>,
    prepared: bool,
}

impl Engine {
    /// Load the site config from `src_path` and set up built-in plugins.
    pub fn load(src_path: impl AsRef<Path>) -> Result<Self> {
        let src_path = src_path.as_ref();
        let config = load_config(src_path)?;
        Ok(Self::new(src_path, config))
    }

    /// An engine over an already-loaded config, with built-in plugins and operations.
    pub fn new(src_path: impl Into<PathBuf>, config: SiteConfig) -> Self {
        let src_path = src_path.into();
        let output_dir = match &config.output {
            Some(out) if out.is_absolute() => out.clone(),
            Some(out) => src_path.join(out),
            None => src_path.join(DEFAULT_OUTPUT_DIR),
        };
        let config = Arc::new(config);
        let registry = PluginRegistry::builtin(EngineHandle {
            src_path: src_path.clone(),
            config: Arc::clone(&config),
        });

        Self {
            src_path,
            config,
            output_dir,
            registry,
            query: QueryPipeline::with_builtin_operations(),
            components: ComponentSet::default(),
            ignore: IgnoreFilter::default(),
            hooks: Vec::new(),
            finders: Vec::new(),
            renderer: None,
            bundles: Vec::new(),
            prepared: false,
        }
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn set_output_dir(&mut self, output_dir: impl Into<PathBuf>) {
        self.output_dir = output_dir.into();
    }

    /// Register extra plugins here before [`Engine::prepare`].
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Register extra pipeline operations here.
    pub fn query_mut(&mut self) -> &mut QueryPipeline {
        &mut self.query
    }

    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    // -----------------------------------------------------------------------
    // Preparation
    // -----------------------------------------------------------------------

    /// Build plugins, resolve component order and assemble every bundle.
    ///
    /// Startup errors (conflicts, cycles, bad config) surface before any
    /// bundle directory is read.
    #[instrument(skip_all, fields(src = %self.src_path.display()))]
    pub fn prepare(&mut self, progress: &dyn ProgressReporter) -> Result<()> {
        progress.phase("Loading plugins");
        let components = self.registry.produce_instances(Capability::Component)?;
        self.components = ComponentSet::resolve(&components)?;
        self.hooks = self.registry.produce_instances(Capability::EngineHook)?;
        self.finders = self.registry.produce_instances(Capability::BundleDiscovery)?;

        let renderers = self.registry.produce_instances(Capability::Renderer)?;
        if renderers.len() > 1 {
            debug!(
                using = renderers[0].name(),
                available = renderers.len(),
                "several renderers registered, using the first"
            );
        }
        self.renderer = renderers.into_iter().next().map(|r| r.plugin);
        self.ignore = IgnoreFilter::compile(&self.config.ignore)?;

        progress.phase("Discovering bundles");
        let found = self.discover()?;

        progress.phase("Assembling bundles");
        let defaults: Arc<MetaData> = Arc::new(self.config.bundle_defaults.clone());
        let assembler = BundleAssembler::new(&self.components, &self.ignore, &defaults);
        let total = found.len();
        let done = AtomicUsize::new(0);

        let mut bundles = found
            .par_iter()
            .map(|(key, dir)| -> Result<Bundle> {
                let bundle = assembler.assemble(key, dir)?;
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.bundle_assembled(key, current, total);
                Ok(bundle)
            })
            .collect::<Result<Vec<Bundle>>>()?;
        bundles.sort_by(|a, b| a.key().cmp(b.key()));

        info!(
            bundles = bundles.len(),
            components = self.components.len(),
            "bundles assembled"
        );
        self.bundles = bundles;
        self.prepared = true;
        Ok(())
    }

    /// Configured bundle dirs, resolved against the source directory.
    pub fn bundle_dirs(&self) -> Vec<PathBuf> {
        self.config
            .bundle_dirs
            .iter()
            .map(|dir| if dir.is_absolute() { dir.clone() } else { self.src_path.join(dir) })
            .collect()
    }

    /// Every directory bundles are read from: bundle dirs, then pack content dirs.
    pub fn input_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.bundle_dirs();
        roots.extend(
            self.config
                .pack_dirs(&self.src_path)
                .into_iter()
                .map(|pack| pack.join(PACK_CONTENT_DIR)),
        );
        roots
    }

    /// Every bundle directory, keyed.
    ///
    /// Bundle dirs are walked first, in config order; bundle discovery plugins
    /// contribute after them. A directory (other than a bundle dir itself) is
    /// a bundle when it directly holds at least one non-ignored file. When a
    /// key turns up twice, the first one wins.
    pub fn discover(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut found = Vec::new();
        let mut accept = |key: String, dir: PathBuf| {
            if let Some(previous) = seen.get(&key) {
                warn!(
                    key = %key,
                    kept = %previous.display(),
                    skipped = %dir.display(),
                    "duplicate bundle key, keeping the first"
                );
                return;
            }
            seen.insert(key.clone(), dir.clone());
            found.push((key, dir));
        };

        for root in self.bundle_dirs() {
            if !root.is_dir() {
                warn!(dir = %root.display(), "bundle directory does not exist, skipping");
                continue;
            }
            for (key, dir) in bundles_under(&root, &self.ignore)? {
                accept(key, dir);
            }
        }

        let ctx = DiscoveryContext {
            src_path: &self.src_path,
            config: &self.config,
            ignore: &self.ignore,
        };
        for finder in &self.finders {
            if let Some(f) = finder.plugin.as_bundle_discovery() {
                let contributed = f.find_bundles(ctx)?;
                debug!(finder = finder.name(), bundles = contributed.len(), "bundles contributed");
                for (key, dir) in contributed {
                    accept(key, dir);
                }
            }
        }

        debug!(bundles = found.len(), "bundle directories discovered");
        Ok(found)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn hook_context(&self) -> HookContext<'_> {
        HookContext {
            config: &self.config,
            output_dir: &self.output_dir,
            bundles: &self.bundles,
        }
    }

    /// Run every engine hook's `initialize`, in discovery order.
    pub fn initialize(&self) -> Result<()> {
        for hook in &self.hooks {
            if let Some(h) = hook.plugin.as_engine_hook() {
                debug!(hook = hook.name(), "initialize");
                h.initialize(self.hook_context())?;
            }
        }
        Ok(())
    }

    /// Execute every configured pipeline over all bundles.
    ///
    /// Returns the number of pipelines run.
    #[instrument(skip_all, fields(pipelines = self.config.entries.len()))]
    pub fn render_all(&self, progress: &dyn ProgressReporter) -> Result<usize> {
        let ctx = self.query_context();
        for pipeline in &self.config.entries {
            progress.phase(&format!("Running pipeline {}", pipeline.name));
            self.query.execute(ctx, pipeline)?;
        }
        Ok(self.config.entries.len())
    }

    /// Run every engine hook's `finalize`, in discovery order.
    pub fn finalize(&self) -> Result<()> {
        for hook in &self.hooks {
            if let Some(h) = hook.plugin.as_engine_hook() {
                debug!(hook = hook.name(), "finalize");
                h.finalize(self.hook_context())?;
            }
        }
        Ok(())
    }

    /// Prepare (if needed), then initialize, run pipelines and finalize.
    pub fn build(&mut self, progress: &dyn ProgressReporter) -> Result<BuildSummary> {
        let start = Instant::now();
        if !self.prepared {
            self.prepare(progress)?;
        }

        progress.phase("Initializing");
        self.initialize()?;
        let pipelines = self.render_all(progress)?;
        progress.phase("Finalizing");
        self.finalize()?;

        let summary = BuildSummary {
            bundles: self.bundles.len(),
            pipelines,
            output_dir: self.output_dir.clone(),
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            bundles = summary.bundles,
            pipelines = summary.pipelines,
            elapsed_ms = summary.elapsed_ms,
            "build complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Everything pipeline operations may consult.
    pub fn query_context(&self) -> QueryContext<'_> {
        QueryContext {
            bundles: &self.bundles,
            output_dir: &self.output_dir,
            renderer: self.renderer(),
            config: &self.config,
        }
    }

    pub fn renderer(&self) -> Option<&dyn TemplateRenderer> {
        self.renderer.as_deref().and_then(|p| p.as_renderer())
    }

    /// Evaluate one pipeline and return its output bundles.
    pub fn run_pipeline(&self, pipeline: &PipelineDef) -> Result<Vec<&Bundle>> {
        self.query.evaluate(self.query_context(), pipeline)
    }

    /// All bundles, ordered by key.
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn bundle(&self, key: &str) -> Option<&Bundle> {
        self.bundles
            .binary_search_by(|b| b.key().cmp(key))
            .ok()
            .map(|i| &self.bundles[i])
    }

    pub fn bundle_mut(&mut self, key: &str) -> Option<&mut Bundle> {
        let i = self.bundles.binary_search_by(|b| b.key().cmp(key)).ok()?;
        Some(&mut self.bundles[i])
    }

    /// Bundles whose meta matches every criterion.
    pub fn bundles_by(&self, criteria: &Map<String, Value>) -> Vec<&Bundle> {
        self.bundles
            .iter()
            .filter(|b| matches_criteria(b.meta(), criteria))
            .collect()
    }

    /// The single bundle matching `criteria`.
    pub fn get_bundle(&self, criteria: &Map<String, Value>) -> Result<&Bundle> {
        let matches = self.bundles_by(criteria);
        match matches.as_slice() {
            [one] => Ok(*one),
            _ => Err(lookup_error(criteria, matches.len())),
        }
    }

    /// Mutable access to the single bundle matching `criteria`.
    pub fn get_bundle_mut(&mut self, criteria: &Map<String, Value>) -> Result<&mut Bundle> {
        let positions: Vec<usize> = self
            .bundles
            .iter()
            .enumerate()
            .filter(|(_, b)| matches_criteria(b.meta(), criteria))
            .map(|(i, _)| i)
            .collect();
        match positions.as_slice() {
            [i] => Ok(&mut self.bundles[*i]),
            _ => Err(lookup_error(criteria, positions.len())),
        }
    }

    /// The bundle owning the file at `path`, with that file.
    ///
    /// A relative `path` is tried against the source directory and then each
    /// input root. Ignored files belong to no bundle.
    pub fn find_file(&self, path: &Path) -> Option<(&Bundle, &BundleFile)> {
        let file_name = path.file_name()?;
        let candidates: Vec<PathBuf> = if path.is_absolute() {
            vec![path.to_path_buf()]
        } else {
            std::iter::once(self.src_path.join(path))
                .chain(self.input_roots().into_iter().map(|root| root.join(path)))
                .collect()
        };
        let targets: Vec<PathBuf> = candidates
            .iter()
            .filter_map(|c| std::fs::canonicalize(c).ok())
            .collect();
        if targets.is_empty() {
            return None;
        }

        self.bundles.iter().find_map(|bundle| {
            bundle
                .files()
                .iter()
                .filter(|f| f.path.file_name() == Some(file_name))
                .find(|f| std::fs::canonicalize(&f.path).is_ok_and(|p| targets.contains(&p)))
                .map(|f| (bundle, f))
        })
    }

    /// Every distinct tag across all bundles, sorted.
    ///
    /// `tags` may be a single string or a list of strings.
    pub fn tags(&self) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for bundle in &self.bundles {
            match bundle.meta().get("tags") {
                Some(Value::String(tag)) => {
                    tags.insert(tag.clone());
                }
                Some(Value::Array(items)) => {
                    tags.extend(items.iter().filter_map(Value::as_str).map(String::from));
                }
                _ => {}
            }
        }
        tags.into_iter().collect()
    }
}

fn lookup_error(criteria: &Map<String, Value>, found: usize) -> QuireError {
    QuireError::BundleLookup {
        criteria: Value::Object(criteria.clone()).to_string(),
        found,
    }
}
