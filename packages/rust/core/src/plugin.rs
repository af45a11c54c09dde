//! Statically registered plugins and the memoizing plugin registry.
//!
//! Every plugin is described by a [`PluginDescriptor`]: a name, the
//! capabilities it provides, the other plugins it needs at construction
//! time, and the config paths it reads. The [`PluginRegistry`] builds one
//! instance per descriptor, depth-first over declared dependencies, and
//! hands the same `Arc` back for the rest of the engine's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use quire_shared::{QuireError, Result, SiteConfig};

use crate::capability::{BundleDiscovery, ContentParser, EngineHook, TemplateRenderer};
use crate::component::Component;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// What a plugin can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Loads one slice of a bundle from the files it owns.
    Component,
    /// Receives engine lifecycle calls.
    EngineHook,
    /// Turns raw content into [`crate::capability::Content`].
    ContentParser,
    /// Renders named or inline templates.
    Renderer,
    /// Contributes extra bundle directories.
    BundleDiscovery,
}

/// Component-specific part of a descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ComponentSpec {
    /// File basenames this component owns in every bundle.
    pub basenames: &'static [&'static str],
    /// Components whose loaded values this component reads.
    pub depends_on: &'static [&'static str],
}

/// Constructor signature shared by all plugins.
pub type Constructor = fn(PluginContext<'_>) -> Result<Arc<dyn Plugin>>;

/// Static description of a plugin.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Unique plugin name; also the component name for components.
    pub name: &'static str,
    pub capabilities: &'static [Capability],
    /// `(local name, plugin name)` pairs built before this plugin.
    pub dependencies: &'static [(&'static str, &'static str)],
    /// `(local name, dotted config path)` pairs resolved at construction.
    pub config: &'static [(&'static str, &'static str)],
    /// Abstract descriptors are never instantiated.
    pub is_abstract: bool,
    pub component: Option<ComponentSpec>,
    pub construct: Constructor,
}

impl PluginDescriptor {
    pub fn provides(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("dependencies", &self.dependencies)
            .field("config", &self.config)
            .field("is_abstract", &self.is_abstract)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// A constructed plugin. Capability views default to `None`.
pub trait Plugin: Send + Sync {
    fn as_component(&self) -> Option<&dyn Component> {
        None
    }

    fn as_engine_hook(&self) -> Option<&dyn EngineHook> {
        None
    }

    fn as_content_parser(&self) -> Option<&dyn ContentParser> {
        None
    }

    fn as_renderer(&self) -> Option<&dyn TemplateRenderer> {
        None
    }

    fn as_bundle_discovery(&self) -> Option<&dyn BundleDiscovery> {
        None
    }
}

/// A singleton plugin instance paired with its descriptor.
#[derive(Clone)]
pub struct PluginInstance {
    pub descriptor: PluginDescriptor,
    pub plugin: Arc<dyn Plugin>,
}

impl PluginInstance {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// Read-only engine facts every plugin may consult.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    /// Site source directory.
    pub src_path: PathBuf,
    pub config: Arc<SiteConfig>,
}

/// Everything a constructor receives.
pub struct PluginContext<'a> {
    pub name: &'static str,
    pub dependencies: HashMap<&'static str, Arc<dyn Plugin>>,
    /// Resolved config values keyed by local name. Absent paths are omitted.
    pub config: Map<String, Value>,
    pub engine: &'a EngineHandle,
}

impl PluginContext<'_> {
    /// A constructed dependency by its local name.
    pub fn dependency(&self, local: &str) -> Result<Arc<dyn Plugin>> {
        self.dependencies.get(local).cloned().ok_or_else(|| {
            QuireError::config(format!("plugin `{}` has no dependency `{local}`", self.name))
        })
    }

    /// A resolved config value converted to `T`, if present.
    pub fn config_value<T: DeserializeOwned>(&self, local: &str) -> Result<Option<T>> {
        self.config
            .get(local)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| {
                    QuireError::config(format!("plugin `{}` config `{local}`: {e}", self.name))
                })
            })
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owns every plugin instance for one engine.
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
    engine: EngineHandle,
    instances: HashMap<&'static str, Arc<dyn Plugin>>,
    in_progress: Vec<&'static str>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            descriptors: Vec::new(),
            engine,
            instances: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// A registry pre-populated with the built-in plugins.
    pub fn builtin(engine: EngineHandle) -> Self {
        let mut registry = Self::new(engine);
        registry.descriptors.extend(crate::builtin::descriptors());
        registry
    }

    /// Add a descriptor. Names must be unique.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        if self.descriptor(descriptor.name).is_some() {
            return Err(QuireError::config(format!(
                "plugin `{}` is already registered",
                descriptor.name
            )));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Remove a descriptor that has not been instantiated yet.
    pub fn unregister(&mut self, name: &str) -> Option<PluginDescriptor> {
        if self.instances.contains_key(name) {
            return None;
        }
        let pos = self.descriptors.iter().position(|d| d.name == name)?;
        Some(self.descriptors.remove(pos))
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Number of instances built so far.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// All non-abstract plugins providing `capability`, in registration order.
    #[instrument(skip(self))]
    pub fn produce_instances(&mut self, capability: Capability) -> Result<Vec<PluginInstance>> {
        let wanted: Vec<PluginDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| !d.is_abstract && d.provides(capability))
            .copied()
            .collect();

        let mut out: Vec<PluginInstance> = Vec::with_capacity(wanted.len());
        for descriptor in wanted {
            if out.iter().any(|i| i.name() == descriptor.name) {
                continue;
            }
            let plugin = self.produce_instance(&descriptor)?;
            out.push(PluginInstance { descriptor, plugin });
        }
        Ok(out)
    }

    /// The singleton for `descriptor`, constructing it and its dependencies on first use.
    pub fn produce_instance(&mut self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>> {
        if let Some(existing) = self.instances.get(descriptor.name) {
            return Ok(Arc::clone(existing));
        }

        if self.in_progress.contains(&descriptor.name) {
            let mut chain: Vec<String> = self
                .in_progress
                .iter()
                .skip_while(|n| **n != descriptor.name)
                .map(|n| n.to_string())
                .collect();
            chain.push(descriptor.name.to_string());
            return Err(QuireError::ConstructionCycle { chain });
        }

        if descriptor.is_abstract {
            return Err(QuireError::config(format!(
                "plugin `{}` is abstract and cannot be constructed",
                descriptor.name
            )));
        }

        self.in_progress.push(descriptor.name);
        let built = self.construct(descriptor);
        self.in_progress.pop();

        let plugin = built?;
        self.instances
            .insert(descriptor.name, Arc::clone(&plugin));
        debug!(plugin = descriptor.name, "plugin constructed");
        Ok(plugin)
    }

    fn construct(&mut self, descriptor: &PluginDescriptor) -> Result<Arc<dyn Plugin>> {
        let mut dependencies = HashMap::with_capacity(descriptor.dependencies.len());
        for (local, target) in descriptor.dependencies {
            let dep = *self
                .descriptor(target)
                .ok_or_else(|| QuireError::UnknownPlugin {
                    name: (*target).to_string(),
                })?;
            dependencies.insert(*local, self.produce_instance(&dep)?);
        }

        let live = self.engine.config.to_value();
        let config: Map<String, Value> = descriptor
            .config
            .iter()
            .filter_map(|(local, path)| {
                quire_shared::lookup_path(&live, path).map(|v| ((*local).to_string(), v.clone()))
            })
            .collect();

        (descriptor.construct)(PluginContext {
            name: descriptor.name,
            dependencies,
            config,
            engine: &self.engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Marker;

    impl Plugin for Marker {}

    fn build_marker(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::new(Marker))
    }

    static COUNTED: AtomicUsize = AtomicUsize::new(0);

    fn build_counted(_ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
        COUNTED.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Marker))
    }

    const fn desc(
        name: &'static str,
        capabilities: &'static [Capability],
        dependencies: &'static [(&'static str, &'static str)],
    ) -> PluginDescriptor {
        PluginDescriptor {
            name,
            capabilities,
            dependencies,
            config: &[],
            is_abstract: false,
            component: None,
            construct: build_marker,
        }
    }

    fn handle(config: SiteConfig) -> EngineHandle {
        EngineHandle {
            src_path: PathBuf::from("."),
            config: Arc::new(config),
        }
    }

    #[test]
    fn instances_are_memoized_across_capability_queries() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry
            .register(PluginDescriptor {
                construct: build_counted,
                ..desc("both", &[Capability::EngineHook, Capability::Renderer], &[])
            })
            .unwrap();

        let hooks = registry.produce_instances(Capability::EngineHook).unwrap();
        let renderers = registry.produce_instances(Capability::Renderer).unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(renderers.len(), 1);
        assert!(Arc::ptr_eq(&hooks[0].plugin, &renderers[0].plugin));
        assert_eq!(COUNTED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn abstract_descriptors_are_skipped() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry
            .register(PluginDescriptor {
                is_abstract: true,
                ..desc("base", &[Capability::EngineHook], &[])
            })
            .unwrap();
        registry
            .register(desc("concrete", &[Capability::EngineHook], &[]))
            .unwrap();

        let hooks = registry.produce_instances(Capability::EngineHook).unwrap();
        let names: Vec<_> = hooks.iter().map(PluginInstance::name).collect();
        assert_eq!(names, vec!["concrete"]);
    }

    #[test]
    fn dependencies_are_built_first_and_shared() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry.register(desc("leaf", &[], &[])).unwrap();
        registry
            .register(desc("mid", &[], &[("leaf", "leaf")]))
            .unwrap();
        registry
            .register(desc(
                "top",
                &[Capability::EngineHook],
                &[("a", "mid"), ("b", "leaf")],
            ))
            .unwrap();

        let top = registry.produce_instances(Capability::EngineHook).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(registry.instance_count(), 3);

        let leaf = *registry.descriptor("leaf").unwrap();
        let again = registry.produce_instance(&leaf).unwrap();
        let leaf_again = registry.produce_instance(&leaf).unwrap();
        assert!(Arc::ptr_eq(&again, &leaf_again));
        assert_eq!(registry.instance_count(), 3);
    }

    #[test]
    fn construction_cycle_is_detected() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry.register(desc("a", &[Capability::EngineHook], &[("b", "b")])).unwrap();
        registry.register(desc("b", &[], &[("c", "c")])).unwrap();
        registry.register(desc("c", &[], &[("a", "a")])).unwrap();

        let err = registry.produce_instances(Capability::EngineHook).unwrap_err();
        match err {
            QuireError::ConstructionCycle { chain } => {
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry
            .register(desc("a", &[Capability::EngineHook], &[("x", "missing")]))
            .unwrap();
        let err = registry.produce_instances(Capability::EngineHook).unwrap_err();
        assert!(matches!(err, QuireError::UnknownPlugin { name } if name == "missing"));
    }

    fn build_feed(ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
        let limit: Option<u32> = ctx.config_value("limit")?;
        if limit != Some(10) || ctx.config.contains_key("title") {
            return Err(QuireError::config(format!("unexpected config: {:?}", ctx.config)));
        }
        build_marker(ctx)
    }

    #[test]
    fn config_mappings_resolve_and_omit_absent_keys() {
        let mut config = SiteConfig::default();
        config
            .extra
            .insert("feeds".into(), serde_json::json!({"limit": 10}));

        let mut registry = PluginRegistry::new(handle(config));
        registry
            .register(PluginDescriptor {
                config: &[("limit", "feeds.limit"), ("title", "feeds.title")],
                construct: build_feed,
                ..desc("feed", &[Capability::EngineHook], &[])
            })
            .unwrap();

        let built = registry.produce_instances(Capability::EngineHook).unwrap();
        assert_eq!(built.len(), 1);
    }

    fn build_needs_two(ctx: PluginContext<'_>) -> Result<Arc<dyn Plugin>> {
        ctx.dependency("a")?;
        ctx.dependency("b")?;
        assert!(ctx.dependency("c").is_err());
        build_marker(ctx)
    }

    #[test]
    fn constructor_sees_dependencies_by_local_name() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry.register(desc("one", &[], &[])).unwrap();
        registry.register(desc("two", &[], &[])).unwrap();
        registry
            .register(PluginDescriptor {
                construct: build_needs_two,
                ..desc("user", &[Capability::Renderer], &[("a", "one"), ("b", "two")])
            })
            .unwrap();

        assert_eq!(registry.produce_instances(Capability::Renderer).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = PluginRegistry::new(handle(SiteConfig::default()));
        registry.register(desc("a", &[], &[])).unwrap();
        assert!(registry.register(desc("a", &[], &[])).is_err());
        assert!(registry.unregister("a").is_some());
        assert!(registry.descriptor("a").is_none());
    }
}
