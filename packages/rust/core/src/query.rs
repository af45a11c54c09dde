//! Query pipelines over assembled bundles.
//!
//! A pipeline is a list of `{operation: argument}` stages. Each stage turns
//! a lazy bundle stream into another lazy stream; nothing runs until the
//! caller drains the final stream. Operations are plain function pointers
//! held in a name-keyed registry.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use quire_shared::{Meta, PipelineDef, QuireError, Result, SiteConfig, parse_timestamp};

use crate::assembler::Bundle;
use crate::capability::{TemplateRef, TemplateRenderer, TemplateSource};

/// Name of the component that carries per-bundle template source.
pub const TEMPLATE_COMPONENT: &str = "template";

/// A lazy, fallible sequence of bundles.
pub type BundleStream<'a> = Box<dyn Iterator<Item = Result<&'a Bundle>> + 'a>;

/// A registered stage transformation.
///
/// The argument is parsed eagerly; the returned stream must not borrow it.
pub type Operation =
    for<'a> fn(QueryContext<'a>, BundleStream<'a>, &Value) -> Result<BundleStream<'a>>;

/// What operations may consult besides their input stream.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    /// Every assembled bundle, in key order.
    pub bundles: &'a [Bundle],
    pub output_dir: &'a Path,
    pub renderer: Option<&'a dyn TemplateRenderer>,
    pub config: &'a SiteConfig,
}

impl<'a> QueryContext<'a> {
    /// The full bundle collection as a fresh stream.
    pub fn all(&self) -> BundleStream<'a> {
        Box::new(self.bundles.iter().map(Ok))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Name → operation registry plus pipeline evaluation.
#[derive(Clone, Default)]
pub struct QueryPipeline {
    operations: HashMap<String, Operation>,
}

impl QueryPipeline {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `filter`, `exclude`, `has`, `sort`, `limit`, `skip`,
    /// `render` and `copy`.
    pub fn with_builtin_operations() -> Self {
        let mut pipeline = Self::new();
        pipeline.register("filter", filter);
        pipeline.register("exclude", exclude);
        pipeline.register("has", has);
        pipeline.register("sort", sort);
        pipeline.register("limit", limit);
        pipeline.register("skip", skip);
        pipeline.register("render", render);
        pipeline.register("copy", copy);
        pipeline
    }

    /// Register an operation, returning the one it replaces.
    pub fn register(&mut self, name: impl Into<String>, operation: Operation) -> Option<Operation> {
        self.operations.insert(name.into(), operation)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Apply one named operation to `stream`.
    pub fn dispatch<'a>(
        &self,
        name: &str,
        ctx: QueryContext<'a>,
        stream: BundleStream<'a>,
        argument: &Value,
    ) -> Result<BundleStream<'a>> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| QuireError::UnknownOperation {
                name: name.to_string(),
            })?;
        operation(ctx, stream, argument)
    }

    /// Compose every stage of `pipeline` over the full bundle collection.
    ///
    /// Nothing is evaluated yet. Errors from any stage, whether raised while
    /// building the stream or while draining it, carry the pipeline name and
    /// the stage index.
    pub fn run<'a>(&self, ctx: QueryContext<'a>, pipeline: &PipelineDef) -> Result<BundleStream<'a>> {
        let mut stream = ctx.all();
        for (index, stage) in pipeline.stages.iter().enumerate() {
            stream = self
                .dispatch(&stage.operation, ctx, stream, &stage.argument)
                .map_err(|e| e.in_stage(&pipeline.name, index))?;

            let name = pipeline.name.clone();
            stream = Box::new(stream.map(move |item| {
                item.map_err(|e| match e {
                    QuireError::Stage { .. } => e,
                    other => other.in_stage(&name, index),
                })
            }));
        }
        Ok(stream)
    }

    /// Run `pipeline` and collect its output.
    pub fn evaluate<'a>(&self, ctx: QueryContext<'a>, pipeline: &PipelineDef) -> Result<Vec<&'a Bundle>> {
        self.run(ctx, pipeline)?.collect()
    }

    /// Run `pipeline` to completion for its side effects.
    ///
    /// Returns how many bundles came out of the last stage.
    #[instrument(skip_all, fields(pipeline = %pipeline.name, stages = pipeline.stages.len()))]
    pub fn execute(&self, ctx: QueryContext<'_>, pipeline: &PipelineDef) -> Result<usize> {
        let mut count = 0;
        for item in self.run(ctx, pipeline)? {
            item?;
            count += 1;
        }
        info!(bundles = count, "pipeline complete");
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Whether every `key: value` in `criteria` matches `meta`.
///
/// A meta array matches when it contains the expected value.
pub fn matches_criteria(meta: &Meta, criteria: &Map<String, Value>) -> bool {
    criteria.iter().all(|(key, expected)| match meta.lookup(key) {
        Some(actual) => value_matches(actual, expected),
        None => expected.is_null(),
    })
}

fn value_matches(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match actual {
        Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

/// Order two meta values. Timestamps compare as dates, numbers numerically.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

fn criteria_argument(operation: &str, argument: &Value) -> Result<Map<String, Value>> {
    match argument {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(QuireError::config(format!(
            "`{operation}` expects a mapping of meta keys to values, got {other}"
        ))),
    }
}

/// `n` or `{n: n}`.
fn count_argument(operation: &str, argument: &Value) -> Result<usize> {
    let n = match argument {
        Value::Object(map) => map.get("n"),
        other => Some(other),
    };
    n.and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            QuireError::config(format!(
                "`{operation}` expects a non-negative count or {{n: count}}, got {argument}"
            ))
        })
}

/// `by` or `{by, desc}`.
fn sort_argument(argument: &Value) -> Result<(String, bool)> {
    match argument {
        Value::String(by) => Ok((by.clone(), false)),
        Value::Object(map) => {
            let by = map.get("by").and_then(Value::as_str).ok_or_else(|| {
                QuireError::config(format!("`sort` needs a `by` key, got {argument}"))
            })?;
            let desc = map.get("desc").and_then(Value::as_bool).unwrap_or(false);
            Ok((by.to_string(), desc))
        }
        other => Err(QuireError::config(format!(
            "`sort` expects a meta key or {{by, desc}}, got {other}"
        ))),
    }
}

/// A component name or a list of them.
fn names_argument(operation: &str, argument: &Value) -> Result<Vec<String>> {
    let invalid = || {
        QuireError::config(format!(
            "`{operation}` expects a component name or a list of names, got {argument}"
        ))
    };
    match argument {
        Value::String(name) => Ok(vec![name.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(String::from).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Selection operations
// ---------------------------------------------------------------------------

fn filter<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let criteria = criteria_argument("filter", argument)?;
    Ok(Box::new(stream.filter(move |item| match item {
        Ok(bundle) => matches_criteria(bundle.meta(), &criteria),
        Err(_) => true,
    })))
}

fn exclude<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let criteria = criteria_argument("exclude", argument)?;
    Ok(Box::new(stream.filter(move |item| match item {
        Ok(bundle) => !matches_criteria(bundle.meta(), &criteria),
        Err(_) => true,
    })))
}

fn has<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let names = names_argument("has", argument)?;
    Ok(Box::new(stream.filter(move |item| match item {
        Ok(bundle) => names.iter().all(|n| bundle.has_component(n)),
        Err(_) => true,
    })))
}

/// Materializes its input on first pull, then yields it sorted.
fn sort<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let (by, desc) = sort_argument(argument)?;
    let sorted = std::iter::once_with(move || {
        let mut bundles = match stream.collect::<Result<Vec<&'a Bundle>>>() {
            Ok(bundles) => bundles,
            Err(e) => return vec![Err(e)],
        };
        bundles.sort_by(|a, b| {
            let x = a.meta().lookup(&by).filter(|v| !v.is_null());
            let y = b.meta().lookup(&by).filter(|v| !v.is_null());
            match (x, y) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    if desc { ord.reverse() } else { ord }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        bundles.into_iter().map(Ok).collect()
    })
    .flatten();
    Ok(Box::new(sorted))
}

fn limit<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let n = count_argument("limit", argument)?;
    Ok(Box::new(stream.take(n)))
}

fn skip<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let n = count_argument("skip", argument)?;
    Ok(Box::new(stream.skip(n)))
}

// ---------------------------------------------------------------------------
// Output operations
// ---------------------------------------------------------------------------

/// Render every templated bundle to the output directory.
///
/// The template comes from the bundle's `template` component, its meta
/// `template` name, or the stage's own `{template: name}` argument, in that
/// order. Bundles without one, or with meta `render: false`, pass through.
fn render<'a>(ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    let fallback = match argument {
        Value::Null => None,
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => map.get("template").and_then(Value::as_str).map(String::from),
        other => {
            return Err(QuireError::config(format!(
                "`render` expects nothing, a template name or {{template: name}}, got {other}"
            )));
        }
    };

    let mut site: Option<Value> = None;
    Ok(Box::new(stream.map(move |item| {
        let bundle = item?;
        let site = site.get_or_insert_with(|| site_index(ctx.bundles));
        render_bundle(ctx, bundle, fallback.as_deref(), site).map_err(|e| e.in_bundle(bundle.key()))?;
        Ok(bundle)
    })))
}

fn render_bundle(ctx: QueryContext<'_>, bundle: &Bundle, fallback: Option<&str>, site: &Value) -> Result<()> {
    if bundle.meta().get("render").and_then(Value::as_bool) == Some(false) {
        debug!(key = bundle.key(), "rendering disabled by meta");
        return Ok(());
    }

    let template = if let Some(source) = bundle.component::<TemplateSource>(TEMPLATE_COMPONENT) {
        TemplateRef::Inline {
            name: &source.name,
            source: &source.source,
        }
    } else if let Some(name) = bundle.meta().get_str("template") {
        TemplateRef::Named(name)
    } else if let Some(name) = fallback {
        TemplateRef::Named(name)
    } else {
        debug!(key = bundle.key(), "no template, not rendered");
        return Ok(());
    };

    let renderer = ctx
        .renderer
        .ok_or_else(|| QuireError::render("no template renderer is registered"))?;
    let context = template_context(bundle, ctx.config, site);
    let output = renderer.render(template, &context)?;

    let path = ctx.output_dir.join(bundle.output_path());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| QuireError::io(parent, e))?;
    }
    std::fs::write(&path, output).map_err(|e| QuireError::io(&path, e))?;
    debug!(key = bundle.key(), template = template.name(), path = %path.display(), "rendered");
    Ok(())
}

/// Summary of every bundle, exposed to templates as `site.bundles`.
fn site_index(bundles: &[Bundle]) -> Value {
    let entries: Vec<Value> = bundles
        .iter()
        .map(|b| {
            serde_json::json!({
                "key": b.key(),
                "url": b.url(),
                "meta": b.meta().to_value(),
            })
        })
        .collect();
    serde_json::json!({ "bundles": entries })
}

/// The context a bundle's template is rendered against.
///
/// Top-level keys: `bundle` (key, url, components, meta), `meta`,
/// `config` (the whole site configuration) and `site`.
pub fn template_context(bundle: &Bundle, config: &SiteConfig, site: &Value) -> Value {
    serde_json::json!({
        "bundle": bundle.to_value(),
        "meta": bundle.meta().to_value(),
        "config": config.to_value(),
        "site": site,
    })
}

/// Copy every file of each bundle to `<output>/<key>/`.
fn copy<'a>(ctx: QueryContext<'a>, stream: BundleStream<'a>, argument: &Value) -> Result<BundleStream<'a>> {
    if !argument.is_null() && argument != &Value::Object(Map::new()) {
        return Err(QuireError::config(format!("`copy` takes no argument, got {argument}")));
    }
    Ok(Box::new(stream.map(move |item| {
        let bundle = item?;
        copy_bundle(ctx.output_dir, bundle).map_err(|e| e.in_bundle(bundle.key()))?;
        Ok(bundle)
    })))
}

fn copy_bundle(output_dir: &Path, bundle: &Bundle) -> Result<()> {
    let target = output_dir.join(bundle.key().trim_matches('/'));
    std::fs::create_dir_all(&target).map_err(|e| QuireError::io(&target, e))?;
    for file in bundle.files() {
        let dest = target.join(&file.file_name);
        std::fs::copy(&file.path, &dest).map_err(|e| QuireError::io(&file.path, e))?;
    }
    debug!(key = bundle.key(), files = bundle.files().len(), "copied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use quire_shared::{MetaData, PipelineStage};

    use crate::component::ComponentValue;

    fn bundle(key: &str, meta: Value) -> Bundle {
        let data: MetaData = match meta {
            Value::Object(map) => map,
            _ => MetaData::new(),
        };
        Bundle::with_meta(key, format!("content/{key}"), Meta::new(data, Arc::new(MetaData::new())))
    }

    fn keys(bundles: &[&Bundle]) -> Vec<String> {
        bundles.iter().map(|b| b.key().to_string()).collect()
    }

    fn pipeline(stages: Vec<(&str, Value)>) -> PipelineDef {
        PipelineDef {
            name: "test".into(),
            stages: stages
                .into_iter()
                .map(|(op, arg)| PipelineStage::new(op, arg))
                .collect(),
        }
    }

    fn ctx<'a>(bundles: &'a [Bundle], config: &'a SiteConfig, output: &'a Path) -> QueryContext<'a> {
        QueryContext {
            bundles,
            output_dir: output,
            renderer: None,
            config,
        }
    }

    fn sample() -> Vec<Bundle> {
        vec![
            bundle("a", serde_json::json!({"tags": ["x", "y"], "updated_time": "2024-01-03 10:00:00"})),
            bundle("b", serde_json::json!({"tags": ["y"], "updated_time": "2024-01-05 10:00:00"})),
            bundle("c", serde_json::json!({"tags": ["x"], "publish_time": "2024-01-09 10:00:00"})),
            bundle("d", serde_json::json!({"tags": "x", "created_time": "2023-12-31"})),
            bundle("e", serde_json::json!({"status": "draft"})),
        ]
    }

    #[test]
    fn filter_matches_scalars_and_array_membership() {
        let bundles = sample();
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let out = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![("filter", serde_json::json!({"tags": "x"}))]),
            )
            .unwrap();
        assert_eq!(keys(&out), vec!["a", "c", "d"]);
    }

    #[test]
    fn exclude_is_the_inverse_of_filter() {
        let bundles = sample();
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let out = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![("exclude", serde_json::json!({"tags": "x"}))]),
            )
            .unwrap();
        assert_eq!(keys(&out), vec!["b", "e"]);
    }

    #[test]
    fn sort_by_recent_puts_missing_values_last() {
        let bundles = sample();
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let c = ctx(&bundles, &config, Path::new("out"));

        let desc = q
            .evaluate(c, &pipeline(vec![("sort", serde_json::json!({"by": "recent", "desc": true}))]))
            .unwrap();
        assert_eq!(keys(&desc), vec!["c", "b", "a", "d", "e"]);

        let asc = q
            .evaluate(c, &pipeline(vec![("sort", Value::String("recent".into()))]))
            .unwrap();
        assert_eq!(keys(&asc), vec!["d", "a", "b", "c", "e"]);
    }

    #[test]
    fn limit_and_skip_accept_both_spellings() {
        let bundles = sample();
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let c = ctx(&bundles, &config, Path::new("out"));

        let out = q
            .evaluate(c, &pipeline(vec![("skip", serde_json::json!(1)), ("limit", serde_json::json!({"n": 2}))]))
            .unwrap();
        assert_eq!(keys(&out), vec!["b", "c"]);

        let err = q
            .evaluate(c, &pipeline(vec![("limit", serde_json::json!("two"))]))
            .unwrap_err();
        assert!(matches!(err, QuireError::Stage { stage: 0, .. }));
    }

    #[test]
    fn has_checks_component_presence() {
        let mut bundles = sample();
        bundles[1].insert_component("content", ComponentValue::new("body".to_string()));
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let out = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![("has", Value::String("content".into()))]),
            )
            .unwrap();
        assert_eq!(keys(&out), vec!["b"]);
    }

    #[test]
    fn unknown_operations_name_the_stage() {
        let bundles = sample();
        let config = SiteConfig::default();
        let q = QueryPipeline::with_builtin_operations();
        let err = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![("limit", serde_json::json!(1)), ("explode", Value::Null)]),
            )
            .unwrap_err();
        match err {
            QuireError::Stage { pipeline, stage, source } => {
                assert_eq!(pipeline, "test");
                assert_eq!(stage, 1);
                assert!(matches!(*source, QuireError::UnknownOperation { ref name } if name == "explode"));
            }
            other => panic!("expected stage error, got {other}"),
        }
    }

    static PULLED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn trace<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, _arg: &Value) -> Result<BundleStream<'a>> {
        Ok(Box::new(stream.inspect(|item| {
            if let Ok(b) = item {
                PULLED.lock().unwrap().push(b.key().to_string());
            }
        })))
    }

    #[test]
    fn limit_short_circuits_upstream_work() {
        let bundles = sample();
        let config = SiteConfig::default();
        let mut q = QueryPipeline::with_builtin_operations();
        q.register("trace", trace);

        let out = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![("trace", Value::Null), ("limit", serde_json::json!(2))]),
            )
            .unwrap();
        assert_eq!(keys(&out), vec!["a", "b"]);
        assert_eq!(*PULLED.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn item_errors_keep_the_first_failing_stage() {
        fn boom<'a>(_ctx: QueryContext<'a>, stream: BundleStream<'a>, _arg: &Value) -> Result<BundleStream<'a>> {
            Ok(Box::new(stream.map(|item| {
                let b = item?;
                if b.key() == "c" {
                    Err(QuireError::validation("bad bundle"))
                } else {
                    Ok(b)
                }
            })))
        }

        let bundles = sample();
        let config = SiteConfig::default();
        let mut q = QueryPipeline::with_builtin_operations();
        q.register("boom", boom);

        let err = q
            .evaluate(
                ctx(&bundles, &config, Path::new("out")),
                &pipeline(vec![
                    ("boom", Value::Null),
                    ("sort", Value::String("recent".into())),
                    ("limit", serde_json::json!(10)),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, QuireError::Stage { stage: 0, .. }));
    }

    struct Echo;

    impl TemplateRenderer for Echo {
        fn render(&self, template: TemplateRef<'_>, context: &Value) -> Result<String> {
            Ok(format!("{}:{}", template.name(), context["bundle"]["key"].as_str().unwrap_or("")))
        }
    }

    #[test]
    fn render_writes_templated_bundles_only() {
        let out = std::env::temp_dir().join(format!("quire-query-test-{}", uuid::Uuid::now_v7()));
        let bundles = vec![
            bundle("posts/one", serde_json::json!({"template": "post"})),
            bundle("posts/", serde_json::json!({"template": "list"})),
            bundle("raw", serde_json::json!({})),
            bundle("off", serde_json::json!({"template": "post", "render": false})),
        ];
        let config = SiteConfig::default();
        let renderer = Echo;
        let c = QueryContext {
            bundles: &bundles,
            output_dir: &out,
            renderer: Some(&renderer),
            config: &config,
        };

        let count = QueryPipeline::with_builtin_operations()
            .execute(c, &pipeline(vec![("render", Value::Null)]))
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(std::fs::read_to_string(out.join("posts/one.html")).unwrap(), "post:posts/one");
        assert_eq!(std::fs::read_to_string(out.join("posts/index.html")).unwrap(), "list:posts/");
        assert!(!out.join("raw.html").exists());
        assert!(!out.join("off.html").exists());

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn render_without_renderer_fails_per_bundle() {
        let bundles = vec![bundle("page", serde_json::json!({"template": "post"}))];
        let config = SiteConfig::default();
        let err = QueryPipeline::with_builtin_operations()
            .execute(
                ctx(&bundles, &config, &PathBuf::from("unused")),
                &pipeline(vec![("render", Value::Null)]),
            )
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("bundle `page`"));
        assert!(message.contains("no template renderer"));
    }

    #[test]
    fn timestamps_compare_as_dates() {
        let a = Value::String("2024-01-05".into());
        let b = Value::String("2024-01-05 09:30".into());
        assert_eq!(compare_values(&a, &b), Ordering::Less);
        assert_eq!(
            compare_values(&serde_json::json!(10), &serde_json::json!(9.5)),
            Ordering::Greater
        );
    }
}
