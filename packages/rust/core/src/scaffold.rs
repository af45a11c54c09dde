//! Starter site scaffolding for `quire init`.

use std::path::{Path, PathBuf};

use tracing::info;

use quire_shared::{QuireError, Result, YAML_CONFIG_FILE, format_timestamp, now_minute};

const SITE_YAML: &str = r#"# quire site configuration
bundle_dirs:
  - content
ignore:
  - ".*"
  - "*~"
  - "*.draft.*"
bundle_defaults:
  author: Anonymous
templates:
  dirs:
    - templates
entries:
  - name: posts
    stages:
      - filter: {kind: post}
      - sort: {by: recent, desc: true}
      - render: post
  - name: pages
    stages:
      - exclude: {kind: post}
      - render: page
"#;

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><title>{{ bundle.components.title }}</title></head>
<body>
<main>
{{ bundle.components.content.text }}
</main>
<footer>{{ meta.author }}</footer>
</body>
</html>
"#;

const POST_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><title>{{ bundle.components.title }}</title></head>
<body>
<article>
<p><time>{{ meta.recent }}</time></p>
{{ bundle.components.content.text }}
</article>
<a href="/">Home</a>
</body>
</html>
"#;

const INDEX_BODY: &str = "# Welcome\n\nThis site was generated by quire.\n";

const HELLO_BODY: &str = "# Hello, world\n\nYour first post.\n";

/// Files written by [`init_site`], relative to the site root.
pub fn starter_files() -> Vec<(&'static str, String)> {
    let created = format_timestamp(&now_minute());
    vec![
        (YAML_CONFIG_FILE, SITE_YAML.to_string()),
        ("templates/page.html", PAGE_TEMPLATE.to_string()),
        ("templates/post.html", POST_TEMPLATE.to_string()),
        ("content/index/body.md", INDEX_BODY.to_string()),
        ("content/posts/hello-world/body.md", HELLO_BODY.to_string()),
        (
            "content/posts/hello-world/meta.yaml",
            format!("kind: post\ntags: [welcome]\ncreated_time: \"{created}\"\n"),
        ),
    ]
}

/// Create a starter site at `path`. Refuses to touch an existing path.
pub fn init_site(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(QuireError::validation(format!(
            "{} already exists",
            path.display()
        )));
    }

    for (rel, body) in starter_files() {
        let target = path.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuireError::io(parent, e))?;
        }
        std::fs::write(&target, body).map_err(|e| QuireError::io(&target, e))?;
    }

    info!(path = %path.display(), "site scaffolded");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, SilentProgress};

    #[test]
    fn starter_site_builds() {
        let root = std::env::temp_dir().join(format!("quire-scaffold-test-{}", uuid::Uuid::now_v7()));
        let site = root.join("blog");
        init_site(&site).unwrap();

        let mut engine = Engine::load(&site).unwrap();
        let summary = engine.build(&SilentProgress).unwrap();
        assert_eq!(summary.bundles, 2);

        let index = std::fs::read_to_string(site.join("_build/index.html")).unwrap();
        assert!(index.contains("<title>Welcome</title>"));
        assert!(index.contains("Anonymous"));
        let post = std::fs::read_to_string(site.join("_build/posts/hello-world.html")).unwrap();
        assert!(post.contains("Hello, world"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn existing_paths_are_refused() {
        let root = std::env::temp_dir().join(format!("quire-scaffold-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&root).unwrap();
        let err = init_site(&root).unwrap_err();
        assert!(matches!(err, QuireError::Validation { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }
}
