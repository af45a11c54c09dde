//! Compiled ignore filter.
//!
//! Every configured glob is translated by `globset` into an anchored regex,
//! and the translations are ORed into one pattern compiled once per engine.

use globset::GlobBuilder;
use regex::bytes::Regex;

use quire_shared::{QuireError, Result};

/// Matches file and directory names excluded from assembly.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    pattern: Option<Regex>,
}

impl IgnoreFilter {
    /// Compile a filter from glob patterns. No patterns ignores nothing.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let mut alternatives = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .backslash_escape(true)
                .build()
                .map_err(|e| QuireError::config(format!("invalid ignore pattern `{pattern}`: {e}")))?;
            alternatives.push(format!("(?:{})", glob.regex()));
        }

        let pattern = Regex::new(&alternatives.join("|"))
            .map_err(|e| QuireError::config(format!("invalid ignore pattern: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Whether `name` (a bare file name, not a path) is ignored.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(name.as_bytes()))
    }
}
