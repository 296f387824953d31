//! Where the injector reads from and writes to, and how strict it is.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{InjectError, Result};
use crate::placeholder::Placeholder;

pub const DEFAULT_STYLESHEET: &str = "dist/styles.css";
pub const DEFAULT_TEMPLATE: &str = "cw-navigation.ts";

/// What to do when the template has no placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Fail so a stale, uninjected artifact is never produced
    #[default]
    Error,
    /// Write the template through unchanged
    Passthrough,
}

/// What to do when the template has more than one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OccurrencePolicy {
    /// Fail unless there is exactly one placeholder
    #[default]
    ExactlyOne,
    /// Replace only the first placeholder
    First,
    /// Replace every placeholder
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectConfig {
    /// Compiled stylesheet produced by the CSS build.
    pub stylesheet: PathBuf,
    /// Component source holding the placeholder.
    pub template: PathBuf,
    /// Defaults to the compiled sibling of `template`.
    pub output: Option<PathBuf>,
    pub placeholder: Placeholder,
    pub on_missing: MissingPolicy,
    pub occurrences: OccurrencePolicy,
    /// Read every injected literal back and compare it with the stylesheet.
    pub verify: bool,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            stylesheet: PathBuf::from(DEFAULT_STYLESHEET),
            template: PathBuf::from(DEFAULT_TEMPLATE),
            output: None,
            placeholder: Placeholder::default(),
            on_missing: MissingPolicy::default(),
            occurrences: OccurrencePolicy::default(),
            verify: false,
        }
    }
}

impl InjectConfig {
    /// Load a JSON config file. Relative paths inside it are resolved
    /// against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| InjectError::read(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|source| InjectError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rooted_at(root))
    }

    /// Resolve relative paths against `root`. Absolute paths are kept.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.stylesheet = root.join(&self.stylesheet);
        self.template = root.join(&self.template);
        self.output = self.output.map(|p| root.join(p));
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| compiled_sibling(&self.template))
    }
}

/// `dir/cw-navigation.ts` -> `dir/cw-navigation.compiled.ts`.
pub fn compiled_sibling(template: &Path) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match template.extension() {
        Some(ext) => format!("{stem}.compiled.{}", ext.to_string_lossy()),
        None => format!("{stem}.compiled"),
    };
    template.with_file_name(name)
}
