use serde::{Deserialize, Serialize};

use crate::escape::tagged_literal;

pub const DEFAULT_TAG: &str = "css";
pub const DEFAULT_MARKER: &str = "/* TAILWIND_PLACEHOLDER */";

/// The insertion point in a component template: a tagged template literal
/// whose whole body is a marker, e.g. ``css`/* TAILWIND_PLACEHOLDER */` ``.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Placeholder {
    pub tag: String,
    pub marker: String,
}

impl Default for Placeholder {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

impl Placeholder {
    pub fn new(tag: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            marker: marker.into(),
        }
    }

    /// The exact source text that gets replaced.
    pub fn pattern(&self) -> String {
        format!("{}`{}`", self.tag, self.marker)
    }

    /// Byte offsets of every non-overlapping occurrence of the pattern.
    pub fn find(&self, template: &str) -> Vec<usize> {
        let pattern = self.pattern();
        template.match_indices(&pattern).map(|(i, _)| i).collect()
    }

    /// The text that takes the pattern's place, with `css` escaped.
    pub fn render(&self, css: &str) -> String {
        tagged_literal(&self.tag, css)
    }
}
