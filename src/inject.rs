//! Read the stylesheet and template, substitute, write the compiled template.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{InjectConfig, MissingPolicy, OccurrencePolicy};
use crate::error::{InjectError, Result};
use crate::literal::read_literal;

/// Result of substituting a stylesheet into a template, before anything is
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub text: String,
    /// Byte offsets in `text` where each injected literal body starts.
    pub literals: Vec<usize>,
}

impl Injection {
    pub fn replaced(&self) -> usize {
        self.literals.len()
    }
}

/// What an invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub stylesheet: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    pub bytes: usize,
    pub replacements: usize,
    pub verified: bool,
    pub written: bool,
}

/// Replace the placeholder in `template` with `css` as an escaped tagged
/// literal, applying the config's occurrence policies.
pub fn inject(template: &str, css: &str, config: &InjectConfig) -> Result<Injection> {
    let placeholder = &config.placeholder;
    let pattern = placeholder.pattern();
    let found = placeholder.find(template);
    debug!(
        "found {} occurrence(s) of {pattern} in {}",
        found.len(),
        config.template.display()
    );

    let targets = match (found.len(), config.occurrences) {
        (0, _) => match config.on_missing {
            MissingPolicy::Error => {
                return Err(InjectError::PlaceholderNotFound {
                    template: config.template.clone(),
                    pattern,
                })
            }
            MissingPolicy::Passthrough => {
                warn!(
                    "{pattern} not found in {}, writing template unchanged",
                    config.template.display()
                );
                return Ok(Injection {
                    text: template.to_string(),
                    literals: Vec::new(),
                });
            }
        },
        (1, _) | (_, OccurrencePolicy::All) => &found[..],
        (_, OccurrencePolicy::First) => &found[..1],
        (count, OccurrencePolicy::ExactlyOne) => {
            return Err(InjectError::AmbiguousPlaceholder {
                template: config.template.clone(),
                pattern,
                count,
            })
        }
    };

    let replacement = placeholder.render(css);
    let body_offset = placeholder.tag.len() + 1;
    let mut text = String::with_capacity(
        template.len() + targets.len() * replacement.len().saturating_sub(pattern.len()),
    );
    let mut literals = Vec::with_capacity(targets.len());
    let mut last = 0;
    for &at in targets {
        text.push_str(&template[last..at]);
        literals.push(text.len() + body_offset);
        text.push_str(&replacement);
        last = at + pattern.len();
    }
    text.push_str(&template[last..]);

    Ok(Injection { text, literals })
}

/// Check that every injected literal evaluates back to `css`.
pub fn verify(injection: &Injection, css: &str) -> Result<()> {
    for &offset in &injection.literals {
        let literal = read_literal(&injection.text[offset..])
            .map_err(|source| InjectError::Literal { offset, source })?;
        if literal.value != css {
            return Err(InjectError::RoundTrip { offset });
        }
    }
    Ok(())
}

/// Inject and write the compiled template.
pub fn run(config: &InjectConfig) -> Result<Report> {
    let (injection, mut report) = prepare(config)?;
    write_atomic(&report.output, &injection.text)?;
    report.written = true;
    info!(
        "injected {} into {} ({} bytes)",
        report.stylesheet.display(),
        report.output.display(),
        report.bytes
    );
    Ok(report)
}

/// Everything `run` does except the write.
pub fn check(config: &InjectConfig) -> Result<Report> {
    let (_, report) = prepare(config)?;
    info!(
        "{}: ok ({} placeholder(s))",
        report.template.display(),
        report.replacements
    );
    Ok(report)
}

fn prepare(config: &InjectConfig) -> Result<(Injection, Report)> {
    let css = fs::read_to_string(&config.stylesheet).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => InjectError::MissingInput {
            path: config.stylesheet.clone(),
        },
        _ => InjectError::read(&config.stylesheet, e),
    })?;
    let template = fs::read_to_string(&config.template)
        .map_err(|e| InjectError::read(&config.template, e))?;
    debug!(
        "read {} ({} bytes) and {} ({} bytes)",
        config.stylesheet.display(),
        css.len(),
        config.template.display(),
        template.len()
    );

    let injection = inject(&template, &css, config)?;
    if config.verify {
        verify(&injection, &css)?;
        debug!("verified {} injected literal(s)", injection.replaced());
    }

    let report = Report {
        stylesheet: config.stylesheet.clone(),
        template: config.template.clone(),
        output: config.output_path(),
        bytes: injection.text.len(),
        replacements: injection.replaced(),
        verified: config.verify && injection.replaced() > 0,
        written: false,
    };
    Ok((injection, report))
}

/// Write through a temporary file in the destination directory so the
/// output is either the previous artifact or the complete new one.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| InjectError::write(path, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| InjectError::write(path, e))?;
    tmp.persist(path)
        .map_err(|e| InjectError::write(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::Placeholder;

    const TEMPLATE: &str = "static styles = [\n  css`/* TAILWIND_PLACEHOLDER */`,\n  css`:host { display: block; }`\n];\n";

    #[test]
    fn replaces_placeholder_with_escaped_literal() {
        let css = ".a{content:\"\\\\\"}";
        let out = inject(TEMPLATE, css, &InjectConfig::default()).unwrap();
        assert_eq!(out.replaced(), 1);
        assert!(out.text.contains("css`.a{content:\"\\\\\\\\\"}`,"));
        assert!(out.text.contains("css`:host { display: block; }`"));
        assert!(!out.text.contains("TAILWIND_PLACEHOLDER"));
        verify(&out, css).unwrap();
    }

    #[test]
    fn literal_offsets_point_at_body() {
        let out = inject("x css`/* TAILWIND_PLACEHOLDER */` y", "b{}", &InjectConfig::default())
            .unwrap();
        assert_eq!(out.text, "x css`b{}` y");
        assert_eq!(out.literals, vec![6]);
    }

    #[test]
    fn missing_placeholder_is_an_error_by_default() {
        let err = inject("css`:host{}`", ".a{}", &InjectConfig::default()).unwrap_err();
        assert!(matches!(err, InjectError::PlaceholderNotFound { .. }));
    }

    #[test]
    fn passthrough_keeps_template_unchanged() {
        let config = InjectConfig {
            on_missing: MissingPolicy::Passthrough,
            ..InjectConfig::default()
        };
        let template = "export const x = css`:host{}`;\n";
        let out = inject(template, ".a{}", &config).unwrap();
        assert_eq!(out.text, template);
        assert_eq!(out.replaced(), 0);
    }

    #[test]
    fn multiple_placeholders_follow_policy() {
        let template = "css`/* TAILWIND_PLACEHOLDER */` css`/* TAILWIND_PLACEHOLDER */`";

        let err = inject(template, "a{}", &InjectConfig::default()).unwrap_err();
        assert!(matches!(err, InjectError::AmbiguousPlaceholder { count: 2, .. }));

        let first = InjectConfig {
            occurrences: OccurrencePolicy::First,
            ..InjectConfig::default()
        };
        let out = inject(template, "a{}", &first).unwrap();
        assert_eq!(out.text, "css`a{}` css`/* TAILWIND_PLACEHOLDER */`");

        let all = InjectConfig {
            occurrences: OccurrencePolicy::All,
            ..InjectConfig::default()
        };
        let out = inject(template, "a{}", &all).unwrap();
        assert_eq!(out.text, "css`a{}` css`a{}`");
        assert_eq!(out.literals, vec![4, 13]);
        verify(&out, "a{}").unwrap();
    }

    #[test]
    fn interpolation_sequence_stays_inert() {
        let css = ".a::after{content:'${x}'}";
        let out = inject(TEMPLATE, css, &InjectConfig::default()).unwrap();
        assert!(out.text.contains("content:'\\${x}'"));
        assert!(!out.text.contains("\\\\${"));
        verify(&out, css).unwrap();
    }

    #[test]
    fn custom_placeholder() {
        let config = InjectConfig {
            placeholder: Placeholder::new("unsafeCSS", "%STYLES%"),
            ..InjectConfig::default()
        };
        let out = inject("s = unsafeCSS`%STYLES%`;", "p{}", &config).unwrap();
        assert_eq!(out.text, "s = unsafeCSS`p{}`;");
    }

    #[test]
    fn verify_detects_tampering() {
        let mut out = inject(TEMPLATE, "a{}", &InjectConfig::default()).unwrap();
        out.text = out.text.replace("a{}", "b{}");
        let err = verify(&out, "a{}").unwrap_err();
        assert!(matches!(err, InjectError::RoundTrip { .. }));
    }
}
