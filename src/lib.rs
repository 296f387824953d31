//! Injects a compiled stylesheet into a Web Component source template.
//!
//! The CSS build writes `dist/styles.css`; the component source carries a
//! placeholder such as ``css`/* TAILWIND_PLACEHOLDER */` ``. This crate
//! replaces the placeholder with the stylesheet as an escaped template
//! literal and writes the result next to the template for the bundler.

pub mod config;
pub mod error;
pub mod escape;
pub mod inject;
pub mod literal;
pub mod placeholder;
pub mod watch;

pub use config::{InjectConfig, MissingPolicy, OccurrencePolicy};
pub use error::{InjectError, Result};
pub use inject::{check, run, Injection, Report};
pub use placeholder::Placeholder;

/// Substitute `css` into `template` using the default placeholder and
/// policies, without touching the filesystem.
pub fn inject_str(template: &str, css: &str) -> Result<String> {
    inject::inject(template, css, &InjectConfig::default()).map(|i| i.text)
}
