use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use style_inject::{InjectConfig, MissingPolicy, OccurrencePolicy, Report};

#[derive(Parser)]
#[command(name = "style-inject", version)]
#[command(about = "Inject a compiled stylesheet into a Web Component template")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    opts: InjectOpts,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject the stylesheet and write the compiled template (default)
    Inject,

    /// Validate the stylesheet and placeholder without writing output
    Check,

    /// Inject, then inject again whenever the stylesheet or template changes
    Watch,
}

#[derive(Args)]
struct InjectOpts {
    /// JSON config file; relative paths inside it resolve against its directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that relative paths resolve against (default: current dir)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Compiled stylesheet (default: dist/styles.css)
    #[arg(long, global = true)]
    stylesheet: Option<PathBuf>,

    /// Component template holding the placeholder (default: cw-navigation.ts)
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Write output here instead of <template>.compiled.<ext>
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Tag of the placeholder literal (default: css)
    #[arg(long, global = true)]
    tag: Option<String>,

    /// Body of the placeholder literal (default: /* TAILWIND_PLACEHOLDER */)
    #[arg(long, global = true)]
    marker: Option<String>,

    /// What to do when the template has no placeholder
    #[arg(long, value_enum, global = true)]
    on_missing: Option<MissingPolicy>,

    /// What to do when the template has several placeholders
    #[arg(long, value_enum, global = true)]
    occurrences: Option<OccurrencePolicy>,

    /// Read the injected literal back and compare it with the stylesheet
    #[arg(long, global = true)]
    verify: bool,

    /// Print a JSON report on stdout
    #[arg(long, global = true)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match resolve_config(&cli.opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Inject) {
        Commands::Inject => style_inject::run(&config),
        Commands::Check => style_inject::check(&config),
        Commands::Watch => {
            if let Err(e) = style_inject::watch::watch(&config) {
                eprintln!("error: {e:#}");
                process::exit(1);
            }
            return;
        }
    };

    match result {
        Ok(report) => {
            if cli.opts.json {
                print_report(&report);
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Defaults, then the config file, then command-line overrides.
fn resolve_config(opts: &InjectOpts) -> style_inject::Result<InjectConfig> {
    let root = opts.root.clone().unwrap_or_default();
    let mut config = match &opts.config {
        Some(path) => InjectConfig::load(&root.join(path))?,
        None => InjectConfig::default().rooted_at(&root),
    };

    if let Some(p) = &opts.stylesheet {
        config.stylesheet = root.join(p);
    }
    if let Some(p) = &opts.template {
        config.template = root.join(p);
    }
    if let Some(p) = &opts.output {
        config.output = Some(root.join(p));
    }
    if let Some(tag) = &opts.tag {
        config.placeholder.tag = tag.clone();
    }
    if let Some(marker) = &opts.marker {
        config.placeholder.marker = marker.clone();
    }
    if let Some(policy) = opts.on_missing {
        config.on_missing = policy;
    }
    if let Some(policy) = opts.occurrences {
        config.occurrences = policy;
    }
    config.verify |= opts.verify;

    Ok(config)
}

fn print_report(report: &Report) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: cannot serialize report: {e}");
            process::exit(1);
        }
    }
}
