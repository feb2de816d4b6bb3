use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use stache_compiler::{
    CompileOptions, Compiler, Diagnostic, DiagnosticLevel, EngineOptions, SourceId, Stache,
    TemplateSource,
};
use stache_support::{config_error, data_error, io_error, template_error};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "stache",
    version,
    about = "Render a stache template against JSON data.",
    long_about = "Compile a stache template and render it against a JSON document. \
                  Block helpers that are not built in are bound lazily and reported \
                  when the render reaches them."
)]
struct Cli {
    /// Path to the template file.
    template: PathBuf,

    /// JSON file to render against (`-` reads stdin; defaults to `{}`).
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// YAML file with engine options (`no_escape`, `strict`).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Register a partial, e.g. `--partial header=header.hbs`.
    #[arg(short, long = "partial", value_name = "NAME=PATH")]
    partials: Vec<String>,

    /// Write `{{ }}` output without HTML encoding.
    #[arg(long)]
    no_escape: bool,

    /// Fail on paths that do not resolve.
    #[arg(long)]
    strict: bool,

    /// Dump the token stream produced by the lexer.
    #[arg(long)]
    dump_tokens: bool,

    /// Write the rendered output here instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    render_template(cli)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stache_compiler=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn render_template(cli: Cli) -> Result<()> {
    let options = load_options(&cli)?;
    debug!(?options, "engine options");
    let stache = Stache::with_options(options);

    for entry in &cli.partials {
        let (name, path) = parse_partial(entry)?;
        let contents = read_template(&path)?;
        stache.register_partial(name, &contents).map_err(|err| {
            anyhow!(template_error(
                "partial",
                &path.display().to_string(),
                format!("{err:#}")
            ))
        })?;
        info!(partial = name, "registered partial");
    }

    let contents = read_template(&cli.template)?;
    let source = TemplateSource::new(SourceId(0), cli.template.clone(), contents);
    let line_cache: Vec<&str> = source.contents.lines().collect();
    let mut compiler = Compiler::new(CompileOptions {
        dump_tokens: cli.dump_tokens,
    });

    let compiled = stache.compile_with(&mut compiler, &source);
    if !compiler.diagnostics().is_empty() {
        eprintln!("Diagnostics:");
        for diagnostic in compiler.diagnostics().entries() {
            print_diagnostic(&source, &line_cache, diagnostic);
        }
    }
    let template = compiled.map_err(|err| err.context("Compilation failed"))?;

    let data = load_data(cli.data.as_deref())?;
    let rendered = template
        .render(&data)
        .map_err(|err| anyhow!(template_error("render", &source.display_name(), err)))?;

    match &cli.output {
        Some(path) => fs::write(path, rendered)
            .map_err(|err| anyhow!(io_error("write", err)))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn load_options(cli: &Cli) -> Result<EngineOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let display = path.display().to_string();
            let contents = fs::read_to_string(path)
                .map_err(|err| anyhow!(config_error("read", &display, err)))?;
            EngineOptions::from_yaml_str(&contents)
                .map_err(|err| anyhow!(config_error("parse", &display, format!("{err:#}"))))?
        }
        None => EngineOptions::default(),
    };
    options.no_escape |= cli.no_escape;
    options.strict |= cli.strict;
    Ok(options)
}

fn load_data(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let display = path.display().to_string();
    let contents = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| anyhow!(data_error("read", &display, err)))?;
        buffer
    } else {
        fs::read_to_string(path).map_err(|err| anyhow!(data_error("read", &display, err)))?
    };
    serde_json::from_str(&contents).map_err(|err| anyhow!(data_error("parse", &display, err)))
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|err| anyhow!(template_error("read", &path.display().to_string(), err)))
}

fn parse_partial(entry: &str) -> Result<(&str, PathBuf)> {
    let Some((name, path)) = entry.split_once('=') else {
        bail!("Invalid partial '{entry}', expected NAME=PATH");
    };
    if name.is_empty() || path.is_empty() {
        bail!("Invalid partial '{entry}', expected NAME=PATH");
    }
    Ok((name, PathBuf::from(path)))
}

fn print_diagnostic(source: &TemplateSource, lines: &[&str], diagnostic: &Diagnostic) {
    let level_label = match diagnostic.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
    };
    eprintln!("  - {}: {}", level_label, diagnostic.message);
    let Some(span) = diagnostic.span else {
        return;
    };
    eprintln!(
        "     --> {}:{}:{}",
        source.display_name(),
        span.line,
        span.column
    );
    if let Some(raw_line) = lines.get(span.line.saturating_sub(1)) {
        eprintln!("      {}", raw_line.replace('\t', "    "));
        let padding = " ".repeat(span.column.saturating_sub(1));
        let width = if span.end_line == span.line {
            span.end_column.saturating_sub(span.column) + 1
        } else {
            1
        };
        eprintln!("      {}{}", padding, "^".repeat(width));
    }
}
