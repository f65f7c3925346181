//! sass-bridge CLI - compile Sass/SCSS to CSS from the command line.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sass_bridge::{BridgeError, Compiler, Options, Output, SourceMapOption, SourceMapTarget};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sass-bridge")]
#[command(version)]
#[command(about = "Compile Sass/SCSS to CSS", long_about = None)]
struct Cli {
    /// Input file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Write CSS to FILE instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Output style (nested, expanded, compact, compressed)
    #[arg(short = 't', long, default_value = "nested")]
    output_style: String,

    /// Directory to search for imports (repeatable)
    #[arg(short = 'I', long = "include-path")]
    include_paths: Vec<PathBuf>,

    /// Number of digits after the decimal point
    #[arg(long)]
    precision: Option<i64>,

    /// Emit a source map, optionally at PATH
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    source_map: Option<String>,

    /// Emit comments with the source line of each rule
    #[arg(long)]
    source_comments: bool,

    /// Treat the input as indented syntax (implied for .sass files)
    #[arg(long)]
    indented_syntax: bool,

    /// Print the compile stats as JSON to stderr
    #[arg(long)]
    stats: bool,

    /// Print bridge and engine versions and exit
    #[arg(long)]
    info: bool,
}

impl Cli {
    fn to_options(&self, stdin: impl FnOnce() -> io::Result<String>) -> Result<Options> {
        let mut options = Options::default()
            .output_style(self.output_style.as_str())
            .include_paths(self.include_paths.iter().cloned())
            .source_comments(self.source_comments);

        options = match &self.input {
            Some(input) => {
                let indented = self.indented_syntax
                    || input.extension().is_some_and(|ext| ext == "sass");
                options.file(input).indented_syntax(indented)
            }
            None => {
                let data = stdin().context("Failed to read style sheet from stdin")?;
                options.data(data).indented_syntax(self.indented_syntax)
            }
        };

        if let Some(output) = &self.output {
            options = options.out_file(output.to_string_lossy());
        }
        if let Some(precision) = self.precision {
            options = options.precision(precision);
        }
        options = match self.source_map.as_deref() {
            None => options,
            Some("") => options.source_map(SourceMapOption::Enabled),
            Some(path) => options.source_map(SourceMapOption::Path(path.to_string())),
        };
        Ok(options)
    }
}

fn read_stdin() -> io::Result<String> {
    let mut data = String::new();
    io::stdin().read_to_string(&mut data)?;
    Ok(data)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the CSS, the source map (to the target the compile derived) and
/// the stats.
fn write_output(cli: &Cli, map_target: &SourceMapTarget, output: &Output) -> Result<()> {
    match &cli.output {
        Some(path) => write_file(path, &output.css)?,
        None => print!("{}", output.css),
    }
    if let (Some(map), SourceMapTarget::Path(path)) = (&output.map, map_target) {
        write_file(path, map)?;
    }
    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&output.stats)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    // CSS goes to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sass_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let compiler = Compiler::default();

    if cli.info {
        println!("{}", compiler.info());
        return Ok(());
    }

    let options = cli.to_options(read_stdin)?;
    let map_target = options.source_map_target();
    debug!(?options, ?map_target, "compiling");

    match compiler.compile_sync(options) {
        Ok(output) => write_output(&cli, &map_target, &output),
        Err(BridgeError::Compile(err)) => {
            eprintln!("{}", err.formatted.as_deref().unwrap_or(&err.message));
            std::process::exit(err.code.unwrap_or(1));
        }
        Err(BridgeError::Config(err)) => Err(err.into()),
    }
}
