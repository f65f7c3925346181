/*
 * normalize.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Derive the canonical compile request from raw options.
 */

//! Derive the canonical compile request from raw options.
//!
//! [`normalize`] runs once per compile, before the engine is involved. Every
//! configuration error surfaces here. What comes out is split in two:
//!
//! - [`NormalizedConfig`], the request the engine sees. It holds no caller
//!   handlers, so it can be shared with the engine across threads.
//! - [`ResponseHandlers`], which turn the engine's result or failure into
//!   the uniform response and forward it to the caller's handlers.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::completion::CompletionMode;
use crate::error::{CompileError, ConfigError};
use crate::function::{FunctionTable, adapt_functions};
use crate::importer::AdaptedImporter;
use crate::options::{ErrorHandler, Options, SourceMapOption, SuccessHandler};
use crate::stats::{DATA_ENTRY, Stats};
use crate::{EngineOutput, Output};

/// Precision used when none (or an unusable one) is given.
pub const DEFAULT_PRECISION: u32 = 5;

/// Separator of the joined include path.
#[cfg(windows)]
pub const PATH_DELIMITER: char = ';';
#[cfg(not(windows))]
pub const PATH_DELIMITER: char = ':';

/// CSS output style. The numeric codes are what engines expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputStyle {
    #[default]
    Nested = 0,
    Expanded = 1,
    Compact = 2,
    Compressed = 3,
}

impl OutputStyle {
    /// Unknown names map to [`OutputStyle::Nested`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "expanded" => OutputStyle::Expanded,
            "compact" => OutputStyle::Compact,
            "compressed" => OutputStyle::Compressed,
            _ => OutputStyle::Nested,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputStyle::Nested => "nested",
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compact => "compact",
            OutputStyle::Compressed => "compressed",
        }
    }
}

/// Where the style sheet comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Inline content. `file`, when given, is only a base path.
    Data { data: String, file: Option<PathBuf> },
    File(PathBuf),
}

impl ContentSource {
    /// The entry file, whether it is the content or only the base path.
    pub fn file(&self) -> Option<&Path> {
        match self {
            ContentSource::Data { file, .. } => file.as_deref(),
            ContentSource::File(file) => Some(file),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, ContentSource::Data { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMapTarget {
    Disabled,
    /// Produce a map without a named file.
    Unnamed,
    Path(PathBuf),
}

/// The canonical request handed to the engine.
#[derive(Debug, Clone)]
pub struct NormalizedConfig {
    pub source: ContentSource,
    /// Absolute when set.
    pub output_path: Option<PathBuf>,
    pub source_map: SourceMapTarget,
    pub include_paths: Vec<PathBuf>,
    /// `include_paths` joined with [`PATH_DELIMITER`].
    pub include_path: String,
    pub precision: u32,
    pub style: OutputStyle,
    pub image_path: String,
    pub source_comments: bool,
    pub indented_syntax: bool,
    pub omit_source_map_url: bool,
    pub source_map_embed: bool,
    pub source_map_contents: bool,
    pub functions: FunctionTable,
    pub importer: Option<AdaptedImporter>,
    pub stats: Stats,
}

/// Turns engine results into the caller-facing response.
#[derive(Default)]
pub struct ResponseHandlers {
    on_success: Option<SuccessHandler>,
    on_error: Option<ErrorHandler>,
}

impl std::fmt::Debug for ResponseHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandlers")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl ResponseHandlers {
    /// Close the stats record and build the response.
    pub fn success(self, mut stats: Stats, result: EngineOutput) -> Output {
        stats.finish(result.included_files);
        let output = Output {
            css: result.css,
            map: result.map,
            stats,
        };
        if let Some(handler) = self.on_success {
            handler(&output);
        }
        output
    }

    /// Normalize an engine failure report.
    pub fn error(self, raw: &str, status: i32) -> CompileError {
        self.fail(CompileError::from_engine(raw, status))
    }

    /// Forward an already normalized error.
    pub fn fail(self, error: CompileError) -> CompileError {
        if let Some(handler) = self.on_error {
            handler(&error);
        }
        error
    }
}

/// Normalize raw options for a compile collecting callback results per `mode`.
pub fn normalize(
    options: Options,
    mode: CompletionMode,
) -> Result<(NormalizedConfig, ResponseHandlers), ConfigError> {
    let Options {
        file,
        data,
        out_file,
        source_map,
        include_paths,
        image_path,
        precision,
        output_style,
        source_comments,
        indented_syntax,
        omit_source_map_url,
        source_map_embed,
        source_map_contents,
        importer,
        functions,
        on_success,
        on_error,
    } = options;

    let stats = Stats::begin(
        file.as_ref()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| DATA_ENTRY.to_string()),
    );

    let source = match (data, file) {
        (Some(data), file) => ContentSource::Data { data, file },
        (None, Some(file)) => ContentSource::File(file),
        (None, None) => return Err(ConfigError::NoInput),
    };

    let output_path = out_file.map(|out| output_path(&out, source.file()));
    let source_map = source_map_target(&source_map, output_path.as_deref(), source.file());
    let include_path = join_include_paths(&include_paths);
    let precision = normalize_precision(precision);
    let style = output_style
        .as_deref()
        .map(OutputStyle::from_name)
        .unwrap_or_default();

    let functions = adapt_functions(&functions, mode)?;
    let importer = importer.map(|importer| AdaptedImporter::new(importer, mode));

    let config = NormalizedConfig {
        source,
        output_path,
        source_map,
        include_paths,
        include_path,
        precision,
        style,
        image_path: image_path.unwrap_or_default(),
        source_comments,
        indented_syntax,
        omit_source_map_url,
        source_map_embed,
        source_map_contents,
        functions,
        importer,
        stats,
    };
    debug!(
        entry = %config.stats.entry,
        data = config.source.is_data(),
        output = ?config.output_path,
        source_map = ?config.source_map,
        style = config.style.name(),
        precision = config.precision,
        functions = config.functions.len(),
        importer = config.importer.is_some(),
        "normalized compile options"
    );

    Ok((config, ResponseHandlers { on_success, on_error }))
}

impl Options {
    /// Where a compile of these options would place its source map. Callers
    /// that write the map themselves use this instead of the raw option.
    pub fn source_map_target(&self) -> SourceMapTarget {
        let entry = self.file.as_deref();
        let output = self.out_file.as_deref().map(|out| output_path(out, entry));
        source_map_target(&self.source_map, output.as_deref(), entry)
    }
}

/// Absolute output paths are kept as given; relative ones are resolved
/// against the directory of the entry file.
fn output_path(out_file: &str, entry: Option<&Path>) -> PathBuf {
    let out = Path::new(out_file);
    if out.is_absolute() {
        return out.to_path_buf();
    }
    resolve(&entry_dir(entry), out)
}

fn source_map_target(
    option: &SourceMapOption,
    output_path: Option<&Path>,
    entry: Option<&Path>,
) -> SourceMapTarget {
    match (option, output_path) {
        (SourceMapOption::Disabled, _) => SourceMapTarget::Disabled,
        (SourceMapOption::Path(path), _) if path.is_empty() => SourceMapTarget::Disabled,
        (SourceMapOption::Enabled, Some(output)) => {
            let mut map = output.as_os_str().to_owned();
            map.push(".map");
            SourceMapTarget::Path(PathBuf::from(map))
        }
        (SourceMapOption::Enabled, None) => SourceMapTarget::Unnamed,
        (SourceMapOption::Path(path), Some(_)) => {
            SourceMapTarget::Path(resolve(&entry_dir(entry), Path::new(path)))
        }
        (SourceMapOption::Path(path), None) => SourceMapTarget::Path(PathBuf::from(path)),
    }
}

fn normalize_precision(precision: Option<i64>) -> u32 {
    precision
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(DEFAULT_PRECISION)
}

pub(crate) fn join_include_paths(paths: &[PathBuf]) -> String {
    let delimiter = PATH_DELIMITER.to_string();
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(delimiter.as_str())
}

/// Split a joined include path back into directories, skipping empty entries.
pub fn split_include_path(joined: &str) -> Vec<PathBuf> {
    joined
        .split(PATH_DELIMITER)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn entry_dir(entry: Option<&Path>) -> PathBuf {
    entry
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve `path` against `base`, and `base` against the working directory.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    clean(&cwd.join(base).join(path))
}

/// Lexically normalize a path: drop `.` segments, fold `..` and trailing
/// separators.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(options: Options) -> NormalizedConfig {
        normalize(options, CompletionMode::Immediate).unwrap().0
    }

    #[test]
    fn test_data_takes_precedence_over_file() {
        let config = norm(Options::default().data("a{}").file("/styles/main.scss"));
        assert_eq!(
            config.source,
            ContentSource::Data {
                data: "a{}".into(),
                file: Some(PathBuf::from("/styles/main.scss")),
            }
        );
        assert_eq!(config.stats.entry, "/styles/main.scss");
    }

    #[test]
    fn test_file_only() {
        let config = norm(Options::default().file("/styles/main.scss"));
        assert_eq!(config.source, ContentSource::File("/styles/main.scss".into()));
        assert!(!config.source.is_data());
    }

    #[test]
    fn test_data_entry() {
        let config = norm(Options::default().data("a{}"));
        assert_eq!(config.stats.entry, DATA_ENTRY);
        assert!(config.stats.start > 0);
        assert!(!config.stats.is_finished());
    }

    #[test]
    fn test_no_input_is_config_error() {
        let err = normalize(Options::default(), CompletionMode::Immediate).unwrap_err();
        assert!(matches!(err, ConfigError::NoInput));
    }

    #[test]
    fn test_output_path_absolute_kept() {
        let config = norm(
            Options::default()
                .file("/a/b.scss")
                .out_file("/a/../b.css")
                .source_map(SourceMapOption::Enabled),
        );
        assert_eq!(config.output_path, Some(PathBuf::from("/a/../b.css")));
        assert_eq!(
            config.source_map,
            SourceMapTarget::Path("/a/../b.css.map".into())
        );
    }

    #[test]
    fn test_source_map_target_before_normalizing() {
        let options = Options::default()
            .file("/styles/main.scss")
            .out_file("/out/main.css")
            .source_map(SourceMapOption::Path("maps/x.map".into()));
        assert_eq!(
            options.source_map_target(),
            SourceMapTarget::Path("/styles/maps/x.map".into())
        );
        assert_eq!(
            norm(options).source_map,
            SourceMapTarget::Path("/styles/maps/x.map".into())
        );
    }

    #[test]
    fn test_output_path_relative_to_entry() {
        let config = norm(Options::default().file("/a/b.scss").out_file("../out/x.css"));
        assert_eq!(config.output_path, Some(PathBuf::from("/out/x.css")));
    }

    #[test]
    fn test_output_path_absent() {
        let config = norm(Options::default().file("/a/b.scss"));
        assert_eq!(config.output_path, None);
    }

    #[test]
    fn test_source_map_true_without_out_file() {
        let config = norm(
            Options::default()
                .data("a{}")
                .source_map(SourceMapOption::Enabled),
        );
        assert_eq!(config.source_map, SourceMapTarget::Unnamed);
    }

    #[test]
    fn test_source_map_true_with_out_file() {
        let config = norm(
            Options::default()
                .file("/a/b.scss")
                .out_file("/a/b.css")
                .source_map(SourceMapOption::Enabled),
        );
        assert_eq!(config.source_map, SourceMapTarget::Path("/a/b.css.map".into()));
    }

    #[test]
    fn test_source_map_string() {
        let resolved = norm(
            Options::default()
                .file("/a/b.scss")
                .out_file("/out/b.css")
                .source_map(SourceMapOption::Path("maps/b.map".into())),
        );
        assert_eq!(resolved.source_map, SourceMapTarget::Path("/a/maps/b.map".into()));

        let unresolved = norm(
            Options::default()
                .file("/a/b.scss")
                .source_map(SourceMapOption::Path("maps/b.map".into())),
        );
        assert_eq!(unresolved.source_map, SourceMapTarget::Path("maps/b.map".into()));
    }

    #[test]
    fn test_source_map_disabled() {
        let config = norm(Options::default().data("a{}"));
        assert_eq!(config.source_map, SourceMapTarget::Disabled);
        let config = norm(
            Options::default()
                .data("a{}")
                .source_map(SourceMapOption::Path(String::new())),
        );
        assert_eq!(config.source_map, SourceMapTarget::Disabled);
    }

    #[test]
    fn test_precision() {
        assert_eq!(norm(Options::default().data("")).precision, 5);
        assert_eq!(norm(Options::default().data("").precision(10)).precision, 10);
        assert_eq!(norm(Options::default().data("").precision(0)).precision, 0);
        assert_eq!(norm(Options::default().data("").precision(-2)).precision, 5);
    }

    #[test]
    fn test_output_style_mapping() {
        let style = |name: &str| norm(Options::default().data("").output_style(name)).style;
        assert_eq!(style("nested").code(), 0);
        assert_eq!(style("expanded").code(), 1);
        assert_eq!(style("compact").code(), 2);
        assert_eq!(style("compressed").code(), 3);
        assert_eq!(style("fancy"), OutputStyle::Nested);
        assert_eq!(norm(Options::default().data("")).style, OutputStyle::Nested);
    }

    #[test]
    fn test_include_path_joined() {
        let config = norm(Options::default().data("").include_paths(["a", "b/c"]));
        let expected = format!("a{}b/c", PATH_DELIMITER);
        assert_eq!(config.include_path, expected);
        assert_eq!(
            split_include_path(&config.include_path),
            vec![PathBuf::from("a"), PathBuf::from("b/c")]
        );
        assert_eq!(norm(Options::default().data("")).include_path, "");
    }

    #[test]
    fn test_invalid_signature_fails_normalization() {
        let options = Options::default()
            .data("")
            .function("1234", crate::SassFunction::new(|_| Ok(crate::Value::null())));
        let err = normalize(options, CompletionMode::Immediate).unwrap_err();
        assert_eq!(err.to_string(), "Invalid function signature format \"1234\"");
    }

    #[test]
    fn test_handlers_forward_once() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let options = Options::default()
            .data("")
            .on_error(move |err| {
                assert_eq!(err.message, "boom");
                seen.fetch_add(1, Ordering::SeqCst);
            });
        let (_, handlers) = normalize(options, CompletionMode::Signalled).unwrap();
        let err = handlers.error("boom", 4);
        assert_eq!(err.code, Some(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/./b/../c/")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("../x")), PathBuf::from("../x"));
    }
}
