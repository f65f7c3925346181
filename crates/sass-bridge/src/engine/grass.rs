/*
 * engine/grass.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Engine backed by the grass crate.
 */

//! Engine backed by the grass crate, a pure Rust Sass compiler that targets
//! dart-sass 1.54.3.
//!
//! grass has no hooks for host functions or importers and produces no
//! source maps, so requests that depend on those are either rejected or
//! compiled without them:
//!
//! - custom functions or an importer: the compile fails with status 1.
//! - precision, image path, source comments, source maps and their
//!   url/embed/contents flags: ignored.
//!
//! Included files are recorded through [`TrackingFs`].

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use ::grass::{ErrorKind, Fs, InputSyntax, Options, OutputStyle, StdFs};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Engine, EngineFailure, EngineOutput, EngineRequest, EngineResult};
use crate::error::{CompileError, STATUS_ERROR};
use crate::normalize::{OutputStyle as BridgeStyle, SourceMapTarget, split_include_path};
use crate::value::ValueFactory;

/// grass release this engine is built against. Kept in step with the
/// workspace pin.
pub const GRASS_VERSION: &str = "0.13.4";

/// Adapter implementing `grass::Fs` over the real file system that records
/// every file grass reads.
///
/// Paths are recorded absolute, in first-read order, once each.
pub struct TrackingFs {
    read: Mutex<Vec<PathBuf>>,
}

impl TrackingFs {
    pub fn new() -> Self {
        Self {
            read: Mutex::new(Vec::new()),
        }
    }

    /// The files read so far.
    pub fn into_read_files(self) -> Vec<PathBuf> {
        self.read.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, path: &Path) {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut read = self.read.lock().unwrap_or_else(PoisonError::into_inner);
        if !read.contains(&path) {
            read.push(path);
        }
    }
}

impl Default for TrackingFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TrackingFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .read
            .lock()
            .map(|read| read.len())
            .unwrap_or_default();
        f.debug_struct("TrackingFs").field("read", &count).finish()
    }
}

impl Fs for TrackingFs {
    fn is_dir(&self, path: &Path) -> bool {
        StdFs.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        StdFs.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = StdFs.read(path)?;
        self.record(path);
        Ok(bytes)
    }
}

/// Everything one grass compile needs, owned so it can move to the
/// blocking pool.
#[derive(Debug, Clone)]
struct GrassJob {
    data: Option<String>,
    file: Option<PathBuf>,
    load_paths: Vec<PathBuf>,
    style: OutputStyle,
    syntax: Option<InputSyntax>,
}

impl GrassJob {
    fn from_request(request: &EngineRequest<'_>, data_mode: bool) -> Result<Self, EngineFailure> {
        if !request.functions().is_empty() {
            return Err(unsupported("custom functions are not supported by the grass engine"));
        }
        if request.importer().is_some() {
            return Err(unsupported("custom importers are not supported by the grass engine"));
        }
        log_ignored(request);

        let data = match (data_mode, request.data()) {
            (true, Some(data)) => Some(data.to_string()),
            (true, None) => return Err(unsupported("no inline data to compile")),
            (false, _) => None,
        };
        let file = request.file().map(Path::to_path_buf);
        if !data_mode && file.is_none() {
            return Err(unsupported("no input file to compile"));
        }

        // Inline content resolves relative imports against its base path first.
        let mut load_paths = Vec::new();
        if data_mode {
            if let Some(dir) = file.as_deref().and_then(Path::parent) {
                if !dir.as_os_str().is_empty() {
                    load_paths.push(dir.to_path_buf());
                }
            }
        }
        load_paths.extend(split_include_path(request.include_path()));

        let style = match request.style() {
            BridgeStyle::Nested | BridgeStyle::Expanded => OutputStyle::Expanded,
            BridgeStyle::Compact | BridgeStyle::Compressed => OutputStyle::Compressed,
        };
        let syntax = request.indented_syntax().then_some(InputSyntax::Sass);

        Ok(Self {
            data,
            file,
            load_paths,
            style,
            syntax,
        })
    }

    fn run(self) -> EngineResult {
        let fs = TrackingFs::new();
        let mut options = Options::default()
            .fs(&fs)
            .load_paths(&self.load_paths)
            .style(self.style);
        if let Some(syntax) = self.syntax {
            options = options.input_syntax(syntax);
        }

        let compiled = match (&self.data, &self.file) {
            (Some(data), _) => ::grass::from_string(data.clone(), &options),
            (None, Some(file)) => ::grass::from_path(file, &options),
            (None, None) => return Err(unsupported("no input to compile")),
        };

        match compiled {
            Ok(css) => Ok(EngineOutput {
                css,
                map: None,
                included_files: fs.into_read_files(),
            }),
            Err(err) => Err(grass_failure(&err, self.file.as_deref())),
        }
    }
}

fn log_ignored(request: &EngineRequest<'_>) {
    if request.precision() != crate::normalize::DEFAULT_PRECISION {
        debug!(precision = request.precision(), "grass ignores precision");
    }
    if !request.image_path().is_empty() {
        debug!(image_path = request.image_path(), "grass ignores image path");
    }
    if request.source_comments() {
        debug!("grass does not emit source comments");
    }
    if *request.source_map() != SourceMapTarget::Disabled {
        debug!(source_map = ?request.source_map(), "grass does not produce source maps");
    }
    if request.omit_source_map_url() {
        debug!("grass ignores omitSourceMapUrl");
    }
    if request.source_map_embed() {
        debug!("grass ignores sourceMapEmbed");
    }
    if request.source_map_contents() {
        debug!("grass ignores sourceMapContents");
    }
}

fn unsupported(message: &str) -> EngineFailure {
    warn!("{}", message);
    EngineFailure::from_error(&CompileError::new(message).with_code(STATUS_ERROR))
}

/// Report a grass error in the engine JSON shape. Parse errors carry their
/// own location; grass counts lines and columns from 0.
fn grass_failure(err: &::grass::Error, entry: Option<&Path>) -> EngineFailure {
    let formatted = err.to_string();
    let entry = entry.map(|f| f.to_string_lossy().into_owned());
    let (message, line, column, file) = match err.clone().kind() {
        ErrorKind::ParseError { message, loc, .. } => (
            message,
            u32::try_from(loc.begin.line + 1).ok(),
            u32::try_from(loc.begin.column + 1).ok(),
            Some(loc.file.name().to_string()),
        ),
        ErrorKind::IoError(io) => (io.to_string(), None, None, entry),
        ErrorKind::FromUtf8Error(message) => (message, None, None, entry),
        _ => (first_line(&formatted), None, None, entry),
    };
    let json = serde_json::json!({
        "status": STATUS_ERROR,
        "message": message,
        "line": line,
        "column": column,
        "file": file,
        "formatted": formatted,
    });
    EngineFailure::new(STATUS_ERROR, json.to_string())
}

fn first_line(formatted: &str) -> String {
    formatted
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("Error: ")
        .to_string()
}

/// The bundled engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassEngine;

impl GrassEngine {
    pub fn new() -> Self {
        Self
    }

    fn run_sync(request: &EngineRequest<'_>, data_mode: bool) -> EngineResult {
        GrassJob::from_request(request, data_mode)?.run()
    }

    async fn run_async(request: &EngineRequest<'_>, data_mode: bool) -> EngineResult {
        let job = GrassJob::from_request(request, data_mode)?;
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(result) => result,
            Err(join) => Err(EngineFailure::from_error(
                &CompileError::new(format!("grass compile task failed: {}", join))
                    .with_code(STATUS_ERROR),
            )),
        }
    }
}

#[async_trait]
impl Engine for GrassEngine {
    fn name(&self) -> &str {
        "grass"
    }

    fn version(&self) -> &str {
        GRASS_VERSION
    }

    async fn render(&self, request: &EngineRequest<'_>, _values: &ValueFactory) -> EngineResult {
        Self::run_async(request, true).await
    }

    async fn render_file(
        &self,
        request: &EngineRequest<'_>,
        _values: &ValueFactory,
    ) -> EngineResult {
        Self::run_async(request, false).await
    }

    fn render_sync(&self, request: &EngineRequest<'_>, _values: &ValueFactory) -> EngineResult {
        Self::run_sync(request, true)
    }

    fn render_file_sync(
        &self,
        request: &EngineRequest<'_>,
        _values: &ValueFactory,
    ) -> EngineResult {
        Self::run_sync(request, false)
    }
}
