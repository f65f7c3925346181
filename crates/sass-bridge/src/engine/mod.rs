/*
 * engine/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The contract between the bridge and a compilation engine.
 */

//! The contract between the bridge and a compilation engine.
//!
//! An engine is reached through four entry points: inline content or a
//! file, each synchronous or asynchronous. It receives the normalized
//! request (adapted functions and importer included) through an
//! [`EngineRequest`] view, plus the [`ValueFactory`] for building and
//! inspecting values. It reports either an [`EngineOutput`] or an
//! [`EngineFailure`] carrying a status code and a message that is usually
//! JSON.
//!
//! The bridge never looks inside the engine. [`GrassEngine`] is the one
//! bundled with this crate.

pub mod grass;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CompileError, STATUS_ERROR};
use crate::function::FunctionTable;
use crate::importer::AdaptedImporter;
use crate::normalize::{ContentSource, NormalizedConfig, OutputStyle, SourceMapTarget};
use crate::value::ValueFactory;

pub use self::grass::GrassEngine;

/// `prev` reported to importers for imports made from inline content.
pub const STDIN_PREV: &str = "stdin";

/// What a successful engine run reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub css: String,
    pub map: Option<String>,
    /// Every file the compile read, in the order the engine reports them.
    pub included_files: Vec<PathBuf>,
}

/// What a failed engine run reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub status: i32,
    /// The error message; JSON-encoded when the engine has structure to share.
    pub error_json: String,
}

impl EngineFailure {
    pub fn new(status: i32, error_json: impl Into<String>) -> Self {
        Self {
            status,
            error_json: error_json.into(),
        }
    }

    /// Report a bridge-side error in the engine's JSON shape.
    pub fn from_error(error: &CompileError) -> Self {
        Self::new(error.code.unwrap_or(STATUS_ERROR), error.to_engine_json())
    }
}

pub type EngineResult = Result<EngineOutput, EngineFailure>;

/// Read-only view of a normalized request, as an engine sees it.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    config: &'a NormalizedConfig,
}

impl<'a> EngineRequest<'a> {
    pub fn new(config: &'a NormalizedConfig) -> Self {
        Self { config }
    }

    /// Inline content, when compiling in data mode.
    pub fn data(&self) -> Option<&'a str> {
        match &self.config.source {
            ContentSource::Data { data, .. } => Some(data),
            ContentSource::File(_) => None,
        }
    }

    /// The entry file: the content in file mode, the base path in data mode.
    pub fn file(&self) -> Option<&'a Path> {
        self.config.source.file()
    }

    /// The `prev` value for imports made directly by the entry.
    pub fn entry_prev(&self) -> String {
        match &self.config.source {
            ContentSource::Data { .. } => STDIN_PREV.to_string(),
            ContentSource::File(file) => file.to_string_lossy().into_owned(),
        }
    }

    pub fn output_path(&self) -> Option<&'a Path> {
        self.config.output_path.as_deref()
    }

    pub fn source_map(&self) -> &'a SourceMapTarget {
        &self.config.source_map
    }

    /// The delimiter-joined include path.
    pub fn include_path(&self) -> &'a str {
        &self.config.include_path
    }

    pub fn precision(&self) -> u32 {
        self.config.precision
    }

    pub fn style(&self) -> OutputStyle {
        self.config.style
    }

    pub fn image_path(&self) -> &'a str {
        &self.config.image_path
    }

    pub fn source_comments(&self) -> bool {
        self.config.source_comments
    }

    pub fn indented_syntax(&self) -> bool {
        self.config.indented_syntax
    }

    pub fn omit_source_map_url(&self) -> bool {
        self.config.omit_source_map_url
    }

    pub fn source_map_embed(&self) -> bool {
        self.config.source_map_embed
    }

    pub fn source_map_contents(&self) -> bool {
        self.config.source_map_contents
    }

    pub fn functions(&self) -> &'a FunctionTable {
        &self.config.functions
    }

    pub fn importer(&self) -> Option<&'a AdaptedImporter> {
        self.config.importer.as_ref()
    }
}

/// A compilation engine with the four bridge entry points.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Compile inline content.
    async fn render(&self, request: &EngineRequest<'_>, values: &ValueFactory) -> EngineResult;

    /// Compile the entry file.
    async fn render_file(
        &self,
        request: &EngineRequest<'_>,
        values: &ValueFactory,
    ) -> EngineResult;

    fn render_sync(&self, request: &EngineRequest<'_>, values: &ValueFactory) -> EngineResult;

    fn render_file_sync(&self, request: &EngineRequest<'_>, values: &ValueFactory)
    -> EngineResult;
}
