//! Shared helpers for the integration tests.
//!
//! `RecordingEngine` stands in for a real compiler: instead of parsing a
//! style sheet it replays a fixed script of function calls and imports
//! against whatever the bridge handed it, and records what came back.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sass_bridge::{
    CompileError, Engine, EngineFailure, EngineOutput, EngineRequest, EngineResult, Resolution,
    Value, ValueFactory,
};

/// One scripted step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Call the function registered under this canonical signature.
    Call(String, Vec<Value>),
    /// Ask the importer about this URL.
    Import(String),
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    steps: Vec<Step>,
    failure: Option<(i32, String)>,
    pub invocations: AtomicUsize,
    pub results: Mutex<Vec<Value>>,
    pub resolutions: Mutex<Vec<Resolution>>,
    pub entry_points: Mutex<Vec<&'static str>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(mut self, signature: &str, args: Vec<Value>) -> Self {
        self.steps.push(Step::Call(signature.to_string(), args));
        self
    }

    pub fn import(mut self, url: &str) -> Self {
        self.steps.push(Step::Import(url.to_string()));
        self
    }

    /// Fail every run with this status and raw message.
    pub fn failing(mut self, status: i32, raw: &str) -> Self {
        self.failure = Some((status, raw.to_string()));
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> Vec<Value> {
        self.results.lock().unwrap().clone()
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        self.resolutions.lock().unwrap().clone()
    }

    pub fn entry_points(&self) -> Vec<&'static str> {
        self.entry_points.lock().unwrap().clone()
    }

    fn begin(&self, entry_point: &'static str) -> Result<(), EngineFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.entry_points.lock().unwrap().push(entry_point);
        match &self.failure {
            Some((status, raw)) => Err(EngineFailure::new(*status, raw.clone())),
            None => Ok(()),
        }
    }

    fn lookup<'a>(
        request: &EngineRequest<'a>,
        signature: &str,
    ) -> Result<&'a sass_bridge::AdaptedFunction, EngineFailure> {
        request.functions().get(signature).ok_or_else(|| {
            EngineFailure::from_error(&CompileError::new(format!(
                "no function registered as {}",
                signature
            )))
        })
    }

    /// Record a function result; error values fail the compile like a real
    /// engine would.
    fn record_result(&self, css: &mut Vec<String>, value: Value) -> Result<(), EngineFailure> {
        self.results.lock().unwrap().push(value.clone());
        if let Value::Error(message) = value {
            return Err(EngineFailure::from_error(&CompileError::new(message).with_code(1)));
        }
        css.push(format!("out: {};", value));
        Ok(())
    }

    fn record_resolution(
        &self,
        css: &mut Vec<String>,
        included: &mut Vec<PathBuf>,
        resolution: Resolution,
    ) -> Result<(), EngineFailure> {
        self.resolutions.lock().unwrap().push(resolution.clone());
        match resolution {
            Resolution::Resolved(result) => {
                if let Some(file) = result.file() {
                    included.push(file.to_path_buf());
                }
                if let Some(contents) = result.contents() {
                    css.push(contents.to_string());
                }
                Ok(())
            }
            Resolution::Fallthrough => Ok(()),
            Resolution::Failed(error) => Err(EngineFailure::from_error(&error)),
        }
    }

    fn included(request: &EngineRequest<'_>, file_mode: bool) -> Vec<PathBuf> {
        match (file_mode, request.file()) {
            (true, Some(file)) => vec![file.to_path_buf()],
            _ => Vec::new(),
        }
    }

    fn finish(css: Vec<String>, included_files: Vec<PathBuf>) -> EngineResult {
        Ok(EngineOutput {
            css: css.join("\n"),
            map: None,
            included_files,
        })
    }

    fn run_sync(&self, request: &EngineRequest<'_>, file_mode: bool) -> EngineResult {
        let mut css = Vec::new();
        let mut included = Self::included(request, file_mode);
        for step in &self.steps {
            match step {
                Step::Call(signature, args) => {
                    let function = Self::lookup(request, signature)?;
                    let value = function.call_sync(args.clone());
                    self.record_result(&mut css, value)?;
                }
                Step::Import(url) => {
                    let Some(importer) = request.importer() else {
                        continue;
                    };
                    let resolution = importer.resolve_sync(url, &request.entry_prev());
                    self.record_resolution(&mut css, &mut included, resolution)?;
                }
            }
        }
        Self::finish(css, included)
    }

    async fn run_async(&self, request: &EngineRequest<'_>, file_mode: bool) -> EngineResult {
        let mut css = Vec::new();
        let mut included = Self::included(request, file_mode);
        for step in &self.steps {
            match step {
                Step::Call(signature, args) => {
                    let function = Self::lookup(request, signature)?;
                    let value = function.call(args.clone()).await;
                    self.record_result(&mut css, value)?;
                }
                Step::Import(url) => {
                    let Some(importer) = request.importer() else {
                        continue;
                    };
                    let resolution = importer.resolve(url, &request.entry_prev()).await;
                    self.record_resolution(&mut css, &mut included, resolution)?;
                }
            }
        }
        Self::finish(css, included)
    }
}

#[async_trait]
impl Engine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn version(&self) -> &str {
        "0.0.0"
    }

    async fn render(&self, request: &EngineRequest<'_>, _values: &ValueFactory) -> EngineResult {
        self.begin("render")?;
        self.run_async(request, false).await
    }

    async fn render_file(
        &self,
        request: &EngineRequest<'_>,
        _values: &ValueFactory,
    ) -> EngineResult {
        self.begin("render_file")?;
        self.run_async(request, true).await
    }

    fn render_sync(&self, request: &EngineRequest<'_>, _values: &ValueFactory) -> EngineResult {
        self.begin("render_sync")?;
        self.run_sync(request, false)
    }

    fn render_file_sync(
        &self,
        request: &EngineRequest<'_>,
        _values: &ValueFactory,
    ) -> EngineResult {
        self.begin("render_file_sync")?;
        self.run_sync(request, true)
    }
}
