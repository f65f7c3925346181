/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The public compile entry points.
 */

//! The public compile entry points.
//!
//! [`Compiler::compile`] and [`Compiler::compile_sync`] normalize the
//! options, pick the engine entry point (inline content wins over a file),
//! and turn whatever the engine reports into an [`Output`] or a
//! [`CompileError`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::completion::CompletionMode;
use crate::engine::{Engine, EngineRequest, EngineResult, GrassEngine};
use crate::error::{BridgeError, CompileError, ConfigError};
use crate::normalize::{ResponseHandlers, normalize};
use crate::options::Options;
use crate::stats::Stats;
use crate::value::ValueFactory;

/// Version of this crate, reported by [`Compiler::info`].
pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The response of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub css: String,
    pub map: Option<String>,
    pub stats: Stats,
}

/// Versions of the bridge and of the engine behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub bridge: String,
    pub engine: String,
    pub engine_version: String,
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sass-bridge\t{}\t(Wrapper)\t[Rust]", self.bridge)?;
        write!(f, "{}\t{}\t(Sass Compiler)\t[Rust]", self.engine, self.engine_version)
    }
}

/// Compiles style sheets through an [`Engine`].
#[derive(Debug)]
pub struct Compiler<E> {
    engine: Arc<E>,
}

impl<E> Clone for Compiler<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl Default for Compiler<GrassEngine> {
    fn default() -> Self {
        Self::new(GrassEngine::new())
    }
}

impl<E: Engine + 'static> Compiler<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn info(&self) -> Info {
        Info {
            bridge: BRIDGE_VERSION.to_string(),
            engine: self.engine.name().to_string(),
            engine_version: self.engine.version().to_string(),
        }
    }

    /// Compile asynchronously.
    ///
    /// Options are normalized before this returns, so configuration errors
    /// come back here and never through the future. Extension functions
    /// and importers may answer through their completion handle.
    pub fn compile(
        &self,
        options: Options,
    ) -> Result<impl Future<Output = Result<Output, CompileError>> + Send + use<E>, ConfigError>
    {
        let (config, handlers) = normalize(options, CompletionMode::Signalled)?;
        let engine = Arc::clone(&self.engine);

        Ok(async move {
            let values = ValueFactory::global();
            let result = {
                let request = EngineRequest::new(&config);
                if request.data().is_some() {
                    debug!(engine = engine.name(), "rendering inline content");
                    engine.render(&request, values).await
                } else {
                    debug!(engine = engine.name(), "rendering file");
                    engine.render_file(&request, values).await
                }
            };
            respond(handlers, config.stats, result)
        })
    }

    /// Compile synchronously. Extension functions and importers must answer
    /// by returning.
    pub fn compile_sync(&self, options: Options) -> Result<Output, BridgeError> {
        let (config, handlers) = normalize(options, CompletionMode::Immediate)?;
        let values = ValueFactory::global();
        let result = {
            let request = EngineRequest::new(&config);
            if request.data().is_some() {
                debug!(engine = self.engine.name(), "rendering inline content synchronously");
                self.engine.render_sync(&request, values)
            } else {
                debug!(engine = self.engine.name(), "rendering file synchronously");
                self.engine.render_file_sync(&request, values)
            }
        };
        Ok(respond(handlers, config.stats, result)?)
    }
}

fn respond(
    handlers: ResponseHandlers,
    stats: Stats,
    result: EngineResult,
) -> Result<Output, CompileError> {
    match result {
        Ok(engine_output) => {
            let output = handlers.success(stats, engine_output);
            info!(
                entry = %output.stats.entry,
                duration_ms = output.stats.duration,
                included = output.stats.included_files.len(),
                "compiled"
            );
            Ok(output)
        }
        Err(failure) => {
            let error = handlers.error(&failure.error_json, failure.status);
            warn!(
                entry = %stats.entry,
                code = error.code,
                error = %error.message,
                "compile failed"
            );
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        let info = Compiler::default().info();
        assert_eq!(info.engine, "grass");
        assert_eq!(info.bridge, BRIDGE_VERSION);
        let text = info.to_string();
        assert!(text.starts_with("sass-bridge\t"));
        assert!(text.contains("grass\t"));
    }

    #[test]
    fn test_compile_sync_config_error() {
        let err = Compiler::default()
            .compile_sync(Options::default())
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(ConfigError::NoInput)));
    }

    #[test]
    fn test_compile_config_error_is_eager() {
        let options = Options::default().data("a{}").function(
            "not a signature!",
            crate::SassFunction::new(|_| Ok(crate::Value::null())),
        );
        assert!(Compiler::default().compile(options).is_err());
    }

    #[tokio::test]
    async fn test_compile_async() {
        let output = Compiler::default()
            .compile(Options::default().data(".a { b: c; }"))
            .unwrap()
            .await
            .unwrap();
        assert!(output.css.contains(".a"));
        assert!(output.stats.is_finished());
    }
}
