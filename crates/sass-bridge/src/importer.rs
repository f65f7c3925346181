/*
 * importer.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Custom import resolution.
 */

//! Custom import resolution.
//!
//! An importer sees every `@import` the engine encounters, as
//! `(url, prev, done)`: the requested URL, the path of the importing file
//! (or `stdin` for inline content), and a completion handle. It answers with
//! a path, inline contents, or both. Answering nothing lets the engine
//! resolve the import itself.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::completion::{CompletionMode, Done, Pending, Settled};
use crate::error::{CompileError, STATUS_ERROR, Thrown};

/// What an importer resolved an import to. Passed to the engine verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResult {
    /// Load this file instead.
    File(PathBuf),
    /// Use these contents; no file path is associated.
    Contents(String),
    /// Use these contents, reported under this path.
    FileAndContents { file: PathBuf, contents: String },
}

impl ImportResult {
    pub fn file(&self) -> Option<&Path> {
        match self {
            ImportResult::File(file) | ImportResult::FileAndContents { file, .. } => Some(file),
            ImportResult::Contents(_) => None,
        }
    }

    pub fn contents(&self) -> Option<&str> {
        match self {
            ImportResult::Contents(contents) | ImportResult::FileAndContents { contents, .. } => {
                Some(contents)
            }
            ImportResult::File(_) => None,
        }
    }
}

/// Outcome of asking the importer about one import.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ImportResult),
    /// The importer had no answer; use the engine's default resolution.
    Fallthrough,
    /// The importer failed. The error carries a status code.
    Failed(CompileError),
}

type ImporterCallback =
    dyn Fn(&str, &str, Done<ImportResult>) -> Result<Option<ImportResult>, Thrown> + Send + Sync;

/// A user-supplied import resolver.
#[derive(Clone)]
pub struct Importer {
    callback: Arc<ImporterCallback>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Importer(..)")
    }
}

impl Importer {
    /// An importer that always answers by returning.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Option<ImportResult>, Thrown> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |url, prev, _done| f(url, prev)),
        }
    }

    /// An importer that may answer later through the [`Done`] handle.
    pub fn with_done<F>(f: F) -> Self
    where
        F: Fn(&str, &str, Done<ImportResult>) -> Result<Option<ImportResult>, Thrown>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Arc::new(f),
        }
    }
}

/// An importer in the form the engine invokes it.
#[derive(Debug, Clone)]
pub struct AdaptedImporter {
    importer: Importer,
    mode: CompletionMode,
}

impl AdaptedImporter {
    pub fn new(importer: Importer, mode: CompletionMode) -> Self {
        Self { importer, mode }
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    /// Resolve from a synchronous compile.
    pub fn resolve_sync(&self, url: &str, prev: &str) -> Resolution {
        match self.start(url, prev) {
            Ok((pending, returned)) => finish(url, pending.settle_now(returned)),
            Err(failed) => failed,
        }
    }

    /// Resolve from an asynchronous compile, honouring the adapter's mode.
    pub async fn resolve(&self, url: &str, prev: &str) -> Resolution {
        match self.start(url, prev) {
            Ok((pending, returned)) => finish(url, pending.settle_with(self.mode, returned).await),
            Err(failed) => failed,
        }
    }

    fn start(
        &self,
        url: &str,
        prev: &str,
    ) -> Result<(Pending<ImportResult>, Option<ImportResult>), Resolution> {
        let pending = Pending::new(url);
        let done = pending.handle();
        let callback = &self.importer.callback;
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(url, prev, done)));
        let error = match outcome {
            Ok(Ok(returned)) => return Ok((pending, returned)),
            Ok(Err(thrown)) => CompileError::from_thrown(thrown),
            Err(payload) => CompileError::from_panic(payload),
        };
        warn!(url, prev, error = %error.message, "importer failed");
        Err(Resolution::Failed(error.with_code(STATUS_ERROR)))
    }
}

fn finish(url: &str, settled: Settled<ImportResult>) -> Resolution {
    match settled {
        Settled::Value(result) => {
            debug!(url, ?result, "import resolved by importer");
            Resolution::Resolved(result)
        }
        Settled::Nothing => {
            debug!(url, "importer had no answer; falling through");
            Resolution::Fallthrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_only_passes_through() {
        let importer = AdaptedImporter::new(
            Importer::new(|_, _| Ok(Some(ImportResult::Contents("div{color:yellow}".into())))),
            CompletionMode::Immediate,
        );
        let resolution = importer.resolve_sync("foo", "stdin");
        assert_eq!(
            resolution,
            Resolution::Resolved(ImportResult::Contents("div{color:yellow}".into()))
        );
        if let Resolution::Resolved(result) = resolution {
            assert_eq!(result.file(), None);
        }
    }

    #[test]
    fn test_receives_url_and_prev() {
        let importer = AdaptedImporter::new(
            Importer::new(|url, prev| {
                Ok(Some(ImportResult::FileAndContents {
                    file: PathBuf::from(format!("/{}/{}", prev, url)),
                    contents: String::new(),
                }))
            }),
            CompletionMode::Immediate,
        );
        match importer.resolve_sync("bar", "stdin") {
            Resolution::Resolved(result) => {
                assert_eq!(result.file(), Some(Path::new("/stdin/bar")));
                assert_eq!(result.contents(), Some(""));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nothing_falls_through() {
        let importer =
            AdaptedImporter::new(Importer::new(|_, _| Ok(None)), CompletionMode::Immediate);
        assert_eq!(importer.resolve_sync("foo", "stdin"), Resolution::Fallthrough);
    }

    #[test]
    fn test_failure_is_translated() {
        let importer = AdaptedImporter::new(
            Importer::new(|_, _| Err(Thrown::from("no such theme"))),
            CompletionMode::Immediate,
        );
        match importer.resolve_sync("foo", "stdin") {
            Resolution::Failed(err) => {
                assert_eq!(err.message, "no such theme");
                assert_eq!(err.code, Some(STATUS_ERROR));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_done_handle_resolves_async() {
        let importer = AdaptedImporter::new(
            Importer::with_done(|url, _, done| {
                let file = PathBuf::from(format!("/virtual/{}.scss", url));
                tokio::spawn(async move {
                    done.resolve(ImportResult::File(file));
                });
                Ok(None)
            }),
            CompletionMode::Signalled,
        );
        assert_eq!(
            importer.resolve("theme", "stdin").await,
            Resolution::Resolved(ImportResult::File(PathBuf::from("/virtual/theme.scss")))
        );
    }

    #[tokio::test]
    async fn test_dropped_handle_falls_through() {
        let importer = AdaptedImporter::new(
            Importer::with_done(|_, _, done| {
                drop(done);
                Ok(None)
            }),
            CompletionMode::Signalled,
        );
        assert_eq!(importer.resolve("x", "stdin").await, Resolution::Fallthrough);
    }
}
