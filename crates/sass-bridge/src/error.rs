/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types and the translation of callback and engine failures.
 */

//! Error types and the translation of callback and engine failures.
//!
//! There are three kinds of failure:
//!
//! - [`ConfigError`]: bad options, raised while normalizing, before any
//!   engine work starts.
//! - Callback failures: an extension function or importer returned a
//!   [`Thrown`] or panicked. These are converted with [`CompileError::from_thrown`]
//!   / [`CompileError::from_panic`] and never escape as raw panics.
//! - Engine failures: the compilation itself failed. The engine reports a
//!   status code and a message that may be JSON; [`CompileError::from_engine`]
//!   normalizes it.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::ValueError;

/// Message used when a callback fails with something that carries no message.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Status code attached to failures the bridge reports on the engine's behalf.
pub const STATUS_ERROR: i32 = 1;

/// Errors raised while normalizing options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid function signature format \"{0}\"")]
    InvalidSignature(String),

    #[error("`imagePath` needs to be a string")]
    ImagePathNotString,

    #[error("`{field}` needs to be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Options need to be an object")]
    NotAnObject,

    #[error("Neither `data` nor `file` was given")]
    NoInput,
}

/// A failure raised by a user callback.
///
/// The variants mirror what a callback can fail with: a bare message, a
/// structured error, or an arbitrary payload that carries no message.
pub enum Thrown {
    Message(String),
    Error(Box<dyn std::error::Error + Send + Sync>),
    Other(Box<dyn Any + Send>),
}

impl Thrown {
    pub fn message(message: impl Into<String>) -> Self {
        Thrown::Message(message.into())
    }

    pub fn error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Thrown::Error(Box::new(error))
    }

    pub fn other(payload: impl Any + Send) -> Self {
        Thrown::Other(Box::new(payload))
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thrown::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Thrown::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Thrown::Other(_) => f.write_str("Other(..)"),
        }
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Thrown::Message(message)
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Thrown::Message(message.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Thrown {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Thrown::Error(error)
    }
}

impl From<ValueError> for Thrown {
    fn from(error: ValueError) -> Self {
        Thrown::error(error)
    }
}

/// The normalized failure shape delivered to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,

    /// Status code. Always set on errors returned from a compile; unset only
    /// in the intermediate result of translating a callback failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Engine-formatted message with source excerpt, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

/// The JSON shape engines use to report failures.
#[derive(Debug, Deserialize)]
struct EngineErrorJson {
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    formatted: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            line: None,
            column: None,
            file: None,
            formatted: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Translate a callback failure. The code is left for the caller to attach.
    pub fn from_thrown(thrown: Thrown) -> Self {
        match thrown {
            Thrown::Message(message) => Self::new(message),
            Thrown::Error(error) => Self::new(error.to_string()),
            Thrown::Other(_) => Self::new(UNEXPECTED_ERROR),
        }
    }

    /// Translate a panic payload caught around a callback.
    ///
    /// String payloads (what `panic!("...")` produces) keep their message;
    /// anything else degrades to the generic message.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<String>() {
            Ok(message) => Self::new(*message),
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => Self::new(*message),
                Err(_) => Self::new(UNEXPECTED_ERROR),
            },
        }
    }

    /// Translate an engine report: structured JSON when it parses, plain
    /// text otherwise. The engine's status is always attached.
    pub fn from_engine(raw: &str, status: i32) -> Self {
        let error = match serde_json::from_str::<EngineErrorJson>(raw) {
            Ok(json) => Self {
                message: json.message,
                code: None,
                line: json.line,
                column: json.column,
                file: json.file,
                formatted: json.formatted,
            },
            Err(_) => Self::new(raw),
        };
        error.with_code(status)
    }

    /// Encode as the JSON shape engines report, for engines that need to
    /// forward a bridge-side failure.
    pub fn to_engine_json(&self) -> String {
        serde_json::json!({
            "status": self.code.unwrap_or(STATUS_ERROR),
            "message": self.message,
            "line": self.line,
            "column": self.column,
            "file": self.file,
            "formatted": self.formatted,
        })
        .to_string()
    }
}

/// Any failure of a synchronous compile.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}
