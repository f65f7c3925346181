/*
 * function.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Extension functions: signature normalization and invocation wrapping.
 */

//! Extension functions: signature normalization and invocation wrapping.
//!
//! Callers register functions under a signature such as `"double($n)"`.
//! A bare name (`"double"`) is accepted as shorthand for the variadic
//! `"double(...)"`; the engine then passes the arguments as a single list,
//! which the adapter unpacks so the callback still sees one argument per
//! value.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{trace, warn};

use crate::completion::{CompletionMode, Done, Pending, Settled};
use crate::error::{CompileError, ConfigError, Thrown};
use crate::value::Value;

static CALL_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[A-Za-z_][\w-]*\(.*\)$").expect("valid regex"));
static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*|@warn|@error|@debug)$").expect("valid regex"));
static BARE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[A-Za-z_][\w-]*$").expect("valid regex"));

type FunctionCallback =
    dyn Fn(Vec<Value>, Done<Value>) -> Result<Option<Value>, Thrown> + Send + Sync;

/// A user-supplied extension function.
#[derive(Clone)]
pub struct SassFunction {
    callback: Arc<FunctionCallback>,
}

impl std::fmt::Debug for SassFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SassFunction(..)")
    }
}

impl SassFunction {
    /// A function that always returns its result.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |args, _done| f(args).map(Some)),
        }
    }

    /// A function that may return `None` and report its result later
    /// through the [`Done`] handle. Deferred results are only waited for
    /// in asynchronous compiles.
    pub fn with_done<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, Done<Value>) -> Result<Option<Value>, Thrown> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(f),
        }
    }
}

/// A signature in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    text: String,
    shorthand: bool,
}

impl Signature {
    /// Canonicalize a declared signature.
    ///
    /// Call forms and directives pass through unchanged; a bare name becomes
    /// `name(...)`. Anything else is rejected.
    pub fn parse(declared: &str) -> Result<Self, ConfigError> {
        if CALL_FORM.is_match(declared) || DIRECTIVE.is_match(declared) {
            return Ok(Self {
                text: declared.to_string(),
                shorthand: false,
            });
        }
        if BARE_NAME.is_match(declared) {
            return Ok(Self {
                text: format!("{}(...)", declared),
                shorthand: true,
            });
        }
        Err(ConfigError::InvalidSignature(declared.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether this signature was expanded from a bare name.
    pub fn is_shorthand(&self) -> bool {
        self.shorthand
    }
}

/// An extension function in the form the engine invokes it.
#[derive(Debug, Clone)]
pub struct AdaptedFunction {
    signature: Signature,
    function: SassFunction,
    mode: CompletionMode,
}

impl AdaptedFunction {
    pub fn adapt(
        declared: &str,
        function: SassFunction,
        mode: CompletionMode,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            signature: Signature::parse(declared)?,
            function,
            mode,
        })
    }

    pub fn signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    /// Invoke from a synchronous compile. Only an immediate result counts.
    pub fn call_sync(&self, args: Vec<Value>) -> Value {
        let (pending, returned) = match self.start(args) {
            Ok(started) => started,
            Err(error) => return error,
        };
        self.finish(pending.settle_now(returned))
    }

    /// Invoke from an asynchronous compile, honouring the adapter's mode.
    pub async fn call(&self, args: Vec<Value>) -> Value {
        let (pending, returned) = match self.start(args) {
            Ok(started) => started,
            Err(error) => return error,
        };
        self.finish(pending.settle_with(self.mode, returned).await)
    }

    /// Run the user callback, converting failures into an error value.
    fn start(&self, args: Vec<Value>) -> Result<(Pending<Value>, Option<Value>), Value> {
        let args = if self.signature.is_shorthand() {
            unpack_arguments(args)
        } else {
            args
        };
        trace!(signature = %self.signature(), argc = args.len(), "invoking extension function");

        let pending = Pending::new(self.signature());
        let done = pending.handle();
        let callback = &self.function.callback;
        match catch_unwind(AssertUnwindSafe(|| callback(args, done))) {
            Ok(Ok(returned)) => Ok((pending, returned)),
            Ok(Err(thrown)) => Err(self.fail(CompileError::from_thrown(thrown))),
            Err(payload) => Err(self.fail(CompileError::from_panic(payload))),
        }
    }

    fn finish(&self, settled: Settled<Value>) -> Value {
        match settled {
            Settled::Value(value) => value,
            Settled::Nothing => {
                let message = match self.mode {
                    CompletionMode::Immediate => format!(
                        "{} did not return a value; deferred completion is not available in synchronous compiles",
                        self.signature()
                    ),
                    CompletionMode::Signalled => {
                        format!("{} did not return a value", self.signature())
                    }
                };
                warn!(signature = %self.signature(), "{}", message);
                Value::error(message)
            }
        }
    }

    fn fail(&self, error: CompileError) -> Value {
        warn!(signature = %self.signature(), error = %error.message, "extension function failed");
        Value::error(error.message)
    }
}

/// The engine passes a variadic argument list as one list value followed by
/// nothing else; spread it back into positional arguments.
fn unpack_arguments(mut args: Vec<Value>) -> Vec<Value> {
    if args.is_empty() {
        return args;
    }
    match args.remove(0) {
        Value::List(list) => {
            let mut unpacked = list.into_values();
            unpacked.extend(args);
            unpacked
        }
        other => {
            args.insert(0, other);
            args
        }
    }
}

/// Adapted functions keyed by canonical signature.
pub type FunctionTable = BTreeMap<String, AdaptedFunction>;

/// Adapt every declared function, failing on the first bad signature.
pub fn adapt_functions(
    declared: &[(String, SassFunction)],
    mode: CompletionMode,
) -> Result<FunctionTable, ConfigError> {
    let mut table = FunctionTable::new();
    for (signature, function) in declared {
        let adapted = AdaptedFunction::adapt(signature, function.clone(), mode)?;
        table.insert(adapted.signature().to_string(), adapted);
    }
    Ok(table)
}
