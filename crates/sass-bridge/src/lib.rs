//! A request/response bridge between callers and a Sass compilation engine.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The bridge normalizes loosely shaped compile options, adapts
//! caller-supplied extension functions and importers to the engine's
//! invocation protocol, and reports results, timing stats and failures in
//! one uniform shape, from both synchronous and asynchronous entry points.
//!
//! # Example
//!
//! ```rust,no_run
//! use sass_bridge::{Compiler, Options};
//!
//! let output = Compiler::default()
//!     .compile_sync(Options::default().data("$c: red; a { color: $c; }"))
//!     .unwrap();
//! println!("{}", output.css);
//! ```

pub mod completion;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod function;
pub mod importer;
pub mod normalize;
pub mod options;
pub mod stats;
pub mod value;

pub use completion::{CompletionMode, Done};
pub use compiler::{BRIDGE_VERSION, Compiler, Info, Output};
pub use engine::{
    Engine, EngineFailure, EngineOutput, EngineRequest, EngineResult, GrassEngine,
};
pub use error::{BridgeError, CompileError, ConfigError, Thrown};
pub use function::{AdaptedFunction, SassFunction, Signature};
pub use importer::{AdaptedImporter, ImportResult, Importer, Resolution};
pub use normalize::{
    ContentSource, NormalizedConfig, OutputStyle, SourceMapTarget, normalize,
};
pub use options::{Options, SourceMapOption};
pub use stats::Stats;
pub use value::{
    SassBoolean, SassColor, SassList, SassMap, SassNull, SassNumber, SassString, Value,
    ValueError, ValueFactory,
};
