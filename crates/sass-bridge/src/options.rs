/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Caller-facing compile options.
 */

//! Caller-facing compile options.
//!
//! [`Options`] is the raw request a caller hands to the
//! [`Compiler`](crate::Compiler). It is built either with the chained
//! builder methods or from a loosely typed JSON bag with
//! [`Options::from_json`]. Nothing in here is interpreted yet; deriving
//! output paths, the style code, precision and so on happens once, in
//! [`normalize`](crate::normalize).
//!
//! # Example
//!
//! ```rust
//! use sass_bridge::Options;
//!
//! let options = Options::default()
//!     .data("div { color: red; }")
//!     .output_style("compressed")
//!     .include_path("node_modules");
//! ```

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::error::{CompileError, ConfigError};
use crate::function::SassFunction;
use crate::importer::Importer;
use crate::Output;

pub(crate) type SuccessHandler = Box<dyn FnOnce(&Output) + Send>;
pub(crate) type ErrorHandler = Box<dyn FnOnce(&CompileError) + Send>;

/// The `sourceMap` option as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceMapOption {
    #[default]
    Disabled,
    /// Emit a map next to the output file (or unnamed when there is none).
    Enabled,
    /// Emit a map at this path.
    Path(String),
}

/// Raw compile options.
#[derive(Default)]
pub struct Options {
    pub(crate) file: Option<PathBuf>,
    pub(crate) data: Option<String>,
    pub(crate) out_file: Option<String>,
    pub(crate) source_map: SourceMapOption,
    pub(crate) include_paths: Vec<PathBuf>,
    pub(crate) image_path: Option<String>,
    pub(crate) precision: Option<i64>,
    pub(crate) output_style: Option<String>,
    pub(crate) source_comments: bool,
    pub(crate) indented_syntax: bool,
    pub(crate) omit_source_map_url: bool,
    pub(crate) source_map_embed: bool,
    pub(crate) source_map_contents: bool,
    pub(crate) importer: Option<Importer>,
    pub(crate) functions: Vec<(String, SassFunction)>,
    pub(crate) on_success: Option<SuccessHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("file", &self.file)
            .field("data", &self.data.as_ref().map(|d| d.len()))
            .field("out_file", &self.out_file)
            .field("source_map", &self.source_map)
            .field("include_paths", &self.include_paths)
            .field("image_path", &self.image_path)
            .field("precision", &self.precision)
            .field("output_style", &self.output_style)
            .field("source_comments", &self.source_comments)
            .field("indented_syntax", &self.indented_syntax)
            .field("importer", &self.importer.is_some())
            .field(
                "functions",
                &self.functions.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Options {
    /// Compile this file (or, with [`Options::data`], use it as the base path).
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Compile this inline style sheet.
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn out_file(mut self, out_file: impl Into<String>) -> Self {
        self.out_file = Some(out_file.into());
        self
    }

    pub fn source_map(mut self, source_map: SourceMapOption) -> Self {
        self.source_map = source_map;
        self
    }

    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn include_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn image_path(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    pub fn precision(mut self, precision: i64) -> Self {
        self.precision = Some(precision);
        self
    }

    /// One of `nested`, `expanded`, `compact`, `compressed`. Anything else
    /// compiles as `nested`.
    pub fn output_style(mut self, style: impl Into<String>) -> Self {
        self.output_style = Some(style.into());
        self
    }

    pub fn source_comments(mut self, enabled: bool) -> Self {
        self.source_comments = enabled;
        self
    }

    pub fn indented_syntax(mut self, enabled: bool) -> Self {
        self.indented_syntax = enabled;
        self
    }

    pub fn omit_source_map_url(mut self, enabled: bool) -> Self {
        self.omit_source_map_url = enabled;
        self
    }

    pub fn source_map_embed(mut self, enabled: bool) -> Self {
        self.source_map_embed = enabled;
        self
    }

    pub fn source_map_contents(mut self, enabled: bool) -> Self {
        self.source_map_contents = enabled;
        self
    }

    pub fn importer(mut self, importer: Importer) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Register an extension function under `signature`.
    ///
    /// The signature is validated when the options are normalized.
    pub fn function(mut self, signature: impl Into<String>, function: SassFunction) -> Self {
        self.functions.push((signature.into(), function));
        self
    }

    /// Called once with the output of a successful compile.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Output) + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called once with the normalized error of a failed compile.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&CompileError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Build options from a loosely typed bag such as parsed JSON.
    ///
    /// Both historical spellings are accepted for `includePaths`,
    /// `imagePath`, `sourceComments` and `outputStyle`; the camelCase key
    /// wins when both are present. Values of the wrong type are dropped,
    /// except for `imagePath`, which must be a string when present.
    pub fn from_json(bag: &Json) -> Result<Self, ConfigError> {
        let bag = bag.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut options = Options::default();

        options.file = string_field(bag, "file").map(PathBuf::from);
        options.data = string_field(bag, "data");
        options.out_file = string_field(bag, "outFile");
        options.source_map = match bag.get("sourceMap") {
            Some(Json::String(path)) if !path.is_empty() => SourceMapOption::Path(path.clone()),
            Some(value) if truthy(value) => SourceMapOption::Enabled,
            _ => SourceMapOption::Disabled,
        };

        if let Some(paths) = legacy_field(bag, "includePaths", "include_paths") {
            let paths = paths.as_array().ok_or(ConfigError::InvalidField {
                field: "includePaths",
                expected: "an array of strings",
            })?;
            options.include_paths = paths
                .iter()
                .filter_map(Json::as_str)
                .map(PathBuf::from)
                .collect();
        }

        match legacy_field(bag, "imagePath", "image_path") {
            None | Some(Json::Null) => {}
            Some(Json::String(path)) => options.image_path = Some(path.clone()),
            Some(_) => return Err(ConfigError::ImagePathNotString),
        }

        options.precision = bag.get("precision").and_then(parse_precision);
        options.output_style = legacy_field(bag, "outputStyle", "output_style")
            .and_then(Json::as_str)
            .map(str::to_string);
        options.source_comments =
            legacy_field(bag, "sourceComments", "source_comments").is_some_and(truthy);
        options.indented_syntax = bag.get("indentedSyntax").is_some_and(truthy);
        options.omit_source_map_url = bag.get("omitSourceMapUrl").is_some_and(truthy);
        options.source_map_embed = bag.get("sourceMapEmbed").is_some_and(truthy);
        options.source_map_contents = bag.get("sourceMapContents").is_some_and(truthy);

        trace!(?options, "options read from bag");
        Ok(options)
    }
}

fn string_field(bag: &Map<String, Json>, key: &str) -> Option<String> {
    bag.get(key).and_then(Json::as_str).map(str::to_string)
}

/// The camelCase key if present (and not null), else the snake_case key.
fn legacy_field<'a>(bag: &'a Map<String, Json>, camel: &str, snake: &str) -> Option<&'a Json> {
    match bag.get(camel) {
        Some(value) if !value.is_null() => Some(value),
        _ => bag.get(snake),
    }
}

fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

/// Integer parsing with leading-digits semantics: `"12px"` is 12, `"abc"`
/// is nothing, numbers are truncated.
fn parse_precision(value: &Json) -> Option<i64> {
    match value {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Json::String(s) => parse_int_prefix(s),
        _ => None,
    }
}

pub(crate) fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_basic_fields() {
        let options = Options::from_json(&json!({
            "file": "/styles/main.scss",
            "outFile": "out.css",
            "sourceMap": true,
            "includePaths": ["a", "b"],
            "precision": 10,
            "outputStyle": "compressed",
        }))
        .unwrap();

        assert_eq!(options.file, Some(PathBuf::from("/styles/main.scss")));
        assert_eq!(options.out_file.as_deref(), Some("out.css"));
        assert_eq!(options.source_map, SourceMapOption::Enabled);
        assert_eq!(options.include_paths, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(options.precision, Some(10));
        assert_eq!(options.output_style.as_deref(), Some("compressed"));
    }

    #[test]
    fn test_from_json_camel_case_wins() {
        let options = Options::from_json(&json!({
            "include_paths": ["legacy"],
            "includePaths": ["modern"],
            "output_style": "compact",
            "outputStyle": "expanded",
            "image_path": "/old",
            "imagePath": "/new",
            "source_comments": false,
            "sourceComments": true,
        }))
        .unwrap();

        assert_eq!(options.include_paths, vec![PathBuf::from("modern")]);
        assert_eq!(options.output_style.as_deref(), Some("expanded"));
        assert_eq!(options.image_path.as_deref(), Some("/new"));
        assert!(options.source_comments);
    }

    #[test]
    fn test_from_json_snake_case_alone() {
        let options = Options::from_json(&json!({
            "include_paths": ["legacy"],
            "output_style": "compact",
        }))
        .unwrap();
        assert_eq!(options.include_paths, vec![PathBuf::from("legacy")]);
        assert_eq!(options.output_style.as_deref(), Some("compact"));
    }

    #[test]
    fn test_from_json_image_path_must_be_string() {
        let err = Options::from_json(&json!({ "data": "a{}", "imagePath": 12 })).unwrap_err();
        assert!(matches!(err, ConfigError::ImagePathNotString));

        let err = Options::from_json(&json!({ "image_path": ["x"] })).unwrap_err();
        assert!(matches!(err, ConfigError::ImagePathNotString));
    }

    #[test]
    fn test_from_json_non_string_out_file_ignored() {
        let options = Options::from_json(&json!({ "file": "a.scss", "outFile": 3 })).unwrap();
        assert_eq!(options.out_file, None);
    }

    #[test]
    fn test_from_json_source_map_string() {
        let options = Options::from_json(&json!({ "sourceMap": "maps/out.map" })).unwrap();
        assert_eq!(options.source_map, SourceMapOption::Path("maps/out.map".into()));

        let options = Options::from_json(&json!({ "sourceMap": false })).unwrap();
        assert_eq!(options.source_map, SourceMapOption::Disabled);
    }

    #[test]
    fn test_from_json_precision_parsing() {
        let p = |v: Json| Options::from_json(&json!({ "precision": v })).unwrap().precision;
        assert_eq!(p(json!("abc")), None);
        assert_eq!(p(json!("12px")), Some(12));
        assert_eq!(p(json!(7.9)), Some(7));
        assert_eq!(p(json!(true)), None);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            Options::from_json(&json!(["data"])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42"), Some(42));
        assert_eq!(parse_int_prefix("  -3em"), Some(-3));
        assert_eq!(parse_int_prefix("px"), None);
        assert_eq!(parse_int_prefix(""), None);
    }

    #[test]
    fn test_builder() {
        let options = Options::default()
            .data("a { b: c }")
            .include_paths(["x", "y"])
            .include_path("z")
            .function("foo", SassFunction::new(|_| Ok(crate::Value::null())));
        assert_eq!(options.include_paths.len(), 3);
        assert_eq!(options.functions.len(), 1);
        assert!(format!("{:?}", options).contains("foo"));
    }
}
