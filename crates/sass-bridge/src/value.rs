/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Typed Sass values exchanged between the engine and extension functions.
 */

//! Typed Sass values exchanged between the engine and extension functions.
//!
//! Values are plain owned data, with one exception: booleans and null are
//! process-wide singletons. [`TRUE`], [`FALSE`] and [`NULL`] are the only
//! instances that will ever exist, so a `Value::Boolean` or `Value::Null`
//! always points at one of those statics and two of them can be compared by
//! address with [`Value::is_identical`].

use std::fmt;

use thiserror::Error;

/// Errors raised by value constructors, getters and setters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Out of bound index")]
    OutOfBounds { index: usize, len: usize },

    #[error("Cannot construct a new {0} value; use the shared instance")]
    SingletonConstruction(&'static str),

    #[error("Color channel {channel} out of range: {value}")]
    ChannelOutOfRange { channel: &'static str, value: f64 },
}

/// The Sass boolean type. Only [`TRUE`] and [`FALSE`] exist.
#[derive(Debug, PartialEq, Eq)]
pub struct SassBoolean {
    value: bool,
}

/// The Sass null type. Only [`NULL`] exists.
#[derive(Debug, PartialEq, Eq)]
pub struct SassNull {
    _private: (),
}

pub static TRUE: SassBoolean = SassBoolean { value: true };
pub static FALSE: SassBoolean = SassBoolean { value: false };
pub static NULL: SassNull = SassNull { _private: () };

impl SassBoolean {
    /// Always fails: booleans are shared. Use [`SassBoolean::of`] instead.
    pub fn new(_value: bool) -> Result<Self, ValueError> {
        Err(ValueError::SingletonConstruction("boolean"))
    }

    /// The shared instance for `value`.
    pub fn of(value: bool) -> &'static SassBoolean {
        if value { &TRUE } else { &FALSE }
    }

    pub fn value(&self) -> bool {
        self.value
    }
}

impl SassNull {
    /// Always fails: null is shared. Use [`Value::null`] instead.
    pub fn new() -> Result<Self, ValueError> {
        Err(ValueError::SingletonConstruction("null"))
    }
}

/// A number with an optional unit (`42px`, `1.5`, `100%`).
#[derive(Debug, Clone, PartialEq)]
pub struct SassNumber {
    value: f64,
    unit: String,
}

impl SassNumber {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }
}

/// A quoted or unquoted string. Quotes, if any, are part of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SassString {
    value: String,
}

impl SassString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }
}

/// An RGBA color. Channels are 0-255, alpha is 0-1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SassColor {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
}

impl Default for SassColor {
    fn default() -> Self {
        Self {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    }
}

impl SassColor {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Build a color from a packed `0xAARRGGBB` integer.
    pub fn from_argb(argb: u32) -> Self {
        Self {
            r: f64::from((argb >> 16) & 0xff),
            g: f64::from((argb >> 8) & 0xff),
            b: f64::from(argb & 0xff),
            a: f64::from((argb >> 24) & 0xff) / 255.0,
        }
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn set_r(&mut self, r: f64) -> Result<(), ValueError> {
        self.r = check_channel("red", r, 255.0)?;
        Ok(())
    }

    pub fn set_g(&mut self, g: f64) -> Result<(), ValueError> {
        self.g = check_channel("green", g, 255.0)?;
        Ok(())
    }

    pub fn set_b(&mut self, b: f64) -> Result<(), ValueError> {
        self.b = check_channel("blue", b, 255.0)?;
        Ok(())
    }

    pub fn set_a(&mut self, a: f64) -> Result<(), ValueError> {
        self.a = check_channel("alpha", a, 1.0)?;
        Ok(())
    }
}

fn check_channel(channel: &'static str, value: f64, max: f64) -> Result<f64, ValueError> {
    if (0.0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValueError::ChannelOutOfRange { channel, value })
    }
}

/// An ordered list with either a comma or a space separator.
#[derive(Debug, Clone, PartialEq)]
pub struct SassList {
    values: Vec<Value>,
    comma: bool,
}

impl SassList {
    pub fn new(values: Vec<Value>, comma: bool) -> Self {
        Self { values, comma }
    }

    /// A list of `len` null entries, to be filled with [`SassList::set`].
    pub fn with_len(len: usize, comma: bool) -> Self {
        Self {
            values: vec![Value::null(); len],
            comma,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_comma_separated(&self) -> bool {
        self.comma
    }

    pub fn set_comma_separated(&mut self, comma: bool) {
        self.comma = comma;
    }

    pub fn get(&self, index: usize) -> Result<&Value, ValueError> {
        self.values.get(index).ok_or(ValueError::OutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ValueError::OutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// An ordered map. Keys are values too; insertion order is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SassMap {
    entries: Vec<(Value, Value)>,
}

impl SassMap {
    pub fn new(entries: Vec<(Value, Value)>) -> Self {
        Self { entries }
    }

    /// A map of `len` null/null entries, to be filled by index.
    pub fn with_len(len: usize) -> Self {
        Self {
            entries: vec![(Value::null(), Value::null()); len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key(&self, index: usize) -> Result<&Value, ValueError> {
        self.entry(index).map(|(k, _)| k)
    }

    pub fn value(&self, index: usize) -> Result<&Value, ValueError> {
        self.entry(index).map(|(_, v)| v)
    }

    pub fn set_key(&mut self, index: usize, key: Value) -> Result<(), ValueError> {
        self.entry_mut(index)?.0 = key;
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        self.entry_mut(index)?.1 = value;
        Ok(())
    }

    /// Look a value up by key (structural comparison).
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    fn entry(&self, index: usize) -> Result<&(Value, Value), ValueError> {
        self.entries.get(index).ok_or(ValueError::OutOfBounds {
            index,
            len: self.entries.len(),
        })
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut (Value, Value), ValueError> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(ValueError::OutOfBounds { index, len })
    }
}

/// A Sass value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(SassNumber),
    String(SassString),
    Color(SassColor),
    Boolean(&'static SassBoolean),
    List(SassList),
    Map(SassMap),
    Null(&'static SassNull),
    /// Returned by an extension function to fail the current compilation.
    Error(String),
}

impl Value {
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Value::Number(SassNumber::new(value, unit))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(SassString::new(value))
    }

    pub fn boolean(value: bool) -> Self {
        Value::Boolean(SassBoolean::of(value))
    }

    pub fn null() -> Self {
        Value::Null(&NULL)
    }

    pub fn list(values: Vec<Value>, comma: bool) -> Self {
        Value::List(SassList::new(values, comma))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(b.value()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&SassNumber> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SassList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Booleans and null compare by address of their shared instance; every
    /// other kind is never identical to anything but itself.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => std::ptr::eq(*a, *b),
            (Value::Null(a), Value::Null(b)) => std::ptr::eq(*a, *b),
            _ => std::ptr::eq(self, other),
        }
    }

    /// Sass truthiness: everything except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null(_)) && self.as_bool() != Some(false)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Color(_) => "color",
            Value::Boolean(_) => "bool",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Null(_) => "null",
            Value::Error(_) => "error",
        }
    }
}

impl From<&'static SassBoolean> for Value {
    fn from(b: &'static SassBoolean) -> Self {
        Value::Boolean(b)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::boolean(b)
    }
}

impl From<SassNumber> for Value {
    fn from(n: SassNumber) -> Self {
        Value::Number(n)
    }
}

impl From<SassString> for Value {
    fn from(s: SassString) -> Self {
        Value::String(s)
    }
}

impl From<SassColor> for Value {
    fn from(c: SassColor) -> Self {
        Value::Color(c)
    }
}

impl From<SassList> for Value {
    fn from(l: SassList) -> Self {
        Value::List(l)
    }
}

impl From<SassMap> for Value {
    fn from(m: SassMap) -> Self {
        Value::Map(m)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}{}", n.value, n.unit),
            Value::String(s) => write!(f, "{}", s.value),
            Value::Color(c) => {
                if c.a >= 1.0 {
                    write!(f, "rgb({}, {}, {})", c.r, c.g, c.b)
                } else {
                    write!(f, "rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b.value),
            Value::List(l) => {
                let sep = if l.comma { ", " } else { " " };
                let parts: Vec<String> = l.values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(sep))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "({})", parts.join(", "))
            }
            Value::Null(_) => write!(f, "null"),
            Value::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// The value-construction capability handed to engines.
///
/// There is one of these per process; [`ValueFactory::global`] returns it.
/// Engines use it to build arguments for extension functions and to hand
/// out the shared boolean and null instances.
#[derive(Debug)]
pub struct ValueFactory {
    _private: (),
}

static FACTORY: ValueFactory = ValueFactory { _private: () };

impl ValueFactory {
    pub fn global() -> &'static ValueFactory {
        &FACTORY
    }

    pub fn number(&self, value: f64, unit: &str) -> Value {
        Value::number(value, unit)
    }

    pub fn string(&self, value: &str) -> Value {
        Value::string(value)
    }

    pub fn color(&self, r: f64, g: f64, b: f64, a: f64) -> Value {
        Value::Color(SassColor::rgba(r, g, b, a))
    }

    pub fn boolean(&self, value: bool) -> Value {
        Value::boolean(value)
    }

    pub fn null(&self) -> Value {
        Value::null()
    }

    pub fn list(&self, values: Vec<Value>, comma: bool) -> Value {
        Value::list(values, comma)
    }

    pub fn map(&self, entries: Vec<(Value, Value)>) -> Value {
        Value::Map(SassMap::new(entries))
    }

    pub fn error(&self, message: &str) -> Value {
        Value::error(message)
    }
}
