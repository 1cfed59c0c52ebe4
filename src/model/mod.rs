// Copyright 2015-2024 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use num_bigint::BigInt;
use parking_lot::RwLock;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use url::Url;

pub mod deferred;
pub mod symbol;
pub mod time;

#[cfg(test)]
mod tests;

pub use deferred::{Completer, Deferred, Settled, Settlement};
pub use symbol::Symbol;
pub use time::Timestamp;

/// The core driftwire model type. A recursive data type whose graph may contain
/// shared sub-structure, cycles and deferred parts, all of which survive a trip
/// through the wire format.
///
/// Containers have heap identity: cloning a [`Value`] clones a handle, not the
/// contents, and the encoder deduplicates container occurrences by that
/// identity. Scalars are plain data and are encoded afresh at each use site.
#[derive(Clone, Debug)]
pub enum Value {
    /// A position that is present but carries nothing ("undefined").
    Absent,

    /// The unit null value.
    Null,

    /// A boolean wrapped as a [`Value`].
    Bool(bool),

    /// A double precision number. Non-finite values and negative zero are
    /// legal here and encode as singleton atoms.
    Number(f64),

    /// An arbitrary precision signed integer.
    BigInt(BigInt),

    /// A textual value.
    Text(String),

    /// A symbol, interned process-wide by name.
    Symbol(Symbol),

    /// A regular expression as written: source and flag string. The codec
    /// transports the pair verbatim and never compiles it.
    Pattern(Arc<Pattern>),

    /// A UTC instant with millisecond precision.
    Timestamp(Timestamp),

    /// An absolute URL, carried in its string form.
    Url(Arc<Url>),

    /// An ordered sequence in which positions may be absent (holes).
    Seq(SeqRef),

    /// A string-keyed mapping preserving insertion order.
    Record(RecordRef),

    /// A mapping whose keys are themselves values.
    Map(MapRef),

    /// A collection of unique values.
    Set(SetRef),

    /// A tagged error: a kind name and a message.
    Error(ErrorRef),

    /// An application-defined tagged record. Custom values have no built-in
    /// encoding; an encoder plugin must claim them.
    Custom(CustomRef),

    /// A value that settles later, as fulfilled or rejected.
    Deferred(Deferred),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ValueKind {
    Absent,
    Null,
    Boolean,
    Number,
    BigInt,
    Text,
    Symbol,
    Pattern,
    Timestamp,
    Url,
    Seq,
    Record,
    Map,
    Set,
    Error,
    Custom,
    Deferred,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Absent => write!(f, "Absent"),
            ValueKind::Null => write!(f, "Null"),
            ValueKind::Boolean => write!(f, "Boolean"),
            ValueKind::Number => write!(f, "Number"),
            ValueKind::BigInt => write!(f, "BigInt"),
            ValueKind::Text => write!(f, "Text"),
            ValueKind::Symbol => write!(f, "Symbol"),
            ValueKind::Pattern => write!(f, "Pattern"),
            ValueKind::Timestamp => write!(f, "Timestamp"),
            ValueKind::Url => write!(f, "Url"),
            ValueKind::Seq => write!(f, "Seq"),
            ValueKind::Record => write!(f, "Record"),
            ValueKind::Map => write!(f, "Map"),
            ValueKind::Set => write!(f, "Set"),
            ValueKind::Error => write!(f, "Error"),
            ValueKind::Custom => write!(f, "Custom"),
            ValueKind::Deferred => write!(f, "Deferred"),
        }
    }
}

impl Value {
    /// Create a text value from anything that can be converted to a [`String`].
    pub fn text<T: Into<String>>(text: T) -> Value {
        Value::Text(text.into())
    }

    pub fn number(value: f64) -> Value {
        Value::Number(value)
    }

    /// Create a symbol value, interning the name.
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn pattern<S: Into<String>, F: Into<String>>(source: S, flags: F) -> Value {
        Value::Pattern(Arc::new(Pattern::new(source, flags)))
    }

    pub fn url(url: Url) -> Value {
        Value::Url(Arc::new(url))
    }

    /// Create a sequence from fully present items.
    pub fn seq<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Seq(SeqRef::from_items(items.into_iter().map(Some)))
    }

    /// Create a record from key-value pairs, preserving order.
    pub fn record<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Value {
        let record = RecordRef::new();
        for (key, value) in entries {
            record.insert(key.into(), value);
        }
        Value::Record(record)
    }

    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Value {
        let map = MapRef::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        Value::Map(map)
    }

    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Value {
        let set = SetRef::new();
        for item in items {
            set.insert(item);
        }
        Value::Set(set)
    }

    /// Create a tagged error value.
    pub fn error<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Value {
        Value::Error(ErrorRef(Arc::new(ErrorValue {
            kind: kind.into(),
            message: message.into(),
        })))
    }

    /// Create a custom tagged value. Encoding it requires a plugin that claims
    /// the value (for example [`crate::plugin::CustomPassthrough`]).
    pub fn custom<T: Into<String>, I: IntoIterator<Item = Value>>(tag: T, fields: I) -> Value {
        Value::Custom(CustomRef(Arc::new(Custom {
            tag: tag.into(),
            fields: fields.into_iter().collect(),
        })))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Absent => ValueKind::Absent,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::Text(_) => ValueKind::Text,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::Pattern(_) => ValueKind::Pattern,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Url(_) => ValueKind::Url,
            Value::Seq(_) => ValueKind::Seq,
            Value::Record(_) => ValueKind::Record,
            Value::Map(_) => ValueKind::Map,
            Value::Set(_) => ValueKind::Set,
            Value::Error(_) => ValueKind::Error,
            Value::Custom(_) => ValueKind::Custom,
            Value::Deferred(_) => ValueKind::Deferred,
        }
    }

    /// The identity token the encoder deduplicates by. Only kinds with heap
    /// identity carry one; scalars and atoms are encoded at each use site.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Seq(seq) => Some(Arc::as_ptr(&seq.0) as usize),
            Value::Record(record) => Some(Arc::as_ptr(&record.0) as usize),
            Value::Map(map) => Some(Arc::as_ptr(&map.0) as usize),
            Value::Set(set) => Some(Arc::as_ptr(&set.0) as usize),
            Value::Error(error) => Some(Arc::as_ptr(&error.0) as usize),
            Value::Custom(custom) => Some(Arc::as_ptr(&custom.0) as usize),
            Value::Deferred(deferred) => Some(deferred.identity()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Structural equality with an identity fast path for containers.
///
/// Comparing two distinct cyclic graphs does not terminate; compare such
/// values by identity instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Absent, Value::Absent) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::BigInt(left), Value::BigInt(right)) => left == right,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Symbol(left), Value::Symbol(right)) => left == right,
            (Value::Pattern(left), Value::Pattern(right)) => left == right,
            (Value::Timestamp(left), Value::Timestamp(right)) => left == right,
            (Value::Url(left), Value::Url(right)) => left == right,
            (Value::Seq(left), Value::Seq(right)) => {
                SeqRef::same(left, right) || left.snapshot() == right.snapshot()
            }
            (Value::Record(left), Value::Record(right)) => {
                RecordRef::same(left, right) || left.snapshot() == right.snapshot()
            }
            (Value::Map(left), Value::Map(right)) => {
                MapRef::same(left, right) || left.snapshot() == right.snapshot()
            }
            (Value::Set(left), Value::Set(right)) => {
                SetRef::same(left, right) || left.snapshot() == right.snapshot()
            }
            (Value::Error(left), Value::Error(right)) => {
                Arc::ptr_eq(&left.0, &right.0) || left.0 == right.0
            }
            (Value::Custom(left), Value::Custom(right)) => {
                Arc::ptr_eq(&left.0, &right.0) || left.0 == right.0
            }
            (Value::Deferred(left), Value::Deferred(right)) => Deferred::same(left, right),
            _ => false,
        }
    }
}

/// A regular expression as written: source and flag string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
    flags: String,
}

impl Pattern {
    pub fn new<S: Into<String>, F: Into<String>>(source: S, flags: F) -> Pattern {
        Pattern {
            source: source.into(),
            flags: flags.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

/// A tagged error value: a kind name and a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorValue {
    kind: String,
    message: String,
}

impl ErrorValue {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ErrorValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Clone, Debug)]
pub struct ErrorRef(pub(crate) Arc<ErrorValue>);

impl ErrorRef {
    pub fn kind(&self) -> &str {
        self.0.kind()
    }

    pub fn message(&self) -> &str {
        self.0.message()
    }

    pub fn same(this: &ErrorRef, that: &ErrorRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}

/// An application-defined tagged record: a tag and ordered fields, fixed at
/// construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Custom {
    tag: String,
    fields: Vec<Value>,
}

impl Custom {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}

#[derive(Clone, Debug)]
pub struct CustomRef(pub(crate) Arc<Custom>);

impl CustomRef {
    pub fn tag(&self) -> &str {
        self.0.tag()
    }

    pub fn fields(&self) -> &[Value] {
        self.0.fields()
    }

    pub fn same(this: &CustomRef, that: &CustomRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}

/// An ordered sequence with possibly absent positions. Cloning shares the
/// underlying storage.
#[derive(Clone, Debug, Default)]
pub struct SeqRef(pub(crate) Arc<RwLock<Vec<Option<Value>>>>);

impl SeqRef {
    pub fn new() -> SeqRef {
        SeqRef::default()
    }

    pub fn from_items<I: IntoIterator<Item = Option<Value>>>(items: I) -> SeqRef {
        SeqRef(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    pub fn push(&self, value: Value) {
        self.0.write().push(Some(value));
    }

    /// Append an absent position.
    pub fn push_hole(&self) {
        self.0.write().push(None);
    }

    pub(crate) fn push_item(&self, item: Option<Value>) {
        self.0.write().push(item);
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// The item at `index`: `None` out of range, `Some(None)` for a hole.
    pub fn get(&self, index: usize) -> Option<Option<Value>> {
        self.0.read().get(index).cloned()
    }

    pub fn snapshot(&self) -> Vec<Option<Value>> {
        self.0.read().clone()
    }

    /// Determine whether two handles share the same underlying sequence.
    pub fn same(this: &SeqRef, that: &SeqRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}

/// A string-keyed mapping preserving insertion order. Cloning shares the
/// underlying storage.
#[derive(Clone, Debug, Default)]
pub struct RecordRef(pub(crate) Arc<RwLock<Vec<(String, Value)>>>);

impl RecordRef {
    pub fn new() -> RecordRef {
        RecordRef::default()
    }

    /// Insert a key, replacing the value in place if the key is present.
    pub fn insert<K: Into<String>>(&self, key: K, value: Value) {
        let key = key.into();
        let mut entries = self.0.write();
        if let Some(entry) = entries.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    pub(crate) fn push_entry(&self, key: String, value: Value) {
        self.0.write().push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .read()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().iter().any(|(existing, _)| existing == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.0.read().clone()
    }

    pub fn same(this: &RecordRef, that: &RecordRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}

/// A mapping whose keys are themselves values. Cloning shares the underlying
/// storage.
#[derive(Clone, Debug, Default)]
pub struct MapRef(pub(crate) Arc<RwLock<Vec<(Value, Value)>>>);

impl MapRef {
    pub fn new() -> MapRef {
        MapRef::default()
    }

    /// Insert a key, replacing the value of a structurally equal key if one is
    /// present.
    pub fn insert(&self, key: Value, value: Value) {
        let mut entries = self.0.write();
        if let Some(entry) = entries.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    pub(crate) fn push_entry(&self, key: Value, value: Value) {
        self.0.write().push((key, value));
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0
            .read()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(Value, Value)> {
        self.0.read().clone()
    }

    pub fn same(this: &MapRef, that: &MapRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}

/// A collection of unique values. Cloning shares the underlying storage.
#[derive(Clone, Debug, Default)]
pub struct SetRef(pub(crate) Arc<RwLock<Vec<Value>>>);

impl SetRef {
    pub fn new() -> SetRef {
        SetRef::default()
    }

    /// Insert a value, returning whether it was not already present.
    pub fn insert(&self, value: Value) -> bool {
        let mut items = self.0.write();
        if items.iter().any(|existing| *existing == value) {
            false
        } else {
            items.push(value);
            true
        }
    }

    pub(crate) fn push_entry(&self, value: Value) {
        self.0.write().push(value);
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.read().iter().any(|existing| existing == value)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    pub fn same(this: &SetRef, that: &SetRef) -> bool {
        Arc::ptr_eq(&this.0, &that.0)
    }
}
