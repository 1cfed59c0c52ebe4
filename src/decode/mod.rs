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

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};
use url::Url;

use crate::cancel::{cancelled, CancelSignal};
use crate::codec::FrameCodec;
use crate::error::DecodeError;
use crate::model::{MapRef, RecordRef, SeqRef, SetRef, Symbol, Timestamp, Value};
use crate::plugin::DecodePlugin;
use crate::wire::{sentinel, Composite, FrameHeader, Ref, WireFrame, WireSlot};

mod registry;


use registry::DecodeRegistry;

/// Options for a decode call.
#[derive(Default)]
pub struct DecodeOptions {
    /// Decoder plugins, consulted in order for custom-tagged entries.
    pub plugins: Vec<Box<dyn DecodePlugin>>,
    /// External cancellation signal.
    pub signal: Option<CancelSignal>,
}

/// The result of decoding the root frame.
pub struct Decoded {
    /// The hydrated root value, containing placeholders for any deferred
    /// parts.
    pub value: Value,
    /// The driver for the remainder of the stream. Each later frame settles
    /// one placeholder; the future completes when the stream terminates.
    /// Dropping it stops consumption without settling anything.
    pub done: BoxFuture<'static, Result<(), DecodeError>>,
}

/// Decode the root value from a byte stream.
///
/// The call returns as soon as the root frame has been hydrated; deferred
/// parts of the value are placeholders that settle while the returned `done`
/// future is driven. If the stream ends while placeholders remain pending
/// each is rejected with a closed-stream error and `done` completes normally;
/// if the cancellation signal fires after the root was delivered each pending
/// placeholder is rejected with the supplied reason.
pub async fn decode<R>(input: R, options: DecodeOptions) -> Result<Decoded, DecodeError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let DecodeOptions {
        plugins,
        mut signal,
    } = options;
    let mut framed = FramedRead::new(input, FrameCodec::new());
    let first = tokio::select! {
        biased;
        _ = cancelled(&mut signal) => return Err(DecodeError::Cancelled),
        frame = framed.next() => frame,
    };
    let frame = match first {
        Some(result) => result?,
        None => return Err(DecodeError::MissingRootFrame),
    };
    if frame.header != FrameHeader::Root {
        return Err(DecodeError::MissingRootFrame);
    }
    let mut registry = DecodeRegistry::default();
    let value = Hydrator::new(&frame, &plugins, &mut registry).hydrate()?;
    trace!(pending = registry.pending_count(), "Delivered the root value.");
    let done = drive(framed, registry, plugins, signal).boxed();
    Ok(Decoded { value, done })
}

async fn drive<R>(
    mut framed: FramedRead<R, FrameCodec>,
    mut registry: DecodeRegistry,
    plugins: Vec<Box<dyn DecodePlugin>>,
    mut signal: Option<CancelSignal>,
) -> Result<(), DecodeError>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            reason = cancelled(&mut signal) => {
                debug!(pending = registry.pending_count(), "Decoding cancelled; rejecting pending placeholders.");
                registry.reject_all(|| reason.clone());
                return Ok(());
            }
            next = framed.next() => match next {
                None => {
                    if registry.pending_count() > 0 {
                        debug!(pending = registry.pending_count(), "Stream closed with placeholders still pending.");
                        registry.reject_all(closed_reason);
                    }
                    return Ok(());
                }
                Some(Err(error)) => {
                    registry.reject_all(|| failure_reason(&error));
                    return Err(error);
                }
                Some(Ok(frame)) => {
                    if let Err(error) = deliver(&frame, &plugins, &mut registry) {
                        registry.reject_all(|| failure_reason(&error));
                        return Err(error);
                    }
                }
            }
        }
    }
}

fn deliver(
    frame: &WireFrame,
    plugins: &[Box<dyn DecodePlugin>],
    registry: &mut DecodeRegistry,
) -> Result<(), DecodeError> {
    let id = match frame.header {
        FrameHeader::Root => return Err(DecodeError::UnexpectedRootFrame),
        FrameHeader::Fulfilled(id) | FrameHeader::Rejected(id) => id,
    };
    let completer = match registry.settle(id) {
        Some(completer) => completer,
        None => {
            warn!(id, "Resolution frame targeted an id that is not pending.");
            return Err(DecodeError::UnexpectedResolution { id });
        }
    };
    let value = match Hydrator::new(frame, plugins, registry).hydrate() {
        Ok(value) => value,
        Err(error) => {
            completer.reject(failure_reason(&error));
            return Err(error);
        }
    };
    trace!(id, fulfilled = frame.header == FrameHeader::Fulfilled(id), "Settling a placeholder.");
    match frame.header {
        FrameHeader::Rejected(_) => completer.reject(value),
        _ => completer.fulfill(value),
    }
    Ok(())
}

fn closed_reason() -> Value {
    Value::error(
        "ClosedWithoutResolution",
        "stream closed before the deferred value was resolved",
    )
}

fn failure_reason(error: &DecodeError) -> Value {
    let kind = match error {
        DecodeError::Io(_) => "IoError",
        DecodeError::UnknownReference { .. } => "UnknownReference",
        DecodeError::UnexpectedResolution { .. } => "UnexpectedResolution",
        DecodeError::UnknownTag { .. } => "UnknownTag",
        DecodeError::Plugin(_) => "PluginError",
        DecodeError::Cancelled => "Cancelled",
        _ => "MalformedFrame",
    };
    Value::error(kind, error.to_string())
}

#[derive(Clone)]
enum LinkState {
    Unvisited,
    InProgress,
    Linked(Value),
}

/// Two-phase hydration of one frame. The parse phase has already produced the
/// slot table; this walks it, creating container shells before their contents
/// so cycles close without observing uninitialized values. Shell population
/// is deferred onto a worklist, which is what allows a cycle to pass through
/// a non-container slot (such as a custom value inside a sequence that
/// contains it).
pub(crate) struct Hydrator<'a> {
    frame: &'a WireFrame,
    plugins: &'a [Box<dyn DecodePlugin>],
    registry: &'a mut DecodeRegistry,
    links: Vec<LinkState>,
    fills: VecDeque<usize>,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(
        frame: &'a WireFrame,
        plugins: &'a [Box<dyn DecodePlugin>],
        registry: &'a mut DecodeRegistry,
    ) -> Hydrator<'a> {
        Hydrator {
            frame,
            plugins,
            registry,
            links: vec![LinkState::Unvisited; frame.slots.len()],
            fills: VecDeque::new(),
        }
    }

    pub(crate) fn hydrate(mut self) -> Result<Value, DecodeError> {
        let root = self.resolve(self.frame.root)?;
        while let Some(index) = self.fills.pop_front() {
            self.fill(index)?;
        }
        Ok(root)
    }

    fn resolve(&mut self, reference: Ref) -> Result<Value, DecodeError> {
        if reference < 0 {
            return atom_for(reference);
        }
        let index = reference as usize;
        if index >= self.frame.slots.len() {
            return Err(DecodeError::UnknownReference { reference });
        }
        match &self.links[index] {
            LinkState::Linked(value) => Ok(value.clone()),
            LinkState::InProgress => Err(DecodeError::UnresolvableCycle { index }),
            LinkState::Unvisited => self.link(index),
        }
    }

    /// Resolve a sequence element, where the hole sentinel is legal.
    fn element(&mut self, reference: Ref) -> Result<Option<Value>, DecodeError> {
        if reference == sentinel::HOLE {
            Ok(None)
        } else {
            self.resolve(reference).map(Some)
        }
    }

    fn link(&mut self, index: usize) -> Result<Value, DecodeError> {
        let frame = self.frame;
        let value = match &frame.slots[index] {
            WireSlot::Number(n) => Value::Number(*n),
            WireSlot::Text(text) => Value::Text(text.clone()),
            WireSlot::Bool(p) => Value::Bool(*p),
            WireSlot::Null => Value::Null,
            WireSlot::Composite(composite) => return self.link_composite(index, composite),
        };
        self.links[index] = LinkState::Linked(value.clone());
        Ok(value)
    }

    fn link_composite(
        &mut self,
        index: usize,
        composite: &'a Composite,
    ) -> Result<Value, DecodeError> {
        let value = match composite {
            Composite::Seq(_) => return Ok(self.shell(index, Value::Seq(SeqRef::new()))),
            Composite::Record(_) => {
                return Ok(self.shell(index, Value::Record(RecordRef::new())))
            }
            Composite::Map(_) => return Ok(self.shell(index, Value::Map(MapRef::new()))),
            Composite::Set(_) => return Ok(self.shell(index, Value::Set(SetRef::new()))),
            Composite::BigInt(n) => Value::BigInt(n.clone()),
            Composite::Timestamp(millis) => match Timestamp::from_millis(*millis) {
                Some(timestamp) => Value::Timestamp(timestamp),
                None => {
                    return Err(DecodeError::InvalidScalar {
                        index,
                        expected: "timestamp",
                    })
                }
            },
            Composite::Pattern { source, flags } => Value::pattern(source.clone(), flags.clone()),
            Composite::Symbol(name) => Value::Symbol(Symbol::new(name)),
            Composite::Url(url) => match Url::parse(url) {
                Ok(parsed) => Value::Url(Arc::new(parsed)),
                Err(_) => {
                    return Err(DecodeError::InvalidScalar {
                        index,
                        expected: "URL",
                    })
                }
            },
            Composite::Error { kind, message } => Value::error(kind.clone(), message.clone()),
            Composite::Custom { tag, fields } => {
                self.links[index] = LinkState::InProgress;
                let mut children = Vec::with_capacity(fields.len());
                for reference in fields {
                    children.push(self.resolve(*reference)?);
                }
                self.dispatch(tag, &children)?
            }
            Composite::Pending(id) => Value::Deferred(self.registry.placeholder(*id)),
        };
        self.links[index] = LinkState::Linked(value.clone());
        Ok(value)
    }

    /// Memoize a container shell and queue its population.
    fn shell(&mut self, index: usize, value: Value) -> Value {
        self.links[index] = LinkState::Linked(value.clone());
        self.fills.push_back(index);
        value
    }

    fn fill(&mut self, index: usize) -> Result<(), DecodeError> {
        let frame = self.frame;
        let composite = match &frame.slots[index] {
            WireSlot::Composite(composite) => composite,
            _ => return Ok(()),
        };
        let shell = match &self.links[index] {
            LinkState::Linked(value) => value.clone(),
            _ => return Ok(()),
        };
        match (composite, shell) {
            (Composite::Seq(refs), Value::Seq(seq)) => {
                for reference in refs {
                    let item = self.element(*reference)?;
                    seq.push_item(item);
                }
            }
            (Composite::Record(entries), Value::Record(record)) => {
                for (key, reference) in entries {
                    let value = self.resolve(*reference)?;
                    record.push_entry(key.clone(), value);
                }
            }
            (Composite::Map(entries), Value::Map(map)) => {
                for (key_ref, value_ref) in entries {
                    let key = self.resolve(*key_ref)?;
                    let value = self.resolve(*value_ref)?;
                    map.push_entry(key, value);
                }
            }
            (Composite::Set(refs), Value::Set(set)) => {
                for reference in refs {
                    let item = self.resolve(*reference)?;
                    set.push_entry(item);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, tag: &str, fields: &[Value]) -> Result<Value, DecodeError> {
        for plugin in self.plugins {
            if let Some(value) = plugin.decode(tag, fields)? {
                return Ok(value);
            }
        }
        Err(DecodeError::UnknownTag {
            tag: tag.to_owned(),
        })
    }
}

fn atom_for(reference: Ref) -> Result<Value, DecodeError> {
    match reference {
        sentinel::ABSENT => Ok(Value::Absent),
        sentinel::NULL => Ok(Value::Null),
        sentinel::TRUE => Ok(Value::Bool(true)),
        sentinel::FALSE => Ok(Value::Bool(false)),
        sentinel::NAN => Ok(Value::Number(f64::NAN)),
        sentinel::POS_INFINITY => Ok(Value::Number(f64::INFINITY)),
        sentinel::NEG_INFINITY => Ok(Value::Number(f64::NEG_INFINITY)),
        sentinel::NEG_ZERO => Ok(Value::Number(-0.0)),
        sentinel::EMPTY_TEXT => Ok(Value::Text(String::new())),
        sentinel::HOLE => Err(DecodeError::MisplacedHole),
        _ => Err(DecodeError::UnknownReference { reference }),
    }
}
