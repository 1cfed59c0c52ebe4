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

use futures::SinkExt;
use std::collections::HashMap;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace};

use crate::cancel::{cancelled, CancelSignal};
use crate::codec::FrameCodec;
use crate::error::EncodeError;
use crate::model::Value;
use crate::plugin::EncodePlugin;
use crate::wire::{sentinel, Composite, FrameHeader, Ref, WireFrame, WireSlot};

mod registry;


use registry::EncodeRegistry;

/// Options for an encode call.
#[derive(Default)]
pub struct EncodeOptions {
    /// Encoder plugins, consulted in order before the built-in kinds.
    pub plugins: Vec<Box<dyn EncodePlugin>>,
    /// External cancellation signal.
    pub signal: Option<CancelSignal>,
}

/// Encode a value onto a byte stream.
///
/// The root frame is written immediately; one further frame is then written
/// for each deferred value reachable from the root (or from the payload of a
/// later frame), in the order the deferreds settle. The call returns once
/// every registered deferred has been settled and the output has been shut
/// down.
///
/// If the cancellation signal fires before the root frame is written the call
/// fails with [`EncodeError::Cancelled`]; afterwards each still-pending
/// deferred is rejected on the wire with the cancellation reason and the call
/// completes normally.
pub async fn encode<W>(value: &Value, output: W, options: EncodeOptions) -> Result<(), EncodeError>
where
    W: AsyncWrite + Unpin,
{
    let EncodeOptions {
        plugins,
        mut signal,
    } = options;
    if let Some(sig) = &signal {
        if sig.fired().is_some() {
            return Err(EncodeError::Cancelled);
        }
    }
    let mut framed = FramedWrite::new(output, FrameCodec::new());
    let mut registry = EncodeRegistry::default();
    let frame = root_frame(value, &plugins, &mut registry)?;
    trace!(slots = frame.slots.len(), "Emitting the root frame.");
    framed.send(frame).await?;
    loop {
        if registry.is_idle() {
            break;
        }
        tokio::select! {
            biased;
            reason = cancelled(&mut signal) => {
                let remaining = registry.close();
                debug!(remaining = remaining.len(), "Encoding cancelled; rejecting outstanding deferred values.");
                for id in remaining {
                    let frame = resolution_frame(FrameHeader::Rejected(id), &reason, &plugins, &mut registry)?;
                    framed.send(frame).await?;
                }
                framed.close().await?;
                return Ok(());
            }
            settled = registry.next_settlement() => {
                let (id, outcome) = match settled {
                    Some(next) => next,
                    None => break,
                };
                registry.complete(id);
                let header = match &outcome {
                    Ok(_) => FrameHeader::Fulfilled(id),
                    Err(_) => FrameHeader::Rejected(id),
                };
                let payload = match &outcome {
                    Ok(value) => value,
                    Err(reason) => reason,
                };
                trace!(id, fulfilled = outcome.is_ok(), "Emitting a resolution frame.");
                let frame = resolution_frame(header, payload, &plugins, &mut registry)?;
                framed.send(frame).await?;
            }
        }
    }
    framed.close().await?;
    Ok(())
}

pub(crate) fn root_frame(
    value: &Value,
    plugins: &[Box<dyn EncodePlugin>],
    registry: &mut EncodeRegistry,
) -> Result<WireFrame, EncodeError> {
    let mut builder = FrameBuilder::new(plugins, registry);
    let root = builder.reference(value)?;
    Ok(builder.into_frame(FrameHeader::Root, root))
}

pub(crate) fn resolution_frame(
    header: FrameHeader,
    payload: &Value,
    plugins: &[Box<dyn EncodePlugin>],
    registry: &mut EncodeRegistry,
) -> Result<WireFrame, EncodeError> {
    let mut builder = FrameBuilder::new(plugins, registry);
    let root = builder.reference(payload)?;
    Ok(builder.into_frame(header, root))
}

/// Builds one frame's reference table by walking a value graph. Slots are
/// allocated before their children are visited, which is what lets a cycle
/// refer back to an ancestor; the identity map is per frame while the
/// deferred id space in the registry is shared by the whole stream.
struct FrameBuilder<'a> {
    plugins: &'a [Box<dyn EncodePlugin>],
    registry: &'a mut EncodeRegistry,
    slots: Vec<WireSlot>,
    seen: HashMap<usize, usize>,
}

impl<'a> FrameBuilder<'a> {
    fn new(plugins: &'a [Box<dyn EncodePlugin>], registry: &'a mut EncodeRegistry) -> Self {
        FrameBuilder {
            plugins,
            registry,
            slots: vec![],
            seen: HashMap::new(),
        }
    }

    fn into_frame(self, header: FrameHeader, root: Ref) -> WireFrame {
        WireFrame {
            header,
            root,
            slots: self.slots,
        }
    }

    /// The reference for a value: a sentinel for singleton atoms, the
    /// existing slot for an already visited identity, or a fresh slot.
    fn reference(&mut self, value: &Value) -> Result<Ref, EncodeError> {
        if let Some(sentinel) = atom_sentinel(value) {
            return Ok(sentinel);
        }
        let identity = value.identity();
        if let Some(key) = identity {
            if let Some(&index) = self.seen.get(&key) {
                return Ok(index as Ref);
            }
        }
        let index = self.slots.len();
        self.slots.push(WireSlot::Null);
        if let Some(key) = identity {
            self.seen.insert(key, index);
        }
        let slot = self.slot_for(value)?;
        self.slots[index] = slot;
        Ok(index as Ref)
    }

    fn slot_for(&mut self, value: &Value) -> Result<WireSlot, EncodeError> {
        let plugins = self.plugins;
        for plugin in plugins {
            if let Some((tag, fields)) = plugin.encode(value)? {
                let mut refs = Vec::with_capacity(fields.len());
                for field in &fields {
                    refs.push(self.reference(field)?);
                }
                return Ok(WireSlot::Composite(Composite::Custom { tag, fields: refs }));
            }
        }
        match value {
            Value::Number(n) => Ok(WireSlot::Number(*n)),
            Value::Text(text) => Ok(WireSlot::Text(text.clone())),
            Value::BigInt(n) => Ok(WireSlot::Composite(Composite::BigInt(n.clone()))),
            Value::Symbol(symbol) => Ok(WireSlot::Composite(Composite::Symbol(
                symbol.name().to_owned(),
            ))),
            Value::Pattern(pattern) => Ok(WireSlot::Composite(Composite::Pattern {
                source: pattern.source().to_owned(),
                flags: pattern.flags().to_owned(),
            })),
            Value::Timestamp(timestamp) => {
                Ok(WireSlot::Composite(Composite::Timestamp(timestamp.millis())))
            }
            Value::Url(url) => Ok(WireSlot::Composite(Composite::Url(url.as_str().to_owned()))),
            Value::Seq(seq) => {
                let items = seq.snapshot();
                let mut refs = Vec::with_capacity(items.len());
                for item in &items {
                    refs.push(match item {
                        Some(value) => self.reference(value)?,
                        None => sentinel::HOLE,
                    });
                }
                Ok(WireSlot::Composite(Composite::Seq(refs)))
            }
            Value::Record(record) => {
                let entries = record.snapshot();
                let mut refs = Vec::with_capacity(entries.len());
                for (key, value) in &entries {
                    refs.push((key.clone(), self.reference(value)?));
                }
                Ok(WireSlot::Composite(Composite::Record(refs)))
            }
            Value::Map(map) => {
                let entries = map.snapshot();
                let mut refs = Vec::with_capacity(entries.len());
                for (key, value) in &entries {
                    refs.push((self.reference(key)?, self.reference(value)?));
                }
                Ok(WireSlot::Composite(Composite::Map(refs)))
            }
            Value::Set(set) => {
                let items = set.snapshot();
                let mut refs = Vec::with_capacity(items.len());
                for item in &items {
                    refs.push(self.reference(item)?);
                }
                Ok(WireSlot::Composite(Composite::Set(refs)))
            }
            Value::Error(error) => Ok(WireSlot::Composite(Composite::Error {
                kind: error.kind().to_owned(),
                message: error.message().to_owned(),
            })),
            Value::Deferred(deferred) => {
                let id = self.registry.register(deferred)?;
                Ok(WireSlot::Composite(Composite::Pending(id)))
            }
            Value::Custom(_) => Err(EncodeError::Unsupported { kind: value.kind() }),
            Value::Absent | Value::Null | Value::Bool(_) => {
                unreachable!("singleton atoms are encoded as sentinels")
            }
        }
    }
}

fn atom_sentinel(value: &Value) -> Option<Ref> {
    match value {
        Value::Absent => Some(sentinel::ABSENT),
        Value::Null => Some(sentinel::NULL),
        Value::Bool(true) => Some(sentinel::TRUE),
        Value::Bool(false) => Some(sentinel::FALSE),
        Value::Number(n) if n.is_nan() => Some(sentinel::NAN),
        Value::Number(n) if *n == f64::INFINITY => Some(sentinel::POS_INFINITY),
        Value::Number(n) if *n == f64::NEG_INFINITY => Some(sentinel::NEG_INFINITY),
        Value::Number(n) if *n == 0.0 && n.is_sign_negative() => Some(sentinel::NEG_ZERO),
        Value::Text(text) if text.is_empty() => Some(sentinel::EMPTY_TEXT),
        _ => None,
    }
}
