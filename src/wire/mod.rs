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

//! The shared wire vocabulary: the parsed, not-yet-hydrated form of a frame
//! along with the sentinel and type-code tables both sides agree on.
//!
//! A frame is one text line: an optional resolution discriminator (`F` for
//! fulfilled, `R` for rejected, followed by the target deferred id and `:`)
//! and the frame body, a flat array whose first element is the root reference
//! and whose remaining elements are the slots of the reference table. A
//! reference is a slot index (`>= 0`) or one of the negative singleton
//! sentinels.

use num_bigint::BigInt;

pub mod parser;
pub mod print;

/// A reference within a frame: a slot index or a negative atom sentinel.
pub type Ref = i64;

/// Singleton atoms, encoded as fixed negative references so they never occupy
/// table slots.
pub mod sentinel {
    use super::Ref;

    pub const ABSENT: Ref = -1;
    pub const NULL: Ref = -2;
    pub const TRUE: Ref = -3;
    pub const FALSE: Ref = -4;
    pub const NAN: Ref = -5;
    pub const POS_INFINITY: Ref = -6;
    pub const NEG_INFINITY: Ref = -7;
    pub const NEG_ZERO: Ref = -8;
    pub const EMPTY_TEXT: Ref = -9;
    /// An absent sequence position. Only legal in sequence element position.
    pub const HOLE: Ref = -10;
}

/// Type codes for composite slots.
pub mod code {
    pub const SEQ: u8 = 1;
    pub const RECORD: u8 = 2;
    pub const MAP: u8 = 3;
    pub const SET: u8 = 4;
    pub const BIG_INT: u8 = 5;
    pub const TIMESTAMP: u8 = 6;
    pub const PATTERN: u8 = 7;
    pub const SYMBOL: u8 = 8;
    pub const URL: u8 = 9;
    pub const ERROR: u8 = 10;
    pub const CUSTOM: u8 = 11;
    pub const PENDING: u8 = 12;
}

pub const FULFILLED: char = 'F';
pub const REJECTED: char = 'R';

/// Discriminates the three frame shapes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// The initial frame carrying the root value.
    Root,
    /// A frame fulfilling the deferred with the given id.
    Fulfilled(u64),
    /// A frame rejecting the deferred with the given id.
    Rejected(u64),
}

/// One parsed frame: header, root reference and reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub header: FrameHeader,
    pub root: Ref,
    pub slots: Vec<WireSlot>,
}

impl WireFrame {
    pub fn root_frame(root: Ref, slots: Vec<WireSlot>) -> WireFrame {
        WireFrame {
            header: FrameHeader::Root,
            root,
            slots,
        }
    }

    pub fn fulfilled(id: u64, root: Ref, slots: Vec<WireSlot>) -> WireFrame {
        WireFrame {
            header: FrameHeader::Fulfilled(id),
            root,
            slots,
        }
    }

    pub fn rejected(id: u64, root: Ref, slots: Vec<WireSlot>) -> WireFrame {
        WireFrame {
            header: FrameHeader::Rejected(id),
            root,
            slots,
        }
    }
}

/// One slot of a frame's reference table. The encoder only ever emits number
/// and string scalars (booleans and null have sentinel encodings) but the
/// decoder accepts all four inline.
#[derive(Debug, Clone, PartialEq)]
pub enum WireSlot {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
    Composite(Composite),
}

/// A `[typeCode, payload]` slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    Seq(Vec<Ref>),
    Record(Vec<(String, Ref)>),
    Map(Vec<(Ref, Ref)>),
    Set(Vec<Ref>),
    BigInt(BigInt),
    Timestamp(i64),
    Pattern { source: String, flags: String },
    Symbol(String),
    Url(String),
    Error { kind: String, message: String },
    Custom { tag: String, fields: Vec<Ref> },
    Pending(u64),
}

impl Composite {
    pub fn code(&self) -> u8 {
        match self {
            Composite::Seq(_) => code::SEQ,
            Composite::Record(_) => code::RECORD,
            Composite::Map(_) => code::MAP,
            Composite::Set(_) => code::SET,
            Composite::BigInt(_) => code::BIG_INT,
            Composite::Timestamp(_) => code::TIMESTAMP,
            Composite::Pattern { .. } => code::PATTERN,
            Composite::Symbol(_) => code::SYMBOL,
            Composite::Url(_) => code::URL,
            Composite::Error { .. } => code::ERROR,
            Composite::Custom { .. } => code::CUSTOM,
            Composite::Pending(_) => code::PENDING,
        }
    }
}
