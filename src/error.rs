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

use thiserror::Error;

use crate::model::ValueKind;
use crate::plugin::PluginError;

/// Indicates that an incoming frame violated the wire grammar.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame syntax at column {column}")]
    Syntax { column: usize },
    #[error("unknown type code: {code}")]
    UnknownTypeCode { code: u64 },
    #[error("frame contained invalid UTF-8")]
    BadUtf8,
    #[error("the stream ended part way through a frame")]
    Incomplete,
    #[error("frame exceeded the maximum length of {limit} bytes")]
    TooLong { limit: usize },
}

/// Possible failure modes of an encode call.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// A value with no built-in encoding was claimed by no plugin. Fatal;
    /// output already emitted is not rolled back.
    #[error("values of kind {kind} cannot be encoded without a matching plugin")]
    Unsupported { kind: ValueKind },
    #[error("{0}")]
    Plugin(#[from] PluginError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The cancellation signal fired before the root frame was written.
    #[error("encoding was cancelled")]
    Cancelled,
}

/// Possible failure modes of a decode call and its `done` driver.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    BadFrame(#[from] FrameError),
    #[error("frame cited reference {reference}, which was never assigned")]
    UnknownReference { reference: i64 },
    #[error("a hole marker appeared outside a sequence")]
    MisplacedHole,
    #[error("slot {index} participates in a cycle that cannot be constructed")]
    UnresolvableCycle { index: usize },
    #[error("slot {index} does not contain a valid {expected}")]
    InvalidScalar {
        index: usize,
        expected: &'static str,
    },
    #[error("the stream did not begin with a root frame")]
    MissingRootFrame,
    #[error("received a second root frame")]
    UnexpectedRootFrame,
    #[error("resolution frame targeted id {id}, which is not pending")]
    UnexpectedResolution { id: u64 },
    #[error("no decoder plugin recognized the tag '{tag}'")]
    UnknownTag { tag: String },
    #[error("{0}")]
    Plugin(#[from] PluginError),
    /// The cancellation signal fired before the root frame was delivered.
    #[error("decoding was cancelled")]
    Cancelled,
}
