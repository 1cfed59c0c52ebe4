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

//! Streaming codec for self-referential value graphs with late-resolving
//! parts.
//!
//! A [`Value`] graph (scalars, containers that may share sub-structure and
//! contain cycles, custom tagged records and [`Deferred`] parts) is written
//! to an ordered byte stream as newline-delimited frames. The first frame
//! carries the whole root graph; each deferred part is assigned a stable id
//! and settled by exactly one later frame, in whatever order the deferreds
//! complete at the sender. The receiver observes the root value as soon as
//! the first frame arrives, with placeholders standing in for parts that are
//! still in flight.
//!
//! ```
//! use driftwire::{decode, encode, DecodeOptions, EncodeOptions, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, rx) = tokio::io::duplex(4096);
//! let value = Value::record(vec![("answer", Value::number(42.0))]);
//! let (sent, received) = futures::join!(
//!     encode(&value, tx, EncodeOptions::default()),
//!     decode(rx, DecodeOptions::default()),
//! );
//! sent?;
//! let decoded = received?;
//! assert_eq!(decoded.value, value);
//! decoded.done.await?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod model;
pub mod plugin;
pub mod wire;

pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use decode::{decode, DecodeOptions, Decoded};
pub use encode::{encode, EncodeOptions};
pub use error::{DecodeError, EncodeError, FrameError};
pub use model::{
    Completer, Custom, CustomRef, Deferred, ErrorRef, ErrorValue, MapRef, Pattern, RecordRef,
    SeqRef, SetRef, Settled, Settlement, Symbol, Timestamp, Value, ValueKind,
};
pub use plugin::{CustomPassthrough, DecodePlugin, EncodePlugin, PluginError};
