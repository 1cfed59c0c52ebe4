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

use bytes::{Buf, BufMut, BytesMut};
use std::fmt::Write;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{DecodeError, EncodeError, FrameError};
use crate::wire::parser::parse_frame;
use crate::wire::print::print_frame;
use crate::wire::WireFrame;


/// Newline-delimited framing for the wire format. Each `encode` call writes
/// one complete frame and its terminator, so a frame is never split across
/// buffer boundaries; the decoder scans incrementally and yields fully parsed
/// frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_length: usize,
    next_index: usize,
}

impl FrameCodec {
    /// A codec with no frame length limit.
    pub fn new() -> FrameCodec {
        FrameCodec {
            max_frame_length: usize::MAX,
            next_index: 0,
        }
    }

    /// A codec rejecting frames longer than `max_frame_length` bytes
    /// (excluding the terminator).
    pub fn with_max_frame_length(max_frame_length: usize) -> FrameCodec {
        FrameCodec {
            max_frame_length,
            next_index: 0,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new()
    }
}

impl Decoder for FrameCodec {
    type Item = WireFrame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireFrame>, DecodeError> {
        let read_to = src.len();
        match src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n')
        {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                if end > self.max_frame_length {
                    return Err(FrameError::TooLong {
                        limit: self.max_frame_length,
                    }
                    .into());
                }
                let line = src.split_to(end);
                src.advance(1);
                let text = core::str::from_utf8(line.as_ref()).map_err(|_| FrameError::BadUtf8)?;
                Ok(Some(parse_frame(text)?))
            }
            None => {
                if read_to > self.max_frame_length {
                    return Err(FrameError::TooLong {
                        limit: self.max_frame_length,
                    }
                    .into());
                }
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<WireFrame>, DecodeError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Incomplete.into()),
        }
    }
}

impl Encoder<WireFrame> for FrameCodec {
    type Error = EncodeError;

    fn encode(&mut self, item: WireFrame, dst: &mut BytesMut) -> Result<(), EncodeError> {
        if write!(dst, "{}", print_frame(&item)).is_err() {
            return Err(EncodeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "failed to format frame",
            )));
        }
        dst.put_u8(b'\n');
        Ok(())
    }
}
