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

use std::fmt::{Display, Formatter, Write};

use super::{Composite, FrameHeader, Ref, WireFrame, WireSlot};

/// Print the single-line representation of a frame (without the terminating
/// newline, which the framer appends).
pub fn print_frame(frame: &WireFrame) -> impl Display + '_ {
    FramePrint(frame)
}

struct FramePrint<'a>(&'a WireFrame);

impl<'a> Display for FramePrint<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let FramePrint(WireFrame {
            header,
            root,
            slots,
        }) = self;
        match header {
            FrameHeader::Root => {}
            FrameHeader::Fulfilled(id) => write!(f, "{}{}:", super::FULFILLED, id)?,
            FrameHeader::Rejected(id) => write!(f, "{}{}:", super::REJECTED, id)?,
        }
        write!(f, "[{}", root)?;
        for slot in slots.iter() {
            f.write_char(',')?;
            write_slot(slot, f)?;
        }
        f.write_char(']')
    }
}

fn write_slot(slot: &WireSlot, f: &mut Formatter<'_>) -> std::fmt::Result {
    match slot {
        WireSlot::Number(value) => write!(f, "{}", value),
        WireSlot::Text(text) => write_string_literal(text, f),
        WireSlot::Bool(value) => write!(f, "{}", value),
        WireSlot::Null => f.write_str("null"),
        WireSlot::Composite(composite) => write_composite(composite, f),
    }
}

fn write_composite(composite: &Composite, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{},", composite.code())?;
    match composite {
        Composite::Seq(refs) | Composite::Set(refs) => write_refs(refs, f)?,
        Composite::Record(entries) => {
            f.write_char('[')?;
            let mut first = true;
            for (key, reference) in entries.iter() {
                if !first {
                    f.write_char(',')?;
                }
                write_string_literal(key, f)?;
                write!(f, ",{}", reference)?;
                first = false;
            }
            f.write_char(']')?;
        }
        Composite::Map(entries) => {
            f.write_char('[')?;
            let mut first = true;
            for (key, value) in entries.iter() {
                if !first {
                    f.write_char(',')?;
                }
                write!(f, "{},{}", key, value)?;
                first = false;
            }
            f.write_char(']')?;
        }
        Composite::BigInt(value) => write!(f, "\"{}\"", value)?,
        Composite::Timestamp(millis) => write!(f, "{}", millis)?,
        Composite::Pattern { source, flags } => {
            f.write_char('[')?;
            write_string_literal(source, f)?;
            f.write_char(',')?;
            write_string_literal(flags, f)?;
            f.write_char(']')?;
        }
        Composite::Symbol(name) => write_string_literal(name, f)?,
        Composite::Url(url) => write_string_literal(url, f)?,
        Composite::Error { kind, message } => {
            f.write_char('[')?;
            write_string_literal(kind, f)?;
            f.write_char(',')?;
            write_string_literal(message, f)?;
            f.write_char(']')?;
        }
        Composite::Custom { tag, fields } => {
            f.write_char('[')?;
            write_string_literal(tag, f)?;
            for reference in fields.iter() {
                write!(f, ",{}", reference)?;
            }
            f.write_char(']')?;
        }
        Composite::Pending(id) => write!(f, "{}", id)?,
    }
    f.write_char(']')
}

fn write_refs(refs: &[Ref], f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_char('[')?;
    let mut first = true;
    for reference in refs.iter() {
        if !first {
            f.write_char(',')?;
        }
        write!(f, "{}", reference)?;
        first = false;
    }
    f.write_char(']')
}

fn write_string_literal(literal: &str, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_char('"')?;
    for c in literal.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0c}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}
