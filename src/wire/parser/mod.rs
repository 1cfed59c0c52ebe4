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

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete as character;
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::error::{ErrorKind, FromExternalError, ParseError};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;
use num_bigint::BigInt;

use crate::error::FrameError;
use crate::wire::{code, Composite, FrameHeader, Ref, WireFrame, WireSlot, FULFILLED, REJECTED};

mod tokens;


pub(crate) type ParseResult<'a, T> = IResult<&'a str, T, FrameSyntax<'a>>;

/// Parse one complete frame line (without its terminating newline).
pub fn parse_frame(line: &str) -> Result<WireFrame, FrameError> {
    match all_consuming(frame)(line) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(match e.unknown_code {
            Some(code) => FrameError::UnknownTypeCode { code },
            None => FrameError::Syntax {
                column: line.len() - e.input.len(),
            },
        }),
        Err(nom::Err::Incomplete(_)) => Err(FrameError::Syntax { column: line.len() }),
    }
}

/// Error type threaded through the nom combinators, keeping hold of the
/// failing suffix so the column can be reported.
#[derive(Debug, PartialEq)]
pub(crate) struct FrameSyntax<'a> {
    input: &'a str,
    unknown_code: Option<u64>,
}

impl<'a> FrameSyntax<'a> {
    fn unknown_code(input: &'a str, code: u64) -> FrameSyntax<'a> {
        FrameSyntax {
            input,
            unknown_code: Some(code),
        }
    }
}

impl<'a> ParseError<&'a str> for FrameSyntax<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        FrameSyntax {
            input,
            unknown_code: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for FrameSyntax<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, _error: E) -> Self {
        FrameSyntax {
            input,
            unknown_code: None,
        }
    }
}

fn frame(input: &str) -> ParseResult<'_, WireFrame> {
    let (input, header) = header(input)?;
    let (input, _) = character::char('[')(input)?;
    let (input, root) = tokens::integer(input)?;
    let (input, slots) = many0(preceded(character::char(','), slot))(input)?;
    let (input, _) = character::char(']')(input)?;
    Ok((
        input,
        WireFrame {
            header,
            root,
            slots,
        },
    ))
}

fn header(input: &str) -> ParseResult<'_, FrameHeader> {
    map(
        opt(alt((
            map(
                delimited(character::char(FULFILLED), tokens::index, character::char(':')),
                FrameHeader::Fulfilled,
            ),
            map(
                delimited(character::char(REJECTED), tokens::index, character::char(':')),
                FrameHeader::Rejected,
            ),
        ))),
        |header| header.unwrap_or(FrameHeader::Root),
    )(input)
}

fn slot(input: &str) -> ParseResult<'_, WireSlot> {
    alt((
        map(tokens::string_literal, |text| {
            WireSlot::Text(text.into_owned())
        }),
        composite,
        map(tag("true"), |_| WireSlot::Bool(true)),
        map(tag("false"), |_| WireSlot::Bool(false)),
        map(tag("null"), |_| WireSlot::Null),
        map(tokens::float, WireSlot::Number),
    ))(input)
}

fn composite(input: &str) -> ParseResult<'_, WireSlot> {
    let (input, _) = character::char('[')(input)?;
    let (input, raw_code) = tokens::index(input)?;
    let (input, _) = character::char(',')(input)?;
    let (input, composite) = payload(input, raw_code)?;
    let (input, _) = character::char(']')(input)?;
    Ok((input, WireSlot::Composite(composite)))
}

fn payload(input: &str, raw_code: u64) -> ParseResult<'_, Composite> {
    match u8::try_from(raw_code).unwrap_or(0) {
        code::SEQ => map(ref_array, Composite::Seq)(input),
        code::RECORD => map(record_entries, Composite::Record)(input),
        code::MAP => map_res(ref_array, |refs| entry_pairs(refs).map(Composite::Map))(input),
        code::SET => map(ref_array, Composite::Set)(input),
        code::BIG_INT => map_res(tokens::string_literal, |text| {
            text.parse::<BigInt>().map(Composite::BigInt)
        })(input),
        code::TIMESTAMP => map(tokens::integer, Composite::Timestamp)(input),
        code::PATTERN => map(string_pair, |(source, flags)| Composite::Pattern {
            source,
            flags,
        })(input),
        code::SYMBOL => map(tokens::string_literal, |name| {
            Composite::Symbol(name.into_owned())
        })(input),
        code::URL => map(tokens::string_literal, |url| Composite::Url(url.into_owned()))(input),
        code::ERROR => map(string_pair, |(kind, message)| Composite::Error {
            kind,
            message,
        })(input),
        code::CUSTOM => custom_payload(input),
        code::PENDING => map(tokens::index, Composite::Pending)(input),
        _ => Err(nom::Err::Failure(FrameSyntax::unknown_code(
            input, raw_code,
        ))),
    }
}

fn ref_array(input: &str) -> ParseResult<'_, Vec<Ref>> {
    delimited(
        character::char('['),
        separated_list0(character::char(','), tokens::integer),
        character::char(']'),
    )(input)
}

#[derive(Debug)]
struct OddPayload;

fn entry_pairs(refs: Vec<Ref>) -> Result<Vec<(Ref, Ref)>, OddPayload> {
    if refs.len() % 2 != 0 {
        return Err(OddPayload);
    }
    Ok(refs.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
}

fn record_entries(input: &str) -> ParseResult<'_, Vec<(String, Ref)>> {
    delimited(
        character::char('['),
        separated_list0(
            character::char(','),
            map(
                separated_pair(tokens::string_literal, character::char(','), tokens::integer),
                |(key, reference)| (key.into_owned(), reference),
            ),
        ),
        character::char(']'),
    )(input)
}

fn string_pair(input: &str) -> ParseResult<'_, (String, String)> {
    delimited(
        character::char('['),
        map(
            separated_pair(
                tokens::string_literal,
                character::char(','),
                tokens::string_literal,
            ),
            |(first, second)| (first.into_owned(), second.into_owned()),
        ),
        character::char(']'),
    )(input)
}

fn custom_payload(input: &str) -> ParseResult<'_, Composite> {
    map(
        delimited(
            character::char('['),
            pair(
                tokens::string_literal,
                many0(preceded(character::char(','), tokens::integer)),
            ),
            character::char(']'),
        ),
        |(tag, fields)| Composite::Custom {
            tag: tag.into_owned(),
            fields,
        },
    )(input)
}
