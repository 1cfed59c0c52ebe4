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
use nom::character::complete as character;
use nom::combinator::{map_res, opt, recognize};
use nom::multi::many0_count;
use nom::sequence::{delimited, pair, tuple};
use std::borrow::Cow;

use super::ParseResult;

/// A JSON string literal, with escapes resolved. Borrows the input when no
/// escape is present.
pub(super) fn string_literal(input: &str) -> ParseResult<'_, Cow<'_, str>> {
    map_res(
        delimited(
            character::char('"'),
            recognize(many0_count(alt((
                recognize(character::satisfy(|c| c != '\\' && c != '"')),
                escape,
            )))),
            character::char('"'),
        ),
        resolve_escapes,
    )(input)
}

fn escape(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(character::char('\\'), character::anychar))(input)
}

/// A signed decimal integer, as used for references and timestamps.
pub(super) fn integer(input: &str) -> ParseResult<'_, i64> {
    map_res(
        recognize(pair(opt(character::char('-')), character::digit1)),
        str::parse::<i64>,
    )(input)
}

/// An unsigned decimal integer, as used for deferred ids and type codes.
pub(super) fn index(input: &str) -> ParseResult<'_, u64> {
    map_res(character::digit1, str::parse::<u64>)(input)
}

/// A finite JSON number.
pub(super) fn float(input: &str) -> ParseResult<'_, f64> {
    map_res(
        recognize(tuple((
            opt(character::char('-')),
            character::digit1,
            opt(pair(character::char('.'), character::digit1)),
            opt(tuple((
                character::one_of("eE"),
                opt(character::one_of("+-")),
                character::digit1,
            ))),
        ))),
        parse_finite,
    )(input)
}

#[derive(Debug)]
pub(super) struct InvalidNumber;

fn parse_finite(rep: &str) -> Result<f64, InvalidNumber> {
    match rep.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(InvalidNumber),
    }
}

#[derive(Debug)]
pub(super) struct InvalidEscape;

fn resolve_escapes(span: &str) -> Result<Cow<'_, str>, InvalidEscape> {
    if span.contains('\\') {
        unescape(span).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(span))
    }
}

/// Unescape a string literal using JSON conventions, including UTF-16
/// surrogate pairs.
fn unescape(literal: &str) -> Result<String, InvalidEscape> {
    let mut unescaped = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => unescaped.push('"'),
            Some('\\') => unescaped.push('\\'),
            Some('/') => unescaped.push('/'),
            Some('b') => unescaped.push('\u{08}'),
            Some('f') => unescaped.push('\u{0c}'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some('u') => {
                let unit = hex_escape(&mut chars)?;
                let unescaped_char = if (0xd800..0xdc00).contains(&unit) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(InvalidEscape);
                    }
                    let low = hex_escape(&mut chars)?;
                    if !(0xdc00..0xe000).contains(&low) {
                        return Err(InvalidEscape);
                    }
                    let combined = 0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00);
                    char::from_u32(combined).ok_or(InvalidEscape)?
                } else {
                    char::from_u32(unit).ok_or(InvalidEscape)?
                };
                unescaped.push(unescaped_char);
            }
            _ => return Err(InvalidEscape),
        }
    }
    Ok(unescaped)
}

fn hex_escape(chars: &mut std::str::Chars<'_>) -> Result<u32, InvalidEscape> {
    let mut unit = 0;
    for _ in 0..4 {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(InvalidEscape)?;
        unit = (unit << 4) | digit;
    }
    Ok(unit)
}
