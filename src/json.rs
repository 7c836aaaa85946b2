//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # JSON bridge.
//!
//! `DocumentWriter` is the push/begin/end interface any encoder can target;
//! `Builder` implements it directly. `json_to_document` parses JSON text
//! into a document via that interface, and `document_to_json` renders a
//! document back out, base64-encoding blobs since JSON has no byte-string
//! type.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while, take_while1},
    character::complete::{char, digit1, none_of, one_of},
    combinator::{cut, map, map_res, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::reference::Reference;

/// The push/begin/end interface any document encoder targets. `Builder`
/// implements it directly; a `Reference` tree can be replayed through it
/// to re-encode a document (e.g. after editing, or into a second builder
/// with different `ShareFlags`).
pub trait DocumentWriter {
    fn push_null(&mut self);
    fn push_bool(&mut self, value: bool);
    fn push_int(&mut self, value: i64);
    fn push_uint(&mut self, value: u64);
    fn push_float(&mut self, value: f64);
    fn push_string(&mut self, value: &str) -> Result<()>;
    fn push_blob(&mut self, value: &[u8]) -> Result<()>;
    fn push_object_key(&mut self, key: &str) -> Result<()>;
    fn begin_array(&mut self) -> usize;
    fn end_array(&mut self, mark: usize) -> Result<()>;
    fn begin_object(&mut self) -> usize;
    fn end_object(&mut self, mark: usize) -> Result<()>;
}

impl DocumentWriter for Builder {
    fn push_null(&mut self) {
        Builder::push_null(self)
    }

    fn push_bool(&mut self, value: bool) {
        Builder::push_bool(self, value)
    }

    fn push_int(&mut self, value: i64) {
        Builder::push_int(self, value)
    }

    fn push_uint(&mut self, value: u64) {
        Builder::push_uint(self, value)
    }

    fn push_float(&mut self, value: f64) {
        Builder::push_f64(self, value)
    }

    fn push_string(&mut self, value: &str) -> Result<()> {
        Builder::push_string(self, value).map(|_| ())
    }

    fn push_blob(&mut self, value: &[u8]) -> Result<()> {
        Builder::push_blob(self, value).map(|_| ())
    }

    fn push_object_key(&mut self, key: &str) -> Result<()> {
        Builder::push_key(self, key.as_bytes()).map(|_| ())
    }

    fn begin_array(&mut self) -> usize {
        Builder::start_vector(self)
    }

    fn end_array(&mut self, mark: usize) -> Result<()> {
        Builder::end_vector(self, mark, false, false).map(|_| ())
    }

    fn begin_object(&mut self) -> usize {
        Builder::start_map(self)
    }

    fn end_object(&mut self, mark: usize) -> Result<()> {
        Builder::end_map(self, mark).map(|_| ())
    }
}

// -- text parsing --------------------------------------------------------

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_ascii_whitespace())(input)
}

fn token<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(whitespace, inner, whitespace)
}

fn json_string_body(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\"\\"),
                '\\',
                alt((
                    value('\\', tag("\\")),
                    value('"', tag("\"")),
                    value('/', tag("/")),
                    value('\u{08}', tag("b")),
                    value('\u{0C}', tag("f")),
                    value('\n', tag("n")),
                    value('\r', tag("r")),
                    value('\t', tag("t")),
                    map_res(preceded(char('u'), take_while1(|c: char| c.is_ascii_hexdigit())), |hex: &str| {
                        u32::from_str_radix(&hex[..hex.len().min(4)], 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or(Error::InvalidData)
                    }),
                )),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('"'),
    )(input)
}

fn json_number(input: &str) -> IResult<&str, (bool, f64)> {
    map(
        recognize(tuple((
            opt(char('-')),
            alt((tag("0"), digit1)),
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |text: &str| (text.contains('.') || text.contains('e') || text.contains('E'), text.parse::<f64>().unwrap_or(0.0)),
    )(input)
}

fn parse_value<'a, W: DocumentWriter>(input: &'a str, writer: &mut W) -> IResult<&'a str, ()> {
    let (input, _) = whitespace(input)?;
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("null")(input) {
        writer.push_null();
        return Ok((rest, ()));
    }
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("true")(input) {
        writer.push_bool(true);
        return Ok((rest, ()));
    }
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<&str>>("false")(input) {
        writer.push_bool(false);
        return Ok((rest, ()));
    }
    if let Ok((rest, s)) = json_string_body(input) {
        writer.push_string(&s).map_err(|_| nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify)))?;
        return Ok((rest, ()));
    }
    if let Ok((rest, (is_float, n))) = json_number(input) {
        if is_float {
            writer.push_float(n);
        } else if n >= 0.0 {
            writer.push_uint(n as u64);
        } else {
            writer.push_int(n as i64);
        }
        return Ok((rest, ()));
    }
    if input.starts_with('[') {
        return parse_array(input, writer);
    }
    if input.starts_with('{') {
        return parse_object(input, writer);
    }
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Alt)))
}

fn parse_array<'a, W: DocumentWriter>(input: &'a str, writer: &mut W) -> IResult<&'a str, ()> {
    let (mut input, _) = token(char('['))(input)?;
    let mark = writer.begin_array();
    let (after_bracket, closed) = opt(char(']'))(input)?;
    if closed.is_some() {
        writer.end_array(mark).map_err(to_nom_failure(input))?;
        return Ok((after_bracket, ()));
    }
    loop {
        let (rest, _) = parse_value(input, writer)?;
        input = rest;
        let (rest, comma) = token(opt(char(',')))(input)?;
        input = rest;
        if comma.is_none() {
            break;
        }
    }
    let (input, _) = cut(token(char(']')))(input)?;
    writer.end_array(mark).map_err(to_nom_failure(input))?;
    Ok((input, ()))
}

fn parse_object<'a, W: DocumentWriter>(input: &'a str, writer: &mut W) -> IResult<&'a str, ()> {
    let (mut input, _) = token(char('{'))(input)?;
    let mark = writer.begin_object();
    let (after_brace, closed) = opt(char('}'))(input)?;
    if closed.is_some() {
        writer.end_object(mark).map_err(to_nom_failure(input))?;
        return Ok((after_brace, ()));
    }
    loop {
        let (rest, key) = token(json_string_body)(input)?;
        writer.push_object_key(&key).map_err(to_nom_failure(input))?;
        let (rest, _) = cut(token(char(':')))(rest)?;
        let (rest, _) = parse_value(rest, writer)?;
        input = rest;
        let (rest, comma) = token(opt(char(',')))(input)?;
        input = rest;
        if comma.is_none() {
            break;
        }
    }
    let (input, _) = cut(token(char('}')))(input)?;
    writer.end_object(mark).map_err(to_nom_failure(input))?;
    Ok((input, ()))
}

fn to_nom_failure<'a>(input: &'a str) -> impl Fn(Error) -> nom::Err<nom::error::Error<&'a str>> {
    move |_| nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

/// Parses a complete JSON text into a freshly-built document.
pub fn json_to_document(text: &str) -> Result<Vec<u8>> {
    let mut builder = Builder::new();
    let (rest, _) = parse_value(text, &mut builder).map_err(|_| Error::InvalidData)?;
    if !rest.trim().is_empty() {
        return Err(Error::InvalidData);
    }
    builder.finish()?;
    Ok(builder.finished_buffer().to_vec())
}

// -- rendering -------------------------------------------------------------

fn escape_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn render(r: &Reference, out: &mut String) {
    if r.is_null() {
        out.push_str("null");
    } else if r.is_bool() {
        out.push_str(if r.as_bool() { "true" } else { "false" });
    } else if r.is_int() {
        out.push_str(&r.as_i64().to_string());
    } else if r.is_uint() {
        out.push_str(&r.as_u64().to_string());
    } else if r.is_float() {
        out.push_str(&r.as_f64().to_string());
    } else if r.is_string() || r.is_key() {
        escape_json_string(r.try_as_str().unwrap_or(""), out);
    } else if r.is_blob() {
        escape_json_string(&base64::encode(r.try_as_blob().unwrap_or(&[])), out);
    } else if r.is_map() {
        let map = r.as_map();
        out.push('{');
        let keys = map.keys();
        for i in 0..keys.len() {
            if i > 0 {
                out.push(',');
            }
            escape_json_string(keys.at(i).string_value().unwrap_or(""), out);
            out.push(':');
            render(&map.values().at(i), out);
        }
        out.push('}');
    } else if r.is_vector() {
        let vec = r.as_vector();
        out.push('[');
        for i in 0..vec.len() {
            if i > 0 {
                out.push(',');
            }
            render(&vec.at(i), out);
        }
        out.push(']');
    } else {
        out.push_str("null");
    }
}

/// Renders a document as JSON text. Blobs become base64 strings since JSON
/// has no native byte-string type.
pub fn document_to_json(buf: &[u8]) -> Result<String> {
    let root = Reference::root(buf)?;
    let mut out = String::new();
    render(&root, &mut out);
    Ok(out)
}
