//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std;
use std::fmt::{self, Display};

use crate::width::BitWidth;

pub type Result<T> = std::result::Result<T, Error>;

/// Binary document codec error.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A computed length or offset exceeds what any supported width can hold.
    SizeOverflow,
    /// A map was closed with an odd number of stack entries.
    OddSizeMapContent,
    /// A bounds check against the underlying buffer failed.
    OutOfRange,
    /// The buffer is structurally malformed (bad length, unknown packed type, ...).
    InvalidData,
    /// The validator re-entered an already-visited offset.
    RecursiveData,
    /// An expected-NUL-terminated region had no terminator within the buffer.
    NoNullByte,
    /// An in-place mutation was attempted with a value that doesn't fit the slot's width.
    UpdateDoesntFit,
    /// A fallible typed accessor was called on a value of an incompatible kind.
    TypeDoesNotMatch,
    /// A lookup by key or index missed.
    NotFound,
    /// A read was attempted at a byte width floats don't support (1 or 2 bytes).
    Unsupported(BitWidth),
    /// A CLI framing I/O operation failed.
    Io(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SizeOverflow =>
                formatter.write_str("computed length or offset exceeds the largest supported width"),
            Error::OddSizeMapContent =>
                formatter.write_str("map expects an even number of stack entries, got odd"),
            Error::OutOfRange =>
                formatter.write_str("access out of range of the underlying buffer"),
            Error::InvalidData =>
                formatter.write_str("structurally malformed document data"),
            Error::RecursiveData =>
                formatter.write_str("recursive data detected while validating"),
            Error::NoNullByte =>
                formatter.write_str("expected a NUL terminator, found none in range"),
            Error::UpdateDoesntFit =>
                formatter.write_str("mutation value does not fit the existing slot width"),
            Error::TypeDoesNotMatch =>
                formatter.write_str("value is not of the requested type"),
            Error::NotFound =>
                formatter.write_str("lookup did not find a matching entry"),
            Error::Unsupported(bw) =>
                write!(formatter, "operation unsupported at byte width {}", bw.byte_width()),
            Error::Io(msg) =>
                write!(formatter, "i/o error: {}", msg),
        }
    }
}
