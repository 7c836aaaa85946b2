//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Zero-copy reading.
//!
//! A `Reference` borrows the document buffer and names one value inside
//! it by offset plus the packed type byte that described it from its
//! parent slot. Every view built from a `Reference` -- `Vector`, `Map`,
//! `Str`, `Blob` -- is the same pair of `(&[u8], usize)` with a little
//! extra bookkeeping; nothing here copies bytes out of the buffer.
//!
//! Two accessor families exist for every scalar type: the infallible ones
//! (`as_i64`, `as_f64`, ...) coerce across related kinds and fall back to
//! a sentinel (0, `false`, `""`) for anything else, mirroring how a
//! dynamically-typed reader is normally used; the fallible ones
//! (`try_as_i64`, ...) reject any kind that doesn't already match.

use crate::error::{Error, Result};
use crate::raw;
use crate::varint;
use crate::width::{self, BitWidth, Kind};

/// Linear scan is used below this many entries; binary search above it.
/// Mirrors the crossover used by the reference implementation's map
/// lookup, where the fixed cost of a few extra comparisons loses to the
/// cache-friendliness of a linear scan for small maps.
const LOOKUP_BINARY_SEARCH_THRESHOLD: usize = 4;

#[derive(Copy, Clone)]
pub struct Reference<'a> {
    buf: &'a [u8],
    offset: usize,
    parent_width: usize,
    byte_width: usize,
    kind: Kind,
    has_ext: bool,
}

impl<'a> Reference<'a> {
    /// Reads the two-byte footer and returns a reference to the root value.
    pub fn root(buf: &'a [u8]) -> Result<Reference<'a>> {
        if buf.len() < 3 {
            return Err(Error::InvalidData);
        }
        let byte_width = buf[buf.len() - 1] as usize;
        if !matches!(byte_width, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidData);
        }
        let packed_type = buf[buf.len() - 2];
        let offset = buf.len().checked_sub(2 + byte_width).ok_or(Error::InvalidData)?;
        Reference::from_packed_type(buf, offset, byte_width, packed_type)
    }

    pub(crate) fn from_packed_type(
        buf: &'a [u8],
        offset: usize,
        parent_width: usize,
        packed_type: u8,
    ) -> Result<Reference<'a>> {
        let (bw, kind, has_ext) = width::unpack_type(packed_type);
        Ok(Reference { buf, offset, parent_width, byte_width: bw.byte_width(), kind, has_ext })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_null(&self) -> bool {
        self.kind == Kind::Null
    }

    pub fn is_bool(&self) -> bool {
        self.kind == Kind::Bool
    }

    pub fn is_int(&self) -> bool {
        matches!(self.kind, Kind::Int | Kind::IndirectInt)
    }

    pub fn is_uint(&self) -> bool {
        matches!(self.kind, Kind::Uint | Kind::IndirectUint)
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, Kind::Float | Kind::IndirectFloat)
    }

    pub fn is_string(&self) -> bool {
        self.kind == Kind::String
    }

    pub fn is_key(&self) -> bool {
        self.kind == Kind::Key
    }

    pub fn is_blob(&self) -> bool {
        self.kind == Kind::Blob
    }

    pub fn is_vector(&self) -> bool {
        self.kind == Kind::Vector || self.kind.is_typed_vector() || self.kind.is_fixed_typed_vector()
    }

    pub fn is_map(&self) -> bool {
        self.kind == Kind::Map
    }

    /// The varint trailer attached via the one-shot ext mechanism, if any.
    pub fn ext(&self) -> Option<i64> {
        if !self.has_ext {
            return None;
        }
        let target = self.indirect().ok()?;
        let end = match self.kind {
            Kind::String | Kind::Blob => {
                let len_loc = target.checked_sub(self.byte_width)?;
                let len = raw::read_u64(self.buf, len_loc, self.byte_width).ok()? as usize;
                let trailing = if self.kind == Kind::String { 1 } else { 0 };
                target + len + trailing
            }
            _ if self.is_vector() || self.is_map() => {
                let len = self.vector_len(target).ok()?;
                let typed = self.kind != Kind::Vector && self.kind != Kind::Map;
                target + len * self.byte_width + if typed { 0 } else { len }
            }
            _ => return None,
        };
        varint::read_signed(self.buf, end).ok().map(|(v, _)| v)
    }

    fn indirect(&self) -> Result<usize> {
        raw::indirect(self.buf, self.offset, self.parent_width)
    }

    /// The absolute buffer offset this value is stored at, for out-of-line
    /// kinds. Used by the cycle validator to track visited offsets.
    pub(crate) fn indirect_offset(&self) -> Result<usize> {
        self.indirect()
    }

    fn read_inline_u64(&self) -> u64 {
        raw::read_u64(self.buf, self.offset, self.parent_width).unwrap_or(0)
    }

    fn read_inline_i64(&self) -> i64 {
        raw::read_i64(self.buf, self.offset, self.parent_width).unwrap_or(0)
    }

    fn read_inline_f64(&self) -> f64 {
        if self.parent_width == 4 {
            raw::read_f64(self.buf, self.offset, 4).unwrap_or(0.0)
        } else {
            raw::read_f64(self.buf, self.offset, self.parent_width.max(4)).unwrap_or(0.0)
        }
    }

    fn read_indirect_i64(&self) -> i64 {
        self.indirect().and_then(|t| raw::read_i64(self.buf, t, self.byte_width)).unwrap_or(0)
    }

    fn read_indirect_u64(&self) -> u64 {
        self.indirect().and_then(|t| raw::read_u64(self.buf, t, self.byte_width)).unwrap_or(0)
    }

    fn read_indirect_f64(&self) -> f64 {
        self.indirect().and_then(|t| raw::read_f64(self.buf, t, self.byte_width)).unwrap_or(0.0)
    }

    pub fn as_bool(&self) -> bool {
        match self.kind {
            Kind::Bool => self.read_inline_u64() != 0,
            Kind::Int => self.read_inline_i64() != 0,
            Kind::Uint => self.read_inline_u64() != 0,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self.kind {
            Kind::Int | Kind::Bool => self.read_inline_i64(),
            Kind::IndirectInt => self.read_indirect_i64(),
            Kind::Uint => self.read_inline_u64() as i64,
            Kind::IndirectUint => self.read_indirect_u64() as i64,
            Kind::Float => self.as_f64() as i64,
            Kind::IndirectFloat => self.as_f64() as i64,
            _ => 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self.kind {
            Kind::Uint | Kind::Bool => self.read_inline_u64(),
            Kind::IndirectUint => self.read_indirect_u64(),
            Kind::Int => self.read_inline_i64() as u64,
            Kind::IndirectInt => self.read_indirect_i64() as u64,
            Kind::Float | Kind::IndirectFloat => self.as_f64() as u64,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.kind {
            Kind::Float => self.read_inline_f64(),
            Kind::IndirectFloat => self.read_indirect_f64(),
            Kind::Int => self.read_inline_i64() as f64,
            Kind::IndirectInt => self.read_indirect_i64() as f64,
            Kind::Uint => self.read_inline_u64() as f64,
            Kind::IndirectUint => self.read_indirect_u64() as f64,
            _ => 0.0,
        }
    }

    fn str_bytes(&self) -> Result<&'a [u8]> {
        if !matches!(self.kind, Kind::String | Kind::Key) {
            return Err(Error::TypeDoesNotMatch);
        }
        let target = self.indirect()?;
        if self.kind == Kind::Key {
            return raw::read_cstr(self.buf, target);
        }
        let len_loc = target.checked_sub(self.byte_width).ok_or(Error::OutOfRange)?;
        let len = raw::read_u64(self.buf, len_loc, self.byte_width)? as usize;
        let end = target.checked_add(len).ok_or(Error::OutOfRange)?;
        if end > self.buf.len() {
            return Err(Error::OutOfRange);
        }
        Ok(&self.buf[target..end])
    }

    pub fn try_as_str(&self) -> Result<&'a str> {
        let bytes = self.str_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidData)
    }

    pub fn as_string(&self) -> Result<&'a str> {
        self.try_as_str()
    }

    /// String value as a `&str`, or `""` if this isn't a string or key.
    pub fn string_value(&self) -> Result<&'a str> {
        self.try_as_str()
    }

    pub fn try_as_blob(&self) -> Result<&'a [u8]> {
        if self.kind != Kind::Blob {
            return Err(Error::TypeDoesNotMatch);
        }
        let target = self.indirect()?;
        let len_loc = target.checked_sub(self.byte_width).ok_or(Error::OutOfRange)?;
        let len = raw::read_u64(self.buf, len_loc, self.byte_width)? as usize;
        let end = target.checked_add(len).ok_or(Error::OutOfRange)?;
        if end > self.buf.len() {
            return Err(Error::OutOfRange);
        }
        Ok(&self.buf[target..end])
    }

    fn vector_len(&self, target: usize) -> Result<usize> {
        if self.kind.is_fixed_typed_vector() {
            let (_, len) = self.kind.from_fixed_typed_vector_element();
            Ok(len as usize)
        } else {
            let len_loc = target.checked_sub(self.byte_width).ok_or(Error::OutOfRange)?;
            Ok(raw::read_u64(self.buf, len_loc, self.byte_width)? as usize)
        }
    }

    fn element_kind(&self) -> Kind {
        if self.kind.is_typed_vector() {
            self.kind.from_typed_vector_element()
        } else if self.kind.is_fixed_typed_vector() {
            self.kind.from_fixed_typed_vector_element().0
        } else {
            Kind::Null
        }
    }

    pub fn try_as_vector(&self) -> Result<Vector<'a>> {
        if !self.is_vector() && self.kind != Kind::Map {
            return Err(Error::TypeDoesNotMatch);
        }
        let target = self.indirect()?;
        let len = self.vector_len(target)?;
        let typed = self.kind != Kind::Vector && self.kind != Kind::Map;
        Ok(Vector {
            buf: self.buf,
            target,
            len,
            byte_width: self.byte_width,
            typed,
            element_kind: if self.kind == Kind::Map { Kind::Null } else { self.element_kind() },
        })
    }

    pub fn as_vector(&self) -> Vector<'a> {
        self.try_as_vector().unwrap_or(Vector::empty(self.buf))
    }

    pub fn try_as_map(&self) -> Result<Map<'a>> {
        if self.kind != Kind::Map {
            return Err(Error::TypeDoesNotMatch);
        }
        let target = self.indirect()?;
        let values_len = self.vector_len(target)?;

        let keys_off_loc = target.checked_sub(3 * self.byte_width).ok_or(Error::OutOfRange)?;
        let keys_bw_loc = target.checked_sub(2 * self.byte_width).ok_or(Error::OutOfRange)?;
        let keys_delta = raw::read_u64(self.buf, keys_off_loc, self.byte_width)?;
        let keys_bw = raw::read_u64(self.buf, keys_bw_loc, self.byte_width)? as usize;
        let keys_target = keys_off_loc
            .checked_sub(keys_delta as usize)
            .ok_or(Error::OutOfRange)?;
        let keys_len_loc = keys_target.checked_sub(keys_bw).ok_or(Error::OutOfRange)?;
        let keys_len = raw::read_u64(self.buf, keys_len_loc, keys_bw)? as usize;

        Ok(Map {
            buf: self.buf,
            values_target: target,
            values_len,
            values_byte_width: self.byte_width,
            keys_target,
            keys_len,
            keys_byte_width: keys_bw,
        })
    }

    pub fn as_map(&self) -> Map<'a> {
        self.try_as_map().unwrap_or(Map::empty(self.buf))
    }

    // -- mutation ----------------------------------------------------------

    /// Overwrites an `Int` in place, provided the new value fits the
    /// existing slot width. Also accepts a `Uint` slot, casting the value,
    /// mirroring `as_i64`'s Int/Uint coercion. Handles both inline and
    /// `IndirectInt`/`IndirectUint` storage.
    pub fn mutate_int(&self, buf: &mut [u8], value: i64) -> Result<()> {
        match self.kind {
            Kind::Int => raw::write_i64(buf, self.offset, self.parent_width, value),
            Kind::Uint => raw::write_u64(buf, self.offset, self.parent_width, value as u64),
            Kind::IndirectInt => {
                let target = self.indirect()?;
                raw::write_i64(buf, target, self.byte_width, value)
            }
            Kind::IndirectUint => {
                let target = self.indirect()?;
                raw::write_u64(buf, target, self.byte_width, value as u64)
            }
            _ => Err(Error::TypeDoesNotMatch),
        }
    }

    /// Overwrites a `Uint` in place. Also accepts an `Int` slot, casting
    /// the value, mirroring `as_u64`'s coercion. Handles both inline and
    /// `IndirectUint`/`IndirectInt` storage.
    pub fn mutate_uint(&self, buf: &mut [u8], value: u64) -> Result<()> {
        match self.kind {
            Kind::Uint => raw::write_u64(buf, self.offset, self.parent_width, value),
            Kind::Int => raw::write_i64(buf, self.offset, self.parent_width, value as i64),
            Kind::IndirectUint => {
                let target = self.indirect()?;
                raw::write_u64(buf, target, self.byte_width, value)
            }
            Kind::IndirectInt => {
                let target = self.indirect()?;
                raw::write_i64(buf, target, self.byte_width, value as i64)
            }
            _ => Err(Error::TypeDoesNotMatch),
        }
    }

    /// Overwrites a `Float` in place as a 64-bit value. Handles both inline
    /// and `IndirectFloat` storage.
    pub fn mutate_f64(&self, buf: &mut [u8], value: f64) -> Result<()> {
        match self.kind {
            Kind::Float => raw::write_f64(buf, self.offset, self.parent_width, value),
            Kind::IndirectFloat => {
                let target = self.indirect()?;
                raw::write_f64(buf, target, self.byte_width, value)
            }
            _ => Err(Error::TypeDoesNotMatch),
        }
    }

    /// Overwrites a `Float` in place as a 32-bit value. Handles both inline
    /// and `IndirectFloat` storage.
    pub fn mutate_f32(&self, buf: &mut [u8], value: f32) -> Result<()> {
        match self.kind {
            Kind::Float => raw::write_f64(buf, self.offset, self.parent_width, value as f64),
            Kind::IndirectFloat => {
                let target = self.indirect()?;
                raw::write_f64(buf, target, self.byte_width, value as f64)
            }
            _ => Err(Error::TypeDoesNotMatch),
        }
    }

    /// Overwrites a `String` in place. The mechanism is non-growing, so the
    /// new UTF-8 payload must be exactly as long as the one it replaces;
    /// a different length fails with `UpdateDoesntFit` and leaves `buf`
    /// untouched.
    pub fn mutate_string(&self, buf: &mut [u8], value: &str) -> Result<()> {
        if self.kind != Kind::String {
            return Err(Error::TypeDoesNotMatch);
        }
        let target = self.indirect()?;
        let len_loc = target.checked_sub(self.byte_width).ok_or(Error::OutOfRange)?;
        let len = raw::read_u64(buf, len_loc, self.byte_width)? as usize;
        let bytes = value.as_bytes();
        if bytes.len() != len {
            return Err(Error::UpdateDoesntFit);
        }
        let end = target.checked_add(len).ok_or(Error::OutOfRange)?;
        if end > buf.len() {
            return Err(Error::OutOfRange);
        }
        buf[target..end].copy_from_slice(bytes);
        Ok(())
    }

    /// The null sentinel: an empty `Null` reference with no backing offset.
    /// Used where a lookup or descent misses rather than erroring, e.g.
    /// `Vector::at`'s infallible fallback and `Traverser::seek`.
    pub(crate) fn null(buf: &'a [u8]) -> Reference<'a> {
        Reference { buf, offset: 0, parent_width: 1, byte_width: 1, kind: Kind::Null, has_ext: false }
    }

    pub(crate) fn buf(&self) -> &'a [u8] {
        self.buf
    }
}

/// An untyped, typed, or fixed-typed vector view.
#[derive(Copy, Clone)]
pub struct Vector<'a> {
    buf: &'a [u8],
    target: usize,
    len: usize,
    byte_width: usize,
    typed: bool,
    element_kind: Kind,
}

impl<'a> Vector<'a> {
    fn empty(buf: &'a [u8]) -> Vector<'a> {
        Vector { buf, target: 0, len: 0, byte_width: 1, typed: false, element_kind: Kind::Null }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn try_at(&self, index: usize) -> Result<Reference<'a>> {
        if index >= self.len {
            return Err(Error::OutOfRange);
        }
        let slot = self.target + index * self.byte_width;
        if self.typed {
            Reference::from_packed_type(
                self.buf,
                slot,
                self.byte_width,
                width::pack_type(BitWidth::from_byte_width(self.byte_width), self.element_kind, false),
            )
        } else {
            let type_byte_loc = self.target + self.len * self.byte_width + index;
            if type_byte_loc >= self.buf.len() {
                return Err(Error::OutOfRange);
            }
            Reference::from_packed_type(self.buf, slot, self.byte_width, self.buf[type_byte_loc])
        }
    }

    /// Reference at `index`, or a `Null` reference if out of range.
    pub fn at(&self, index: usize) -> Reference<'a> {
        self.try_at(index).unwrap_or_else(|_| Reference::null(self.buf))
    }

    pub fn iter(&self) -> VectorIter<'a> {
        VectorIter { vector: *self, index: 0 }
    }

    pub(crate) fn target_offset(&self) -> usize {
        self.target
    }
}

pub struct VectorIter<'a> {
    vector: Vector<'a>,
    index: usize,
}

impl<'a> Iterator for VectorIter<'a> {
    type Item = Reference<'a>;
    fn next(&mut self) -> Option<Reference<'a>> {
        if self.index >= self.vector.len {
            return None;
        }
        let r = self.vector.at(self.index);
        self.index += 1;
        Some(r)
    }
}

/// A map view: a sorted keys vector plus a parallel values vector.
#[derive(Copy, Clone)]
pub struct Map<'a> {
    buf: &'a [u8],
    values_target: usize,
    values_len: usize,
    values_byte_width: usize,
    keys_target: usize,
    keys_len: usize,
    keys_byte_width: usize,
}

impl<'a> Map<'a> {
    fn empty(buf: &'a [u8]) -> Map<'a> {
        Map { buf, values_target: 0, values_len: 0, values_byte_width: 1, keys_target: 0, keys_len: 0, keys_byte_width: 1 }
    }

    pub fn len(&self) -> usize {
        self.values_len
    }

    pub fn is_empty(&self) -> bool {
        self.values_len == 0
    }

    pub fn keys(&self) -> Vector<'a> {
        Vector {
            buf: self.buf,
            target: self.keys_target,
            len: self.keys_len,
            byte_width: self.keys_byte_width,
            typed: true,
            element_kind: Kind::Key,
        }
    }

    pub(crate) fn values_offset(&self) -> usize {
        self.values_target
    }

    pub fn values(&self) -> Vector<'a> {
        Vector {
            buf: self.buf,
            target: self.values_target,
            len: self.values_len,
            byte_width: self.values_byte_width,
            typed: false,
            element_kind: Kind::Null,
        }
    }

    fn key_bytes_at(&self, index: usize) -> Result<&'a [u8]> {
        let slot = self.keys_target + index * self.keys_byte_width;
        let target = raw::indirect(self.buf, slot, self.keys_byte_width)?;
        raw::read_cstr(self.buf, target)
    }

    /// Looks up `key` among the sorted keys, using a binary search above
    /// `LOOKUP_BINARY_SEARCH_THRESHOLD` entries and a linear scan below it.
    pub fn try_get(&self, key: &str) -> Result<Reference<'a>> {
        let key = key.as_bytes();
        let idx = if self.keys_len >= LOOKUP_BINARY_SEARCH_THRESHOLD {
            self.binary_search(key)?
        } else {
            self.linear_search(key)?
        };
        self.values().try_at(idx)
    }

    pub fn get(&self, key: &str) -> Result<Reference<'a>> {
        self.try_get(key)
    }

    fn linear_search(&self, key: &[u8]) -> Result<usize> {
        for i in 0..self.keys_len {
            if self.key_bytes_at(i)? == key {
                return Ok(i);
            }
        }
        Err(Error::NotFound)
    }

    fn binary_search(&self, key: &[u8]) -> Result<usize> {
        let mut lo = 0usize;
        let mut hi = self.keys_len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = self.key_bytes_at(mid)?;
            match candidate.cmp(key) {
                std::cmp::Ordering::Equal => return Ok(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Err(Error::NotFound)
    }
}
