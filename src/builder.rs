//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The streaming document builder.
//!
//! `Builder` is a single-writer state machine: values are pushed onto an
//! internal stack, and composite values (`Vector`/`Map`) are materialised
//! by walking a contiguous slice of that stack back into the growing byte
//! buffer. Nothing here retains references into caller memory beyond
//! copied key/string/blob bytes.

use std::collections::HashMap;
use std::hash::Hasher;

use crate::error::{Error, Result};
use crate::raw;
use crate::value::Value;
use crate::varint;
use crate::width::{self, padding_bytes, width_u, BitWidth, Kind};

/// Controls which content pools the builder deduplicates through.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ShareFlags(u8);

impl ShareFlags {
    pub const NONE: ShareFlags = ShareFlags(0);
    pub const KEYS: ShareFlags = ShareFlags(1);
    pub const STRINGS: ShareFlags = ShareFlags(2);
    pub const KEY_VECTORS: ShareFlags = ShareFlags(4);
    pub const ALL: ShareFlags = ShareFlags(1 | 2 | 4);

    pub fn contains(self, other: ShareFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ShareFlags {
    type Output = ShareFlags;
    fn bitor(self, rhs: ShareFlags) -> ShareFlags {
        ShareFlags(self.0 | rhs.0)
    }
}

/// `{hash -> (offset, length)}`, verified by memcmp on lookup. First-wins on
/// hash collision: a populated slot is never overwritten.
type ContentPool = HashMap<u64, (usize, usize)>;

fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = ahash::AHasher::default();
    hasher.write(data);
    hasher.finish()
}

pub struct Builder {
    buf: Vec<u8>,
    stack: Vec<Value>,
    flags: ShareFlags,
    finished: bool,
    force_min_width: BitWidth,
    pending_ext: Option<i64>,
    ext_marks: HashMap<usize, i64>,
    key_pool: ContentPool,
    string_pool: ContentPool,
    key_vector_pool: HashMap<u64, (usize, usize)>,
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

impl Builder {
    pub fn new() -> Builder {
        Builder::with_flags(ShareFlags::NONE)
    }

    pub fn with_flags(flags: ShareFlags) -> Builder {
        Builder {
            buf: Vec::with_capacity(64),
            stack: Vec::new(),
            flags,
            finished: false,
            force_min_width: BitWidth::W8,
            pending_ext: None,
            ext_marks: HashMap::new(),
            key_pool: HashMap::new(),
            string_pool: HashMap::new(),
            key_vector_pool: HashMap::new(),
        }
    }

    /// Resets the builder so it can build a fresh document, discarding all
    /// state including the dedup pools (which live only as long as the
    /// builder that owns them).
    pub fn clear(&mut self) {
        self.buf.clear();
        self.stack.clear();
        self.finished = false;
        self.force_min_width = BitWidth::W8;
        self.pending_ext = None;
        self.ext_marks.clear();
        self.key_pool.clear();
        self.string_pool.clear();
        self.key_vector_pool.clear();
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The finished document. Panics if `finish()` has not succeeded yet,
    /// since reading an in-progress buffer is always a caller bug.
    pub fn finished_buffer(&self) -> &[u8] {
        assert!(self.finished, "buffer is not finished");
        &self.buf
    }

    fn align(&mut self, width: BitWidth) -> usize {
        let byte_width = width.byte_width();
        let pad = padding_bytes(self.buf.len(), byte_width);
        self.buf.resize(self.buf.len() + pad, 0);
        byte_width
    }

    fn append_uint(&mut self, value: u64, byte_width: usize) {
        let bytes = value.to_le_bytes();
        self.buf.extend_from_slice(&bytes[..byte_width]);
    }

    fn append_int(&mut self, value: i64, byte_width: usize) {
        let bytes = value.to_le_bytes();
        self.buf.extend_from_slice(&bytes[..byte_width]);
    }

    fn append_float(&mut self, value: f64, byte_width: usize) {
        match byte_width {
            4 => self.buf.extend_from_slice(&(value as f32).to_le_bytes()),
            8 => self.buf.extend_from_slice(&value.to_le_bytes()),
            _ => unreachable!("float byte width is always 4 or 8"),
        }
    }

    fn write_offset_here(&mut self, target: usize, byte_width: usize) -> Result<()> {
        let reloff = self.buf.len() as u64 - target as u64;
        if byte_width != 8 && reloff >= (1u64 << (byte_width * 8)) {
            return Err(Error::OutOfRange);
        }
        self.append_uint(reloff, byte_width);
        Ok(())
    }

    fn write_any(&mut self, value: &Value, byte_width: usize) -> Result<()> {
        match value.kind {
            Kind::Null | Kind::Int => {
                self.append_int(value.as_i64(), byte_width);
                Ok(())
            }
            Kind::Bool | Kind::Uint => {
                self.append_uint(value.as_u64(), byte_width);
                Ok(())
            }
            Kind::Float => {
                self.append_float(value.as_f64(), byte_width);
                Ok(())
            }
            _ => self.write_offset_here(value.payload as usize, byte_width),
        }
    }

    // -- scalars ---------------------------------------------------------

    pub fn push_null(&mut self) {
        self.stack.push(Value::null());
    }

    pub fn push_bool(&mut self, b: bool) {
        self.stack.push(Value::bool(b));
    }

    pub fn push_int(&mut self, i: i64) {
        self.stack.push(Value::int(i));
    }

    pub fn push_uint(&mut self, u: u64) {
        self.stack.push(Value::uint(u));
    }

    pub fn push_f32(&mut self, f: f32) {
        self.stack.push(Value::float32(f));
    }

    pub fn push_f64(&mut self, f: f64) {
        self.stack.push(Value::float64(f));
    }

    pub fn push_indirect_int(&mut self, i: i64) -> usize {
        let bw = width::width_i(i);
        let byte_width = self.align(bw);
        let sloc = self.buf.len();
        self.append_int(i, byte_width);
        self.stack.push(Value::offset(sloc, Kind::IndirectInt, bw, false));
        sloc
    }

    pub fn push_indirect_uint(&mut self, u: u64) -> usize {
        let bw = width_u(u);
        let byte_width = self.align(bw);
        let sloc = self.buf.len();
        self.append_uint(u, byte_width);
        self.stack.push(Value::offset(sloc, Kind::IndirectUint, bw, false));
        sloc
    }

    pub fn push_indirect_f32(&mut self, f: f32) -> usize {
        let byte_width = self.align(BitWidth::W32);
        let sloc = self.buf.len();
        self.append_float(f as f64, byte_width);
        self.stack.push(Value::offset(sloc, Kind::IndirectFloat, BitWidth::W32, false));
        sloc
    }

    pub fn push_indirect_f64(&mut self, f: f64) -> usize {
        let bw = width::width_f(f);
        let byte_width = self.align(bw);
        let sloc = self.buf.len();
        self.append_float(f, byte_width);
        self.stack.push(Value::offset(sloc, Kind::IndirectFloat, bw, false));
        sloc
    }

    // -- keys, strings, blobs --------------------------------------------

    /// Writes a NUL-terminated key and pushes a `Key` stack value. With
    /// `ShareFlags::KEYS`, an identical key sequence already in the buffer
    /// is reused instead of being written again.
    pub fn push_key(&mut self, key: &[u8]) -> Result<usize> {
        if self.flags.contains(ShareFlags::KEYS) {
            let hash = hash_bytes(key);
            if let Some(&(prev_offset, prev_len)) = self.key_pool.get(&hash) {
                if prev_len == key.len() && &self.buf[prev_offset..prev_offset + prev_len] == key {
                    self.stack.push(Value::offset(prev_offset, Kind::Key, BitWidth::W8, false));
                    return Ok(prev_offset);
                }
            }
        }
        let sloc = self.buf.len();
        self.buf.extend_from_slice(key);
        self.buf.push(0);
        if self.flags.contains(ShareFlags::KEYS) {
            let hash = hash_bytes(key);
            self.key_pool.entry(hash).or_insert((sloc, key.len()));
        }
        self.stack.push(Value::offset(sloc, Kind::Key, BitWidth::W8, false));
        Ok(sloc)
    }

    fn create_blob(&mut self, data: &[u8], trailing: usize, kind: Kind, shareable: bool) -> Result<usize> {
        let ext = self.pending_ext.take();
        if ext.is_none() && shareable && self.flags.contains(ShareFlags::STRINGS) {
            let hash = hash_bytes(data);
            if let Some(&(prev_sloc, prev_len)) = self.string_pool.get(&hash) {
                if prev_len == data.len() && &self.buf[prev_sloc..prev_sloc + prev_len] == data {
                    let bw = width_u(data.len() as u64);
                    self.stack.push(Value::offset(prev_sloc, kind, bw, false));
                    return Ok(prev_sloc);
                }
            }
        }

        let bit_width = width_u(data.len() as u64);
        let byte_width = self.align(bit_width);
        self.append_uint(data.len() as u64, byte_width);
        let sloc = self.buf.len();
        self.buf.extend_from_slice(data);
        for _ in 0..trailing {
            self.buf.push(0);
        }

        if ext.is_none() && shareable && self.flags.contains(ShareFlags::STRINGS) {
            let hash = hash_bytes(data);
            self.string_pool.entry(hash).or_insert((sloc, data.len()));
        }

        if let Some(e) = ext {
            varint::write_signed(&mut self.buf, e);
        }

        self.stack.push(Value::offset(sloc, kind, bit_width, ext.is_some()));
        Ok(sloc)
    }

    /// Writes a UTF-8 string with a trailing NUL. With `ShareFlags::STRINGS`
    /// an identical payload already in the buffer is reused.
    pub fn push_string(&mut self, s: &str) -> Result<usize> {
        self.create_blob(s.as_bytes(), 1, Kind::String, true)
    }

    /// Writes an opaque byte blob. Blobs are never deduplicated.
    pub fn push_blob(&mut self, data: &[u8]) -> Result<usize> {
        self.create_blob(data, 0, Kind::Blob, false)
    }

    // -- extension trailer -------------------------------------------------

    /// Arms a one-shot extension integer: the next composite/string/blob
    /// emitted carries it in its trailer and in its packed-type ext bit.
    pub fn set_ext(&mut self, i: i64) {
        self.pending_ext = Some(i);
    }

    // -- vectors and maps --------------------------------------------------

    pub fn start_vector(&mut self) -> usize {
        let mark = self.stack.len();
        if let Some(e) = self.pending_ext.take() {
            self.ext_marks.insert(mark, e);
        }
        mark
    }

    pub fn start_map(&mut self) -> usize {
        self.start_vector()
    }

    pub fn end_vector(&mut self, start: usize, typed: bool, fixed: bool) -> Result<u64> {
        if start > self.stack.len() {
            return Err(Error::InvalidData);
        }
        let ext = self.ext_marks.remove(&start);
        let vec_len = self.stack.len() - start;
        let v = self.create_vector(start, vec_len, 1, typed, fixed, None, ext)?;
        self.stack.truncate(start);
        self.stack.push(v);
        Ok(v.as_u64())
    }

    pub fn end_map(&mut self, start: usize) -> Result<u64> {
        if start > self.stack.len() {
            return Err(Error::InvalidData);
        }
        let count = self.stack.len() - start;
        if count % 2 != 0 {
            return Err(Error::OddSizeMapContent);
        }
        let pair_count = count / 2;
        for i in (start..self.stack.len()).step_by(2) {
            if self.stack[i].kind != Kind::Key {
                return Err(Error::InvalidData);
            }
        }
        self.sort_map_pairs(start, pair_count)?;

        let ext = self.ext_marks.remove(&start);
        let keys = self.emit_keys_vector(start, pair_count)?;
        let values = self.create_vector(start + 1, pair_count, 2, false, false, Some(&keys), ext)?;
        self.stack.truncate(start);
        self.stack.push(values);
        Ok(values.as_u64())
    }

    /// Sorts the `[start, start + 2*pair_count)` stack slice by key bytes,
    /// keeping each key/value pair together. Rust's `sort_by` is stable, so
    /// entries with duplicate keys (permitted, not deduplicated) retain
    /// their relative insertion order.
    fn sort_map_pairs(&mut self, start: usize, pair_count: usize) -> Result<()> {
        let mut entries = Vec::with_capacity(pair_count);
        for i in 0..pair_count {
            let key_val = self.stack[start + 2 * i];
            let val_val = self.stack[start + 2 * i + 1];
            let key_bytes = raw::read_cstr(&self.buf, key_val.payload as usize)?.to_vec();
            entries.push((key_bytes, key_val, val_val));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (i, (_, k, v)) in entries.into_iter().enumerate() {
            self.stack[start + 2 * i] = k;
            self.stack[start + 2 * i + 1] = v;
        }
        Ok(())
    }

    fn emit_keys_vector(&mut self, start: usize, pair_count: usize) -> Result<Value> {
        if self.flags.contains(ShareFlags::KEY_VECTORS) {
            let mut hasher = ahash::AHasher::default();
            for i in 0..pair_count {
                let key_offset = self.stack[start + 2 * i].payload as usize;
                let bytes = raw::read_cstr(&self.buf, key_offset)?;
                hasher.write(bytes);
                hasher.write(&[0]);
            }
            let hash = hasher.finish();
            if let Some(&(prev_offset, prev_bw)) = self.key_vector_pool.get(&hash) {
                if self.keys_vector_matches(prev_offset, prev_bw, start, pair_count) {
                    return Ok(Value::offset(
                        prev_offset,
                        Kind::VectorKey,
                        BitWidth::from_byte_width(prev_bw),
                        false,
                    ));
                }
            }
            let v = self.create_vector(start, pair_count, 2, true, false, None, None)?;
            self.key_vector_pool
                .entry(hash)
                .or_insert((v.payload as usize, v.min_width.byte_width()));
            Ok(v)
        } else {
            self.create_vector(start, pair_count, 2, true, false, None, None)
        }
    }

    fn keys_vector_matches(&self, prev_offset: usize, prev_bw: usize, start: usize, pair_count: usize) -> bool {
        let size_loc = match prev_offset.checked_sub(prev_bw) {
            Some(loc) => loc,
            None => return false,
        };
        let prev_count = match raw::read_u64(&self.buf, size_loc, prev_bw) {
            Ok(n) => n as usize,
            Err(_) => return false,
        };
        if prev_count != pair_count {
            return false;
        }
        for i in 0..pair_count {
            let new_key_off = self.stack[start + 2 * i].payload as usize;
            let new_key = match raw::read_cstr(&self.buf, new_key_off) {
                Ok(b) => b,
                Err(_) => return false,
            };
            let elem_off = prev_offset + i * prev_bw;
            let target = match raw::indirect(&self.buf, elem_off, prev_bw) {
                Ok(t) => t,
                Err(_) => return false,
            };
            let prev_key = match raw::read_cstr(&self.buf, target) {
                Ok(b) => b,
                Err(_) => return false,
            };
            if new_key != prev_key {
                return false;
            }
        }
        true
    }

    /// Materialises the stack slice `start, start+step, start+2*step, ...`
    /// (`vec_len` elements) into the buffer as a vector, typed vector,
    /// fixed-typed vector or (when `keys` is supplied) the values half of
    /// a map.
    fn create_vector(
        &mut self,
        start: usize,
        vec_len: usize,
        step: usize,
        typed: bool,
        fixed: bool,
        keys: Option<&Value>,
        ext: Option<i64>,
    ) -> Result<Value> {
        let mut bit_width = self.force_min_width.max(width_u(vec_len as u64));
        let mut prefix_elems = 1usize;
        if let Some(k) = keys {
            bit_width = bit_width.max(k.elem_width(self.buf.len(), 0));
            prefix_elems += 2;
        }

        let limit = start + vec_len * step;
        let mut vector_type = Kind::Key;
        let mut i = start;
        let mut first = true;
        while i < limit {
            let elem = self.stack[i];
            let elem_width = elem.elem_width(self.buf.len(), i + prefix_elems);
            bit_width = bit_width.max(elem_width);
            if typed {
                if first {
                    vector_type = elem.kind;
                    first = false;
                } else if elem.kind != vector_type {
                    return Err(Error::InvalidData);
                }
            }
            i += step;
        }

        if typed && vec_len > 0 {
            let element_allowed = if fixed {
                vector_type.is_fixed_typed_vector_element()
            } else {
                vector_type.is_typed_vector_element()
            };
            if !element_allowed {
                return Err(Error::InvalidData);
            }
        }

        let byte_width = self.align(bit_width);

        if let Some(k) = keys {
            self.write_offset_here(k.payload as usize, byte_width)?;
            self.append_uint(k.min_width.byte_width() as u64, byte_width);
        }
        if !fixed {
            self.append_uint(vec_len as u64, byte_width);
        }

        let vloc = self.buf.len();
        let mut i = start;
        while i < limit {
            let elem = self.stack[i];
            self.write_any(&elem, byte_width)?;
            i += step;
        }

        if !typed {
            let mut i = start;
            while i < limit {
                let elem = self.stack[i];
                self.buf.push(elem.stored_packed_type(BitWidth::from_byte_width(byte_width)));
                i += step;
            }
        }

        if let Some(e) = ext {
            varint::write_signed(&mut self.buf, e);
        }

        let final_kind = if keys.is_some() {
            Kind::Map
        } else if typed {
            let fixed_len = if fixed { vec_len } else { 0 };
            vector_type.to_typed_vector(fixed_len).ok_or(Error::InvalidData)?
        } else {
            Kind::Vector
        };

        Ok(Value {
            payload: vloc as i64,
            kind: final_kind,
            min_width: BitWidth::from_byte_width(byte_width),
            has_ext: ext.is_some(),
        })
    }

    /// Aligns the root, writes it, then the two footer bytes (packed type,
    /// byte width). Fails if nothing has been pushed.
    pub fn finish(&mut self) -> Result<()> {
        if self.stack.is_empty() {
            return Err(Error::InvalidData);
        }
        let root = self.stack[0];
        let root_width = root.elem_width(self.buf.len(), 0);
        let byte_width = self.align(root_width);
        self.write_any(&root, byte_width)?;
        self.buf.push(root.stored_packed_type(BitWidth::W8));
        self.buf.push(byte_width as u8);
        self.finished = true;
        Ok(())
    }
}
