//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Path-based cursor.
//!
//! `Traverser` walks a document one dotted-path segment at a time,
//! reusing the same map lookup `Map::get` uses so a path descent costs no
//! more than looking each segment up directly.

use crate::error::Result;
use crate::reference::Reference;

pub struct Traverser<'a> {
    buf: &'a [u8],
    current: Reference<'a>,
}

impl<'a> Traverser<'a> {
    pub fn new(root: Reference<'a>) -> Traverser<'a> {
        Traverser {
            buf: root.buf(),
            current: root,
        }
    }

    pub fn root(buf: &'a [u8]) -> Result<Traverser<'a>> {
        Ok(Traverser::new(Reference::root(buf)?))
    }

    pub fn current(&self) -> Reference<'a> {
        self.current
    }

    /// Descends through a `.`-separated path of map keys. Empty segments
    /// (a leading or doubled `.`) are skipped. Never errors: if the cursor
    /// stops being a map partway through the path, descent halts with the
    /// cursor left as-is; if a segment misses, the cursor becomes the null
    /// sentinel.
    pub fn seek(&mut self, path: &str) {
        for segment in path.split('.') {
            if segment.is_empty() {
                continue;
            }
            if !self.current.is_map() {
                return;
            }
            self.current = match self
                .current
                .try_as_map()
                .and_then(|m| m.try_get(segment))
            {
                Ok(found) => found,
                Err(_) => Reference::null(self.buf),
            };
        }
    }

    /// Descends into a vector element by index. Never errors: if the cursor
    /// isn't a vector the cursor is left as-is; an out-of-range index sets
    /// it to the null sentinel.
    pub fn seek_index(&mut self, index: usize) {
        if !self.current.is_vector() {
            return;
        }
        self.current = match self.current.try_as_vector().and_then(|v| v.try_at(index)) {
            Ok(found) => found,
            Err(_) => Reference::null(self.buf),
        };
    }
}
