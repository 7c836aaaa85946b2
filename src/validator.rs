//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Structural validation.
//!
//! Every offset-bearing value is supposed to point strictly backwards into
//! already-written buffer, which for a well-formed document rules out
//! cycles by construction. A hand-crafted or corrupted buffer has no such
//! guarantee, so `validate` walks the reachable composites (vectors and
//! maps) with a visited-offset set and rejects re-entry. Strings, blobs and
//! keys are leaves -- descending into one never recurses further, and
//! sharing one through `ShareFlags::STRINGS`/`ShareFlags::KEYS` legitimately
//! visits the same offset from multiple parents, so they are read but not
//! tracked.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::reference::Reference;

/// Walks every value reachable from the root and confirms no composite
/// (vector or map) offset is entered twice.
pub fn validate(buf: &[u8]) -> Result<()> {
    let root = Reference::root(buf)?;
    let mut visited = HashSet::new();
    visit(&root, &mut visited)
}

fn visit<'a>(r: &Reference<'a>, visited: &mut HashSet<usize>) -> Result<()> {
    if r.is_vector() {
        let v = r.try_as_vector()?;
        if !visited.insert(v.target_offset()) {
            return Err(Error::RecursiveData);
        }
        for i in 0..v.len() {
            visit(&v.try_at(i)?, visited)?;
        }
    } else if r.is_map() {
        let m = r.try_as_map()?;
        if !visited.insert(m.values_offset()) {
            return Err(Error::RecursiveData);
        }
        let keys = m.keys();
        for i in 0..keys.len() {
            visit(&keys.try_at(i)?, visited)?;
        }
        let values = m.values();
        for i in 0..values.len() {
            visit(&values.try_at(i)?, visited)?;
        }
    } else if r.is_string() {
        r.try_as_str()?;
    } else if r.is_key() {
        r.try_as_str()?;
    } else if r.is_blob() {
        r.try_as_blob()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn test_flat_document_validates() {
        let mut b = Builder::new();
        let start = b.start_vector();
        b.push_int(1);
        b.push_string("hi").unwrap();
        b.end_vector(start, false, false).unwrap();
        b.finish().unwrap();
        assert!(validate(b.finished_buffer()).is_ok());
    }

    #[test]
    fn test_nested_document_validates() {
        let mut b = Builder::new();
        let outer = b.start_vector();
        let inner = b.start_map();
        b.push_key(b"a").unwrap();
        b.push_int(1);
        b.end_map(inner).unwrap();
        b.end_vector(outer, false, false).unwrap();
        b.finish().unwrap();
        assert!(validate(b.finished_buffer()).is_ok());
    }

    #[test]
    fn test_crafted_cycle_is_rejected() {
        use crate::width::{pack_type, BitWidth, Kind};

        // A one-element vector of a single small int is laid out as
        // [count=1][elem][type_byte][root_offset][root_packed][root_bw],
        // with the element living at offset 1. Retag that slot as a
        // Vector whose offset field is zero, so descending into it
        // resolves back to the same offset the outer vector already
        // occupies.
        let mut b = Builder::new();
        let start = b.start_vector();
        b.push_int(5);
        b.end_vector(start, false, false).unwrap();
        b.finish().unwrap();
        let mut buf = b.finished_buffer().to_vec();
        assert_eq!(buf.len(), 6, "layout assumption changed, update the test");

        buf[1] = 0;
        buf[2] = pack_type(BitWidth::W8, Kind::Vector, false);

        assert_eq!(validate(&buf), Err(Error::RecursiveData));
    }

    #[test]
    fn test_corrupted_key_nul_terminator_rejected() {
        let mut b = Builder::new();
        let start = b.start_map();
        b.push_key(b"x").unwrap();
        b.push_int(1);
        b.end_map(start).unwrap();
        b.finish().unwrap();
        let mut buf = b.finished_buffer().to_vec();
        assert_eq!(&buf[0..2], b"x\0", "layout assumption changed, update the test");
        buf[1] = b'y';
        assert!(validate(&buf).is_err());
    }
}
