//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Length-prefixed framing for the `json2doc`/`doc2json` pipes.
//!
//! Each message on stdin/stdout is a big-endian `u32` byte count followed
//! by that many bytes. Neither binary takes flags; behavior is controlled
//! entirely by which one you run and `RUST_LOG` for diagnostics.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Reads one length-prefixed frame from `reader`. Returns `Ok(None)` on a
/// clean EOF before any byte of the length prefix is read.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io(e.to_string())),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(|e| Error::Io(e.to_string()))?;
    Ok(Some(buf))
}

/// Writes one length-prefixed frame to `writer`.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(Error::SizeOverflow);
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).map_err(|e| Error::Io(e.to_string()))?;
    writer.write_all(payload).map_err(|e| Error::Io(e.to_string()))?;
    writer.flush().map_err(|e| Error::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip_frame() {
        let mut out = Vec::new();
        write_frame(&mut out, b"hello").unwrap();
        let mut cursor = Cursor::new(out);
        let frame = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[test]
    fn test_clean_eof_returns_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(read_frame(&mut cursor).unwrap(), None);
    }
}
