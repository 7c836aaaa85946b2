//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Reads length-prefixed binary document frames from stdin, writes
//! length-prefixed JSON text frames to stdout. Validates each document
//! before rendering it. Takes no flags; set `RUST_LOG=info` for per-frame
//! diagnostics.

use std::io::{self, BufReader, BufWriter};
use std::process;

use flexdoc::cli::{read_frame, write_frame};
use flexdoc::json::document_to_json;
use flexdoc::validate;

fn run() -> flexdoc::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());

    let mut frame_number = 0u64;
    while let Some(frame) = read_frame(&mut reader)? {
        frame_number += 1;
        validate(&frame)?;
        let text = document_to_json(&frame)?;
        log::info!("decoded frame {} ({} bytes document -> {} bytes json)", frame_number, frame.len(), text.len());
        write_frame(&mut writer, text.as_bytes())?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        log::error!("{}", err);
        eprintln!("doc2json: {}", err);
        process::exit(1);
    }
}
