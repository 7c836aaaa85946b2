//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use flexdoc::{validate, Builder, Traverser};

fn sample_document() -> Vec<u8> {
    let mut b = Builder::new();
    let root = b.start_map();
    b.push_key(b"users").unwrap();
    let users = b.start_vector();
    let u1 = b.start_map();
    b.push_key(b"name").unwrap();
    b.push_string("alice").unwrap();
    b.end_map(u1).unwrap();
    let u2 = b.start_map();
    b.push_key(b"name").unwrap();
    b.push_string("bob").unwrap();
    b.end_map(u2).unwrap();
    b.end_vector(users, false, false).unwrap();
    b.end_map(root).unwrap();
    b.finish().unwrap();
    b.finished_buffer().to_vec()
}

#[test]
fn traverser_descends_path_then_index() {
    let buf = sample_document();
    let mut t = Traverser::root(&buf).unwrap();
    t.seek("users");
    t.seek_index(1);
    t.seek("name");
    assert_eq!(t.current().as_string().unwrap(), "bob");
}

#[test]
fn validate_accepts_well_formed_documents() {
    let buf = sample_document();
    assert!(validate(&buf).is_ok());
}

#[test]
fn validate_rejects_truncated_buffers() {
    let buf = sample_document();
    let truncated = &buf[..buf.len() - 3];
    assert!(validate(truncated).is_err());
}
