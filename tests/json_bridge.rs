//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use flexdoc::{document_to_json, json_to_document, Reference};

#[test]
fn object_with_nested_array_round_trips_through_json() {
    // Map keys come back out in sorted order, not insertion order, so the
    // input here is already alphabetical to make the round trip exact.
    let text = r#"{"count":3,"name":"widget","tags":["a","b","c"]}"#;
    let doc = json_to_document(text).unwrap();
    let back = document_to_json(&doc).unwrap();
    assert_eq!(back, text);
}

#[test]
fn floats_and_negative_numbers_survive_the_bridge() {
    let doc = json_to_document("[-1, 2.5, -3.25]").unwrap();
    let root = Reference::root(&doc).unwrap();
    let v = root.as_vector();
    assert_eq!(v.at(0).as_i64(), -1);
    assert_eq!(v.at(1).as_f64(), 2.5);
    assert_eq!(v.at(2).as_f64(), -3.25);
}

#[test]
fn blob_like_binary_document_renders_as_base64_string() {
    use flexdoc::Builder;
    let mut b = Builder::new();
    b.push_blob(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    b.finish().unwrap();
    let text = document_to_json(b.finished_buffer()).unwrap();
    assert_eq!(text, "\"3q2+7w==\"");
}

#[test]
fn malformed_json_is_rejected() {
    assert!(json_to_document("{not json}").is_err());
    assert!(json_to_document("[1, 2,").is_err());
}
