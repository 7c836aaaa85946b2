//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use flexdoc::{Builder, Reference, ShareFlags};

#[test]
fn sharing_does_not_change_observed_values() {
    let mut b = Builder::with_flags(ShareFlags::ALL);
    let outer = b.start_vector();
    for _ in 0..3 {
        let m = b.start_map();
        b.push_key(b"kind").unwrap();
        b.push_string("widget").unwrap();
        b.end_map(m).unwrap();
    }
    b.end_vector(outer, false, false).unwrap();
    b.finish().unwrap();

    let r = Reference::root(b.finished_buffer()).unwrap();
    let v = r.as_vector();
    for i in 0..3 {
        assert_eq!(v.at(i).as_map().get("kind").unwrap().as_string().unwrap(), "widget");
    }
}

#[test]
fn sharing_produces_a_smaller_buffer_than_no_sharing() {
    fn build(flags: ShareFlags) -> usize {
        let mut b = Builder::with_flags(flags);
        let outer = b.start_vector();
        for _ in 0..8 {
            let m = b.start_map();
            b.push_key(b"kind").unwrap();
            b.push_string("widget").unwrap();
            b.push_key(b"owner").unwrap();
            b.push_string("team-rocket").unwrap();
            b.end_map(m).unwrap();
        }
        b.end_vector(outer, false, false).unwrap();
        b.finish().unwrap();
        b.finished_buffer().len()
    }

    let shared = build(ShareFlags::ALL);
    let unshared = build(ShareFlags::NONE);
    assert!(shared < unshared, "shared={} unshared={}", shared, unshared);
}

#[test]
fn key_sharing_is_content_addressed_not_identity_addressed() {
    let mut b = Builder::with_flags(ShareFlags::KEYS);
    let a = b.push_key(b"same").unwrap();
    let owned = String::from("same");
    let c = b.push_key(owned.as_bytes()).unwrap();
    assert_eq!(a, c);
}
