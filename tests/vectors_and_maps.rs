//
// Copyright 2020 flexdoc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use flexdoc::{Builder, Reference};

#[test]
fn typed_int_vector_round_trips() {
    let mut b = Builder::new();
    let start = b.start_vector();
    b.push_int(1);
    b.push_int(2);
    b.push_int(3);
    b.end_vector(start, true, false).unwrap();
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    let v = root.as_vector();
    assert_eq!(v.len(), 3);
    assert_eq!((0..3).map(|i| v.at(i).as_i64()).sum::<i64>(), 6);
}

#[test]
fn fixed_typed_vector_of_three_round_trips() {
    let mut b = Builder::new();
    let start = b.start_vector();
    b.push_f32(1.0);
    b.push_f32(2.0);
    b.push_f32(3.0);
    b.end_vector(start, true, true).unwrap();
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    let v = root.as_vector();
    assert_eq!(v.len(), 3);
    assert_eq!(v.at(2).as_f64(), 3.0);
}

#[test]
fn mixed_typed_vector_rejected() {
    let mut b = Builder::new();
    let start = b.start_vector();
    b.push_int(1);
    b.push_string("oops").unwrap();
    assert!(b.end_vector(start, true, false).is_err());
}

#[test]
fn nested_vectors_and_maps_round_trip() {
    let mut b = Builder::new();
    let root = b.start_vector();
    let m1 = b.start_map();
    b.push_key(b"name").unwrap();
    b.push_string("alice").unwrap();
    b.push_key(b"age").unwrap();
    b.push_int(30);
    b.end_map(m1).unwrap();
    let m2 = b.start_map();
    b.push_key(b"name").unwrap();
    b.push_string("bob").unwrap();
    b.push_key(b"age").unwrap();
    b.push_int(25);
    b.end_map(m2).unwrap();
    b.end_vector(root, false, false).unwrap();
    b.finish().unwrap();

    let r = Reference::root(b.finished_buffer()).unwrap();
    let people = r.as_vector();
    assert_eq!(people.len(), 2);
    assert_eq!(people.at(0).as_map().get("name").unwrap().as_string().unwrap(), "alice");
    assert_eq!(people.at(1).as_map().get("age").unwrap().as_i64(), 25);
}

#[test]
fn empty_vector_and_map_round_trip() {
    let mut b = Builder::new();
    let outer = b.start_vector();
    let v = b.start_vector();
    b.end_vector(v, false, false).unwrap();
    let m = b.start_map();
    b.end_map(m).unwrap();
    b.end_vector(outer, false, false).unwrap();
    b.finish().unwrap();

    let r = Reference::root(b.finished_buffer()).unwrap();
    let outer_vec = r.as_vector();
    assert_eq!(outer_vec.len(), 2);
    assert_eq!(outer_vec.at(0).as_vector().len(), 0);
    assert_eq!(outer_vec.at(1).as_map().len(), 0);
}

#[test]
fn map_keys_are_sorted_and_duplicates_keep_order() {
    let mut b = Builder::new();
    let start = b.start_map();
    b.push_key(b"dup").unwrap();
    b.push_int(1);
    b.push_key(b"dup").unwrap();
    b.push_int(2);
    b.push_key(b"aaa").unwrap();
    b.push_int(3);
    b.end_map(start).unwrap();
    b.finish().unwrap();

    let r = Reference::root(b.finished_buffer()).unwrap();
    let m = r.as_map();
    let keys = m.keys();
    assert_eq!(keys.at(0).string_value().unwrap(), "aaa");
    assert_eq!(keys.at(1).string_value().unwrap(), "dup");
    assert_eq!(keys.at(2).string_value().unwrap(), "dup");
    // First match wins on a linear/binary search over duplicate keys.
    assert_eq!(m.get("dup").unwrap().as_i64(), 1);
}
