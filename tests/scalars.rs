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
fn null_round_trips() {
    let mut b = Builder::new();
    b.push_null();
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    assert!(root.is_null());
}

#[test]
fn negative_int_round_trips() {
    let mut b = Builder::new();
    b.push_int(-12345);
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    assert_eq!(root.as_i64(), -12345);
}

#[test]
fn large_uint_round_trips() {
    let mut b = Builder::new();
    b.push_uint(u64::MAX);
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    assert_eq!(root.as_u64(), u64::MAX);
}

#[test]
fn float_picks_narrowest_lossless_width() {
    let mut b = Builder::new();
    b.push_f64(2.5);
    b.finish().unwrap();
    let buf = b.finished_buffer();
    // 2.5 round-trips through f32, so the whole document (header + value +
    // footer) fits in a handful of bytes rather than widening to f64.
    assert!(buf.len() <= 6);
    let root = Reference::root(buf).unwrap();
    assert_eq!(root.as_f64(), 2.5);
}

#[test]
fn indirect_int_round_trips() {
    let mut b = Builder::new();
    b.push_indirect_int(70000);
    b.finish().unwrap();
    let root = Reference::root(b.finished_buffer()).unwrap();
    assert_eq!(root.as_i64(), 70000);
}
