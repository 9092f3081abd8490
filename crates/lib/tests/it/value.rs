//! Identifiers, numerics, frames and tagged values.

use std::{cmp::Ordering, collections::HashSet};

use qof::{Book, Frame, Guid, KvpValue, Numeric, Timespec, Value, ValueKind};

use crate::helpers::{get, new_customer, test_runtime};

#[test]
fn fresh_identifiers_are_distinct_and_never_null() {
    let guids: Vec<Guid> = (0..1000).map(|_| Guid::new()).collect();
    let unique: HashSet<Guid> = guids.iter().copied().collect();
    assert_eq!(unique.len(), guids.len());
    assert!(guids.iter().all(|g| !g.is_null()));
    assert!(Guid::null().is_null());
    assert_eq!(Guid::default(), Guid::null());
}

#[test]
fn identifiers_round_trip_through_text() {
    let guid = Guid::new();
    let text = guid.to_string();
    assert_eq!(text.len(), 32);
    assert_eq!(text.parse::<Guid>().unwrap(), guid);

    let err: qof::Error = "xyz".parse::<Guid>().unwrap_err().into();
    assert_eq!(err.module(), "guid");
}

#[test]
fn numerics_compare_by_value() {
    let half = Numeric::new(1, 2);
    let also_half = Numeric::new(50, 100);
    assert!(half.equal(&also_half));
    assert_ne!(half, also_half);
    assert_eq!(also_half.reduce(), half);
    assert_eq!(
        Numeric::new(-1, 3).compare(&Numeric::new(1, -2)),
        Ordering::Greater
    );
    assert!(Numeric::new(5, 0).is_error());
    assert_eq!(Numeric::new(7, 2).to_string(), "7/2");
}

#[test]
fn timestamps_order_by_seconds_then_nanoseconds() {
    let earlier = Timespec::new(100, 999_999_999);
    let later = Timespec::new(101, 0);
    assert!(earlier < later);
    assert!(Timespec::ZERO.is_zero());
    assert_eq!(Timespec::from_millis(1_500), Timespec::new(1, 500_000_000));
}

#[test]
fn frames_nest_by_path() {
    let mut frame = Frame::new();
    frame.set("address/city", "Springfield");
    frame.set("address/zip", 12345i64);
    frame.set("limit", Numeric::new(1000, 1));

    assert_eq!(frame.get("address/city").and_then(KvpValue::as_str), Some("Springfield"));
    assert_eq!(frame.get_frame("address").map(Frame::len), Some(2));

    let copy = frame.clone();
    assert_eq!(copy.compare(&frame), Ordering::Equal);
    frame.remove("address/zip");
    assert_ne!(copy.compare(&frame), Ordering::Equal);
}

#[test]
fn mixed_kinds_do_not_compare() {
    let err = Value::from("3").compare(&Value::from(3i32)).unwrap_err();
    assert!(err.is_incomparable());

    let err = Value::from(1.5).as_i64().unwrap_err();
    assert!(err.is_kind_mismatch());
    assert!(qof::Error::from(err).is_type_error());

    assert_eq!(Value::from('x').kind(), ValueKind::Char);
    assert_eq!(
        Value::from(Numeric::new(1, 2)).compare(&Value::from(Numeric::new(2, 4))),
        Ok(Ordering::Equal)
    );
}

#[test]
fn entity_values_compare_by_identity() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let a = new_customer(&book, "same");
    let b = new_customer(&book, "same");

    assert_eq!(get(&runtime, &a, "name"), get(&runtime, &b, "name"));
    assert_eq!(Value::from(Some(a.clone())), Value::from(Some(a.clone())));
    assert_ne!(Value::from(Some(a)), Value::from(Some(b)));
    assert_eq!(Value::Entity(None), Value::Entity(None));
}
