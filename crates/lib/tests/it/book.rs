//! Book-level behaviour seen through the public API.

use std::{cell::RefCell, rc::Rc};

use qof::{Book, ObjectDescriptor, Runtime, RuntimeConfig, Timespec};

use crate::helpers::{CUSTOMER, INVOICE, new_customer, new_invoice, test_runtime};

#[test]
fn counters_count_up_from_zero_with_padded_output() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    assert_eq!(book.get_counter("C").unwrap(), 0);

    let formatted: Vec<String> = (0..5)
        .map(|_| book.increment_and_format_counter("C").unwrap())
        .collect();
    assert_eq!(
        formatted,
        vec!["000001", "000002", "000003", "000004", "000005"]
    );
    assert_eq!(book.get_counter("C").unwrap(), 5);
}

#[test]
fn counters_are_independent_per_book_and_name() {
    let runtime = test_runtime();
    let first = Book::new(&runtime);
    let second = Book::new(&runtime);

    first.increment_and_format_counter("gncInvoice").unwrap();
    first.increment_and_format_counter("gncInvoice").unwrap();
    first.increment_and_format_counter("gncCustomer").unwrap();

    assert_eq!(first.get_counter("gncInvoice").unwrap(), 2);
    assert_eq!(first.get_counter("gncCustomer").unwrap(), 1);
    assert_eq!(second.get_counter("gncInvoice").unwrap(), 0);
}

#[test]
fn counter_format_from_config_and_per_counter_override() {
    let config = RuntimeConfig::from_json(r#"{"default_counter_format": "%05d"}"#).unwrap();
    let book = Book::new(&Runtime::with_config(config));

    assert_eq!(book.increment_and_format_counter("bill").unwrap(), "00001");
    book.set_counter_format("bill", Some("B%li")).unwrap();
    assert_eq!(book.increment_and_format_counter("bill").unwrap(), "B2");

    let err = book.set_counter_format("bill", Some("%d%%%d")).unwrap_err();
    assert!(qof::Error::from(err).is_counter_error());
}

#[test]
fn marking_dirty_twice_keeps_the_first_dirty_time() {
    let book = Book::new(&test_runtime());
    book.mark_dirty();
    let first = book.dirty_time();
    assert!(!first.is_zero());

    book.mark_dirty();
    assert_eq!(book.dirty_time(), first);

    book.mark_saved();
    assert!(!book.is_dirty());
    assert_eq!(book.dirty_time(), Timespec::ZERO);
}

#[test]
fn mark_saved_cleans_every_collection() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    customer.borrow_mut().instance_mut().set_dirty();

    assert!(book.session_not_saved());
    assert!(book.collection(CUSTOMER).unwrap().is_dirty());

    book.mark_saved();
    assert!(!book.session_not_saved());
    assert!(!customer.borrow().instance().is_dirty());
}

#[test]
fn string_options_dirty_the_book() {
    let book = Book::new(&test_runtime());
    book.set_string_option("Business/Company Name", Some("Acme Ltd"));
    assert!(book.is_dirty());
    assert_eq!(
        book.get_string_option("Business/Company Name").as_deref(),
        Some("Acme Ltd")
    );
}

#[test]
fn destroy_calls_every_book_end_hook_then_empties_the_book() {
    let runtime = test_runtime();
    let ended = Rc::new(RefCell::new(Vec::new()));
    for e_type in ["Ledger", "Journal"] {
        let log = Rc::clone(&ended);
        runtime
            .objects()
            .register(
                ObjectDescriptor::new(e_type)
                    .with_create(|_, inst| Some(inst.into_entity()))
                    .with_book_end(move |book| {
                        log.borrow_mut()
                            .push((e_type, book.collection_count() > 0));
                    }),
            )
            .unwrap();
    }

    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let invoice = new_invoice(&book, "INV-1", Some(&customer));
    assert_eq!(book.collection_count(), 2);

    book.destroy();

    let mut ended = ended.borrow().clone();
    ended.sort();
    assert_eq!(ended, vec![("Journal", true), ("Ledger", true)]);
    assert_eq!(book.collection_count(), 0);
    assert!(book.collection(INVOICE).is_none());
    assert!(invoice.borrow().instance().collection().is_none());
    assert!(customer.borrow().instance().collection().is_none());
}

#[test]
fn open_books_are_tracked_until_destroyed() {
    let runtime = test_runtime();
    let a = Book::new(&runtime);
    let b = Book::new(&runtime);
    assert_eq!(runtime.open_books().len(), 2);
    assert_ne!(a.guid(), b.guid());

    a.destroy();
    let open = runtime.open_books();
    assert_eq!(open, vec![b]);
}
