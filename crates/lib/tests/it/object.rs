//! Object descriptors, their hooks and generic enumeration.

use std::{cell::Cell, cmp::Ordering, rc::Rc};

use qof::{Book, Instance, ObjectDescriptor, Timespec, object::ObjectError};

use crate::helpers::{CUSTOMER, ENTRY, INVOICE, JOB, VENDOR, new_customer, test_runtime};

#[test]
fn registered_types_keep_their_order_and_labels() {
    let runtime = test_runtime();
    let objects = runtime.objects();
    assert_eq!(
        objects.registered_types(),
        vec![CUSTOMER, JOB, INVOICE, ENTRY]
    );
    assert_eq!(objects.type_label(INVOICE).as_deref(), Some("Invoice"));
    assert!(objects.type_label(JOB).is_none());

    let mut with_create = 0;
    objects.foreach_type(|d| {
        if d.has_create() {
            with_create += 1;
        }
    });
    assert_eq!(with_create, 4);
}

#[test]
fn duplicate_registration_keeps_the_first_descriptor() {
    let runtime = test_runtime();
    let err = runtime
        .objects()
        .register(ObjectDescriptor::new(CUSTOMER).with_type_label("Other"))
        .unwrap_err();
    assert!(matches!(err, ObjectError::DuplicateType { .. }));
    assert!(qof::Error::from(err).is_registration_error());
    assert_eq!(
        runtime.objects().type_label(CUSTOMER).as_deref(),
        Some("Customer")
    );
}

#[test]
fn creating_an_unknown_type_fails() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let Err(err) = runtime.objects().new_instance(VENDOR, &book) else {
        panic!("Expected an unregistered type to fail");
    };
    assert!(err.is_not_found());
    assert!(book.collection(VENDOR).is_none());
}

#[test]
fn a_create_hook_may_decline() {
    let runtime = test_runtime();
    runtime
        .objects()
        .register(ObjectDescriptor::new("Phantom").with_create(|_, _| None))
        .unwrap();
    let book = Book::new(&runtime);
    let Err(err) = runtime.objects().new_instance("Phantom", &book) else {
        panic!("Expected a declining create hook to fail");
    };
    assert!(matches!(err, ObjectError::CreateFailed { .. }));
}

#[test]
fn foreach_walks_one_type_in_one_book() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let other = Book::new(&runtime);
    for name in ["a", "b", "c"] {
        new_customer(&book, name);
    }
    new_customer(&other, "z");

    let mut names = Vec::new();
    runtime
        .objects()
        .foreach(CUSTOMER, &book, |e| {
            names.push(
                runtime
                    .classes()
                    .get_value(e, "name")
                    .unwrap()
                    .into_string()
                    .unwrap(),
            )
        })
        .unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);

    // No collection yet is an empty walk, not an error.
    let mut visited = 0;
    runtime
        .objects()
        .foreach(JOB, &book, |_| visited += 1)
        .unwrap();
    assert_eq!(visited, 0);
}

#[test]
fn compliance_needs_create_and_foreach() {
    let runtime = test_runtime();
    runtime
        .objects()
        .register(ObjectDescriptor::new("Bare").with_create(|_, inst| Some(inst.into_entity())))
        .unwrap();

    assert!(runtime.objects().compliance(INVOICE));
    assert!(!runtime.objects().compliance("Bare"));
    assert!(!runtime.objects().compliance(VENDOR));

    let book = Book::new(&runtime);
    let err = runtime.objects().foreach("Bare", &book, |_| ()).unwrap_err();
    assert!(matches!(err, ObjectError::NoForeachHook { .. }));
}

#[test]
fn book_begin_runs_for_books_opened_before_registration() {
    let runtime = test_runtime();
    let _early = Book::new(&runtime);
    let calls = Rc::new(Cell::new(0));
    let count = Rc::clone(&calls);
    runtime
        .objects()
        .register(ObjectDescriptor::new("Audit").with_book_begin(move |_| count.set(count.get() + 1)))
        .unwrap();
    assert_eq!(calls.get(), 1);

    let _late = Book::new(&runtime);
    assert_eq!(calls.get(), 2);
}

#[test]
fn version_comparison_prefers_the_type_hook() {
    let runtime = test_runtime();
    runtime
        .objects()
        .register(
            ObjectDescriptor::new("Reversed")
                .with_create(|_, inst| Some(inst.into_entity()))
                .with_version_cmp(|a, b| {
                    b.instance().last_update().cmp(&a.instance().last_update())
                }),
        )
        .unwrap();
    let book = Book::new(&runtime);
    let objects = runtime.objects();

    let older = new_customer(&book, "older");
    let newer = new_customer(&book, "newer");
    older
        .borrow_mut()
        .instance_mut()
        .set_last_update(Timespec::from_secs(1));
    newer
        .borrow_mut()
        .instance_mut()
        .set_last_update(Timespec::from_secs(2));
    assert_eq!(objects.version_cmp(&older, &newer), Ordering::Less);

    let a = objects.new_instance("Reversed", &book).unwrap();
    let b = objects.new_instance("Reversed", &book).unwrap();
    a.borrow_mut().instance_mut().set_last_update(Timespec::from_secs(1));
    b.borrow_mut().instance_mut().set_last_update(Timespec::from_secs(2));
    assert_eq!(objects.version_cmp(&a, &b), Ordering::Greater);
}

#[test]
fn backend_data_is_keyed_by_type_and_backend() {
    let runtime = test_runtime();
    let objects = runtime.objects();
    objects
        .register_backend_data(INVOICE, "sql", Rc::new("invoices".to_string()))
        .unwrap();

    let data = objects.lookup_backend_data(INVOICE, "sql").unwrap();
    assert_eq!(data.downcast_ref::<String>().map(String::as_str), Some("invoices"));
    assert!(objects.lookup_backend_data(INVOICE, "xml").is_none());
    assert!(objects.lookup_backend_data("", "sql").is_none());

    let err = objects
        .register_backend_data(INVOICE, "", Rc::new(()))
        .unwrap_err();
    assert!(matches!(err, ObjectError::EmptyBackendName));
}

#[test]
fn bare_instances_print_nothing() {
    let runtime = test_runtime();
    let entity = Instance::new().into_entity();
    assert!(runtime.objects().printable(&entity).is_none());
}
