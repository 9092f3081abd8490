//! Edit brackets, dirty tracking and generic helpers on instances.

use std::rc::Rc;

use qof::{
    Book, Instance, Runtime, RuntimeConfig,
    instance::{Commit, InstanceError, entity_guid, with_entity_mut},
};

use crate::helpers::{
    CUSTOMER, Customer, Invoice, new_customer, new_invoice, register_business_types, test_runtime,
};

#[test]
fn a_new_entity_is_found_by_identifier() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let guid = entity_guid(&customer).unwrap();

    assert!(Rc::ptr_eq(&book.lookup_entity(&guid, CUSTOMER).unwrap(), &customer));
    let guard = customer.borrow();
    assert_eq!(guard.instance().e_type(), CUSTOMER);
    assert!(guard.instance().is_infant());
}

#[test]
fn nested_edits_commit_once() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");

    assert!(Instance::begin_edit(&customer));
    assert!(Instance::begin_edit(&customer));
    assert_eq!(Instance::commit_edit(&customer).unwrap(), Commit::Nested);
    assert!(customer.borrow().instance().is_infant());
    assert_eq!(Instance::commit_edit(&customer).unwrap(), Commit::Done);
    assert!(!customer.borrow().instance().is_infant());

    let err = Instance::commit_edit(&customer).unwrap_err();
    assert!(matches!(err, InstanceError::OverCommit { .. }));
    assert!(qof::Error::from(err).is_usage_error());
}

#[test]
fn destroyed_entities_leave_the_book() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let guid = entity_guid(&customer).unwrap();

    Instance::begin_edit(&customer);
    customer.borrow_mut().instance_mut().set_destroying(true);
    assert_eq!(Instance::commit_edit(&customer).unwrap(), Commit::Destroyed);

    assert!(book.lookup_entity(&guid, CUSTOMER).is_none());
    assert!(customer.borrow().instance().is_freed());
    assert!(!Instance::begin_edit(&customer));
}

#[test]
fn normal_mode_cleans_members_with_their_collection() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    customer.borrow_mut().instance_mut().set_dirty();
    assert!(customer.borrow().instance().is_dirty());

    book.mark_saved();
    assert!(!customer.borrow().instance().is_dirty());
    assert!(customer.borrow().instance().dirty_flag());
}

#[test]
fn alternate_mode_from_config_ignores_the_collection() {
    let config = RuntimeConfig {
        alternate_dirty_mode: true,
        ..Default::default()
    };
    let runtime = Runtime::with_config(config);
    register_business_types(&runtime);
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");

    customer.borrow_mut().instance_mut().set_dirty();
    assert!(!book.collection(CUSTOMER).unwrap().is_dirty());
    book.mark_saved();
    assert!(customer.borrow().instance().is_dirty());

    runtime.set_alternate_dirty_mode(false);
    assert!(!customer.borrow().instance().is_dirty());
}

#[test]
fn display_names_come_from_the_printable_hook() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let invoice = new_invoice(&book, "INV-9", Some(&customer));

    assert_eq!(Instance::display_name(&customer).as_deref(), Some("Acme"));
    assert_eq!(Instance::display_name(&invoice).as_deref(), Some("Invoice INV-9"));
}

#[test]
fn referring_objects_follow_choice_and_entity_parameters() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let invoice = new_invoice(&book, "INV-1", Some(&customer));
    let _other = new_invoice(&book, "INV-2", None);
    let job = runtime.objects().new_instance("Job", &book).unwrap();
    runtime
        .classes()
        .set_value(&job, "customer", Some(customer.clone()).into())
        .unwrap();

    let found = Instance::referring_objects(&book, &customer);
    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|e| Rc::ptr_eq(e, &invoice)));
    assert!(found.iter().any(|e| Rc::ptr_eq(e, &job)));
}

#[test]
fn typed_access_through_the_handle() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");

    with_entity_mut::<Customer, _>(&customer, |c| c.id = "C-001".to_string()).unwrap();
    assert!(with_entity_mut::<Invoice, _>(&customer, |_| ()).is_none());
    assert_eq!(
        runtime
            .classes()
            .get_value(&customer, "id")
            .unwrap()
            .as_str()
            .unwrap(),
        "C-001"
    );
}
