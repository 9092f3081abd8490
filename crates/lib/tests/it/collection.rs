//! Collection membership and the back-reference from each member.

use std::rc::Rc;

use qof::{Book, Collection, Instance, instance::entity_guid};

use crate::helpers::{CUSTOMER, INVOICE, new_customer, test_runtime};

#[test]
fn add_and_remove_keep_both_directions_in_step() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let guid = entity_guid(&customer).unwrap();
    let collection = book.collection(CUSTOMER).unwrap();

    assert!(Rc::ptr_eq(&collection.lookup(&guid).unwrap(), &customer));
    assert!(
        customer
            .borrow()
            .instance()
            .collection()
            .unwrap()
            .ptr_eq(&collection)
    );

    assert!(collection.remove(&customer));
    assert!(collection.lookup(&guid).is_none());
    assert!(customer.borrow().instance().collection().is_none());
    assert!(book.lookup_entity(&guid, CUSTOMER).is_none());

    collection.add(&customer).unwrap();
    assert!(Rc::ptr_eq(&book.lookup_entity(&guid, CUSTOMER).unwrap(), &customer));
}

#[test]
fn removing_a_non_member_is_a_no_op() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let other = Collection::new(CUSTOMER);

    assert!(!other.remove(&customer));
    assert!(customer.borrow().instance().collection().is_some());
}

#[test]
fn members_of_another_type_are_refused() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let invoices = book.get_collection(INVOICE);

    let err = invoices.add(&customer).unwrap_err();
    assert!(matches!(err, qof::instance::InstanceError::TypeMismatch { .. }));
    assert!(invoices.is_empty());
}

#[test]
fn the_null_identifier_cannot_join() {
    let collection = Collection::new("");
    let entity = Instance::with_guid(qof::Guid::null()).into_entity();
    assert!(collection.add(&entity).is_err());
    assert_eq!(collection.len(), 0);
}

#[test]
fn foreach_visits_members_in_identifier_order() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    for name in ["a", "b", "c", "d"] {
        new_customer(&book, name);
    }
    let collection = book.collection(CUSTOMER).unwrap();

    let mut visited = Vec::new();
    collection.foreach(|e| visited.push(entity_guid(e).unwrap()));
    let mut sorted = visited.clone();
    sorted.sort();
    assert_eq!(visited, sorted);
    assert_eq!(visited.len(), 4);
}

#[test]
fn foreach_tolerates_removal_of_later_members() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    for name in ["a", "b", "c"] {
        new_customer(&book, name);
    }
    let collection = book.collection(CUSTOMER).unwrap();
    let members = collection.entities();

    let mut visited = 0;
    collection.foreach(|e| {
        visited += 1;
        if Rc::ptr_eq(e, &members[0]) {
            collection.remove(&members[2]);
        }
    });
    assert_eq!(visited, 2);
    assert_eq!(collection.len(), 2);
}
