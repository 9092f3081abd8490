//! Notifications raised by the entity lifecycle.

use std::{cell::RefCell, rc::Rc};

use qof::{Book, Event, EventKind, Instance, Runtime, instance::entity_guid};

use crate::helpers::{CUSTOMER, new_customer, test_runtime};

fn listen(runtime: &Runtime) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    runtime
        .events()
        .register_handler(move |event| log.borrow_mut().push(event.clone()));
    seen
}

#[test]
fn create_modify_destroy_in_order() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let seen = listen(&runtime);

    let customer = new_customer(&book, "Acme");
    let guid = entity_guid(&customer).unwrap();

    Instance::begin_edit(&customer);
    customer.borrow_mut().instance_mut().set_dirty();
    Instance::commit_edit(&customer).unwrap();

    Instance::begin_edit(&customer);
    customer.borrow_mut().instance_mut().set_destroying(true);
    Instance::commit_edit(&customer).unwrap();

    let kinds: Vec<EventKind> = seen.borrow().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Create, EventKind::Modify, EventKind::Destroy]
    );
    assert!(
        seen.borrow()
            .iter()
            .all(|e| e.guid == guid && e.e_type == CUSTOMER)
    );
}

#[test]
fn unregistered_handlers_stop_hearing() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let seen = Rc::new(RefCell::new(0));
    let count = Rc::clone(&seen);
    let id = runtime
        .events()
        .register_handler(move |_| *count.borrow_mut() += 1);

    new_customer(&book, "first");
    assert!(runtime.events().unregister_handler(id));
    assert!(!runtime.events().unregister_handler(id));
    new_customer(&book, "second");

    assert_eq!(*seen.borrow(), 1);
    assert_eq!(runtime.events().handler_count(), 0);
}

#[test]
fn suspension_nests() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let seen = listen(&runtime);
    let events = runtime.events();

    events.suspend();
    events.suspend();
    new_customer(&book, "hidden");
    events.resume();
    new_customer(&book, "still hidden");
    events.resume();
    new_customer(&book, "visible");

    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn runtimes_do_not_share_handlers() {
    let first = test_runtime();
    let second = test_runtime();
    let seen = listen(&first);

    new_customer(&Book::new(&second), "elsewhere");
    assert!(seen.borrow().is_empty());
}
