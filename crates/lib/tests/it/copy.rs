//! Copying entity graphs between books.

use std::rc::Rc;

use qof::{
    Book, Instance, Numeric, ObjectDescriptor, Param, ParamType,
    constants::GEMINI,
    copy::{CopyContext, CopyMode, copy_collection, copy_entity, copy_list},
    instance::{entity_guid, with_entity, with_entity_mut},
};

use crate::helpers::{
    CUSTOMER, ENTRY, INVOICE, Invoice, VENDOR, add_entry, entity, get, members, new_customer,
    new_invoice, populate_invoice, test_runtime,
};

#[test]
fn widget_name_and_amount_survive_the_copy() {
    #[derive(Default)]
    struct Thing {
        inst: Instance,
        name: String,
        amount: Numeric,
    }
    impl qof::Entity for Thing {
        fn instance(&self) -> &Instance {
            &self.inst
        }
        fn instance_mut(&mut self) -> &mut Instance {
            &mut self.inst
        }
    }

    let runtime = test_runtime();
    runtime
        .objects()
        .register(
            ObjectDescriptor::new("T")
                .with_create(|_, inst| {
                    Some(Rc::new(std::cell::RefCell::new(Thing {
                        inst,
                        ..Default::default()
                    })) as qof::EntityRef)
                })
                .with_collection_hooks(),
        )
        .unwrap();
    runtime
        .classes()
        .register_type(
            "T",
            None,
            vec![
                Param::new::<Thing>("name", ParamType::String, |t| t.name.as_str().into())
                    .with_setter(|t: &mut Thing, v| {
                        t.name = v.into_string()?;
                        Ok(())
                    }),
                Param::new::<Thing>("amount", ParamType::Numeric, |t| t.amount.into())
                    .with_setter(|t: &mut Thing, v| {
                        t.amount = v.as_numeric()?;
                        Ok(())
                    }),
            ],
        )
        .unwrap();

    let b1 = Book::new(&runtime);
    let b2 = Book::new(&runtime);
    let a = runtime.objects().new_instance("T", &b1).unwrap();
    let classes = runtime.classes();
    classes.set_value(&a, "name", "Widget".into()).unwrap();
    classes
        .set_value(&a, "amount", Numeric::new(7, 2).into())
        .unwrap();

    let outcome = copy_entity(&b2, &a, CopyMode::Deep);
    assert!(!outcome.error);
    let b = outcome.root.unwrap();

    assert_eq!(get(&runtime, &b, "name").as_str().unwrap(), "Widget");
    assert_eq!(get(&runtime, &b, "amount").as_numeric().unwrap(), Numeric::new(7, 2));
    assert_ne!(entity_guid(&a), entity_guid(&b));
    assert!(b2.lookup_entity(&entity_guid(&b).unwrap(), "T").is_some());
}

#[test]
fn every_primitive_parameter_compares_equal_after_copy() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let invoice = new_invoice(&source_book, "INV-42", None);
    populate_invoice(&invoice);

    let outcome = copy_entity(&target, &invoice, CopyMode::Deep);
    assert!(!outcome.error, "{:?}", outcome.errors);
    let twin = outcome.root.unwrap();

    for name in [
        "id",
        "notes",
        "opened",
        "posted",
        "total",
        "terms_days",
        "sequence",
        "rate",
        "mark",
        "batch",
        "extra",
    ] {
        let original = get(&runtime, &invoice, name);
        let copied = get(&runtime, &twin, name);
        assert_eq!(original, copied, "parameter {name}");
    }
    assert_ne!(entity_guid(&invoice), entity_guid(&twin));
}

#[test]
fn the_twin_remembers_its_origin_and_the_target_turns_partial() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");
    let source_guid = entity_guid(&customer).unwrap();

    let twin = copy_entity(&target, &customer, CopyMode::Deep).root.unwrap();

    assert!(target.is_partial());
    assert!(!source_book.is_partial());
    let recorded = twin
        .borrow()
        .instance()
        .kvp()
        .get(&format!("{GEMINI}/{}", source_book.guid()))
        .and_then(|v| v.as_guid());
    assert_eq!(recorded, Some(source_guid));
    assert!(Rc::ptr_eq(
        &target.twin_of(source_book.guid(), source_guid).unwrap(),
        &twin
    ));
}

#[test]
fn asking_twice_for_a_twin_returns_the_same_entity() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");

    let mut ctx = CopyContext::new(&target);
    let first = ctx.copy_instance(&customer).unwrap();
    let second = ctx.copy_instance(&customer).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(ctx.copied(), 1);

    // A later copy into the same book reuses the twin as well.
    let again = copy_entity(&target, &customer, CopyMode::Deep);
    assert!(Rc::ptr_eq(again.root.as_ref().unwrap(), &first));
    assert_eq!(again.copied, 0);
    assert_eq!(target.collection(CUSTOMER).unwrap().len(), 1);
}

#[test]
fn deep_copy_follows_owners_and_collection_members() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");
    let invoice = new_invoice(&source_book, "INV-1", Some(&customer));
    add_entry(&source_book, &invoice, "Widgets", 3, Numeric::new(250, 100));
    add_entry(&source_book, &invoice, "Gadgets", 1, Numeric::new(999, 100));

    let outcome = copy_entity(&target, &invoice, CopyMode::Deep);
    assert!(!outcome.error, "{:?}", outcome.errors);
    assert_eq!(outcome.copied, 4);
    let twin = outcome.root.unwrap();

    let owner = entity(get(&runtime, &twin, "owner")).unwrap();
    assert!(!Rc::ptr_eq(&owner, &customer));
    assert_eq!(get(&runtime, &owner, "name").as_str().unwrap(), "Acme");
    assert_eq!(
        owner.borrow().instance().book(),
        Some(target.clone())
    );

    let entries = members(get(&runtime, &twin, "entries"));
    let mut descriptions: Vec<String> = entries
        .iter()
        .map(|e| get(&runtime, e, "description").into_string().unwrap())
        .collect();
    descriptions.sort();
    assert_eq!(descriptions, vec!["Gadgets", "Widgets"]);
    assert!(
        entries
            .iter()
            .all(|e| e.borrow().instance().book() == Some(target.clone()))
    );
    assert_eq!(target.collection(ENTRY).unwrap().len(), 2);
}

#[test]
fn shared_owners_are_copied_once_across_a_list() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");
    let first = new_invoice(&source_book, "INV-1", Some(&customer));
    let second = new_invoice(&source_book, "INV-2", Some(&customer));

    let outcome = copy_list(&target, &[first, second], CopyMode::Deep);
    assert_eq!(outcome.twins.len(), 2);
    assert_eq!(outcome.copied, 3);

    let a = entity(get(&runtime, &outcome.twins[0], "owner")).unwrap();
    let b = entity(get(&runtime, &outcome.twins[1], "owner")).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn copying_a_collection_copies_every_member() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    for name in ["Acme", "Globex", "Initech"] {
        new_customer(&source_book, name);
    }

    let outcome = copy_collection(
        &target,
        &source_book.collection(CUSTOMER).unwrap(),
        CopyMode::Deep,
    );
    assert_eq!(outcome.copied, 3);
    assert_eq!(target.collection(CUSTOMER).unwrap().len(), 3);
}

#[test]
fn references_to_unregistered_types_are_left_for_later() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);

    let vendor = Instance::new().into_entity();
    Instance::init_data(&vendor, VENDOR, &source_book).unwrap();
    let vendor_guid = entity_guid(&vendor).unwrap();

    let invoice = new_invoice(&source_book, "INV-1", None);
    with_entity_mut::<Invoice, _>(&invoice, |i| i.vendor = Some(vendor.clone())).unwrap();

    let outcome = copy_entity(&target, &invoice, CopyMode::Deep);
    assert!(!outcome.error);
    let twin = outcome.root.unwrap();
    assert!(with_entity::<Invoice, _>(&twin, |i| i.vendor.is_none()).unwrap());

    let references = target.references();
    assert_eq!(references.len(), 1);
    let reference = &references[0];
    assert_eq!(reference.e_type, VENDOR);
    assert_eq!(reference.ref_guid, vendor_guid);
    assert_eq!(reference.param, "vendor");
    assert_eq!(reference.ent_guid, entity_guid(&twin).unwrap());
}

#[test]
fn shallow_copy_records_references_instead_of_following_them() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");
    let invoice = new_invoice(&source_book, "INV-1", Some(&customer));
    add_entry(&source_book, &invoice, "Widgets", 3, Numeric::new(250, 100));

    let outcome = copy_entity(&target, &invoice, CopyMode::Shallow);
    assert!(!outcome.error, "{:?}", outcome.errors);
    assert_eq!(outcome.copied, 1);
    assert!(target.collection(CUSTOMER).is_none());

    let mut params: Vec<String> = target.references().into_iter().map(|r| r.param).collect();
    params.sort();
    assert_eq!(params, vec!["entries", "owner"]);
    assert_eq!(
        target.collection(INVOICE).unwrap().len(),
        1,
        "only the requested entity is copied"
    );
}

#[test]
fn copying_into_the_source_book_is_refused() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");

    let outcome = copy_entity(&book, &customer, CopyMode::Deep);
    assert!(outcome.error);
    assert!(outcome.root.is_none());
    assert!(outcome.errors[0].is_usage_error());
    assert_eq!(book.collection(CUSTOMER).unwrap().len(), 1);
}

#[test]
fn events_are_quiet_while_a_list_is_copied() {
    let runtime = test_runtime();
    let source_book = Book::new(&runtime);
    let target = Book::new(&runtime);
    let customer = new_customer(&source_book, "Acme");

    let seen = Rc::new(std::cell::Cell::new(0));
    let count = Rc::clone(&seen);
    runtime
        .events()
        .register_handler(move |_| count.set(count.get() + 1));

    copy_list(&target, &[customer], CopyMode::Deep);
    assert_eq!(seen.get(), 0);
    assert!(!runtime.events().is_suspended());
}
