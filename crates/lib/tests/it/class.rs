//! Generic parameter access and choice tables.

use std::cmp::Ordering;

use qof::{Book, Guid, Numeric, Param, ParamType, Timespec, Value, class::ClassError};

use crate::helpers::{
    CUSTOMER, Customer, ENTRY, INVOICE, JOB, VENDOR, get, new_customer, new_invoice,
    populate_invoice, test_runtime,
};

#[test]
fn every_primitive_kind_is_reachable_by_name() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let invoice = new_invoice(&book, "INV-7", None);
    populate_invoice(&invoice);

    assert_eq!(get(&runtime, &invoice, "id").as_str().unwrap(), "INV-7");
    assert_eq!(get(&runtime, &invoice, "notes").as_str().unwrap(), "net 30");
    assert_eq!(
        get(&runtime, &invoice, "opened").as_date().unwrap(),
        Timespec::new(1_700_000_000, 250)
    );
    assert!(get(&runtime, &invoice, "posted").as_bool().unwrap());
    assert!(
        get(&runtime, &invoice, "total")
            .as_numeric()
            .unwrap()
            .equal(&Numeric::new(12_345, 100))
    );
    assert_eq!(get(&runtime, &invoice, "terms_days").as_i32().unwrap(), 30);
    assert_eq!(
        get(&runtime, &invoice, "sequence").as_i64().unwrap(),
        9_000_000_000
    );
    assert_eq!(get(&runtime, &invoice, "rate").as_f64().unwrap(), 1.5);
    assert_eq!(get(&runtime, &invoice, "mark").as_char().unwrap(), '§');
    assert!(!get(&runtime, &invoice, "batch").as_guid().unwrap().is_null());
    let extra = get(&runtime, &invoice, "extra").into_frame().unwrap();
    assert_eq!(
        extra.get("approval/by").and_then(|v| v.as_str()),
        Some("finance")
    );
}

#[test]
fn setters_check_the_value_kind() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let classes = runtime.classes();

    let err = classes
        .set_value(&customer, "name", Value::Int32(3))
        .unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(get(&runtime, &customer, "name").as_str().unwrap(), "Acme");

    classes
        .set_value(&customer, "discount", Numeric::new(5, 100).into())
        .unwrap();
    assert_eq!(
        get(&runtime, &customer, "discount").as_numeric().unwrap(),
        Numeric::new(5, 100)
    );
}

#[test]
fn unknown_parameters_and_read_only_parameters_are_reported() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let classes = runtime.classes();

    let err = classes.get_value(&customer, "nickname").unwrap_err();
    assert!(err.is_not_found());
    assert!(qof::Error::from(err).is_not_found());

    let err = classes
        .set_value(&customer, "guid", Guid::new().into())
        .unwrap_err();
    assert!(err.is_read_only());
}

#[test]
fn registry_exposes_tables_in_registration_order() {
    let runtime = test_runtime();
    let classes = runtime.classes();

    assert!(classes.is_registered(INVOICE));
    assert!(!classes.is_registered(VENDOR));
    assert_eq!(
        classes.registered_types(),
        vec![CUSTOMER, ENTRY, INVOICE, JOB]
    );

    let names: Vec<String> = classes
        .params(CUSTOMER)
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, vec!["guid", "name", "id", "active", "discount"]);

    let mut seen = 0;
    classes.param_foreach(ENTRY, |_| seen += 1);
    assert_eq!(seen, 3);

    let param = classes.get_parameter(JOB, "customer").unwrap();
    assert_eq!(*param.kind(), ParamType::Entity(CUSTOMER.to_string()));
    assert!(param.kind().is_reference());
    assert!(!param.kind().is_primitive());
}

#[test]
fn reference_params_skip_unregistered_targets() {
    let runtime = test_runtime();
    let names: Vec<String> = runtime
        .classes()
        .reference_params(INVOICE)
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    // "vendor" points at a type nobody registered.
    assert_eq!(names, vec!["owner"]);
}

#[test]
fn reregistering_the_same_table_is_accepted_and_a_different_one_is_not() {
    let runtime = test_runtime();
    let classes = runtime.classes();
    let same = classes.params(ENTRY);
    classes.register_type(ENTRY, None, same).unwrap();

    let conflicting = vec![Param::new::<Customer>("name", ParamType::String, |c| {
        c.name.as_str().into()
    })];
    let err = classes.register_type(ENTRY, None, conflicting).unwrap_err();
    assert!(matches!(err, ClassError::ConflictingRegistration { .. }));
    assert!(err.is_registration_error());
    assert_eq!(classes.params(ENTRY).len(), 3);
}

#[test]
fn accessors_refuse_entities_of_another_type() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let invoice = new_invoice(&book, "INV-1", None);
    let param = runtime.classes().get_parameter(CUSTOMER, "name").unwrap();

    let err = param.get(&*invoice.borrow()).unwrap_err();
    assert!(matches!(err, ClassError::WrongEntityType { .. }));
}

#[test]
fn choice_tables_list_the_allowed_owner_types() {
    let runtime = test_runtime();
    let classes = runtime.classes();

    assert!(classes.is_choice(INVOICE));
    assert_eq!(classes.choice_options(INVOICE, "owner"), vec![CUSTOMER, JOB]);
    assert!(classes.choice_check(INVOICE, "owner", JOB));
    assert!(!classes.choice_check(INVOICE, "owner", ENTRY));
    assert!(!classes.choice_check(INVOICE, "entries", CUSTOMER));

    let err = classes.choice_add_class(CUSTOMER, JOB, "owner").unwrap_err();
    assert!(matches!(err, ClassError::NotAChoice { .. }));
}

#[test]
fn choice_parameters_accept_any_allowed_type() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let customer = new_customer(&book, "Acme");
    let job = runtime.objects().new_instance(JOB, &book).unwrap();
    runtime
        .classes()
        .set_value(&job, "customer", Some(customer.clone()).into())
        .unwrap();

    let by_customer = new_invoice(&book, "INV-1", Some(&customer));
    let by_job = new_invoice(&book, "INV-2", Some(&job));

    let owner = get(&runtime, &by_customer, "owner").into_entity().unwrap();
    assert_eq!(
        qof::instance::entity_type(&owner.unwrap()).as_deref(),
        Some(CUSTOMER)
    );
    let owner = get(&runtime, &by_job, "owner").into_entity().unwrap();
    assert_eq!(qof::instance::entity_type(&owner.unwrap()).as_deref(), Some(JOB));
}

#[test]
fn parameters_compare_by_value() {
    let runtime = test_runtime();
    let book = Book::new(&runtime);
    let a = new_customer(&book, "Alpha");
    let b = new_customer(&book, "Beta");
    let param = runtime.classes().get_parameter(CUSTOMER, "name").unwrap();

    let ordering = param.compare(&*a.borrow(), &*b.borrow()).unwrap();
    assert_eq!(ordering, Ordering::Less);
    assert_eq!(
        param.compare(&*b.borrow(), &*b.borrow()).unwrap(),
        Ordering::Equal
    );
}
