use super::*;

#[test]
fn shared_pointers_are_dynamic() {
    let class = ClassId::new(0);
    assert!(Type::class_ptr(class, Sharing::Shared).is_dynamic_ptr());
    assert!(Type::array_ptr(Type::INT, Sharing::Shared).is_dynamic_ptr());
    assert!(!Type::class_ptr(class, Sharing::Exclusive).is_dynamic_ptr());
    assert!(!Type::class_ptr(class, Sharing::None).is_dynamic_ptr());
    assert!(!Type::StringStorage.is_dynamic_ptr());
}

#[test]
fn storage_type_strips_nested_arrays() {
    let ty = Type::array_storage(Type::array_storage(Type::StringStorage, 3), 2);
    assert_eq!(ty.storage_type(), &Type::StringStorage);
    assert_eq!(Type::Bool.storage_type(), &Type::Bool);
}

#[test]
fn class_of_value_and_pointer() {
    let class = ClassId::new(4);
    assert_eq!(Type::ClassValue(class).class(), Some(class));
    assert_eq!(Type::class_ptr(class, Sharing::None).class(), Some(class));
    assert_eq!(Type::StringPtr.class(), None);
}

#[test]
fn numeric_predicates() {
    assert!(Type::INT.is_numeric());
    assert!(Type::DOUBLE.is_numeric());
    assert!(Type::DOUBLE.is_float());
    assert!(!Type::Bool.is_numeric());
    assert!(Type::StringPtr.is_string());
    assert!(Type::StringStorage.is_string());
}
