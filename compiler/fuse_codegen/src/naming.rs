//! Identifier spelling shared by the backends.

/// `FooBar` -> `fooBar`.
pub fn camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `FooBar` -> `FOO_BAR`.
pub fn upper_with_underscores(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            result.push('_');
            result.push(c);
        } else {
            result.extend(c.to_uppercase());
        }
    }
    result
}

/// `FooBar` -> `foo_bar`.
pub fn lower_with_underscores(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Words a camel-cased C identifier must not collide with.
const C_RESERVED: &[&str] = &[
    "assert", "auto", "bool", "break", "case", "char", "class", "const", "continue", "default",
    "do", "double", "else", "enum", "extern", "false", "float", "for", "foreach", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short", "signed", "sizeof",
    "static", "struct", "switch", "true", "typedef", "typeof", "union", "unsigned", "void",
    "volatile", "while",
];

/// Camel-cased name of a C local, parameter or field.
///
/// `this` becomes `self`; reserved words get a trailing underscore.
pub fn c_local_name(name: &str) -> String {
    if name == "this" {
        return "self".to_string();
    }
    let mut result = camel_case(name);
    if C_RESERVED.contains(&result.as_str()) {
        result.push('_');
    }
    result
}

/// Python local or parameter name.
pub fn py_local_name(name: &str) -> String {
    if name == "this" {
        "self".to_string()
    } else {
        name.to_string()
    }
}

/// Resource names may contain any character; identifiers may not.
pub fn resource_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn case_conversions() {
        assert_eq!(camel_case("FooBar"), "fooBar");
        assert_eq!(camel_case(""), "");
        assert_eq!(upper_with_underscores("MaxValue"), "MAX_VALUE");
        assert_eq!(upper_with_underscores("x"), "X");
        assert_eq!(lower_with_underscores("GetArea"), "get_area");
        assert_eq!(lower_with_underscores("count"), "count");
    }

    #[test]
    fn c_locals_avoid_reserved_words() {
        assert_eq!(c_local_name("Int"), "int_");
        assert_eq!(c_local_name("default"), "default_");
        assert_eq!(c_local_name("this"), "self");
        assert_eq!(c_local_name("Width"), "width");
    }

    #[test]
    fn resource_identifiers() {
        assert_eq!(resource_identifier("logo.png"), "logo_png");
    }
}
