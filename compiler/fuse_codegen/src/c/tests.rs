use fuse_ir::{
    CallKind, Class, ClassKind, Const, Constructor, EnumDef, EnumValue, Expr, Method, Program,
    Sharing, Stmt, Type, UnaryOp, Visibility,
};
use pretty_assertions::assert_eq;

use super::CCodegen;
use crate::{CodegenError, CodegenOptions};

fn try_generate(program: &Program, options: &CodegenOptions) -> Result<(String, String), CodegenError> {
    let artifacts = CCodegen::new(program, options).generate()?;
    match artifacts.as_slice() {
        [header, source] => {
            assert_eq!(header.file_name, options.file_name("h"));
            assert_eq!(source.file_name, options.file_name("c"));
            Ok((header.contents.clone(), source.contents.clone()))
        }
        other => panic!("expected header and source, got {} artifacts", other.len()),
    }
}

fn generate(program: &Program) -> (String, String) {
    try_generate(program, &CodegenOptions::new("out.c"))
        .unwrap_or_else(|err| panic!("generation failed: {err}"))
}

/// `Point { int X; int GetX() => X; }`
fn point() -> Program {
    let mut program = Program::new();
    let point = program.add_class(Class::new("Point"));
    let x = program.add_field(point, "X", Type::INT, None);
    let mut get_x = Method::new("GetX", point);
    get_x.return_type = Some(Type::INT);
    get_x.body = Some(Stmt::block(vec![Stmt::Return(Some(program.field_ref(None, x)))]));
    program.add_method(get_x);
    program
}

#[test]
fn header_declares_public_surface() {
    let (header, _) = generate(&point());
    assert_eq!(
        header,
        "// Generated automatically with \"fusec\". Do not edit.
#pragma once
#ifdef __cplusplus
extern \"C\" {
#endif

typedef struct Point Point;

int Point_GetX(const Point *self);

#ifdef __cplusplus
}
#endif
"
    );
}

#[test]
fn source_defines_struct_and_methods() {
    let (_, source) = generate(&point());
    assert_eq!(
        source,
        "// Generated automatically with \"fusec\". Do not edit.
#include <stdlib.h>
#include \"out.h\"

struct Point {
    int x;
};

int Point_GetX(const Point *self)
{
    return self->x;
}
"
    );
}

#[test]
fn namespace_prefixes_types_and_functions() {
    let options = CodegenOptions::new("geo/point.c").with_namespace("Geo");
    let (header, source) = try_generate(&point(), &options)
        .unwrap_or_else(|err| panic!("generation failed: {err}"));
    assert!(header.contains("typedef struct GeoPoint GeoPoint;"));
    assert!(header.contains("int GeoPoint_GetX(const GeoPoint *self);"));
    assert!(source.contains("#include \"point.h\""));
}

#[test]
fn private_methods_are_static_and_prototyped() {
    let mut program = Program::new();
    let counter = program.add_class(Class::new("Counter"));
    let count = program.add_field(counter, "Count", Type::INT, None);
    let mut step = Method::new("Step", counter);
    step.visibility = Visibility::Private;
    step.mutator = true;
    step.body = Some(Stmt::block(vec![Stmt::Expr(Expr::unary(
        UnaryOp::PostIncrement,
        program.field_ref(None, count),
    ))]));
    program.add_method(step);

    let (header, source) = generate(&program);
    assert!(!header.contains("Counter_Step"));
    assert!(source.ends_with(
        "
struct Counter {
    int count;
};

static void Counter_Step(Counter *self);

static void Counter_Step(Counter *self)
{
    self->count++;
}
"
    ));
}

#[test]
fn constants_and_enums() {
    let mut program = Program::new();
    let config = program.add_class(Class::new("Config").with_kind(ClassKind::Static));
    program.add_const(Const {
        name: "MaxSize".to_string(),
        class: config,
        visibility: Visibility::Public,
        ty: Type::INT,
        value: Expr::int(100),
    });
    program.add_const(Const {
        name: "Offset".to_string(),
        class: config,
        visibility: Visibility::Private,
        ty: Type::INT,
        value: Expr::int(-5),
    });
    program.add_enum(EnumDef {
        name: "Color".to_string(),
        public: true,
        values: vec![
            EnumValue {
                name: "Red".to_string(),
                value: None,
            },
            EnumValue {
                name: "DarkGreen".to_string(),
                value: Some(Expr::int(5)),
            },
        ],
    });

    let (header, source) = generate(&program);
    assert!(header.contains(
        "
typedef enum {
    Color_RED,
    Color_DARK_GREEN = 5
} Color;
"
    ));
    assert!(header.contains("#define Config_MAX_SIZE 100\n"));
    assert!(!header.contains("typedef struct Config"));
    assert!(source.contains("#define Config_OFFSET (-5)\n"));
    assert!(!source.contains("struct Config"));
}

#[test]
fn resources_are_sorted_byte_arrays() {
    let mut program = Program::new();
    program.resources.insert("b.bin".to_string(), vec![1, 2]);
    program.resources.insert("a.txt".to_string(), vec![0xff]);
    let (_, source) = generate(&program);
    assert!(source.contains("#include <stdint.h>"));
    assert!(source.contains("static const uint8_t FuResource_a_txt[1] = {\n    0xff\n};"));
    assert!(source.contains("static const uint8_t FuResource_b_bin[2] = {\n    0x01, 0x02\n};"));
    assert!(source.find("FuResource_a_txt") < source.find("FuResource_b_bin"));
}

#[test]
fn public_constructor_gets_new_and_delete() {
    let mut program = Program::new();
    let mut person = Class::new("Person");
    person.constructor = Some(Constructor {
        visibility: Visibility::Public,
        body: fuse_ir::Block::default(),
    });
    let person = program.add_class(person);
    program.add_field(person, "Name", Type::StringStorage, None);

    let (header, source) = generate(&program);
    assert!(header.contains("Person *Person_New(void);\n\nvoid Person_Delete(Person *self);"));
    assert!(source.contains("    char *name;\n"));
    assert!(source.contains(
        "static void Person_Construct(Person *self)
{
    self->name = NULL;
}"
    ));
    assert!(source.contains(
        "static void Person_Destruct(Person *self)
{
    free(self->name);
}"
    ));
    assert!(source.contains(
        "Person *Person_New(void)
{
    Person *self = (Person *) malloc(sizeof(Person));
    if (self != NULL)
        Person_Construct(self);
    return self;
}

void Person_Delete(Person *self)
{
    if (self == NULL)
        return;
    Person_Destruct(self);
    free(self);
}"
    ));
}

/// Abstract `Shape.Area`, overridden by `Circle`, called through a
/// `Shape` pointer from a static helper.
fn shapes() -> Program {
    let mut program = Program::new();
    let shape = program.add_class(Class::new("Shape").with_kind(ClassKind::Abstract));
    let circle = program.add_class(Class::new("Circle").with_base(shape));
    let geometry = program.add_class(Class::new("Geometry").with_kind(ClassKind::Static));

    let mut area = Method::new("Area", shape);
    area.call_kind = CallKind::Abstract;
    area.return_type = Some(Type::INT);
    let area = program.add_method(area);

    let r = program.add_field(circle, "R", Type::INT, None);
    let mut circle_area = Method::new("Area", circle);
    circle_area.call_kind = CallKind::Override;
    circle_area.return_type = Some(Type::INT);
    circle_area.body = Some(Stmt::block(vec![Stmt::Return(Some(program.field_ref(None, r)))]));
    program.add_method(circle_area);

    let s = program.add_var("s", Type::class_ptr(shape, Sharing::None), None);
    let mut measure = Method::new("Measure", geometry);
    measure.call_kind = CallKind::Static;
    measure.return_type = Some(Type::INT);
    measure.params = vec![s];
    let call = program.call(Some(program.var_ref(s)), area, vec![]);
    measure.body = Some(Stmt::block(vec![Stmt::Return(Some(call))]));
    program.add_method(measure);
    program
}

#[test]
fn vtable_struct_and_pointer_live_in_the_root() {
    let (_, source) = generate(&shapes());
    assert!(source.contains(
        "
typedef struct {
    int (*area)(const Shape *self);
} ShapeVtbl;

struct Shape {
    const ShapeVtbl *vtbl;
};
"
    ));
    assert!(source.contains("struct Circle {\n    Shape base;\n    int r;\n};"));
}

#[test]
fn concrete_override_installs_table() {
    let (header, source) = generate(&shapes());
    assert!(header.contains("int Circle_Area(const Circle *self);"));
    assert!(source.contains(
        "static void Circle_Construct(Circle *self)
{
    static const ShapeVtbl vtbl = {
        (int (*)(const Shape *self)) Circle_Area,
    };
    self->base.vtbl = &vtbl;
}"
    ));
    assert!(!source.contains("Shape_Construct"));
}

#[test]
fn virtual_call_goes_through_the_table() {
    let (header, source) = generate(&shapes());
    assert!(header.contains("int Geometry_Measure(const Shape *s);"));
    assert!(source.contains("    return s->vtbl->area(s);\n"));
}

#[test]
fn by_value_cycle_is_fatal() {
    let mut program = Program::new();
    let a = program.add_class(Class::new("A"));
    let b = program.add_class(Class::new("B"));
    program.add_field(a, "Inner", Type::ClassValue(b), None);
    program.add_field(b, "Outer", Type::ClassValue(a), None);
    let err = try_generate(&program, &CodegenOptions::new("out.c"));
    assert_eq!(
        err,
        Err(CodegenError::CircularDependency {
            class: "A".to_string()
        })
    );
}

#[test]
fn dictionary_storage_is_unsupported() {
    let mut program = Program::new();
    let cache = program.add_class(Class::new("Cache"));
    program.add_field(
        cache,
        "Entries",
        Type::Dictionary {
            key: Box::new(Type::StringPtr),
            value: Box::new(Type::INT),
        },
        None,
    );
    let err = try_generate(&program, &CodegenOptions::new("out.c"));
    assert!(matches!(err, Err(CodegenError::Unsupported { .. })), "{err:?}");
}
