#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests for the C backend.
//!
//! Each test builds a small program, generates the header/source pair and
//! checks whole function bodies, so that every teardown call on every exit
//! path is pinned down.

use fuse_codegen::{generate_c, CodegenError, CodegenOptions};
use fuse_ir::{
    BinaryOp, Builtin, CallKind, Class, ClassId, ClassKind, Expr, InterpolatedPart, Method,
    MethodId, Program, Sharing, Stmt, Type, UnaryOp, VarId,
};
use pretty_assertions::assert_eq;

fn try_source(program: &Program) -> Result<String, CodegenError> {
    let artifacts = generate_c(program, &CodegenOptions::new("out.c"))?;
    Ok(artifacts
        .into_iter()
        .find(|artifact| artifact.file_name == "out.c")
        .expect("source artifact")
        .contents)
}

fn source(program: &Program) -> String {
    try_source(program).unwrap_or_else(|err| panic!("generation failed: {err}"))
}

/// The definition starting with `signature`, through its closing brace.
fn function<'s>(source: &'s str, signature: &str) -> &'s str {
    let start = source
        .find(&format!("\n{signature}\n{{\n"))
        .unwrap_or_else(|| panic!("no definition of `{signature}` in:\n{source}"))
        + 1;
    let end = source[start..].find("\n}\n").expect("closing brace") + start + 3;
    &source[start..end]
}

fn add_static(
    program: &mut Program,
    class: ClassId,
    name: &str,
    params: Vec<VarId>,
    return_type: Option<Type>,
    body: Vec<Stmt>,
) -> MethodId {
    let mut method = Method::new(name, class);
    method.call_kind = CallKind::Static;
    method.params = params;
    method.return_type = return_type;
    method.body = Some(Stmt::block(body));
    program.add_method(method)
}

fn owned_string(program: &mut Program, name: &str, value: &str) -> VarId {
    program.add_var(name, Type::StringStorage, Some(Expr::string(value)))
}

fn static_class(program: &mut Program, name: &str) -> ClassId {
    program.add_class(Class::new(name).with_kind(ClassKind::Static))
}

// Teardown

#[test]
fn owned_string_is_freed_on_every_return_path() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let flag = program.add_var("flag", Type::Bool, None);
    let early = program.add_var("early", Type::Bool, None);
    let s = owned_string(&mut program, "s", "abc");
    let branch = Stmt::block(vec![
        Stmt::Var(s),
        Stmt::if_then(program.var_ref(early), Stmt::Return(Some(Expr::int(1))), None),
    ]);
    let body = vec![
        Stmt::if_then(program.var_ref(flag), branch, None),
        Stmt::Return(Some(Expr::int(2))),
    ];
    add_static(&mut program, text, "Pick", vec![flag, early], Some(Type::INT), body);

    let source = source(&program);
    assert_eq!(
        function(&source, "int Text_Pick(bool flag, bool early)"),
        "int Text_Pick(bool flag, bool early)
{
    if (flag) {
        char *s = strdup(\"abc\");
        if (early) {
            free(s);
            return 1;
        }
        free(s);
    }
    return 2;
}
"
    );
    assert!(source.contains("#include <string.h>"));
}

#[test]
fn declaration_as_sole_branch_is_torn_down() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let flag = program.add_var("flag", Type::Bool, None);
    let s = owned_string(&mut program, "s", "x");
    let body = vec![Stmt::if_then(program.var_ref(flag), Stmt::Var(s), None)];
    add_static(&mut program, text, "Stray", vec![flag], None, body);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Text_Stray(bool flag)"),
        "void Text_Stray(bool flag)
{
    if (flag) {
        char *s = strdup(\"x\");
        free(s);
    }
}
"
    );
}

#[test]
fn break_tears_down_inner_scope_before_outer() {
    let mut program = Program::new();
    let worker = static_class(&mut program, "Worker");
    let flag = program.add_var("flag", Type::Bool, None);
    let a = owned_string(&mut program, "a", "a");
    let b = owned_string(&mut program, "b", "b");
    let body = Stmt::block(vec![
        Stmt::Var(a),
        Stmt::block(vec![
            Stmt::Var(b),
            Stmt::if_then(program.var_ref(flag), Stmt::Break, None),
        ]),
    ]);
    let while_loop = Stmt::while_loop(program.var_ref(flag), body);
    add_static(&mut program, worker, "Run", vec![flag], None, vec![while_loop]);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Worker_Run(bool flag)"),
        "void Worker_Run(bool flag)
{
    while (flag) {
        char *a = strdup(\"a\");
        {
            char *b = strdup(\"b\");
            if (flag) {
                free(b);
                free(a);
                break;
            }
            free(b);
        }
        free(a);
    }
}
"
    );
}

#[test]
fn break_from_inner_loop_leaves_outer_resources_alive() {
    let mut program = Program::new();
    let worker = static_class(&mut program, "Worker");
    let flag = program.add_var("flag", Type::Bool, None);
    let a = owned_string(&mut program, "a", "a");
    let b = owned_string(&mut program, "b", "b");
    let inner = Stmt::while_loop(
        program.var_ref(flag),
        Stmt::block(vec![
            Stmt::Var(b),
            Stmt::if_then(program.var_ref(flag), Stmt::Break, None),
        ]),
    );
    let outer = Stmt::while_loop(
        program.var_ref(flag),
        Stmt::block(vec![
            Stmt::Var(a),
            inner,
            Stmt::if_then(program.var_ref(flag), Stmt::Break, None),
        ]),
    );
    add_static(&mut program, worker, "Nest", vec![flag], None, vec![outer]);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Worker_Nest(bool flag)"),
        "void Worker_Nest(bool flag)
{
    while (flag) {
        char *a = strdup(\"a\");
        while (flag) {
            char *b = strdup(\"b\");
            if (flag) {
                free(b);
                break;
            }
            free(b);
        }
        if (flag) {
            free(a);
            break;
        }
        free(a);
    }
}
"
    );
}

#[test]
fn continue_tears_down_loop_locals_only() {
    let mut program = Program::new();
    let worker = static_class(&mut program, "Worker");
    let flag = program.add_var("flag", Type::Bool, None);
    let keep = owned_string(&mut program, "keep", "k");
    let t = owned_string(&mut program, "t", "t");
    let i = program.add_var("i", Type::INT, Some(Expr::int(0)));
    let for_loop = Stmt::For {
        init: Some(Box::new(Stmt::Var(i))),
        cond: Some(Expr::compare(BinaryOp::Less, program.var_ref(i), Expr::int(3))),
        advance: Some(Expr::unary(UnaryOp::PostIncrement, program.var_ref(i))),
        body: Box::new(Stmt::block(vec![
            Stmt::Var(t),
            Stmt::if_then(program.var_ref(flag), Stmt::Continue, None),
        ])),
    };
    add_static(
        &mut program,
        worker,
        "Each",
        vec![flag],
        None,
        vec![Stmt::Var(keep), for_loop],
    );

    let source = source(&program);
    assert_eq!(
        function(&source, "void Worker_Each(bool flag)"),
        "void Worker_Each(bool flag)
{
    char *keep = strdup(\"k\");
    for (int i = 0; i < 3; i++) {
        char *t = strdup(\"t\");
        if (flag) {
            free(t);
            continue;
        }
        free(t);
    }
    free(keep);
}
"
    );
}

#[test]
fn returned_owner_moves_out_without_free() {
    let mut program = Program::new();
    let worker = static_class(&mut program, "Worker");
    let a = owned_string(&mut program, "a", "a");
    let b = owned_string(&mut program, "b", "b");
    let body = vec![Stmt::Var(a), Stmt::Var(b), Stmt::Return(Some(program.var_ref(b)))];
    add_static(&mut program, worker, "Make", vec![], Some(Type::StringStorage), body);

    let source = source(&program);
    let make = function(&source, "char *Worker_Make(void)");
    assert_eq!(
        make,
        "char *Worker_Make(void)
{
    char *a = strdup(\"a\");
    char *b = strdup(\"b\");
    free(a);
    return b;
}
"
    );
    assert!(!make.contains("free(b)"));
}

#[test]
fn computed_return_is_saved_before_teardown() {
    let mut program = Program::new();
    let worker = static_class(&mut program, "Worker");
    let s = owned_string(&mut program, "s", "abc");
    let length = Expr::property(program.var_ref(s), fuse_ir::Property::StringLength);
    add_static(
        &mut program,
        worker,
        "Length",
        vec![],
        Some(Type::INT),
        vec![Stmt::Var(s), Stmt::Return(Some(length))],
    );

    let source = source(&program);
    assert_eq!(
        function(&source, "int Worker_Length(void)"),
        "int Worker_Length(void)
{
    char *s = strdup(\"abc\");
    int returnValue = (int) strlen(s);
    free(s);
    return returnValue;
}
"
    );
}

// Strings

#[test]
fn substring_is_one_allocation_freed_once() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let s = program.add_var("s", Type::StringPtr, None);
    let substring = Expr::builtin(
        Some(program.var_ref(s)),
        Builtin::StringSubstring,
        vec![Expr::int(1), Expr::int(2)],
        Some(Type::StringStorage),
    );
    let t = program.add_var("t", Type::StringStorage, Some(substring));
    let print = Expr::builtin(
        None,
        Builtin::ConsoleWriteLine { stderr: false },
        vec![program.var_ref(t)],
        None,
    );
    add_static(
        &mut program,
        text,
        "Show",
        vec![s],
        None,
        vec![Stmt::Var(t), Stmt::Expr(print)],
    );

    let source = source(&program);
    assert_eq!(
        function(&source, "void Text_Show(const char *s)"),
        "void Text_Show(const char *s)
{
    char *t = FuString_Substring(s + 1, 2);
    puts(t);
    free(t);
}
"
    );
    assert_eq!(source.matches("static char *FuString_Substring(").count(), 1);
    assert!(!source.contains("strdup(FuString_Substring"));
}

#[test]
fn interpolation_allocates_through_format() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let n = program.add_var("n", Type::INT, None);
    let message = Expr::interpolated(
        vec![InterpolatedPart {
            prefix: "n=".to_string(),
            arg: program.var_ref(n),
            width: None,
            format: None,
            precision: None,
        }],
        "",
    );
    let msg = program.add_var("msg", Type::StringStorage, Some(message));
    let print = Expr::builtin(
        None,
        Builtin::ConsoleWrite { stderr: true },
        vec![program.var_ref(msg)],
        None,
    );
    add_static(
        &mut program,
        text,
        "Report",
        vec![n],
        None,
        vec![Stmt::Var(msg), Stmt::Expr(print)],
    );

    let source = source(&program);
    assert_eq!(
        function(&source, "void Text_Report(int n)"),
        "void Text_Report(int n)
{
    char *msg = FuString_Format(\"n=%d\", n);
    fputs(msg, stderr);
    free(msg);
}
"
    );
    assert!(source.contains("static char *FuString_Format(const char *format, ...)"));
    assert!(source.contains("#include <stdarg.h>") || source.contains("#include <stdio.h>"));
}

#[test]
fn concatenation_is_one_allocation_freed_once() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let s = program.add_var("s", Type::StringPtr, None);
    let n = program.add_var("n", Type::INT, None);
    let shout = Expr::binary(
        BinaryOp::Add,
        Expr::binary(BinaryOp::Add, program.var_ref(s), Expr::string("!"), Type::StringStorage),
        program.var_ref(n),
        Type::StringStorage,
    );
    let t = program.add_var("t", Type::StringStorage, Some(shout));
    let append = Expr::assign(
        BinaryOp::AddAssign,
        program.var_ref(t),
        Expr::binary(BinaryOp::Add, Expr::string("?"), program.var_ref(s), Type::StringStorage),
    );
    let print = Expr::builtin(
        None,
        Builtin::ConsoleWriteLine { stderr: false },
        vec![program.var_ref(t)],
        None,
    );
    add_static(
        &mut program,
        text,
        "Shout",
        vec![s, n],
        None,
        vec![Stmt::Var(t), Stmt::Expr(append), Stmt::Expr(print)],
    );

    let source = source(&program);
    assert_eq!(
        function(&source, "void Text_Shout(const char *s, int n)"),
        "void Text_Shout(const char *s, int n)
{
    char *t = FuString_Format(\"%s!%d\", s, n);
    FuString_Assign(&t, FuString_Format(\"%s?%s\", t, s));
    puts(t);
    free(t);
}
"
    );
    assert!(!source.contains("strdup(FuString_Format"));
}

#[test]
fn concatenation_written_to_console_needs_no_temporary() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let s = program.add_var("s", Type::StringPtr, None);
    let line = Expr::binary(BinaryOp::Add, Expr::string("> "), program.var_ref(s), Type::StringStorage);
    let print = Expr::builtin(None, Builtin::ConsoleWriteLine { stderr: false }, vec![line], None);
    add_static(&mut program, text, "Echo", vec![s], None, vec![Stmt::Expr(print)]);

    let source = source(&program);
    assert!(source.contains("    printf(\"> %s\\n\", s);\n"), "{source}");
    assert!(!source.contains("FuString_Format"));
}

#[test]
fn case_insensitive_equality_uses_the_library_routine() {
    let mut program = Program::new();
    let text = static_class(&mut program, "Text");
    let a = program.add_var("a", Type::StringPtr, None);
    let b = program.add_var("b", Type::StringPtr, None);
    let same = Expr::builtin(
        Some(program.var_ref(a)),
        Builtin::StringEqualsIgnoreCase,
        vec![program.var_ref(b)],
        Some(Type::Bool),
    );
    add_static(&mut program, text, "Same", vec![a, b], Some(Type::Bool), vec![Stmt::Return(Some(same))]);

    let source = source(&program);
    assert_eq!(
        function(&source, "bool Text_Same(const char *a, const char *b)"),
        "bool Text_Same(const char *a, const char *b)
{
    return FuString_CompareIgnoreCase(a, b) == 0;
}
"
    );
    assert!(source.contains("#include <ctype.h>"));
    assert_eq!(source.matches("static int FuString_CompareIgnoreCase(").count(), 1);
}

// Shared pointers

#[test]
fn shared_assignment_retains_before_releasing() {
    let mut program = Program::new();
    let node = program.add_class(Class::new("Node"));
    let shared = Type::class_ptr(node, Sharing::Shared);
    let next = program.add_field(node, "Next", shared.clone(), None);
    let other = program.add_var("other", shared, None);
    let mut adopt = Method::new("Adopt", node);
    adopt.mutator = true;
    adopt.params = vec![other];
    adopt.body = Some(Stmt::block(vec![Stmt::Expr(Expr::assign(
        BinaryOp::Assign,
        program.field_ref(None, next),
        program.var_ref(other),
    ))]));
    program.add_method(adopt);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Node_Adopt(Node *self, Node *other)"),
        "void Node_Adopt(Node *self, Node *other)
{
    FuShared_Assign((void **) &self->next, FuShared_AddRef(other));
    FuShared_Release(other);
}
"
    );
    assert!(source.contains("FuShared_Release(self->next);"));
    let add_ref = source.find("static void *FuShared_AddRef(").expect("add-ref routine");
    let assign = source.find("static void FuShared_Assign(").expect("assign routine");
    assert!(add_ref < assign);
}

#[test]
fn borrowed_shared_sources_are_retained() {
    let mut program = Program::new();
    let node = program.add_class(Class::new("Node"));
    program.add_field(node, "Value", Type::INT, None);
    let graph = static_class(&mut program, "Graph");
    let shared = Type::class_ptr(node, Sharing::Shared);

    let n = program.add_var("n", shared.clone(), None);
    let keep = add_static(&mut program, graph, "Keep", vec![n], None, vec![]);

    let flag = program.add_var("flag", Type::Bool, None);
    let arr = program.add_var("arr", Type::array_storage(shared.clone(), 2), None);
    let element = |program: &Program, i| {
        Expr::binary(BinaryOp::Index, program.var_ref(arr), Expr::int(i), shared.clone())
    };
    let p = program.add_var("p", shared.clone(), Some(element(&program, 0)));
    let reassign = Expr::assign(
        BinaryOp::Assign,
        program.var_ref(p),
        Expr::cond(program.var_ref(flag), element(&program, 1), Expr::null()),
    );
    let pass = program.call(None, keep, vec![element(&program, 0)]);
    let body = vec![Stmt::Var(arr), Stmt::Var(p), Stmt::Expr(reassign), Stmt::Expr(pass)];
    add_static(&mut program, graph, "Pick", vec![flag], None, body);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Graph_Pick(bool flag)"),
        "void Graph_Pick(bool flag)
{
    Node *arr[2] = { NULL };
    Node *p = FuShared_AddRef(arr[0]);
    FuShared_Assign((void **) &p, FuShared_AddRef(flag ? arr[1] : NULL));
    Graph_Keep(FuShared_AddRef(arr[0]));
    FuShared_Release(p);
    for (int _i0 = 1; _i0 >= 0; _i0--)
        FuShared_Release(arr[_i0]);
}
"
    );
}

#[test]
fn fresh_shared_values_are_not_retained() {
    let mut program = Program::new();
    let node = program.add_class(Class::new("Node"));
    program.add_field(node, "Value", Type::INT, None);
    let graph = static_class(&mut program, "Graph");
    let shared = Type::class_ptr(node, Sharing::Shared);
    let mut make = Method::new("Make", graph);
    make.call_kind = CallKind::Static;
    make.return_type = Some(shared.clone());
    make.body = Some(Stmt::block(vec![Stmt::Return(Some(Expr::null()))]));
    let make = program.add_method(make);
    let p = program.add_var("p", shared, Some(program.call(None, make, vec![])));
    add_static(&mut program, graph, "Use", vec![], None, vec![Stmt::Var(p)]);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Graph_Use(void)"),
        "void Graph_Use(void)
{
    Node *p = Graph_Make();
    FuShared_Release(p);
}
"
    );
    assert!(!source.contains("FuShared_AddRef"));
}

// Collections

#[test]
fn local_list_lowers_to_the_runtime_buffer() {
    let mut program = Program::new();
    let names_class = static_class(&mut program, "Names");
    let s = program.add_var("s", Type::StringPtr, None);
    let list = Type::List(Box::new(Type::StringStorage));
    let names = program.add_var("names", list, None);
    let add = Expr::builtin(Some(program.var_ref(names)), Builtin::ListAdd, vec![program.var_ref(s)], None);
    let first = Expr::binary(BinaryOp::Index, program.var_ref(names), Expr::int(0), Type::StringStorage);
    let print = Expr::builtin(None, Builtin::ConsoleWriteLine { stderr: false }, vec![first], None);
    let clear = Expr::builtin(Some(program.var_ref(names)), Builtin::ListClear, vec![], None);
    let count = Expr::property(program.var_ref(names), fuse_ir::Property::CollectionCount);
    let body = vec![
        Stmt::Var(names),
        Stmt::Expr(add),
        Stmt::Expr(print),
        Stmt::Expr(clear),
        Stmt::Return(Some(count)),
    ];
    add_static(&mut program, names_class, "Collect", vec![s], Some(Type::INT), body);

    let source = source(&program);
    assert_eq!(
        function(&source, "int Names_Collect(const char *s)"),
        "int Names_Collect(const char *s)
{
    FuList names;
    FuList_Init(&names, sizeof(char *), (FuMethodPtr) FuString_Destruct);
    *(char **) FuList_AddSlot(&names) = strdup(s);
    puts(((char **) names.items)[0]);
    FuList_Clear(&names);
    int returnValue = (int) names.count;
    FuList_Destruct(&names);
    return returnValue;
}
"
    );
    assert_eq!(source.matches("} FuList;").count(), 1);
    for routine in ["FuList_Init(", "FuList_AddSlot(", "FuList_Clear(", "FuList_Destruct(", "FuString_Destruct("] {
        assert!(source.contains(&format!("static void {routine}")) || source.contains(&format!("static void *{routine}")), "{routine}");
    }
}

#[test]
fn list_field_is_initialized_and_destructed_with_its_owner() {
    let mut program = Program::new();
    let inbox = program.add_class(Class::new("Inbox"));
    program.add_field(inbox, "Items", Type::List(Box::new(Type::INT)), None);

    let source = source(&program);
    assert!(source.contains("    FuList items;\n"), "{source}");
    assert!(source.contains("    FuList_Init(&self->items, sizeof(int), NULL);\n"), "{source}");
    assert!(source.contains("    FuList_Destruct(&self->items);\n"), "{source}");
}

#[test]
fn string_array_is_freed_in_descending_index_order() {
    let mut program = Program::new();
    let table = static_class(&mut program, "Table");
    let names = program.add_var("names", Type::array_storage(Type::StringStorage, 3), None);
    add_static(&mut program, table, "Fill", vec![], None, vec![Stmt::Var(names)]);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Table_Fill(void)"),
        "void Table_Fill(void)
{
    char *names[3] = { NULL };
    for (int _i0 = 2; _i0 >= 0; _i0--)
        free(names[_i0]);
}
"
    );
}

#[test]
fn class_value_array_is_constructed_up_and_destructed_down() {
    let mut program = Program::new();
    let buffer = program.add_class(Class::new("Buffer"));
    program.add_field(buffer, "Data", Type::StringStorage, None);
    let pool = static_class(&mut program, "Pool");
    let bufs = program.add_var("bufs", Type::array_storage(Type::ClassValue(buffer), 2), None);
    add_static(&mut program, pool, "Hold", vec![], None, vec![Stmt::Var(bufs)]);

    let source = source(&program);
    assert_eq!(
        function(&source, "void Pool_Hold(void)"),
        "void Pool_Hold(void)
{
    Buffer bufs[2];
    for (int _i0 = 0; _i0 < 2; _i0++)
        Buffer_Construct(&bufs[_i0]);
    for (int _i0 = 1; _i0 >= 0; _i0--)
        Buffer_Destruct(&bufs[_i0]);
}
"
    );
    assert!(source.contains("    free(self->data);\n"), "{source}");
}

// Virtual dispatch

/// `Animal.Speak` overridden by `Dog` and again by `Puppy`, declared
/// most-derived first.
fn animals() -> (Program, ClassId, MethodId) {
    let mut program = Program::new();
    let puppy = program.add_class(Class::new("Puppy"));
    let dog = program.add_class(Class::new("Dog"));
    let animal = program.add_class(Class::new("Animal"));
    program.classes[puppy.index()].base = Some(dog);
    program.classes[dog.index()].base = Some(animal);

    let mut dog_speak = None;
    for (class, call_kind, sound) in [
        (animal, CallKind::Virtual, 0),
        (dog, CallKind::Override, 1),
        (puppy, CallKind::Override, 2),
    ] {
        let mut speak = Method::new("Speak", class);
        speak.call_kind = call_kind;
        speak.return_type = Some(Type::INT);
        speak.body = Some(Stmt::block(vec![Stmt::Return(Some(Expr::int(sound)))]));
        let id = program.add_method(speak);
        if class == dog {
            dog_speak = Some(id);
        }
    }
    (program, dog, dog_speak.expect("Dog.Speak"))
}

#[test]
fn tables_resolve_most_derived_override_in_any_declaration_order() {
    let (program, _, _) = animals();
    let source = source(&program);

    let animal = source.find("struct Animal {").expect("Animal struct");
    let dog = source.find("struct Dog {").expect("Dog struct");
    let puppy = source.find("struct Puppy {").expect("Puppy struct");
    assert!(animal < dog && dog < puppy);

    assert_eq!(
        function(&source, "static void Puppy_Construct(Puppy *self)"),
        "static void Puppy_Construct(Puppy *self)
{
    Dog_Construct(&self->base);
    static const AnimalVtbl vtbl = {
        (int (*)(const Animal *self)) Puppy_Speak,
    };
    self->base.base.vtbl = &vtbl;
}
"
    );
    assert!(function(&source, "static void Dog_Construct(Dog *self)")
        .contains("(int (*)(const Animal *self)) Dog_Speak,"));
    assert!(function(&source, "static void Animal_Construct(Animal *self)")
        .contains("        Animal_Speak,\n"));
}

#[test]
fn call_through_derived_pointer_reaches_the_root_table() {
    let (mut program, dog, dog_speak) = animals();
    let zoo = static_class(&mut program, "Zoo");
    let d = program.add_var("d", Type::class_ptr(dog, Sharing::None), None);
    let call = program.call(Some(program.var_ref(d)), dog_speak, vec![]);
    add_static(&mut program, zoo, "Hear", vec![d], Some(Type::INT), vec![Stmt::Return(Some(call))]);

    let source = source(&program);
    assert!(source.contains("    return d->base.vtbl->speak(&d->base);\n"), "{source}");
}

// Failure sentinels

/// Static helpers that may fail, one per sentinel kind, and callers that
/// forward their failure.
fn parser() -> Program {
    let mut program = Program::new();
    let parser = static_class(&mut program, "Parser");
    let may_fail = |program: &mut Program, method: MethodId| {
        program.methods[method.index()].throws = true;
    };

    let ok = program.add_var("ok", Type::Bool, None);
    let body = vec![
        Stmt::if_then(
            Expr::unary(UnaryOp::Not, program.var_ref(ok)),
            Stmt::Throw(Expr::string("eof")),
            None,
        ),
        Stmt::Return(Some(Expr::int(1))),
    ];
    let read_byte = add_static(&mut program, parser, "ReadByte", vec![ok], Some(Type::INT), body);
    may_fail(&mut program, read_byte);
    let read = program.call(None, read_byte, vec![Expr::bool(true)]);

    let s = owned_string(&mut program, "s", "x");
    let skip = add_static(&mut program, parser, "Skip", vec![], None, vec![Stmt::Var(s), Stmt::Expr(read.clone())]);
    may_fail(&mut program, skip);

    let twice = add_static(
        &mut program,
        parser,
        "Twice",
        vec![],
        Some(Type::INT),
        vec![Stmt::Expr(read.clone()), Stmt::Return(Some(Expr::int(2)))],
    );
    may_fail(&mut program, twice);

    let skip_call = program.call(None, skip, vec![]);
    let run = add_static(&mut program, parser, "Run", vec![], None, vec![Stmt::Expr(skip_call)]);
    may_fail(&mut program, run);

    let ratio = add_static(
        &mut program,
        parser,
        "Ratio",
        vec![],
        Some(Type::DOUBLE),
        vec![Stmt::Throw(Expr::string("no ratio"))],
    );
    may_fail(&mut program, ratio);
    let ratio_call = program.call(None, ratio, vec![]);
    let half = add_static(
        &mut program,
        parser,
        "Half",
        vec![],
        Some(Type::DOUBLE),
        vec![Stmt::Expr(ratio_call), Stmt::Return(Some(Expr::float(1.5)))],
    );
    may_fail(&mut program, half);

    let name = add_static(
        &mut program,
        parser,
        "Name",
        vec![],
        Some(Type::StringPtr),
        vec![Stmt::Return(Some(Expr::string("n")))],
    );
    may_fail(&mut program, name);
    let name_call = program.call(None, name, vec![]);
    let use_name = add_static(
        &mut program,
        parser,
        "Use",
        vec![],
        Some(Type::StringPtr),
        vec![Stmt::Expr(name_call), Stmt::Return(Some(Expr::string("ok")))],
    );
    may_fail(&mut program, use_name);

    let b = program.add_var("b", Type::INT, Some(read));
    let body = vec![Stmt::Var(b), Stmt::Return(Some(program.var_ref(b)))];
    let sum = add_static(&mut program, parser, "Sum", vec![], Some(Type::INT), body);
    may_fail(&mut program, sum);
    program
}

#[test]
fn throw_returns_the_sentinel() {
    let source = source(&parser());
    assert_eq!(
        function(&source, "int Parser_ReadByte(bool ok)"),
        "int Parser_ReadByte(bool ok)
{
    if (!ok)
        return -1;
    return 1;
}
"
    );
    assert_eq!(
        function(&source, "double Parser_Ratio(void)"),
        "double Parser_Ratio(void)
{
    return NAN;
}
"
    );
    assert!(source.contains("#include <math.h>"));
}

#[test]
fn forwarded_failure_tears_down_before_returning() {
    let source = source(&parser());
    assert_eq!(
        function(&source, "bool Parser_Skip(void)"),
        "bool Parser_Skip(void)
{
    char *s = strdup(\"x\");
    if (Parser_ReadByte(true) == -1) {
        free(s);
        return false;
    }
    free(s);
    return true;
}
"
    );
}

#[test]
fn call_and_return_collapse_per_sentinel_kind() {
    let source = source(&parser());
    assert!(source.contains("    return Parser_ReadByte(true) != -1 ? 2 : -1;\n"));
    assert!(source.contains("    return Parser_Skip();\n"));
    assert!(source.contains("    return !isnan(Parser_Ratio()) ? 1.5 : NAN;\n"));
    assert!(source.contains("    return Parser_Name() != NULL ? \"ok\" : NULL;\n"));
}

#[test]
fn initializer_from_may_fail_call_is_checked() {
    let source = source(&parser());
    assert_eq!(
        function(&source, "int Parser_Sum(void)"),
        "int Parser_Sum(void)
{
    int b = Parser_ReadByte(true);
    if (b == -1)
        return -1;
    return b;
}
"
    );
}

#[test]
fn failure_outside_a_may_fail_method_is_unsupported() {
    let mut program = parser();
    let parser = ClassId::new(0);
    let read_byte = MethodId::new(0);
    let call = program.call(None, read_byte, vec![Expr::bool(true)]);
    add_static(&mut program, parser, "Careless", vec![], None, vec![Stmt::Expr(call)]);
    let err = try_source(&program);
    assert!(matches!(err, Err(CodegenError::Unsupported { .. })), "{err:?}");
}
