use super::*;
use crate::ast::Case;

fn ret() -> Stmt {
    Stmt::Return(None)
}

#[test]
fn jumps_do_not_complete() {
    assert!(!completes_normally(&ret()));
    assert!(!completes_normally(&Stmt::Break));
    assert!(!completes_normally(&Stmt::Continue));
    assert!(!completes_normally(&Stmt::Throw(Expr::string("boom"))));
}

#[test]
fn block_ending_in_return_does_not_complete() {
    let block = Stmt::block(vec![Stmt::Expr(Expr::int(1)), ret()]);
    assert!(!completes_normally(&block));
}

#[test]
fn if_needs_both_branches_to_jump() {
    let only_then = Stmt::if_then(Expr::bool(true), ret(), None);
    assert!(completes_normally(&only_then));

    let both = Stmt::if_then(Expr::bool(true), ret(), Some(Stmt::Throw(Expr::string("x"))));
    assert!(!completes_normally(&both));

    let one = Stmt::if_then(Expr::bool(true), ret(), Some(Stmt::block(vec![])));
    assert!(completes_normally(&one));
}

#[test]
fn infinite_loop_completes_only_with_break() {
    let forever = Stmt::while_loop(Expr::bool(true), Stmt::block(vec![]));
    assert!(!completes_normally(&forever));

    let with_break = Stmt::while_loop(
        Expr::bool(true),
        Stmt::block(vec![Stmt::if_then(Expr::bool(false), Stmt::Break, None)]),
    );
    assert!(completes_normally(&with_break));
}

#[test]
fn break_in_nested_loop_does_not_count() {
    let inner = Stmt::while_loop(Expr::bool(true), Stmt::Break);
    let outer = Stmt::while_loop(Expr::bool(true), Stmt::block(vec![inner]));
    assert!(!has_break(&Stmt::block(vec![Stmt::while_loop(Expr::bool(true), Stmt::Break)])));
    assert!(!completes_normally(&outer));
}

#[test]
fn switch_with_default_returning_everywhere() {
    let switch = Stmt::Switch {
        value: Expr::int(1),
        cases: vec![Case {
            values: vec![Expr::int(1)],
            body: vec![ret()],
        }],
        default: Some(vec![ret()]),
    };
    assert!(!completes_normally(&switch));

    let breaking = Stmt::Switch {
        value: Expr::int(1),
        cases: vec![Case {
            values: vec![Expr::int(1)],
            body: vec![Stmt::Break],
        }],
        default: Some(vec![ret()]),
    };
    assert!(completes_normally(&breaking));
}

#[test]
fn continue_seen_through_switch() {
    let switch = Stmt::Switch {
        value: Expr::int(1),
        cases: vec![Case {
            values: vec![Expr::int(1)],
            body: vec![Stmt::Continue],
        }],
        default: None,
    };
    assert!(has_continue(&Stmt::block(vec![switch])));
}
