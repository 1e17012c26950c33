//! Pending-destruction bookkeeping.
//!
//! Tracks the locals and parameters in scope that own a resource, in
//! declaration order. Teardown always runs in reverse order. Loops and
//! switches record how long the list was on entry so that `break` and
//! `continue` tear down exactly the variables declared inside the statement
//! they leave.

use fuse_ir::VarId;

/// Kind of statement a `break` or `continue` can leave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Loop,
    Switch,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct JumpTarget {
    kind: JumpKind,
    /// List length when the statement was entered.
    mark: usize,
}

/// Variables owing a teardown call, innermost last.
#[derive(Debug, Default)]
pub struct PendingDestruction {
    vars: Vec<VarId>,
    targets: Vec<JumpTarget>,
}

impl PendingDestruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable right after its declaration.
    pub fn register(&mut self, var: VarId) {
        self.vars.push(var);
    }

    /// Current length, to restore at the end of a scope.
    pub fn mark(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables registered since `mark`, innermost first.
    pub fn since(&self, mark: usize) -> Vec<VarId> {
        self.vars
            .get(mark..)
            .map(|vars| vars.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Every pending variable, innermost first.
    pub fn all(&self) -> Vec<VarId> {
        self.since(0)
    }

    /// Forget variables registered since `mark`.
    pub fn truncate(&mut self, mark: usize) {
        self.vars.truncate(mark);
    }

    /// Every pending variable except `var`, innermost first. A returned
    /// variable hands its ownership to the caller.
    pub fn all_except(&self, var: VarId) -> Vec<VarId> {
        self.vars.iter().rev().copied().filter(|&v| v != var).collect()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.vars.contains(&var)
    }

    /// Enter a loop or switch body.
    pub fn enter(&mut self, kind: JumpKind) {
        self.targets.push(JumpTarget {
            kind,
            mark: self.vars.len(),
        });
    }

    /// Leave the innermost loop or switch.
    pub fn exit(&mut self) {
        self.targets.pop();
    }

    /// Variables a `break` must tear down, innermost first.
    pub fn for_break(&self) -> Vec<VarId> {
        self.targets
            .last()
            .map(|target| self.since(target.mark))
            .unwrap_or_default()
    }

    /// Variables a `continue` must tear down, innermost first.
    ///
    /// Switches are transparent to `continue`.
    pub fn for_continue(&self) -> Vec<VarId> {
        self.targets
            .iter()
            .rev()
            .find(|target| target.kind == JumpKind::Loop)
            .map(|target| self.since(target.mark))
            .unwrap_or_default()
    }

    /// Drop everything at the end of a function.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.targets.clear();
    }
}
