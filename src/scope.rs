//! Scope Table
//!
//! Two independent scope structures, one per spec §3: the Parser's
//! (tracks declarations so identifiers can be classified while
//! parsing) and the Lowerer's (tracks variable/argument/procedure
//! identity while emitting stage blocks). Both are arenas of records
//! addressed by a stable index, with each record holding only its
//! parent's index — the "owned records addressed by stable indices
//! into an arena" shape recommended for scope chains, avoiding
//! reference-counted cells since ownership here is strictly a tree.
//!
//! The Parser scope's "owns the body list it is attached to" is
//! realized operationally rather than structurally: the parser always
//! carries the enclosing block's `&mut Vec<ast::Node>` alongside the
//! active `ScopeIndex` when it needs to inject a synthetic
//! declaration, rather than the scope record holding a pointer into
//! the AST (see `parser.rs`).

use std::collections::HashMap;

use crate::error::{CompileError, Result};

pub type ScopeIndex = usize;

// ---------------------------------------------------------------- Parser

#[derive(Debug, Clone)]
pub struct ParserVariable {
    pub is_const: bool,
    pub is_array: bool,
}

#[derive(Debug, Clone)]
pub struct ParserFunction {
    pub params: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ParserScope {
    pub parent: Option<ScopeIndex>,
    variables: HashMap<String, ParserVariable>,
    functions: HashMap<String, ParserFunction>,
    /// Reserved; namespace resolution is a no-op until specified
    /// (Open Question (a)).
    pub namespace: Option<HashMap<String, String>>,
}

#[derive(Debug, Default)]
pub struct ParserScopeArena {
    scopes: Vec<ParserScope>,
}

impl ParserScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: vec![ParserScope::default()],
        }
    }

    pub fn root(&self) -> ScopeIndex {
        0
    }

    pub fn push_child(&mut self, parent: ScopeIndex) -> ScopeIndex {
        self.scopes.push(ParserScope {
            parent: Some(parent),
            ..ParserScope::default()
        });
        self.scopes.len() - 1
    }

    pub fn declare_variable(
        &mut self,
        scope: ScopeIndex,
        name: impl Into<String>,
        decl: ParserVariable,
    ) -> Result<()> {
        let name = name.into();
        let record = &mut self.scopes[scope];
        if record.variables.contains_key(&name) || record.functions.contains_key(&name) {
            return Err(CompileError::record(format!(
                "\"{}\" is already declared in this scope",
                name
            )));
        }
        record.variables.insert(name, decl);
        Ok(())
    }

    pub fn declare_function(&mut self, scope: ScopeIndex, name: impl Into<String>, func: ParserFunction) -> Result<()> {
        let name = name.into();
        let record = &mut self.scopes[scope];
        if record.variables.contains_key(&name) || record.functions.contains_key(&name) {
            return Err(CompileError::record(format!(
                "\"{}\" is already declared in this scope",
                name
            )));
        }
        record.functions.insert(name, func);
        Ok(())
    }

    /// Walks toward the root looking for a variable declaration named
    /// `name`.
    pub fn resolve_variable(&self, scope: ScopeIndex, name: &str) -> Option<&ParserVariable> {
        let mut cur = Some(scope);
        while let Some(idx) = cur {
            if let Some(v) = self.scopes[idx].variables.get(name) {
                return Some(v);
            }
            cur = self.scopes[idx].parent;
        }
        None
    }

    pub fn resolve_function(&self, scope: ScopeIndex, name: &str) -> Option<&ParserFunction> {
        let mut cur = Some(scope);
        while let Some(idx) = cur {
            if let Some(f) = self.scopes[idx].functions.get(name) {
                return Some(f);
            }
            cur = self.scopes[idx].parent;
        }
        None
    }
}

// --------------------------------------------------------------- Lowerer

#[derive(Debug, Clone, PartialEq)]
pub enum VariableRole {
    Variable { is_const: bool },
    Argument { arg_id: String },
}

#[derive(Debug, Clone)]
pub struct LowererVariable {
    pub id: String,
    pub is_array: bool,
    pub role: VariableRole,
    pub change_count: u32,
}

#[derive(Debug, Clone)]
pub struct ProcedureInfo {
    pub id: String,
    pub param_ids: Vec<String>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LowererScope {
    pub parent: Option<ScopeIndex>,
    variables: HashMap<String, LowererVariable>,
    functions: HashMap<String, ProcedureInfo>,
}

#[derive(Debug, Default)]
pub struct LowererScopeArena {
    scopes: Vec<LowererScope>,
}

impl LowererScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: vec![LowererScope::default()],
        }
    }

    pub fn root(&self) -> ScopeIndex {
        0
    }

    pub fn push_child(&mut self, parent: ScopeIndex) -> ScopeIndex {
        self.scopes.push(LowererScope {
            parent: Some(parent),
            ..LowererScope::default()
        });
        self.scopes.len() - 1
    }

    /// Rejects shadowing a prior variable in the same record and
    /// rejects a variable/function name collision within the record.
    pub fn declare_variable(&mut self, scope: ScopeIndex, name: impl Into<String>, var: LowererVariable) -> Result<()> {
        let name = name.into();
        let record = &mut self.scopes[scope];
        if record.variables.contains_key(&name) {
            return Err(CompileError::record(format!("\"{}\" is already declared in this scope", name)));
        }
        if record.functions.contains_key(&name) {
            return Err(CompileError::record(format!(
                "\"{}\" collides with a function of the same name",
                name
            )));
        }
        record.variables.insert(name, var);
        Ok(())
    }

    pub fn declare_function(&mut self, scope: ScopeIndex, name: impl Into<String>, info: ProcedureInfo) -> Result<()> {
        let name = name.into();
        let record = &mut self.scopes[scope];
        if record.functions.contains_key(&name) {
            return Err(CompileError::record(format!("\"{}\" is already declared in this scope", name)));
        }
        if record.variables.contains_key(&name) {
            return Err(CompileError::record(format!(
                "\"{}\" collides with a variable of the same name",
                name
            )));
        }
        record.functions.insert(name, info);
        Ok(())
    }

    pub fn resolve_variable(&self, scope: ScopeIndex, name: &str) -> Option<(ScopeIndex, &LowererVariable)> {
        let mut cur = Some(scope);
        while let Some(idx) = cur {
            if let Some(v) = self.scopes[idx].variables.get(name) {
                return Some((idx, v));
            }
            cur = self.scopes[idx].parent;
        }
        None
    }

    pub fn resolve_function(&self, scope: ScopeIndex, name: &str) -> Option<&ProcedureInfo> {
        let mut cur = Some(scope);
        while let Some(idx) = cur {
            if let Some(f) = self.scopes[idx].functions.get(name) {
                return Some(f);
            }
            cur = self.scopes[idx].parent;
        }
        None
    }

    /// Increments the target variable's `change_count`; a second
    /// increment on a `const` raises `Interpret`, and any increment on
    /// an argument raises `Interpret` (arguments are never assignable).
    pub fn record_assignment(&mut self, scope: ScopeIndex, name: &str) -> Result<()> {
        let mut cur = Some(scope);
        while let Some(idx) = cur {
            if let Some(var) = self.scopes[idx].variables.get_mut(name) {
                match &var.role {
                    VariableRole::Argument { .. } => {
                        return Err(CompileError::interpret(format!("cannot assign to argument \"{}\"", name)));
                    }
                    VariableRole::Variable { is_const } => {
                        var.change_count += 1;
                        if *is_const && var.change_count > 1 {
                            return Err(CompileError::interpret(format!(
                                "cannot reassign const \"{}\"",
                                name
                            )));
                        }
                        return Ok(());
                    }
                }
            }
            cur = self.scopes[idx].parent;
        }
        Err(CompileError::record(format!("unresolved name \"{}\"", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_resolves_through_ancestor_scopes() {
        let mut arena = ParserScopeArena::new();
        let root = arena.root();
        arena
            .declare_variable(root, "x", ParserVariable { is_const: false, is_array: false })
            .unwrap();
        let child = arena.push_child(root);
        assert!(arena.resolve_variable(child, "x").is_some());
        assert!(arena.resolve_variable(child, "y").is_none());
    }

    #[test]
    fn parser_rejects_duplicate_declaration_in_same_scope() {
        let mut arena = ParserScopeArena::new();
        let root = arena.root();
        arena
            .declare_variable(root, "x", ParserVariable { is_const: false, is_array: false })
            .unwrap();
        assert!(arena
            .declare_variable(root, "x", ParserVariable { is_const: false, is_array: false })
            .is_err());
    }

    #[test]
    fn lowerer_rejects_variable_function_collision() {
        let mut arena = LowererScopeArena::new();
        let root = arena.root();
        arena
            .declare_function(
                root,
                "f",
                ProcedureInfo { id: "id1".into(), param_ids: vec![], attributes: vec![] },
            )
            .unwrap();
        let result = arena.declare_variable(
            root,
            "f",
            LowererVariable {
                id: "id2".into(),
                is_array: false,
                role: VariableRole::Variable { is_const: false },
                change_count: 0,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn second_assignment_to_const_is_an_interpret_error() {
        let mut arena = LowererScopeArena::new();
        let root = arena.root();
        arena
            .declare_variable(
                root,
                "c",
                LowererVariable {
                    id: "id1".into(),
                    is_array: false,
                    role: VariableRole::Variable { is_const: true },
                    change_count: 0,
                },
            )
            .unwrap();
        arena.record_assignment(root, "c").unwrap();
        let second = arena.record_assignment(root, "c");
        assert!(second.is_err());
    }

    #[test]
    fn assignment_to_argument_is_an_interpret_error() {
        let mut arena = LowererScopeArena::new();
        let root = arena.root();
        arena
            .declare_variable(
                root,
                "p",
                LowererVariable {
                    id: "id1".into(),
                    is_array: false,
                    role: VariableRole::Argument { arg_id: "argid".into() },
                    change_count: 0,
                },
            )
            .unwrap();
        assert!(arena.record_assignment(root, "p").is_err());
    }
}
