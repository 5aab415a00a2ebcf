use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;
use std::collections::BTreeMap;
use std::iter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// Bindings of one lexical scope. `None` marks a variable declared without
/// an initializer and not yet assigned.
#[derive(Debug)]
struct Scope {
    values: BTreeMap<String, Option<Value>>,
    parent: Option<ScopeId>,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Scope {
        Scope {
            values: BTreeMap::new(),
            parent,
        }
    }
}

/// Arena of scopes. Blocks push a scope on entry and pop it on exit, so the
/// innermost scope is always the last one in the arena.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            scopes: vec![Scope::new(None)],
            current: ScopeId(0),
        }
    }
    #[cfg(test)]
    fn current(&self) -> ScopeId {
        self.current
    }
    #[cfg(test)]
    fn depth(&self) -> usize {
        self.scopes.len()
    }
    pub fn push_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(Some(self.current)));
        self.current = id;
        tracing::trace!(depth = self.scopes.len(), "entered scope");
        id
    }
    /// Leaves the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.scopes.truncate(self.current.0);
            self.current = parent;
            tracing::trace!(depth = self.scopes.len(), "left scope");
        }
    }
    /// Binds `name` in the innermost scope, replacing any earlier binding there.
    pub fn define(&mut self, name: &str, value: Value) {
        self.scopes[self.current.0]
            .values
            .insert(name.to_string(), Some(value));
    }
    /// Binds `name` in the innermost scope without giving it a value.
    pub fn declare(&mut self, name: &str) {
        self.scopes[self.current.0]
            .values
            .insert(name.to_string(), None);
    }
    fn chain(&self) -> impl Iterator<Item = &Scope> {
        iter::successors(Some(&self.scopes[self.current.0]), move |scope| {
            scope.parent.map(|id| &self.scopes[id.0])
        })
    }
    pub fn get(&self, token: &Token) -> Result<Value, RuntimeError> {
        match self.chain().find_map(|scope| scope.values.get(token.lexeme)) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(RuntimeError::new(
                token,
                RuntimeErrorKind::UninitializedVariable(token.lexeme.to_string()),
            )),
            None => Err(RuntimeError::new(
                token,
                RuntimeErrorKind::UndefinedVariable(token.lexeme.to_string()),
            )),
        }
    }
    /// Updates the nearest existing binding of the token's name.
    pub fn assign(&mut self, token: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut id = Some(self.current);
        while let Some(ScopeId(index)) = id {
            let scope = &mut self.scopes[index];
            if let Some(slot) = scope.values.get_mut(token.lexeme) {
                *slot = Some(value);
                return Ok(());
            }
            id = scope.parent;
        }
        Err(RuntimeError::new(
            token,
            RuntimeErrorKind::UndefinedVariable(token.lexeme.to_string()),
        ))
    }
}

#[cfg(test)]
mod environment_tests {
    use super::*;
    use crate::token::TokenType;

    fn name(lexeme: &'static str) -> Token<'static> {
        Token {
            tokentype: TokenType::Identifier,
            lexeme,
            line: 4,
        }
    }

    #[test]
    fn define_and_get() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get(&name("a")), Ok(Value::Number(1.0)));
        env.define("a", Value::Nil);
        assert_eq!(env.get(&name("a")), Ok(Value::Nil));
    }

    #[test]
    fn undefined_variable() {
        let env = Environment::new();
        let e = env.get(&name("b")).unwrap_err();
        assert_eq!(e.kind, RuntimeErrorKind::UndefinedVariable("b".to_string()));
        assert_eq!(e.line, 4);
    }

    #[test]
    fn declared_but_unassigned_is_not_nil() {
        let mut env = Environment::new();
        env.declare("a");
        let e = env.get(&name("a")).unwrap_err();
        assert_eq!(e.kind, RuntimeErrorKind::UninitializedVariable("a".to_string()));

        env.assign(&name("a"), Value::Nil).unwrap();
        assert_eq!(env.get(&name("a")), Ok(Value::Nil));
    }

    #[test]
    fn inner_scope_shadows_then_restores() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.push_scope();
        env.define("a", Value::Number(2.0));
        assert_eq!(env.get(&name("a")), Ok(Value::Number(2.0)));
        env.pop_scope();
        assert_eq!(env.get(&name("a")), Ok(Value::Number(1.0)));
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn assign_reaches_enclosing_scope() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.push_scope();
        env.assign(&name("a"), Value::Number(5.0)).unwrap();
        env.pop_scope();
        assert_eq!(env.get(&name("a")), Ok(Value::Number(5.0)));
    }

    #[test]
    fn assign_to_undefined_fails() {
        let mut env = Environment::new();
        let e = env.assign(&name("z"), Value::Nil).unwrap_err();
        assert_eq!(e.kind, RuntimeErrorKind::UndefinedVariable("z".to_string()));
    }

    #[test]
    fn global_scope_survives_extra_pops() {
        let mut env = Environment::new();
        env.define("a", Value::Boolean(true));
        env.pop_scope();
        assert_eq!(env.current(), ScopeId(0));
        assert_eq!(env.get(&name("a")), Ok(Value::Boolean(true)));
    }
}
