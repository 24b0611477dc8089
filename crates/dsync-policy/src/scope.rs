//! Variable binding analysis over the Rego syntax tree.
//!
//! Binding is order-insensitive within a query, as in Rego: a variable is
//! bound by `:=`, by either side of `=`, by `some`, by `every`, or by
//! appearing as a reference index (`xs[i]`). Comprehensions and `every`
//! bodies open a nested scope that sees the enclosing bindings. Negated
//! expressions bind nothing.

use std::collections::BTreeSet;

use regorus::unstable::{AssignOp, Expr, Literal, Query};

use crate::ast::NameRef;

pub(crate) type Scope = BTreeSet<String>;

/// Names one rule reads without binding, and the functions it calls.
#[derive(Debug, Default)]
pub(crate) struct Refs {
    pub free: Vec<NameRef>,
    pub calls: Vec<NameRef>,
}

impl Refs {
    /// Walk `query` with `outer` already bound. Returns the scope after the
    /// query: `outer` plus everything the query binds.
    pub fn query(&mut self, query: &Query, outer: &Scope) -> Scope {
        let mut bound = outer.clone();
        for stmt in &query.stmts {
            bind_literal(&stmt.literal, &mut bound);
        }
        for stmt in &query.stmts {
            self.literal(&stmt.literal, &bound);
            for modifier in &stmt.with_mods {
                self.expr(&modifier.r#as, &bound);
            }
        }
        bound
    }

    fn literal(&mut self, literal: &Literal, bound: &Scope) {
        match literal {
            Literal::SomeVars { .. } => {}
            Literal::SomeIn {
                key,
                value,
                collection,
                ..
            } => {
                if let Some(key) = key {
                    self.expr(key, bound);
                }
                self.expr(value, bound);
                self.expr(collection, bound);
            }
            Literal::Expr { expr, .. } | Literal::NotExpr { expr, .. } => self.expr(expr, bound),
            Literal::Every {
                key,
                value,
                domain,
                query,
                ..
            } => {
                self.expr(domain, bound);
                let mut inner = bound.clone();
                inner.extend(key.iter().map(|k| k.text().to_string()));
                inner.insert(value.text().to_string());
                self.query(query, &inner);
            }
        }
    }

    /// Record every unbound variable and every call in `expr`.
    pub fn expr(&mut self, expr: &Expr, bound: &Scope) {
        match expr {
            Expr::Var { .. } => {
                let name = expr.span().text();
                if name != "_" && !bound.contains(name) {
                    self.free.push(NameRef::new(name, line_of(expr)));
                }
            }
            Expr::Call { fcn, params, .. } => {
                self.calls.push(NameRef::new(fcn.span().text(), line_of(fcn)));
                for param in params {
                    self.expr(param, bound);
                }
            }
            Expr::RefDot { refr, .. } => self.expr(refr, bound),
            Expr::RefBrack { refr, index, .. } => {
                self.expr(refr, bound);
                self.expr(index, bound);
            }
            Expr::Array { items, .. } | Expr::Set { items, .. } => {
                for item in items {
                    self.expr(item, bound);
                }
            }
            Expr::Object { fields, .. } => {
                for (_, key, value) in fields {
                    self.expr(key, bound);
                    self.expr(value, bound);
                }
            }
            Expr::ArrayCompr { term, query, .. } | Expr::SetCompr { term, query, .. } => {
                let inner = self.query(query, bound);
                self.expr(term, &inner);
            }
            Expr::ObjectCompr {
                key, value, query, ..
            } => {
                let inner = self.query(query, bound);
                self.expr(key, &inner);
                self.expr(value, &inner);
            }
            Expr::UnaryExpr { expr, .. } => self.expr(expr, bound),
            Expr::BinExpr { lhs, rhs, .. }
            | Expr::BoolExpr { lhs, rhs, .. }
            | Expr::ArithExpr { lhs, rhs, .. }
            | Expr::AssignExpr { lhs, rhs, .. } => {
                self.expr(lhs, bound);
                self.expr(rhs, bound);
            }
            Expr::Membership {
                key,
                value,
                collection,
                ..
            } => {
                if let Some(key) = key {
                    self.expr(key, bound);
                }
                self.expr(value, bound);
                self.expr(collection, bound);
            }
            // Scalars and literals.
            _ => {}
        }
    }

    /// Sort and drop repeats; a head checked once per body reports each
    /// name once.
    pub fn finish(mut self) -> Self {
        self.free.sort();
        self.free.dedup();
        self.calls.sort();
        self.calls.dedup();
        self
    }
}

/// Add the variables `literal` binds to `bound`.
fn bind_literal(literal: &Literal, bound: &mut Scope) {
    match literal {
        Literal::SomeVars { vars, .. } => {
            bound.extend(vars.iter().map(|v| v.text().to_string()));
        }
        Literal::SomeIn {
            key,
            value,
            collection,
            ..
        } => {
            if let Some(key) = key {
                pattern_vars(key, bound);
            }
            pattern_vars(value, bound);
            index_vars(collection, bound);
        }
        Literal::Expr { expr, .. } => {
            match &**expr {
                Expr::AssignExpr {
                    op: AssignOp::ColEq,
                    lhs,
                    ..
                } => pattern_vars(lhs, bound),
                Expr::AssignExpr { lhs, rhs, .. } => {
                    pattern_vars(lhs, bound);
                    pattern_vars(rhs, bound);
                }
                _ => {}
            }
            index_vars(expr, bound);
        }
        Literal::NotExpr { .. } | Literal::Every { .. } => {}
    }
}

/// Variables in a destructuring position: a bare variable, or one nested
/// in an array or object literal.
pub(crate) fn pattern_vars(expr: &Expr, bound: &mut Scope) {
    match expr {
        Expr::Var { .. } => {
            let name = expr.span().text();
            if name != "_" {
                bound.insert(name.to_string());
            }
        }
        Expr::Array { items, .. } => {
            for item in items {
                pattern_vars(item, bound);
            }
        }
        Expr::Object { fields, .. } => {
            for (_, _, value) in fields {
                pattern_vars(value, bound);
            }
        }
        _ => {}
    }
}

/// Variables used as a reference index, e.g. `i` in `input.xs[i]`.
/// Comprehensions are not entered.
fn index_vars(expr: &Expr, bound: &mut Scope) {
    match expr {
        Expr::RefBrack { refr, index, .. } => {
            if let Expr::Var { .. } = &**index {
                pattern_vars(index, bound);
            } else {
                index_vars(index, bound);
            }
            index_vars(refr, bound);
        }
        Expr::RefDot { refr, .. } => index_vars(refr, bound),
        Expr::Call { params, .. } => {
            for param in params {
                index_vars(param, bound);
            }
        }
        Expr::Array { items, .. } | Expr::Set { items, .. } => {
            for item in items {
                index_vars(item, bound);
            }
        }
        Expr::Object { fields, .. } => {
            for (_, key, value) in fields {
                index_vars(key, bound);
                index_vars(value, bound);
            }
        }
        Expr::UnaryExpr { expr, .. } => index_vars(expr, bound),
        Expr::BinExpr { lhs, rhs, .. }
        | Expr::BoolExpr { lhs, rhs, .. }
        | Expr::ArithExpr { lhs, rhs, .. }
        | Expr::AssignExpr { lhs, rhs, .. } => {
            index_vars(lhs, bound);
            index_vars(rhs, bound);
        }
        Expr::Membership { collection, .. } => index_vars(collection, bound),
        _ => {}
    }
}

pub(crate) fn line_of(expr: &Expr) -> usize {
    expr.span().line as usize
}
