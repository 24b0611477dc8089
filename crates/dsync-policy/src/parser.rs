//! Policy source parsing.
//!
//! Syntax is handled by the `regorus` Rego parser. This module lowers its
//! tree into a [`PolicyModule`]: rule heads become [`RuleKind`]s and data
//! paths, and every rule body goes through binding analysis so the compile
//! stages can reject unsafe variables and unknown functions.

use std::fmt;

use regorus::unstable::{Expr, Module, Parser, Rule as RegoRule, RuleHead, Source};

use crate::ast::{Import, Package, PolicyModule, Rule, RuleKind};
use crate::error::ParseError;
use crate::scope::{pattern_vars, Refs, Scope};

/// Parse a policy module source. `path` names the module in error messages.
pub fn parse_module(path: &str, source: &str) -> Result<PolicyModule, ParseError> {
    let source = Source::from_contents(path.to_string(), source.to_string())
        .map_err(|e| syntax_error(path, e))?;
    let mut parser = Parser::new(&source).map_err(|e| syntax_error(path, e))?;
    let module = parser.parse().map_err(|e| syntax_error(path, e))?;
    lower(&module)
}

fn lower(module: &Module) -> Result<PolicyModule, ParseError> {
    let package = {
        let line = line_of(&module.package.refr);
        let (path, dynamic) = ref_segments(module.package.refr.span().text());
        if dynamic || path.is_empty() {
            return Err(ParseError::new(line, "package path must be static"));
        }
        Package { path, line }
    };

    let imports = module
        .imports
        .iter()
        .map(|import| {
            let line = import.span.line as usize;
            let (path, dynamic) = ref_segments(import.refr.span().text());
            if dynamic || path.is_empty() {
                return Err(ParseError::new(line, "import path must be static"));
            }
            Ok(Import {
                path,
                alias: import.r#as.as_ref().map(|alias| alias.text().to_string()),
                line,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rules = module
        .policy
        .iter()
        .map(|rule| lower_rule(rule))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PolicyModule {
        package,
        imports,
        rules,
    })
}

fn lower_rule(rule: &RegoRule) -> Result<Rule, ParseError> {
    match rule {
        RegoRule::Default {
            span,
            refr,
            args,
            value,
            ..
        } => {
            let line = span.line as usize;
            let (path, dynamic) = ref_segments(refr.span().text());
            if dynamic {
                return Err(ParseError::new(line, "default rule head must be static"));
            }
            let kind = match args.len() {
                0 => RuleKind::Complete,
                arity => RuleKind::Function { arity },
            };
            let mut scope = Scope::new();
            for arg in args {
                pattern_vars(arg, &mut scope);
            }
            let mut refs = Refs::default();
            refs.expr(value, &scope);
            Ok(finish(path, kind, true, line, refs))
        }
        RegoRule::Spec {
            span, head, bodies, ..
        } => {
            let line = span.line as usize;
            let mut args = Scope::new();
            // Head expressions evaluated in the scope of each body.
            let mut head_exprs: Vec<&Expr> = Vec::new();
            let (path, kind) = match head {
                RuleHead::Compr { refr, assign, .. } => {
                    head_indices(refr, &mut head_exprs);
                    if let Some(assign) = assign {
                        head_exprs.push(&assign.value);
                    }
                    let (path, dynamic) = ref_segments(refr.span().text());
                    let kind = match (dynamic, assign.is_some()) {
                        (false, _) => RuleKind::Complete,
                        (true, true) => RuleKind::PartialObject,
                        (true, false) => RuleKind::PartialSet,
                    };
                    (path, kind)
                }
                RuleHead::Set { refr, key, .. } => {
                    if let Some(key) = key {
                        head_exprs.push(key);
                    }
                    (ref_segments(refr.span().text()).0, RuleKind::PartialSet)
                }
                RuleHead::Func {
                    refr,
                    args: params,
                    assign,
                    ..
                } => {
                    for param in params {
                        pattern_vars(param, &mut args);
                    }
                    if let Some(assign) = assign {
                        head_exprs.push(&assign.value);
                    }
                    let (path, dynamic) = ref_segments(refr.span().text());
                    if dynamic {
                        return Err(ParseError::new(line, "function name must be static"));
                    }
                    (
                        path,
                        RuleKind::Function {
                            arity: params.len(),
                        },
                    )
                }
            };
            if path.is_empty() {
                return Err(ParseError::new(line, "rule head has no name"));
            }

            let mut refs = Refs::default();
            if bodies.is_empty() {
                for expr in &head_exprs {
                    refs.expr(expr, &args);
                }
            }
            for body in bodies {
                let bound = refs.query(&body.query, &args);
                match &body.assign {
                    // `else := value if { ... }` carries its own value.
                    Some(assign) => refs.expr(&assign.value, &bound),
                    None => {
                        for expr in &head_exprs {
                            refs.expr(expr, &bound);
                        }
                    }
                }
            }
            Ok(finish(path, kind, false, line, refs))
        }
    }
}

fn finish(path: Vec<String>, kind: RuleKind, is_default: bool, line: usize, refs: Refs) -> Rule {
    let refs = refs.finish();
    Rule {
        path,
        kind,
        is_default,
        line,
        free_vars: refs.free,
        calls: refs.calls,
    }
}

/// Index expressions of a rule head reference, e.g. `k` in `p[k] := v`.
fn head_indices<'a>(refr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match refr {
        Expr::RefBrack { refr, index, .. } => {
            out.push(index);
            head_indices(refr, out);
        }
        Expr::RefDot { refr, .. } => head_indices(refr, out),
        _ => {}
    }
}

fn line_of(expr: &Expr) -> usize {
    expr.span().line as usize
}

/// Split a reference such as `a.b["c-d"]` into segments. A bracket holding
/// anything other than a string literal ends the static prefix; the flag
/// reports whether that happened.
fn ref_segments(text: &str) -> (Vec<String>, bool) {
    let mut segments = Vec::new();
    let mut rest = text.trim();
    loop {
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let name = rest[..end].trim();
        if !name.is_empty() {
            segments.push(name.to_string());
        }
        rest = &rest[end..];
        if let Some(after) = rest.strip_prefix('.') {
            rest = after;
            continue;
        }
        let Some(inner) = rest.strip_prefix('[') else {
            return (segments, false);
        };
        let inner = inner.trim_start();
        let Some(quoted) = inner.strip_prefix('"') else {
            return (segments, true);
        };
        let Some(close) = quoted.find('"') else {
            return (segments, true);
        };
        segments.push(quoted[..close].to_string());
        rest = quoted[close + 1..].trim_start();
        match rest.strip_prefix(']') {
            Some(after) => rest = after,
            None => return (segments, true),
        }
    }
}

/// Build a [`ParseError`] from a parser diagnostic. The diagnostic names the
/// location as `path:line:col`; the line is recovered from there.
fn syntax_error(path: &str, err: impl fmt::Display) -> ParseError {
    let message = err.to_string();
    let line = error_line(path, &message).unwrap_or(0);
    let summary = message
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("error:"))
        .map(|l| l.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| message.trim().to_string());
    ParseError::new(line, summary)
}

fn error_line(path: &str, message: &str) -> Option<usize> {
    let marker = format!("{path}:");
    let start = message.find(&marker)? + marker.len();
    let digits: String = message[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
