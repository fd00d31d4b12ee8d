use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    error::{CompileError, CompileResult},
    Expr, ExprKind, FieldPath, Parameter, ParameterId, Ty,
};

/// Which context parameter [`extract`] looks for.
#[derive(Debug, Clone, Copy)]
pub enum Tracked<'a> {
    /// This exact parameter, wherever it appears free.
    Identity(&'a Parameter),
    /// Parameters of this type introduced by a lambda inside the expression, such as
    /// the element of a filter predicate.
    Type(&'a Ty),
}

/// A member chain rooted at a tracked parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub root: Parameter,
    pub chain: Expr,
}

/// Collects the members of a context parameter that `expr` reads, keyed by the
/// member read directly on the parameter. For `person.address.city` the key is
/// `address` and the chain is the whole expression. Receivers and arguments of
/// calls are inspected independently, and a later chain replaces an earlier one
/// under the same key.
///
/// Reading the tracked parameter itself rather than one of its members fails
/// with [`CompileError::UnscopedContext`].
pub fn extract(expr: &Expr, tracked: Tracked<'_>, path: &FieldPath) -> CompileResult<IndexMap<Arc<str>, Dependency>> {
    let mut extractor = Extractor {
        tracked,
        path,
        bound: Vec::new(),
        dependencies: IndexMap::new(),
    };
    extractor.visit(expr)?;
    Ok(extractor.dependencies)
}

struct Extractor<'a> {
    tracked: Tracked<'a>,
    path: &'a FieldPath,
    bound: Vec<ParameterId>,
    dependencies: IndexMap<Arc<str>, Dependency>,
}

impl Extractor<'_> {
    fn is_tracked(&self, parameter: &Parameter) -> bool {
        match self.tracked {
            Tracked::Identity(target) => target == parameter && !self.bound.contains(&parameter.id()),
            Tracked::Type(ty) => parameter.ty() == ty && self.bound.contains(&parameter.id()),
        }
    }

    fn visit(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr.kind() {
            ExprKind::Parameter(parameter) => {
                if self.is_tracked(parameter) {
                    return Err(CompileError::UnscopedContext {
                        path: self.path.clone(),
                        parameter: parameter.name().to_string(),
                    });
                }
                Ok(())
            }
            ExprKind::Constant(_) => Ok(()),
            ExprKind::Member { .. } => {
                let mut direct = expr;
                let mut base = expr;
                while let ExprKind::Member { receiver, .. } = base.kind() {
                    direct = base;
                    base = receiver;
                }
                match (base.as_parameter(), direct.kind()) {
                    (Some(parameter), ExprKind::Member { name, .. }) if self.is_tracked(parameter) => {
                        tracing::trace!(path = %self.path, member = %name, chain = %expr, "extracted dependency");
                        self.dependencies.insert(
                            name.clone(),
                            Dependency {
                                root: parameter.clone(),
                                chain: expr.clone(),
                            },
                        );
                        Ok(())
                    }
                    _ => self.visit(base),
                }
            }
            ExprKind::Call {
                receiver, arguments, ..
            } => {
                self.visit(receiver)?;
                arguments.iter().try_for_each(|argument| self.visit(argument))
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)
            }
            ExprKind::Service { arguments, .. } => arguments.iter().try_for_each(|argument| self.visit(argument)),
            ExprKind::Record { values, .. } => values.iter().try_for_each(|value| self.visit(value)),
            ExprKind::Lambda { parameter, body } => self.visit_bound(parameter, body),
            ExprKind::ProjectEach { source, element, body } | ExprKind::ProjectOne { source, element, body } => {
                self.visit(source)?;
                self.visit_bound(element, body)
            }
            ExprKind::Materialize(inner) => self.visit(inner),
        }
    }

    fn visit_bound(&mut self, parameter: &Parameter, body: &Expr) -> CompileResult<()> {
        self.bound.push(parameter.id());
        let result = self.visit(body);
        self.bound.pop();
        result
    }
}
