use crate::{
    error::{CompileError, CompileResult},
    FieldPath, TypeMatchFallback,
};

use super::{Expr, ExprKind, Parameter, ParameterId, ParameterScope, Ty};

/// Which free parameters a rewrite targets.
#[derive(Debug, Clone, Copy)]
pub enum Replacement<'a> {
    /// Exactly this parameter.
    Identity(&'a Parameter),
    /// Any parameter of this type that is not bound by one of the given scopes.
    TypeMatch { ty: &'a Ty, excluding: &'a ParameterScope },
}

impl Replacement<'_> {
    fn matches(&self, parameter: &Parameter) -> bool {
        match self {
            Replacement::Identity(target) => *target == parameter,
            Replacement::TypeMatch { ty, excluding } => parameter.ty() == *ty && !excluding.contains(&parameter.id()),
        }
    }
}

impl Expr {
    /// Substitutes `target` for every free parameter matching `replacement`.
    /// Occurrences bound by a lambda or a projection inside `self` are left alone.
    pub fn replace(&self, replacement: Replacement<'_>, target: &Expr) -> Expr {
        replace_free(self, &replacement, target, &mut Vec::new())
    }
}

fn replace_free(expr: &Expr, replacement: &Replacement<'_>, target: &Expr, bound: &mut Vec<ParameterId>) -> Expr {
    match expr.kind() {
        ExprKind::Parameter(parameter) => {
            if !bound.contains(&parameter.id()) && replacement.matches(parameter) {
                target.clone()
            } else {
                expr.clone()
            }
        }
        ExprKind::Lambda { parameter, body } => {
            bound.push(parameter.id());
            let body = replace_free(body, replacement, target, bound);
            bound.pop();
            Expr::lambda(parameter.clone(), body)
        }
        ExprKind::ProjectEach { source, element, body } => {
            let source = replace_free(source, replacement, target, bound);
            bound.push(element.id());
            let body = replace_free(body, replacement, target, bound);
            bound.pop();
            Expr::project_each(source, element.clone(), body)
        }
        ExprKind::ProjectOne { source, element, body } => {
            let source = replace_free(source, replacement, target, bound);
            bound.push(element.id());
            let body = replace_free(body, replacement, target, bound);
            bound.pop();
            Expr::project_one(source, element.clone(), body)
        }
        _ => expr.map_children(|child| replace_free(child, replacement, target, bound)),
    }
}

/// Moves compiled expressions from the context they were built against onto a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextReplacer {
    fallback: TypeMatchFallback,
}

impl ContextReplacer {
    pub fn new(fallback: TypeMatchFallback) -> Self {
        ContextReplacer { fallback }
    }

    /// Rebases `expression` from `from` onto `to` by identity. Should parameters of
    /// `from`'s type remain free afterwards without being bound by `scope`, they are
    /// stale references to an old context and get rebased by type, as allowed by the
    /// configured fallback.
    pub fn rebase(
        &self,
        expression: &Expr,
        from: &Parameter,
        to: &Expr,
        scope: &ParameterScope,
        path: &FieldPath,
    ) -> CompileResult<Expr> {
        let rebased = expression.replace(Replacement::Identity(from), to);

        let by_type = Replacement::TypeMatch {
            ty: from.ty(),
            excluding: scope,
        };
        let stale = rebased
            .free_parameters()
            .into_iter()
            .filter(|parameter| by_type.matches(parameter))
            .collect::<Vec<_>>();
        if stale.is_empty() {
            return Ok(rebased);
        }

        match self.fallback {
            TypeMatchFallback::Deny => {
                return Err(CompileError::TypeMatchRejected {
                    path: path.clone(),
                    ty: from.ty().to_string(),
                })
            }
            TypeMatchFallback::Warn => {
                let stale = stale.iter().map(|parameter| parameter.name()).collect::<Vec<_>>();
                tracing::warn!(%path, ty = %from.ty(), ?stale, "rebasing stale context references by type");
            }
            TypeMatchFallback::Allow => {
                tracing::trace!(%path, ty = %from.ty(), "rebasing stale context references by type");
            }
        }

        Ok(rebased.replace(by_type, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> (Parameter, Parameter, Expr) {
        let fragment = Parameter::new("fragment", Ty::object("Person"));
        let stale = Parameter::new("stale", Ty::object("Person"));
        let expr = Expr::binary(
            crate::BinaryOp::Concat,
            fragment.member("name", Ty::STRING),
            stale.member("lastName", Ty::STRING),
        );
        (fragment, stale, expr)
    }

    #[test]
    fn identity_replacement_skips_bound_occurrences() {
        let p = Parameter::new("p", Ty::object("Person"));
        let inner = Expr::lambda(p.clone(), p.member("age", Ty::INT));
        let expr = p
            .member("friends", Ty::list(Ty::object("Person")))
            .call(crate::Method::OrderBy, vec![inner, Expr::constant(false, Ty::BOOLEAN)]);

        let target = Parameter::new("q", Ty::object("Person"));
        insta::assert_snapshot!(
            expr.replace(Replacement::Identity(&p), &target.to_expr()),
            @"q.friends.order_by(|p| p.age, false)"
        );
    }

    #[test]
    fn rebase_by_identity_only() {
        let (fragment, stale, expr) = people();
        let to = Parameter::new("p_Person", Ty::object("Person"));
        let scope = ParameterScope::new().update(stale.id()).update(to.id());

        let rebased = ContextReplacer::new(TypeMatchFallback::Deny)
            .rebase(&expr, &fragment, &to.to_expr(), &scope, &FieldPath::default())
            .unwrap();
        insta::assert_snapshot!(rebased, @"(p_Person.name ++ stale.lastName)");
    }

    #[test]
    fn rebase_falls_back_to_type_matching() {
        let (fragment, _, expr) = people();
        let to = Parameter::new("p_Person", Ty::object("Person"));
        let scope = ParameterScope::new().update(to.id());

        let rebased = ContextReplacer::new(TypeMatchFallback::Allow)
            .rebase(&expr, &fragment, &to.to_expr(), &scope, &FieldPath::default())
            .unwrap();
        insta::assert_snapshot!(rebased, @"(p_Person.name ++ p_Person.lastName)");

        let error = ContextReplacer::new(TypeMatchFallback::Deny)
            .rebase(&expr, &fragment, &to.to_expr(), &scope, &FieldPath::default())
            .unwrap_err();
        assert!(matches!(error, CompileError::TypeMatchRejected { .. }), "{error}");
    }
}
