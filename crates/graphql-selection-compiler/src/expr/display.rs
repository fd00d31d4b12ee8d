use std::fmt;

use itertools::Itertools;

use super::{Expr, ExprKind};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Parameter(parameter) => f.write_str(parameter.name()),
            ExprKind::Constant(value) => write!(f, "{value}"),
            ExprKind::Member { receiver, name } => write!(f, "{receiver}.{name}"),
            ExprKind::Call {
                method,
                receiver,
                arguments,
            } => write!(f, "{receiver}.{method}({})", arguments.iter().join(", ")),
            ExprKind::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Service {
                service,
                method,
                arguments,
            } => write!(f, "{service}::{method}({})", arguments.iter().join(", ")),
            ExprKind::Lambda { parameter, body } => write!(f, "|{}| {body}", parameter.name()),
            ExprKind::Record { shape, values } => write!(
                f,
                "{{{}}}",
                shape
                    .fields()
                    .zip(values)
                    .format_with(", ", |((name, _), value), f| f(&format_args!("{name}: {value}")))
            ),
            ExprKind::ProjectEach { source, element, body } => {
                write!(f, "{source}.map(|{}| {body})", element.name())
            }
            ExprKind::ProjectOne { source, element, body } => {
                write!(f, "{source}.then(|{}| {body})", element.name())
            }
            ExprKind::Materialize(inner) => write!(f, "{inner}.to_list()"),
        }
    }
}
