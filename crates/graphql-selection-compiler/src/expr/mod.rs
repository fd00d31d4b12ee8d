//! Expression tree produced by the compiler and consumed by the evaluator.
//!
//! Expressions are immutable and cheap to clone. Rewrites always build new
//! trees, so a field's resolve template can be reused across requests.

mod display;
mod replace;
mod ty;

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use indexmap::IndexSet;

pub use replace::*;
pub use ty::*;

use crate::Value;

/// Set of parameters bound by the enclosing scopes.
pub type ParameterScope = im::HashSet<ParameterId>;

static NEXT_PARAMETER_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterId(u32);

/// A typed placeholder. Two parameters are the same parameter only if they
/// come from the same [`Parameter::new`] call, whatever their name and type.
#[derive(Debug, Clone)]
pub struct Parameter(Arc<ParameterRecord>);

#[derive(Debug)]
struct ParameterRecord {
    id: ParameterId,
    name: Arc<str>,
    ty: Ty,
}

impl Parameter {
    pub fn new(name: impl Into<Arc<str>>, ty: Ty) -> Self {
        let id = ParameterId(NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed));
        Parameter(Arc::new(ParameterRecord {
            id,
            name: name.into(),
            ty,
        }))
    }

    pub fn id(&self) -> ParameterId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn to_expr(&self) -> Expr {
        Expr::parameter(self.clone())
    }

    pub fn member(&self, name: impl Into<Arc<str>>, ty: Ty) -> Expr {
        self.to_expr().member(name, ty)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Parameter {}

impl std::hash::Hash for Parameter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Method {
    /// `filter(|x| predicate)`
    Filter,
    /// `order_by(|x| key, descending)`
    OrderBy,
    Skip,
    Take,
    Count,
    First,
    /// Pairs each element with its position as `{index, item}` records.
    Enumerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BinaryOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "++")]
    Concat,
    #[strum(serialize = "??")]
    Coalesce,
}

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

struct ExprNode {
    kind: ExprKind,
    ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Parameter(Parameter),
    Constant(Value),
    Member {
        receiver: Expr,
        name: Arc<str>,
    },
    Call {
        method: Method,
        receiver: Expr,
        arguments: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    /// Invocation of an external service, only available in the full pass.
    Service {
        service: Arc<str>,
        method: Arc<str>,
        arguments: Vec<Expr>,
    },
    Lambda {
        parameter: Parameter,
        body: Expr,
    },
    Record {
        shape: Arc<RecordShape>,
        values: Vec<Expr>,
    },
    /// Maps `body` over every element of `source`, producing a lazy list.
    ProjectEach {
        source: Expr,
        element: Parameter,
        body: Expr,
    },
    /// Evaluates `body` with `element` bound to `source`, or null if `source` is null.
    ProjectOne {
        source: Expr,
        element: Parameter,
        body: Expr,
    },
    /// Forces a lazy list.
    Materialize(Expr),
}

impl Expr {
    fn new(kind: ExprKind, ty: Ty) -> Self {
        Expr(Arc::new(ExprNode { kind, ty }))
    }

    pub fn parameter(parameter: Parameter) -> Self {
        let ty = parameter.ty().clone();
        Expr::new(ExprKind::Parameter(parameter), ty)
    }

    pub fn constant(value: impl Into<Value>, ty: Ty) -> Self {
        Expr::new(ExprKind::Constant(value.into()), ty)
    }

    pub fn member(self, name: impl Into<Arc<str>>, ty: Ty) -> Self {
        Expr::new(
            ExprKind::Member {
                receiver: self,
                name: name.into(),
            },
            ty,
        )
    }

    /// Reads a member of a record-typed expression, using the record's own spelling.
    pub fn record_member(&self, name: &str) -> Option<Expr> {
        let (name, ty) = self.ty().record_shape()?.field(name)?;
        Some(self.clone().member(name.clone(), ty.clone()))
    }

    pub fn call(self, method: Method, arguments: Vec<Expr>) -> Self {
        let ty = match method {
            Method::Filter | Method::OrderBy | Method::Skip | Method::Take => self.ty().clone(),
            Method::Count => Ty::INT,
            Method::First => self.ty().element().cloned().unwrap_or(Ty::Null),
            Method::Enumerate => Ty::list(Ty::Record(Arc::new(enumerate_shape(
                self.ty().element().cloned().unwrap_or(Ty::Null),
            )))),
        };
        Expr::new(
            ExprKind::Call {
                method,
                receiver: self,
                arguments,
            },
            ty,
        )
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.call(Method::Filter, vec![predicate])
    }

    pub fn order_by(self, key: Expr, descending: Expr) -> Self {
        self.call(Method::OrderBy, vec![key, descending])
    }

    pub fn skip(self, count: Expr) -> Self {
        self.call(Method::Skip, vec![count])
    }

    pub fn take(self, count: Expr) -> Self {
        self.call(Method::Take, vec![count])
    }

    pub fn count(self) -> Self {
        self.call(Method::Count, Vec::new())
    }

    pub fn first(self) -> Self {
        self.call(Method::First, Vec::new())
    }

    pub fn enumerate(self) -> Self {
        self.call(Method::Enumerate, Vec::new())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let ty = match op {
            BinaryOp::Concat => Ty::STRING,
            BinaryOp::Coalesce => left.ty().clone(),
            _ => Ty::BOOLEAN,
        };
        Expr::new(ExprKind::Binary { op, left, right }, ty)
    }

    pub fn service(
        service: impl Into<Arc<str>>,
        method: impl Into<Arc<str>>,
        arguments: Vec<Expr>,
        ty: Ty,
    ) -> Self {
        Expr::new(
            ExprKind::Service {
                service: service.into(),
                method: method.into(),
                arguments,
            },
            ty,
        )
    }

    pub fn lambda(parameter: Parameter, body: Expr) -> Self {
        let ty = Ty::Function(Box::new(body.ty().clone()));
        Expr::new(ExprKind::Lambda { parameter, body }, ty)
    }

    pub fn record(shape: Arc<RecordShape>, values: Vec<Expr>) -> Self {
        let ty = Ty::Record(shape.clone());
        Expr::new(ExprKind::Record { shape, values }, ty)
    }

    pub fn project_each(source: Expr, element: Parameter, body: Expr) -> Self {
        let ty = if source.ty().is_map() {
            Ty::map(body.ty().clone())
        } else {
            Ty::list(body.ty().clone())
        };
        Expr::new(ExprKind::ProjectEach { source, element, body }, ty)
    }

    pub fn project_one(source: Expr, element: Parameter, body: Expr) -> Self {
        let ty = body.ty().clone();
        Expr::new(ExprKind::ProjectOne { source, element, body }, ty)
    }

    pub fn materialize(self) -> Self {
        let ty = self.ty().clone();
        Expr::new(ExprKind::Materialize(self), ty)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self.kind() {
            ExprKind::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    /// Parameters referenced outside of any binder that introduces them, in order of appearance.
    pub fn free_parameters(&self) -> IndexSet<Parameter> {
        let mut free = IndexSet::new();
        collect_free_parameters(self, &mut Vec::new(), &mut free);
        free
    }

    pub fn references(&self, parameter: &Parameter) -> bool {
        self.free_parameters().contains(parameter)
    }

    /// Rebuilds this node with `f` applied to each direct child.
    /// Binders are passed through unchanged.
    pub(crate) fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        match self.kind() {
            ExprKind::Parameter(_) | ExprKind::Constant(_) => self.clone(),
            ExprKind::Member { receiver, name } => f(receiver).member(name.clone(), self.ty().clone()),
            ExprKind::Call {
                method,
                receiver,
                arguments,
            } => {
                let receiver = f(receiver);
                let arguments = arguments.iter().map(&mut f).collect();
                receiver.call(*method, arguments)
            }
            ExprKind::Binary { op, left, right } => {
                let left = f(left);
                Expr::binary(*op, left, f(right))
            }
            ExprKind::Service {
                service,
                method,
                arguments,
            } => Expr::service(
                service.clone(),
                method.clone(),
                arguments.iter().map(f).collect(),
                self.ty().clone(),
            ),
            ExprKind::Lambda { parameter, body } => Expr::lambda(parameter.clone(), f(body)),
            ExprKind::Record { shape, values } => Expr::record(shape.clone(), values.iter().map(f).collect()),
            ExprKind::ProjectEach { source, element, body } => {
                let source = f(source);
                Expr::project_each(source, element.clone(), f(body))
            }
            ExprKind::ProjectOne { source, element, body } => {
                let source = f(source);
                Expr::project_one(source, element.clone(), f(body))
            }
            ExprKind::Materialize(inner) => f(inner).materialize(),
        }
    }

    /// Replaces every subexpression structurally equal to `target` with `replacement`.
    pub fn substitute(&self, target: &Expr, replacement: &Expr) -> Expr {
        if self == target {
            return replacement.clone();
        }
        self.map_children(|child| child.substitute(target, replacement))
    }
}

/// Shape of the records produced by [`Method::Enumerate`].
pub fn enumerate_shape(item: Ty) -> RecordShape {
    RecordShape::new([("index".into(), Ty::INT), ("item".into(), item)])
}

fn collect_free_parameters(expr: &Expr, bound: &mut Vec<ParameterId>, free: &mut IndexSet<Parameter>) {
    match expr.kind() {
        ExprKind::Parameter(parameter) => {
            if !bound.contains(&parameter.id()) {
                free.insert(parameter.clone());
            }
        }
        ExprKind::Lambda { parameter, body } => {
            bound.push(parameter.id());
            collect_free_parameters(body, bound, free);
            bound.pop();
        }
        ExprKind::ProjectEach { source, element, body } | ExprKind::ProjectOne { source, element, body } => {
            collect_free_parameters(source, bound, free);
            bound.push(element.id());
            collect_free_parameters(body, bound, free);
            bound.pop();
        }
        _ => {
            expr.map_children(|child| {
                collect_free_parameters(child, bound, free);
                child.clone()
            });
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.ty() == other.ty() && self.kind() == other.kind())
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expr({self})")
    }
}
