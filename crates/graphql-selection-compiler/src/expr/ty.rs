use std::{collections::HashSet, fmt, sync::Arc};

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ScalarType {
    Boolean,
    Int,
    Float,
    String,
    #[strum(serialize = "ID")]
    Id,
}

/// Static type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Null,
    Scalar(ScalarType),
    /// A schema object type, referenced by name.
    Object(Arc<str>),
    /// An anonymous record produced by a projection.
    Record(Arc<RecordShape>),
    List(Box<Ty>),
    /// A string-keyed dictionary. Projections over dictionaries are never forced.
    Map(Box<Ty>),
    Function(Box<Ty>),
}

impl Ty {
    pub const BOOLEAN: Ty = Ty::Scalar(ScalarType::Boolean);
    pub const INT: Ty = Ty::Scalar(ScalarType::Int);
    pub const FLOAT: Ty = Ty::Scalar(ScalarType::Float);
    pub const STRING: Ty = Ty::Scalar(ScalarType::String);
    pub const ID: Ty = Ty::Scalar(ScalarType::Id);

    pub fn object(name: impl Into<Arc<str>>) -> Ty {
        Ty::Object(name.into())
    }

    pub fn list(inner: Ty) -> Ty {
        Ty::List(Box::new(inner))
    }

    pub fn map(values: Ty) -> Ty {
        Ty::Map(Box::new(values))
    }

    /// Element type of a list, value type of a map.
    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::List(inner) | Ty::Map(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Ty::Map(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Ty::Object(_) | Ty::Record(_))
    }

    pub fn record_shape(&self) -> Option<&RecordShape> {
        match self {
            Ty::Record(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn object_name(&self) -> Option<&str> {
        match self {
            Ty::Object(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Null => f.write_str("Null"),
            Ty::Scalar(scalar) => write!(f, "{scalar}"),
            Ty::Object(name) => f.write_str(name),
            Ty::Record(shape) => write!(f, "{shape}"),
            Ty::List(inner) => write!(f, "[{inner}]"),
            Ty::Map(inner) => write!(f, "Map<{inner}>"),
            Ty::Function(output) => write!(f, "Fn -> {output}"),
        }
    }
}

/// Ordered fields of an anonymous record. Member lookups ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordShape {
    fields: Vec<(Arc<str>, Ty)>,
}

impl RecordShape {
    pub fn new(fields: impl IntoIterator<Item = (Arc<str>, Ty)>) -> Self {
        RecordShape {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = (&Arc<str>, &Ty)> + '_ {
        self.fields.iter().map(|(name, ty)| (name, ty))
    }

    pub fn field(&self, name: &str) -> Option<(&Arc<str>, &Ty)> {
        self.fields()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.fields.iter().format_with(", ", |(name, ty), f| f(&format_args!("{name}: {ty}")))
        )
    }
}

/// Interns record shapes so that identical projections share one shape.
#[derive(Debug, Default)]
pub struct ShapeCache {
    shapes: HashSet<Arc<RecordShape>>,
}

impl ShapeCache {
    pub fn intern(&mut self, shape: RecordShape) -> Arc<RecordShape> {
        if let Some(existing) = self.shapes.get(&shape) {
            return existing.clone();
        }
        let shape = Arc::new(shape);
        self.shapes.insert(shape.clone());
        shape
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
