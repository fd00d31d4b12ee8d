use std::{cmp::Ordering, fmt, sync::Arc};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::EvaluationError;

pub type Object = IndexMap<Arc<str>, Value>;

/// A runtime value produced by evaluating an expression.
///
/// Lists produced by a projection at the operation root stay lazy: each
/// iteration recomputes the elements from the captured source. Anything
/// nested below has been forced into a [`Value::List`].
#[derive(Debug, Clone, Default, strum::IntoStaticStr)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<[Value]>),
    Object(Arc<Object>),
    Lazy(LazySequence),
}

type Producer = dyn Fn() -> Result<Vec<Value>, EvaluationError> + Send + Sync;

/// Elements computed from a captured source, again on every iteration.
#[derive(Clone)]
pub struct LazySequence(Arc<Producer>);

impl LazySequence {
    pub fn new(producer: impl Fn() -> Result<Vec<Value>, EvaluationError> + Send + Sync + 'static) -> Self {
        LazySequence(Arc::new(producer))
    }

    pub fn iterate(&self) -> Result<Vec<Value>, EvaluationError> {
        (self.0)()
    }
}

impl fmt::Debug for LazySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazySequence")
    }
}

impl Value {
    pub fn object<K: Into<Arc<str>>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(Arc::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(object) => object.get(key),
            _ => None,
        }
    }

    /// Elements of a list, iterating lazy sequences.
    pub fn elements(&self) -> Result<Vec<Value>, EvaluationError> {
        match self {
            Value::List(items) => Ok(items.to_vec()),
            Value::Lazy(sequence) => sequence.iterate(),
            other => Err(EvaluationError::NotAList { found: other.kind() }),
        }
    }

    /// Forces every lazy sequence, however deeply nested.
    pub fn materialize(&self) -> Result<Value, EvaluationError> {
        match self {
            Value::Lazy(sequence) => Ok(Value::List(
                sequence
                    .iterate()?
                    .iter()
                    .map(Value::materialize)
                    .collect::<Result<Vec<_>, _>>()?
                    .into(),
            )),
            Value::List(items) => Ok(Value::List(
                items.iter().map(Value::materialize).collect::<Result<Vec<_>, _>>()?.into(),
            )),
            Value::Object(object) => Ok(Value::Object(Arc::new(
                object
                    .iter()
                    .map(|(k, v)| -> Result<(Arc<str>, Value), EvaluationError> { Ok((k.clone(), v.materialize()?)) })
                    .collect::<Result<Object, _>>()?,
            ))),
            other => Ok(other.clone()),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, EvaluationError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect::<Result<_, _>>()?),
            Value::Lazy(sequence) => {
                serde_json::Value::Array(sequence.iterate()?.iter().map(Value::to_json).collect::<Result<_, _>>()?)
            }
            Value::Object(object) => serde_json::Value::Object(
                object
                    .iter()
                    .map(|(k, v)| -> Result<(String, serde_json::Value), EvaluationError> {
                        Ok((k.to_string(), v.to_json()?))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Total order used for sorting. Values of different kinds order by kind,
    /// lists and objects never order against each other.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) | Value::Lazy(_) => 4,
            Value::Object(_) => 5,
        }
    }
}

/// Lazy sequences never compare equal, not even to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Object(object) => write!(f, "{{{}}}", object.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")),
            Value::Lazy(_) => f.write_str("<lazy>"),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items.iter()),
            Value::Object(object) => serializer.collect_map(object.iter().map(|(k, v)| (k.as_ref(), v))),
            Value::Lazy(sequence) => {
                let items = sequence.iterate().map_err(serde::ser::Error::custom)?;
                serializer.collect_seq(items.iter())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(object) => Value::object(object.into_iter().map(|(k, v)| (k, Value::from(v)))),
        }
    }
}
