//! Reference evaluator for compiled expressions over in-memory values.

mod services;

use std::{cmp::Ordering, sync::Arc};

pub use services::*;

use crate::{BinaryOp, Expr, ExprKind, LazySequence, Method, ParameterId, Value};

/// Values bound to parameters during evaluation.
pub type Environment = im::HashMap<ParameterId, Value>;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Parameter '{name}' is not bound")]
    UnboundParameter { name: String },
    #[error("Cannot read member '{member}' of a {found}")]
    InvalidMember { member: String, found: &'static str },
    #[error("Expected a list, found a {found}")]
    NotAList { found: &'static str },
    #[error("{method} expects {expected}")]
    InvalidArguments { method: Method, expected: &'static str },
    #[error("A lambda can only be passed to a method")]
    UnexpectedLambda,
    #[error("No service method {service}::{method} is registered")]
    UnknownService { service: String, method: String },
    #[error("Service method {service}::{method} failed: {message}")]
    Service {
        service: String,
        method: String,
        message: String,
    },
}

#[derive(Clone)]
pub struct Evaluator {
    services: Arc<dyn ServiceProvider>,
}

impl Evaluator {
    pub fn new(services: Arc<dyn ServiceProvider>) -> Self {
        Evaluator { services }
    }

    pub fn evaluate(&self, expr: &Expr, env: &Environment) -> Result<Value, EvaluationError> {
        match expr.kind() {
            ExprKind::Parameter(parameter) => {
                env.get(&parameter.id())
                    .cloned()
                    .ok_or_else(|| EvaluationError::UnboundParameter {
                        name: parameter.name().to_string(),
                    })
            }
            ExprKind::Constant(value) => Ok(value.clone()),
            ExprKind::Member { receiver, name } => match self.evaluate(receiver, env)? {
                Value::Null => Ok(Value::Null),
                Value::Object(object) => Ok(object.get(name.as_ref()).cloned().unwrap_or_default()),
                other => Err(EvaluationError::InvalidMember {
                    member: name.to_string(),
                    found: other.kind(),
                }),
            },
            ExprKind::Call {
                method,
                receiver,
                arguments,
            } => self.call(*method, receiver, arguments, env),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, env),
            ExprKind::Service {
                service,
                method,
                arguments,
            } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate(argument, env))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!(%service, %method, "calling service");
                self.services.call(service, method, &arguments)
            }
            ExprKind::Lambda { .. } => Err(EvaluationError::UnexpectedLambda),
            ExprKind::Record { shape, values } => Ok(Value::object(
                shape
                    .fields()
                    .zip(values)
                    .map(|((name, _), value)| -> Result<(Arc<str>, Value), EvaluationError> {
                        Ok((name.clone(), self.evaluate(value, env)?))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            ExprKind::ProjectEach { source, element, body } => {
                let source = self.evaluate(source, env)?;
                match source {
                    Value::Null => Ok(Value::Null),
                    Value::Object(object) => Ok(Value::object(
                        object
                            .iter()
                            .map(|(key, value)| -> Result<(Arc<str>, Value), EvaluationError> {
                                let env = env.update(element.id(), value.clone());
                                Ok((key.clone(), self.evaluate(body, &env)?))
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                    )),
                    source => {
                        let evaluator = self.clone();
                        let env = env.clone();
                        let element = element.id();
                        let body = body.clone();
                        Ok(Value::Lazy(LazySequence::new(move || {
                            source
                                .elements()?
                                .into_iter()
                                .map(|item| evaluator.evaluate(&body, &env.update(element, item)))
                                .collect()
                        })))
                    }
                }
            }
            ExprKind::ProjectOne { source, element, body } => match self.evaluate(source, env)? {
                Value::Null => Ok(Value::Null),
                value => self.evaluate(body, &env.update(element.id(), value)),
            },
            ExprKind::Materialize(inner) => match self.evaluate(inner, env)? {
                Value::Lazy(sequence) => Ok(Value::List(sequence.iterate()?.into())),
                other => Ok(other),
            },
        }
    }

    fn apply(&self, lambda: &Expr, value: Value, env: &Environment) -> Result<Value, EvaluationError> {
        match lambda.kind() {
            ExprKind::Lambda { parameter, body } => self.evaluate(body, &env.update(parameter.id(), value)),
            _ => self.evaluate(lambda, env),
        }
    }

    fn call(&self, method: Method, receiver: &Expr, arguments: &[Expr], env: &Environment) -> Result<Value, EvaluationError> {
        let receiver = self.evaluate(receiver, env)?;
        if receiver.is_null() {
            return Ok(Value::Null);
        }
        let items = receiver.elements()?;
        let argument = |index: usize, expected: &'static str| {
            arguments
                .get(index)
                .ok_or(EvaluationError::InvalidArguments { method, expected })
        };

        let items = match method {
            Method::Filter => {
                let predicate = argument(0, "a predicate")?;
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if self.apply(predicate, item.clone(), env)?.as_bool() == Some(true) {
                        kept.push(item);
                    }
                }
                kept
            }
            Method::OrderBy => {
                let key = argument(0, "a sort key")?;
                let descending = self.evaluate(argument(1, "a direction")?, env)?.as_bool() == Some(true);
                let mut keyed = items
                    .into_iter()
                    .map(|item| -> Result<(Value, Value), EvaluationError> {
                        Ok((self.apply(key, item.clone(), env)?, item))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.sort_by(|(a, _), (b, _)| {
                    let ordering = a.compare(b);
                    if descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                keyed.into_iter().map(|(_, item)| item).collect()
            }
            Method::Skip | Method::Take => {
                let count = self.evaluate(argument(0, "a count")?, env)?;
                let Some(count) = count.as_i64() else {
                    return Ok(Value::list(items));
                };
                let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
                if method == Method::Skip {
                    items.into_iter().skip(count).collect()
                } else {
                    items.into_iter().take(count).collect()
                }
            }
            Method::Count => return Ok(Value::Int(items.len() as i64)),
            Method::First => return Ok(items.into_iter().next().unwrap_or_default()),
            Method::Enumerate => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| Value::object([("index", Value::Int(index as i64)), ("item", item)]))
                .collect(),
        };
        Ok(Value::list(items))
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, env: &Environment) -> Result<Value, EvaluationError> {
        let left = self.evaluate(left, env)?;
        match op {
            BinaryOp::And if left.as_bool() != Some(true) => return Ok(Value::Boolean(false)),
            BinaryOp::Or if left.as_bool() == Some(true) => return Ok(Value::Boolean(true)),
            BinaryOp::Coalesce if !left.is_null() => return Ok(left),
            _ => {}
        }
        let right = self.evaluate(right, env)?;

        let ordered = |accept: fn(Ordering) -> bool| {
            if left.is_null() || right.is_null() {
                Value::Boolean(false)
            } else {
                Value::Boolean(accept(left.compare(&right)))
            }
        };

        Ok(match op {
            BinaryOp::Eq => Value::Boolean(left == right),
            BinaryOp::Ne => Value::Boolean(left != right),
            BinaryOp::Lt => ordered(Ordering::is_lt),
            BinaryOp::Le => ordered(Ordering::is_le),
            BinaryOp::Gt => ordered(Ordering::is_gt),
            BinaryOp::Ge => ordered(Ordering::is_ge),
            BinaryOp::And | BinaryOp::Or => Value::Boolean(right.as_bool() == Some(true)),
            BinaryOp::Concat => Value::from(format!("{}{}", plain(&left), plain(&right))),
            BinaryOp::Coalesce => right.clone(),
        })
    }
}

/// Strings without quotes, null as nothing.
fn plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}
