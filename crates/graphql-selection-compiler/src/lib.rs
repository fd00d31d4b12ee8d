//! Compiles GraphQL selections bound to a schema into projection expressions.
//!
//! Every schema field is defined by an expression template over its type's
//! context parameter. [`SelectionCompiler`] composes those templates along a
//! selection tree into a single expression that fetches and shapes exactly the
//! requested fields. Fields backed by an external service are split out: a data
//! pass fetches the members they read, and a full pass computes them over the
//! fetched records. [`QueryExecutor`] drives both passes with the reference
//! [`Evaluator`].

mod compile;
mod config;
mod constants;
mod error;
mod eval;
mod execute;
mod expand;
mod expr;
mod extension;
mod extract;
mod path;
mod schema;
mod selection;
mod value;

#[cfg(test)]
mod tests;

pub use compile::{CompileMode, Compiled, CompiledField, RootField, RootSource, SelectionCompiler, SelectionMap};
pub use config::*;
pub use constants::ConstantParameters;
pub use error::{CompileError, CompileResult, ErrorKind};
pub use eval::*;
pub use execute::*;
pub use expand::{ExpandedField, Origin};
pub(crate) use expand::FragmentExpander;
pub use expr::*;
pub use extension::*;
pub use extract::{extract, Dependency, Tracked};
pub use path::FieldPath;
pub use schema::*;
pub use selection::*;
pub use value::{LazySequence, Object, Value};
