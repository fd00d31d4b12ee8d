//! Hooks attached to list fields that can rewrite the collection before its
//! elements are selected and the selection after it has been compiled.

mod filter;
mod paging;
mod position;
mod sort;

use std::{borrow::Cow, fmt};

pub use filter::FilterExtension;
pub use paging::OffsetPagingExtension;
pub use position::PositionExtension;
pub use sort::SortExtension;

use crate::{ArgumentDefinition, CompileMode, Expr, FieldPath, Parameter, SelectionMap, Value};

/// Pre-selection hooks run in declaration order, post-selection hooks in reverse.
///
/// When `HookContext::materialized` is set, the collection has already been shaped
/// by the hooks during the data pass and the element is a fetched record. Hooks
/// must not apply their rewrite a second time.
pub trait FieldExtension: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Arguments the extension reads, added to the field's own.
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    fn pre_selection(&self, ctx: &HookContext<'_>, input: PreSelection) -> Result<PreSelection, ExtensionError> {
        let _ = ctx;
        Ok(input)
    }

    fn post_selection(&self, ctx: &HookContext<'_>, input: PostSelection) -> Result<PostSelection, ExtensionError> {
        let _ = ctx;
        Ok(input)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub mode: CompileMode,
    pub materialized: bool,
    pub path: &'a FieldPath,
    /// The field's bound arguments parameter, absent over fetched data.
    pub arguments: Option<&'a Parameter>,
    pub argument_values: Option<&'a Value>,
}

impl HookContext<'_> {
    /// Expression reading argument `name` from the bound arguments.
    pub fn argument(&self, name: &str) -> Option<Expr> {
        self.arguments?.to_expr().record_member(name)
    }

    pub fn argument_value(&self, name: &str) -> Option<&Value> {
        self.argument_values?.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct PreSelection {
    pub collection: Expr,
    /// Placeholder the selection is compiled against, one per element.
    pub element: Parameter,
    /// What each field of the selection reads from, in terms of `element`.
    pub element_context: Expr,
}

#[derive(Debug, Clone)]
pub struct PostSelection {
    pub selection: SelectionMap,
    pub element: Parameter,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ExtensionError(Cow<'static, str>);

impl ExtensionError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        ExtensionError(message.into())
    }
}
