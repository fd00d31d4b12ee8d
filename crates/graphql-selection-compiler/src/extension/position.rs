use std::sync::Arc;

use crate::{Parameter, Replacement};

use super::{ExtensionError, FieldExtension, HookContext, PostSelection, PreSelection};

/// Adds the zero-based position of each element to its selection under `key`.
///
/// The collection is swapped for `{index, item}` pairs, so the selection is
/// compiled against a new placeholder and reads from its `item`.
#[derive(Debug, Clone)]
pub struct PositionExtension {
    key: Arc<str>,
}

impl PositionExtension {
    pub fn new(key: &str) -> Self {
        PositionExtension { key: key.into() }
    }
}

impl FieldExtension for PositionExtension {
    fn name(&self) -> &str {
        "position"
    }

    fn pre_selection(&self, ctx: &HookContext<'_>, input: PreSelection) -> Result<PreSelection, ExtensionError> {
        if ctx.materialized {
            return Ok(input);
        }

        let collection = input.collection.enumerate();
        let Some(ty) = collection.ty().element().cloned() else {
            return Err(ExtensionError::new("cannot enumerate a non-list collection"));
        };
        let element = Parameter::new("positioned", ty);
        let Some(item) = element.to_expr().record_member("item") else {
            return Err(ExtensionError::new("enumerated elements have no item"));
        };
        let element_context = input
            .element_context
            .replace(Replacement::Identity(&input.element), &item);

        Ok(PreSelection {
            collection,
            element,
            element_context,
        })
    }

    fn post_selection(&self, ctx: &HookContext<'_>, mut input: PostSelection) -> Result<PostSelection, ExtensionError> {
        // Over fetched data the position is already a member of each record.
        let member = if ctx.materialized { self.key.as_ref() } else { "index" };
        if let Some(position) = input.element.to_expr().record_member(member) {
            input.selection.insert(&self.key, position);
        }
        Ok(input)
    }
}
