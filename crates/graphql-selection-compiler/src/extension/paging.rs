use crate::{ArgumentDefinition, Ty};

use super::{ExtensionError, FieldExtension, HookContext, PreSelection};

/// `skip`/`take` paging. `take` defaults to the configured page size and may not
/// exceed the maximum one.
#[derive(Debug, Clone)]
pub struct OffsetPagingExtension {
    default_page_size: Option<i64>,
    max_page_size: Option<i64>,
}

impl OffsetPagingExtension {
    pub fn new(default_page_size: Option<i64>, max_page_size: Option<i64>) -> Self {
        OffsetPagingExtension {
            default_page_size,
            max_page_size,
        }
    }
}

impl FieldExtension for OffsetPagingExtension {
    fn name(&self) -> &str {
        "offset_paging"
    }

    fn arguments(&self) -> Vec<ArgumentDefinition> {
        let take = ArgumentDefinition::new("take", Ty::INT);
        vec![
            ArgumentDefinition::new("skip", Ty::INT).with_default(0),
            match self.default_page_size {
                Some(size) => take.with_default(size),
                None => take,
            },
        ]
    }

    fn pre_selection(&self, ctx: &HookContext<'_>, mut input: PreSelection) -> Result<PreSelection, ExtensionError> {
        if ctx.materialized {
            return Ok(input);
        }

        let take = ctx.argument_value("take").and_then(|value| value.as_i64());
        if let (Some(take), Some(max)) = (take, self.max_page_size) {
            if take > max {
                return Err(ExtensionError::new(format!(
                    "requested page size {take} exceeds the maximum of {max}"
                )));
            }
        }

        let (Some(skip), Some(take)) = (ctx.argument("skip"), ctx.argument("take")) else {
            return Err(ExtensionError::new("paging arguments are not bound"));
        };
        input.collection = input.collection.skip(skip).take(take);
        Ok(input)
    }
}
