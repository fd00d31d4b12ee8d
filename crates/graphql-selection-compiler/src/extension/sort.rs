use std::{fmt, sync::Arc};

use crate::{ArgumentDefinition, Expr, Parameter, Replacement, Ty};

use super::{ExtensionError, FieldExtension, HookContext, PreSelection};

type SortKey = dyn Fn(&Expr) -> Expr + Send + Sync;

/// Orders the collection by a key, ascending unless `descending: true` is passed.
#[derive(Clone)]
pub struct SortExtension {
    key: Arc<SortKey>,
}

impl SortExtension {
    pub fn new(key: impl Fn(&Expr) -> Expr + Send + Sync + 'static) -> Self {
        SortExtension { key: Arc::new(key) }
    }
}

impl fmt::Debug for SortExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortExtension").finish_non_exhaustive()
    }
}

impl FieldExtension for SortExtension {
    fn name(&self) -> &str {
        "sort"
    }

    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("descending", Ty::BOOLEAN).with_default(false)]
    }

    fn pre_selection(&self, ctx: &HookContext<'_>, mut input: PreSelection) -> Result<PreSelection, ExtensionError> {
        if ctx.materialized {
            return Ok(input);
        }
        let descending = ctx
            .argument("descending")
            .ok_or_else(|| ExtensionError::new("argument `descending` is not bound"))?;

        let parameter = Parameter::new("sort", input.element.ty().clone());
        let element = input
            .element_context
            .replace(Replacement::Identity(&input.element), &parameter.to_expr());
        let key = (self.key)(&element);

        input.collection = input.collection.order_by(Expr::lambda(parameter, key), descending);
        Ok(input)
    }
}
