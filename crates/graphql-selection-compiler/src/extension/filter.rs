use std::{fmt, sync::Arc};

use crate::{ArgumentDefinition, Expr, Parameter, Replacement};

use super::{ExtensionError, FieldExtension, HookContext, PreSelection};

type Predicate = dyn Fn(&Expr, &Expr) -> Expr + Send + Sync;

/// Keeps the elements for which `predicate(element, argument)` holds, whenever the
/// argument is provided and not null.
#[derive(Clone)]
pub struct FilterExtension {
    argument: ArgumentDefinition,
    predicate: Arc<Predicate>,
}

impl FilterExtension {
    pub fn new(argument: ArgumentDefinition, predicate: impl Fn(&Expr, &Expr) -> Expr + Send + Sync + 'static) -> Self {
        FilterExtension {
            argument,
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for FilterExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterExtension")
            .field("argument", &self.argument.name)
            .finish_non_exhaustive()
    }
}

impl FieldExtension for FilterExtension {
    fn name(&self) -> &str {
        "filter"
    }

    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![self.argument.clone()]
    }

    fn pre_selection(&self, ctx: &HookContext<'_>, mut input: PreSelection) -> Result<PreSelection, ExtensionError> {
        let provided = ctx
            .argument_value(&self.argument.name)
            .is_some_and(|value| !value.is_null());
        if ctx.materialized || !provided {
            return Ok(input);
        }
        let argument = ctx
            .argument(&self.argument.name)
            .ok_or_else(|| ExtensionError::new(format!("argument `{}` is not bound", self.argument.name)))?;

        let parameter = Parameter::new("filter", input.element.ty().clone());
        let element = input
            .element_context
            .replace(Replacement::Identity(&input.element), &parameter.to_expr());
        let predicate = (self.predicate)(&element, &argument);

        input.collection = input.collection.filter(Expr::lambda(parameter, predicate));
        Ok(input)
    }
}
