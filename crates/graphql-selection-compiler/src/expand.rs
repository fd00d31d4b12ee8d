use std::sync::Arc;

use crate::{
    compile::VariableValues,
    error::{CompileError, CompileResult},
    Directive, FieldPath, FieldSelection, Parameter, QueryDocument, Selection, Ty, Value,
};

/// Where an expanded field came from.
#[derive(Debug, Clone)]
pub enum Origin {
    /// Written directly in the selection set.
    Direct,
    /// Brought in by a named fragment spread. Its fields are compiled against
    /// `parameter`, a context of the fragment's type condition, then rebased onto
    /// the spread site.
    Fragment { name: Arc<str>, parameter: Parameter },
}

#[derive(Debug, Clone)]
pub struct ExpandedField<'a> {
    pub field: &'a FieldSelection,
    pub origin: Origin,
    /// Fragments being expanded around this field, outermost first.
    pub fragments: im::Vector<Arc<str>>,
}

/// Flattens a selection set into its fields, expanding fragment spreads and inline
/// fragments and dropping anything excluded by `@skip` or `@include`. Other
/// directives are ignored.
pub(crate) struct FragmentExpander<'a> {
    document: &'a QueryDocument,
    variables: VariableValues<'a>,
}

impl<'a> FragmentExpander<'a> {
    pub(crate) fn new(document: &'a QueryDocument, variables: VariableValues<'a>) -> Self {
        FragmentExpander { document, variables }
    }

    /// `active` holds the fragments already being expanded by enclosing fields, so
    /// that a fragment reaching itself through a nested field is caught as well.
    pub(crate) fn expand(
        &self,
        selection_set: &'a [Selection],
        active: &im::Vector<Arc<str>>,
        path: &FieldPath,
    ) -> CompileResult<Vec<ExpandedField<'a>>> {
        let mut fields = Vec::new();
        self.expand_into(selection_set, &Origin::Direct, active, path, &mut fields)?;
        Ok(fields)
    }

    fn expand_into(
        &self,
        selection_set: &'a [Selection],
        origin: &Origin,
        active: &im::Vector<Arc<str>>,
        path: &FieldPath,
        fields: &mut Vec<ExpandedField<'a>>,
    ) -> CompileResult<()> {
        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    if self.is_included(&field.directives, &path.child(&field.response_key))? {
                        fields.push(ExpandedField {
                            field,
                            origin: origin.clone(),
                            fragments: active.clone(),
                        });
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if self.is_included(&fragment.directives, path)? {
                        self.expand_into(&fragment.selection_set, origin, active, path, fields)?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.is_included(&spread.directives, path)? {
                        continue;
                    }
                    let name = &spread.fragment_name;
                    let fragment = self
                        .document
                        .fragments
                        .get(name)
                        .ok_or_else(|| CompileError::UnknownFragment {
                            path: path.clone(),
                            name: name.to_string(),
                        })?;

                    if active.contains(name) {
                        let cycle = active
                            .iter()
                            .skip_while(|ancestor| *ancestor != name)
                            .chain(std::iter::once(name))
                            .map(|name| name.to_string())
                            .collect();
                        return Err(CompileError::CircularFragment {
                            path: path.clone(),
                            name: name.to_string(),
                            cycle,
                        });
                    }

                    // Nested spreads keep the outermost fragment's context.
                    let origin = match origin {
                        Origin::Direct => Origin::Fragment {
                            name: name.clone(),
                            parameter: Parameter::new(
                                format!("fragment_{name}"),
                                Ty::Object(fragment.type_condition.clone()),
                            ),
                        },
                        fragment @ Origin::Fragment { .. } => fragment.clone(),
                    };

                    tracing::trace!(%path, fragment = %name, "expanding fragment");
                    let mut active = active.clone();
                    active.push_back(name.clone());
                    self.expand_into(&fragment.selection_set, &origin, &active, path, fields)?;
                }
            }
        }
        Ok(())
    }

    fn is_included(&self, directives: &[Directive], path: &FieldPath) -> CompileResult<bool> {
        for directive in directives {
            let skip_when = match directive.name.as_ref() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };
            let condition = directive
                .arguments
                .get("if")
                .map(|value| self.variables.resolve(value, path))
                .transpose()?;
            match condition {
                Some(Value::Boolean(condition)) if condition == skip_when => return Ok(false),
                Some(Value::Boolean(_)) => {}
                _ => {
                    return Err(CompileError::InvalidDirectiveArgument {
                        path: path.clone(),
                        directive: directive.name.to_string(),
                    })
                }
            }
        }
        Ok(true)
    }
}
