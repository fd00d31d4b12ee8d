//! Turns bound field selections into projection expressions.
//!
//! A query is compiled in up to two passes. The data pass leaves out every field
//! that needs a service and fetches, in their place, the members those fields
//! read. The full pass then runs over the materialized result of the data pass,
//! reading plain fields back from the fetched records and evaluating service
//! fields against them.

mod arguments;
mod selection_map;

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;

pub(crate) use arguments::VariableValues;
pub use selection_map::*;

use crate::{
    error::{CompileError, CompileResult},
    extract::{extract, Tracked},
    CompilerConfig, ConstantParameters, ContextReplacer, ExpandedField, Expr, FieldDefinition, FieldPath, FieldSelection,
    FieldShape, FragmentExpander, HookContext, Origin, Parameter, ParameterScope, PostSelection, PreSelection,
    QueryDocument, RecordShape, Replacement, Schema, ShapeCache, Ty, Value, Variables,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CompileMode {
    /// Leaves out service-backed fields, fetching what they depend on instead.
    DataOnly,
    Full,
}

#[derive(Debug, Clone)]
pub struct Compiled {
    pub expression: Expr,
    pub constants: ConstantParameters,
    /// Whether the data pass left out service-backed fields that still need a full pass.
    pub deferred_services: bool,
}

/// What a root field is compiled against.
#[derive(Debug, Clone)]
pub enum RootSource {
    /// The schema's root context.
    Schema,
    /// The materialized result of the data pass for this root field.
    Materialized(Parameter),
}

/// A root field of the operation after fragment expansion and merging.
#[derive(Debug, Clone)]
pub struct RootField<'a> {
    pub response_key: Arc<str>,
    pub field: ExpandedField<'a>,
}

#[derive(Debug, Clone)]
struct Scope {
    mode: CompileMode,
    /// Whether the context may be a record of fetched data.
    context_changed: bool,
    is_root: bool,
    path: FieldPath,
    parameters: ParameterScope,
    fragments: im::Vector<Arc<str>>,
    depth: usize,
}

impl Scope {
    fn field(&self, item: &ExpandedField<'_>) -> Scope {
        Scope {
            is_root: false,
            path: self.path.child(&item.field.response_key),
            fragments: item.fragments.clone(),
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    fn bind(&self, parameter: &Parameter) -> Scope {
        Scope {
            parameters: self.parameters.update(parameter.id()),
            ..self.clone()
        }
    }
}

struct Resolved {
    expression: Expr,
    /// Read back from a fetched record rather than built from the field's template.
    materialized: bool,
    arguments: Option<(Parameter, Value)>,
}

#[derive(Default)]
struct CompiledSelection {
    fields: SelectionMap,
    constants: ConstantParameters,
    deferred_services: bool,
}

pub struct SelectionCompiler<'a> {
    schema: &'a Schema,
    document: &'a QueryDocument,
    variables: VariableValues<'a>,
    config: &'a CompilerConfig,
    replacer: ContextReplacer,
    shapes: ShapeCache,
    /// Record keys the data pass fetched each service field's dependencies under.
    fetched: HashMap<FieldPath, IndexMap<Arc<str>, Arc<str>>>,
}

impl<'a> SelectionCompiler<'a> {
    pub fn new(
        schema: &'a Schema,
        document: &'a QueryDocument,
        variables: &'a Variables,
        config: &'a CompilerConfig,
    ) -> Self {
        SelectionCompiler {
            schema,
            document,
            variables: VariableValues::new(document, variables),
            config,
            replacer: ContextReplacer::new(config.type_match_fallback),
            shapes: ShapeCache::default(),
            fetched: HashMap::new(),
        }
    }

    /// Root fields of the operation. Fields sharing a response key are merged, the
    /// last selection winning at the position of the first.
    pub fn root_fields(&self) -> CompileResult<Vec<RootField<'a>>> {
        let expanded = self
            .expander()
            .expand(&self.document.selection_set, &im::Vector::new(), &FieldPath::default())?;

        let mut fields = IndexMap::<String, RootField<'a>>::new();
        for field in expanded {
            let response_key = field.field.response_key.clone();
            fields
                .entry(response_key.to_ascii_lowercase())
                .and_modify(|root| root.field = field.clone())
                .or_insert(RootField { response_key, field });
        }
        Ok(fields.into_values().collect())
    }

    pub fn compile_root_field(
        &mut self,
        root: &RootField<'a>,
        mode: CompileMode,
        source: &RootSource,
    ) -> CompileResult<Option<Compiled>> {
        let context = self.schema.context().clone();
        let scope = Scope {
            mode,
            context_changed: false,
            is_root: true,
            path: FieldPath::root(&root.response_key),
            parameters: ParameterScope::unit(context.id()),
            fragments: root.field.fragments.clone(),
            depth: 1,
        };

        let compiled = match source {
            RootSource::Schema => self.compile_expanded(&root.field, &context.to_expr(), &scope)?,
            RootSource::Materialized(data) => {
                let scope = Scope {
                    context_changed: true,
                    ..scope.bind(data)
                };
                let resolved = Resolved {
                    expression: data.to_expr(),
                    materialized: true,
                    arguments: None,
                };
                Some(self.compile_resolved(root.field.field, resolved, &scope)?)
            }
        };

        if let Some(compiled) = &compiled {
            tracing::debug!(
                path = %scope.path,
                %mode,
                deferred_services = compiled.deferred_services,
                expression = %compiled.expression,
                "compiled root field"
            );
        }
        Ok(compiled)
    }

    /// Compiles a single field selection against `field_context`, an expression
    /// over `root` and any other parameter bound by the caller.
    ///
    /// Returns `None` when the field needs a service and `mode` is
    /// [`CompileMode::DataOnly`]. With `context_changed` set, `field_context` may be
    /// a record of fetched data that the field is read back from.
    pub fn compile(
        &mut self,
        field: &'a FieldSelection,
        field_context: &Expr,
        root: &Parameter,
        mode: CompileMode,
        context_changed: bool,
    ) -> CompileResult<Option<Compiled>> {
        let parameters = field_context
            .free_parameters()
            .iter()
            .map(Parameter::id)
            .chain(std::iter::once(root.id()))
            .collect();
        let scope = Scope {
            mode,
            context_changed,
            is_root: field_context.as_parameter() == Some(root),
            path: FieldPath::root(&field.response_key),
            parameters,
            fragments: im::Vector::new(),
            depth: 1,
        };
        self.compile_field(field, field_context, &scope)
    }

    fn expander(&self) -> FragmentExpander<'a> {
        FragmentExpander::new(self.document, self.variables)
    }

    fn compile_expanded(
        &mut self,
        item: &ExpandedField<'a>,
        context: &Expr,
        scope: &Scope,
    ) -> CompileResult<Option<Compiled>> {
        let Origin::Fragment { parameter, .. } = &item.origin else {
            return self.compile_field(item.field, context, scope);
        };
        // Fetched records carry every member the fragment selected, read them directly.
        if context.ty().record_shape().is_some() {
            return self.compile_field(item.field, context, scope);
        }

        let Some(mut compiled) = self.compile_field(item.field, &parameter.to_expr(), &scope.bind(parameter))? else {
            return Ok(None);
        };
        compiled.expression = self
            .replacer
            .rebase(&compiled.expression, parameter, context, &scope.parameters, &scope.path)?;
        Ok(Some(compiled))
    }

    fn compile_field(
        &mut self,
        field: &'a FieldSelection,
        context: &Expr,
        scope: &Scope,
    ) -> CompileResult<Option<Compiled>> {
        if scope.mode == CompileMode::DataOnly && field.definition.requires_service() {
            tracing::trace!(path = %scope.path, "deferring service field to the full pass");
            return Ok(None);
        }
        if let Some(max_depth) = self.config.max_depth {
            if scope.depth > max_depth {
                return Err(CompileError::DepthLimit {
                    path: scope.path.clone(),
                    max_depth,
                });
            }
        }

        let resolved = self.resolve(field, context, scope)?;
        self.compile_resolved(field, resolved, scope).map(Some)
    }

    /// The expression a field evaluates to before its own selection is applied.
    fn resolve(&mut self, field: &'a FieldSelection, context: &Expr, scope: &Scope) -> CompileResult<Resolved> {
        let definition = &field.definition;

        if scope.context_changed && !definition.requires_service() {
            if let Some(expression) = context.record_member(&field.response_key) {
                return Ok(Resolved {
                    expression,
                    materialized: true,
                    arguments: None,
                });
            }
        }

        let arguments = arguments::bind_arguments(field, &self.variables, &scope.path)?;

        let mut template = definition.resolve().clone();
        if scope.context_changed && definition.requires_service() && context.ty().record_shape().is_some() {
            template = self.substitute_dependencies(definition, &template, context, &scope.path)?;
        }

        let mut expression = template.replace(Replacement::Identity(definition.context()), context);
        if let Some((parameter, _)) = &arguments {
            expression = expression.replace(
                Replacement::Identity(definition.arguments().parameter()),
                &parameter.to_expr(),
            );
        }

        let arguments_id = arguments.as_ref().map(|(parameter, _)| parameter.id());
        if let Some(dangling) = expression
            .free_parameters()
            .into_iter()
            .find(|parameter| !scope.parameters.contains(&parameter.id()) && Some(parameter.id()) != arguments_id)
        {
            return Err(CompileError::DanglingContext {
                path: scope.path.clone(),
                parameter: dangling.name().to_string(),
            });
        }

        Ok(Resolved {
            expression,
            materialized: false,
            arguments,
        })
    }

    /// Points every member chain a service field reads at the corresponding member of
    /// the fetched record.
    fn substitute_dependencies(
        &self,
        definition: &FieldDefinition,
        template: &Expr,
        record: &Expr,
        path: &FieldPath,
    ) -> CompileResult<Expr> {
        let mut substituted = template.clone();
        let keys = self.fetched.get(path);
        for (name, dependency) in extract(template, Tracked::Identity(definition.context()), path)? {
            let key = keys.and_then(|keys| keys.get(&name)).unwrap_or(&name);
            let member = record
                .record_member(key)
                .ok_or_else(|| CompileError::MissingDependency {
                    path: path.clone(),
                    member: name.to_string(),
                })?;
            substituted = substituted.substitute(&dependency.chain, &member);
        }

        // Two chains under one member only fetch the last one.
        if let Some(name) = extract(&substituted, Tracked::Identity(definition.context()), path)?
            .keys()
            .next()
        {
            return Err(CompileError::MissingDependency {
                path: path.clone(),
                member: name.to_string(),
            });
        }
        Ok(substituted)
    }

    fn compile_resolved(
        &mut self,
        field: &'a FieldSelection,
        resolved: Resolved,
        scope: &Scope,
    ) -> CompileResult<Compiled> {
        let mut constants = ConstantParameters::default();
        let mut scope = scope.clone();
        if let Some((parameter, value)) = &resolved.arguments {
            constants.insert(parameter.clone(), value.clone());
            scope = scope.bind(parameter);
        }

        match field.definition.shape() {
            FieldShape::Leaf => Ok(Compiled {
                expression: resolved.expression,
                constants,
                deferred_services: false,
            }),
            FieldShape::Object => self.compile_object(field, resolved, &scope, constants),
            FieldShape::List => self.compile_list(field, resolved, &scope, constants),
        }
    }

    fn compile_object(
        &mut self,
        field: &'a FieldSelection,
        resolved: Resolved,
        scope: &Scope,
        mut constants: ConstantParameters,
    ) -> CompileResult<Compiled> {
        let ty = resolved.expression.ty().clone();
        if !ty.is_composite() {
            return Err(CompileError::ShapeMismatch {
                path: scope.path.clone(),
                expected: "an object",
                found: ty.to_string(),
            });
        }

        let element = Parameter::new(placeholder_name(field, &ty), ty);
        let inner = Scope {
            context_changed: scope.context_changed || resolved.materialized,
            ..scope.bind(&element)
        };
        let selection = self.compile_selection_set(field, &element.to_expr(), &inner)?;
        constants.extend(selection.constants);

        if selection.fields.is_empty() {
            return Ok(Compiled {
                expression: resolved.expression,
                constants,
                deferred_services: selection.deferred_services,
            });
        }

        let body = self.record(&selection.fields);
        Ok(Compiled {
            expression: Expr::project_one(resolved.expression, element, body),
            constants,
            deferred_services: selection.deferred_services,
        })
    }

    fn compile_list(
        &mut self,
        field: &'a FieldSelection,
        resolved: Resolved,
        scope: &Scope,
        mut constants: ConstantParameters,
    ) -> CompileResult<Compiled> {
        let Some(element_ty) = resolved.expression.ty().element().cloned() else {
            return Err(CompileError::ShapeMismatch {
                path: scope.path.clone(),
                expected: "a list",
                found: resolved.expression.ty().to_string(),
            });
        };
        let element = Parameter::new(placeholder_name(field, &element_ty), element_ty);
        let extensions = field.definition.extensions();
        let hooks = HookContext {
            mode: scope.mode,
            materialized: resolved.materialized,
            path: &scope.path,
            arguments: resolved.arguments.as_ref().map(|(parameter, _)| parameter),
            argument_values: resolved.arguments.as_ref().map(|(_, value)| value),
        };

        let mut pre = PreSelection {
            collection: resolved.expression.clone(),
            element: element.clone(),
            element_context: element.to_expr(),
        };
        for extension in extensions {
            pre = extension
                .pre_selection(&hooks, pre)
                .map_err(|err| extension_error(extension.name(), &scope.path, err))?;
        }

        let swapped = pre.element != element;
        if swapped {
            tracing::trace!(path = %scope.path, element = pre.element.name(), "extension replaced the element");
        }
        let inner = Scope {
            context_changed: scope.context_changed || resolved.materialized || swapped,
            ..scope.bind(&pre.element)
        };
        let mut selection = self.compile_selection_set(field, &pre.element_context, &inner)?;
        constants.extend(selection.constants);

        // Whatever the extensions read from each element has to be fetched as well.
        if scope.mode == CompileMode::DataOnly && !extensions.is_empty() && !selection.fields.is_empty() {
            for (name, dependency) in extract(&pre.collection, Tracked::Type(element.ty()), &scope.path)? {
                let expression = dependency
                    .chain
                    .replace(Replacement::Identity(&dependency.root), &pre.element_context);
                if selection.fields.insert_if_absent(&name, expression) {
                    tracing::trace!(path = %scope.path, member = %name, "fetching extension dependency");
                }
            }
        }

        if selection.fields.is_empty() {
            return Ok(Compiled {
                expression: pre.collection,
                constants,
                deferred_services: selection.deferred_services,
            });
        }

        let mut post = PostSelection {
            selection: selection.fields,
            element: pre.element,
        };
        for extension in extensions.iter().rev() {
            post = extension
                .post_selection(&hooks, post)
                .map_err(|err| extension_error(extension.name(), &scope.path, err))?;
        }

        let body = self.record(&post.selection);
        let mut expression = Expr::project_each(pre.collection, post.element, body);
        if scope.mode == CompileMode::Full && !scope.is_root && !expression.ty().is_map() {
            expression = expression.materialize();
        }

        Ok(Compiled {
            expression,
            constants,
            deferred_services: selection.deferred_services,
        })
    }

    fn compile_selection_set(
        &mut self,
        field: &'a FieldSelection,
        context: &Expr,
        scope: &Scope,
    ) -> CompileResult<CompiledSelection> {
        let expanded = self
            .expander()
            .expand(&field.selection_set, &scope.fragments, &scope.path)?;

        let mut selection = CompiledSelection::default();
        let mut dependencies = Vec::new();
        for item in expanded {
            let scope = scope.field(&item);
            let definition = &item.field.definition;

            if scope.mode == CompileMode::DataOnly && definition.requires_service() {
                selection.deferred_services = true;
                for (name, dependency) in extract(definition.resolve(), Tracked::Identity(definition.context()), &scope.path)? {
                    let expression = dependency
                        .chain
                        .replace(Replacement::Identity(&dependency.root), context);
                    dependencies.push((scope.path.clone(), name, expression));
                }
                continue;
            }

            let Some(compiled) = self.compile_expanded(&item, context, &scope)? else {
                continue;
            };
            selection.deferred_services |= compiled.deferred_services;
            selection.constants.extend(compiled.constants);
            selection.fields.insert(&item.field.response_key, compiled.expression);
        }

        // Selected fields keep their keys, dependencies go wherever they do not clash.
        for (path, name, expression) in dependencies {
            let key = selection.fields.insert_fetched(&name, expression);
            tracing::trace!(%path, member = %name, %key, "fetching service dependency");
            self.fetched.entry(path).or_default().insert(name, key);
        }
        Ok(selection)
    }

    fn record(&mut self, fields: &SelectionMap) -> Expr {
        let shape = self.shapes.intern(RecordShape::new(
            fields
                .iter()
                .map(|field| (field.name.clone(), field.expression.ty().clone())),
        ));
        Expr::record(shape, fields.iter().map(|field| field.expression.clone()).collect())
    }
}

fn placeholder_name(field: &FieldSelection, ty: &Ty) -> String {
    match ty.object_name() {
        Some(name) => format!("p_{name}"),
        None => format!("p_{}", field.response_key),
    }
}

fn extension_error(extension: &str, path: &FieldPath, err: crate::ExtensionError) -> CompileError {
    CompileError::Extension {
        path: path.clone(),
        extension: extension.to_string(),
        message: err.to_string(),
    }
}
