mod selection;
mod services;

use std::sync::Arc;

use itertools::Itertools;
use serde_json::json;

use crate::{
    ArgumentDefinition, BinaryOp, CompileError, CompileMode, CompilerConfig, Expr, FilterExtension,
    OffsetPagingExtension, Parameter, PositionExtension, QueryDocument, QueryExecutor, RootSource, Schema,
    SelectionCompiler, Services, SortExtension, Ty, Value, Variables,
};

#[ctor::ctor]
fn setup_logging() {
    let filter = tracing_subscriber::filter::EnvFilter::builder()
        .parse(std::env::var("RUST_LOG").unwrap_or("graphql_selection_compiler=debug".to_string()))
        .unwrap();
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .without_time()
        .init();
}

fn person() -> Ty {
    Ty::object("Person")
}

fn people() -> Ty {
    Ty::list(person())
}

pub(crate) fn people_schema() -> Schema {
    let mut builder = Schema::builder("Query");

    let query = builder.object("Query");
    query.member("people", people());
    query
        .field("person", |ctx, args| {
            let candidate = Parameter::new("candidate", person());
            let matches = Expr::binary(BinaryOp::Eq, candidate.member("id", Ty::ID), args.member("id", Ty::ID));
            ctx.member("people", people())
                .filter(Expr::lambda(candidate, matches))
                .first()
        })
        .argument(ArgumentDefinition::new("id", Ty::ID).required());
    query
        .field("adults", |ctx, _| ctx.member("people", people()))
        .extension(FilterExtension::new(
            ArgumentDefinition::new("minAge", Ty::INT),
            |person, min_age| Expr::binary(BinaryOp::Ge, person.clone().member("age", Ty::INT), min_age.clone()),
        ));
    query
        .field("directory", |ctx, _| ctx.member("people", people()))
        .description("Everyone, numbered before filtering and paging")
        .extension(PositionExtension::new("position"))
        .extension(FilterExtension::new(
            ArgumentDefinition::new("minAge", Ty::INT),
            |person, min_age| Expr::binary(BinaryOp::Ge, person.clone().member("age", Ty::INT), min_age.clone()),
        ))
        .extension(SortExtension::new(|person| person.clone().member("age", Ty::INT)))
        .extension(OffsetPagingExtension::new(Some(2), Some(5)));
    query
        .field("census", |ctx, _| {
            Expr::service("stats", "count", vec![ctx.member("people", people()).count()], Ty::INT)
        })
        .requires_service("stats");

    let person_type = builder.object("Person");
    person_type.member("id", Ty::ID);
    person_type.member("name", Ty::STRING);
    person_type.member("lastName", Ty::STRING);
    person_type.member("age", Ty::INT);
    person_type.member("address", Ty::object("Address"));
    person_type.member("friends", people());
    person_type.member("relatives", Ty::map(person()));
    person_type.field("friendCount", |person, _| person.member("friends", people()).count());
    person_type
        .field("fullName", |person, _| {
            Expr::service(
                "names",
                "fullName",
                vec![person.member("name", Ty::STRING), person.member("lastName", Ty::STRING)],
                Ty::STRING,
            )
        })
        .requires_service("names");
    person_type
        .field("city", |person, _| {
            let city = person.member("address", Ty::object("Address")).member("city", Ty::STRING);
            Expr::service("geo", "locate", vec![city], Ty::STRING)
        })
        .requires_service("geo");
    person_type
        .field("whereabouts", |person, _| {
            let address = person.member("address", Ty::object("Address"));
            Expr::service(
                "geo",
                "describe",
                vec![
                    address.clone().member("street", Ty::STRING),
                    address.member("city", Ty::STRING),
                ],
                Ty::STRING,
            )
        })
        .requires_service("geo");
    person_type
        .field("profile", |person, _| {
            Expr::service("names", "describe", vec![person.to_expr()], Ty::STRING)
        })
        .requires_service("names");

    let address = builder.object("Address");
    address.member("city", Ty::STRING);
    address.member("street", Ty::STRING);

    builder.build()
}

pub(crate) fn services() -> Arc<Services> {
    let mut services = Services::new();
    services
        .register("names", "fullName", |arguments| {
            Ok(Value::from(arguments.iter().filter_map(Value::as_str).join(" ")))
        })
        .register("names", "describe", |_| Err("people cannot be described as a whole".to_string()))
        .register("geo", "locate", |arguments| {
            Ok(Value::from(
                arguments
                    .first()
                    .and_then(Value::as_str)
                    .map(|city| format!("{city} (geocoded)")),
            ))
        })
        .register("geo", "describe", |arguments| {
            Ok(Value::from(arguments.iter().filter_map(Value::as_str).join(", ")))
        })
        .register("stats", "count", |arguments| Ok(arguments.first().cloned().unwrap_or_default()));
    Arc::new(services)
}

pub(crate) fn data() -> Value {
    let charles = json!({
        "id": "2",
        "name": "Charles",
        "lastName": "Babbage",
        "age": 79,
        "address": {"city": "London", "street": "Dorset Street"},
        "friends": []
    });
    Value::from(json!({
        "people": [
            {
                "id": "1",
                "name": "Ada",
                "lastName": "Lovelace",
                "age": 36,
                "address": {"city": "London", "street": "St James's Square"},
                "friends": [charles.clone()],
                "relatives": {
                    "father": {"id": "4", "name": "George", "lastName": "Byron", "age": 36, "friends": []}
                }
            },
            charles,
            {
                "id": "3",
                "name": "Grace",
                "lastName": "Hopper",
                "age": 85,
                "address": {"city": "Arlington", "street": "Army Navy Drive"},
                "friends": []
            }
        ]
    }))
}

pub(crate) fn parse(schema: &Schema, query: &str) -> QueryDocument {
    QueryDocument::parse(schema, query, None).unwrap()
}

/// Renders the compiled expression of every root field, one per line.
pub(crate) fn render(
    schema: &Schema,
    query: &str,
    variables: serde_json::Value,
    mode: CompileMode,
) -> Result<String, CompileError> {
    render_with(schema, &CompilerConfig::default(), query, variables, mode)
}

pub(crate) fn render_with(
    schema: &Schema,
    config: &CompilerConfig,
    query: &str,
    variables: serde_json::Value,
    mode: CompileMode,
) -> Result<String, CompileError> {
    let document = parse(schema, query);
    let variables = Variables::from_json(variables);
    let mut compiler = SelectionCompiler::new(schema, &document, &variables, config);

    let mut rendered = Vec::new();
    for root in compiler.root_fields()? {
        let expression = match compiler.compile_root_field(&root, mode, &RootSource::Schema)? {
            Some(compiled) => compiled.expression.to_string(),
            None => "<deferred>".to_string(),
        };
        rendered.push(format!("{}: {expression}", root.response_key));
    }
    Ok(rendered.join("\n"))
}

pub(crate) fn execute(schema: &Schema, query: &str, variables: serde_json::Value) -> serde_json::Value {
    execute_with(schema, CompilerConfig::default(), query, variables)
}

pub(crate) fn execute_with(
    schema: &Schema,
    config: CompilerConfig,
    query: &str,
    variables: serde_json::Value,
) -> serde_json::Value {
    let document = parse(schema, query);
    QueryExecutor::new(schema, services())
        .with_config(config)
        .execute(&document, &Variables::from_json(variables), &data())
        .to_json()
        .unwrap()
}
