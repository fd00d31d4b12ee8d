use serde_json::json;

use super::{execute, people_schema, render, render_with};
use crate::{
    CompileError, CompileMode, CompilerConfig, ErrorKind, Evaluator, Parameter, RootSource, Schema, SelectionCompiler, Ty,
    Variables,
};

#[test]
fn scalar_fields() {
    let rendered = render(&people_schema(), "{ people { id name } }", json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {id: p_Person.id, name: p_Person.name})");
}

#[test]
fn nested_lists_are_forced_below_the_root() {
    let schema = people_schema();
    let query = "{ people { name friends { name } } }";

    let full = render(&schema, query, json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(full, @"people: ctx.people.map(|p_Person| {name: p_Person.name, friends: p_Person.friends.map(|p_Person| {name: p_Person.name}).to_list()})");

    let data_only = render(&schema, query, json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(data_only, @"people: ctx.people.map(|p_Person| {name: p_Person.name, friends: p_Person.friends.map(|p_Person| {name: p_Person.name})})");
}

#[test]
fn root_lists_stay_lazy() {
    let schema = people_schema();
    let document = super::parse(&schema, "{ people { name friends { name } } }");
    let variables = Variables::default();
    let config = CompilerConfig::default();
    let mut compiler = SelectionCompiler::new(&schema, &document, &variables, &config);
    let roots = compiler.root_fields().unwrap();
    let compiled = compiler
        .compile_root_field(&roots[0], CompileMode::Full, &RootSource::Schema)
        .unwrap()
        .unwrap();

    let env = compiled
        .constants
        .environment()
        .update(schema.context().id(), super::data());
    let value = Evaluator::new(super::services())
        .evaluate(&compiled.expression, &env)
        .unwrap();

    assert!(value.is_lazy());
    let people = value.elements().unwrap();
    assert_eq!(people.len(), 3);
    assert!(!people[0].get("friends").unwrap().is_lazy());
}

#[test]
fn maps_are_projected_per_value() {
    let schema = people_schema();
    let query = "{ people { name relatives { name } } }";

    let rendered = render(&schema, query, json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {name: p_Person.name, relatives: p_Person.relatives.map(|p_Person| {name: p_Person.name})})");

    pretty_assertions::assert_eq!(
        execute(&schema, query, json!({})),
        json!({
            "data": {
                "people": [
                    {"name": "Ada", "relatives": {"father": {"name": "George"}}},
                    {"name": "Charles", "relatives": null},
                    {"name": "Grace", "relatives": null}
                ]
            }
        })
    );
}

#[test]
fn singular_objects_are_null_safe() {
    let schema = people_schema();
    let query = r#"{ person(id: "2") { name address { city } } nobody: person(id: "9") { name } }"#;

    let rendered = render(&schema, query, json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(rendered, @r###"
    person: ctx.people.filter(|candidate| (candidate.id == args_person.id)).first().then(|p_Person| {name: p_Person.name, address: p_Person.address.then(|p_Address| {city: p_Address.city})})
    nobody: ctx.people.filter(|candidate| (candidate.id == args_person.id)).first().then(|p_Person| {name: p_Person.name})
    "###);

    pretty_assertions::assert_eq!(
        execute(&schema, query, json!({})),
        json!({"data": {"person": {"name": "Charles", "address": {"city": "London"}}, "nobody": null}})
    );
}

#[test]
fn duplicate_keys_keep_first_spelling_and_last_value() {
    let schema = people_schema();

    let nested = render(&schema, "{ people { name: lastName Name: name } }", json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(nested, @"people: ctx.people.map(|p_Person| {name: p_Person.name})");

    let root = render(&schema, "{ people { id } PEOPLE: people { name } }", json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(root, @"people: ctx.people.map(|p_Person| {name: p_Person.name})");
}

#[test]
fn duplicate_keys_across_fragments() {
    let schema = people_schema();

    let direct_first = render(
        &schema,
        "{ people { name: id ...f } } fragment f on Person { name }",
        json!({}),
        CompileMode::Full,
    )
    .unwrap();
    insta::assert_snapshot!(direct_first, @"people: ctx.people.map(|p_Person| {name: p_Person.name})");

    let fragment_first = render(
        &schema,
        "{ people { ...f name: id } } fragment f on Person { name }",
        json!({}),
        CompileMode::Full,
    )
    .unwrap();
    insta::assert_snapshot!(fragment_first, @"people: ctx.people.map(|p_Person| {name: p_Person.id})");
}

#[test]
fn field_over_an_unbound_parameter() {
    let mut builder = Schema::builder("Query");
    builder
        .object("Query")
        .field("bad", |_, _| Parameter::new("foreign", Ty::STRING).to_expr());
    let schema = builder.build();

    let error = render(&schema, "{ bad }", json!({}), CompileMode::Full).unwrap_err();
    assert!(matches!(error, CompileError::DanglingContext { .. }), "{error}");
    assert_eq!(error.kind(), ErrorKind::Compilation);
    insta::assert_snapshot!(error, @"Field 'bad' references the parameter 'foreign' which is not bound by any enclosing context");
}

#[test]
fn typename_is_a_constant() {
    let rendered = render(&people_schema(), "{ people { __typename } }", json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(rendered, @r#"people: ctx.people.map(|p_Person| {__typename: "Person"})"#);
}

#[test]
fn computed_fields_compose_with_their_context() {
    let rendered = render(&people_schema(), "{ people { friendCount } }", json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {friendCount: p_Person.friends.count()})");
}

#[test]
fn depth_limit() {
    let schema = people_schema();
    let config = CompilerConfig::from_toml("max_depth = 2").unwrap();

    assert!(render_with(&schema, &config, "{ people { name } }", json!({}), CompileMode::Full).is_ok());

    let error = render_with(
        &schema,
        &config,
        "{ people { friends { name } } }",
        json!({}),
        CompileMode::Full,
    )
    .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Compilation);
    insta::assert_snapshot!(error, @"Field 'people.friends.name' exceeds the maximum selection depth of 2");
}
