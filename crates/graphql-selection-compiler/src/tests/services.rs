use std::sync::Arc;

use serde_json::json;

use super::{execute, parse, people_schema, render};
use crate::{
    CompileMode, CompilerConfig, ErrorKind, Parameter, QueryExecutor, RootSource, SelectionCompiler, Services, Variables,
};

#[test]
fn data_pass_fetches_what_services_read() {
    let rendered = render(
        &people_schema(),
        "{ people { id fullName city } }",
        json!({}),
        CompileMode::DataOnly,
    )
    .unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {id: p_Person.id, name: p_Person.name, lastName: p_Person.lastName, address: p_Person.address.city})");
}

#[test]
fn full_pass_reads_back_fetched_records() {
    let schema = people_schema();
    let document = parse(&schema, "{ people { id fullName city } }");
    let variables = Variables::default();
    let config = CompilerConfig::default();
    let mut compiler = SelectionCompiler::new(&schema, &document, &variables, &config);
    let roots = compiler.root_fields().unwrap();

    let fetch = compiler
        .compile_root_field(&roots[0], CompileMode::DataOnly, &RootSource::Schema)
        .unwrap()
        .unwrap();
    assert!(fetch.deferred_services);

    let data = Parameter::new("data", fetch.expression.ty().clone());
    let full = compiler
        .compile_root_field(&roots[0], CompileMode::Full, &RootSource::Materialized(data))
        .unwrap()
        .unwrap();
    insta::assert_snapshot!(full.expression, @"data.map(|p_people| {id: p_people.id, fullName: names::fullName(p_people.name, p_people.lastName), city: geo::locate(p_people.address)})");
}

#[test]
fn two_pass_execution() {
    pretty_assertions::assert_eq!(
        execute(&people_schema(), "{ people { id fullName city } }", json!({})),
        json!({
            "data": {
                "people": [
                    {"id": "1", "fullName": "Ada Lovelace", "city": "London (geocoded)"},
                    {"id": "2", "fullName": "Charles Babbage", "city": "London (geocoded)"},
                    {"id": "3", "fullName": "Grace Hopper", "city": "Arlington (geocoded)"}
                ]
            }
        })
    );
}

#[test]
fn service_fields_below_nested_objects() {
    let schema = people_schema();
    let query = r#"{ person(id: "1") { friends { fullName } } }"#;

    let rendered = render(&schema, query, json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @"person: ctx.people.filter(|candidate| (candidate.id == args_person.id)).first().then(|p_Person| {friends: p_Person.friends.map(|p_Person| {name: p_Person.name, lastName: p_Person.lastName})})");

    pretty_assertions::assert_eq!(
        execute(&schema, query, json!({})),
        json!({"data": {"person": {"friends": [{"fullName": "Charles Babbage"}]}}})
    );
}

#[test]
fn full_mode_without_data_pass_calls_services_directly() {
    let rendered = render(&people_schema(), "{ people { fullName } }", json!({}), CompileMode::Full).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {fullName: names::fullName(p_Person.name, p_Person.lastName)})");
}

#[test]
fn nothing_deferred_without_services() {
    let schema = people_schema();
    let document = parse(&schema, "{ people { name } }");
    let variables = Variables::default();
    let config = CompilerConfig::default();
    let mut compiler = SelectionCompiler::new(&schema, &document, &variables, &config);
    let roots = compiler.root_fields().unwrap();

    let compiled = compiler
        .compile_root_field(&roots[0], CompileMode::DataOnly, &RootSource::Schema)
        .unwrap()
        .unwrap();
    assert!(!compiled.deferred_services);
}

#[test]
fn service_backed_root_field() {
    let schema = people_schema();

    let rendered = render(&schema, "{ census people { name } }", json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @r###"
    census: <deferred>
    people: ctx.people.map(|p_Person| {name: p_Person.name})
    "###);

    pretty_assertions::assert_eq!(
        execute(&schema, "{ census }", json!({})),
        json!({"data": {"census": 3}})
    );
}

#[test]
fn whole_context_cannot_be_fetched() {
    let schema = people_schema();

    let error = render(&schema, "{ people { profile } }", json!({}), CompileMode::DataOnly).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnscopedContext);
    assert_eq!(error.path().to_string(), "people.profile");

    pretty_assertions::assert_eq!(
        execute(&schema, "{ people { name } broken: people { profile } }", json!({})),
        json!({
            "data": {
                "people": [{"name": "Ada"}, {"name": "Charles"}, {"name": "Grace"}],
                "broken": null
            },
            "errors": [{
                "message": "Field 'broken.profile' reads the whole context parameter 'person'. Fields requiring a service must select the specific members they depend on.",
                "path": ["broken", "profile"]
            }]
        })
    );
}

#[test]
fn only_the_last_chain_under_a_member_is_fetched() {
    let schema = people_schema();

    let rendered = render(&schema, "{ people { whereabouts } }", json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {address: p_Person.address.city})");

    pretty_assertions::assert_eq!(
        execute(&schema, "{ people { whereabouts } }", json!({})),
        json!({
            "data": {"people": null},
            "errors": [{
                "message": "Field 'people.whereabouts' depends on 'address' which was not fetched by the data pass",
                "path": ["people", "whereabouts"]
            }]
        })
    );
}

#[test]
fn service_failures_become_field_errors() {
    let schema = people_schema();
    let document = parse(&schema, "{ people { fullName } count: census }");
    let response = QueryExecutor::new(&schema, Arc::new(Services::new())).execute(
        &document,
        &Variables::default(),
        &super::data(),
    );

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "people": null,
        "count": null
      },
      "errors": [
        {
          "message": "No service method names::fullName is registered",
          "path": [
            "people"
          ]
        },
        {
          "message": "No service method stats::count is registered",
          "path": [
            "count"
          ]
        }
      ]
    }
    "###);
}

#[test]
fn fetched_dependencies_do_not_clash_with_aliases() {
    let schema = people_schema();

    let rendered = render(&schema, "{ people { name: id fullName } }", json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {name: p_Person.id, __dep_name: p_Person.name, lastName: p_Person.lastName})");

    pretty_assertions::assert_eq!(
        execute(&schema, "{ people { name: id fullName } }", json!({})),
        json!({
            "data": {
                "people": [
                    {"name": "1", "fullName": "Ada Lovelace"},
                    {"name": "2", "fullName": "Charles Babbage"},
                    {"name": "3", "fullName": "Grace Hopper"}
                ]
            }
        })
    );
    pretty_assertions::assert_eq!(
        execute(&schema, "{ people { fullName name: id } }", json!({})),
        json!({
            "data": {
                "people": [
                    {"fullName": "Ada Lovelace", "name": "1"},
                    {"fullName": "Charles Babbage", "name": "2"},
                    {"fullName": "Grace Hopper", "name": "3"}
                ]
            }
        })
    );
}

#[test]
fn fetched_dependencies_do_not_clash_with_selected_objects() {
    let schema = people_schema();

    let rendered = render(&schema, "{ people { city address { street } } }", json!({}), CompileMode::DataOnly).unwrap();
    insta::assert_snapshot!(rendered, @"people: ctx.people.map(|p_Person| {address: p_Person.address.then(|p_Address| {street: p_Address.street}), __dep_address: p_Person.address.city})");

    let expected = [
        ("London (geocoded)", "St James's Square"),
        ("London (geocoded)", "Dorset Street"),
        ("Arlington (geocoded)", "Army Navy Drive"),
    ];
    for query in ["{ people { city address { street } } }", "{ people { address { street } city } }"] {
        let response = execute(&schema, query, json!({}));
        assert!(response.get("errors").is_none(), "{query}: {response}");
        for (person, (city, street)) in expected.iter().enumerate() {
            let fetched = &response["data"]["people"][person];
            assert_eq!(fetched["city"], json!(city), "{query}");
            assert_eq!(fetched["address"], json!({"street": street}), "{query}");
        }
    }
}
