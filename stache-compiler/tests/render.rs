use serde_json::{json, Value};
use stache_compiler::{EngineOptions, RenderError, Stache};

fn render(source: &str, data: Value) -> String {
    let stache = Stache::new();
    let template = stache.compile(source).expect("compile template");
    template.render(&data).expect("render template")
}

#[test]
fn renders_text_and_escaped_values() {
    let output = render(
        "<p>{{title}}</p>{{{title}}}{{& title}}",
        json!({"title": "<Tom & Jerry>"}),
    );
    assert_eq!(
        output,
        "<p>&lt;Tom &amp; Jerry&gt;</p><Tom & Jerry><Tom & Jerry>"
    );
}

#[test]
fn comments_are_dropped() {
    assert_eq!(render("a{{! note }}b{{!-- {{x}} --}}c", json!({})), "abc");
}

#[test]
fn each_iterates_arrays_with_data_variables() {
    let output = render(
        "{{#each items}}{{@index}}:{{this}}{{#if @last}}.{{else}},{{/if}}{{/each}}",
        json!({"items": ["a", "b", "c"]}),
    );
    assert_eq!(output, "0:a,1:b,2:c.");
}

#[test]
fn each_binds_block_params_and_parent_scope() {
    let output = render(
        "{{#each people as |person i|}}{{i}}={{person.name}}@{{../team}} {{/each}}",
        json!({"team": "core", "people": [{"name": "ada"}, {"name": "lin"}]}),
    );
    assert_eq!(output, "0=ada@core 1=lin@core ");
}

#[test]
fn each_iterates_object_entries_in_key_order() {
    let output = render(
        "{{#each scores}}{{@key}}={{this}};{{/each}}",
        json!({"scores": {"b": 2, "a": 1}}),
    );
    assert_eq!(output, "a=1;b=2;");
}

#[test]
fn each_renders_else_for_empty_input() {
    assert_eq!(
        render("{{#each items}}x{{else}}empty{{/each}}", json!({"items": []})),
        "empty"
    );
    assert_eq!(
        render("{{#each missing}}x{{else}}empty{{/each}}", json!({})),
        "empty"
    );
}

#[test]
fn if_unless_and_with() {
    let template = "{{#if user}}hi {{#with user}}{{name}}{{/with}}{{else}}anon{{/if}}|{{#unless user}}guest{{/unless}}";
    assert_eq!(render(template, json!({"user": {"name": "ada"}})), "hi ada|");
    assert_eq!(render(template, json!({"user": null})), "anon|guest");
}

#[test]
fn inverted_sections_swap_the_bodies() {
    let template = "{{^if ok}}no{{/if}}";
    assert_eq!(render(template, json!({"ok": false})), "no");
    assert_eq!(render(template, json!({"ok": true})), "");

    let template = "{{^if ok}}no{{else}}yes{{/if}}|{{^each items}}empty{{^}}{{this}}{{/each}}";
    assert_eq!(render(template, json!({"ok": true, "items": ["a", "b"]})), "yes|ab");
    assert_eq!(render(template, json!({"ok": false, "items": []})), "no|empty");
}

#[test]
fn value_helpers_take_arguments_and_hash() {
    let stache = Stache::new();
    stache.register_helper_fn("join", |_context, arguments| {
        let separator = arguments
            .hash_value("sep")
            .and_then(Value::as_str)
            .unwrap_or(",");
        let parts = arguments
            .positional
            .iter()
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>();
        Ok(Value::String(parts.join(separator)))
    });

    let template = stache
        .compile("{{join first 2 \"<3\" sep=\"-\"}}")
        .expect("compile join");
    assert_eq!(
        template.render(&json!({"first": "a"})).expect("render join"),
        "a-2-&lt;3"
    );
}

#[test]
fn missing_value_helper_with_arguments_is_an_error() {
    let stache = Stache::new();
    let template = stache.compile("{{shout name}}").expect("compile");
    let error = template.render(&json!({"name": "x"})).unwrap_err();
    assert!(
        matches!(error, RenderError::HelperNotFound { ref name, .. } if name == "shout"),
        "unexpected error: {error:?}"
    );
}

#[test]
fn partials_and_inline_partials() {
    let stache = Stache::new();
    stache
        .register_partial("greeting", "Hello {{name}}!")
        .expect("register partial");

    let template = stache
        .compile("{{#*inline \"row\"}}<{{this}}>{{/inline}}{{> greeting}} {{#each items}}{{> row}}{{/each}}")
        .expect("compile partials");
    let output = template
        .render(&json!({"name": "ada", "items": [1, 2]}))
        .expect("render partials");
    assert_eq!(output, "Hello ada! <1><2>");
}

#[test]
fn missing_partial_is_reported() {
    let stache = Stache::new();
    let template = stache.compile("{{> nowhere}}").expect("compile");
    assert!(matches!(
        template.render(&json!({})),
        Err(RenderError::PartialNotFound { ref name, .. }) if name == "nowhere"
    ));
}

#[test]
fn strict_mode_rejects_unresolved_paths() {
    let lenient = Stache::new();
    let template = lenient.compile("[{{missing}}]").expect("compile");
    assert_eq!(template.render(&json!({})).expect("lenient render"), "[]");

    let strict = Stache::with_options(EngineOptions {
        strict: true,
        ..EngineOptions::default()
    });
    let template = strict.compile("[{{missing}}]").expect("compile");
    let error = template.render(&json!({})).unwrap_err();
    assert!(
        matches!(error, RenderError::UnresolvedBinding { ref path, .. } if path == "missing"),
        "unexpected error: {error:?}"
    );
}

#[test]
fn no_escape_writes_values_verbatim() {
    let stache = Stache::with_options(EngineOptions {
        no_escape: true,
        ..EngineOptions::default()
    });
    let template = stache.compile("{{html}}").expect("compile");
    assert_eq!(
        template.render(&json!({"html": "<b>"})).expect("render"),
        "<b>"
    );
}

#[test]
fn engines_do_not_share_helpers() {
    let first = Stache::new();
    let second = Stache::new();
    first.register_block_helper_fn("only-first", |writer, _options, _context, _arguments| {
        writer.write_safe("first");
        Ok(())
    });

    let source = "{{#only-first}}{{/only-first}}";
    let on_first = first.compile(source).expect("compile on first");
    let on_second = second.compile(source).expect("compile on second");
    assert_eq!(on_first.render(&json!({})).expect("render first"), "first");
    assert!(matches!(
        on_second.render(&json!({})),
        Err(RenderError::HelperNotFound { .. })
    ));
}
