use promptforge::{EngineError, ParsedTemplate};

#[test]
fn test_parse_plain_text() {
    assert!(ParsedTemplate::parse("no tags here").is_ok());
}

#[test]
fn test_unterminated_tag() {
    let err = ParsedTemplate::parse("before {{name").unwrap_err();
    match err {
        EngineError::MalformedTemplate { offset, .. } => assert_eq!(offset, 7),
        other => panic!("expected MalformedTemplate, got {other:?}"),
    }
}

#[test]
fn test_unterminated_if_section() {
    let err = ParsedTemplate::parse("{{#if flag}}never closed").unwrap_err();
    match err {
        EngineError::MalformedTemplate { message, offset } => {
            assert!(message.contains("unterminated"), "message: {message}");
            assert_eq!(offset, 0);
        }
        other => panic!("expected MalformedTemplate, got {other:?}"),
    }
}

#[test]
fn test_unterminated_each_section() {
    let err = ParsedTemplate::parse("x{{#each items}}y").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { offset: 1, .. }));
}

#[test]
fn test_stray_close_tag() {
    let err = ParsedTemplate::parse("text {{/if}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_mismatched_close_tag() {
    let err = ParsedTemplate::parse("{{#each xs}}{{/if}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_else_outside_if() {
    let err = ParsedTemplate::parse("a{{else}}b").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_double_else() {
    let err = ParsedTemplate::parse("{{#if x}}a{{else}}b{{else}}c{{/if}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_unterminated_comment() {
    let err = ParsedTemplate::parse("a{{!-- open forever").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { offset: 1, .. }));
}

#[test]
fn test_empty_tag_rejected() {
    let err = ParsedTemplate::parse("{{}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_if_without_guard_rejected() {
    let err = ParsedTemplate::parse("{{#if}}x{{/if}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_unknown_section_rejected() {
    let err = ParsedTemplate::parse("{{#unless x}}y{{/unless}}").unwrap_err();
    assert!(matches!(err, EngineError::MalformedTemplate { .. }));
}

#[test]
fn test_deep_nesting_parses() {
    let source = "{{#if a}}{{#each xs}}{{#if this.b}}{{#each this.ys}}{{this}}{{/each}}{{/if}}{{/each}}{{/if}}";
    assert!(ParsedTemplate::parse(source).is_ok());
}

#[test]
fn test_whitespace_inside_tags() {
    assert!(ParsedTemplate::parse("{{  name  }}").is_ok());
    assert!(ParsedTemplate::parse("{{#if   flag }}x{{/if}}").is_ok());
}

#[test]
fn test_parsed_template_is_reusable() {
    let parsed = ParsedTemplate::parse("Hello {{name}}!").unwrap();
    let cloned = parsed.clone();
    // Both handles render independently of each other
    let mut bindings = promptforge::Bindings::new();
    bindings.insert("name".into(), "World".into());
    assert_eq!(
        parsed
            .render(&bindings, promptforge::OutputContext::Raw)
            .unwrap(),
        cloned
            .render(&bindings, promptforge::OutputContext::Raw)
            .unwrap()
    );
}
