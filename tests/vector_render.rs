use railviz::{
    EmbedderError, Href, HrefRequest, HrefResolver, Node, NodeAttrs, RenderError, TextKind,
    TextMeasure, TrueTextMeasure, VectorSettings, render_vector, render_vector_value,
};
use serde_json::json;

fn settings() -> VectorSettings {
    VectorSettings::default()
}

/// The `y` attribute of the `<text>` element carrying `label`.
fn text_y(output: &str, label: &str) -> f64 {
    let end = output
        .find(&format!(">{label}</text>"))
        .unwrap_or_else(|| panic!("{label:?} not found in:\n{output}"));
    let y_attr = output[..end].rfind("y=\"").unwrap();
    let rest = &output[y_attr + 3..];
    rest[..rest.find('"').unwrap()].parse().unwrap()
}

#[test]
fn test_single_terminal_document() {
    let out = render_vector(&Node::terminal("INT"), &settings()).unwrap();
    assert!(out.starts_with("<svg "));
    assert!(out.ends_with("</svg>\n"));
    assert_eq!(out.matches("<rect").count(), 1);
    // Terminals have rounded ends.
    assert!(out.contains("rx=\"12\""), "{out}");
    assert!(out.contains(">INT</text>"), "{out}");
    assert_eq!(out.matches("class=\"terminus\"").count(), 2);
}

#[test]
fn test_optional_emits_bypass_arcs() {
    let out = render_vector(
        &Node::sequence(vec![
            Node::optional(Node::terminal("DISTINCT")),
            Node::terminal("x"),
        ]),
        &settings(),
    )
    .unwrap();
    // One bypass: a branch pair and a rejoin pair of quarter arcs.
    assert_eq!(out.matches("A10 10").count(), 4, "{out}");
}

#[test]
fn test_loop_return_line_carries_separator() {
    let out = render_vector(
        &Node::one_or_more_sep(Node::non_terminal("expr"), Node::terminal(",")),
        &settings(),
    )
    .unwrap();
    assert_eq!(out.matches("A10 10").count(), 2, "{out}");
    assert!(out.contains("class=\"arrow\""), "{out}");
    // The separator sits below the forward line.
    assert!(text_y(&out, ",") > text_y(&out, "expr"), "{out}");
}

#[test]
fn test_choice_default_on_main_line() {
    let out = render_vector(
        &Node::choice(
            vec![
                Node::terminal("INT"),
                Node::terminal("STR"),
                Node::terminal("(expr)"),
            ],
            1,
        ),
        &settings(),
    )
    .unwrap();
    let int_y = text_y(&out, "INT");
    let str_y = text_y(&out, "STR");
    let expr_y = text_y(&out, "(expr)");
    assert!(int_y < str_y, "INT above the default: {out}");
    assert!(str_y < expr_y, "(expr) below the default: {out}");
}

#[test]
fn test_metadata_and_css_class() {
    let out = render_vector(
        &Node::terminal("A"),
        &VectorSettings {
            title: Some("rule".into()),
            description: Some("the rule".into()),
            css_class: Some("fancy".into()),
            ..settings()
        },
    )
    .unwrap();
    assert!(out.contains("<title>rule</title>"));
    assert!(out.contains("<desc>the rule</desc>"));
    assert!(out.contains("class=\"railroad-diagram fancy\""));
    assert!(out.contains("<style"));
}

#[test]
fn test_css_style_can_be_dropped() {
    let out = render_vector(
        &Node::terminal("A"),
        &VectorSettings {
            css_style: None,
            ..settings()
        },
    )
    .unwrap();
    assert!(!out.contains("<style"));
}

#[test]
fn test_explicit_href_wraps_terminal_box_and_text() {
    let node = Node::Terminal {
        text: "SELECT".into(),
        attrs: NodeAttrs {
            href: Some("#select".into()),
            title: Some("keyword".into()),
            ..Default::default()
        },
    };
    let out = render_vector(&node, &settings()).unwrap();
    assert_eq!(out.matches("<a href=\"#select\">").count(), 2, "{out}");
    assert!(out.contains("<title>keyword</title>"), "{out}");
}

#[test]
fn test_href_on_non_terminal_wraps_text_only() {
    let node = Node::NonTerminal {
        text: "expr".into(),
        attrs: NodeAttrs {
            href: Some("#expr".into()),
            title: Some("expression".into()),
            ..Default::default()
        },
    };
    let out = render_vector(&node, &settings()).unwrap();
    assert_eq!(out.matches("<a href=\"#expr\">").count(), 1, "{out}");
    assert!(out.contains("<a href=\"#expr\"><text"), "{out}");
}

#[test]
fn test_injected_href_resolver() {
    struct Docs;

    impl HrefResolver for Docs {
        fn resolve(&self, request: &HrefRequest<'_>) -> Result<Option<Href>, EmbedderError> {
            if request.kind == TextKind::NonTerminal {
                Ok(Some(Href {
                    href: format!("#{}", request.text),
                    title: request.payload.get("title").cloned(),
                }))
            } else {
                Ok(None)
            }
        }
    }

    let node = Node::sequence(vec![Node::terminal("SELECT"), Node::non_terminal("expr")]);
    let out = render_vector(
        &node,
        &VectorSettings {
            href_resolver: Some(Box::new(Docs)),
            ..settings()
        },
    )
    .unwrap();
    assert!(out.contains("<a href=\"#expr\">"), "{out}");
    assert!(!out.contains("<a href=\"#SELECT\">"), "{out}");
}

#[test]
fn test_failing_measure_reports_embedder_error() {
    struct Broken;

    impl TextMeasure<f64> for Broken {
        fn width(&self, _kind: TextKind, _text: &str) -> Result<f64, EmbedderError> {
            Err(EmbedderError::new("font table missing"))
        }
    }

    let err = render_vector(
        &Node::terminal("A"),
        &VectorSettings {
            text_measure: Box::new(Broken),
            ..settings()
        },
    )
    .unwrap_err();
    assert!(matches!(err, RenderError::Embedder(_)), "{err}");
}

#[test]
fn test_true_text_measure_tightens_boxes() {
    let narrow = TrueTextMeasure::new(std::collections::HashMap::new(), 4.0);
    let tight = render_vector(
        &Node::terminal("WIDE"),
        &VectorSettings {
            text_measure: Box::new(narrow),
            ..settings()
        },
    )
    .unwrap();
    let loose = render_vector(&Node::terminal("WIDE"), &settings()).unwrap();
    let width = |out: &str| {
        let i = out.find("width=\"").unwrap() + 7;
        out[i..][..out[i..].find('"').unwrap()].parse::<f64>().unwrap()
    };
    assert!(width(&tight) < width(&loose));
}

#[test]
fn test_debug_mode_tags_groups() {
    let out = render_vector(
        &Node::optional(Node::terminal("A")),
        &VectorSettings {
            debug: true,
            ..settings()
        },
    )
    .unwrap();
    assert!(out.contains("data-railviz=\"choice-"), "{out}");
    assert!(out.contains("data-railviz=\"terminal-"), "{out}");
    assert_eq!(out.matches("<g ").count(), out.matches("</g>").count());
}

#[test]
fn test_no_group_tags_without_debug() {
    let out = render_vector(&Node::optional(Node::terminal("A")), &settings()).unwrap();
    assert!(!out.contains("data-railviz"));
}

#[test]
fn test_value_entry_point_reports_loading_errors() {
    let err = render_vector_value(&json!({"choice": ["a"], "default": 7}), &settings());
    assert!(matches!(err, Err(RenderError::Loading(_))));
    let ok = render_vector_value(&json!(["SELECT", {"optional": "DISTINCT"}]), &settings());
    assert!(ok.unwrap().contains("DISTINCT"));
}

#[test]
fn test_group_emits_dashed_rect_and_caption() {
    let out = render_vector(
        &Node::group(Node::non_terminal("value"), "literal"),
        &settings(),
    )
    .unwrap();
    assert!(out.contains("class=\"group\""), "{out}");
    assert!(out.contains("class=\"group-caption\">literal</text>"), "{out}");
}
