use railviz::{EndClass, Node, TextSettings, render_text, render_text_value};
use serde_json::json;

fn settings() -> TextSettings {
    TextSettings::default()
}

/// Row index of the first line containing `needle`.
fn line_of(output: &str, needle: &str) -> usize {
    output
        .lines()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{output}"))
}

#[test]
fn test_single_terminal() {
    let out = render_text(&Node::terminal("A"), &settings()).unwrap();
    assert_eq!(out, "    ╭───╮\n┤├──┤ A ├──┤├\n    ╰───╯");
}

#[test]
fn test_simple_end_class() {
    let out = render_text(
        &Node::terminal("A"),
        &TextSettings {
            end_class: EndClass::Simple,
            ..settings()
        },
    )
    .unwrap();
    let main = out.lines().nth(1).unwrap();
    assert!(main.starts_with("├─"), "{main}");
    assert!(main.ends_with("┤"), "{main}");
}

#[test]
fn test_loop_with_separator() {
    let diagram = Node::one_or_more_sep(Node::non_terminal("expr"), Node::terminal(","));
    let out = render_text(&diagram, &settings()).unwrap();
    let expected = "\
     ┌──────┐
┤├──┬┤ expr ├─┬─┤├
    │└──────┘ │
    │ ╭───╮   │
    ╰◂┤ , ├───╯
      ╰───╯";
    assert_eq!(out, expected);
}

#[test]
fn test_optional_bypass_rejoins_before_next_element() {
    let diagram = Node::sequence(vec![
        Node::optional(Node::terminal("DISTINCT")),
        Node::terminal("x"),
    ]);
    let out = render_text(&diagram, &settings()).unwrap();
    let rail_row = line_of(&out, "╮");
    let main_row = line_of(&out, "DISTINCT");
    assert!(rail_row < main_row, "bypass rail must sit above:\n{out}");
    let rejoin = out.lines().nth(rail_row).unwrap().rfind('╮').unwrap();
    let x_box = out.lines().nth(main_row).unwrap().rfind("┤ x ├").unwrap();
    assert!(rejoin < x_box, "bypass must rejoin before x:\n{out}");
}

#[test]
fn test_choice_alternative_placement() {
    let diagram = Node::choice(
        vec![
            Node::terminal("INT"),
            Node::terminal("STR"),
            Node::terminal("(expr)"),
        ],
        1,
    );
    let out = render_text(&diagram, &settings()).unwrap();
    let int_row = line_of(&out, "INT");
    let str_row = line_of(&out, "STR");
    let expr_row = line_of(&out, "(expr)");
    assert!(int_row < str_row, "INT must sit above the default:\n{out}");
    assert!(str_row < expr_row, "(expr) must sit below the default:\n{out}");
    // The default alternative carries the main line and its end markers.
    assert!(out.lines().nth(str_row).unwrap().contains("┤├"));
}

#[test]
fn test_wrapping_against_advisory_width() {
    let children: Vec<Node> = (0..10)
        .map(|i| Node::terminal(format!("T{i:02}{}", "a".repeat(73))))
        .collect();
    let out = render_text(
        &Node::sequence(children),
        &TextSettings {
            max_width: 200,
            ..settings()
        },
    )
    .unwrap();
    // Two 80-wide terminals per line: five rows, paired in order.
    for i in (0..10).step_by(2) {
        assert_eq!(
            line_of(&out, &format!("T{i:02}")),
            line_of(&out, &format!("T{:02}", i + 1)),
            "children {i} and {} must share a line:\n{out}",
            i + 1
        );
    }
    for i in (1..9).step_by(2) {
        assert!(
            line_of(&out, &format!("T{i:02}")) < line_of(&out, &format!("T{:02}", i + 1)),
            "line order must follow child order:\n{out}"
        );
    }
    for line in out.lines() {
        assert!(line.chars().count() <= 200, "overlong line:\n{line}");
    }
}

#[test]
fn test_barrier_blocks_rail_fusion() {
    let fused = render_text(
        &Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::optional(Node::terminal("B")),
        ]),
        &settings(),
    )
    .unwrap();
    let walled = render_text(
        &Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::barrier(Node::optional(Node::terminal("B"))),
        ]),
        &settings(),
    )
    .unwrap();
    let rails = |s: &str| s.matches('╭').count();
    // One shared rail plus two box corners, against two separate rails.
    assert_eq!(rails(&fused), 3, "{fused}");
    assert_eq!(rails(&walled), 4, "{walled}");
}

#[test]
fn test_group_draws_caption_and_rectangle() {
    let diagram = Node::group(Node::non_terminal("value"), "literal");
    let out = render_text(&diagram, &settings()).unwrap();
    assert!(line_of(&out, "literal") < line_of(&out, "value"), "{out}");
    assert!(out.contains('┌'), "{out}");
    // The rail crosses the group border.
    assert!(out.contains('┼'), "{out}");
}

#[test]
fn test_comment_sits_on_the_rail() {
    let out = render_text(
        &Node::sequence(vec![Node::terminal("a"), Node::comment("then")]),
        &settings(),
    )
    .unwrap();
    let row = line_of(&out, "then");
    assert_eq!(row, line_of(&out, "┤├"), "comment belongs on the main line:\n{out}");
    // The rail carries through the comment's span on both sides.
    assert!(out.contains("── then ──"), "{out}");
}

#[test]
fn test_reverse_flips_order() {
    let diagram = Node::sequence(vec![
        Node::optional(Node::terminal("DISTINCT")),
        Node::terminal("x"),
    ]);
    let out = render_text(
        &diagram,
        &TextSettings {
            reverse: true,
            ..settings()
        },
    )
    .unwrap();
    let main = out.lines().nth(line_of(&out, "DISTINCT")).unwrap();
    assert!(
        main.find("┤ x ├").unwrap() < main.find("DISTINCT").unwrap(),
        "{out}"
    );
}

#[test]
fn test_value_entry_point() {
    let out = render_text_value(
        &json!({"choice": ["INT", {"non_terminal": "expr"}], "default": 0}),
        &settings(),
    )
    .unwrap();
    assert!(out.contains("INT"));
    assert!(out.contains("expr"));
}

#[test]
fn test_stack_rows_top_to_bottom() {
    let out = render_text(
        &Node::stack(vec![Node::terminal("first"), Node::terminal("second")]),
        &settings(),
    )
    .unwrap();
    assert!(line_of(&out, "first") < line_of(&out, "second"), "{out}");
    // The return path bends appear between the rows.
    assert!(out.contains('╮') && out.contains('╰'), "{out}");
}
