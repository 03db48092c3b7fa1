use indexmap::IndexMap;
use serde_json::Value;

use crate::core::node::{Breaks, LineBreak, Node, NodeAttrs};
use crate::errors::{LoadingError, LoadingErrorKind, TreePath};

/// Tag keys the loader dispatches on; a tagged map carries exactly one.
const TAGS: &[&str] = &[
    "skip",
    "terminal",
    "non_terminal",
    "comment",
    "sequence",
    "stack",
    "choice",
    "optional",
    "one_or_more",
    "zero_or_more",
    "barrier",
    "group",
];

const ATTR_FIELDS: &[&str] = &["href", "title", "class", "resolve"];

/// Loads a diagram from its data-literal form.
///
/// Strings are terminals, lists are sequences, `null` is a skip, and maps
/// dispatch on their tag key. The returned tree has passed the same
/// validation as [`Node::validate`].
pub fn load(value: &Value) -> Result<Node, LoadingError> {
    let node = load_at(value, &TreePath::root())?;
    node.validate()?;
    Ok(node)
}

fn load_at(value: &Value, path: &TreePath) -> Result<Node, LoadingError> {
    match value {
        Value::Null => Ok(Node::Skip),
        Value::String(text) => Ok(Node::terminal(text.clone())),
        Value::Array(items) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(i, item)| load_at(item, &path.index(i)))
                .collect::<Result<_, _>>()?;
            Ok(Node::Sequence {
                children,
                breaks: Breaks::default(),
            })
        }
        Value::Object(map) => load_tagged(map, path),
        other => Err(wrong_type("diagram node", other, path)),
    }
}

fn load_tagged(
    map: &serde_json::Map<String, Value>,
    path: &TreePath,
) -> Result<Node, LoadingError> {
    let mut tags = map.keys().filter(|k| TAGS.contains(&k.as_str()));
    let Some(tag) = tags.next() else {
        let tag = map.keys().next().cloned().unwrap_or_default();
        return Err(LoadingError::new(
            path.clone(),
            LoadingErrorKind::UnknownTag { tag },
        ));
    };
    if let Some(second) = tags.next() {
        return Err(LoadingError::new(
            path.clone(),
            LoadingErrorKind::UnknownField {
                tag: tag.clone(),
                field: second.clone(),
            },
        ));
    }
    let tag = tag.as_str();
    let value = &map[tag];
    let vpath = path.key(tag);
    match tag {
        "skip" => {
            check_fields(map, tag, &[], path)?;
            match value {
                Value::Null | Value::Bool(true) => Ok(Node::Skip),
                other => Err(wrong_type("null or true", other, &vpath)),
            }
        }
        "terminal" | "non_terminal" | "comment" => {
            check_fields(map, tag, ATTR_FIELDS, path)?;
            let text = as_str(value, &vpath)?.to_owned();
            let attrs = parse_attrs(map, path)?;
            Ok(match tag {
                "terminal" => Node::Terminal { text, attrs },
                "non_terminal" => Node::NonTerminal { text, attrs },
                _ => Node::Comment { text, attrs },
            })
        }
        "sequence" => {
            check_fields(map, tag, &["breaks"], path)?;
            let children = load_children(value, &vpath)?;
            let breaks = match map.get("breaks") {
                Some(breaks) => parse_breaks(breaks, &path.key("breaks"))?,
                None => Breaks::default(),
            };
            Ok(Node::Sequence { children, breaks })
        }
        "stack" => {
            check_fields(map, tag, &[], path)?;
            Ok(Node::Stack {
                children: load_children(value, &vpath)?,
            })
        }
        "choice" => {
            check_fields(map, tag, &["default"], path)?;
            let children = load_children(value, &vpath)?;
            let default = opt_usize(map, "default", path)?.unwrap_or(0);
            Ok(Node::Choice { children, default })
        }
        "optional" => {
            check_fields(map, tag, &["skip", "skip_bottom"], path)?;
            Ok(Node::Optional {
                child: Box::new(load_at(value, &vpath)?),
                skip: opt_bool(map, "skip", path)?,
                skip_bottom: opt_bool(map, "skip_bottom", path)?,
            })
        }
        "one_or_more" => {
            check_fields(map, tag, &["repeat", "repeat_top"], path)?;
            Ok(Node::OneOrMore {
                body: Box::new(load_at(value, &vpath)?),
                repeat: Box::new(load_repeat(map, path)?),
                repeat_top: opt_bool(map, "repeat_top", path)?,
            })
        }
        "zero_or_more" => {
            check_fields(map, tag, &["repeat", "repeat_top", "skip", "skip_bottom"], path)?;
            Ok(Node::ZeroOrMore {
                body: Box::new(load_at(value, &vpath)?),
                repeat: Box::new(load_repeat(map, path)?),
                repeat_top: opt_bool(map, "repeat_top", path)?,
                skip: opt_bool(map, "skip", path)?,
                skip_bottom: opt_bool(map, "skip_bottom", path)?,
            })
        }
        "barrier" => {
            check_fields(map, tag, &[], path)?;
            Ok(Node::Barrier(Box::new(load_at(value, &vpath)?)))
        }
        "group" => {
            check_fields(map, tag, &["text", "href", "title", "class", "resolve"], path)?;
            Ok(Node::Group {
                child: Box::new(load_at(value, &vpath)?),
                text: opt_str(map, "text", path)?,
                attrs: parse_attrs(map, path)?,
            })
        }
        _ => unreachable!("tag filtered against TAGS"),
    }
}

fn load_children(value: &Value, path: &TreePath) -> Result<Vec<Node>, LoadingError> {
    let Value::Array(items) = value else {
        return Err(wrong_type("list", value, path));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| load_at(item, &path.index(i)))
        .collect()
}

fn load_repeat(
    map: &serde_json::Map<String, Value>,
    path: &TreePath,
) -> Result<Node, LoadingError> {
    match map.get("repeat") {
        Some(repeat) => load_at(repeat, &path.key("repeat")),
        None => Ok(Node::Skip),
    }
}

fn parse_attrs(
    map: &serde_json::Map<String, Value>,
    path: &TreePath,
) -> Result<NodeAttrs, LoadingError> {
    let mut payload = IndexMap::new();
    if let Some(resolve) = map.get("resolve") {
        let rpath = path.key("resolve");
        let Value::Object(entries) = resolve else {
            return Err(wrong_type("map of strings", resolve, &rpath));
        };
        for (key, value) in entries {
            payload.insert(
                key.clone(),
                as_str(value, &rpath.key(key))?.to_owned(),
            );
        }
    }
    Ok(NodeAttrs {
        href: opt_str(map, "href", path)?,
        title: opt_str(map, "title", path)?,
        css_class: opt_str(map, "class", path)?,
        payload,
    })
}

fn parse_breaks(value: &Value, path: &TreePath) -> Result<Breaks, LoadingError> {
    match value {
        Value::String(s) => Ok(Breaks::Uniform(parse_break(s, path)?)),
        Value::Array(items) => {
            let joins = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let ipath = path.index(i);
                    parse_break(as_str(item, &ipath)?, &ipath)
                })
                .collect::<Result<_, _>>()?;
            Ok(Breaks::PerJoin(joins))
        }
        other => Err(wrong_type("break name or list of break names", other, path)),
    }
}

fn parse_break(name: &str, path: &TreePath) -> Result<LineBreak, LoadingError> {
    match name {
        "hard" => Ok(LineBreak::Hard),
        "soft" => Ok(LineBreak::Soft),
        "no_break" => Ok(LineBreak::NoBreak),
        "default" => Ok(LineBreak::Default),
        other => Err(LoadingError::new(
            path.clone(),
            LoadingErrorKind::UnknownBreak {
                found: other.to_owned(),
            },
        )),
    }
}

fn check_fields(
    map: &serde_json::Map<String, Value>,
    tag: &str,
    allowed: &[&str],
    path: &TreePath,
) -> Result<(), LoadingError> {
    for key in map.keys() {
        if key != tag && !allowed.contains(&key.as_str()) {
            return Err(LoadingError::new(
                path.clone(),
                LoadingErrorKind::UnknownField {
                    tag: tag.to_owned(),
                    field: key.clone(),
                },
            ));
        }
    }
    Ok(())
}

fn as_str<'v>(value: &'v Value, path: &TreePath) -> Result<&'v str, LoadingError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(wrong_type("string", other, path)),
    }
}

fn opt_str(
    map: &serde_json::Map<String, Value>,
    key: &str,
    path: &TreePath,
) -> Result<Option<String>, LoadingError> {
    match map.get(key) {
        Some(value) => Ok(Some(as_str(value, &path.key(key))?.to_owned())),
        None => Ok(None),
    }
}

fn opt_bool(
    map: &serde_json::Map<String, Value>,
    key: &str,
    path: &TreePath,
) -> Result<bool, LoadingError> {
    match map.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(wrong_type("bool", other, &path.key(key))),
        None => Ok(false),
    }
}

fn opt_usize(
    map: &serde_json::Map<String, Value>,
    key: &str,
    path: &TreePath,
) -> Result<Option<usize>, LoadingError> {
    match map.get(key) {
        Some(value) => match value.as_u64() {
            Some(n) => Ok(Some(n as usize)),
            None => Err(wrong_type("non-negative integer", value, &path.key(key))),
        },
        None => Ok(None),
    }
}

fn wrong_type(expected: &'static str, found: &Value, path: &TreePath) -> LoadingError {
    LoadingError::new(
        path.clone(),
        LoadingErrorKind::WrongType {
            expected,
            found: type_name(found),
        },
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_sugar() {
        assert_eq!(load(&json!("INT")).unwrap(), Node::terminal("INT"));
    }

    #[test]
    fn test_list_sugar_with_null() {
        let node = load(&json!(["a", null])).unwrap();
        assert_eq!(
            node,
            Node::sequence(vec![Node::terminal("a"), Node::Skip])
        );
    }

    #[test]
    fn test_tagged_choice() {
        let node = load(&json!({"choice": ["a", {"non_terminal": "b"}], "default": 1})).unwrap();
        assert_eq!(
            node,
            Node::choice(vec![Node::terminal("a"), Node::non_terminal("b")], 1)
        );
    }

    #[test]
    fn test_loop_with_separator() {
        let node = load(&json!({"one_or_more": {"non_terminal": "expr"}, "repeat": ","})).unwrap();
        assert_eq!(
            node,
            Node::one_or_more_sep(Node::non_terminal("expr"), Node::terminal(","))
        );
    }

    #[test]
    fn test_attrs_and_payload() {
        let node = load(&json!({
            "non_terminal": "expr",
            "href": "#expr",
            "title": "expression",
            "resolve": {"page": "grammar"}
        }))
        .unwrap();
        let Node::NonTerminal { attrs, .. } = node else {
            panic!("expected a non-terminal");
        };
        assert_eq!(attrs.href.as_deref(), Some("#expr"));
        assert_eq!(attrs.title.as_deref(), Some("expression"));
        assert_eq!(attrs.payload.get("page").map(String::as_str), Some("grammar"));
    }

    #[test]
    fn test_breaks_list() {
        let node = load(&json!({"sequence": ["a", "b"], "breaks": ["hard"]})).unwrap();
        let Node::Sequence { breaks, .. } = node else {
            panic!("expected a sequence");
        };
        assert_eq!(breaks, Breaks::PerJoin(vec![LineBreak::Hard]));
    }

    #[test]
    fn test_unknown_tag() {
        let err = load(&json!({"wat": 1})).unwrap_err();
        assert_eq!(
            err.kind,
            LoadingErrorKind::UnknownTag { tag: "wat".into() }
        );
    }

    #[test]
    fn test_unknown_field() {
        let err = load(&json!({"terminal": "x", "bogus": 1})).unwrap_err();
        assert_eq!(
            err.kind,
            LoadingErrorKind::UnknownField {
                tag: "terminal".into(),
                field: "bogus".into()
            }
        );
    }

    #[test]
    fn test_wrong_type_has_path() {
        let err = load(&json!({"choice": ["a", 5]})).unwrap_err();
        assert_eq!(err.path.to_string(), "$.choice[1]");
    }

    #[test]
    fn test_breaks_length_checked() {
        let err = load(&json!({"sequence": ["a", "b"], "breaks": ["soft", "soft"]})).unwrap_err();
        assert_eq!(
            err.kind,
            LoadingErrorKind::BreaksLengthMismatch {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_default_out_of_range() {
        let err = load(&json!({"choice": ["a"], "default": 3})).unwrap_err();
        assert_eq!(
            err.kind,
            LoadingErrorKind::BadDefaultIndex { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_repeat_top_with_skip_rejected() {
        let err =
            load(&json!({"zero_or_more": "x", "repeat_top": true, "skip": true})).unwrap_err();
        assert_eq!(err.kind, LoadingErrorKind::InconsistentFlags);
    }
}
