use crate::core::metrics::{TextKind, Unit};
use crate::core::node::{Breaks, LineBreak, Node, NodeAttrs};

/// A break hint after `Default` resolution; what the wrapping pass consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Join {
    Hard,
    Soft,
    NoBreak,
}

/// Which side of the main line a bypass rail runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Top,
    Bottom,
}

/// Transient geometry attached to every lowered node.
///
/// `up` and `down` are extents above and below the entry line; `drop` is
/// how far below the entry line the exit connector sits (nonzero only for
/// stack-shaped nodes).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Layout<U: Unit> {
    pub width: U,
    pub up: U,
    pub down: U,
    pub drop: U,
}

/// A node of the canonical lowered tree.
///
/// `Optional` and `ZeroOrMore` are gone by this point (lowered to choices
/// and loops), so the later passes dispatch over these variants only.
#[derive(Debug, Clone)]
pub(crate) struct Elem<U: Unit> {
    pub kind: ElemKind<U>,
    pub layout: Layout<U>,
}

#[derive(Debug, Clone)]
pub(crate) enum ElemKind<U: Unit> {
    Skip,
    Text {
        kind: TextKind,
        text: String,
        attrs: NodeAttrs,
    },
    Sequence {
        children: Vec<Elem<U>>,
        joins: Vec<Join>,
    },
    Stack {
        rows: Vec<Elem<U>>,
    },
    Choice {
        alts: Vec<Elem<U>>,
        default: usize,
    },
    Loop {
        body: Box<Elem<U>>,
        repeat: Box<Elem<U>>,
        repeat_top: bool,
    },
    /// A fused run of same-side bypasses produced by the optimization pass.
    Bypass {
        items: Vec<Elem<U>>,
        side: Side,
    },
    Barrier(Box<Elem<U>>),
    Group {
        child: Box<Elem<U>>,
        caption: Option<String>,
        attrs: NodeAttrs,
    },
    /// Start or end marker, attached around the root during emission setup.
    Terminus {
        end: bool,
    },
}

impl<U: Unit> Elem<U> {
    pub(crate) fn new(kind: ElemKind<U>) -> Self {
        Self {
            kind,
            layout: Layout::default(),
        }
    }

    fn skip() -> Self {
        Self::new(ElemKind::Skip)
    }
}

/// Context threaded through lowering.
///
/// `in_island` is true inside a choice alternative or a loop, where
/// `Default` break hints resolve to `NoBreak` instead of `Soft`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LowerCtx {
    pub in_island: bool,
}

impl LowerCtx {
    pub(crate) fn top() -> Self {
        Self { in_island: false }
    }

    fn island() -> Self {
        Self { in_island: true }
    }
}

/// Lowers the public tree into the canonical variant set.
///
/// Sugar collapses here as well: an empty sequence or stack becomes `Skip`,
/// a one-element sequence or stack becomes its only member.
pub(crate) fn lower<U: Unit>(node: &Node, ctx: LowerCtx) -> Elem<U> {
    match node {
        Node::Skip => Elem::skip(),
        Node::Terminal { text, attrs } => text_elem(TextKind::Terminal, text, attrs),
        Node::NonTerminal { text, attrs } => text_elem(TextKind::NonTerminal, text, attrs),
        Node::Comment { text, attrs } => text_elem(TextKind::Comment, text, attrs),
        Node::Sequence { children, breaks } => lower_sequence(children, breaks, ctx),
        Node::Stack { children } => match children.len() {
            0 => Elem::skip(),
            1 => lower(&children[0], ctx),
            _ => Elem::new(ElemKind::Stack {
                rows: children.iter().map(|c| lower(c, ctx)).collect(),
            }),
        },
        Node::Choice { children, default } => Elem::new(ElemKind::Choice {
            alts: children
                .iter()
                .map(|c| lower(c, LowerCtx::island()))
                .collect(),
            default: *default,
        }),
        Node::Optional {
            child,
            skip,
            skip_bottom,
        } => lower_optional(lower(child, LowerCtx::island()), *skip, *skip_bottom),
        Node::OneOrMore {
            body,
            repeat,
            repeat_top,
        } => lower_loop(body, repeat, *repeat_top),
        Node::ZeroOrMore {
            body,
            repeat,
            repeat_top,
            skip,
            skip_bottom,
        } => lower_optional(lower_loop(body, repeat, *repeat_top), *skip, *skip_bottom),
        Node::Barrier(child) => Elem::new(ElemKind::Barrier(Box::new(lower(child, ctx)))),
        Node::Group { child, text, attrs } => Elem::new(ElemKind::Group {
            child: Box::new(lower(child, ctx)),
            caption: text.clone(),
            attrs: attrs.clone(),
        }),
    }
}

fn text_elem<U: Unit>(kind: TextKind, text: &str, attrs: &NodeAttrs) -> Elem<U> {
    Elem::new(ElemKind::Text {
        kind,
        text: text.to_owned(),
        attrs: attrs.clone(),
    })
}

fn lower_sequence<U: Unit>(children: &[Node], breaks: &Breaks, ctx: LowerCtx) -> Elem<U> {
    match children.len() {
        0 => return Elem::skip(),
        1 => return lower(&children[0], ctx),
        _ => {}
    }
    let joins = (0..children.len() - 1)
        .map(|i| {
            let hint = match breaks {
                Breaks::Uniform(b) => *b,
                Breaks::PerJoin(joins) => joins[i],
            };
            match hint {
                LineBreak::Hard => Join::Hard,
                LineBreak::Soft => Join::Soft,
                LineBreak::NoBreak => Join::NoBreak,
                LineBreak::Default if ctx.in_island => Join::NoBreak,
                LineBreak::Default => Join::Soft,
            }
        })
        .collect();
    Elem::new(ElemKind::Sequence {
        children: children.iter().map(|c| lower(c, ctx)).collect(),
        joins,
    })
}

/// `Optional` lowering table.
///
/// The default alternative of the produced choice is the branch on the main
/// line; the skip rail takes the other side.
fn lower_optional<U: Unit>(child: Elem<U>, skip: bool, skip_bottom: bool) -> Elem<U> {
    let (alts, default) = if skip_bottom {
        // Skip rail below the main line.
        (vec![child, Elem::skip()], if skip { 1 } else { 0 })
    } else {
        // Skip rail above the main line.
        (vec![Elem::skip(), child], if skip { 0 } else { 1 })
    };
    Elem::new(ElemKind::Choice { alts, default })
}

fn lower_loop<U: Unit>(body: &Node, repeat: &Node, repeat_top: bool) -> Elem<U> {
    Elem::new(ElemKind::Loop {
        body: Box::new(lower(body, LowerCtx::island())),
        repeat: Box::new(lower(repeat, LowerCtx::island())),
        repeat_top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::Node;

    fn lower64(node: &Node) -> Elem<i64> {
        lower(node, LowerCtx::top())
    }

    #[test]
    fn test_empty_sequence_is_skip() {
        assert!(matches!(
            lower64(&Node::sequence(vec![])).kind,
            ElemKind::Skip
        ));
    }

    #[test]
    fn test_singleton_sequence_collapses() {
        let elem = lower64(&Node::sequence(vec![Node::terminal("a")]));
        assert!(matches!(elem.kind, ElemKind::Text { .. }));
    }

    #[test]
    fn test_optional_lowering_sides() {
        // Default flags: skip rail above, child on the main line.
        let elem = lower64(&Node::optional(Node::terminal("a")));
        let ElemKind::Choice { alts, default } = &elem.kind else {
            panic!("expected a choice");
        };
        assert_eq!(*default, 1);
        assert!(matches!(alts[0].kind, ElemKind::Skip));
        assert!(matches!(alts[1].kind, ElemKind::Text { .. }));

        // skip_bottom flips the rail below.
        let elem = lower64(&Node::Optional {
            child: Box::new(Node::terminal("a")),
            skip: false,
            skip_bottom: true,
        });
        let ElemKind::Choice { alts, default } = &elem.kind else {
            panic!("expected a choice");
        };
        assert_eq!(*default, 0);
        assert!(matches!(alts[1].kind, ElemKind::Skip));
    }

    #[test]
    fn test_zero_or_more_lowering() {
        let elem = lower64(&Node::zero_or_more_sep(
            Node::non_terminal("expr"),
            Node::terminal(","),
        ));
        let ElemKind::Choice { alts, default } = &elem.kind else {
            panic!("expected a choice");
        };
        assert_eq!(*default, 1);
        assert!(matches!(alts[1].kind, ElemKind::Loop { .. }));
    }

    #[test]
    fn test_default_breaks_resolve_by_context() {
        let seq = Node::sequence(vec![Node::terminal("a"), Node::terminal("b")]);
        let ElemKind::Sequence { joins, .. } = lower64(&seq).kind else {
            panic!("expected a sequence");
        };
        assert_eq!(joins, vec![Join::Soft]);

        let inside = Node::choice(vec![seq], 0);
        let ElemKind::Choice { alts, .. } = lower64(&inside).kind else {
            panic!("expected a choice");
        };
        let ElemKind::Sequence { joins, .. } = &alts[0].kind else {
            panic!("expected a sequence");
        };
        assert_eq!(joins, &[Join::NoBreak]);
    }

    #[test]
    fn test_barrier_wraps_child() {
        let elem = lower64(&Node::barrier(Node::terminal("a")));
        let ElemKind::Barrier(child) = &elem.kind else {
            panic!("expected a barrier");
        };
        assert!(matches!(child.kind, ElemKind::Text { .. }));
    }
}
