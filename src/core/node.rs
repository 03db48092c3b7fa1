use indexmap::IndexMap;

use crate::errors::{LoadingError, LoadingErrorKind, TreePath};

/// Presentation attributes shared by text-bearing nodes.
///
/// `payload` is an opaque, order-preserving map handed to the embedder's
/// href resolver; the engine never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAttrs {
    /// Explicit hyperlink target, if any.
    pub href: Option<String>,
    /// Tooltip title attached to the hyperlink.
    pub title: Option<String>,
    /// Extra CSS class emitted on the shape (vector back-end only).
    pub css_class: Option<String>,
    /// Opaque data forwarded to the href resolver.
    pub payload: IndexMap<String, String>,
}

/// Break hint attached to the join between two sequence children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    /// Always broken.
    Hard,
    /// Broken when the running width exceeds the advisory maximum.
    Soft,
    /// Never broken.
    NoBreak,
    /// `Soft` at the top level, `NoBreak` inside a choice, loop, or
    /// already-wrapped line.
    #[default]
    Default,
}

/// Break hints for a sequence: one scalar applied to every join, or one
/// entry per join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Breaks {
    /// The same hint on every join.
    Uniform(LineBreak),
    /// One hint per join; must have length `children - 1`.
    PerJoin(Vec<LineBreak>),
}

impl Default for Breaks {
    fn default() -> Self {
        Self::Uniform(LineBreak::Default)
    }
}

/// A syntax-diagram combinator tree.
///
/// This is the tree the render entry points consume. It can be built
/// directly with the constructors below or loaded from its data-literal
/// form by [`crate::core::loader::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A bare horizontal line.
    Skip,
    /// A literal token, drawn as a pill-shaped box.
    Terminal { text: String, attrs: NodeAttrs },
    /// A rule reference, drawn as a rectangular box.
    NonTerminal { text: String, attrs: NodeAttrs },
    /// A low-profile caption.
    Comment { text: String, attrs: NodeAttrs },
    /// Horizontal concatenation with per-join break hints.
    Sequence { children: Vec<Node>, breaks: Breaks },
    /// Vertical concatenation; rows are connected by return arcs.
    Stack { children: Vec<Node> },
    /// One of several alternatives; the default sits on the main line.
    Choice { children: Vec<Node>, default: usize },
    /// An element that may be skipped via a bypass rail.
    ///
    /// `skip` puts the main line on the bypass (the child bulges off it);
    /// `skip_bottom` routes the bypass rail below instead of above.
    Optional {
        child: Box<Node>,
        skip: bool,
        skip_bottom: bool,
    },
    /// A forward path through `body` with a backward return path carrying
    /// `repeat`; `repeat_top` places the return line above the body.
    OneOrMore {
        body: Box<Node>,
        repeat: Box<Node>,
        repeat_top: bool,
    },
    /// `Optional(OneOrMore(body, repeat))` with the same skip flags.
    ZeroOrMore {
        body: Box<Node>,
        repeat: Box<Node>,
        repeat_top: bool,
        skip: bool,
        skip_bottom: bool,
    },
    /// Transparent at render time; opaque to the optimization pass.
    Barrier(Box<Node>),
    /// A captioned rectangle around a sub-diagram.
    Group {
        child: Box<Node>,
        text: Option<String>,
        attrs: NodeAttrs,
    },
}

impl Node {
    /// Creates a terminal node.
    #[must_use]
    pub fn terminal(text: impl Into<String>) -> Node {
        Node::Terminal {
            text: text.into(),
            attrs: NodeAttrs::default(),
        }
    }

    /// Creates a non-terminal node.
    #[must_use]
    pub fn non_terminal(text: impl Into<String>) -> Node {
        Node::NonTerminal {
            text: text.into(),
            attrs: NodeAttrs::default(),
        }
    }

    /// Creates a comment node.
    #[must_use]
    pub fn comment(text: impl Into<String>) -> Node {
        Node::Comment {
            text: text.into(),
            attrs: NodeAttrs::default(),
        }
    }

    /// Creates a sequence with default break hints.
    #[must_use]
    pub fn sequence(children: Vec<Node>) -> Node {
        Node::Sequence {
            children,
            breaks: Breaks::default(),
        }
    }

    /// Creates a sequence with explicit per-join break hints.
    #[must_use]
    pub fn sequence_with_breaks(children: Vec<Node>, breaks: Breaks) -> Node {
        Node::Sequence { children, breaks }
    }

    /// Creates a stack of rows.
    #[must_use]
    pub fn stack(children: Vec<Node>) -> Node {
        Node::Stack { children }
    }

    /// Creates a choice whose `default`-th alternative sits on the main line.
    #[must_use]
    pub fn choice(children: Vec<Node>, default: usize) -> Node {
        Node::Choice { children, default }
    }

    /// Creates an optional element with the bypass rail above.
    #[must_use]
    pub fn optional(child: Node) -> Node {
        Node::Optional {
            child: Box::new(child),
            skip: false,
            skip_bottom: false,
        }
    }

    /// Creates a one-or-more loop with a bare return line.
    #[must_use]
    pub fn one_or_more(body: Node) -> Node {
        Node::one_or_more_sep(body, Node::Skip)
    }

    /// Creates a one-or-more loop carrying `repeat` on the return line.
    #[must_use]
    pub fn one_or_more_sep(body: Node, repeat: Node) -> Node {
        Node::OneOrMore {
            body: Box::new(body),
            repeat: Box::new(repeat),
            repeat_top: false,
        }
    }

    /// Creates a zero-or-more loop with a bare return line.
    #[must_use]
    pub fn zero_or_more(body: Node) -> Node {
        Node::zero_or_more_sep(body, Node::Skip)
    }

    /// Creates a zero-or-more loop carrying `repeat` on the return line.
    #[must_use]
    pub fn zero_or_more_sep(body: Node, repeat: Node) -> Node {
        Node::ZeroOrMore {
            body: Box::new(body),
            repeat: Box::new(repeat),
            repeat_top: false,
            skip: false,
            skip_bottom: false,
        }
    }

    /// Creates a barrier around `child`.
    #[must_use]
    pub fn barrier(child: Node) -> Node {
        Node::Barrier(Box::new(child))
    }

    /// Creates a captioned group around `child`.
    #[must_use]
    pub fn group(child: Node, text: impl Into<String>) -> Node {
        Node::Group {
            child: Box::new(child),
            text: Some(text.into()),
            attrs: NodeAttrs::default(),
        }
    }

    /// Checks every structural invariant the render pipeline relies on.
    ///
    /// The loader performs the same checks while reading the data-literal
    /// form; trees built in code go through this before rendering.
    pub fn validate(&self) -> Result<(), LoadingError> {
        self.validate_at(&TreePath::root())
    }

    fn validate_at(&self, path: &TreePath) -> Result<(), LoadingError> {
        match self {
            Node::Skip => Ok(()),
            Node::Terminal { text, .. }
            | Node::NonTerminal { text, .. }
            | Node::Comment { text, .. } => validate_text(text, path),
            Node::Sequence { children, breaks } => {
                if let Breaks::PerJoin(joins) = breaks {
                    let expected = children.len().saturating_sub(1);
                    if joins.len() != expected {
                        return Err(LoadingError::new(
                            path.key("breaks"),
                            LoadingErrorKind::BreaksLengthMismatch {
                                expected,
                                found: joins.len(),
                            },
                        ));
                    }
                }
                for (i, child) in children.iter().enumerate() {
                    child.validate_at(&path.index(i))?;
                }
                Ok(())
            }
            Node::Stack { children } => {
                for (i, child) in children.iter().enumerate() {
                    child.validate_at(&path.index(i))?;
                }
                Ok(())
            }
            Node::Choice { children, default } => {
                if *default >= children.len() {
                    return Err(LoadingError::new(
                        path.key("default"),
                        LoadingErrorKind::BadDefaultIndex {
                            index: *default,
                            len: children.len(),
                        },
                    ));
                }
                for (i, child) in children.iter().enumerate() {
                    child.validate_at(&path.index(i))?;
                }
                Ok(())
            }
            Node::Optional { child, .. } | Node::Barrier(child) => {
                child.validate_at(&path.index(0))
            }
            Node::OneOrMore { body, repeat, .. } => {
                body.validate_at(&path.key("body"))?;
                repeat.validate_at(&path.key("repeat"))
            }
            Node::ZeroOrMore {
                body,
                repeat,
                repeat_top,
                skip,
                ..
            } => {
                if *repeat_top && *skip {
                    return Err(LoadingError::new(
                        path.key("repeat_top"),
                        LoadingErrorKind::InconsistentFlags,
                    ));
                }
                body.validate_at(&path.key("body"))?;
                repeat.validate_at(&path.key("repeat"))
            }
            Node::Group { child, text, .. } => {
                if let Some(text) = text {
                    validate_text(text, path)?;
                }
                child.validate_at(&path.index(0))
            }
        }
    }
}

fn validate_text(text: &str, path: &TreePath) -> Result<(), LoadingError> {
    if text.is_empty() {
        return Err(LoadingError::new(
            path.clone(),
            LoadingErrorKind::EmptyField { field: "text" },
        ));
    }
    if text.contains('\n') || text.contains('\r') {
        return Err(LoadingError::new(
            path.clone(),
            LoadingErrorKind::MultilineText,
        ));
    }
    Ok(())
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::terminal(text)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::terminal(text)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::sequence(children)
    }
}
