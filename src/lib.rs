//! Syntax-diagram (railroad-diagram) rendering.
//!
//! The crate turns a declarative tree of combinators — terminals,
//! non-terminals, sequences, choices, loops, optionals, groups — into a
//! complete drawing on one of two back-ends: a scalable vector document or
//! a character grid. The layout engine wraps long sequences against an
//! advisory maximum width, routes arcs and connectors, and merges adjacent
//! skip rails where a [`Node::Barrier`] does not forbid it.
//!
//! ```
//! use railviz::{Node, TextSettings, render_text};
//!
//! let diagram = Node::sequence(vec![
//!     Node::optional(Node::terminal("DISTINCT")),
//!     Node::non_terminal("expr"),
//! ]);
//! let drawing = render_text(&diagram, &TextSettings::default()).unwrap();
//! assert!(drawing.contains("DISTINCT"));
//! ```
//!
//! Rendering is a pure function of the input tree and the settings; there
//! is no shared state and renders may run concurrently on separate
//! settings instances.

pub mod core;
pub mod errors;
pub mod render;

pub use crate::core::loader::load;
pub use crate::core::metrics::{
    ArrowStyle, AverageGlyph, CellMeasure, EndClass, Href, HrefRequest, HrefResolver, TextKind,
    TextMeasure, TrueTextMeasure,
};
pub use crate::core::node::{Breaks, LineBreak, Node, NodeAttrs};
pub use crate::errors::{EmbedderError, LoadingError, LoadingErrorKind, RenderError};
pub use crate::render::{
    TextSettings, VectorSettings, render_text, render_text_value, render_vector,
    render_vector_value,
};
