//! Back-end seam and rendering entry points.
//!
//! Measurement and wrapping are back-end-agnostic; only emission dispatches
//! on a [`Surface`]. The vector canvas emits SVG elements, the grid canvas
//! stamps glyphs; both satisfy the same primitive set.

pub mod svg;
pub mod text;

use tracing::debug;

use crate::core::elem::{Elem, ElemKind, Join, lower, LowerCtx};
use crate::core::loader::load;
use crate::core::measure::{measure, PassCtx};
use crate::core::metrics::{Href, Metrics, Unit};
use crate::core::node::Node;
use crate::core::optimize::optimize;
use crate::core::place::Emitter;
use crate::errors::{EmbedderError, RenderError};

pub use svg::VectorSettings;
pub use text::TextSettings;

/// A quarter arc, named by the box corner it rounds.
///
/// `(x, y)` passed to [`Surface::arc`] is the corner vertex; the two arms
/// extend one radius along the box edges meeting there. `TopLeft` connects
/// east and south (`╭`), `TopRight` west and south (`╮`), `BottomLeft`
/// north and east (`╰`), `BottomRight` north and west (`╯`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// The corner after a horizontal flip.
    #[must_use]
    pub fn mirrored(self) -> Self {
        match self {
            Corner::TopLeft => Corner::TopRight,
            Corner::TopRight => Corner::TopLeft,
            Corner::BottomLeft => Corner::BottomRight,
            Corner::BottomRight => Corner::BottomLeft,
        }
    }
}

/// Direction an arrowhead points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    East,
    West,
}

impl Facing {
    /// The direction after a horizontal flip.
    #[must_use]
    pub fn mirrored(self) -> Self {
        match self {
            Facing::East => Facing::West,
            Facing::West => Facing::East,
        }
    }
}

/// Presentation carried alongside box and text primitives.
#[derive(Debug, Clone, Copy)]
pub struct ShapeStyle<'a> {
    pub class: &'a str,
    pub href: Option<&'a Href>,
}

/// The drawing primitives the emission pass calls, in document order.
///
/// All coordinates are absolute and in the back-end's native unit. Only
/// axis-aligned lines are ever requested. A surface that reverses the
/// diagram flips its own coordinates and directional glyphs; the emission
/// pass stays oblivious.
pub trait Surface {
    type Unit: Unit;

    fn line(&mut self, x1: Self::Unit, y1: Self::Unit, x2: Self::Unit, y2: Self::Unit);

    /// Quarter arc with vertex `(x, y)`; see [`Corner`].
    fn arc(&mut self, x: Self::Unit, y: Self::Unit, r: Self::Unit, corner: Corner);

    fn draw_box(
        &mut self,
        x: Self::Unit,
        y: Self::Unit,
        w: Self::Unit,
        h: Self::Unit,
        radius: Self::Unit,
        style: &ShapeStyle<'_>,
    );

    /// Text centered inside the given rectangle.
    fn text(
        &mut self,
        x: Self::Unit,
        y: Self::Unit,
        w: Self::Unit,
        h: Self::Unit,
        text: &str,
        style: &ShapeStyle<'_>,
    );

    /// Group caption anchored at `(x, y)`; `w` is the measured text width.
    fn group_caption(
        &mut self,
        x: Self::Unit,
        y: Self::Unit,
        w: Self::Unit,
        text: &str,
        style: &ShapeStyle<'_>,
    );

    /// Arrowhead centered at `(x, y)`.
    fn arrow(&mut self, x: Self::Unit, y: Self::Unit, facing: Facing);

    /// Start or end marker whose rail attachment point is `(x, y)`.
    ///
    /// The start marker extends west of the point, the end marker east.
    fn terminus(&mut self, x: Self::Unit, y: Self::Unit, end: bool);

    fn begin_group(&mut self, id: &str);
    fn end_group(&mut self);
}

/// Runs lowering, measurement, optimization, and terminus assembly.
///
/// The result is the fully measured tree the emission pass walks: the
/// diagram proper with a start and end marker joined on either side.
pub(crate) fn layout_pipeline<M: Metrics>(
    node: &Node,
    m: &M,
) -> Result<Elem<M::Unit>, EmbedderError> {
    let mut root = lower(node, LowerCtx::top());
    measure(&mut root, m, PassCtx::root())?;
    optimize(&mut root);
    let mut assembled = Elem::new(ElemKind::Sequence {
        children: vec![
            Elem::new(ElemKind::Terminus { end: false }),
            root,
            Elem::new(ElemKind::Terminus { end: true }),
        ],
        joins: vec![Join::NoBreak; 2],
    });
    measure(&mut assembled, m, PassCtx::root())?;
    debug!(
        width = ?assembled.layout.width,
        up = ?assembled.layout.up,
        down = ?assembled.layout.down,
        "layout complete"
    );
    Ok(assembled)
}

/// Renders a diagram to a complete SVG document.
pub fn render_vector(node: &Node, settings: &VectorSettings) -> Result<String, RenderError> {
    node.validate()?;
    let m = svg::PixelMetrics::new(settings);
    let root = layout_pipeline(node, &m)?;
    let l = root.layout;
    let pad = settings.padding;
    let width = l.width + pad * 2.0;
    let height = l.up + l.down + pad * 2.0;
    let mut canvas = svg::SvgCanvas::new(settings, width, height);
    Emitter::new(&m, &mut canvas, settings.debug).emit(&root, pad, pad + l.up, PassCtx::root())?;
    Ok(canvas.finish())
}

/// Renders a diagram to ASCII art, one grid row per line.
pub fn render_text(node: &Node, settings: &TextSettings) -> Result<String, RenderError> {
    node.validate()?;
    let m = text::GridMetrics::new(settings);
    let root = layout_pipeline(node, &m)?;
    let l = root.layout;
    let mut canvas = text::GridCanvas::new(settings, l.width, l.up + l.down + 1);
    Emitter::new(&m, &mut canvas, settings.debug).emit(&root, 0, l.up, PassCtx::root())?;
    Ok(canvas.finish())
}

/// Renders a diagram given in its data-literal form to SVG.
pub fn render_vector_value(
    value: &serde_json::Value,
    settings: &VectorSettings,
) -> Result<String, RenderError> {
    let node = load(value)?;
    render_vector(&node, settings)
}

/// Renders a diagram given in its data-literal form to ASCII art.
pub fn render_text_value(
    value: &serde_json::Value,
    settings: &TextSettings,
) -> Result<String, RenderError> {
    let node = load(value)?;
    render_text(&node, settings)
}
