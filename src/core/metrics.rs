use std::collections::HashMap;

use indexmap::IndexMap;
use unicode_width::UnicodeWidthStr;

use crate::errors::EmbedderError;

/// Arithmetic required of a profile's native unit.
///
/// The layout passes run the same algorithms over floating-point pixels
/// (vector back-end) and integer cells (grid back-end); this trait is the
/// seam between them.
pub trait Unit:
    Copy
    + Default
    + PartialOrd
    + std::fmt::Debug
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
{
    /// The additive identity.
    const ZERO: Self;

    /// Halves the value (integer division for cell units).
    fn half(self) -> Self;

    /// Multiplies the value by a count.
    fn scale(self, n: usize) -> Self;

    /// The larger of two values.
    fn max(self, other: Self) -> Self {
        if self < other { other } else { self }
    }

    /// The smaller of two values.
    fn min(self, other: Self) -> Self {
        if other < self { other } else { self }
    }
}

impl Unit for f64 {
    const ZERO: Self = 0.0;

    fn half(self) -> Self {
        self / 2.0
    }

    fn scale(self, n: usize) -> Self {
        self * n as f64
    }
}

impl Unit for i64 {
    const ZERO: Self = 0;

    fn half(self) -> Self {
        self / 2
    }

    fn scale(self, n: usize) -> Self {
        self * n as i64
    }
}

/// Visual style of the diagram's start and end markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndClass {
    /// Double-stroke markers at both ends.
    #[default]
    Complex,
    /// A single perpendicular tick.
    Simple,
}

/// Arrowhead shape drawn on loop return lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrowStyle {
    None,
    #[default]
    Triangle,
    Stealth,
    Barb,
    Harpoon,
    HarpoonUp,
}

/// Which kind of text a measurement or resolution request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Terminal,
    NonTerminal,
    Comment,
    GroupLabel,
}

/// Spacing constants shared by every pass.
#[derive(Debug, Clone)]
pub struct Spacing<U: Unit> {
    /// Horizontal separation between sequence siblings.
    pub horizontal_seq: U,
    /// Vertical separation between choice alternatives.
    pub vertical_choice: U,
    /// Vertical separation between choice alternatives at the top level.
    pub vertical_choice_outer: U,
    /// Vertical separation between stacked rows and loop return lines.
    pub vertical_seq: U,
    /// Vertical separation between stacked rows at the top level.
    pub vertical_seq_outer: U,
    /// Quarter-arc radius.
    pub arc_radius: U,
    /// Extra horizontal margin around choice branch arcs.
    pub arc_margin: U,
}

impl<U: Unit> Spacing<U> {
    /// The vertical choice separation for the given nesting level.
    #[must_use]
    pub fn choice_sep(&self, outer: bool) -> U {
        if outer {
            self.vertical_choice_outer
        } else {
            self.vertical_choice
        }
    }

    /// The vertical sequence separation for the given nesting level.
    #[must_use]
    pub fn seq_sep(&self, outer: bool) -> U {
        if outer {
            self.vertical_seq_outer
        } else {
            self.vertical_seq
        }
    }
}

/// Box constants for one text-bearing node kind.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle<U: Unit> {
    pub horizontal_padding: U,
    pub vertical_padding: U,
    pub radius: U,
}

/// Box constants for groups.
#[derive(Debug, Clone, Copy)]
pub struct GroupStyle<U: Unit> {
    pub vertical_padding: U,
    pub horizontal_padding: U,
    pub vertical_margin: U,
    pub horizontal_margin: U,
    pub radius: U,
    /// Caption offset from the rectangle's left edge.
    pub text_dx: U,
    /// Caption offset above the rectangle's top edge.
    pub text_dy: U,
}

/// A resolved hyperlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Href {
    pub href: String,
    pub title: Option<String>,
}

/// What the engine knows about a node when asking the embedder for a link.
#[derive(Debug)]
pub struct HrefRequest<'a> {
    pub kind: TextKind,
    pub text: &'a str,
    pub payload: &'a IndexMap<String, String>,
}

/// Embedder-injected text measurement.
pub trait TextMeasure<U: Unit> {
    /// Width of `text` in the profile's native unit.
    fn width(&self, kind: TextKind, text: &str) -> Result<U, EmbedderError>;
}

/// Embedder-injected hyperlink resolution.
pub trait HrefResolver {
    /// Maps a node to a URL and optional title; `None` means no link.
    fn resolve(&self, request: &HrefRequest<'_>) -> Result<Option<Href>, EmbedderError>;
}

/// The capability bundle every pass is parameterized by.
pub trait Metrics {
    type Unit: Unit;

    fn spacing(&self) -> &Spacing<Self::Unit>;
    fn text_style(&self, kind: TextKind) -> &TextStyle<Self::Unit>;
    fn group_style(&self) -> &GroupStyle<Self::Unit>;

    /// Glyph height for the given kind.
    fn text_height(&self, kind: TextKind) -> Self::Unit;

    /// Width of the start/end terminus marker.
    fn terminus_width(&self) -> Self::Unit;

    /// Vertical half-extent of the terminus marker strokes.
    fn terminus_half_height(&self) -> Self::Unit;

    /// Vertical space reserved above a group rectangle for its caption.
    fn group_caption_band(&self) -> Self::Unit {
        self.group_style().text_dy + self.text_height(TextKind::GroupLabel)
    }

    /// Advisory maximum diagram width driving the wrapping pass.
    fn max_width(&self) -> Self::Unit;

    fn measure_text(&self, kind: TextKind, text: &str) -> Result<Self::Unit, EmbedderError>;

    /// Resolves a hyperlink for a node; the default resolves nothing.
    fn resolve_href(
        &self,
        request: &HrefRequest<'_>,
    ) -> Result<Option<Href>, EmbedderError> {
        let _ = request;
        Ok(None)
    }
}

/// Heuristic pixel measure assuming a uniform average glyph advance.
///
/// Double-width characters (per Unicode display width) count twice.
#[derive(Debug, Clone, Copy)]
pub struct AverageGlyph {
    pub advance: f64,
}

impl AverageGlyph {
    #[must_use]
    pub fn new(advance: f64) -> Self {
        Self { advance }
    }
}

impl TextMeasure<f64> for AverageGlyph {
    fn width(&self, _kind: TextKind, text: &str) -> Result<f64, EmbedderError> {
        Ok(self.advance * UnicodeWidthStr::width(text) as f64)
    }
}

/// Glyph-table-backed pixel measure for tight text boxes.
///
/// Advances for characters missing from the table fall back to
/// `default_advance`.
#[derive(Debug, Clone)]
pub struct TrueTextMeasure {
    advances: HashMap<char, f64>,
    default_advance: f64,
}

impl TrueTextMeasure {
    #[must_use]
    pub fn new(advances: HashMap<char, f64>, default_advance: f64) -> Self {
        Self {
            advances,
            default_advance,
        }
    }
}

impl TextMeasure<f64> for TrueTextMeasure {
    fn width(&self, _kind: TextKind, text: &str) -> Result<f64, EmbedderError> {
        Ok(text
            .chars()
            .map(|c| self.advances.get(&c).copied().unwrap_or(self.default_advance))
            .sum())
    }
}

/// Display-cell measure used by the character-grid back-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellMeasure;

impl TextMeasure<i64> for CellMeasure {
    fn width(&self, _kind: TextKind, text: &str) -> Result<i64, EmbedderError> {
        Ok(UnicodeWidthStr::width(text) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_arithmetic() {
        assert_eq!(5i64.half(), 2);
        assert_eq!(3i64.scale(4), 12);
        assert_eq!(2.0f64.half(), 1.0);
        assert_eq!(Unit::max(1i64, 3), 3);
        assert_eq!(Unit::min(1i64, 3), 1);
    }

    #[test]
    fn test_average_glyph_counts_wide_chars() {
        let m = AverageGlyph::new(7.0);
        assert_eq!(m.width(TextKind::Terminal, "ab").unwrap(), 14.0);
        // CJK glyphs take two cells.
        assert_eq!(m.width(TextKind::Terminal, "好").unwrap(), 14.0);
    }

    #[test]
    fn test_true_text_measure_fallback() {
        let mut table = HashMap::new();
        table.insert('i', 3.0);
        let m = TrueTextMeasure::new(table, 8.0);
        assert_eq!(m.width(TextKind::Terminal, "ix").unwrap(), 11.0);
    }

    #[test]
    fn test_cell_measure() {
        assert_eq!(CellMeasure.width(TextKind::Comment, "expr").unwrap(), 4);
    }
}
