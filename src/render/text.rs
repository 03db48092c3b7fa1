use unicode_width::UnicodeWidthChar;

use crate::core::metrics::{
    ArrowStyle, CellMeasure, EndClass, GroupStyle, Metrics, Spacing, TextKind, TextMeasure,
    TextStyle,
};
use crate::errors::EmbedderError;
use crate::render::{Corner, Facing, ShapeStyle, Surface};

/// Configuration of the character-grid back-end.
///
/// Text is measured in display cells; hyperlinks are dropped.
#[derive(Debug, Clone)]
pub struct TextSettings {
    /// Advisory maximum diagram width in cells.
    pub max_width: i64,
    /// Mirror the diagram horizontally.
    pub reverse: bool,
    pub end_class: EndClass,
    /// Only `None` is distinguished; any other style stamps `◂`/`▸`.
    pub arrow_style: ArrowStyle,
    pub horizontal_seq_separation: i64,
    pub vertical_choice_separation: i64,
    pub vertical_choice_separation_outer: i64,
    pub vertical_seq_separation: i64,
    pub vertical_seq_separation_outer: i64,
    pub arc_radius: i64,
    pub arc_margin: i64,
    /// Group caption offset from the rectangle's left edge.
    pub group_text_dx: i64,
    /// Group caption offset above the rectangle's top edge.
    pub group_text_dy: i64,
    /// Collect stable node identifiers during emission.
    pub debug: bool,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            max_width: 80,
            reverse: false,
            end_class: EndClass::Complex,
            arrow_style: ArrowStyle::Triangle,
            horizontal_seq_separation: 2,
            vertical_choice_separation: 1,
            vertical_choice_separation_outer: 1,
            vertical_seq_separation: 1,
            vertical_seq_separation_outer: 1,
            arc_radius: 1,
            arc_margin: 0,
            group_text_dx: 1,
            group_text_dy: 1,
            debug: false,
        }
    }
}

// Single-row glyphs leave no rounded-end allowance, so the pill's breathing
// room comes entirely from the horizontal padding.
const TERMINAL_STYLE: TextStyle<i64> = TextStyle {
    horizontal_padding: 2,
    vertical_padding: 1,
    radius: 1,
};
const NON_TERMINAL_STYLE: TextStyle<i64> = TextStyle {
    horizontal_padding: 2,
    vertical_padding: 1,
    radius: 0,
};
// Comments sit directly on the rail, without a box.
const COMMENT_STYLE: TextStyle<i64> = TextStyle {
    horizontal_padding: 1,
    vertical_padding: 0,
    radius: 0,
};

/// Cell-unit metric profile backed by [`TextSettings`].
pub struct GridMetrics {
    spacing: Spacing<i64>,
    group: GroupStyle<i64>,
    end_class: EndClass,
    max_width: i64,
}

impl GridMetrics {
    #[must_use]
    pub fn new(settings: &TextSettings) -> Self {
        Self {
            spacing: Spacing {
                horizontal_seq: settings.horizontal_seq_separation,
                vertical_choice: settings.vertical_choice_separation,
                vertical_choice_outer: settings.vertical_choice_separation_outer,
                vertical_seq: settings.vertical_seq_separation,
                vertical_seq_outer: settings.vertical_seq_separation_outer,
                arc_radius: settings.arc_radius,
                arc_margin: settings.arc_margin,
            },
            group: GroupStyle {
                vertical_padding: 1,
                horizontal_padding: 2,
                vertical_margin: 0,
                horizontal_margin: 1,
                radius: 0,
                text_dx: settings.group_text_dx,
                text_dy: settings.group_text_dy,
            },
            end_class: settings.end_class,
            max_width: settings.max_width,
        }
    }
}

impl Metrics for GridMetrics {
    type Unit = i64;

    fn spacing(&self) -> &Spacing<i64> {
        &self.spacing
    }

    fn text_style(&self, kind: TextKind) -> &TextStyle<i64> {
        match kind {
            TextKind::Terminal => &TERMINAL_STYLE,
            TextKind::NonTerminal => &NON_TERMINAL_STYLE,
            TextKind::Comment | TextKind::GroupLabel => &COMMENT_STYLE,
        }
    }

    fn group_style(&self) -> &GroupStyle<i64> {
        &self.group
    }

    fn text_height(&self, _kind: TextKind) -> i64 {
        1
    }

    fn terminus_width(&self) -> i64 {
        match self.end_class {
            EndClass::Complex => 2,
            EndClass::Simple => 1,
        }
    }

    fn terminus_half_height(&self) -> i64 {
        0
    }

    // A cell caption occupies exactly the rows of its offset above the
    // rectangle; the continuous ascent reservation does not apply.
    fn group_caption_band(&self) -> i64 {
        self.group.text_dy
    }

    fn max_width(&self) -> i64 {
        self.max_width
    }

    fn measure_text(&self, kind: TextKind, text: &str) -> Result<i64, EmbedderError> {
        CellMeasure.width(kind, text)
    }
}

const N: u8 = 1;
const E: u8 = 2;
const S: u8 = 4;
const W: u8 = 8;

/// Placeholder occupying the second column of a double-width glyph.
const WIDE_FILLER: char = '\0';

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    bits: u8,
    round: bool,
    ch: Option<char>,
}

/// A fixed grid of cells; primitives stamp connection bits that merge at
/// crossings, so a `─` meeting a `│` becomes a `┼`.
pub struct GridCanvas {
    cols: i64,
    rows: i64,
    cells: Vec<Cell>,
    reverse: bool,
    end_class: EndClass,
    arrows: bool,
    debug_ids: Vec<String>,
}

impl GridCanvas {
    #[must_use]
    pub fn new(settings: &TextSettings, width: i64, height: i64) -> Self {
        let cols = width.max(1);
        let rows = height.max(1);
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); (cols * rows) as usize],
            reverse: settings.reverse,
            end_class: settings.end_class,
            arrows: settings.arrow_style != ArrowStyle::None,
            debug_ids: Vec::new(),
        }
    }

    /// Node identifiers collected in debug mode, in document order.
    #[must_use]
    pub fn debug_ids(&self) -> &[String] {
        &self.debug_ids
    }

    /// The grid as newline-joined, right-trimmed rows.
    #[must_use]
    pub fn finish(self) -> String {
        let mut lines = Vec::with_capacity(self.rows as usize);
        for row in 0..self.rows {
            let mut line = String::new();
            for col in 0..self.cols {
                let cell = self.cells[(row * self.cols + col) as usize];
                match cell.ch {
                    Some(WIDE_FILLER) => {}
                    Some(ch) => line.push(ch),
                    None => line.push(glyph(cell.bits, cell.round)),
                }
            }
            lines.push(line.trim_end().to_owned());
        }
        lines.join("\n")
    }

    fn fx(&self, x: i64) -> i64 {
        if self.reverse { self.cols - 1 - x } else { x }
    }

    fn mark(&mut self, x: i64, y: i64, bits: u8) {
        if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
            debug_assert!(false, "stamp out of bounds: ({x}, {y})");
            return;
        }
        self.cells[(y * self.cols + x) as usize].bits |= bits;
    }

    fn set_round(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
            return;
        }
        self.cells[(y * self.cols + x) as usize].round = true;
    }

    fn put_char(&mut self, x: i64, y: i64, ch: char) {
        if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
            debug_assert!(false, "char out of bounds: ({x}, {y})");
            return;
        }
        self.cells[(y * self.cols + x) as usize].ch = Some(ch);
    }

    /// Horizontal run of cells `x1..=x2`; the end cells carry only the
    /// inward-facing half so junctions at segment boundaries stay clean.
    fn hseg(&mut self, x1: i64, x2: i64, y: i64) {
        if x2 <= x1 {
            return;
        }
        for x in x1..=x2 {
            let mut bits = 0;
            if x > x1 {
                bits |= W;
            }
            if x < x2 {
                bits |= E;
            }
            self.mark(x, y, bits);
        }
    }

    fn vseg(&mut self, x: i64, y1: i64, y2: i64) {
        if y2 <= y1 {
            return;
        }
        for y in y1..=y2 {
            let mut bits = 0;
            if y > y1 {
                bits |= N;
            }
            if y < y2 {
                bits |= S;
            }
            self.mark(x, y, bits);
        }
    }

    fn stamp_text(&mut self, x: i64, y: i64, text: &str) {
        let mut col = x;
        for ch in text.chars() {
            let width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1) as i64;
            self.put_char(col, y, ch);
            if width == 2 {
                self.put_char(col + 1, y, WIDE_FILLER);
            }
            col += width;
        }
    }
}

impl Surface for GridCanvas {
    type Unit = i64;

    fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64) {
        if y1 == y2 {
            let (x1, x2) = (self.fx(x1), self.fx(x2));
            self.hseg(x1.min(x2), x1.max(x2), y1);
        } else if x1 == x2 {
            self.vseg(self.fx(x1), y1.min(y2), y1.max(y2));
        } else {
            debug_assert!(false, "diagonal line requested");
        }
    }

    fn arc(&mut self, x: i64, y: i64, r: i64, corner: Corner) {
        let corner = if self.reverse { corner.mirrored() } else { corner };
        let x = self.fx(x);
        let (bits, ex, sy) = match corner {
            Corner::TopLeft => (E | S, 1, 1),
            Corner::TopRight => (W | S, -1, 1),
            Corner::BottomLeft => (N | E, 1, -1),
            Corner::BottomRight => (N | W, -1, -1),
        };
        self.mark(x, y, bits);
        self.set_round(x, y);
        // Arms reach one radius along each edge; the far cells carry only
        // the half pointing back at the vertex.
        for i in 1..=r {
            let mut b = if ex > 0 { W } else { E };
            if i < r {
                b |= if ex > 0 { E } else { W };
            }
            self.mark(x + ex * i, y, b);
        }
        for i in 1..=r {
            let mut b = if sy > 0 { N } else { S };
            if i < r {
                b |= if sy > 0 { S } else { N };
            }
            self.mark(x, y + sy * i, b);
        }
    }

    fn draw_box(&mut self, x: i64, y: i64, w: i64, h: i64, radius: i64, style: &ShapeStyle<'_>) {
        if w <= 0 || h <= 0 {
            return;
        }
        let x = if self.reverse { self.cols - x - w } else { x };
        let (x2, y2) = (x + w - 1, y + h);
        let round = radius > 0;
        self.mark(x, y, E | S);
        self.mark(x2, y, W | S);
        self.mark(x, y2, E | N);
        self.mark(x2, y2, W | N);
        if round {
            self.set_round(x, y);
            self.set_round(x2, y);
            self.set_round(x, y2);
            self.set_round(x2, y2);
        }
        for cx in x + 1..x2 {
            self.mark(cx, y, W | E);
            self.mark(cx, y2, W | E);
        }
        for cy in y + 1..y2 {
            self.mark(x, cy, N | S);
            self.mark(x2, cy, N | S);
        }
        // Text boxes stop the rail at their border; stamp the junction arms
        // where it attaches. Group rectangles are crossed by the rail
        // instead, and the bit merge produces the crossing on its own.
        let group = style.class == "group" || style.class.starts_with("group ");
        if !group {
            let mid = y + h / 2;
            self.mark(x, mid, W);
            self.mark(x2, mid, E);
        }
    }

    fn text(&mut self, x: i64, y: i64, w: i64, h: i64, text: &str, _style: &ShapeStyle<'_>) {
        let x = if self.reverse { self.cols - x - w } else { x };
        let width = CellMeasure
            .width(TextKind::Terminal, text)
            .unwrap_or_default();
        let start = x + (w - width) / 2;
        let row = y + h / 2;
        if h == 0 {
            // Text sitting directly on the rail keeps a space on each side.
            self.put_char(start - 1, row, ' ');
            self.put_char(start + width, row, ' ');
        }
        self.stamp_text(start, row, text);
    }

    fn group_caption(&mut self, x: i64, y: i64, w: i64, text: &str, _style: &ShapeStyle<'_>) {
        let x = if self.reverse { self.cols - x - w } else { x };
        self.stamp_text(x, y, text);
    }

    fn arrow(&mut self, x: i64, y: i64, facing: Facing) {
        if !self.arrows {
            return;
        }
        let facing = if self.reverse { facing.mirrored() } else { facing };
        let glyph = match facing {
            Facing::West => '◂',
            Facing::East => '▸',
        };
        self.put_char(self.fx(x), y, glyph);
    }

    fn terminus(&mut self, x: i64, y: i64, end: bool) {
        let end = if self.reverse { !end } else { end };
        // The attachment point is a boundary, not a cell; the marker lies
        // entirely on one side of it.
        let x = if self.reverse { self.cols - x } else { x };
        match (self.end_class, end) {
            (EndClass::Complex, false) => {
                self.put_char(x - 2, y, '┤');
                self.put_char(x - 1, y, '├');
            }
            (EndClass::Complex, true) => {
                self.put_char(x, y, '┤');
                self.put_char(x + 1, y, '├');
            }
            (EndClass::Simple, false) => self.put_char(x - 1, y, '├'),
            (EndClass::Simple, true) => self.put_char(x, y, '┤'),
        }
    }

    fn begin_group(&mut self, id: &str) {
        self.debug_ids.push(id.to_owned());
    }

    fn end_group(&mut self) {}
}

fn glyph(bits: u8, round: bool) -> char {
    let n = bits & N != 0;
    let e = bits & E != 0;
    let s = bits & S != 0;
    let w = bits & W != 0;
    match (n, e, s, w) {
        (false, false, false, false) => ' ',
        (_, false, _, false) => '│',
        (false, _, false, _) => '─',
        (false, true, true, false) => {
            if round { '╭' } else { '┌' }
        }
        (false, false, true, true) => {
            if round { '╮' } else { '┐' }
        }
        (true, true, false, false) => {
            if round { '╰' } else { '└' }
        }
        (true, false, false, true) => {
            if round { '╯' } else { '┘' }
        }
        (true, true, true, false) => '├',
        (true, false, true, true) => '┤',
        (false, true, true, true) => '┬',
        (true, true, false, true) => '┴',
        (true, true, true, true) => '┼',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_table() {
        assert_eq!(glyph(N | S, false), '│');
        assert_eq!(glyph(E, false), '─');
        assert_eq!(glyph(E | S, true), '╭');
        assert_eq!(glyph(E | S, false), '┌');
        assert_eq!(glyph(N | E | S, false), '├');
        assert_eq!(glyph(N | E | S | W, true), '┼');
        assert_eq!(glyph(E | S | W, false), '┬');
    }

    #[test]
    fn test_crossing_merges() {
        let mut c = GridCanvas::new(&TextSettings::default(), 5, 3);
        c.line(0, 1, 4, 1);
        c.line(2, 0, 2, 2);
        let out = c.finish();
        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows[1], "──┼──");
    }

    #[test]
    fn test_segment_ends_are_half_connected() {
        let mut c = GridCanvas::new(&TextSettings::default(), 4, 1);
        c.line(1, 0, 2, 0);
        // End cells still render as plain rail.
        assert_eq!(c.finish(), " ──");
    }

    #[test]
    fn test_rounded_box() {
        let mut c = GridCanvas::new(&TextSettings::default(), 5, 3);
        c.draw_box(
            0,
            0,
            5,
            2,
            1,
            &ShapeStyle {
                class: "terminal",
                href: None,
            },
        );
        let out = c.finish();
        assert_eq!(out, "╭───╮\n┤   ├\n╰───╯");
    }

    #[test]
    fn test_group_box_has_no_junction_arms() {
        let mut c = GridCanvas::new(&TextSettings::default(), 5, 3);
        c.draw_box(
            0,
            0,
            5,
            2,
            0,
            &ShapeStyle {
                class: "group",
                href: None,
            },
        );
        let out = c.finish();
        assert_eq!(out, "┌───┐\n│   │\n└───┘");
    }

    #[test]
    fn test_wide_characters_take_two_cells() {
        let mut c = GridCanvas::new(&TextSettings::default(), 4, 1);
        c.stamp_text(0, 0, "好a");
        assert_eq!(c.finish(), "好a");
    }

    #[test]
    fn test_terminus_glyphs() {
        let mut c = GridCanvas::new(&TextSettings::default(), 6, 1);
        c.terminus(2, 0, false);
        c.terminus(4, 0, true);
        assert_eq!(c.finish(), "┤├  ┤├");
    }
}
