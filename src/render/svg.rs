use crate::core::metrics::{
    ArrowStyle, AverageGlyph, EndClass, GroupStyle, Href, HrefRequest, HrefResolver, Metrics,
    Spacing, TextKind, TextMeasure, TextStyle,
};
use crate::errors::EmbedderError;
use crate::render::{Corner, Facing, ShapeStyle, Surface};

/// Stylesheet embedded in the output unless the caller overrides it.
pub const DEFAULT_CSS: &str = "\
svg.railroad-diagram { background-color: white; }
svg.railroad-diagram path { stroke: black; stroke-width: 2; fill: none; }
svg.railroad-diagram path.arrow { fill: black; }
svg.railroad-diagram rect { stroke: black; stroke-width: 2; fill: none; }
svg.railroad-diagram rect.group { stroke-dasharray: 6 4; }
svg.railroad-diagram text { font: 14px monospace; text-anchor: middle; }
svg.railroad-diagram text.comment { font-style: italic; }
svg.railroad-diagram text.group-caption { text-anchor: start; font-style: italic; }
";

/// Configuration of the vector back-end.
///
/// Every field has a named default; construct with `..Default::default()`.
pub struct VectorSettings {
    /// Advisory maximum diagram width in pixels.
    pub max_width: f64,
    /// Mirror the diagram horizontally.
    pub reverse: bool,
    pub end_class: EndClass,
    /// Document `<title>`.
    pub title: Option<String>,
    /// Document `<desc>`.
    pub description: Option<String>,
    /// Extra class on the root `<svg>` element.
    pub css_class: Option<String>,
    /// Embedded stylesheet; `None` drops the `<style>` element entirely.
    pub css_style: Option<String>,
    /// Whitespace around the whole drawing.
    pub padding: f64,
    /// Glyph height assumed by text centering.
    pub char_height: f64,
    pub arc_radius: f64,
    pub arc_margin: f64,
    pub arrow_style: ArrowStyle,
    pub arrow_length: f64,
    pub arrow_cross_length: f64,
    pub horizontal_seq_separation: f64,
    pub vertical_choice_separation: f64,
    pub vertical_choice_separation_outer: f64,
    pub vertical_seq_separation: f64,
    pub vertical_seq_separation_outer: f64,
    pub terminal: TextStyle<f64>,
    pub non_terminal: TextStyle<f64>,
    pub comment: TextStyle<f64>,
    pub group: GroupStyle<f64>,
    /// Injected text measurement; the default assumes an average glyph.
    pub text_measure: Box<dyn TextMeasure<f64>>,
    /// Injected hyperlink resolution; the default resolves nothing.
    pub href_resolver: Option<Box<dyn HrefResolver>>,
    /// Tag emitted node groups with stable identifiers.
    pub debug: bool,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            max_width: 600.0,
            reverse: false,
            end_class: EndClass::Complex,
            title: None,
            description: None,
            css_class: None,
            css_style: Some(DEFAULT_CSS.to_owned()),
            padding: 8.0,
            char_height: 14.0,
            arc_radius: 10.0,
            arc_margin: 0.0,
            arrow_style: ArrowStyle::Triangle,
            arrow_length: 8.0,
            arrow_cross_length: 5.0,
            horizontal_seq_separation: 12.0,
            vertical_choice_separation: 8.0,
            vertical_choice_separation_outer: 12.0,
            vertical_seq_separation: 12.0,
            vertical_seq_separation_outer: 18.0,
            terminal: TextStyle {
                horizontal_padding: 8.0,
                vertical_padding: 5.0,
                radius: 12.0,
            },
            non_terminal: TextStyle {
                horizontal_padding: 10.0,
                vertical_padding: 5.0,
                radius: 0.0,
            },
            comment: TextStyle {
                horizontal_padding: 4.0,
                vertical_padding: 3.0,
                radius: 0.0,
            },
            group: GroupStyle {
                vertical_padding: 10.0,
                horizontal_padding: 12.0,
                vertical_margin: 6.0,
                horizontal_margin: 8.0,
                radius: 6.0,
                text_dx: 4.0,
                text_dy: 6.0,
            },
            text_measure: Box::new(AverageGlyph::new(8.4)),
            href_resolver: None,
            debug: false,
        }
    }
}

/// Pixel-unit metric profile backed by [`VectorSettings`].
pub struct PixelMetrics<'a> {
    settings: &'a VectorSettings,
    spacing: Spacing<f64>,
}

impl<'a> PixelMetrics<'a> {
    #[must_use]
    pub fn new(settings: &'a VectorSettings) -> Self {
        Self {
            settings,
            spacing: Spacing {
                horizontal_seq: settings.horizontal_seq_separation,
                vertical_choice: settings.vertical_choice_separation,
                vertical_choice_outer: settings.vertical_choice_separation_outer,
                vertical_seq: settings.vertical_seq_separation,
                vertical_seq_outer: settings.vertical_seq_separation_outer,
                arc_radius: settings.arc_radius,
                arc_margin: settings.arc_margin,
            },
        }
    }
}

impl Metrics for PixelMetrics<'_> {
    type Unit = f64;

    fn spacing(&self) -> &Spacing<f64> {
        &self.spacing
    }

    fn text_style(&self, kind: TextKind) -> &TextStyle<f64> {
        match kind {
            TextKind::Terminal => &self.settings.terminal,
            TextKind::NonTerminal => &self.settings.non_terminal,
            TextKind::Comment | TextKind::GroupLabel => &self.settings.comment,
        }
    }

    fn group_style(&self) -> &GroupStyle<f64> {
        &self.settings.group
    }

    fn text_height(&self, _kind: TextKind) -> f64 {
        self.settings.char_height
    }

    fn terminus_width(&self) -> f64 {
        match self.settings.end_class {
            EndClass::Complex => 12.0,
            EndClass::Simple => 6.0,
        }
    }

    fn terminus_half_height(&self) -> f64 {
        10.0
    }

    fn max_width(&self) -> f64 {
        self.settings.max_width
    }

    fn measure_text(&self, kind: TextKind, text: &str) -> Result<f64, EmbedderError> {
        self.settings.text_measure.width(kind, text)
    }

    fn resolve_href(&self, request: &HrefRequest<'_>) -> Result<Option<Href>, EmbedderError> {
        match &self.settings.href_resolver {
            Some(resolver) => resolver.resolve(request),
            None => Ok(None),
        }
    }
}

/// Accumulates SVG elements in document order.
pub struct SvgCanvas {
    body: String,
    width: f64,
    height: f64,
    reverse: bool,
    end_class: EndClass,
    arrow_style: ArrowStyle,
    arrow_length: f64,
    arrow_cross: f64,
    font_size: f64,
    terminus_width: f64,
    terminus_half: f64,
    title: Option<String>,
    description: Option<String>,
    css_class: Option<String>,
    css_style: Option<String>,
}

impl SvgCanvas {
    #[must_use]
    pub fn new(settings: &VectorSettings, width: f64, height: f64) -> Self {
        Self {
            body: String::new(),
            width,
            height,
            reverse: settings.reverse,
            end_class: settings.end_class,
            arrow_style: settings.arrow_style,
            arrow_length: settings.arrow_length,
            arrow_cross: settings.arrow_cross_length,
            font_size: settings.char_height,
            terminus_width: match settings.end_class {
                EndClass::Complex => 12.0,
                EndClass::Simple => 6.0,
            },
            terminus_half: 10.0,
            title: settings.title.clone(),
            description: settings.description.clone(),
            css_class: settings.css_class.clone(),
            css_style: settings.css_style.clone(),
        }
    }

    /// Serializes the accumulated document.
    #[must_use]
    pub fn finish(self) -> String {
        let mut out = String::new();
        let class = match &self.css_class {
            Some(extra) => format!("railroad-diagram {extra}"),
            None => "railroad-diagram".to_owned(),
        };
        out.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"{}\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">\n",
            xml_escape(&class),
            self.width,
            self.height,
            self.width,
            self.height
        ));
        if let Some(title) = &self.title {
            out.push_str(&format!("<title>{}</title>\n", xml_escape(title)));
        }
        if let Some(description) = &self.description {
            out.push_str(&format!("<desc>{}</desc>\n", xml_escape(description)));
        }
        if let Some(css) = &self.css_style {
            out.push_str(&format!("<style type=\"text/css\">\n{css}</style>\n"));
        }
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }

    fn fx(&self, x: f64) -> f64 {
        if self.reverse { self.width - x } else { x }
    }

    fn push_path(&mut self, d: &str, class: Option<&str>) {
        match class {
            Some(class) => self
                .body
                .push_str(&format!("<path d=\"{d}\" class=\"{class}\"/>\n")),
            None => self.body.push_str(&format!("<path d=\"{d}\"/>\n")),
        }
    }

    fn open_link(&mut self, href: Option<&Href>) {
        if let Some(href) = href {
            self.body
                .push_str(&format!("<a href=\"{}\">", xml_escape(&href.href)));
        }
    }

    fn close_link(&mut self, href: Option<&Href>) {
        if let Some(href) = href {
            if let Some(title) = &href.title {
                self.body
                    .push_str(&format!("<title>{}</title>", xml_escape(title)));
            }
            self.body.push_str("</a>\n");
        }
    }
}

impl Surface for SvgCanvas {
    type Unit = f64;

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let (x1, x2) = (self.fx(x1), self.fx(x2));
        if x1 == x2 && y1 == y2 {
            return;
        }
        self.push_path(&format!("M{x1} {y1} L{x2} {y2}"), None);
    }

    fn arc(&mut self, x: f64, y: f64, r: f64, corner: Corner) {
        let corner = if self.reverse { corner.mirrored() } else { corner };
        let x = self.fx(x);
        // Endpoints sit one radius along the two box edges meeting at the
        // vertex; the sweep keeps the bulge toward the corner.
        let (sx, sy, ex, ey, sweep) = match corner {
            Corner::TopLeft => (x, y + r, x + r, y, 1),
            Corner::TopRight => (x - r, y, x, y + r, 1),
            Corner::BottomRight => (x, y - r, x - r, y, 1),
            Corner::BottomLeft => (x, y - r, x + r, y, 0),
        };
        self.push_path(&format!("M{sx} {sy} A{r} {r} 0 0 {sweep} {ex} {ey}"), None);
    }

    fn draw_box(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        radius: f64,
        style: &ShapeStyle<'_>,
    ) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x = if self.reverse { self.width - x - w } else { x };
        self.open_link(style.href);
        let rx = if radius > 0.0 {
            format!(" rx=\"{radius}\"")
        } else {
            String::new()
        };
        self.body.push_str(&format!(
            "<rect x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\"{rx} class=\"{}\"/>",
            xml_escape(style.class)
        ));
        self.close_link(style.href);
        if style.href.is_none() {
            self.body.push('\n');
        }
    }

    fn text(&mut self, x: f64, y: f64, w: f64, h: f64, text: &str, style: &ShapeStyle<'_>) {
        let x = if self.reverse { self.width - x - w } else { x };
        let cx = x + w / 2.0;
        let cy = y + h / 2.0 + self.font_size * 0.35;
        self.open_link(style.href);
        self.body.push_str(&format!(
            "<text x=\"{cx}\" y=\"{cy}\" class=\"{}\">{}</text>",
            xml_escape(style.class),
            xml_escape(text)
        ));
        self.close_link(style.href);
        if style.href.is_none() {
            self.body.push('\n');
        }
    }

    fn group_caption(&mut self, x: f64, y: f64, w: f64, text: &str, style: &ShapeStyle<'_>) {
        let x = if self.reverse { self.width - x - w } else { x };
        self.body.push_str(&format!(
            "<text x=\"{x}\" y=\"{y}\" class=\"group-caption\">{}</text>\n",
            xml_escape(text)
        ));
        let _ = style;
    }

    fn arrow(&mut self, x: f64, y: f64, facing: Facing) {
        let facing = if self.reverse { facing.mirrored() } else { facing };
        let x = self.fx(x);
        let half = self.arrow_length / 2.0;
        let cross = self.arrow_cross;
        let (tip, base) = match facing {
            Facing::West => (x - half, x + half),
            Facing::East => (x + half, x - half),
        };
        let notch = match facing {
            Facing::West => x - half / 4.0,
            Facing::East => x + half / 4.0,
        };
        match self.arrow_style {
            ArrowStyle::None => {}
            ArrowStyle::Triangle => {
                self.push_path(
                    &format!("M{tip} {y} L{base} {} L{base} {} Z", y - cross, y + cross),
                    Some("arrow"),
                );
            }
            ArrowStyle::Stealth => {
                self.push_path(
                    &format!(
                        "M{tip} {y} L{base} {} L{notch} {y} L{base} {} Z",
                        y - cross,
                        y + cross
                    ),
                    Some("arrow"),
                );
            }
            ArrowStyle::Barb => {
                self.push_path(
                    &format!("M{base} {} L{tip} {y} L{base} {}", y - cross, y + cross),
                    None,
                );
            }
            ArrowStyle::Harpoon => {
                self.push_path(&format!("M{tip} {y} L{base} {}", y + cross), None);
            }
            ArrowStyle::HarpoonUp => {
                self.push_path(&format!("M{tip} {y} L{base} {}", y - cross), None);
            }
        }
    }

    fn terminus(&mut self, x: f64, y: f64, end: bool) {
        let end = if self.reverse { !end } else { end };
        let x = self.fx(x);
        let tw = self.terminus_width;
        let hh = self.terminus_half;
        // The marker extends away from the rail attachment point.
        let (near, far) = if end { (x + tw / 2.0, x + tw) } else { (x - tw / 2.0, x - tw) };
        let mut d = String::new();
        d.push_str(&format!("M{far} {} V{}", y - hh, y + hh));
        if self.end_class == EndClass::Complex {
            d.push_str(&format!(" M{near} {} V{}", y - hh, y + hh));
        }
        d.push_str(&format!(" M{far} {y} H{x}"));
        self.push_path(&d, Some("terminus"));
    }

    fn begin_group(&mut self, id: &str) {
        self.body
            .push_str(&format!("<g data-railviz=\"{}\">\n", xml_escape(id)));
    }

    fn end_group(&mut self) {
        self.body.push_str("</g>\n");
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> SvgCanvas {
        SvgCanvas::new(&VectorSettings::default(), 200.0, 100.0)
    }

    #[test]
    fn test_escape() {
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn test_line_path() {
        let mut c = canvas();
        c.line(1.0, 2.0, 11.0, 2.0);
        assert!(c.body.contains("M1 2 L11 2"));
    }

    #[test]
    fn test_arc_is_quarter_circle() {
        let mut c = canvas();
        c.arc(10.0, 10.0, 10.0, Corner::TopLeft);
        assert!(c.body.contains("M10 20 A10 10 0 0 1 20 10"), "{}", c.body);
    }

    #[test]
    fn test_reverse_mirrors_x() {
        let settings = VectorSettings {
            reverse: true,
            ..Default::default()
        };
        let mut c = SvgCanvas::new(&settings, 200.0, 100.0);
        c.line(10.0, 5.0, 20.0, 5.0);
        assert!(c.body.contains("M190 5 L180 5"), "{}", c.body);
    }

    #[test]
    fn test_box_with_link_and_title() {
        let mut c = canvas();
        let href = Href {
            href: "#x".into(),
            title: Some("see x".into()),
        };
        c.draw_box(
            0.0,
            0.0,
            10.0,
            10.0,
            2.0,
            &ShapeStyle {
                class: "terminal",
                href: Some(&href),
            },
        );
        assert!(c.body.contains("<a href=\"#x\">"));
        assert!(c.body.contains("<title>see x</title></a>"));
    }

    #[test]
    fn test_finish_contains_metadata() {
        let settings = VectorSettings {
            title: Some("grammar".into()),
            description: Some("a rule".into()),
            ..Default::default()
        };
        let out = SvgCanvas::new(&settings, 10.0, 10.0).finish();
        assert!(out.starts_with("<svg "));
        assert!(out.contains("<title>grammar</title>"));
        assert!(out.contains("<desc>a rule</desc>"));
        assert!(out.contains("<style"));
        assert!(out.ends_with("</svg>\n"));
    }
}
