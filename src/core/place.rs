use crate::core::elem::{Elem, ElemKind, Side};
use crate::core::measure::{
    bypass_offset, choice_geometry, loop_offset, stack_geometry, PassCtx,
};
use crate::core::metrics::{Href, HrefRequest, Metrics, TextKind, Unit};
use crate::core::node::NodeAttrs;
use crate::errors::EmbedderError;
use crate::render::{Corner, Facing, ShapeStyle, Surface};

/// Placement and emission.
///
/// Walks the measured tree with an absolute cursor positioned at each
/// node's entry connector and calls the surface primitives in document
/// order. The geometry here must agree with the reservations made by
/// measurement; the shared helpers in `measure` keep both sides honest.
pub(crate) struct Emitter<'a, M: Metrics, S: Surface<Unit = M::Unit>> {
    m: &'a M,
    s: &'a mut S,
    debug: bool,
    next_id: usize,
}

impl<'a, M, S> Emitter<'a, M, S>
where
    M: Metrics,
    S: Surface<Unit = M::Unit>,
{
    pub(crate) fn new(m: &'a M, s: &'a mut S, debug: bool) -> Self {
        Self {
            m,
            s,
            debug,
            next_id: 0,
        }
    }

    /// Draws `elem` with its entry connector at `(x, y)`.
    pub(crate) fn emit(
        &mut self,
        elem: &Elem<M::Unit>,
        x: M::Unit,
        y: M::Unit,
        ctx: PassCtx,
    ) -> Result<(), EmbedderError> {
        self.enter(kind_name(&elem.kind));
        let result = self.emit_inner(elem, x, y, ctx);
        self.leave();
        result
    }

    fn emit_inner(
        &mut self,
        elem: &Elem<M::Unit>,
        x: M::Unit,
        y: M::Unit,
        ctx: PassCtx,
    ) -> Result<(), EmbedderError> {
        let sp = self.m.spacing();
        let r = sp.arc_radius;
        let two_r = r + r;
        let l = elem.layout;
        match &elem.kind {
            ElemKind::Skip => {}
            ElemKind::Text { kind, text, attrs } => {
                let href = self.resolve(*kind, text, attrs)?;
                let class = compose_class(kind_class(*kind), attrs.css_class.as_deref());
                // Only terminals carry the link on the whole box.
                let box_style = ShapeStyle {
                    class: &class,
                    href: if *kind == TextKind::Terminal {
                        href.as_ref()
                    } else {
                        None
                    },
                };
                let text_style = ShapeStyle {
                    class: &class,
                    href: href.as_ref(),
                };
                if l.up + l.down <= M::Unit::ZERO {
                    // A zero-height node has no box to stop at; the rail
                    // runs through its span, under the stamped text.
                    self.hline(x, x + l.width, y);
                }
                let radius = self.m.text_style(*kind).radius;
                self.s
                    .draw_box(x, y - l.up, l.width, l.up + l.down, radius, &box_style);
                self.s
                    .text(x, y - l.up, l.width, l.up + l.down, text, &text_style);
            }
            ElemKind::Sequence { children, .. } => {
                let mut cx = x;
                let mut cy = y;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.hline(cx, cx + sp.horizontal_seq, cy);
                        cx = cx + sp.horizontal_seq;
                    }
                    self.emit(child, cx, cy, ctx)?;
                    cx = cx + child.layout.width;
                    cy = cy + child.layout.drop;
                }
            }
            ElemKind::Stack { rows } => {
                let vsep = sp.seq_sep(ctx.outer);
                let layouts: Vec<_> = rows.iter().map(|r| r.layout).collect();
                let geom = stack_geometry(&layouts, r, vsep);
                let inner_left = x + r;
                let right = x + l.width;
                for (i, row) in rows.iter().enumerate() {
                    let ey = y + geom.entries[i];
                    let exit_y = ey + row.layout.drop;
                    if i == 0 {
                        self.hline(x, inner_left, ey);
                    }
                    self.emit(row, inner_left, ey, ctx)?;
                    if i + 1 < rows.len() {
                        // Return path: down, across to the left, down again.
                        let mid = y + geom.mids[i];
                        let ny = y + geom.entries[i + 1];
                        self.hline(inner_left + row.layout.width, right - r, exit_y);
                        self.s.arc(right, exit_y, r, Corner::TopRight);
                        self.vline(right, exit_y + r, mid - r);
                        self.s.arc(right, mid, r, Corner::BottomRight);
                        self.hline(x + r, right - r, mid);
                        self.s.arc(x, mid, r, Corner::TopLeft);
                        self.vline(x, mid + r, ny - r);
                        self.s.arc(x, ny, r, Corner::BottomLeft);
                    } else {
                        self.hline(inner_left + row.layout.width, right, exit_y);
                    }
                }
            }
            ElemKind::Choice { alts, default } => {
                let d = *default;
                let vsep = sp.choice_sep(ctx.outer);
                let layouts: Vec<_> = alts.iter().map(|a| a.layout).collect();
                let geom = choice_geometry(&layouts, d, r, vsep);
                let wside = two_r + sp.arc_margin;
                let x2 = x + l.width;
                let y_exit = y + layouts[d].drop;

                self.hline(x, x + wside, y);
                self.emit(&alts[d], x + wside, y, PassCtx::inner())?;
                self.hline(x + wside + layouts[d].width, x2, y_exit);

                if d > 0 {
                    self.s.arc(x + r, y, r, Corner::BottomRight);
                    self.s.arc(x2 - r, y_exit, r, Corner::BottomLeft);
                    for i in 0..d {
                        let ay = y - geom.offsets[i];
                        let aye = ay + layouts[i].drop;
                        self.s.arc(x + r, ay, r, Corner::TopLeft);
                        self.hline(x + two_r, x + wside, ay);
                        self.emit(&alts[i], x + wside, ay, PassCtx::inner())?;
                        self.hline(x + wside + layouts[i].width, x2 - two_r, aye);
                        self.s.arc(x2 - r, aye, r, Corner::TopRight);
                    }
                    let top_entry = y - geom.offsets[0];
                    let top_exit = top_entry + layouts[0].drop;
                    self.vline(x + r, top_entry + r, y - r);
                    self.vline(x2 - r, top_exit + r, y_exit - r);
                }
                if d + 1 < alts.len() {
                    self.s.arc(x + r, y, r, Corner::TopRight);
                    self.s.arc(x2 - r, y_exit, r, Corner::TopLeft);
                    for i in d + 1..alts.len() {
                        let ay = y + geom.offsets[i];
                        let aye = ay + layouts[i].drop;
                        self.s.arc(x + r, ay, r, Corner::BottomLeft);
                        self.hline(x + two_r, x + wside, ay);
                        self.emit(&alts[i], x + wside, ay, PassCtx::inner())?;
                        self.hline(x + wside + layouts[i].width, x2 - two_r, aye);
                        self.s.arc(x2 - r, aye, r, Corner::BottomRight);
                    }
                    let bot = alts.len() - 1;
                    let bot_entry = y + geom.offsets[bot];
                    let bot_exit = bot_entry + layouts[bot].drop;
                    self.vline(x + r, y + r, bot_entry - r);
                    self.vline(x2 - r, y_exit + r, bot_exit - r);
                }
            }
            ElemKind::Loop {
                body,
                repeat,
                repeat_top,
            } => {
                let right = x + l.width;
                let inner_w = l.width - two_r;
                let dy = loop_offset(&body.layout, &repeat.layout, r, sp.vertical_seq, *repeat_top);
                let y_exit = y + body.layout.drop;

                self.hline(x, x + r, y);
                self.emit(body, x + r, y, PassCtx::inner())?;
                self.hline(x + r + body.layout.width, right, y_exit);

                let rw = repeat.layout.width;
                let rx = x + r + (inner_w - rw).half();
                let (yr, yr2) = if *repeat_top {
                    let yr = y - dy;
                    let yr2 = yr + repeat.layout.drop;
                    self.s.arc(x, yr, r, Corner::TopLeft);
                    self.vline(x, yr + r, y);
                    self.s.arc(right, yr2, r, Corner::TopRight);
                    self.vline(right, yr2 + r, y_exit);
                    (yr, yr2)
                } else {
                    let yr = y + dy;
                    let yr2 = yr + repeat.layout.drop;
                    self.vline(x, y, yr - r);
                    self.s.arc(x, yr, r, Corner::BottomLeft);
                    self.vline(right, y_exit, yr2 - r);
                    self.s.arc(right, yr2, r, Corner::BottomRight);
                    (yr, yr2)
                };
                self.hline(x + r, rx, yr);
                self.emit(repeat, rx, yr, PassCtx::inner())?;
                self.hline(rx + rw, right - r, yr2);
                // The return line is traversed right to left.
                if M::Unit::ZERO < rx - (x + r) {
                    self.s.arrow(x + r + (rx - x - r).half(), yr, Facing::West);
                }
            }
            ElemKind::Bypass { items, side } => {
                let vsep = sp.choice_sep(ctx.outer);
                let layouts: Vec<_> = items.iter().map(|i| i.layout).collect();
                let dy = bypass_offset(&layouts, *side, r, vsep);
                let wside = two_r + sp.arc_margin;
                let x2 = x + l.width;

                self.hline(x, x + wside, y);
                let mut cx = x + wside;
                let mut junctions = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.hline(cx, cx + sp.horizontal_seq, y);
                        junctions.push(cx + sp.horizontal_seq.half());
                        cx = cx + sp.horizontal_seq;
                    }
                    self.emit(item, cx, y, PassCtx::inner())?;
                    cx = cx + item.layout.width;
                }
                self.hline(cx, x2, y);

                match side {
                    Side::Top => {
                        let yr = y - dy;
                        self.s.arc(x + r, y, r, Corner::BottomRight);
                        self.vline(x + r, yr + r, y - r);
                        self.s.arc(x + r, yr, r, Corner::TopLeft);
                        self.hline(x + two_r, x2 - two_r, yr);
                        self.s.arc(x2 - r, yr, r, Corner::TopRight);
                        self.vline(x2 - r, yr + r, y - r);
                        self.s.arc(x2 - r, y, r, Corner::BottomLeft);
                        for jx in junctions {
                            self.vline(jx, yr, y);
                        }
                    }
                    Side::Bottom => {
                        let yr = y + dy;
                        self.s.arc(x + r, y, r, Corner::TopRight);
                        self.vline(x + r, y + r, yr - r);
                        self.s.arc(x + r, yr, r, Corner::BottomLeft);
                        self.hline(x + two_r, x2 - two_r, yr);
                        self.s.arc(x2 - r, yr, r, Corner::BottomRight);
                        self.vline(x2 - r, y + r, yr - r);
                        self.s.arc(x2 - r, y, r, Corner::TopLeft);
                        for jx in junctions {
                            self.vline(jx, y, yr);
                        }
                    }
                }
            }
            ElemKind::Barrier(child) => self.emit(child, x, y, ctx)?,
            ElemKind::Group {
                child,
                caption,
                attrs,
            } => {
                let gs = self.m.group_style();
                let c = child.layout;
                let cx0 = x + gs.horizontal_margin + gs.horizontal_padding;
                let y_exit = y + c.drop;

                self.hline(x, cx0, y);
                self.emit(child, cx0, y, ctx)?;
                self.hline(cx0 + c.width, x + l.width, y_exit);

                let href = match caption {
                    Some(caption) => self.resolve(TextKind::GroupLabel, caption, attrs)?,
                    None => None,
                };
                let class = compose_class("group", attrs.css_class.as_deref());
                let style = ShapeStyle {
                    class: &class,
                    href: href.as_ref(),
                };
                let rect_x = x + gs.horizontal_margin;
                let rect_w = l.width - gs.horizontal_margin.scale(2);
                let rect_y = y - c.up - gs.vertical_padding;
                let rect_h = c.up + c.down + gs.vertical_padding.scale(2);
                self.s
                    .draw_box(rect_x, rect_y, rect_w, rect_h, gs.radius, &style);
                if let Some(caption) = caption {
                    let cap_w = self.m.measure_text(TextKind::GroupLabel, caption)?;
                    self.s.group_caption(
                        rect_x + gs.text_dx,
                        rect_y - gs.text_dy,
                        cap_w,
                        caption,
                        &style,
                    );
                }
            }
            ElemKind::Terminus { end } => {
                if *end {
                    self.s.terminus(x, y, true);
                } else {
                    self.s.terminus(x + l.width, y, false);
                }
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        kind: TextKind,
        text: &str,
        attrs: &NodeAttrs,
    ) -> Result<Option<Href>, EmbedderError> {
        if let Some(href) = &attrs.href {
            return Ok(Some(Href {
                href: href.clone(),
                title: attrs.title.clone(),
            }));
        }
        self.m.resolve_href(&HrefRequest {
            kind,
            text,
            payload: &attrs.payload,
        })
    }

    fn hline(&mut self, x1: M::Unit, x2: M::Unit, y: M::Unit) {
        if x1 < x2 {
            self.s.line(x1, y, x2, y);
        } else if x2 < x1 {
            self.s.line(x2, y, x1, y);
        }
    }

    fn vline(&mut self, x: M::Unit, y1: M::Unit, y2: M::Unit) {
        if y1 < y2 {
            self.s.line(x, y1, x, y2);
        } else if y2 < y1 {
            self.s.line(x, y2, x, y1);
        }
    }

    fn enter(&mut self, kind: &'static str) {
        if self.debug {
            let id = format!("{kind}-{}", self.next_id);
            self.next_id += 1;
            self.s.begin_group(&id);
        }
    }

    fn leave(&mut self) {
        if self.debug {
            self.s.end_group();
        }
    }
}

fn kind_class(kind: TextKind) -> &'static str {
    match kind {
        TextKind::Terminal => "terminal",
        TextKind::NonTerminal => "non-terminal",
        TextKind::Comment => "comment",
        TextKind::GroupLabel => "group-caption",
    }
}

fn kind_name<U: Unit>(kind: &ElemKind<U>) -> &'static str {
    match kind {
        ElemKind::Skip => "skip",
        ElemKind::Text { kind, .. } => kind_class(*kind),
        ElemKind::Sequence { .. } => "sequence",
        ElemKind::Stack { .. } => "stack",
        ElemKind::Choice { .. } => "choice",
        ElemKind::Loop { .. } => "loop",
        ElemKind::Bypass { .. } => "bypass",
        ElemKind::Barrier(_) => "barrier",
        ElemKind::Group { .. } => "group",
        ElemKind::Terminus { .. } => "terminus",
    }
}

fn compose_class(base: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{base} {extra}"),
        None => base.to_owned(),
    }
}
