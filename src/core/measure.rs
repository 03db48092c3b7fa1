use tracing::trace;

use crate::core::elem::{Elem, ElemKind, Join, Layout, Side};
use crate::core::metrics::{Metrics, TextKind, Unit};
use crate::core::wrap::{breakable, split_lines};
use crate::errors::EmbedderError;

/// Context threaded through measurement and emission.
///
/// `outer` selects the roomier separation constants; it is cleared once the
/// cursor descends into a choice, loop, or fused bypass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassCtx {
    pub outer: bool,
}

impl PassCtx {
    pub(crate) fn root() -> Self {
        Self { outer: true }
    }

    pub(crate) fn inner() -> Self {
        Self { outer: false }
    }
}

/// Bottom-up measurement.
///
/// Fills in every node's layout record. Sequences that still carry soft or
/// hard joins are wrapped here first, so the rest of the pipeline only sees
/// final shapes. The pass is idempotent; the optimizer re-runs it after
/// rewriting the tree.
pub(crate) fn measure<M: Metrics>(
    elem: &mut Elem<M::Unit>,
    m: &M,
    ctx: PassCtx,
) -> Result<(), EmbedderError> {
    maybe_wrap(elem, m, ctx)?;
    let sp = m.spacing();
    let r = sp.arc_radius;
    let layout = match &mut elem.kind {
        ElemKind::Skip => Layout::default(),
        ElemKind::Text { kind, text, .. } => {
            let style = m.text_style(*kind);
            let half_glyph = m.text_height(*kind).half();
            let half = half_glyph + style.vertical_padding;
            let mut width = m.measure_text(*kind, text)? + style.horizontal_padding.scale(2);
            if !(style.radius < half_glyph) {
                // Rounded ends leave no room for text; reserve them.
                width = width + half_glyph.scale(2);
            }
            Layout {
                width,
                up: half,
                down: half,
                drop: M::Unit::ZERO,
            }
        }
        ElemKind::Sequence { children, .. } => {
            for child in children.iter_mut() {
                measure(child, m, ctx)?;
            }
            let mut width = M::Unit::ZERO;
            let mut up = M::Unit::ZERO;
            let mut down = M::Unit::ZERO;
            let mut cur = M::Unit::ZERO;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    width = width + sp.horizontal_seq;
                }
                width = width + child.layout.width;
                up = up.max(child.layout.up - cur);
                down = down.max(cur + child.layout.down);
                cur = cur + child.layout.drop;
            }
            Layout {
                width,
                up,
                down,
                drop: cur,
            }
        }
        ElemKind::Stack { rows } => {
            for row in rows.iter_mut() {
                measure(row, m, ctx)?;
            }
            let layouts: Vec<_> = rows.iter().map(|r| r.layout).collect();
            let geom = stack_geometry(&layouts, r, sp.seq_sep(ctx.outer));
            let mut width = M::Unit::ZERO;
            for row in rows.iter() {
                width = width.max(row.layout.width);
            }
            let last = layouts[layouts.len() - 1];
            let mut down = layouts[0].down;
            for (entry, row) in geom.entries.iter().zip(&layouts) {
                down = down.max(*entry + row.down);
            }
            Layout {
                width: width + r.scale(2),
                up: layouts[0].up,
                down,
                drop: geom.entries[geom.entries.len() - 1] + last.drop,
            }
        }
        ElemKind::Choice { alts, default } => {
            for alt in alts.iter_mut() {
                measure(alt, m, PassCtx::inner())?;
            }
            let layouts: Vec<_> = alts.iter().map(|a| a.layout).collect();
            let geom = choice_geometry(&layouts, *default, r, sp.choice_sep(ctx.outer));
            let mut width = M::Unit::ZERO;
            for alt in alts.iter() {
                width = width.max(alt.layout.width);
            }
            let side = r.scale(2) + sp.arc_margin;
            Layout {
                width: width + side.scale(2),
                up: geom.up,
                down: geom.down,
                drop: layouts[*default].drop,
            }
        }
        ElemKind::Loop {
            body,
            repeat,
            repeat_top,
        } => {
            measure(body, m, PassCtx::inner())?;
            measure(repeat, m, PassCtx::inner())?;
            let b = body.layout;
            let rep = repeat.layout;
            let dy = loop_offset(&b, &rep, r, sp.vertical_seq, *repeat_top);
            let (up, down) = if *repeat_top {
                (dy + rep.up, b.down)
            } else {
                (b.up, b.down.max(dy + rep.down))
            };
            Layout {
                width: b.width.max(rep.width) + r.scale(2),
                up,
                down,
                drop: b.drop,
            }
        }
        ElemKind::Bypass { items, side } => {
            for item in items.iter_mut() {
                measure(item, m, PassCtx::inner())?;
            }
            let layouts: Vec<_> = items.iter().map(|i| i.layout).collect();
            let dy = bypass_offset(&layouts, *side, r, sp.choice_sep(ctx.outer));
            let mut inner = M::Unit::ZERO;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    inner = inner + sp.horizontal_seq;
                }
                inner = inner + item.layout.width;
            }
            let wside = r.scale(2) + sp.arc_margin;
            let mut up = M::Unit::ZERO;
            let mut down = M::Unit::ZERO;
            for item in items.iter() {
                up = up.max(item.layout.up);
                down = down.max(item.layout.down);
            }
            match side {
                Side::Top => up = dy,
                Side::Bottom => down = dy,
            }
            Layout {
                width: inner + wside.scale(2),
                up,
                down,
                drop: M::Unit::ZERO,
            }
        }
        ElemKind::Barrier(child) => {
            measure(child, m, ctx)?;
            child.layout
        }
        ElemKind::Group { child, caption, .. } => {
            measure(child, m, ctx)?;
            let gs = m.group_style();
            let c = child.layout;
            let mut rect_w = c.width + gs.horizontal_padding.scale(2);
            let mut cap_band = M::Unit::ZERO;
            if let Some(caption) = caption {
                let cap_w = m.measure_text(TextKind::GroupLabel, caption)?;
                rect_w = rect_w.max(gs.text_dx + cap_w);
                cap_band = m.group_caption_band();
            }
            Layout {
                width: rect_w + gs.horizontal_margin.scale(2),
                up: c.up + gs.vertical_padding + gs.vertical_margin.max(cap_band),
                down: c.down + gs.vertical_padding + gs.vertical_margin,
                drop: c.drop,
            }
        }
        ElemKind::Terminus { .. } => Layout {
            width: m.terminus_width(),
            up: m.terminus_half_height(),
            down: m.terminus_half_height(),
            drop: M::Unit::ZERO,
        },
    };
    elem.layout = layout;
    Ok(())
}

/// Rewrites a breakable sequence into a stack of lines.
fn maybe_wrap<M: Metrics>(
    elem: &mut Elem<M::Unit>,
    m: &M,
    ctx: PassCtx,
) -> Result<(), EmbedderError> {
    let ElemKind::Sequence { children, joins } = &mut elem.kind else {
        return Ok(());
    };
    if !breakable(joins) {
        return Ok(());
    }
    for child in children.iter_mut() {
        measure(child, m, ctx)?;
    }
    let widths: Vec<_> = children.iter().map(|c| c.layout.width).collect();
    let starts = split_lines(&widths, joins, m.spacing().horizontal_seq, m.max_width());
    if starts.len() == 1 {
        // Everything fits on one line; the remaining joins are final.
        joins.iter_mut().for_each(|j| *j = Join::NoBreak);
        return Ok(());
    }
    trace!(lines = starts.len(), "wrapped sequence");
    let mut rest = std::mem::take(children);
    let mut rows = Vec::with_capacity(starts.len());
    for window in starts.windows(2) {
        let tail = rest.split_off(window[1] - window[0]);
        rows.push(make_line(rest));
        rest = tail;
    }
    rows.push(make_line(rest));
    elem.kind = ElemKind::Stack { rows };
    Ok(())
}

fn make_line<U: Unit>(mut children: Vec<Elem<U>>) -> Elem<U> {
    if children.len() == 1 {
        children.pop().expect("line has one child")
    } else {
        let joins = vec![Join::NoBreak; children.len() - 1];
        Elem::new(ElemKind::Sequence { children, joins })
    }
}

/// Vertical geometry of a stack: per-row entry offsets and the return-line
/// positions between rows, both relative to the stack's entry line.
#[derive(Debug)]
pub(crate) struct StackGeom<U: Unit> {
    pub entries: Vec<U>,
    pub mids: Vec<U>,
}

pub(crate) fn stack_geometry<U: Unit>(rows: &[Layout<U>], r: U, vsep: U) -> StackGeom<U> {
    let two_r = r + r;
    let mut entries = vec![U::ZERO];
    let mut mids = Vec::new();
    let mut entry = U::ZERO;
    for i in 1..rows.len() {
        let prev = rows[i - 1];
        let exit = entry + prev.drop;
        let below_exit = prev.down - prev.drop;
        let drop1 = two_r.max(below_exit + vsep);
        let drop2 = two_r.max(rows[i].up + vsep);
        mids.push(exit + drop1);
        entry = exit + drop1 + drop2;
        entries.push(entry);
    }
    StackGeom { entries, mids }
}

/// Vertical geometry of a choice: the magnitude of each alternative's entry
/// offset from the main line (zero for the default) and the total extents.
#[derive(Debug)]
pub(crate) struct ChoiceGeom<U: Unit> {
    pub offsets: Vec<U>,
    pub up: U,
    pub down: U,
}

/// Places choice alternatives around the default.
///
/// Each offset clears the previously placed occupancy plus the separation,
/// and leaves at least one arc height (`2r`) of rail on both the entry and
/// exit sides so the branch and rejoin bends fit.
pub(crate) fn choice_geometry<U: Unit>(
    alts: &[Layout<U>],
    default: usize,
    r: U,
    vsep: U,
) -> ChoiceGeom<U> {
    let two_r = r + r;
    let dd = alts[default].drop;
    let mut offsets = vec![U::ZERO; alts.len()];
    let mut up = alts[default].up;
    for i in (0..default).rev() {
        let a = alts[i];
        let dy = (up + vsep + a.down).max(two_r).max(two_r + a.drop - dd);
        offsets[i] = dy;
        up = dy + a.up;
    }
    let mut down = alts[default].down;
    for i in default + 1..alts.len() {
        let a = alts[i];
        let dy = (down + vsep + a.up).max(two_r).max(two_r + dd - a.drop);
        offsets[i] = dy;
        down = dy + a.down;
    }
    ChoiceGeom { offsets, up, down }
}

/// Entry offset of a loop's return line from the body's entry line.
pub(crate) fn loop_offset<U: Unit>(
    body: &Layout<U>,
    repeat: &Layout<U>,
    r: U,
    vsep: U,
    repeat_top: bool,
) -> U {
    if repeat_top {
        (body.up + vsep + repeat.down)
            .max(r)
            .max(r + repeat.drop - body.drop)
    } else {
        (body.down + vsep + repeat.up)
            .max(r)
            .max(r + body.drop - repeat.drop)
    }
}

/// Offset of a fused bypass rail from the main line.
pub(crate) fn bypass_offset<U: Unit>(items: &[Layout<U>], side: Side, r: U, vsep: U) -> U {
    let mut extent = U::ZERO;
    for item in items {
        extent = extent.max(match side {
            Side::Top => item.up,
            Side::Bottom => item.down,
        });
    }
    (extent + vsep).max(r + r)
}
