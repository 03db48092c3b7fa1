use tracing::trace;

use crate::core::elem::{Elem, ElemKind, Join, Side};
use crate::core::metrics::Unit;

/// Skip-rail fusion.
///
/// Rewrites runs of adjacent same-side bypasses inside a sequence into a
/// single [`ElemKind::Bypass`] node, so consecutive optionals share one
/// rail instead of producing two parallel ones. Runs the whole tree; the
/// caller re-measures afterwards. The rewrite never changes the accepted
/// language, only the drawn shape.
pub(crate) fn optimize<U: Unit>(elem: &mut Elem<U>) {
    if let ElemKind::Sequence { children, joins } = &mut elem.kind {
        fuse_children(children, joins);
        for child in children.iter_mut() {
            optimize(child);
        }
        if children.len() == 1 {
            let only = children.pop().expect("length checked above");
            *elem = only;
        }
        return;
    }
    match &mut elem.kind {
        ElemKind::Sequence { .. } => unreachable!("handled above"),
        ElemKind::Stack { rows } => {
            for row in rows.iter_mut() {
                optimize(row);
            }
        }
        ElemKind::Choice { alts, .. } => {
            for alt in alts.iter_mut() {
                optimize(alt);
            }
        }
        ElemKind::Loop { body, repeat, .. } => {
            optimize(body);
            optimize(repeat);
        }
        ElemKind::Bypass { items, .. } => {
            for item in items.iter_mut() {
                optimize(item);
            }
        }
        // A barrier's child is optimized internally; the barrier itself is
        // never part of a fusable run.
        ElemKind::Barrier(child) => optimize(child),
        ElemKind::Group { child, .. } => optimize(child),
        ElemKind::Skip | ElemKind::Text { .. } | ElemKind::Terminus { .. } => {}
    }
}

/// Which side a choice's skip rail runs on, when the choice is shaped like
/// an optional that fusion can consume.
///
/// Requires exactly two alternatives, a `Skip` off the main line, and a
/// main-line branch with no exit drop (a dropped exit would force the fused
/// rail across the branch's rows).
fn bypass_side<U: Unit>(elem: &Elem<U>) -> Option<Side> {
    let ElemKind::Choice { alts, default } = &elem.kind else {
        return None;
    };
    if alts.len() != 2 {
        return None;
    }
    let (skip_idx, side) = match default {
        1 if matches!(alts[0].kind, ElemKind::Skip) => (0, Side::Top),
        0 if matches!(alts[1].kind, ElemKind::Skip) => (1, Side::Bottom),
        _ => return None,
    };
    let body = &alts[1 - skip_idx];
    if matches!(body.kind, ElemKind::Skip) {
        return None;
    }
    if body.layout.drop != U::ZERO {
        return None;
    }
    Some(side)
}

/// Unwraps a fusable choice into its main-line branch.
fn take_body<U: Unit>(elem: Elem<U>) -> Elem<U> {
    let ElemKind::Choice { alts, .. } = elem.kind else {
        unreachable!("caller checked the shape");
    };
    alts.into_iter()
        .find(|a| !matches!(a.kind, ElemKind::Skip))
        .expect("caller checked the shape")
}

fn fuse_children<U: Unit>(children: &mut Vec<Elem<U>>, joins: &mut Vec<Join>) {
    if children.len() < 2 {
        return;
    }
    let mut out: Vec<Elem<U>> = Vec::with_capacity(children.len());
    let mut run: Vec<Elem<U>> = Vec::new();
    let mut run_side = None;

    fn flush<U: Unit>(out: &mut Vec<Elem<U>>, run: &mut Vec<Elem<U>>, side: Option<Side>) {
        if run.len() >= 2 {
            let side = side.expect("a run always has a side");
            trace!(items = run.len(), ?side, "fused bypass run");
            let items = std::mem::take(run).into_iter().map(take_body).collect();
            out.push(Elem::new(ElemKind::Bypass { items, side }));
        } else {
            out.append(run);
        }
    }

    for child in children.drain(..) {
        match bypass_side(&child) {
            Some(side) if run_side == Some(side) => run.push(child),
            Some(side) => {
                flush(&mut out, &mut run, run_side);
                run_side = Some(side);
                run.push(child);
            }
            None => {
                flush(&mut out, &mut run, run_side);
                run_side = None;
                out.push(child);
            }
        }
    }
    flush(&mut out, &mut run, run_side);

    *children = out;
    *joins = vec![Join::NoBreak; children.len().saturating_sub(1)];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::elem::{LowerCtx, lower};
    use crate::core::node::Node;

    fn optimized(node: &Node) -> Elem<i64> {
        let mut elem = lower(node, LowerCtx::top());
        optimize(&mut elem);
        elem
    }

    fn count_bypasses<U: Unit>(elem: &Elem<U>) -> usize {
        match &elem.kind {
            ElemKind::Bypass { items, .. } => {
                1 + items.iter().map(count_bypasses).sum::<usize>()
            }
            ElemKind::Sequence { children, .. } => {
                children.iter().map(count_bypasses).sum()
            }
            ElemKind::Stack { rows } => rows.iter().map(count_bypasses).sum(),
            ElemKind::Choice { alts, .. } => alts.iter().map(count_bypasses).sum(),
            ElemKind::Loop { body, repeat, .. } => {
                count_bypasses(body) + count_bypasses(repeat)
            }
            ElemKind::Barrier(child) | ElemKind::Group { child, .. } => count_bypasses(child),
            _ => 0,
        }
    }

    #[test]
    fn test_adjacent_optionals_fuse() {
        let node = Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::optional(Node::terminal("B")),
        ]);
        let elem = optimized(&node);
        let ElemKind::Bypass { items, side } = &elem.kind else {
            panic!("expected a fused bypass, got {elem:?}");
        };
        assert_eq!(*side, Side::Top);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_three_optionals_fuse_into_one() {
        let node = Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::optional(Node::terminal("B")),
            Node::optional(Node::terminal("C")),
        ]);
        let elem = optimized(&node);
        let ElemKind::Bypass { items, .. } = &elem.kind else {
            panic!("expected a fused bypass");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_opposite_sides_do_not_fuse() {
        let below = Node::Optional {
            child: Box::new(Node::terminal("B")),
            skip: false,
            skip_bottom: true,
        };
        let node = Node::sequence(vec![Node::optional(Node::terminal("A")), below]);
        assert_eq!(count_bypasses(&optimized(&node)), 0);
    }

    #[test]
    fn test_barrier_blocks_fusion() {
        let node = Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::barrier(Node::optional(Node::terminal("B"))),
        ]);
        assert_eq!(count_bypasses(&optimized(&node)), 0);
    }

    #[test]
    fn test_intervening_terminal_blocks_fusion() {
        let node = Node::sequence(vec![
            Node::optional(Node::terminal("A")),
            Node::terminal("x"),
            Node::optional(Node::terminal("B")),
        ]);
        assert_eq!(count_bypasses(&optimized(&node)), 0);
    }

    #[test]
    fn test_dropped_exit_blocks_fusion() {
        let mut elem: Elem<i64> = lower(
            &Node::sequence(vec![
                Node::optional(Node::stack(vec![Node::terminal("A"), Node::terminal("B")])),
                Node::optional(Node::terminal("C")),
            ]),
            LowerCtx::top(),
        );
        // Mark the stacked branch with the exit drop measurement would give it.
        {
            let ElemKind::Sequence { children, .. } = &mut elem.kind else {
                panic!("expected a sequence");
            };
            let ElemKind::Choice { alts, .. } = &mut children[0].kind else {
                panic!("expected a choice");
            };
            alts[1].layout.drop = 4;
        }
        optimize(&mut elem);
        assert_eq!(count_bypasses(&elem), 0);
    }

    #[test]
    fn test_skip_on_main_line_does_not_fuse() {
        // skip = true puts the main line on the skip; the body bulges and
        // there is no isolated rail to merge.
        let opt = |t: &str| Node::Optional {
            child: Box::new(Node::terminal(t)),
            skip: true,
            skip_bottom: false,
        };
        let node = Node::sequence(vec![opt("A"), opt("B")]);
        assert_eq!(count_bypasses(&optimized(&node)), 0);
    }
}
