//! Pave / PaveBlock / CommonBlock consolidation.
//!
//! Runs strictly sequentially, edge by edge in dense-index order, after
//! every narrow-phase task has joined: parameter merging must see all
//! events at once, and the deterministic ordering of the result must
//! not depend on task completion order.

use std::collections::HashMap;

use tracing::debug;

use crate::ds::{
    EdgeEvent, Interference, InterferencePayload, IntersectionStore, Pave, PaveBlock, ShapeIndex,
};
use crate::error::Result;
use crate::intersect::IntersectContext;
use crate::math::Point3;
use crate::report::{DiagnosticCode, Report};
use crate::topology::{EdgeCurve, EdgeData, TopologyStore};

/// Derives per-edge split events from one interference record.
///
/// Called from the narrow-phase tasks; appends through the per-edge
/// locks, so it is safe under the worker pool.
///
/// # Errors
///
/// Returns an error if curve evaluation fails for a recorded parameter.
pub fn record_interference_events(
    store: &TopologyStore,
    ds: &IntersectionStore,
    interference: &Interference,
) -> Result<()> {
    let (a, b, tolerance) = (interference.a, interference.b, interference.tolerance);

    let operand_of = |shape: ShapeIndex| ds.entry(shape).operand.unwrap_or(usize::MAX);

    let mut push = |edge: ShapeIndex, t: f64, point: Point3, source: ShapeIndex| {
        ds.record_edge_event(
            edge,
            EdgeEvent {
                t,
                point,
                source_operand: operand_of(source),
                source_shape: source,
                tolerance,
            },
        );
    };

    match &interference.payload {
        InterferencePayload::Point { point, t_a, t_b } => {
            if let Some(t) = t_a {
                push(a, *t, *point, b);
            }
            if let Some(t) = t_b {
                push(b, *t, *point, a);
            }
        }
        InterferencePayload::EdgeOverlap { range_a, range_b } => {
            let ea = store.edge(ds.edge_id(a)?)?;
            let eb = store.edge(ds.edge_id(b)?)?;
            for &t in &[range_a.0, range_a.1] {
                push(a, t, ea.curve.evaluate(t)?, b);
            }
            for &t in &[range_b.0, range_b.1] {
                push(b, t, eb.curve.evaluate(t)?, a);
            }
        }
        InterferencePayload::EdgeOnFace { range } => {
            let ea = store.edge(ds.edge_id(a)?)?;
            for &t in &[range.0, range.1] {
                push(a, t, ea.curve.evaluate(t)?, b);
            }
        }
        InterferencePayload::Section { .. } | InterferencePayload::CoincidentSurface => {}
    }
    Ok(())
}

/// Tolerance expressed in parameter units of an edge's curve.
fn param_tolerance(edge: &EdgeData, tol: f64) -> f64 {
    match &edge.curve {
        EdgeCurve::Line(_) | EdgeCurve::Polyline(_) => tol,
        EdgeCurve::Circle(circle) => tol / circle.radius(),
    }
}

/// Pools pave vertices by quantized location so coincident split points
/// on different edges share one vertex.
struct PaveVertexPool {
    scale: f64,
    map: HashMap<(i64, i64, i64), ShapeIndex>,
}

impl PaveVertexPool {
    fn new(tol: f64) -> Self {
        Self {
            scale: 1.0 / (tol * 4.0).max(f64::MIN_POSITIVE),
            map: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: &Point3) -> (i64, i64, i64) {
        (
            (p.x * self.scale).round() as i64,
            (p.y * self.scale).round() as i64,
            (p.z * self.scale).round() as i64,
        )
    }

    fn get_or_create(
        &mut self,
        store: &mut TopologyStore,
        ds: &mut IntersectionStore,
        point: Point3,
        tolerance: f64,
    ) -> ShapeIndex {
        let key = self.key(&point);
        if let Some(&existing) = self.map.get(&key) {
            return existing;
        }
        let index = ds.append_vertex(store, point, tolerance);
        self.map.insert(key, index);
        index
    }
}

/// Runs the consolidation stage: paves, pave blocks, common blocks.
///
/// # Errors
///
/// Returns an error if edge topology cannot be read.
pub fn consolidate(
    store: &mut TopologyStore,
    ds: &mut IntersectionStore,
    ctx: &IntersectContext,
    report: &mut Report,
) -> Result<()> {
    let mut pool = PaveVertexPool::new(ctx.tolerance.max(ctx.fuzzy));

    let edges: Vec<ShapeIndex> = (0..ds.operand_count())
        .flat_map(|op| ds.operand(op).edges.clone())
        .collect();

    for edge_index in edges {
        build_edge_blocks(store, ds, ctx, report, &mut pool, edge_index)?;
    }

    build_common_blocks(ds, ctx, report);

    report.stats.pave_blocks = ds.pave_blocks().len();
    report.stats.common_blocks = ds.common_blocks().len();
    debug!(
        paves = report.stats.paves,
        blocks = report.stats.pave_blocks,
        common_blocks = report.stats.common_blocks,
        "consolidation complete"
    );
    Ok(())
}

/// Builds the pave sequence and blocks of one edge.
fn build_edge_blocks(
    store: &mut TopologyStore,
    ds: &mut IntersectionStore,
    ctx: &IntersectContext,
    report: &mut Report,
    pool: &mut PaveVertexPool,
    edge_index: ShapeIndex,
) -> Result<()> {
    let events = ds.take_edge_events(edge_index);
    let edge_id = ds.edge_id(edge_index)?;
    let (t_start, t_end, start_vid, end_vid, operand) = {
        let edge = store.edge(edge_id)?;
        (
            edge.t_start,
            edge.t_end,
            edge.start,
            edge.end,
            ds.entry(edge_index).operand.unwrap_or(usize::MAX),
        )
    };

    let p_tol = {
        let edge = store.edge(edge_id)?;
        param_tolerance(edge, ctx.pair_tolerance(ds, edge_index, edge_index))
    };

    // Cluster events within tolerance and resolve each cluster with
    // the documented tie-break: the lowest operand index wins; several
    // paves from the same winning operand average.
    let mut internal: Vec<(f64, Point3, f64)> = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let mut j = i + 1;
        while j < events.len() && events[j].t - events[j - 1].t <= p_tol {
            j += 1;
        }
        let cluster = &events[i..j];

        let winner = cluster
            .iter()
            .map(|e| e.source_operand)
            .min()
            .unwrap_or(usize::MAX);
        let winning: Vec<&EdgeEvent> =
            cluster.iter().filter(|e| e.source_operand == winner).collect();
        #[allow(clippy::cast_precision_loss)]
        let t = winning.iter().map(|e| e.t).sum::<f64>() / winning.len() as f64;
        let tolerance = cluster.iter().fold(0.0_f64, |acc, e| acc.max(e.tolerance));

        // Clamp into the edge domain; boundary hits reuse the endpoint
        // vertices instead of creating new paves.
        if t > t_start + p_tol && t < t_end - p_tol {
            let edge = store.edge(edge_id)?;
            let point = edge.curve.evaluate(t)?;
            internal.push((t, point, tolerance));
        }
        i = j;
    }

    // Degenerate inter-pave gaps collapse onto the earlier pave.
    internal.dedup_by(|next, prev| {
        if next.0 - prev.0 <= p_tol {
            report.warn(DiagnosticCode::DegenerateBlockDropped, vec![edge_index]);
            report.stats.degenerate_blocks += 1;
            true
        } else {
            false
        }
    });

    let start_pave = Pave {
        vertex: ds
            .vertex_index(start_vid)
            .ok_or_else(|| crate::error::TopologyError::EntityNotFound("start vertex".into()))?,
        t: t_start,
    };
    let end_pave = Pave {
        vertex: ds
            .vertex_index(end_vid)
            .ok_or_else(|| crate::error::TopologyError::EntityNotFound("end vertex".into()))?,
        t: t_end,
    };

    let mut paves = Vec::with_capacity(internal.len() + 2);
    paves.push(start_pave);
    for (t, point, tolerance) in internal {
        let vertex = pool.get_or_create(store, ds, point, tolerance);
        paves.push(Pave { vertex, t });
    }
    paves.push(end_pave);
    report.stats.paves += paves.len();

    for pair in paves.windows(2) {
        debug_assert!(pair[1].t > pair[0].t, "paves must strictly increase");
        ds.add_pave_block(PaveBlock {
            edge: edge_index,
            operand,
            pave1: pair[0],
            pave2: pair[1],
            common_block: None,
        });
    }
    Ok(())
}

/// Groups pave blocks covered by tangential edge overlaps into common
/// blocks.
fn build_common_blocks(ds: &mut IntersectionStore, ctx: &IntersectContext, report: &mut Report) {
    let overlaps: Vec<(ShapeIndex, (f64, f64), ShapeIndex, (f64, f64), f64)> = ds
        .interferences()
        .iter()
        .filter_map(|i| match &i.payload {
            InterferencePayload::EdgeOverlap { range_a, range_b } => {
                Some((i.a, *range_a, i.b, *range_b, i.tolerance))
            }
            _ => None,
        })
        .collect();

    for (edge_a, range_a, edge_b, range_b, tolerance) in overlaps {
        let members_a = blocks_in_range(ds, edge_a, range_a, ctx.tolerance.max(tolerance));
        let members_b = blocks_in_range(ds, edge_b, range_b, ctx.tolerance.max(tolerance));
        if members_a.is_empty() || members_b.is_empty() {
            report.warn(DiagnosticCode::DegenerateBlockDropped, vec![edge_a, edge_b]);
            continue;
        }

        let mut members = members_a;
        members.extend(members_b);

        let existing: Vec<usize> = members
            .iter()
            .filter_map(|&b| ds.pave_block(b).common_block)
            .collect();

        if let Some(&keep) = existing.first() {
            ds.extend_common_block(keep, members, tolerance);
        } else {
            ds.add_common_block(members, tolerance);
        }
    }
}

/// Ids of an edge's blocks lying inside a parameter range (inclusive
/// within tolerance).
fn blocks_in_range(
    ds: &IntersectionStore,
    edge: ShapeIndex,
    range: (f64, f64),
    tol: f64,
) -> Vec<usize> {
    ds.blocks_of_edge(edge)
        .iter()
        .copied()
        .filter(|&id| {
            let block = ds.pave_block(id);
            block.pave1.t >= range.0 - tol && block.pave2.t <= range.1 + tol
        })
        .collect()
}
