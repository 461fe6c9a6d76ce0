//! The orchestrator: a fixed-order state machine over the boolean
//! phases, with a worker pool for the parallelizable stages and a
//! cooperative cancellation token.

pub mod options;

pub use options::{BooleanOptions, CancelToken, GlueOption};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::assemble::{
    assemble_section, assemble_solids, combine_states, decide, BooleanOp, BooleanOutput,
    KeepDecision, OperandGroup,
};
use crate::classify::{classify_fragment, Classification};
use crate::ds::{
    Interference, InterferencePayload, IntersectionStore, ShapeIndex, ShapeKind,
};
use crate::error::{BooleanError, CarvelError, Result};
use crate::index::{pairs_of, BoundingBox, BoxTree, OrientedBox};
use crate::intersect::{
    detect_coincident_faces, intersect_pair, IntersectContext,
};
use crate::math::{points_equal, TOLERANCE};
use crate::paves;
use crate::report::{DiagnosticCode, Report};
use crate::split::{self, FaceFragment};
use crate::topology::{EdgeCurve, FaceSurface, SolidId, TopologyStore};

/// Operand tolerances above this are considered inconsistent input.
const MAX_OPERAND_TOLERANCE: f64 = 1e-2;
/// Pairs processed between cancellation checks.
const BATCH: usize = 256;

/// Orchestrator phases, entered in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Indexed,
    Intersected,
    Consolidated,
    Split,
    Classified,
    Assembled,
    Done,
    Failed,
}

/// The general boolean operations engine.
///
/// Operands are registered as objects and tools (the distinction only
/// matters for `Cut`/`CutReverse`), then one operation is executed:
///
/// ```no_run
/// # use carvel::{BooleanEngine, BooleanOp, TopologyStore};
/// # fn demo(store: &mut TopologyStore, a: carvel::SolidId, b: carvel::SolidId) -> carvel::Result<()> {
/// let mut engine = BooleanEngine::new(store);
/// engine.add_object(a);
/// engine.add_tool(b);
/// let out = engine.execute(BooleanOp::Cut)?;
/// # Ok(()) }
/// ```
pub struct BooleanEngine<'a> {
    store: &'a mut TopologyStore,
    objects: Vec<SolidId>,
    tools: Vec<SolidId>,
    options: BooleanOptions,
    cancel: CancelToken,
    state: EngineState,
    report: Report,
}

impl<'a> BooleanEngine<'a> {
    /// Creates an engine over a topology store.
    pub fn new(store: &'a mut TopologyStore) -> Self {
        Self {
            store,
            objects: Vec::new(),
            tools: Vec::new(),
            options: BooleanOptions::default(),
            cancel: CancelToken::new(),
            state: EngineState::Idle,
            report: Report::new(),
        }
    }

    /// Registers an object operand.
    pub fn add_object(&mut self, solid: SolidId) {
        self.objects.push(solid);
    }

    /// Registers a tool operand.
    pub fn add_tool(&mut self, solid: SolidId) {
        self.tools.push(solid);
    }

    /// Replaces the options.
    pub fn set_options(&mut self, options: BooleanOptions) {
        self.options = options;
    }

    /// A token that cancels this run when fired.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Diagnostics recorded so far (also available after a failure).
    #[must_use]
    pub fn report(&self) -> &Report {
        &self.report
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BooleanError::Cancelled.into());
        }
        Ok(())
    }

    /// Runs the full pipeline for one operation.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`BooleanError`] (input, tolerance, assembly or
    /// cancellation); recoverable solver and classification failures
    /// are downgraded to warnings on the returned report.
    pub fn execute(&mut self, op: BooleanOp) -> Result<BooleanOutput> {
        match self.run(op) {
            Ok(output) => {
                self.state = EngineState::Done;
                info!(?op, warnings = output.report.warning_count(), "boolean operation done");
                Ok(output)
            }
            Err(error) => {
                self.state = EngineState::Failed;
                warn!(?op, %error, "boolean operation failed");
                Err(error)
            }
        }
    }

    fn run(&mut self, op: BooleanOp) -> Result<BooleanOutput> {
        let ctx = IntersectContext {
            tolerance: TOLERANCE.max(1e-7),
            fuzzy: self.options.fuzzy_value,
        };
        let operands: Vec<SolidId> = self.objects.iter().chain(self.tools.iter()).copied().collect();

        self.validate_setup(op, &operands)?;

        // Index: flatten the operands and build the broad-phase trees.
        let mut ds = IntersectionStore::build(self.store, &operands)?;
        self.validate_operands(&ds, &ctx)?;
        let pairs = self.broad_phase(&ds, &ctx);
        self.state = EngineState::Indexed;
        self.check_cancel()?;
        debug!(pairs = pairs.len(), "broad phase complete");

        let pool = if self.options.run_parallel {
            Some(self.build_pool()?)
        } else {
            None
        };

        // Narrow phase over the worker pool.
        self.narrow_phase(&mut ds, &ctx, &pairs, pool.as_ref())?;
        self.state = EngineState::Intersected;
        self.check_cancel()?;

        // Consolidation: strictly sequential, then freeze.
        ds.sort_interferences();
        paves::consolidate(self.store, &mut ds, &ctx, &mut self.report)?;
        ds.freeze();
        self.state = EngineState::Consolidated;
        self.check_cancel()?;

        if op == BooleanOp::Section {
            let mut history = crate::assemble::HistoryMap::new();
            let section_wires = assemble_section(self.store, &ds, &mut history)?;
            self.state = EngineState::Assembled;
            return Ok(BooleanOutput {
                solids: Vec::new(),
                section_wires,
                report: self.report.clone(),
                history,
            });
        }

        // Split.
        let splits = split::split_edges(self.store, &ds)?;
        let fragments = self.split_phase(&ds, &ctx, pool.as_ref())?;
        self.state = EngineState::Split;
        self.check_cancel()?;

        // Classify.
        let classified = self.classify_phase(&ds, &ctx, &fragments, pool.as_ref())?;
        self.state = EngineState::Classified;
        self.check_cancel()?;

        // Select and assemble.
        let decisions = self.select(op, &fragments, &classified);
        let (solids, mut history) = assemble_solids(
            self.store,
            &ds,
            &decisions,
            &splits,
            &mut self.report,
        )?;
        for &edge in &splits.modified_edges {
            history.mark_modified(edge);
        }
        self.state = EngineState::Assembled;

        Ok(BooleanOutput {
            solids,
            section_wires: Vec::new(),
            report: self.report.clone(),
            history,
        })
    }

    /// Cheap structural validation before anything is indexed.
    fn validate_setup(&mut self, op: BooleanOp, operands: &[SolidId]) -> Result<()> {
        if self.options.fuzzy_value < 0.0 {
            return Err(BooleanError::Tolerance {
                tolerance: 0.0,
                fuzzy: self.options.fuzzy_value,
            }
            .into());
        }
        if matches!(op, BooleanOp::Cut | BooleanOp::CutReverse)
            && (self.objects.is_empty() || self.tools.is_empty())
        {
            return Err(self.input_error("cut needs at least one object and one tool", None));
        }
        if operands.len() < 2 {
            return Err(self.input_error("the operation needs at least two operands", None));
        }
        for i in 0..operands.len() {
            for j in i + 1..operands.len() {
                if operands[i] == operands[j] {
                    return Err(
                        self.input_error("the same solid was passed as two operands", None)
                    );
                }
            }
        }
        for &solid in operands {
            let data = self.store.solid(solid)?;
            let shell = self.store.shell(data.outer_shell)?;
            if !shell.is_closed || shell.faces.is_empty() {
                return Err(self.input_error("operand outer shell is open", None));
            }
        }
        Ok(())
    }

    /// Geometry validation against the indexed operands: tolerance
    /// budget, orientation, self-intersection.
    fn validate_operands(&mut self, ds: &IntersectionStore, ctx: &IntersectContext) -> Result<()> {
        let mut max_tolerance = 0.0_f64;
        for index in 0..ds.len() {
            max_tolerance = max_tolerance.max(ds.entry(index).tolerance);
        }
        if max_tolerance > MAX_OPERAND_TOLERANCE {
            return Err(BooleanError::Tolerance {
                tolerance: max_tolerance,
                fuzzy: self.options.fuzzy_value,
            }
            .into());
        }

        if self.options.check_inverted {
            for operand in 0..ds.operand_count() {
                if let Some(volume) = self.operand_volume(ds, operand)? {
                    if volume < 0.0 {
                        self.report.error(DiagnosticCode::InvertedOperand, vec![]);
                        return Err(self.input_error("operand shell encloses negative volume", None));
                    }
                }
            }
        }

        self.reject_self_intersections(ds, ctx)
    }

    /// Signed volume of an operand, `None` when a face kind has no
    /// closed-form contribution.
    fn operand_volume(&self, ds: &IntersectionStore, operand: usize) -> Result<Option<f64>> {
        let mut volume = 0.0;
        for &face_index in &ds.operand(operand).faces {
            let face_id = ds.face_id(face_index)?;
            let face = self.store.face(face_id)?;
            match &face.surface {
                FaceSurface::Plane(plane) => {
                    let polygon = self.store.face_outer_polygon(face_id)?;
                    if polygon.is_empty() {
                        return Ok(None);
                    }
                    let n_eff = if face.same_sense {
                        *plane.plane_normal()
                    } else {
                        -plane.plane_normal()
                    };
                    let mut area = crate::math::polygon_3d::polygon_area_3d(
                        &polygon,
                        plane.plane_normal(),
                    );
                    for &hole in &face.inner_wires {
                        area -= crate::math::polygon_3d::polygon_area_3d(
                            &self.store.wire_polygon(hole)?,
                            plane.plane_normal(),
                        );
                    }
                    volume += polygon[0].coords.dot(&n_eff) * area / 3.0;
                }
                FaceSurface::Sphere(sphere) => {
                    let wire = self.store.wire(face.outer_wire)?;
                    if !wire.edges.is_empty() {
                        return Ok(None);
                    }
                    let r = sphere.radius();
                    let v = 4.0 / 3.0 * std::f64::consts::PI * r * r * r;
                    volume += if face.same_sense { v } else { -v };
                }
                FaceSurface::Cylinder(_) => return Ok(None),
            }
        }
        Ok(Some(volume))
    }

    /// A self-intersecting operand is fatal before any pairwise work.
    fn reject_self_intersections(
        &mut self,
        ds: &IntersectionStore,
        ctx: &IntersectContext,
    ) -> Result<()> {
        for operand in 0..ds.operand_count() {
            let faces = &ds.operand(operand).faces;
            for (i, &fa) in faces.iter().enumerate() {
                for &fb in &faces[i + 1..] {
                    let tol = ctx.pair_tolerance(ds, fa, fb);
                    if !ds.entry(fa).bounds.overlaps(&ds.entry(fb).bounds, tol) {
                        continue;
                    }
                    if self.faces_share_a_vertex(ds, fa, fb, tol)? {
                        continue;
                    }
                    let found = match intersect_pair(self.store, ds, ctx, fa, fb) {
                        Ok(found) => found,
                        // A non-convergent self-pair is not proof of
                        // self-intersection.
                        Err(CarvelError::Boolean(BooleanError::Intersection { .. })) => continue,
                        Err(error) => return Err(error),
                    };
                    for interference in found {
                        if let InterferencePayload::Section { points } = &interference.payload {
                            let length: f64 = points
                                .windows(2)
                                .map(|pair| (pair[1] - pair[0]).norm())
                                .sum();
                            if length > tol * 10.0 {
                                self.report.error(
                                    DiagnosticCode::SelfIntersectingOperand,
                                    vec![fa, fb],
                                );
                                return Err(self.input_error(
                                    "operand faces intersect each other",
                                    Some(fa),
                                ));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn faces_share_a_vertex(
        &self,
        ds: &IntersectionStore,
        fa: ShapeIndex,
        fb: ShapeIndex,
        tol: f64,
    ) -> Result<bool> {
        let pa = self.store.face_outer_polygon(ds.face_id(fa)?)?;
        let pb = self.store.face_outer_polygon(ds.face_id(fb)?)?;
        Ok(pa
            .iter()
            .any(|p| pb.iter().any(|q| points_equal(p, q, tol))))
    }

    /// Broad phase: per-operand box trees, pairwise sweeps, optional
    /// oriented-box refinement.
    fn broad_phase(&mut self, ds: &IntersectionStore, ctx: &IntersectContext) -> Vec<(ShapeIndex, ShapeIndex)> {
        let margin = ctx.tolerance + ctx.fuzzy;

        // One tree per operand over all of its sub-shapes.
        let mut items: Vec<Vec<ShapeIndex>> = Vec::with_capacity(ds.operand_count());
        let mut trees: Vec<BoxTree> = Vec::with_capacity(ds.operand_count());
        for operand in 0..ds.operand_count() {
            let shapes = ds.operand(operand);
            let all: Vec<ShapeIndex> = shapes
                .vertices
                .iter()
                .chain(shapes.edges.iter())
                .chain(shapes.faces.iter())
                .copied()
                .collect();
            let boxes: Vec<BoundingBox> = all
                .iter()
                .map(|&s| ds.entry(s).bounds.enlarged(ds.entry(s).tolerance + margin))
                .collect();
            trees.push(BoxTree::build(&boxes));
            items.push(all);
        }

        let oriented = self
            .options
            .use_oriented_boxes
            .then(|| self.oriented_boxes(ds, margin));

        let mut pairs = Vec::new();
        for a in 0..ds.operand_count() {
            for b in a + 1..ds.operand_count() {
                for (ia, ib) in pairs_of(&trees[a], &trees[b], margin) {
                    let (sa, sb) = (items[a][ia], items[b][ib]);
                    if let Some(obbs) = &oriented {
                        if let (Some(oa), Some(ob)) = (&obbs[sa], &obbs[sb]) {
                            if !oa.overlaps(ob) {
                                self.report.stats.oriented_box_rejects += 1;
                                continue;
                            }
                        }
                    }
                    pairs.push((sa, sb));
                }
            }
        }
        pairs.sort_unstable();
        self.report.stats.candidate_pairs = pairs.len();
        pairs
    }

    /// Tight oriented boxes for edges (direction frame) and planar
    /// faces (normal frame).
    fn oriented_boxes(&self, ds: &IntersectionStore, margin: f64) -> Vec<Option<OrientedBox>> {
        let mut boxes = Vec::with_capacity(ds.len());
        for index in 0..ds.len() {
            let obb = match ds.entry(index).kind() {
                ShapeKind::Vertex => None,
                ShapeKind::Edge => ds.edge_id(index).ok().and_then(|id| {
                    let edge = self.store.edge(id).ok()?;
                    let (EdgeCurve::Line(line), Ok(p0), Ok(p1)) = (
                        &edge.curve,
                        edge.curve.evaluate(edge.t_start),
                        edge.curve.evaluate(edge.t_end),
                    ) else {
                        return None;
                    };
                    OrientedBox::fit(&[p0, p1], line.direction()).map(|b| b.enlarged(margin))
                }),
                ShapeKind::Face => ds.face_id(index).ok().and_then(|id| {
                    let face = self.store.face(id).ok()?;
                    let FaceSurface::Plane(plane) = &face.surface else {
                        return None;
                    };
                    let polygon = self.store.face_outer_polygon(id).ok()?;
                    OrientedBox::fit(&polygon, plane.plane_normal()).map(|b| b.enlarged(margin))
                }),
            };
            boxes.push(obb);
        }
        boxes
    }

    /// Narrow phase: one task per candidate pair, batched around
    /// cancellation checks, per-edge events appended under the DS
    /// locks, interferences merged back in deterministic order.
    fn narrow_phase(
        &mut self,
        ds: &mut IntersectionStore,
        ctx: &IntersectContext,
        pairs: &[(ShapeIndex, ShapeIndex)],
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<()> {
        let glue_on = self.options.glue == GlueOption::On;

        for batch in pairs.chunks(BATCH) {
            self.check_cancel()?;

            let store: &TopologyStore = self.store;
            let ds_ref: &IntersectionStore = ds;
            let solve = |&(a, b): &(ShapeIndex, ShapeIndex)| -> Result<(Vec<Interference>, bool)> {
                // Glue path: coincident faces skip the full solver.
                if glue_on
                    && ds_ref.entry(a).kind() == ShapeKind::Face
                    && ds_ref.entry(b).kind() == ShapeKind::Face
                {
                    if let Some(coincident) = detect_coincident_faces(store, ds_ref, ctx, a, b)? {
                        paves::record_interference_events(store, ds_ref, &coincident)?;
                        return Ok((vec![coincident], true));
                    }
                }
                let found = intersect_pair(store, ds_ref, ctx, a, b)?;
                for interference in &found {
                    paves::record_interference_events(store, ds_ref, interference)?;
                }
                Ok((found, false))
            };

            let outcomes: Vec<Result<(Vec<Interference>, bool)>> = match pool {
                Some(pool) if batch.len() > 1 => {
                    pool.install(|| batch.par_iter().map(solve).collect())
                }
                _ => batch.iter().map(solve).collect(),
            };

            for outcome in outcomes {
                match outcome {
                    Ok((found, glued)) => {
                        if glued {
                            self.report.stats.glued_pairs += 1;
                        } else {
                            self.report.stats.narrow_solves += 1;
                        }
                        self.report.stats.interferences += found.len();
                        ds.add_interferences(found);
                    }
                    Err(CarvelError::Boolean(BooleanError::Intersection { a, b })) => {
                        // Recoverable: log, record, treat the pair as
                        // non-interfering.
                        warn!(a, b, "narrow-phase solver did not converge; pair skipped");
                        self.report
                            .warn(DiagnosticCode::SolverDidNotConverge, vec![a, b]);
                        self.report.stats.narrow_solves += 1;
                    }
                    Err(error) => return Err(error),
                }
            }
        }
        Ok(())
    }

    /// Face splitting, fanned out per face when the pool is enabled.
    fn split_phase(
        &mut self,
        ds: &IntersectionStore,
        ctx: &IntersectContext,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<Vec<FaceFragment>> {
        let Some(pool) = pool else {
            return split::split_faces(self.store, ds, ctx, &mut self.report);
        };

        let faces: Vec<(usize, ShapeIndex)> = (0..ds.operand_count())
            .flat_map(|op| ds.operand(op).faces.iter().map(move |&f| (op, f)))
            .collect();

        let store: &TopologyStore = self.store;
        let per_face: Vec<Result<(Vec<FaceFragment>, Report)>> = pool.install(|| {
            faces
                .par_iter()
                .map(|&(operand, face)| {
                    let mut local = Vec::new();
                    let mut local_report = Report::new();
                    split::face::split_one_face(
                        store,
                        ds,
                        ctx,
                        &mut local_report,
                        face,
                        operand,
                        &mut local,
                    )?;
                    Ok((local, local_report))
                })
                .collect()
        });

        let mut fragments = Vec::new();
        for outcome in per_face {
            let (local, local_report) = outcome?;
            fragments.extend(local);
            self.report.merge(local_report);
        }
        self.report.stats.fragments = fragments.len();
        Ok(fragments)
    }

    /// Classification, one task per split element.
    fn classify_phase(
        &mut self,
        ds: &IntersectionStore,
        ctx: &IntersectContext,
        fragments: &[FaceFragment],
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<Vec<Vec<(usize, Classification)>>> {
        let operand_count = ds.operand_count();
        let store: &TopologyStore = self.store;

        let classify_one = |fragment: &FaceFragment| -> Result<Vec<(usize, Classification)>> {
            let mut states = Vec::with_capacity(operand_count - 1);
            for other in 0..operand_count {
                if other == fragment.operand {
                    continue;
                }
                let classification = classify_fragment(store, ds, ctx, fragment, other)?;
                states.push((other, classification));
            }
            Ok(states)
        };

        let mut classified = Vec::with_capacity(fragments.len());
        for batch in fragments.chunks(BATCH) {
            self.check_cancel()?;
            let outcomes: Vec<Result<Vec<(usize, Classification)>>> = match pool {
                Some(pool) if batch.len() > 1 => {
                    pool.install(|| batch.par_iter().map(classify_one).collect())
                }
                _ => batch.iter().map(classify_one).collect(),
            };
            for (fragment, outcome) in batch.iter().zip(outcomes) {
                let states = outcome?;
                if states.iter().any(|(_, c)| c.ambiguous) {
                    self.report.warn(
                        DiagnosticCode::AmbiguousClassification,
                        vec![fragment.source_face],
                    );
                }
                classified.push(states);
            }
        }
        Ok(classified)
    }

    /// Applies the truth table to every fragment.
    fn select(
        &self,
        op: BooleanOp,
        fragments: &[FaceFragment],
        classified: &[Vec<(usize, Classification)>],
    ) -> Vec<(FaceFragment, KeepDecision)> {
        let object_count = self.objects.len();
        fragments
            .iter()
            .zip(classified)
            .map(|(fragment, states)| {
                let in_objects = fragment.operand < object_count;
                let group = match (op, in_objects) {
                    (BooleanOp::CutReverse, true) => OperandGroup::Tool,
                    (BooleanOp::CutReverse, false) | (_, true) => OperandGroup::Object,
                    (_, false) => OperandGroup::Tool,
                };
                let combined = combine_states(states);
                let decision = decide(op, group, combined, fragment.operand);
                (fragment.clone(), decision)
            })
            .collect()
    }

    fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| {
                BooleanError::Input {
                    reason: format!("worker pool construction failed: {e}"),
                    shape: None,
                }
                .into()
            })
    }

    fn input_error(&mut self, reason: &str, shape: Option<ShapeIndex>) -> CarvelError {
        self.report.error(DiagnosticCode::MalformedOperand, shape.into_iter().collect());
        BooleanError::Input {
            reason: reason.into(),
            shape,
        }
        .into()
    }
}
