//! End-to-end scenarios for the boolean engine.

#![allow(clippy::unwrap_used)]

use carvel::build::{make_box, make_sphere, MakeFace, MakeShell, MakeSolid, MakeWire};
use carvel::math::{polygon_3d::polygon_area_3d, Point3};
use carvel::topology::{FaceSurface, SolidId, TopologyStore};
use carvel::{
    BooleanEngine, BooleanError, BooleanOp, BooleanOptions, CarvelError, Common, Cut,
    DiagnosticCode, EngineState, Fuse, GlueOption, Section, Severity,
};

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

/// Phase logging for failing runs: `RUST_LOG=carvel=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Signed volume of a solid with planar faces, via the divergence
/// theorem.
fn solid_volume(store: &TopologyStore, solid: SolidId) -> f64 {
    let mut volume = 0.0;
    for face_id in store.solid_faces(solid).unwrap() {
        let face = store.face(face_id).unwrap();
        let FaceSurface::Plane(ref plane) = face.surface else {
            panic!("volume helper only handles planar faces");
        };
        let polygon = store.face_outer_polygon(face_id).unwrap();
        let n_eff = if face.same_sense {
            *plane.plane_normal()
        } else {
            -plane.plane_normal()
        };
        let mut area = polygon_area_3d(&polygon, plane.plane_normal());
        for &hole in &face.inner_wires {
            area -= polygon_area_3d(&store.wire_polygon(hole).unwrap(), plane.plane_normal());
        }
        volume += polygon[0].coords.dot(&n_eff) * area / 3.0;
    }
    volume
}

fn overlapping_cubes(store: &mut TopologyStore) -> (SolidId, SolidId) {
    let a = make_box(store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    let b = make_box(store, p(0.5, 0.0, 0.0), p(1.5, 1.0, 1.0)).unwrap();
    (a, b)
}

#[test]
fn fuse_overlapping_cubes_yields_one_solid_with_ten_faces() {
    init_tracing();
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let out = Fuse::new(a, b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);

    let faces = store.solid_faces(out.solids[0]).unwrap();
    assert_eq!(faces.len(), 10, "6 + 6 minus the two swallowed faces");

    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 1.5).abs() < 1e-6, "fused volume was {volume}");
}

#[test]
fn common_overlapping_cubes_is_the_shared_box() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let out = Common::new(a, b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);

    let faces = store.solid_faces(out.solids[0]).unwrap();
    assert_eq!(faces.len(), 6);

    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 0.5).abs() < 1e-6, "common volume was {volume}");

    // The result spans exactly the shared slab.
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    for face_id in store.solid_faces(out.solids[0]).unwrap() {
        for q in store.face_outer_polygon(face_id).unwrap() {
            min_x = min_x.min(q.x);
            max_x = max_x.max(q.x);
        }
    }
    assert!((min_x - 0.5).abs() < 1e-9 && (max_x - 1.0).abs() < 1e-9);
}

#[test]
fn cut_overlapping_cubes_keeps_the_left_slab() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let out = Cut::new(a, b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);
    assert_eq!(store.solid_faces(out.solids[0]).unwrap().len(), 6);

    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 0.5).abs() < 1e-6, "cut volume was {volume}");
}

#[test]
fn cut_reverse_keeps_the_right_slab() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let out = Cut::new(a, b).reversed().execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);

    let mut min_x = f64::INFINITY;
    for face_id in store.solid_faces(out.solids[0]).unwrap() {
        for q in store.face_outer_polygon(face_id).unwrap() {
            min_x = min_x.min(q.x);
        }
    }
    assert!((min_x - 1.0).abs() < 1e-9, "B minus A starts at x = 1");
    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 0.5).abs() < 1e-6);
}

#[test]
fn fuse_partitions_into_common_and_both_cuts() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let fuse = Fuse::new(a, b).execute(&mut store).unwrap();
    let common = Common::new(a, b).execute(&mut store).unwrap();
    let cut_ab = Cut::new(a, b).execute(&mut store).unwrap();
    let cut_ba = Cut::new(a, b).reversed().execute(&mut store).unwrap();

    let v = |out: &carvel::BooleanOutput| solid_volume(&store, out.solids[0]);
    let partition = v(&common) + v(&cut_ab) + v(&cut_ba);
    assert!(
        (v(&fuse) - partition).abs() < 1e-6,
        "fuse {} != common + cuts {partition}",
        v(&fuse)
    );
}

#[test]
fn fuse_of_disjoint_cubes_keeps_two_solids() {
    let mut store = TopologyStore::new();
    let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    let b = make_box(&mut store, p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0)).unwrap();

    let out = Fuse::new(a, b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 2);
    for &solid in &out.solids {
        assert_eq!(store.solid_faces(solid).unwrap().len(), 6);
    }
}

#[test]
fn common_of_disjoint_cubes_is_empty_not_an_error() {
    let mut store = TopologyStore::new();
    let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    let b = make_box(&mut store, p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0)).unwrap();

    let out = Common::new(a, b).execute(&mut store).unwrap();
    assert!(out.solids.is_empty());
    assert!(out
        .report
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::EmptyResult && d.severity == Severity::Warning));
}

#[test]
fn common_with_externally_tangent_sphere_is_empty() {
    let mut store = TopologyStore::new();
    let cube = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    // Touches the x = 1 face at a single point: touching, not overlap.
    let ball = make_sphere(&mut store, p(1.5, 0.5, 0.5), 0.5).unwrap();

    let out = Common::new(cube, ball).execute(&mut store).unwrap();
    assert!(out.solids.is_empty());
    assert_eq!(out.report.stats.interferences, 0, "tangency must collapse");
}

#[test]
fn common_of_equal_cubes_is_the_cube() {
    let mut store = TopologyStore::new();
    let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    let b = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();

    let out = Common::new(a, b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);
    assert_eq!(store.solid_faces(out.solids[0]).unwrap().len(), 6);
    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 1.0).abs() < 1e-6, "Common(A, A) must equal A");
}

#[test]
fn glue_skips_the_face_face_solver_and_emits_common_blocks() {
    let mut store = TopologyStore::new();
    let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
    let b = make_box(&mut store, p(1.0, 0.0, 0.0), p(2.0, 1.0, 1.0)).unwrap();

    let options = BooleanOptions {
        glue: GlueOption::On,
        ..BooleanOptions::default()
    };
    let out = Fuse::new(a, b).with_options(options).execute(&mut store).unwrap();

    assert!(out.report.stats.glued_pairs >= 1, "no face pair was glued");
    assert_eq!(
        out.report.stats.common_blocks, 4,
        "one common block per coincident boundary edge"
    );
    assert_eq!(out.solids.len(), 1);
    assert_eq!(store.solid_faces(out.solids[0]).unwrap().len(), 10);
    let volume = solid_volume(&store, out.solids[0]);
    assert!((volume - 2.0).abs() < 1e-6);
}

#[test]
fn self_intersecting_operand_fails_before_intersection() {
    let mut store = TopologyStore::new();

    // A "solid" whose shell is the twelve faces of two interpenetrating
    // cubes: structurally closed, geometrically self-intersecting.
    let mut faces = Vec::new();
    for (lo, hi) in [
        (p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)),
        (p(0.5, 0.5, 0.5), p(1.5, 1.5, 1.5)),
    ] {
        let helper = make_box(&mut store, lo, hi).unwrap();
        faces.extend(store.solid_faces(helper).unwrap());
    }
    let shell = MakeShell::new(faces, true).execute(&mut store).unwrap();
    let bad = MakeSolid::new(shell, vec![]).execute(&mut store).unwrap();
    let good = make_box(&mut store, p(5.0, 5.0, 5.0), p(6.0, 6.0, 6.0)).unwrap();

    let mut engine = BooleanEngine::new(&mut store);
    engine.add_object(bad);
    engine.add_object(good);
    let error = engine.execute(BooleanOp::Fuse).unwrap_err();

    assert!(matches!(
        error,
        CarvelError::Boolean(BooleanError::Input { .. })
    ));
    assert_eq!(engine.state(), EngineState::Failed);
    assert!(engine
        .report()
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::SelfIntersectingOperand));
    assert_eq!(
        engine.report().stats.narrow_solves,
        0,
        "the intersection phase must not have run"
    );
}

#[test]
fn results_are_identical_across_worker_counts() {
    let run = |workers: usize| {
        let mut store = TopologyStore::new();
        let (a, b) = overlapping_cubes(&mut store);
        let options = BooleanOptions {
            run_parallel: workers > 0,
            workers,
            ..BooleanOptions::default()
        };
        let out = Fuse::new(a, b).with_options(options).execute(&mut store).unwrap();
        let faces = store.solid_faces(out.solids[0]).unwrap().len();
        let volume = solid_volume(&store, out.solids[0]);
        (
            out.solids.len(),
            faces,
            out.report.stats.interferences,
            out.report.stats.pave_blocks,
            out.report.stats.common_blocks,
            volume,
        )
    };

    let serial = run(0);
    for workers in [1, 2, 4] {
        assert_eq!(run(workers), serial, "worker count {workers} diverged");
    }
}

#[test]
fn raising_the_fuzzy_value_never_splits_the_result() {
    let components = |fuzzy: f64, offset: f64| {
        let mut store = TopologyStore::new();
        let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
        let b = make_box(&mut store, p(offset, 0.0, 0.0), p(offset + 1.0, 1.0, 1.0)).unwrap();
        let options = BooleanOptions {
            fuzzy_value: fuzzy,
            ..BooleanOptions::default()
        };
        Fuse::new(a, b)
            .with_options(options)
            .execute(&mut store)
            .unwrap()
            .solids
            .len()
    };

    for offset in [0.5, 3.0] {
        let baseline = components(0.0, offset);
        for fuzzy in [1e-6, 1e-4] {
            assert!(
                components(fuzzy, offset) <= baseline,
                "fuzzy {fuzzy} must not add components at offset {offset}"
            );
        }
    }
}

#[test]
fn cut_of_fuse_leaves_nothing_inside_the_tool() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let fused = Fuse::new(a, b).execute(&mut store).unwrap();
    let out = Cut::new(fused.solids[0], b).execute(&mut store).unwrap();
    assert_eq!(out.solids.len(), 1);

    // B spans [0.5, 1.5] x [0, 1] x [0, 1]; no result face centroid may
    // lie strictly inside it.
    for face_id in store.solid_faces(out.solids[0]).unwrap() {
        let polygon = store.face_outer_polygon(face_id).unwrap();
        let centroid = carvel::math::polygon_3d::polygon_centroid(&polygon);
        let strictly_inside = centroid.x > 0.5 + 1e-6
            && centroid.x < 1.5 - 1e-6
            && centroid.y > 1e-6
            && centroid.y < 1.0 - 1e-6
            && centroid.z > 1e-6
            && centroid.z < 1.0 - 1e-6;
        assert!(
            !strictly_inside,
            "face centroid {centroid:?} classifies inside the tool"
        );
    }
}

#[test]
fn section_of_crossing_cubes_yields_wires() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let out = Section::new(a, b).execute(&mut store).unwrap();
    assert!(out.solids.is_empty());
    assert!(!out.section_wires.is_empty());
    for &wire in &out.section_wires {
        let data = store.wire(wire).unwrap();
        assert_eq!(data.edges.len(), 1, "one polyline edge per section wire");
    }
}

#[test]
fn cancellation_aborts_with_a_structured_failure() {
    let mut store = TopologyStore::new();
    let (a, b) = overlapping_cubes(&mut store);

    let mut engine = BooleanEngine::new(&mut store);
    engine.add_object(a);
    engine.add_object(b);
    engine.cancel_token().cancel();
    let error = engine.execute(BooleanOp::Fuse).unwrap_err();
    assert!(matches!(
        error,
        CarvelError::Boolean(BooleanError::Cancelled)
    ));
    assert_eq!(engine.state(), EngineState::Failed);
}

#[test]
fn open_operand_is_rejected() {
    let mut store = TopologyStore::new();
    let wire = MakeWire::new(vec![
        p(0.0, 0.0, 0.0),
        p(1.0, 0.0, 0.0),
        p(1.0, 1.0, 0.0),
        p(0.0, 1.0, 0.0),
    ])
    .execute(&mut store)
    .unwrap();
    let face = MakeFace::new(wire, vec![]).execute(&mut store).unwrap();
    let shell = MakeShell::new(vec![face], false).execute(&mut store).unwrap();
    // MakeSolid refuses open shells, so force the structure directly.
    let lonely = store.add_solid(carvel::topology::SolidData {
        outer_shell: shell,
        inner_shells: vec![],
    });
    let good = make_box(&mut store, p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0)).unwrap();

    let error = Fuse::new(lonely, good).execute(&mut store).unwrap_err();
    assert!(matches!(
        error,
        CarvelError::Boolean(BooleanError::Input { .. })
    ));
}
