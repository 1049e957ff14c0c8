use assert_approx_eq::assert_approx_eq;

use crate::analysis::{higher_priority, init_wcrt, Analysis};
use crate::system::{FlowDef, Processor, System, TaskDef};
use crate::tests::{edf_chain, palencia, three_task_chain};

use super::{HolisticFixedPriority, HolisticGlobalEdf, HolisticLocalEdf};

fn wcrts(system: &System) -> Vec<Option<f64>> {
    system.task_ids().map(|t| system[t].wcrt).collect()
}

#[test]
fn init_seeds_cumulative_wcet() {
    let mut system = three_task_chain();
    init_wcrt(&mut system);
    assert_eq!(wcrts(&system), vec![Some(2.0), Some(7.0), Some(27.0)]);
}

#[test]
fn equal_priorities_interfere_both_ways() {
    let system = System::build(
        vec![Processor::fixed_priority("cpu")],
        vec![
            FlowDef::new("f1", 10.0, 10.0).task(TaskDef::new("x", 1.0, "cpu").priority(5.0)),
            FlowDef::new("f2", 10.0, 10.0).task(TaskDef::new("y", 1.0, "cpu").priority(5.0)),
        ],
    )
    .unwrap();
    let x = system.task("x").unwrap();
    let y = system.task("y").unwrap();
    assert_eq!(higher_priority(&system, x), vec![y]);
    assert_eq!(higher_priority(&system, y), vec![x]);
}

#[test]
fn fp_palencia_reference() {
    let mut system = palencia();
    HolisticFixedPriority::new().apply(&mut system);

    let expected = [5.0, 17.0, 42.0, 5.0, 15.0, 30.0];
    for (t, &e) in system.task_ids().zip(&expected) {
        assert_approx_eq!(system[t].wcrt.unwrap(), e);
    }
    assert!(system.is_schedulable());
    assert_approx_eq!(system.slack(), (60.0 - 42.0) / 60.0);
}

#[test]
fn fp_three_task_chain() {
    let mut system = three_task_chain();
    HolisticFixedPriority::new().apply(&mut system);

    // The busy window of each task already contains its predecessor's
    // interference; the holistic equations add the predecessor's
    // response time again as jitter, on purpose.
    assert_eq!(wcrts(&system), vec![Some(2.0), Some(9.0), Some(36.0)]);

    for t in system.task_ids() {
        let wcrt = system[t].wcrt.unwrap();
        assert!(wcrt >= system[t].wcet);
        if let Some(pred) = system.predecessor(t) {
            assert!(wcrt >= system[pred].wcrt.unwrap() + system[t].wcet);
        }
    }
}

/// One CPU at 140% utilization: the low-priority chain diverges past the
/// limit while the high-priority task stays fine.
fn overloaded() -> System {
    System::build(
        vec![Processor::fixed_priority("cpu")],
        vec![
            FlowDef::new("hog", 10.0, 10.0).task(TaskDef::new("a", 8.0, "cpu").priority(10.0)),
            FlowDef::new("starved", 10.0, 10.0)
                .task(TaskDef::new("b1", 5.0, "cpu").priority(1.0))
                .task(TaskDef::new("b2", 1.0, "cpu").priority(5.0)),
        ],
    )
    .unwrap()
}

#[test]
fn fp_limit_exceeded_floods_the_flow() {
    let mut system = overloaded();
    let analysis = HolisticFixedPriority {
        limit_factor: 1.0,
        reset: false,
        verbose: false,
    };
    analysis.apply(&mut system);

    // b1's busy window blows past the limit at w = 14; the bound is
    // copied into the rest of the flow so it stays finite.
    assert_eq!(wcrts(&system), vec![Some(8.0), Some(14.0), Some(14.0)]);
    assert!(!system.is_schedulable());
}

#[test]
fn fp_limit_exceeded_with_reset_clears_everything() {
    let mut system = overloaded();
    let analysis = HolisticFixedPriority {
        limit_factor: 1.0,
        reset: true,
        verbose: false,
    };
    analysis.apply(&mut system);
    assert_eq!(wcrts(&system), vec![None, None, None]);
}

#[test]
fn global_edf_chain() {
    let mut system = edf_chain(false);
    HolisticGlobalEdf::new().apply(&mut system);
    assert_eq!(wcrts(&system), vec![Some(5.0), Some(8.0)]);
    assert!(system.is_schedulable());
}

#[test]
fn local_edf_chain() {
    let mut system = edf_chain(true);
    HolisticLocalEdf::new().apply(&mut system);
    assert_eq!(wcrts(&system), vec![Some(3.0), Some(8.0)]);
    assert!(system.is_schedulable());
}

#[test]
fn edf_single_task_is_its_own_wcet() {
    let build = || {
        System::build(
            vec![Processor::local_edf("cpu")],
            vec![FlowDef::new("f", 10.0, 10.0).task(TaskDef::new("t", 2.0, "cpu").deadline(10.0))],
        )
        .unwrap()
    };

    let mut system = build();
    HolisticGlobalEdf::new().apply(&mut system);
    assert_eq!(wcrts(&system), vec![Some(2.0)]);

    let mut system = build();
    HolisticLocalEdf::new().apply(&mut system);
    assert_eq!(wcrts(&system), vec![Some(2.0)]);
}

#[test]
fn edf_analyses_reject_fp_systems() {
    for local in [false, true] {
        let mut system = palencia();
        // even previously computed response times are cleared
        HolisticFixedPriority::new().apply(&mut system);
        assert!(system.is_schedulable());

        if local {
            HolisticLocalEdf::new().apply(&mut system);
        } else {
            HolisticGlobalEdf::new().apply(&mut system);
        }
        assert!(wcrts(&system).iter().all(|w| w.is_none()));
        assert!(!system.is_schedulable());
    }
}

/// A chained EDF flow at 130% utilization: the busy-period iteration
/// has no fixed point, so the bounded iteration takes the divergence
/// path.
fn overloaded_edf() -> System {
    System::build(
        vec![Processor::global_edf("cpu")],
        vec![FlowDef::new("f", 10.0, 10.0)
            .task(TaskDef::new("t1", 5.0, "cpu").deadline(4.0))
            .task(TaskDef::new("t2", 8.0, "cpu").deadline(6.0))],
    )
    .unwrap()
}

#[test]
fn global_edf_overload_clears_by_default() {
    let mut system = overloaded_edf();
    let analysis = HolisticGlobalEdf {
        limit_factor: 1.0,
        ..HolisticGlobalEdf::new()
    };
    analysis.apply(&mut system);
    assert_eq!(wcrts(&system), vec![None, None]);
}

#[test]
fn global_edf_overload_propagates_without_reset() {
    let mut system = overloaded_edf();
    let analysis = HolisticGlobalEdf {
        limit_factor: 1.0,
        reset: false,
        verbose: false,
    };
    analysis.apply(&mut system);

    // the busy period grows 8, 21, ... and aborts at the first value
    // past the 1 x deadline cap; t1 keeps its initialization value
    assert_eq!(wcrts(&system), vec![Some(5.0), Some(21.0)]);
    assert!(!system.is_schedulable());
}
