use assert_approx_eq::assert_approx_eq;

use super::*;
use crate::tests::palencia;

#[test]
fn construction_and_lookup() {
    let system = palencia();
    assert_eq!(system.proc_count(), 3);
    assert_eq!(system.task_count(), 6);
    assert_eq!(system.flow_ids().count(), 2);

    let cpu2 = system.processor("cpu2").unwrap();
    assert_eq!(system[cpu2].name, "cpu2");
    assert!(system.processor("cpu9").is_none());

    let a3 = system.task("a3").unwrap();
    assert_eq!(system[a3].processor, cpu2);
    let flow1 = system.flow("flow1").unwrap();
    assert_eq!(system[a3].flow(), flow1);
    assert_eq!(system[flow1].tasks().len(), 3);
}

#[test]
fn chain_structure() {
    let system = palencia();
    let a1 = system.task("a1").unwrap();
    let a2 = system.task("a2").unwrap();
    let a3 = system.task("a3").unwrap();

    assert_eq!(system.predecessor(a1), None);
    assert_eq!(system.predecessor(a2), Some(a1));
    assert_eq!(system.predecessor(a3), Some(a2));
    assert_eq!(system.downstream(a1), &[a2, a3]);
    assert!(system.downstream(a3).is_empty());
}

#[test]
fn jitter_follows_predecessor_wcrt() {
    let mut system = palencia();
    let a1 = system.task("a1").unwrap();
    let a2 = system.task("a2").unwrap();

    // unknown predecessor response time means zero jitter
    assert_eq!(system.jitter(a1), 0.0);
    assert_eq!(system.jitter(a2), 0.0);

    system[a1].wcrt = Some(7.5);
    assert_eq!(system.jitter(a2), 7.5);
    assert_eq!(system.jitter(a1), 0.0);
}

#[test]
fn utilization_and_hyperperiod() {
    let system = palencia();
    let cpu2 = system.processor("cpu2").unwrap();
    assert_approx_eq!(system.utilization(cpu2), 20.0 / 30.0 + 5.0 / 40.0);
    assert_approx_eq!(system.max_utilization(), 20.0 / 30.0 + 5.0 / 40.0);
    assert_eq!(system.hyperperiod(), 120.0);
}

#[test]
fn schedulability_and_slack() {
    let mut system = palencia();
    let flow1 = system.flow("flow1").unwrap();

    assert!(!system.flow_is_schedulable(flow1));
    assert_eq!(system.flow_slack(flow1), f64::NEG_INFINITY);
    assert!(system.avg_flow_wcrt().is_none());

    let a3 = system.task("a3").unwrap();
    system[a3].wcrt = Some(45.0);
    assert!(system.flow_is_schedulable(flow1));
    assert_approx_eq!(system.flow_slack(flow1), (60.0 - 45.0) / 60.0);

    // the other flow is still unknown, so the system is not schedulable
    assert!(!system.is_schedulable());
    assert_eq!(system.slack(), f64::NEG_INFINITY);

    let a6 = system.task("a6").unwrap();
    system[a6].wcrt = Some(80.0);
    assert!(system.is_schedulable());
    assert_approx_eq!(system.slack(), 0.0);
    assert_approx_eq!(system.avg_flow_wcrt().unwrap(), (45.0 + 80.0) / 2.0);
}

#[test]
fn rejects_unknown_processor() {
    let mut system = System::new();
    system.add_processor(Processor::fixed_priority("cpu"));
    let err = system
        .add_flow(FlowDef::new("flow", 10.0, 10.0).task(TaskDef::new("t", 1.0, "nic")))
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::UnknownProcessor {
            task: "t".to_string(),
            processor: "nic".to_string(),
        }
    );
    // the failed flow left nothing behind
    assert_eq!(system.task_count(), 0);
    assert_eq!(system.flow_ids().count(), 0);
}

#[test]
fn rejects_empty_flow() {
    let mut system = System::new();
    let err = system.add_flow(FlowDef::new("hollow", 10.0, 10.0)).unwrap_err();
    assert_eq!(
        err,
        ModelError::EmptyFlow {
            flow: "hollow".to_string()
        }
    );
}

#[test]
fn rejects_bad_execution_times() {
    let mut system = System::new();
    system.add_processor(Processor::fixed_priority("cpu"));
    let err = system
        .add_flow(FlowDef::new("flow", 10.0, 10.0).task(TaskDef::new("t", 0.0, "cpu")))
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidWcet { .. }));

    let err = system
        .add_flow(FlowDef::new("flow", 10.0, 10.0).task(TaskDef::new("t", 1.0, "cpu").bcet(-1.0)))
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidBcet { .. }));
}

#[test]
fn build_in_one_call() {
    let system = System::build(
        vec![Processor::fixed_priority("cpu")],
        vec![FlowDef::new("flow", 20.0, 20.0)
            .task(TaskDef::new("t1", 1.0, "cpu").kind(TaskKind::Offset))
            .task(TaskDef::new("t2", 2.0, "cpu"))],
    )
    .unwrap();
    assert_eq!(system.task_count(), 2);
    let t1 = system.task("t1").unwrap();
    assert_eq!(system[t1].kind, TaskKind::Offset);
    assert_eq!(system.period(t1), 20.0);
}
