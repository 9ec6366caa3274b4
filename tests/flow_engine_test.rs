// ==========================================
// StationFlowEngine 集成测试
// ==========================================
// 测试范围:
// 1. 路线建立与活动工步解析
// 2. 工步推进与状态前置条件守卫
// 3. 质检机位/工步判定
// ==========================================


use test_helpers::TestEnv;
use ticket_flow::domain::{check_ordering_invariant, StepStatus};
use ticket_flow::engine::WorkflowError;

// ==========================================
// 路线建立与活动工步
// ==========================================

#[test]
fn test_establish_route_首步即为活动工步() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("QC", "QC-1", "成品质检", true);
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("QC", None)]);

    let active = env
        .flow_engine
        .active_step("T-001")
        .expect("查询活动工步失败")
        .expect("应存在活动工步");

    assert_eq!(active.seq_no, 0);
    assert_eq!(active.status, StepStatus::Current);
    assert!(active.started_at.is_some(), "CURRENT 工步应记录开工时间");

    // 顺序不变量成立
    let steps = env.flow_repo.find_by_ticket("T-001").unwrap();
    assert!(check_ordering_invariant(&steps).is_none());
}

#[test]
fn test_advance_step_推进并晋升后继() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("POLISH", "POL", "打磨", false);
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("POLISH", Some("op-b"))]);

    env.flow_engine.advance_step("T-001", 0).expect("推进失败");

    let steps = env.flow_repo.find_by_ticket("T-001").unwrap();
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert!(steps[0].completed_at.is_some());
    assert_eq!(steps[1].status, StepStatus::Current);
    assert!(check_ordering_invariant(&steps).is_none());
}

#[test]
fn test_advance_step_末步完成后无活动工步() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_route("T-001", &[("CUT", Some("op-a"))]);

    env.flow_engine.advance_step("T-001", 0).expect("推进失败");

    assert!(env
        .flow_engine
        .active_step("T-001")
        .expect("查询失败")
        .is_none());
}

// ==========================================
// 状态前置条件守卫
// ==========================================

#[test]
fn test_advance_step_非CURRENT工步推进被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("POLISH", "POL", "打磨", false);
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("POLISH", Some("op-b"))]);

    // 越过 CURRENT 工步推进 PENDING 工步
    let result = env.flow_engine.advance_step("T-001", 1);
    match result {
        Err(WorkflowError::InvalidTransition { from, expected, .. }) => {
            assert_eq!(from, "PENDING");
            assert_eq!(expected, "CURRENT");
        }
        other => panic!("应返回 InvalidTransition, 实际: {:?}", other),
    }

    // 重复推进已完成的工步
    env.flow_engine.advance_step("T-001", 0).expect("推进失败");
    let result = env.flow_engine.advance_step("T-001", 0);
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidTransition { .. })
    ));

    // 两次失败都不应破坏顺序不变量
    let steps = env.flow_repo.find_by_ticket("T-001").unwrap();
    assert!(check_ordering_invariant(&steps).is_none());
}

#[test]
fn test_advance_step_不存在的工步报NotFound() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_route("T-001", &[("CUT", Some("op-a"))]);

    let result = env.flow_engine.advance_step("T-001", 99);
    assert!(matches!(
        result,
        Err(WorkflowError::Repository(
            ticket_flow::repository::RepositoryError::NotFound { .. }
        ))
    ));
}

// ==========================================
// 质检判定与前驱追溯
// ==========================================

#[test]
fn test_is_gate_step_显式标志与关键字回退() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("QC", "H07", "成品质检", false); // 标志未迁移, 名称含"质检"
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("QC", None)]);

    let steps = env.flow_repo.find_by_ticket("T-001").unwrap();
    assert!(!env.flow_engine.is_gate_step(&steps[0]).unwrap());
    assert!(env.flow_engine.is_gate_step(&steps[1]).unwrap());
}

#[test]
fn test_predecessor_of_追溯前驱() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("QC", "QC-1", "质检", true);
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("QC", None)]);

    let pred = env
        .flow_engine
        .predecessor_of("T-001", 1)
        .expect("查询失败")
        .expect("应存在前驱");
    assert_eq!(pred.station_id, "CUT");
    assert_eq!(pred.operator_id.as_deref(), Some("op-a"));

    // 首步无前驱
    assert!(env
        .flow_engine
        .predecessor_of("T-001", 0)
        .expect("查询失败")
        .is_none());
}

#[test]
fn test_all_gate_steps_completed() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);

    // 质检工步尚在 CURRENT
    assert!(!env.flow_engine.all_gate_steps_completed("T-001").unwrap());

    env.flow_engine
        .advance_step("T-001", gate_seq)
        .expect("推进失败");
    assert!(env.flow_engine.all_gate_steps_completed("T-001").unwrap());
}

#[test]
fn test_all_gate_steps_completed_无质检工步为假() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_route("T-001", &[("CUT", Some("op-a"))]);

    env.flow_engine.advance_step("T-001", 0).expect("推进失败");
    // 全部完成但没有任何质检工步, 不视为"检毕"
    assert!(!env.flow_engine.all_gate_steps_completed("T-001").unwrap());
}
