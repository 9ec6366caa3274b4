// ==========================================
// ReworkOrchestrator / ApprovalGate 集成测试
// ==========================================
// 测试范围:
// 1. 建单校验 (数量上限 / 路线完整性)
// 2. 审批门: 批准/驳回终态与 PENDING 守卫
// 3. 路线推进顺序与父工步列表隔离
// ==========================================


use test_helpers::TestEnv;
use ticket_flow::domain::{ApprovalStatus, LineOutcome, RoadmapStatus, RoadmapStep};
use ticket_flow::engine::{ReworkOrchestrator, WorkflowError};

/// 走完首检并留下 8 件不合格, 返回创建的返修单ID与质检工步序号
fn seed_failed_inspection(env: &TestEnv, ticket_id: &str) -> (String, i64) {
    let gate_seq = env.seed_standard_route_at_gate(ticket_id, 100);
    let session = env
        .controller
        .open_or_resume(ticket_id, gate_seq)
        .expect("开检失败");
    env.controller
        .set_line_outcome(
            &session.session_id,
            &session.lines[0].line_id,
            LineOutcome::Fail,
            Some(8),
            Some("表面划伤"),
        )
        .expect("更新失败");
    let outcome = env.controller.submit(&session.session_id).expect("提交失败");
    (outcome.rework_order_id.expect("应创建返修单"), gate_seq)
}

// ==========================================
// 建单校验
// ==========================================

#[test]
fn test_create_order_返修数量超出不合格被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let steps = env.flow_repo.find_by_ticket("T-001").unwrap();
    let roadmap = ReworkOrchestrator::propose_roadmap(&steps, gate_seq);

    let result = env.orchestrator.create_order(
        "T-001", gate_seq, 8, 10, "数量超限", roadmap.clone(), None,
    );
    assert!(matches!(
        result,
        Err(WorkflowError::ReworkQtyExceedsFail {
            rework_qty: 10,
            fail_qty: 8
        })
    ));

    // 数量为零同样被拒
    let result = env
        .orchestrator
        .create_order("T-001", gate_seq, 8, 0, "零数量", roadmap, None);
    assert!(matches!(
        result,
        Err(WorkflowError::ReworkQtyExceedsFail { .. })
    ));
}

#[test]
fn test_create_order_路线校验() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);

    // 空路线
    let result = env
        .orchestrator
        .create_order("T-001", gate_seq, 8, 8, "空路线", vec![], None);
    assert!(matches!(result, Err(WorkflowError::EmptyRoadmap)));

    // 普通工步缺操作员
    let incomplete = vec![RoadmapStep {
        operator_id: None,
        ..RoadmapStep::station(0, "CUT", "x")
    }];
    let result = env
        .orchestrator
        .create_order("T-001", gate_seq, 8, 8, "缺操作员", incomplete, None);
    assert!(matches!(
        result,
        Err(WorkflowError::IncompleteRoadmapStep { .. })
    ));
}

#[test]
fn test_create_order_序号规整与默认严重度() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.config
        .set_config_value("rework_default_severity", "APPEARANCE")
        .expect("配置写入失败");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);

    // 乱序传入, 建单后按传入顺序规整为 0..n
    let roadmap = vec![
        RoadmapStep::station(7, "CUT", "op-a"),
        RoadmapStep::reinspection(3, "QC"),
    ];
    let order = env
        .orchestrator
        .create_order("T-001", gate_seq, 8, 5, "部分返修", roadmap, None)
        .expect("建单失败");

    assert_eq!(
        order.roadmap.iter().map(|s| s.seq_no).collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert!(order
        .roadmap
        .iter()
        .all(|s| s.status == RoadmapStatus::Pending));
    assert_eq!(order.severity.to_db_str(), "APPEARANCE");
    assert_eq!(order.rework_qty, 5);
}

// ==========================================
// 审批门
// ==========================================

#[test]
fn test_approve_批准即启动首条路线工步() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, _) = seed_failed_inspection(&env, "T-001");

    let order = env.orchestrator.approve(&order_id, "supervisor").expect("审批失败");
    assert_eq!(order.approval_status, ApprovalStatus::Approved);
    assert_eq!(order.approved_by.as_deref(), Some("supervisor"));
    assert!(order.approved_at.is_some());
    assert_eq!(order.roadmap[0].status, RoadmapStatus::InProgress);
    assert!(order.roadmap[0].started_at.is_some());
}

#[test]
fn test_approve_重复审批被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, _) = seed_failed_inspection(&env, "T-001");

    env.orchestrator.approve(&order_id, "supervisor").expect("审批失败");

    // 终态不可逆: 再批/再驳都报 NotPending
    let result = env.orchestrator.approve(&order_id, "supervisor");
    assert!(matches!(
        result,
        Err(WorkflowError::NotPending { status, .. }) if status == "APPROVED"
    ));
    let result = env.orchestrator.reject(&order_id, "supervisor", "晚到的驳回");
    assert!(matches!(result, Err(WorkflowError::NotPending { .. })));
}

#[test]
fn test_reject_必须填写原因且路线永不执行() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, _) = seed_failed_inspection(&env, "T-001");

    // 空白原因被拒
    let result = env.orchestrator.reject(&order_id, "supervisor", "   ");
    assert!(matches!(result, Err(WorkflowError::EmptyRejectReason)));

    let order = env
        .orchestrator
        .reject(&order_id, "supervisor", "直接报废处理")
        .expect("驳回失败");
    assert_eq!(order.approval_status, ApprovalStatus::Rejected);
    assert_eq!(order.reject_reason.as_deref(), Some("直接报废处理"));
    assert!(order
        .roadmap
        .iter()
        .all(|s| s.status == RoadmapStatus::Pending));

    // 被驳回的返修单不可推进路线
    let result = env.orchestrator.advance_roadmap_step(&order_id, 0);
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidTransition { from, .. }) if from == "REJECTED"
    ));
}

// ==========================================
// 路线推进与隔离
// ==========================================

#[test]
fn test_advance_roadmap_step_顺序推进() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, _) = seed_failed_inspection(&env, "T-001");
    env.orchestrator.approve(&order_id, "supervisor").expect("审批失败");

    // 越过 IN_PROGRESS 工步推进后继被拒
    let result = env.orchestrator.advance_roadmap_step(&order_id, 1);
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidTransition { from, .. }) if from == "PENDING"
    ));

    // 顺序推进: 完成一步, 后继自动 IN_PROGRESS
    let order = env
        .orchestrator
        .advance_roadmap_step(&order_id, 0)
        .expect("路线推进失败");
    assert_eq!(order.roadmap[0].status, RoadmapStatus::Completed);
    assert_eq!(order.roadmap[1].status, RoadmapStatus::InProgress);
    assert!(!env.orchestrator.is_order_complete(&order_id).unwrap());
}

#[test]
fn test_返修建单前未审批时路线不动() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, _) = seed_failed_inspection(&env, "T-001");

    // PENDING 单推进路线被拒
    let result = env.orchestrator.advance_roadmap_step(&order_id, 0);
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidTransition { from, .. }) if from == "PENDING"
    ));
}

#[test]
fn test_路线与父工步列表完全隔离() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let (order_id, gate_seq) = seed_failed_inspection(&env, "T-001");

    let before = env.flow_repo.find_by_ticket("T-001").unwrap();

    env.orchestrator.approve(&order_id, "supervisor").expect("审批失败");
    let order = env.rework_repo.find_by_id(&order_id).unwrap();
    for step in &order.roadmap {
        env.orchestrator
            .advance_roadmap_step(&order_id, step.seq_no)
            .expect("路线推进失败");
    }

    // 父工步列表不因返修路线执行而增删改序
    let after = env.flow_repo.find_by_ticket("T-001").unwrap();
    assert_eq!(before.len(), after.len(), "父工步数量不应变化");
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.seq_no, a.seq_no);
        assert_eq!(b.station_id, a.station_id);
    }

    // 默认策略下质检工步保持 CURRENT
    let gate_step = env.flow_engine.step("T-001", gate_seq).unwrap();
    assert_eq!(gate_step.status, ticket_flow::domain::StepStatus::Current);
}
