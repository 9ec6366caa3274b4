// ==========================================
// QualityGateController 会话生命周期集成测试
// ==========================================
// 测试范围:
// 1. 开检/续检幂等
// 2. 检查项编辑与归一化
// 3. 提交前校验失败分支
// ==========================================


use test_helpers::TestEnv;
use ticket_flow::domain::LineOutcome;
use ticket_flow::engine::WorkflowError;

// ==========================================
// 开检/续检
// ==========================================

#[test]
fn test_open_or_resume_幂等返回同一会话() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);

    let first = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");
    let second = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("续检失败");

    assert_eq!(first.session_id, second.session_id, "续检应返回同一会话");
    assert_eq!(second.lines.len(), first.lines.len(), "不应重复生成检查项");
    assert!(first.lines.iter().all(|l| l.outcome == LineOutcome::Unset));
}

#[test]
fn test_open_or_resume_检查项模板来自配置() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.config
        .set_config_value("gate_checklist_labels", r#"["首检","终检"]"#)
        .expect("配置写入失败");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);

    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");
    let labels: Vec<&str> = session.lines.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["首检", "终检"]);
}

#[test]
fn test_open_or_resume_非质检机位被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_route("T-001", &[("CUT", Some("op-a"))]);

    let result = env.controller.open_or_resume("T-001", 0);
    assert!(matches!(
        result,
        Err(WorkflowError::NotGateStation { station_id }) if station_id == "CUT"
    ));
}

#[test]
fn test_open_or_resume_非CURRENT工步被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_ticket("T-001", 100);
    env.seed_station("CUT", "CUT", "下料", false);
    env.seed_station("QC", "QC-1", "质检", true);
    env.seed_route("T-001", &[("CUT", Some("op-a")), ("QC", None)]);

    // 质检工步仍为 PENDING
    let result = env.controller.open_or_resume("T-001", 1);
    assert!(matches!(
        result,
        Err(WorkflowError::InvalidTransition { from, .. }) if from == "PENDING"
    ));
}

// ==========================================
// 检查项编辑与归一化
// ==========================================

#[test]
fn test_set_line_outcome_判定归一化() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");
    let line_id = session.lines[0].line_id.clone();

    // FAIL 未给数量时按 1 计
    let updated = env
        .controller
        .set_line_outcome(&session.session_id, &line_id, LineOutcome::Fail, None, Some("划伤"))
        .expect("更新失败");
    assert_eq!(updated.lines[0].fail_qty, Some(1));
    assert_eq!(updated.lines[0].fail_reason.as_deref(), Some("划伤"));

    // 改判 PASS 时清空数量与原因
    let updated = env
        .controller
        .set_line_outcome(&session.session_id, &line_id, LineOutcome::Pass, Some(5), Some("残留"))
        .expect("更新失败");
    assert_eq!(updated.lines[0].outcome, LineOutcome::Pass);
    assert!(updated.lines[0].fail_qty.is_none());
    assert!(updated.lines[0].fail_reason.is_none());
}

#[test]
fn test_set_line_outcome_不存在的检查项报NotFound() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");

    let result = env.controller.set_line_outcome(
        &session.session_id,
        "no-such-line",
        LineOutcome::Pass,
        None,
        None,
    );
    assert!(matches!(
        result,
        Err(WorkflowError::Repository(
            ticket_flow::repository::RepositoryError::NotFound { .. }
        ))
    ));
}

// ==========================================
// 提交前校验
// ==========================================

#[test]
fn test_submit_全未判定被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");

    let result = env.controller.submit(&session.session_id);
    assert!(matches!(result, Err(WorkflowError::NoLinesChecked)));

    // 校验失败不得改动任何状态
    let ticket = env.ticket_repo.find_by_id("T-001").unwrap();
    assert_eq!(ticket.accepted_qty, 0);
    let reloaded = env.gate_repo.find_by_id(&session.session_id).unwrap();
    assert!(!reloaded.is_submitted());
    assert!(env.rework_repo.find_by_ticket("T-001").unwrap().is_empty());
}

#[test]
fn test_submit_草稿数据未落定被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");

    // 第一项判 PASS, 第二项留下草稿数量但未判定
    env.controller
        .set_line_outcome(
            &session.session_id,
            &session.lines[0].line_id,
            LineOutcome::Pass,
            None,
            None,
        )
        .expect("更新失败");
    env.controller
        .set_line_outcome(
            &session.session_id,
            &session.lines[1].line_id,
            LineOutcome::Unset,
            Some(3),
            None,
        )
        .expect("更新失败");

    let result = env.controller.submit(&session.session_id);
    assert!(matches!(result, Err(WorkflowError::UncommittedData { .. })));
}

#[test]
fn test_submit_不合格项缺原因被拒() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let gate_seq = env.seed_standard_route_at_gate("T-001", 100);
    let session = env
        .controller
        .open_or_resume("T-001", gate_seq)
        .expect("开检失败");

    env.controller
        .set_line_outcome(
            &session.session_id,
            &session.lines[0].line_id,
            LineOutcome::Fail,
            Some(2),
            None,
        )
        .expect("更新失败");

    let result = env.controller.submit(&session.session_id);
    assert!(matches!(
        result,
        Err(WorkflowError::MissingFailReason { .. })
    ));
}
