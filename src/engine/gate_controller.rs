// ==========================================
// 车间工票流转系统 - 质检门控制器
// ==========================================
// 职责: 质检会话生命周期 (开检/续检 → 编辑 → 提交)、
//       合格/不合格数量清算、提交后分流 (放行 or 返修)
// 红线: 提交为终态; 提交前必须通过全部校验;
//       不合格数量 > 0 时恰好创建一张返修单
// ==========================================

use crate::config::ConfigManager;
use crate::domain::gate::{ChecklistLine, GateSession, ReconcileResult};
use crate::domain::types::{LineOutcome, StepStatus};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::flow_engine::StationFlowEngine;
use crate::engine::rework_orchestrator::ReworkOrchestrator;
use crate::repository::{GateSessionRepository, TicketRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

// ==========================================
// 数量清算 (纯函数)
// ==========================================

/// 按检查项清算合格/不合格数量
///
/// 基准数量 = 要求数量 - 已验收数量 (不为负)。
/// - 基准已知且非零: 不合格 = Σ(FAIL 项数量), 合格 = 基准 - 不合格
///   (下钳位到 0 — 未显式判废的部分默认视为合格)
/// - 无基准: 回退为仅按显式判定的检查项求和
///   (PASS 项数量缺省按 1 计)
pub fn reconcile_lines(
    lines: &[ChecklistLine],
    required_qty: i64,
    accepted_qty: i64,
) -> ReconcileResult {
    let fail_qty: i64 = lines
        .iter()
        .filter(|l| l.outcome == LineOutcome::Fail)
        .map(|l| l.fail_qty.unwrap_or(0).max(0))
        .sum();

    let baseline = (required_qty - accepted_qty).max(0);

    if baseline > 0 {
        let pass_qty = (baseline - fail_qty).max(0);
        let pass_rate_pct = ((pass_qty as f64 / baseline as f64) * 100.0).round() as i64;
        return ReconcileResult {
            pass_qty,
            fail_qty,
            total_qty: baseline,
            pass_rate_pct,
        };
    }

    // 无基准回退: 仅统计显式判定的检查项
    let pass_qty: i64 = lines
        .iter()
        .filter(|l| l.outcome == LineOutcome::Pass)
        .map(|_| 1)
        .sum();
    let total = pass_qty + fail_qty;
    let pass_rate_pct = if total > 0 {
        ((pass_qty as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };

    ReconcileResult {
        pass_qty,
        fail_qty,
        total_qty: total,
        pass_rate_pct,
    }
}

/// 提交前校验检查项
///
/// 失败分支:
/// - NoLinesChecked: 没有任何检查项给出结论
/// - UncommittedData: 填了数量/原因但结论仍为未判定
/// - MissingFailQty / MissingFailReason: 不合格项缺数量或缺原因
pub fn validate_lines_for_submit(lines: &[ChecklistLine]) -> WorkflowResult<()> {
    let checked = lines
        .iter()
        .filter(|l| l.outcome != LineOutcome::Unset)
        .count();
    if checked == 0 {
        return Err(WorkflowError::NoLinesChecked);
    }

    for line in lines {
        match line.outcome {
            LineOutcome::Unset => {
                let has_draft = line.fail_qty.is_some()
                    || line
                        .fail_reason
                        .as_deref()
                        .map(|r| !r.trim().is_empty())
                        .unwrap_or(false);
                if has_draft {
                    return Err(WorkflowError::UncommittedData {
                        line_id: line.line_id.clone(),
                        label: line.label.clone(),
                    });
                }
            }
            LineOutcome::Fail => {
                if line.fail_qty.unwrap_or(0) <= 0 {
                    return Err(WorkflowError::MissingFailQty {
                        line_id: line.line_id.clone(),
                        label: line.label.clone(),
                    });
                }
                if line
                    .fail_reason
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
                {
                    return Err(WorkflowError::MissingFailReason {
                        line_id: line.line_id.clone(),
                        label: line.label.clone(),
                    });
                }
            }
            LineOutcome::Pass => {}
        }
    }

    Ok(())
}

// ==========================================
// GateSubmitOutcome - 提交结果
// ==========================================
#[derive(Debug, Clone)]
pub struct GateSubmitOutcome {
    pub session: GateSession,          // 固化后的会话
    pub result: ReconcileResult,       // 数量清算结果
    pub rework_order_id: Option<String>, // 创建的返修单（仅不合格 > 0）
}

// ==========================================
// QualityGateController - 质检门控制器
// ==========================================
pub struct QualityGateController {
    gate_repo: Arc<GateSessionRepository>,
    ticket_repo: Arc<TicketRepository>,
    flow_engine: Arc<StationFlowEngine>,
    rework: Arc<ReworkOrchestrator>,
    config: Arc<ConfigManager>,
}

impl QualityGateController {
    pub fn new(
        gate_repo: Arc<GateSessionRepository>,
        ticket_repo: Arc<TicketRepository>,
        flow_engine: Arc<StationFlowEngine>,
        rework: Arc<ReworkOrchestrator>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            gate_repo,
            ticket_repo,
            flow_engine,
            rework,
            config,
        }
    }

    /// 开检或续检: 返回 (工票, 工步) 的未提交会话, 不存在则新建
    ///
    /// 前置条件: 工步处于 CURRENT 且所在机位为质检机位。
    /// 幂等: 重复调用返回同一会话, 不重复生成检查项。
    pub fn open_or_resume(&self, ticket_id: &str, seq_no: i64) -> WorkflowResult<GateSession> {
        let step = self.flow_engine.step(ticket_id, seq_no)?;

        if !self.flow_engine.is_gate_step(&step)? {
            return Err(WorkflowError::NotGateStation {
                station_id: step.station_id,
            });
        }
        if step.status != StepStatus::Current {
            return Err(WorkflowError::InvalidTransition {
                entity: "FlowStep".to_string(),
                id: format!("{}#{}", ticket_id, seq_no),
                from: step.status.to_db_str().to_string(),
                expected: StepStatus::Current.to_db_str().to_string(),
            });
        }

        if let Some(session) = self.gate_repo.find_open(ticket_id, seq_no)? {
            debug!(ticket_id, seq_no, session_id = %session.session_id, "续检既有会话");
            return Ok(session);
        }

        let labels = self.config.gate_checklist_labels()?;
        let session = GateSession {
            session_id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            seq_no,
            started_at: Utc::now(),
            submitted_at: None,
            pass_qty: 0,
            fail_qty: 0,
            lines: labels
                .iter()
                .enumerate()
                .map(|(i, label)| ChecklistLine::unset(i as i64, label))
                .collect(),
        };

        self.gate_repo.insert(&session)?;
        info!(ticket_id, seq_no, session_id = %session.session_id, "新建质检会话");
        Ok(session)
    }

    /// 更新检查项判定
    ///
    /// 归一化规则:
    /// - PASS: 清空数量与原因 (合格项不携带数量)
    /// - FAIL: 数量缺省/为零时按 1 计; 原因在提交校验时兜底
    /// - UNSET: 保留已填写的数量/原因作为草稿 (提交校验拦截)
    pub fn set_line_outcome(
        &self,
        session_id: &str,
        line_id: &str,
        outcome: LineOutcome,
        fail_qty: Option<i64>,
        fail_reason: Option<&str>,
    ) -> WorkflowResult<GateSession> {
        let session = self.gate_repo.find_by_id(session_id)?;
        if session.is_submitted() {
            return Err(WorkflowError::AlreadySubmitted {
                session_id: session_id.to_string(),
            });
        }

        let (qty, reason) = match outcome {
            LineOutcome::Pass => (None, None),
            LineOutcome::Fail => {
                let qty = fail_qty.filter(|q| *q > 0).unwrap_or(1);
                (Some(qty), fail_reason.map(|r| r.to_string()))
            }
            LineOutcome::Unset => (
                fail_qty.filter(|q| *q > 0),
                fail_reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(|r| r.to_string()),
            ),
        };

        if !self
            .gate_repo
            .update_line(session_id, line_id, outcome, qty, reason.as_deref())?
        {
            return Err(crate::repository::RepositoryError::NotFound {
                entity: "ChecklistLine".to_string(),
                id: line_id.to_string(),
            }
            .into());
        }

        Ok(self.gate_repo.find_by_id(session_id)?)
    }

    /// 按工票当前数量清算会话（只读, 不落库）
    pub fn reconcile(&self, session: &GateSession) -> WorkflowResult<ReconcileResult> {
        let ticket = self.ticket_repo.find_by_id(&session.ticket_id)?;
        Ok(reconcile_lines(
            &session.lines,
            ticket.required_qty,
            ticket.accepted_qty,
        ))
    }

    /// 提交前校验（供边界层预检）
    pub fn validate_for_submit(&self, session: &GateSession) -> WorkflowResult<()> {
        if session.is_submitted() {
            return Err(WorkflowError::AlreadySubmitted {
                session_id: session.session_id.clone(),
            });
        }
        validate_lines_for_submit(&session.lines)
    }

    /// 提交质检会话（终态）
    ///
    /// 流程: 校验 → 清算 → 固化会话 (submitted_at 守卫二次提交) →
    ///       工票验收数量写回 → 分流:
    /// - 不合格 == 0: 推进质检工步, 工票继续流转
    /// - 不合格 > 0: 创建一张返修单 (PENDING), 质检工步保持
    ///   CURRENT, 父流转被结构性挂起直至返修回流握手
    pub fn submit(&self, session_id: &str) -> WorkflowResult<GateSubmitOutcome> {
        let session = self.gate_repo.find_by_id(session_id)?;
        if session.is_submitted() {
            return Err(WorkflowError::AlreadySubmitted {
                session_id: session_id.to_string(),
            });
        }

        validate_lines_for_submit(&session.lines)?;

        let ticket = self.ticket_repo.find_by_id(&session.ticket_id)?;
        let result = reconcile_lines(&session.lines, ticket.required_qty, ticket.accepted_qty);

        let submitted_at = Utc::now();
        if !self
            .gate_repo
            .finalize(session_id, result.pass_qty, result.fail_qty, submitted_at)?
        {
            // 并发竞争: 另一提交已先固化
            return Err(WorkflowError::AlreadySubmitted {
                session_id: session_id.to_string(),
            });
        }

        if result.pass_qty > 0 {
            self.ticket_repo
                .increment_accepted_qty(&session.ticket_id, result.pass_qty)?;
        }

        info!(
            ticket_id = %session.ticket_id,
            seq_no = session.seq_no,
            session_id,
            pass_qty = result.pass_qty,
            fail_qty = result.fail_qty,
            pass_rate_pct = result.pass_rate_pct,
            "质检会话已提交"
        );

        let rework_order_id = if result.fail_qty > 0 {
            let reason = Self::collect_fail_reasons(&session.lines);
            let order = self.rework.create_from_gate(
                &session.ticket_id,
                session.seq_no,
                result.fail_qty,
                &reason,
                None,
            )?;
            Some(order.order_id)
        } else {
            // 全数合格: 质检工步直接放行
            self.flow_engine
                .advance_step(&session.ticket_id, session.seq_no)?;
            None
        };

        let finalized = self.gate_repo.find_by_id(session_id)?;
        Ok(GateSubmitOutcome {
            session: finalized,
            result,
            rework_order_id,
        })
    }

    /// 汇总不合格项原因文本（"检查项: 原因" 以分号连接）
    fn collect_fail_reasons(lines: &[ChecklistLine]) -> String {
        lines
            .iter()
            .filter(|l| l.outcome == LineOutcome::Fail)
            .map(|l| {
                format!(
                    "{}: {}",
                    l.label,
                    l.fail_reason.as_deref().unwrap_or("").trim()
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(seq: i64, outcome: LineOutcome, qty: Option<i64>, reason: Option<&str>) -> ChecklistLine {
        let mut l = ChecklistLine::unset(seq, &format!("检查项{}", seq));
        l.outcome = outcome;
        l.fail_qty = qty;
        l.fail_reason = reason.map(|r| r.to_string());
        l
    }

    #[test]
    fn test_reconcile_with_baseline() {
        // 基准 100, 两条不合格 5 + 3 → 合格 92, 合格率 92%
        let lines = vec![
            line(0, LineOutcome::Fail, Some(5), Some("划伤")),
            line(1, LineOutcome::Fail, Some(3), Some("尺寸超差")),
            line(2, LineOutcome::Unset, None, None),
        ];
        let r = reconcile_lines(&lines, 100, 0);
        assert_eq!(r.pass_qty, 92);
        assert_eq!(r.fail_qty, 8);
        assert_eq!(r.total_qty, 100);
        assert_eq!(r.pass_rate_pct, 92);
        // 清算恒等式
        assert_eq!(r.pass_qty + r.fail_qty, 100);
    }

    #[test]
    fn test_reconcile_baseline_excludes_accepted() {
        // 已验收 40, 基准 = 100 - 40 = 60
        let lines = vec![line(0, LineOutcome::Fail, Some(10), Some("缺陷"))];
        let r = reconcile_lines(&lines, 100, 40);
        assert_eq!(r.total_qty, 60);
        assert_eq!(r.pass_qty, 50);
        assert_eq!(r.fail_qty, 10);
    }

    #[test]
    fn test_reconcile_clamps_negative_pass() {
        // 不合格数量超过基准: 合格钳位到 0, 不出现负数
        let lines = vec![line(0, LineOutcome::Fail, Some(15), Some("批量缺陷"))];
        let r = reconcile_lines(&lines, 10, 0);
        assert_eq!(r.pass_qty, 0);
        assert_eq!(r.fail_qty, 15);
        assert_eq!(r.pass_rate_pct, 0);
    }

    #[test]
    fn test_reconcile_fallback_without_baseline() {
        let lines = vec![
            line(0, LineOutcome::Pass, None, None),
            line(1, LineOutcome::Pass, None, None),
            line(2, LineOutcome::Fail, Some(2), Some("缺陷")),
        ];
        let r = reconcile_lines(&lines, 0, 0);
        assert_eq!(r.pass_qty, 2);
        assert_eq!(r.fail_qty, 2);
        assert_eq!(r.pass_rate_pct, 50);

        // 全未判定: 合格率按 0 处理
        let empty = vec![line(0, LineOutcome::Unset, None, None)];
        let r = reconcile_lines(&empty, 0, 0);
        assert_eq!(r.pass_rate_pct, 0);
    }

    #[test]
    fn test_validate_no_lines_checked() {
        let lines = vec![
            line(0, LineOutcome::Unset, None, None),
            line(1, LineOutcome::Unset, None, None),
        ];
        assert!(matches!(
            validate_lines_for_submit(&lines),
            Err(WorkflowError::NoLinesChecked)
        ));
    }

    #[test]
    fn test_validate_uncommitted_draft() {
        let lines = vec![
            line(0, LineOutcome::Pass, None, None),
            line(1, LineOutcome::Unset, Some(3), None),
        ];
        assert!(matches!(
            validate_lines_for_submit(&lines),
            Err(WorkflowError::UncommittedData { .. })
        ));
    }

    #[test]
    fn test_validate_fail_line_requirements() {
        // 有原因但数量为 0
        let no_qty = vec![line(0, LineOutcome::Fail, Some(0), Some("划伤"))];
        assert!(matches!(
            validate_lines_for_submit(&no_qty),
            Err(WorkflowError::MissingFailQty { .. })
        ));

        // 有数量但原因为空白
        let no_reason = vec![line(0, LineOutcome::Fail, Some(2), Some("  "))];
        assert!(matches!(
            validate_lines_for_submit(&no_reason),
            Err(WorkflowError::MissingFailReason { .. })
        ));

        // 完整的不合格项通过
        let ok = vec![line(0, LineOutcome::Fail, Some(2), Some("划伤"))];
        assert!(validate_lines_for_submit(&ok).is_ok());
    }
}
