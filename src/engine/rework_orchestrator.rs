// ==========================================
// 车间工票流转系统 - 返修编排器
// ==========================================
// 职责: 返修单创建、审批门 (ApprovalGate)、路线推进、
//       完成后与父工票流转的回流握手
// 红线: 审批只能从 PENDING 出发且终态不可逆;
//       路线与父工票工步列表完全隔离
// ==========================================

use crate::config::ConfigManager;
use crate::domain::flow::FlowStep;
use crate::domain::rework::{ReworkOrder, RoadmapStep};
use crate::domain::types::{ApprovalStatus, ReentryPolicy, ReworkSeverity, RoadmapStatus, StepStatus};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::repository::{FlowStepRepository, ReworkOrderRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// ReworkOrchestrator - 返修编排器
// ==========================================
pub struct ReworkOrchestrator {
    rework_repo: Arc<ReworkOrderRepository>,
    flow_repo: Arc<FlowStepRepository>,
    config: Arc<ConfigManager>,
}

impl ReworkOrchestrator {
    pub fn new(
        rework_repo: Arc<ReworkOrderRepository>,
        flow_repo: Arc<FlowStepRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            rework_repo,
            flow_repo,
            config,
        }
    }

    // ==========================================
    // 默认路线投影
    // ==========================================

    /// 由工票既有工步投影默认返修路线（纯函数, 无副作用）
    ///
    /// 规则:
    /// - 取质检工步之前、已有操作员指派的工步, 按序复制为返修工步
    /// - 末尾追加一条终检（复检）工步, 指向质检工步所在机位
    ///
    /// 结果永不为空（至少包含终检工步）, 供操作员在此基础上编辑。
    pub fn propose_roadmap(steps: &[FlowStep], gate_seq_no: i64) -> Vec<RoadmapStep> {
        let mut roadmap = Vec::new();
        let mut next_seq = 0i64;

        for step in steps.iter().filter(|s| s.seq_no < gate_seq_no) {
            if let Some(op) = &step.operator_id {
                roadmap.push(RoadmapStep::station(next_seq, &step.station_id, op));
                next_seq += 1;
            }
        }

        if let Some(gate) = steps.iter().find(|s| s.seq_no == gate_seq_no) {
            roadmap.push(RoadmapStep::reinspection(next_seq, &gate.station_id));
        }

        roadmap
    }

    /// 校验返修路线完整性
    fn validate_roadmap(roadmap: &[RoadmapStep]) -> WorkflowResult<()> {
        if roadmap.is_empty() {
            return Err(WorkflowError::EmptyRoadmap);
        }
        for step in roadmap {
            if step.station_id.trim().is_empty() {
                return Err(WorkflowError::IncompleteRoadmapStep {
                    seq_no: step.seq_no,
                    message: "缺少目标机位".to_string(),
                });
            }
            // 终检工步不要求指派操作员, 其余必须指派
            if !step.is_gate
                && step
                    .operator_id
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
            {
                return Err(WorkflowError::IncompleteRoadmapStep {
                    seq_no: step.seq_no,
                    message: "缺少指派操作员".to_string(),
                });
            }
        }
        Ok(())
    }

    // ==========================================
    // 返修单创建
    // ==========================================

    /// 创建返修单（初始 PENDING, 等待审批）
    ///
    /// # 参数
    /// - fail_qty: 触发本单的质检不合格数量（返修数量上限）
    /// - rework_qty: 本单返修数量
    /// - severity: 缺省时取配置的默认严重度
    pub fn create_order(
        &self,
        ticket_id: &str,
        source_seq_no: i64,
        fail_qty: i64,
        rework_qty: i64,
        reason: &str,
        roadmap: Vec<RoadmapStep>,
        severity: Option<ReworkSeverity>,
    ) -> WorkflowResult<ReworkOrder> {
        Self::validate_roadmap(&roadmap)?;

        if rework_qty <= 0 || rework_qty > fail_qty {
            return Err(WorkflowError::ReworkQtyExceedsFail {
                rework_qty,
                fail_qty,
            });
        }

        let severity = match severity {
            Some(s) => s,
            None => self.config.rework_default_severity()?,
        };

        // 序号规整: 以传入顺序重排为 0..n, 状态统一回 PENDING
        let roadmap: Vec<RoadmapStep> = roadmap
            .into_iter()
            .enumerate()
            .map(|(i, mut s)| {
                s.seq_no = i as i64;
                s.status = RoadmapStatus::Pending;
                s.started_at = None;
                s.completed_at = None;
                s
            })
            .collect();

        let order = ReworkOrder {
            order_id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            source_seq_no,
            rework_qty,
            severity,
            reason: reason.to_string(),
            approval_status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            reject_reason: None,
            roadmap,
            created_at: Utc::now(),
        };

        self.rework_repo.insert(&order)?;
        info!(
            ticket_id,
            order_id = %order.order_id,
            source_seq_no,
            rework_qty,
            severity = %order.severity,
            "返修单已创建, 等待审批"
        );
        Ok(order)
    }

    /// 质检提交路径的快捷创建: 以默认投影路线建单, 数量取不合格数量
    pub fn create_from_gate(
        &self,
        ticket_id: &str,
        gate_seq_no: i64,
        fail_qty: i64,
        reason: &str,
        severity: Option<ReworkSeverity>,
    ) -> WorkflowResult<ReworkOrder> {
        let steps = self.flow_repo.find_by_ticket(ticket_id)?;
        let roadmap = Self::propose_roadmap(&steps, gate_seq_no);
        self.create_order(
            ticket_id,
            gate_seq_no,
            fail_qty,
            fail_qty,
            reason,
            roadmap,
            severity,
        )
    }

    // ==========================================
    // ApprovalGate - 审批门
    // ==========================================

    /// 批准返修单（终态转换; 批准即启动首条路线工步）
    pub fn approve(&self, order_id: &str, approver_id: &str) -> WorkflowResult<ReworkOrder> {
        if !self
            .rework_repo
            .set_approval(order_id, ApprovalStatus::Approved, approver_id, None)?
        {
            let order = self.rework_repo.find_by_id(order_id)?;
            return Err(WorkflowError::NotPending {
                order_id: order_id.to_string(),
                status: order.approval_status.to_db_str().to_string(),
            });
        }

        info!(order_id, approver_id, "返修单已批准, 路线开始执行");
        Ok(self.rework_repo.find_by_id(order_id)?)
    }

    /// 驳回返修单（终态转换; 被驳回的路线永不执行）
    pub fn reject(
        &self,
        order_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> WorkflowResult<ReworkOrder> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::EmptyRejectReason);
        }

        if !self.rework_repo.set_approval(
            order_id,
            ApprovalStatus::Rejected,
            approver_id,
            Some(reason),
        )? {
            let order = self.rework_repo.find_by_id(order_id)?;
            return Err(WorkflowError::NotPending {
                order_id: order_id.to_string(),
                status: order.approval_status.to_db_str().to_string(),
            });
        }

        info!(order_id, approver_id, reason, "返修单已驳回");
        Ok(self.rework_repo.find_by_id(order_id)?)
    }

    // ==========================================
    // 路线推进与完成握手
    // ==========================================

    /// 推进路线工步: IN_PROGRESS→COMPLETED, 后继 PENDING→IN_PROGRESS
    ///
    /// 仅已批准的返修单可执行; 全部完成时触发父工票回流握手。
    pub fn advance_roadmap_step(&self, order_id: &str, seq_no: i64) -> WorkflowResult<ReworkOrder> {
        let order = self.rework_repo.find_by_id(order_id)?;
        if order.approval_status != ApprovalStatus::Approved {
            return Err(WorkflowError::InvalidTransition {
                entity: "ReworkOrder".to_string(),
                id: order_id.to_string(),
                from: order.approval_status.to_db_str().to_string(),
                expected: ApprovalStatus::Approved.to_db_str().to_string(),
            });
        }

        if !self.rework_repo.advance_roadmap_step(order_id, seq_no)? {
            let from = order
                .roadmap
                .iter()
                .find(|s| s.seq_no == seq_no)
                .map(|s| s.status.to_db_str().to_string())
                .unwrap_or_else(|| "MISSING".to_string());
            return Err(WorkflowError::InvalidTransition {
                entity: "RoadmapStep".to_string(),
                id: format!("{}#{}", order_id, seq_no),
                from,
                expected: RoadmapStatus::InProgress.to_db_str().to_string(),
            });
        }

        info!(order_id, seq_no, "返修路线工步推进完成");

        if self.rework_repo.is_complete(order_id)? {
            self.on_order_complete(&order)?;
        }

        Ok(self.rework_repo.find_by_id(order_id)?)
    }

    /// 返修是否已全部完成
    pub fn is_order_complete(&self, order_id: &str) -> WorkflowResult<bool> {
        Ok(self.rework_repo.is_complete(order_id)?)
    }

    /// 返修完成后的父工票回流握手（策略由配置决定）
    ///
    /// - REENTER_GATE: 质检工步保持 CURRENT, 允许重新开检
    /// - SKIP_FORWARD: 推进质检工步, 工票继续后续流转
    fn on_order_complete(&self, order: &ReworkOrder) -> WorkflowResult<()> {
        let policy = self.config.rework_reentry_policy()?;
        info!(
            order_id = %order.order_id,
            ticket_id = %order.ticket_id,
            policy = %policy,
            "返修完成, 执行父工票回流握手"
        );

        match policy {
            ReentryPolicy::ReenterGate => {
                // 质检工步在提交后保持 CURRENT, 此处无需改动工步状态
                Ok(())
            }
            ReentryPolicy::SkipForward => {
                if !self
                    .flow_repo
                    .complete_and_promote_next(&order.ticket_id, order.source_seq_no)?
                {
                    // 质检工步已不在 CURRENT (例如已被人工推进), 只告警不报错
                    let step = self
                        .flow_repo
                        .find_one(&order.ticket_id, order.source_seq_no)?;
                    warn!(
                        ticket_id = %order.ticket_id,
                        seq_no = order.source_seq_no,
                        status = %step.status,
                        "回流握手: 质检工步不处于 CURRENT, 跳过推进"
                    );
                }
                Ok(())
            }
        }
    }
}

/// 推进前的父工步状态断言辅助（测试与诊断用）
pub fn gate_step_is_current(steps: &[FlowStep], gate_seq_no: i64) -> bool {
    steps
        .iter()
        .any(|s| s.seq_no == gate_seq_no && s.status == StepStatus::Current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(seq: i64, station: &str, operator: Option<&str>, status: StepStatus) -> FlowStep {
        let mut s = FlowStep::pending("T1", seq, station, operator);
        s.status = status;
        s
    }

    #[test]
    fn test_propose_roadmap_replays_assigned_steps() {
        let steps = vec![
            step(0, "CUT", Some("op-a"), StepStatus::Completed),
            step(1, "WELD", None, StepStatus::Completed),
            step(2, "POLISH", Some("op-b"), StepStatus::Completed),
            step(3, "QC", None, StepStatus::Current),
            step(4, "PACK", Some("op-c"), StepStatus::Pending),
        ];

        let roadmap = ReworkOrchestrator::propose_roadmap(&steps, 3);

        // 未指派操作员的工步与质检工步之后的工步不进入路线
        assert_eq!(roadmap.len(), 3);
        assert_eq!(roadmap[0].station_id, "CUT");
        assert_eq!(roadmap[1].station_id, "POLISH");
        // 末位为终检工步, 指向质检机位且无操作员
        assert!(roadmap[2].is_gate);
        assert_eq!(roadmap[2].station_id, "QC");
        assert!(roadmap[2].operator_id.is_none());
        // 序号连续
        assert_eq!(
            roadmap.iter().map(|s| s.seq_no).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_propose_roadmap_minimum_is_reinspection() {
        let steps = vec![step(0, "QC", None, StepStatus::Current)];
        let roadmap = ReworkOrchestrator::propose_roadmap(&steps, 0);
        assert_eq!(roadmap.len(), 1);
        assert!(roadmap[0].is_gate);
    }

    #[test]
    fn test_validate_roadmap_rules() {
        // 空路线
        assert!(matches!(
            ReworkOrchestrator::validate_roadmap(&[]),
            Err(WorkflowError::EmptyRoadmap)
        ));

        // 非终检工步缺操作员
        let missing_op = vec![RoadmapStep {
            operator_id: None,
            ..RoadmapStep::station(0, "CUT", "x")
        }];
        assert!(matches!(
            ReworkOrchestrator::validate_roadmap(&missing_op),
            Err(WorkflowError::IncompleteRoadmapStep { seq_no: 0, .. })
        ));

        // 缺机位
        let missing_station = vec![RoadmapStep::station(0, " ", "op-a")];
        assert!(matches!(
            ReworkOrchestrator::validate_roadmap(&missing_station),
            Err(WorkflowError::IncompleteRoadmapStep { .. })
        ));

        // 合法: 普通工步 + 终检工步
        let ok = vec![
            RoadmapStep::station(0, "CUT", "op-a"),
            RoadmapStep::reinspection(1, "QC"),
        ];
        assert!(ReworkOrchestrator::validate_roadmap(&ok).is_ok());
    }
}
