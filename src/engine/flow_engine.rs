// ==========================================
// 车间工票流转系统 - 工步流转引擎
// ==========================================
// 职责: 活动工步解析、工步推进、质检机位判定
// 红线: 活动工步由状态纯查询推导, 不另存指针;
//       推进失败必须输出可解释原因
// ==========================================

use crate::domain::flow::{self, FlowStep};
use crate::domain::ticket::Station;
use crate::domain::types::StepStatus;
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::repository::{FlowStepRepository, StationRepository};
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// StationFlowEngine - 工步流转引擎
// ==========================================
pub struct StationFlowEngine {
    flow_repo: Arc<FlowStepRepository>,
    station_repo: Arc<StationRepository>,
}

impl StationFlowEngine {
    pub fn new(flow_repo: Arc<FlowStepRepository>, station_repo: Arc<StationRepository>) -> Self {
        Self {
            flow_repo,
            station_repo,
        }
    }

    /// 查询单个工步
    pub fn step(&self, ticket_id: &str, seq_no: i64) -> WorkflowResult<FlowStep> {
        Ok(self.flow_repo.find_one(ticket_id, seq_no)?)
    }

    /// 工票的活动工步（最小序号且未完成）; 全部完成时返回 None
    pub fn active_step(&self, ticket_id: &str) -> WorkflowResult<Option<FlowStep>> {
        let steps = self.flow_repo.find_by_ticket(ticket_id)?;
        Ok(flow::active_step(&steps).cloned())
    }

    /// 给定工步的前驱工步（用于追溯产出方机位/操作员）
    pub fn predecessor_of(&self, ticket_id: &str, seq_no: i64) -> WorkflowResult<Option<FlowStep>> {
        if seq_no <= 0 {
            return Ok(None);
        }
        match self.flow_repo.find_one(ticket_id, seq_no - 1) {
            Ok(step) => Ok(Some(step)),
            Err(crate::repository::RepositoryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 推进工步: CURRENT→COMPLETED, 后继 PENDING→CURRENT
    ///
    /// 目标工步不处于 CURRENT 时返回 InvalidTransition,
    /// 并发乱序推进由状态前置条件结构性拦截。
    pub fn advance_step(&self, ticket_id: &str, seq_no: i64) -> WorkflowResult<()> {
        if self.flow_repo.complete_and_promote_next(ticket_id, seq_no)? {
            info!(ticket_id, seq_no, "工步推进完成");
            return Ok(());
        }

        // 推进失败: 区分"工步不存在"与"状态不满足"
        let step = self.flow_repo.find_one(ticket_id, seq_no)?;
        Err(WorkflowError::InvalidTransition {
            entity: "FlowStep".to_string(),
            id: format!("{}#{}", ticket_id, seq_no),
            from: step.status.to_db_str().to_string(),
            expected: StepStatus::Current.to_db_str().to_string(),
        })
    }

    /// 判断机位是否质检机位（显式标志 + 关键字回退）
    pub fn is_gate_station(&self, station: &Station) -> bool {
        station.is_gate_station()
    }

    /// 判断工步是否质检工步
    pub fn is_gate_step(&self, step: &FlowStep) -> WorkflowResult<bool> {
        let station = self.station_repo.find_by_id(&step.station_id)?;
        Ok(station.is_gate_station())
    }

    /// 工票是否已完成全部质检工步
    ///
    /// 为真的条件: 至少存在一个质检工步, 且全部 COMPLETED;
    /// 用于标记工票"检毕"并锁定质检表单的进一步编辑。
    pub fn all_gate_steps_completed(&self, ticket_id: &str) -> WorkflowResult<bool> {
        let steps = self.flow_repo.find_by_ticket(ticket_id)?;

        let mut gate_count = 0;
        for step in &steps {
            if self.is_gate_step(step)? {
                gate_count += 1;
                if step.status != StepStatus::Completed {
                    debug!(ticket_id, seq_no = step.seq_no, "质检工步尚未完成");
                    return Ok(false);
                }
            }
        }

        Ok(gate_count > 0)
    }
}
