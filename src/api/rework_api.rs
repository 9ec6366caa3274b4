// ==========================================
// 车间工票流转系统 - 返修 API
// ==========================================
// 职责: 返修单查询/建单、审批门操作、路线推进
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::rework::{ReworkOrder, RoadmapStep};
use crate::domain::types::{ApprovalStatus, ReworkSeverity, RoadmapStatus};
use crate::engine::rework_orchestrator::ReworkOrchestrator;
use crate::repository::{FlowStepRepository, ReworkOrderRepository};

// ==========================================
// ReworkApi - 返修 API
// ==========================================
pub struct ReworkApi {
    orchestrator: Arc<ReworkOrchestrator>,
    rework_repo: Arc<ReworkOrderRepository>,
    flow_repo: Arc<FlowStepRepository>,
}

impl ReworkApi {
    pub fn new(
        orchestrator: Arc<ReworkOrchestrator>,
        rework_repo: Arc<ReworkOrderRepository>,
        flow_repo: Arc<FlowStepRepository>,
    ) -> Self {
        Self {
            orchestrator,
            rework_repo,
            flow_repo,
        }
    }

    /// 默认返修路线投影（供建单表单预填, 不落库）
    pub fn propose_roadmap(
        &self,
        ticket_id: &str,
        gate_seq_no: i64,
    ) -> ApiResult<Vec<RoadmapStepDto>> {
        let steps = self.flow_repo.find_by_ticket(ticket_id)?;
        let roadmap = ReworkOrchestrator::propose_roadmap(&steps, gate_seq_no);
        Ok(roadmap.into_iter().map(Into::into).collect())
    }

    /// 创建返修单（操作员可在投影路线基础上编辑后提交）
    pub fn create_order(&self, request: CreateReworkOrderRequest) -> ApiResult<ReworkOrderDto> {
        if request.ticket_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("工票ID不能为空".to_string()));
        }
        if request.reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("返修原因不能为空".to_string()));
        }

        let roadmap = request
            .roadmap
            .into_iter()
            .map(RoadmapStepDto::into_domain)
            .collect();

        let order = self.orchestrator.create_order(
            &request.ticket_id,
            request.source_seq_no,
            request.fail_qty,
            request.rework_qty,
            &request.reason,
            roadmap,
            request.severity,
        )?;
        Ok(ReworkOrderDto::from(order))
    }

    /// 查询返修单
    pub fn get_order(&self, order_id: &str) -> ApiResult<ReworkOrderDto> {
        let order = self.rework_repo.find_by_id(order_id)?;
        Ok(ReworkOrderDto::from(order))
    }

    /// 查询工票下全部返修单
    pub fn list_orders(&self, ticket_id: &str) -> ApiResult<Vec<ReworkOrderDto>> {
        let orders = self.rework_repo.find_by_ticket(ticket_id)?;
        Ok(orders.into_iter().map(Into::into).collect())
    }

    /// 批准返修单
    pub fn approve(&self, order_id: &str, approver_id: &str) -> ApiResult<ReworkOrderDto> {
        if approver_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("审批人不能为空".to_string()));
        }
        let order = self.orchestrator.approve(order_id, approver_id)?;
        Ok(ReworkOrderDto::from(order))
    }

    /// 驳回返修单（必须填写原因）
    pub fn reject(
        &self,
        order_id: &str,
        approver_id: &str,
        reason: &str,
    ) -> ApiResult<ReworkOrderDto> {
        if approver_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("审批人不能为空".to_string()));
        }
        let order = self.orchestrator.reject(order_id, approver_id, reason)?;
        Ok(ReworkOrderDto::from(order))
    }

    /// 推进路线工步
    pub fn advance_step(&self, order_id: &str, seq_no: i64) -> ApiResult<ReworkOrderDto> {
        let order = self.orchestrator.advance_roadmap_step(order_id, seq_no)?;
        Ok(ReworkOrderDto::from(order))
    }
}

// ==========================================
// DTO 类型定义
// ==========================================

/// 建单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReworkOrderRequest {
    pub ticket_id: String,
    /// 触发质检工步序号
    pub source_seq_no: i64,
    /// 质检不合格数量（返修数量上限）
    pub fail_qty: i64,
    pub rework_qty: i64,
    pub reason: String,
    pub severity: Option<ReworkSeverity>,
    pub roadmap: Vec<RoadmapStepDto>,
}

/// 返修路线工步
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapStepDto {
    pub seq_no: i64,
    pub station_id: String,
    pub operator_id: Option<String>,
    pub is_gate: bool,
    pub status: RoadmapStatus,
    pub started_at: Option<String>,   // RFC3339
    pub completed_at: Option<String>, // RFC3339
}

impl RoadmapStepDto {
    /// 建单入参转换: 时间与状态由编排器重置, DTO 不带入
    fn into_domain(self) -> RoadmapStep {
        RoadmapStep {
            seq_no: self.seq_no,
            station_id: self.station_id,
            operator_id: self.operator_id,
            is_gate: self.is_gate,
            status: RoadmapStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}

impl From<RoadmapStep> for RoadmapStepDto {
    fn from(step: RoadmapStep) -> Self {
        Self {
            seq_no: step.seq_no,
            station_id: step.station_id,
            operator_id: step.operator_id,
            is_gate: step.is_gate,
            status: step.status,
            started_at: step.started_at.map(|t| t.to_rfc3339()),
            completed_at: step.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// 返修单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReworkOrderDto {
    pub order_id: String,
    pub ticket_id: String,
    pub source_seq_no: i64,
    pub rework_qty: i64,
    pub severity: ReworkSeverity,
    pub reason: String,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<String>, // RFC3339
    pub reject_reason: Option<String>,
    pub roadmap: Vec<RoadmapStepDto>,
    pub created_at: String, // RFC3339
}

impl From<ReworkOrder> for ReworkOrderDto {
    fn from(order: ReworkOrder) -> Self {
        Self {
            order_id: order.order_id,
            ticket_id: order.ticket_id,
            source_seq_no: order.source_seq_no,
            rework_qty: order.rework_qty,
            severity: order.severity,
            reason: order.reason,
            approval_status: order.approval_status,
            approved_by: order.approved_by,
            approved_at: order.approved_at.map(|t| t.to_rfc3339()),
            reject_reason: order.reject_reason,
            roadmap: order.roadmap.into_iter().map(Into::into).collect(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}
