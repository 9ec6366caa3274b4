// ==========================================
// 车间工票流转系统 - 质检门 API
// ==========================================
// 职责: 质检会话的开检/续检、判定编辑、清算预览、提交
// 红线: API 只做参数校验与 DTO 转换, 业务判定全部下沉引擎
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::gate::{ChecklistLine, GateSession, ReconcileResult};
use crate::domain::types::LineOutcome;
use crate::engine::gate_controller::QualityGateController;
use crate::repository::GateSessionRepository;

// ==========================================
// GateApi - 质检门 API
// ==========================================
pub struct GateApi {
    controller: Arc<QualityGateController>,
    gate_repo: Arc<GateSessionRepository>,
}

impl GateApi {
    pub fn new(
        controller: Arc<QualityGateController>,
        gate_repo: Arc<GateSessionRepository>,
    ) -> Self {
        Self {
            controller,
            gate_repo,
        }
    }

    /// 开检或续检
    pub fn open_or_resume(&self, ticket_id: &str, seq_no: i64) -> ApiResult<GateSessionDto> {
        if ticket_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("工票ID不能为空".to_string()));
        }
        if seq_no < 0 {
            return Err(ApiError::InvalidInput("工步序号不能为负".to_string()));
        }

        let session = self.controller.open_or_resume(ticket_id, seq_no)?;
        Ok(GateSessionDto::from(session))
    }

    /// 查询会话当前状态
    pub fn get_session(&self, session_id: &str) -> ApiResult<GateSessionDto> {
        let session = self.gate_repo.find_by_id(session_id)?;
        Ok(GateSessionDto::from(session))
    }

    /// 更新检查项判定
    pub fn set_line_outcome(&self, request: SetLineOutcomeRequest) -> ApiResult<GateSessionDto> {
        if request.session_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("会话ID不能为空".to_string()));
        }
        if request.line_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("检查项ID不能为空".to_string()));
        }

        let session = self.controller.set_line_outcome(
            &request.session_id,
            &request.line_id,
            request.outcome,
            request.fail_qty,
            request.fail_reason.as_deref(),
        )?;
        Ok(GateSessionDto::from(session))
    }

    /// 清算预览（只读, 不落库, 供提交前确认页展示）
    pub fn preview_reconcile(&self, session_id: &str) -> ApiResult<ReconcileDto> {
        let session = self.gate_repo.find_by_id(session_id)?;
        let result = self.controller.reconcile(&session)?;
        Ok(ReconcileDto::from(result))
    }

    /// 提交会话
    pub fn submit(&self, session_id: &str) -> ApiResult<GateSubmitResultDto> {
        if session_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("会话ID不能为空".to_string()));
        }

        let outcome = self.controller.submit(session_id)?;
        info!(
            session_id,
            rework_created = outcome.rework_order_id.is_some(),
            "质检提交处理完成"
        );

        Ok(GateSubmitResultDto {
            session: GateSessionDto::from(outcome.session),
            result: ReconcileDto::from(outcome.result),
            rework_order_id: outcome.rework_order_id,
        })
    }
}

// ==========================================
// DTO 类型定义
// ==========================================

/// 检查项判定请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLineOutcomeRequest {
    pub session_id: String,
    pub line_id: String,
    pub outcome: LineOutcome,
    pub fail_qty: Option<i64>,
    pub fail_reason: Option<String>,
}

/// 检查项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistLineDto {
    pub line_id: String,
    pub seq_no: i64,
    pub label: String,
    pub outcome: LineOutcome,
    pub fail_qty: Option<i64>,
    pub fail_reason: Option<String>,
}

impl From<ChecklistLine> for ChecklistLineDto {
    fn from(line: ChecklistLine) -> Self {
        Self {
            line_id: line.line_id,
            seq_no: line.seq_no,
            label: line.label,
            outcome: line.outcome,
            fail_qty: line.fail_qty,
            fail_reason: line.fail_reason,
        }
    }
}

/// 质检会话
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSessionDto {
    pub session_id: String,
    pub ticket_id: String,
    pub seq_no: i64,
    pub started_at: String,          // RFC3339
    pub submitted_at: Option<String>, // RFC3339, 提交后不为空
    pub pass_qty: i64,
    pub fail_qty: i64,
    pub lines: Vec<ChecklistLineDto>,
}

impl From<GateSession> for GateSessionDto {
    fn from(session: GateSession) -> Self {
        Self {
            session_id: session.session_id,
            ticket_id: session.ticket_id,
            seq_no: session.seq_no,
            started_at: session.started_at.to_rfc3339(),
            submitted_at: session.submitted_at.map(|t| t.to_rfc3339()),
            pass_qty: session.pass_qty,
            fail_qty: session.fail_qty,
            lines: session.lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// 清算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileDto {
    pub pass_qty: i64,
    pub fail_qty: i64,
    pub total_qty: i64,
    pub pass_rate_pct: i64,
}

impl From<ReconcileResult> for ReconcileDto {
    fn from(r: ReconcileResult) -> Self {
        Self {
            pass_qty: r.pass_qty,
            fail_qty: r.fail_qty,
            total_qty: r.total_qty,
            pass_rate_pct: r.pass_rate_pct,
        }
    }
}

/// 提交结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSubmitResultDto {
    pub session: GateSessionDto,
    pub result: ReconcileDto,
    /// 不合格 > 0 时创建的返修单ID
    pub rework_order_id: Option<String>,
}
