// ==========================================
// 车间工票流转系统 - 在场感知 API
// ==========================================
// 职责: 质检协同在场的进入/心跳/离开/查询
// 红线: 尽力而为语义, 任何调用都不应使业务操作失败
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::presence::{gate_resource_key, PresenceEntry};
use crate::engine::presence_registry::PresenceRegistry;

// ==========================================
// PresenceApi - 在场感知 API
// ==========================================
pub struct PresenceApi {
    registry: Arc<PresenceRegistry>,
}

impl PresenceApi {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// 进入质检资源（打开质检页时调用）
    pub fn enter_gate(&self, request: PresenceRequest) -> ApiResult<()> {
        request.validate()?;
        let key = gate_resource_key(&request.ticket_id, request.seq_no);
        self.registry
            .enter(&key, &request.holder_id, request.label.as_deref().unwrap_or(&request.holder_id));
        Ok(())
    }

    /// 心跳保活; 返回 false 表示条目已过期, 客户端应重新进入
    pub fn heartbeat(&self, request: PresenceRequest) -> ApiResult<bool> {
        request.validate()?;
        let key = gate_resource_key(&request.ticket_id, request.seq_no);
        Ok(self.registry.heartbeat(&key, &request.holder_id))
    }

    /// 离开质检资源（关闭质检页时调用, 幂等）
    pub fn exit_gate(&self, request: PresenceRequest) -> ApiResult<()> {
        request.validate()?;
        let key = gate_resource_key(&request.ticket_id, request.seq_no);
        self.registry.exit(&key, &request.holder_id);
        Ok(())
    }

    /// 查询同一质检资源上的其他在场者
    pub fn others_present(&self, request: PresenceRequest) -> ApiResult<Vec<PresenceEntryDto>> {
        request.validate()?;
        let key = gate_resource_key(&request.ticket_id, request.seq_no);
        let entries = self.registry.others_present(&key, &request.holder_id);
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// 提交前软提示: 仍有他人在场时输出告警并返回在场者
    ///
    /// 软锁语义, 不阻断提交; 是否中止由调用方自行决定。
    pub fn warn_if_others_present(
        &self,
        request: PresenceRequest,
    ) -> ApiResult<Vec<PresenceEntryDto>> {
        let others = self.others_present(request.clone())?;
        if !others.is_empty() {
            warn!(
                ticket_id = %request.ticket_id,
                seq_no = request.seq_no,
                holder_id = %request.holder_id,
                others = others.len(),
                "提交时仍有其他在场者"
            );
        }
        Ok(others)
    }
}

// ==========================================
// DTO 类型定义
// ==========================================

/// 在场操作请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRequest {
    pub ticket_id: String,
    pub seq_no: i64,
    pub holder_id: String,
    /// 展示名（仅 enter 使用, 缺省回退为 holder_id）
    pub label: Option<String>,
}

impl PresenceRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.ticket_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("工票ID不能为空".to_string()));
        }
        if self.holder_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("在场者ID不能为空".to_string()));
        }
        Ok(())
    }
}

/// 在场者条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntryDto {
    pub resource_key: String,
    pub holder_id: String,
    pub label: String,
    pub last_heartbeat: String, // RFC3339
}

impl From<PresenceEntry> for PresenceEntryDto {
    fn from(entry: PresenceEntry) -> Self {
        Self {
            resource_key: entry.resource_key,
            holder_id: entry.holder_id,
            label: entry.label,
            last_heartbeat: entry.last_heartbeat.to_rfc3339(),
        }
    }
}
