// ==========================================
// 车间工票流转系统 - 在场记录领域模型
// ==========================================
// 红线: 仅进程内存, 不落库 (心跳高频, 避免写放大);
//       属软锁提示, 不做强互斥
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PresenceEntry - 在场编辑者快照
// ==========================================
// resource_key 约定: "ticket_id:seq_no" (质检会话粒度)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub resource_key: String,            // 资源键
    pub holder_id: String,               // 编辑者标识
    pub label: String,                   // 展示名称
    pub last_heartbeat: DateTime<Utc>,   // 最近心跳时间
}

/// 构造质检会话粒度的资源键
pub fn gate_resource_key(ticket_id: &str, seq_no: i64) -> String {
    format!("{}:{}", ticket_id, seq_no)
}
