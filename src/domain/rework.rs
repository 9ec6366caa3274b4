// ==========================================
// 车间工票流转系统 - 返修单领域模型
// ==========================================
// 红线: 返修路线不可为空; 返修数量不得超过触发它的不合格数量;
//       审批只能从 PENDING 出发且终态不可逆
// ==========================================

use crate::domain::types::{ApprovalStatus, ReworkSeverity, RoadmapStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RoadmapStep - 返修路线工步
// ==========================================
// 终检工步 (is_gate=true) 不要求指派操作员, 其余必须指派
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapStep {
    pub seq_no: i64,                 // 路线内序号（0 起）
    pub station_id: String,          // 目标机位
    pub operator_id: Option<String>, // 指派操作员
    pub is_gate: bool,               // 是否终检（复检）工步
    pub status: RoadmapStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RoadmapStep {
    /// 构造一条待执行的普通返修工步
    pub fn station(seq_no: i64, station_id: &str, operator_id: &str) -> Self {
        Self {
            seq_no,
            station_id: station_id.to_string(),
            operator_id: Some(operator_id.to_string()),
            is_gate: false,
            status: RoadmapStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// 构造一条终检（复检）工步, 不指派操作员
    pub fn reinspection(seq_no: i64, station_id: &str) -> Self {
        Self {
            seq_no,
            station_id: station_id.to_string(),
            operator_id: None,
            is_gate: true,
            status: RoadmapStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}

// ==========================================
// ReworkOrder - 返修单
// ==========================================
// 生命周期: 质检清算出不合格数量后立即创建 (PENDING) →
//           审批 (APPROVED/REJECTED, 终态) →
//           路线逐步执行, 全部 COMPLETED 即返修完成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReworkOrder {
    // ===== 主键与归属 =====
    pub order_id: String,   // 返修单唯一标识
    pub ticket_id: String,  // 所属工票
    pub source_seq_no: i64, // 触发本单的质检工步序号

    // ===== 返修内容 =====
    pub rework_qty: i64,          // 返修数量
    pub severity: ReworkSeverity, // 严重度类别
    pub reason: String,           // 不合格原因汇总（自由文本）

    // ===== 审批 =====
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,

    // ===== 路线 =====
    pub roadmap: Vec<RoadmapStep>,

    // ===== 审计 =====
    pub created_at: DateTime<Utc>,
}

impl ReworkOrder {
    /// 返修是否已全部完成（所有路线工步 COMPLETED）
    pub fn is_complete(&self) -> bool {
        !self.roadmap.is_empty()
            && self
                .roadmap
                .iter()
                .all(|s| s.status == RoadmapStatus::Completed)
    }
}
