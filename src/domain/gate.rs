// ==========================================
// 车间工票流转系统 - 质检会话领域模型
// ==========================================
// 红线: 同一 (工票, 工步) 至多一个未提交会话;
//       已提交会话不可变, 作为历史记录保留
// ==========================================

use crate::domain::types::LineOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ChecklistLine - 质检检查项
// ==========================================
// 红线: FAIL 必须携带数量(>0)与原因; PASS 不携带数量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistLine {
    pub line_id: String,             // 检查项唯一标识
    pub seq_no: i64,                 // 会话内顺序
    pub label: String,               // 检查项名称
    pub outcome: LineOutcome,        // 判定结论
    pub fail_qty: Option<i64>,       // 不合格数量（仅 FAIL）
    pub fail_reason: Option<String>, // 不合格原因（仅 FAIL）
}

impl ChecklistLine {
    /// 构造一条未判定检查项
    pub fn unset(seq_no: i64, label: &str) -> Self {
        Self {
            line_id: uuid::Uuid::new_v4().to_string(),
            seq_no,
            label: label.to_string(),
            outcome: LineOutcome::Unset,
            fail_qty: None,
            fail_reason: None,
        }
    }
}

// ==========================================
// GateSession - 质检会话
// ==========================================
// 生命周期: 首次进入质检工步时创建 → 检查项编辑 →
//           提交后终态 (submitted_at 非空)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSession {
    // ===== 主键与归属 =====
    pub session_id: String, // 会话唯一标识
    pub ticket_id: String,  // 所属工票
    pub seq_no: i64,        // 所属质检工步序号

    // ===== 生命周期 =====
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>, // 非空 = 已提交（终态）

    // ===== 提交时固化的清算结果 =====
    pub pass_qty: i64,
    pub fail_qty: i64,

    // ===== 检查项 =====
    pub lines: Vec<ChecklistLine>,
}

impl GateSession {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

// ==========================================
// ReconcileResult - 数量清算结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub pass_qty: i64,      // 合格数量
    pub fail_qty: i64,      // 不合格数量
    pub total_qty: i64,     // 清算总量
    pub pass_rate_pct: i64, // 合格率（四舍五入百分比）
}
