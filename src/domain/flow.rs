// ==========================================
// 车间工票流转系统 - 工步领域模型
// ==========================================
// 红线: 工步列表由工票独占, 返修路线与其完全隔离
//       (仅通过 rework_order_id 反向引用关联)
// ==========================================

use crate::domain::types::StepStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// FlowStep - 工票流转工步
// ==========================================
// 不变量: (ticket_id, seq_no) 唯一; seq_no 从 0 连续递增;
//         至多一个 CURRENT, 其之前的工步全部 COMPLETED
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    // ===== 主键 =====
    pub ticket_id: String, // 所属工票
    pub seq_no: i64,       // 序号（0 起）

    // ===== 路线内容 =====
    pub station_id: String,           // 目标机位
    pub operator_id: Option<String>,  // 指派操作员（可空）

    // ===== 状态 =====
    pub status: StepStatus,

    // ===== 返修反向引用 =====
    // 非空表示该工步因返修单而存在
    pub rework_order_id: Option<String>,

    // ===== 状态时间戳 =====
    pub started_at: Option<DateTime<Utc>>,   // 进入 CURRENT 时间
    pub completed_at: Option<DateTime<Utc>>, // 进入 COMPLETED 时间
}

impl FlowStep {
    /// 构造一条待开工工步
    pub fn pending(ticket_id: &str, seq_no: i64, station_id: &str, operator_id: Option<&str>) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            seq_no,
            station_id: station_id.to_string(),
            operator_id: operator_id.map(|s| s.to_string()),
            status: StepStatus::Pending,
            rework_order_id: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// 在有序工步列表中定位活动工步（最小序号且未完成）
///
/// 纯查询: 活动工步由状态推导, 不另存指针, 避免双事实源。
pub fn active_step(steps: &[FlowStep]) -> Option<&FlowStep> {
    steps
        .iter()
        .filter(|s| s.status != StepStatus::Completed)
        .min_by_key(|s| s.seq_no)
}

/// 校验工步列表的顺序不变量
///
/// 返回 None 表示满足; 否则返回首个违反描述（用于诊断与测试）
pub fn check_ordering_invariant(steps: &[FlowStep]) -> Option<String> {
    let current_count = steps.iter().filter(|s| s.status == StepStatus::Current).count();
    if current_count > 1 {
        return Some(format!("存在 {} 个 CURRENT 工步", current_count));
    }
    if let Some(cur) = steps.iter().find(|s| s.status == StepStatus::Current) {
        for s in steps {
            if s.seq_no < cur.seq_no && s.status != StepStatus::Completed {
                return Some(format!(
                    "工步 {} 在 CURRENT 工步 {} 之前但状态为 {}",
                    s.seq_no, cur.seq_no, s.status
                ));
            }
        }
    }
    None
}
