// ==========================================
// 车间工票流转系统 - 工票与机位领域模型
// ==========================================
// 红线: 工票主数据由外部系统创建, 本核心只在质检提交时
//       写回 accepted_qty, 其余字段只读
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Ticket - 工票（生产单元）
// ==========================================
// 不变量: accepted_qty <= required_qty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    // ===== 主键 =====
    pub ticket_id: String, // 工票唯一标识

    // ===== 基础信息 =====
    pub descriptor: Option<String>,    // 产品描述（自由文本）
    pub required_qty: i64,             // 要求生产数量
    pub accepted_qty: i64,             // 已验收数量（质检通过累计）
    pub due_date: Option<NaiveDate>,   // 交货期
    pub priority_tag: Option<String>,  // 优先级标签

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// 本次质检的基准数量 = 要求数量 - 已验收数量（不为负）
    ///
    /// 返修后复检时, 已验收部分不再重复计入基准。
    pub fn outstanding_qty(&self) -> i64 {
        (self.required_qty - self.accepted_qty).max(0)
    }
}

// ==========================================
// Station - 机位（工位）
// ==========================================
// 红线: is_gate 显式标志为准; 名称/代码关键字匹配仅作为
//       未迁移机位目录数据的兼容回退
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,   // 机位唯一标识
    pub code: String,         // 机位代码
    pub display_name: String, // 机位显示名称
    pub is_gate: bool,        // 是否质检机位（显式标志）
}

/// 质检机位识别关键字（兼容回退, 大小写不敏感包含匹配）
pub const GATE_KEYWORDS: &[&str] = &["qc", "inspect", "quality", "质检", "检验"];

impl Station {
    /// 判断是否质检机位
    ///
    /// 优先显式标志; 标志未迁移时回退到代码/名称关键字匹配
    pub fn is_gate_station(&self) -> bool {
        if self.is_gate {
            return true;
        }
        let code = self.code.to_lowercase();
        let name = self.display_name.to_lowercase();
        GATE_KEYWORDS
            .iter()
            .any(|kw| code.contains(kw) || name.contains(kw))
    }
}

// ==========================================
// Operator - 操作员
// ==========================================
// 仅用于指派展示, 授权校验由外部身份系统负责
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub operator_id: String,  // 操作员唯一标识
    pub display_name: String, // 显示名称
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(code: &str, name: &str, is_gate: bool) -> Station {
        Station {
            station_id: "S1".to_string(),
            code: code.to_string(),
            display_name: name.to_string(),
            is_gate,
        }
    }

    #[test]
    fn test_explicit_gate_flag_wins() {
        assert!(station("H01", "平整机", true).is_gate_station());
        assert!(!station("H01", "平整机", false).is_gate_station());
    }

    #[test]
    fn test_gate_keyword_fallback() {
        assert!(station("QC-3", "终检台", false).is_gate_station());
        assert!(station("H07", "成品质检", false).is_gate_station());
        assert!(station("H08", "Final Inspect", false).is_gate_station());
    }

    #[test]
    fn test_outstanding_qty_never_negative() {
        let mut t = Ticket {
            ticket_id: "T1".to_string(),
            descriptor: None,
            required_qty: 100,
            accepted_qty: 92,
            due_date: None,
            priority_tag: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(t.outstanding_qty(), 8);
        t.accepted_qty = 100;
        assert_eq!(t.outstanding_qty(), 0);
    }
}
