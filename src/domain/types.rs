// ==========================================
// 车间工票流转系统 - 领域类型定义
// ==========================================
// 职责: 状态体系与枚举定义
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工步状态 (Step Status)
// ==========================================
// 红线: 同一工票至多一个 CURRENT 工步
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,   // 待开工
    Current,   // 进行中（当前工步）
    Completed, // 已完成
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl StepStatus {
    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "CURRENT" => StepStatus::Current,
            "COMPLETED" => StepStatus::Completed,
            _ => StepStatus::Pending,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Current => "CURRENT",
            StepStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 返修工步状态 (Roadmap Step Status)
// ==========================================
// 与 StepStatus 区分: 返修路线执行中的工步显式标记 IN_PROGRESS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadmapStatus {
    Pending,    // 待执行
    InProgress, // 执行中
    Completed,  // 已完成
}

impl fmt::Display for RoadmapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RoadmapStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IN_PROGRESS" => RoadmapStatus::InProgress,
            "COMPLETED" => RoadmapStatus::Completed,
            _ => RoadmapStatus::Pending,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RoadmapStatus::Pending => "PENDING",
            RoadmapStatus::InProgress => "IN_PROGRESS",
            RoadmapStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 检查项结论 (Line Outcome)
// ==========================================
// 红线: FAIL 结论必须携带数量与原因 (提交校验兜底)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineOutcome {
    Unset, // 未判定
    Pass,  // 合格
    Fail,  // 不合格
}

impl fmt::Display for LineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl LineOutcome {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PASS" => LineOutcome::Pass,
            "FAIL" => LineOutcome::Fail,
            _ => LineOutcome::Unset,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            LineOutcome::Unset => "UNSET",
            LineOutcome::Pass => "PASS",
            LineOutcome::Fail => "FAIL",
        }
    }
}

// ==========================================
// 审批状态 (Approval Status)
// ==========================================
// 红线: 只能从 PENDING 出发, 两个出向转换均为终态
// 撤销 = 新建返修单, 不是状态回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,  // 待审批
    Approved, // 已批准
    Rejected, // 已驳回
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ApprovalStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "APPROVED" => ApprovalStatus::Approved,
            "REJECTED" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Pending,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

// ==========================================
// 返修严重度 (Rework Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReworkSeverity {
    General,    // 一般（默认类别）
    Appearance, // 外观缺陷
    Dimension,  // 尺寸超差
    Critical,   // 严重缺陷
}

impl Default for ReworkSeverity {
    fn default() -> Self {
        ReworkSeverity::General
    }
}

impl fmt::Display for ReworkSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ReworkSeverity {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "APPEARANCE" => ReworkSeverity::Appearance,
            "DIMENSION" => ReworkSeverity::Dimension,
            "CRITICAL" => ReworkSeverity::Critical,
            _ => ReworkSeverity::General,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReworkSeverity::General => "GENERAL",
            ReworkSeverity::Appearance => "APPEARANCE",
            ReworkSeverity::Dimension => "DIMENSION",
            ReworkSeverity::Critical => "CRITICAL",
        }
    }
}

// ==========================================
// 返修完成回流策略 (Reentry Policy)
// ==========================================
// 返修单完成后父工票如何继续:
// - REENTER_GATE: 质检工步保持 CURRENT, 允许重新开检 (默认)
// - SKIP_FORWARD: 直接推进质检工步, 工票继续后续流转
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReentryPolicy {
    ReenterGate,
    SkipForward,
}

impl Default for ReentryPolicy {
    fn default() -> Self {
        ReentryPolicy::ReenterGate
    }
}

impl fmt::Display for ReentryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ReentryPolicy {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SKIP_FORWARD" => ReentryPolicy::SkipForward,
            _ => ReentryPolicy::ReenterGate,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReentryPolicy::ReenterGate => "REENTER_GATE",
            ReentryPolicy::SkipForward => "SKIP_FORWARD",
        }
    }
}
