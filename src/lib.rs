// ==========================================
// 车间工票流转系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 质检与返修工作流核心 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 性能观测（SQL 跟踪）
pub mod perf;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ApprovalStatus, LineOutcome, ReentryPolicy, ReworkSeverity, RoadmapStatus, StepStatus,
};

// 领域实体
pub use domain::{
    ChecklistLine, FlowStep, GateSession, Operator, PresenceEntry, ReconcileResult, ReworkOrder,
    RoadmapStep, Station, Ticket,
};

// 引擎
pub use engine::{
    PresenceRegistry, QualityGateController, ReworkOrchestrator, StationFlowEngine, WorkflowError,
    WorkflowResult,
};

// API
pub use api::{ApiError, ApiResult, GateApi, PresenceApi, ReworkApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车间工票流转系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
