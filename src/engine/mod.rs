// ==========================================
// 车间工票流转系统 - 工作流引擎层
// ==========================================
// 职责: 工步流转 / 质检门 / 返修编排 / 审批门 / 在场感知
// 红线: 引擎只依赖仓库与配置, 不感知边界层
// ==========================================

pub mod error;
pub mod flow_engine;
pub mod gate_controller;
pub mod presence_registry;
pub mod rework_orchestrator;

pub use error::{WorkflowError, WorkflowResult};
pub use flow_engine::StationFlowEngine;
pub use gate_controller::{
    reconcile_lines, validate_lines_for_submit, GateSubmitOutcome, QualityGateController,
};
pub use presence_registry::{PresenceRegistry, DEFAULT_PRESENCE_TTL};
pub use rework_orchestrator::ReworkOrchestrator;
