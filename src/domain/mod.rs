// ==========================================
// 车间工票流转系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod flow;
pub mod gate;
pub mod presence;
pub mod rework;
pub mod ticket;
pub mod types;

// 重导出核心类型
pub use flow::{active_step, check_ordering_invariant, FlowStep};
pub use gate::{ChecklistLine, GateSession, ReconcileResult};
pub use presence::{gate_resource_key, PresenceEntry};
pub use rework::{ReworkOrder, RoadmapStep};
pub use ticket::{Operator, Station, Ticket, GATE_KEYWORDS};
pub use types::{
    ApprovalStatus, LineOutcome, ReentryPolicy, ReworkSeverity, RoadmapStatus, StepStatus,
};
