// ==========================================
// 车间工票流转系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供边界层（桌面壳/服务端点）调用
// ==========================================

pub mod error;
pub mod gate_api;
pub mod presence_api;
pub mod rework_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use gate_api::{GateApi, GateSessionDto, GateSubmitResultDto, SetLineOutcomeRequest};
pub use presence_api::{PresenceApi, PresenceEntryDto, PresenceRequest};
pub use rework_api::{CreateReworkOrderRequest, ReworkApi, ReworkOrderDto, RoadmapStepDto};
