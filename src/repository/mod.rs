// ==========================================
// 车间工票流转系统 - 数据仓储层
// ==========================================
// 职责: SQLite 数据访问; 所有状态转换在单事务内
//       以状态前置条件守卫, 避免并发丢失更新
// ==========================================

pub mod error;
pub mod flow_step_repo;
pub mod gate_session_repo;
pub mod rework_order_repo;
pub mod ticket_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use flow_step_repo::FlowStepRepository;
pub use gate_session_repo::GateSessionRepository;
pub use rework_order_repo::ReworkOrderRepository;
pub use ticket_repo::{StationRepository, TicketRepository};
