// ==========================================
// 车间工票流转系统 - 工作流错误类型
// ==========================================
// 分类:
// - 校验错误: 用户可纠正, 原样回传
// - 状态冲突: 客户端视图过期, 提示刷新重试
// - 未找到: 原样上抛, 不静默兜底
// 红线: 核心内不自动重试, 所有错误对调用方可恢复
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 工作流核心错误类型
#[derive(Error, Debug)]
pub enum WorkflowError {
    // ===== 校验错误 =====
    #[error("质检项未判定: 至少需要一项检查结论")]
    NoLinesChecked,

    #[error("检查项数据未落定 (line={label}): 已填写数量/原因但结论仍为未判定")]
    UncommittedData { line_id: String, label: String },

    #[error("不合格项缺少原因 (line={label})")]
    MissingFailReason { line_id: String, label: String },

    #[error("不合格项数量非法 (line={label}): 数量必须大于 0")]
    MissingFailQty { line_id: String, label: String },

    #[error("返修路线为空: 返修单必须至少包含一条路线工步")]
    EmptyRoadmap,

    #[error("返修路线工步不完整 (seq={seq_no}): {message}")]
    IncompleteRoadmapStep { seq_no: i64, message: String },

    #[error("驳回必须填写原因")]
    EmptyRejectReason,

    #[error("返修数量超出不合格数量: rework={rework_qty}, fail={fail_qty}")]
    ReworkQtyExceedsFail { rework_qty: i64, fail_qty: i64 },

    #[error("非质检机位不可开检: station={station_id}")]
    NotGateStation { station_id: String },

    // ===== 状态冲突错误 =====
    #[error("无效的状态转换: {entity}(id={id}) 当前为 {from}, 期望 {expected}")]
    InvalidTransition {
        entity: String,
        id: String,
        from: String,
        expected: String,
    },

    #[error("质检会话已提交, 不可再修改: session_id={session_id}")]
    AlreadySubmitted { session_id: String },

    #[error("返修单不处于待审批状态: order_id={order_id}, status={status}")]
    NotPending { order_id: String, status: String },

    // ===== 数据访问透传 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    /// 是否用户可纠正的校验错误（区别于状态冲突）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::NoLinesChecked
                | WorkflowError::UncommittedData { .. }
                | WorkflowError::MissingFailReason { .. }
                | WorkflowError::MissingFailQty { .. }
                | WorkflowError::EmptyRoadmap
                | WorkflowError::IncompleteRoadmapStep { .. }
                | WorkflowError::EmptyRejectReason
                | WorkflowError::ReworkQtyExceedsFail { .. }
                | WorkflowError::NotGateStation { .. }
        )
    }
}

/// Result 类型别名
pub type WorkflowResult<T> = Result<T, WorkflowError>;
