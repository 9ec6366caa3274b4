// ==========================================
// 车间工票流转系统 - 配置层
// ==========================================
// 职责: 系统配置读取与覆写 (config_kv 表)
// ==========================================

pub mod config_manager;

pub use config_manager::{
    ConfigManager, DEFAULT_CHECKLIST_LABELS, DEFAULT_PRESENCE_TTL_SECONDS,
    KEY_GATE_CHECKLIST_LABELS, KEY_PRESENCE_TTL_SECONDS, KEY_REWORK_DEFAULT_SEVERITY,
    KEY_REWORK_REENTRY_POLICY,
};
