// ==========================================
// 车间工票流转系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::domain::types::{ReentryPolicy, ReworkSeverity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

/// 配置键: 返修完成回流策略
pub const KEY_REWORK_REENTRY_POLICY: &str = "rework_reentry_policy";
/// 配置键: 在场心跳存活窗口（秒）
pub const KEY_PRESENCE_TTL_SECONDS: &str = "presence_ttl_seconds";
/// 配置键: 质检检查项模板（JSON 字符串数组）
pub const KEY_GATE_CHECKLIST_LABELS: &str = "gate_checklist_labels";
/// 配置键: 返修默认严重度
pub const KEY_REWORK_DEFAULT_SEVERITY: &str = "rework_default_severity";

/// 默认检查项模板（配置缺失时的兜底）
pub const DEFAULT_CHECKLIST_LABELS: &[&str] = &["外观检查", "尺寸检查", "性能检查"];

/// 默认在场心跳存活窗口（秒）
pub const DEFAULT_PRESENCE_TTL_SECONDS: u64 = 30;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
               ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 返修完成回流策略（默认 REENTER_GATE）
    pub fn rework_reentry_policy(&self) -> RepositoryResult<ReentryPolicy> {
        Ok(self
            .get_config_value(KEY_REWORK_REENTRY_POLICY)?
            .map(|v| ReentryPolicy::from_db_str(&v))
            .unwrap_or_default())
    }

    /// 在场心跳存活窗口（默认 30 秒）
    pub fn presence_ttl_seconds(&self) -> RepositoryResult<u64> {
        Ok(self
            .get_config_value(KEY_PRESENCE_TTL_SECONDS)?
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PRESENCE_TTL_SECONDS))
    }

    /// 质检检查项模板
    pub fn gate_checklist_labels(&self) -> RepositoryResult<Vec<String>> {
        if let Some(raw) = self.get_config_value(KEY_GATE_CHECKLIST_LABELS)? {
            if let Ok(labels) = serde_json::from_str::<Vec<String>>(&raw) {
                if !labels.is_empty() {
                    return Ok(labels);
                }
            }
            tracing::warn!(key = KEY_GATE_CHECKLIST_LABELS, "检查项模板配置非法, 使用默认模板");
        }
        Ok(DEFAULT_CHECKLIST_LABELS
            .iter()
            .map(|s| s.to_string())
            .collect())
    }

    /// 返修默认严重度（默认 GENERAL）
    pub fn rework_default_severity(&self) -> RepositoryResult<ReworkSeverity> {
        Ok(self
            .get_config_value(KEY_REWORK_DEFAULT_SEVERITY)?
            .map(|v| ReworkSeverity::from_db_str(&v))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = setup();
        assert_eq!(cfg.rework_reentry_policy().unwrap(), ReentryPolicy::ReenterGate);
        assert_eq!(cfg.presence_ttl_seconds().unwrap(), DEFAULT_PRESENCE_TTL_SECONDS);
        assert_eq!(cfg.rework_default_severity().unwrap(), ReworkSeverity::General);
        assert_eq!(
            cfg.gate_checklist_labels().unwrap().len(),
            DEFAULT_CHECKLIST_LABELS.len()
        );
    }

    #[test]
    fn test_override_roundtrip() {
        let cfg = setup();
        cfg.set_config_value(KEY_REWORK_REENTRY_POLICY, "SKIP_FORWARD").unwrap();
        cfg.set_config_value(KEY_PRESENCE_TTL_SECONDS, "5").unwrap();
        cfg.set_config_value(KEY_GATE_CHECKLIST_LABELS, r#"["首检","终检"]"#).unwrap();

        assert_eq!(cfg.rework_reentry_policy().unwrap(), ReentryPolicy::SkipForward);
        assert_eq!(cfg.presence_ttl_seconds().unwrap(), 5);
        assert_eq!(cfg.gate_checklist_labels().unwrap(), vec!["首检", "终检"]);
    }
}
