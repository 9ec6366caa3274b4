// ==========================================
// 车间工票流转系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为, 避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 提供内嵌 schema 初始化 (建表幂等)
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection<P: AsRef<std::path::Path>>(db_path: P) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化工作流核心 schema（幂等）
///
/// 逻辑布局:
/// - ticket: 工票主数据（外部创建, 本核心写回 accepted_qty）
/// - station: 机位目录（含显式 is_gate 标志）
/// - flow_step: 工票工步（每票一条有序列表）
/// - gate_session / checklist_line: 质检会话与检查项
/// - rework_order / roadmap_step: 返修单与返修路线
/// - config_kv: 配置键值（scope + key）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS ticket (
            ticket_id TEXT PRIMARY KEY,
            descriptor TEXT,
            required_qty INTEGER NOT NULL,
            accepted_qty INTEGER NOT NULL DEFAULT 0,
            due_date TEXT,
            priority_tag TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (accepted_qty >= 0 AND accepted_qty <= required_qty)
        );

        CREATE TABLE IF NOT EXISTS station (
            station_id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            display_name TEXT NOT NULL,
            is_gate INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_step (
            ticket_id TEXT NOT NULL REFERENCES ticket(ticket_id),
            seq_no INTEGER NOT NULL,
            station_id TEXT NOT NULL REFERENCES station(station_id),
            operator_id TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING',
            rework_order_id TEXT,
            started_at TEXT,
            completed_at TEXT,
            PRIMARY KEY (ticket_id, seq_no)
        );

        CREATE TABLE IF NOT EXISTS gate_session (
            session_id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES ticket(ticket_id),
            seq_no INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            submitted_at TEXT,
            pass_qty INTEGER NOT NULL DEFAULT 0,
            fail_qty INTEGER NOT NULL DEFAULT 0
        );

        -- 同一 (工票, 工步) 至多一个未提交会话（存储层兜底）
        CREATE UNIQUE INDEX IF NOT EXISTS idx_gate_session_open
          ON gate_session(ticket_id, seq_no) WHERE submitted_at IS NULL;

        CREATE TABLE IF NOT EXISTS checklist_line (
            line_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES gate_session(session_id),
            seq_no INTEGER NOT NULL,
            label TEXT NOT NULL,
            outcome TEXT NOT NULL DEFAULT 'UNSET',
            fail_qty INTEGER,
            fail_reason TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_checklist_line_session
          ON checklist_line(session_id, seq_no);

        CREATE TABLE IF NOT EXISTS rework_order (
            order_id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES ticket(ticket_id),
            source_seq_no INTEGER NOT NULL,
            rework_qty INTEGER NOT NULL,
            severity TEXT NOT NULL DEFAULT 'GENERAL',
            reason TEXT NOT NULL,
            approval_status TEXT NOT NULL DEFAULT 'PENDING',
            approved_by TEXT,
            approved_at TEXT,
            reject_reason TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_rework_order_ticket
          ON rework_order(ticket_id, approval_status);

        CREATE TABLE IF NOT EXISTS roadmap_step (
            order_id TEXT NOT NULL REFERENCES rework_order(order_id),
            seq_no INTEGER NOT NULL,
            station_id TEXT NOT NULL,
            operator_id TEXT,
            is_gate INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'PENDING',
            started_at TEXT,
            completed_at TEXT,
            PRIMARY KEY (order_id, seq_no)
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;

    // schema_version 只追加不回退
    let current = read_schema_version(conn)?;
    if current.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }
}
