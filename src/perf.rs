// ==========================================
// 车间工票流转系统 - SQL 性能追踪
// ==========================================
// 用途: SQL 计数 + 慢查询日志 (调试排障)
// 开关:
// - Debug 默认开启; Release 默认关闭
// - TICKET_FLOW_PERF_SQL=1 强制开启
// - TICKET_FLOW_SLOW_SQL_MS=50 配置慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    if s.chars().count() <= max_len {
        return s;
    }
    let head: String = s.chars().take(max_len).collect();
    format!("{}…", head)
}

/// 安装 SQLite 语句 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = match std::env::var("TICKET_FLOW_PERF_SQL") {
        Ok(v) => is_true(&v),
        Err(_) => cfg!(debug_assertions),
    };

    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        // 显式清理, 避免复用连接导致残留 callback
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("TICKET_FLOW_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(sql_trace_callback));
    conn.profile(Some(sql_profile_callback));
}

fn sql_trace_callback(sql: &str) {
    if PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        tracing::trace!(sql = %truncate_sql(sql, 200), "执行 SQL");
    }
}

fn sql_profile_callback(sql: &str, elapsed: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    let elapsed_ms = elapsed.as_millis() as u64;
    if threshold > 0 && elapsed_ms >= threshold {
        tracing::warn!(
            elapsed_ms,
            sql = %truncate_sql(sql, 200),
            "慢 SQL"
        );
    }
}
