// ==========================================
// 车间工票流转系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 职责: 初始化日志/数据库并自检 schema, 供边界层接入
// ==========================================

use std::path::PathBuf;

use anyhow::Context;
use ticket_flow::db;

fn default_db_path() -> PathBuf {
    std::env::var("TICKET_FLOW_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ticket_flow.db"))
}

fn main() -> anyhow::Result<()> {
    ticket_flow::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", ticket_flow::APP_NAME);
    tracing::info!("系统版本: {}", ticket_flow::VERSION);
    tracing::info!("==================================================");

    let db_path = default_db_path();
    tracing::info!("使用数据库: {}", db_path.display());

    let conn = db::open_sqlite_connection(&db_path).context("数据库打开失败")?;
    db::ensure_schema(&conn).context("schema 初始化失败")?;

    let schema_version = db::read_schema_version(&conn).context("schema 版本读取失败")?;
    tracing::info!(schema_version, "数据库就绪");

    Ok(())
}
