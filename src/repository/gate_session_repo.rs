// ==========================================
// 车间工票流转系统 - 质检会话仓储
// ==========================================
// 红线: 提交 (finalize) 以 submitted_at IS NULL 守卫,
//       二次提交结构性失败; 已提交会话的检查项不可再编辑
// ==========================================

use crate::domain::gate::{ChecklistLine, GateSession};
use crate::domain::types::LineOutcome;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// GateSessionRepository - 质检会话仓储
// ==========================================
pub struct GateSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GateSessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入会话及其检查项（单事务）
    pub fn insert(&self, session: &GateSession) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO gate_session (
                    session_id, ticket_id, seq_no, started_at, submitted_at,
                    pass_qty, fail_qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &session.session_id,
                &session.ticket_id,
                &session.seq_no,
                &session.started_at,
                &session.submitted_at,
                &session.pass_qty,
                &session.fail_qty,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO checklist_line (
                        line_id, session_id, seq_no, label, outcome, fail_qty, fail_reason
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for line in &session.lines {
                stmt.execute(params![
                    &line.line_id,
                    &session.session_id,
                    &line.seq_no,
                    &line.label,
                    line.outcome.to_db_str(),
                    &line.fail_qty,
                    &line.fail_reason,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_lines(conn: &Connection, session_id: &str) -> RepositoryResult<Vec<ChecklistLine>> {
        let mut stmt = conn.prepare(
            r#"SELECT line_id, seq_no, label, outcome, fail_qty, fail_reason
               FROM checklist_line WHERE session_id = ?1 ORDER BY seq_no"#,
        )?;
        let rows = stmt.query_map([session_id], |row| {
            let outcome: String = row.get(3)?;
            Ok(ChecklistLine {
                line_id: row.get(0)?,
                seq_no: row.get(1)?,
                label: row.get(2)?,
                outcome: LineOutcome::from_db_str(&outcome),
                fail_qty: row.get(4)?,
                fail_reason: row.get(5)?,
            })
        })?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    fn row_to_session(
        conn: &Connection,
        row: (String, String, i64, DateTime<Utc>, Option<DateTime<Utc>>, i64, i64),
    ) -> RepositoryResult<GateSession> {
        let lines = Self::load_lines(conn, &row.0)?;
        Ok(GateSession {
            session_id: row.0,
            ticket_id: row.1,
            seq_no: row.2,
            started_at: row.3,
            submitted_at: row.4,
            pass_qty: row.5,
            fail_qty: row.6,
            lines,
        })
    }

    /// 查询 (工票, 工步) 的未提交会话
    pub fn find_open(&self, ticket_id: &str, seq_no: i64) -> RepositoryResult<Option<GateSession>> {
        let conn = self.get_conn()?;
        let head = conn
            .query_row(
                r#"SELECT session_id, ticket_id, seq_no, started_at, submitted_at,
                          pass_qty, fail_qty
                   FROM gate_session
                   WHERE ticket_id = ?1 AND seq_no = ?2 AND submitted_at IS NULL"#,
                params![ticket_id, seq_no],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        match head {
            Some(row) => Ok(Some(Self::row_to_session(&conn, row)?)),
            None => Ok(None),
        }
    }

    /// 按主键查询会话
    pub fn find_by_id(&self, session_id: &str) -> RepositoryResult<GateSession> {
        let conn = self.get_conn()?;
        let head = conn
            .query_row(
                r#"SELECT session_id, ticket_id, seq_no, started_at, submitted_at,
                          pass_qty, fail_qty
                   FROM gate_session WHERE session_id = ?1"#,
                [session_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "GateSession".to_string(),
                id: session_id.to_string(),
            })?;

        Self::row_to_session(&conn, head)
    }

    /// 更新检查项判定（仅未提交会话）
    ///
    /// # 返回
    /// - Ok(true): 更新成功
    /// - Ok(false): 检查项不存在或会话已提交
    pub fn update_line(
        &self,
        session_id: &str,
        line_id: &str,
        outcome: LineOutcome,
        fail_qty: Option<i64>,
        fail_reason: Option<&str>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"UPDATE checklist_line SET outcome = ?1, fail_qty = ?2, fail_reason = ?3
               WHERE line_id = ?4 AND session_id = ?5
                 AND EXISTS (
                     SELECT 1 FROM gate_session
                     WHERE session_id = ?5 AND submitted_at IS NULL
                 )"#,
            params![outcome.to_db_str(), fail_qty, fail_reason, line_id, session_id],
        )?;
        Ok(updated > 0)
    }

    /// 固化提交结果（终态, submitted_at IS NULL 守卫）
    ///
    /// # 返回
    /// - Ok(true): 提交成功
    /// - Ok(false): 会话已被提交（并发二次提交）
    pub fn finalize(
        &self,
        session_id: &str,
        pass_qty: i64,
        fail_qty: i64,
        submitted_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"UPDATE gate_session
               SET submitted_at = ?1, pass_qty = ?2, fail_qty = ?3
               WHERE session_id = ?4 AND submitted_at IS NULL"#,
            params![submitted_at, pass_qty, fail_qty, session_id],
        )?;
        Ok(updated > 0)
    }
}
