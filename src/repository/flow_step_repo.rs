// ==========================================
// 车间工票流转系统 - 工步仓储
// ==========================================
// 红线: 状态推进必须在单事务内以状态前置条件守卫
//       (UPDATE ... WHERE status='CURRENT'), 并发竞争时
//       后写者结构性失败而不是静默覆盖
// ==========================================

use crate::domain::flow::FlowStep;
use crate::domain::types::StepStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// FlowStepRepository - 工步仓储
// ==========================================
pub struct FlowStepRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FlowStepRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn row_to_step(row: &Row<'_>) -> rusqlite::Result<FlowStep> {
        let status: String = row.get(4)?;
        Ok(FlowStep {
            ticket_id: row.get(0)?,
            seq_no: row.get(1)?,
            station_id: row.get(2)?,
            operator_id: row.get(3)?,
            status: StepStatus::from_db_str(&status),
            rework_order_id: row.get(5)?,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }

    const SELECT_COLS: &'static str = r#"ticket_id, seq_no, station_id, operator_id,
               status, rework_order_id, started_at, completed_at"#;

    /// 批量插入工步（建立工票路线时一次性写入）
    ///
    /// 首条工步 (seq_no 最小) 置为 CURRENT, 其余 PENDING。
    pub fn establish_route(&self, steps: &[FlowStep]) -> RepositoryResult<usize> {
        if steps.is_empty() {
            return Ok(0);
        }

        let first_seq = steps.iter().map(|s| s.seq_no).min().unwrap_or(0);

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO flow_step (
                        ticket_id, seq_no, station_id, operator_id,
                        status, rework_order_id, started_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;

            for step in steps {
                let (status, started_at) = if step.seq_no == first_seq {
                    (StepStatus::Current, Some(Utc::now()))
                } else {
                    (StepStatus::Pending, None)
                };
                stmt.execute(params![
                    &step.ticket_id,
                    &step.seq_no,
                    &step.station_id,
                    &step.operator_id,
                    status.to_db_str(),
                    &step.rework_order_id,
                    started_at,
                    Option::<chrono::DateTime<Utc>>::None,
                ])?;
            }
        }

        tx.commit()?;
        Ok(steps.len())
    }

    /// 查询工票的全部工步（按序号升序）
    pub fn find_by_ticket(&self, ticket_id: &str) -> RepositoryResult<Vec<FlowStep>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM flow_step WHERE ticket_id = ?1 ORDER BY seq_no",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([ticket_id], Self::row_to_step)?;

        let mut steps = Vec::new();
        for row in rows {
            steps.push(row?);
        }
        Ok(steps)
    }

    /// 查询单个工步
    pub fn find_one(&self, ticket_id: &str, seq_no: i64) -> RepositoryResult<FlowStep> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM flow_step WHERE ticket_id = ?1 AND seq_no = ?2",
            Self::SELECT_COLS
        );
        conn.query_row(&sql, params![ticket_id, seq_no], Self::row_to_step)
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "FlowStep".to_string(),
                id: format!("{}#{}", ticket_id, seq_no),
            })
    }

    /// 推进工步: CURRENT→COMPLETED, 后继 PENDING→CURRENT (单事务)
    ///
    /// # 返回
    /// - Ok(true): 推进成功
    /// - Ok(false): 目标工步不处于 CURRENT (状态前置条件失败, 由调用方
    ///   映射为 InvalidTransition)
    pub fn complete_and_promote_next(&self, ticket_id: &str, seq_no: i64) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let completed = tx.execute(
            r#"UPDATE flow_step SET status = 'COMPLETED', completed_at = ?1
               WHERE ticket_id = ?2 AND seq_no = ?3 AND status = 'CURRENT'"#,
            params![now, ticket_id, seq_no],
        )?;

        if completed == 0 {
            // 前置条件失败, 不提交任何变更
            return Ok(false);
        }

        tx.execute(
            r#"UPDATE flow_step SET status = 'CURRENT', started_at = ?1
               WHERE ticket_id = ?2 AND seq_no = ?3 AND status = 'PENDING'"#,
            params![now, ticket_id, seq_no + 1],
        )?;

        tx.commit()?;
        Ok(true)
    }
}
