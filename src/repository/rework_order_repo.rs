// ==========================================
// 车间工票流转系统 - 返修单仓储
// ==========================================
// 红线: 审批转换以 approval_status='PENDING' 守卫;
//       路线推进与工步仓储同样的状态前置条件守卫
// ==========================================

use crate::domain::rework::{ReworkOrder, RoadmapStep};
use crate::domain::types::{ApprovalStatus, ReworkSeverity, RoadmapStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ReworkOrderRepository - 返修单仓储
// ==========================================
pub struct ReworkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReworkOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入返修单及其路线（单事务）
    pub fn insert(&self, order: &ReworkOrder) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO rework_order (
                    order_id, ticket_id, source_seq_no, rework_qty, severity,
                    reason, approval_status, approved_by, approved_at,
                    reject_reason, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                &order.order_id,
                &order.ticket_id,
                &order.source_seq_no,
                &order.rework_qty,
                order.severity.to_db_str(),
                &order.reason,
                order.approval_status.to_db_str(),
                &order.approved_by,
                &order.approved_at,
                &order.reject_reason,
                &order.created_at,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO roadmap_step (
                        order_id, seq_no, station_id, operator_id, is_gate,
                        status, started_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for step in &order.roadmap {
                stmt.execute(params![
                    &order.order_id,
                    &step.seq_no,
                    &step.station_id,
                    &step.operator_id,
                    if step.is_gate { 1 } else { 0 },
                    step.status.to_db_str(),
                    &step.started_at,
                    &step.completed_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_roadmap(conn: &Connection, order_id: &str) -> RepositoryResult<Vec<RoadmapStep>> {
        let mut stmt = conn.prepare(
            r#"SELECT seq_no, station_id, operator_id, is_gate, status,
                      started_at, completed_at
               FROM roadmap_step WHERE order_id = ?1 ORDER BY seq_no"#,
        )?;
        let rows = stmt.query_map([order_id], |row| {
            let is_gate: i64 = row.get(3)?;
            let status: String = row.get(4)?;
            Ok(RoadmapStep {
                seq_no: row.get(0)?,
                station_id: row.get(1)?,
                operator_id: row.get(2)?,
                is_gate: is_gate != 0,
                status: RoadmapStatus::from_db_str(&status),
                started_at: row.get(5)?,
                completed_at: row.get(6)?,
            })
        })?;

        let mut steps = Vec::new();
        for row in rows {
            steps.push(row?);
        }
        Ok(steps)
    }

    /// 按主键查询返修单（含路线）
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<ReworkOrder> {
        let conn = self.get_conn()?;
        let head = conn
            .query_row(
                r#"SELECT order_id, ticket_id, source_seq_no, rework_qty, severity,
                          reason, approval_status, approved_by, approved_at,
                          reject_reason, created_at
                   FROM rework_order WHERE order_id = ?1"#,
                [order_id],
                |row| {
                    let severity: String = row.get(4)?;
                    let approval: String = row.get(6)?;
                    Ok(ReworkOrder {
                        order_id: row.get(0)?,
                        ticket_id: row.get(1)?,
                        source_seq_no: row.get(2)?,
                        rework_qty: row.get(3)?,
                        severity: ReworkSeverity::from_db_str(&severity),
                        reason: row.get(5)?,
                        approval_status: ApprovalStatus::from_db_str(&approval),
                        approved_by: row.get(7)?,
                        approved_at: row.get(8)?,
                        reject_reason: row.get(9)?,
                        created_at: row.get(10)?,
                        roadmap: Vec::new(),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ReworkOrder".to_string(),
                id: order_id.to_string(),
            })?;

        let roadmap = Self::load_roadmap(&conn, order_id)?;
        Ok(ReworkOrder { roadmap, ..head })
    }

    /// 查询工票名下的返修单（按创建时间升序）
    pub fn find_by_ticket(&self, ticket_id: &str) -> RepositoryResult<Vec<ReworkOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT order_id FROM rework_order WHERE ticket_id = ?1 ORDER BY created_at",
        )?;
        let ids: Vec<String> = stmt
            .query_map([ticket_id], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        let mut orders = Vec::new();
        for id in ids {
            orders.push(self.find_by_id(&id)?);
        }
        Ok(orders)
    }

    /// 审批转换（仅 PENDING 可出发; 单事务内同时启动首条路线工步）
    ///
    /// # 返回
    /// - Ok(true): 转换成功
    /// - Ok(false): 返修单不处于 PENDING（由调用方映射为 NotPending）
    pub fn set_approval(
        &self,
        order_id: &str,
        decision: ApprovalStatus,
        decided_by: &str,
        reject_reason: Option<&str>,
    ) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let updated = tx.execute(
            r#"UPDATE rework_order
               SET approval_status = ?1, approved_by = ?2, approved_at = ?3,
                   reject_reason = ?4
               WHERE order_id = ?5 AND approval_status = 'PENDING'"#,
            params![decision.to_db_str(), decided_by, now, reject_reason, order_id],
        )?;

        if updated == 0 {
            return Ok(false);
        }

        // 批准即启动首条路线工步
        if decision == ApprovalStatus::Approved {
            tx.execute(
                r#"UPDATE roadmap_step SET status = 'IN_PROGRESS', started_at = ?1
                   WHERE order_id = ?2 AND status = 'PENDING'
                     AND seq_no = (SELECT MIN(seq_no) FROM roadmap_step WHERE order_id = ?2)"#,
                params![now, order_id],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// 推进路线工步: IN_PROGRESS→COMPLETED, 后继 PENDING→IN_PROGRESS
    ///
    /// # 返回
    /// - Ok(true): 推进成功
    /// - Ok(false): 目标工步不处于 IN_PROGRESS
    pub fn advance_roadmap_step(&self, order_id: &str, seq_no: i64) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let completed = tx.execute(
            r#"UPDATE roadmap_step SET status = 'COMPLETED', completed_at = ?1
               WHERE order_id = ?2 AND seq_no = ?3 AND status = 'IN_PROGRESS'"#,
            params![now, order_id, seq_no],
        )?;

        if completed == 0 {
            return Ok(false);
        }

        tx.execute(
            r#"UPDATE roadmap_step SET status = 'IN_PROGRESS', started_at = ?1
               WHERE order_id = ?2 AND seq_no = ?3 AND status = 'PENDING'"#,
            params![now, order_id, seq_no + 1],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// 路线是否已全部完成
    pub fn is_complete(&self, order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let (total, done): (i64, i64) = conn.query_row(
            r#"SELECT COUNT(*),
                      SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END)
               FROM roadmap_step WHERE order_id = ?1"#,
            [order_id],
            |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
        )?;
        Ok(total > 0 && total == done)
    }
}
