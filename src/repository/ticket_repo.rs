// ==========================================
// 车间工票流转系统 - 工票/机位仓储
// ==========================================
// 红线: 工票主数据由外部系统维护, 本核心只在质检提交时
//       增量写回 accepted_qty (单事务 read-modify-write)
// ==========================================

use crate::domain::ticket::{Station, Ticket};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// TicketRepository - 工票仓储
// ==========================================
pub struct TicketRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TicketRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入工票（供外部导入/测试种子使用）
    pub fn insert(&self, ticket: &Ticket) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO ticket (
                    ticket_id, descriptor, required_qty, accepted_qty,
                    due_date, priority_tag, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                &ticket.ticket_id,
                &ticket.descriptor,
                &ticket.required_qty,
                &ticket.accepted_qty,
                ticket.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                &ticket.priority_tag,
                &ticket.created_at,
                &ticket.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询工票
    pub fn find_by_id(&self, ticket_id: &str) -> RepositoryResult<Ticket> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"SELECT ticket_id, descriptor, required_qty, accepted_qty,
                      due_date, priority_tag, created_at, updated_at
               FROM ticket WHERE ticket_id = ?1"#,
            [ticket_id],
            |row| {
                let due_date: Option<String> = row.get(4)?;
                Ok(Ticket {
                    ticket_id: row.get(0)?,
                    descriptor: row.get(1)?,
                    required_qty: row.get(2)?,
                    accepted_qty: row.get(3)?,
                    due_date: due_date
                        .and_then(|s| chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    priority_tag: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "Ticket".to_string(),
            id: ticket_id.to_string(),
        })
    }

    /// 增量写回已验收数量 (单事务, 守卫 accepted <= required)
    ///
    /// # 返回
    /// - Ok(new_accepted): 写回后的已验收数量
    pub fn increment_accepted_qty(&self, ticket_id: &str, delta: i64) -> RepositoryResult<i64> {
        if delta < 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "验收数量增量不可为负: {}",
                delta
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let (required, accepted): (i64, i64) = tx
            .query_row(
                "SELECT required_qty, accepted_qty FROM ticket WHERE ticket_id = ?1",
                [ticket_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Ticket".to_string(),
                id: ticket_id.to_string(),
            })?;

        // 不变量: accepted_qty 不得超过 required_qty
        let new_accepted = (accepted + delta).min(required);

        tx.execute(
            "UPDATE ticket SET accepted_qty = ?1, updated_at = ?2 WHERE ticket_id = ?3",
            params![new_accepted, Utc::now(), ticket_id],
        )?;

        tx.commit()?;
        Ok(new_accepted)
    }
}

// ==========================================
// StationRepository - 机位目录仓储
// ==========================================
// 机位目录为外部协作方数据, 本核心只读 + 种子写入
pub struct StationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新机位（目录同步/测试种子）
    pub fn upsert(&self, station: &Station) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO station (station_id, code, display_name, is_gate)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                &station.station_id,
                &station.code,
                &station.display_name,
                if station.is_gate { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    /// 按主键查询机位
    pub fn find_by_id(&self, station_id: &str) -> RepositoryResult<Station> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT station_id, code, display_name, is_gate FROM station WHERE station_id = ?1",
            [station_id],
            |row| {
                let is_gate: i64 = row.get(3)?;
                Ok(Station {
                    station_id: row.get(0)?,
                    code: row.get(1)?,
                    display_name: row.get(2)?,
                    is_gate: is_gate != 0,
                })
            },
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "Station".to_string(),
            id: station_id.to_string(),
        })
    }

    /// 查询全部机位（路线编辑候选）
    pub fn list_all(&self) -> RepositoryResult<Vec<Station>> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT station_id, code, display_name, is_gate FROM station ORDER BY code")?;
        let rows = stmt.query_map([], |row| {
            let is_gate: i64 = row.get(3)?;
            Ok(Station {
                station_id: row.get(0)?,
                code: row.get(1)?,
                display_name: row.get(2)?,
                is_gate: is_gate != 0,
            })
        })?;

        let mut stations = Vec::new();
        for row in rows {
            stations.push(row?);
        }
        Ok(stations)
    }
}
