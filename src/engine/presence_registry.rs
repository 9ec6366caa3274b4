// ==========================================
// 车间工票流转系统 - 在场登记表
// ==========================================
// 职责: 资源维度的协同在场感知 (谁也在看这张工票的质检)
// 红线: 纯内存、尽力而为; 不参与任何业务判定,
//       过期条目由读取路径惰性剔除
// ==========================================

use crate::domain::presence::PresenceEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// 在场保活缺省超时
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(30);

struct Holder {
    label: String,
    last_heartbeat_at: DateTime<Utc>,
    last_seen: Instant, // 过期判定用单调时钟, 不受系统时间回拨影响
}

// ==========================================
// PresenceRegistry - 在场登记表
// ==========================================
pub struct PresenceRegistry {
    ttl: Duration,
    // resource_key -> (holder_id -> Holder)
    inner: Mutex<HashMap<String, HashMap<String, Holder>>>,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_PRESENCE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, Holder>>> {
        // 登记表不含业务不变量, 中毒后直接复用内层数据
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 进入资源（重复进入视为心跳刷新）
    pub fn enter(&self, resource_key: &str, holder_id: &str, label: &str) {
        let mut map = self.lock();
        map.entry(resource_key.to_string()).or_default().insert(
            holder_id.to_string(),
            Holder {
                label: label.to_string(),
                last_heartbeat_at: Utc::now(),
                last_seen: Instant::now(),
            },
        );
        debug!(resource_key, holder_id, "进入在场登记");
    }

    /// 心跳保活; 条目已不存在（被剔除或从未进入）时返回 false,
    /// 调用方应重新 enter
    pub fn heartbeat(&self, resource_key: &str, holder_id: &str) -> bool {
        let mut map = self.lock();
        match map.get_mut(resource_key).and_then(|h| h.get_mut(holder_id)) {
            Some(holder) => {
                holder.last_heartbeat_at = Utc::now();
                holder.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// 显式离开资源（幂等）
    pub fn exit(&self, resource_key: &str, holder_id: &str) {
        let mut map = self.lock();
        if let Some(holders) = map.get_mut(resource_key) {
            holders.remove(holder_id);
            if holders.is_empty() {
                map.remove(resource_key);
            }
        }
        debug!(resource_key, holder_id, "离开在场登记");
    }

    /// 列出资源上除自己之外的在场者, 顺带剔除过期条目
    pub fn others_present(&self, resource_key: &str, self_id: &str) -> Vec<PresenceEntry> {
        let mut map = self.lock();
        let Some(holders) = map.get_mut(resource_key) else {
            return Vec::new();
        };

        holders.retain(|_, h| h.last_seen.elapsed() <= self.ttl);
        if holders.is_empty() {
            map.remove(resource_key);
            return Vec::new();
        }

        let mut entries: Vec<PresenceEntry> = holders
            .iter()
            .filter(|(id, _)| id.as_str() != self_id)
            .map(|(id, h)| PresenceEntry {
                resource_key: resource_key.to_string(),
                holder_id: id.clone(),
                label: h.label.clone(),
                last_heartbeat: h.last_heartbeat_at,
            })
            .collect();
        entries.sort_by(|a, b| a.holder_id.cmp(&b.holder_id));
        entries
    }
}
