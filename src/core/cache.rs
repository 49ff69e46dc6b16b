use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::core::clock::Clock;

/// 页面缓存：按路由键保存渲染好的页面，只会因过期或显式清理而失效，
/// 数据修改不会使其失效。
pub trait PageCache: Send + Sync {
    /// 取未过期的缓存
    fn get(&self, key: &str) -> Option<String>;

    /// 写入缓存，`ttl` 后过期
    fn set(&self, key: &str, value: String, ttl: Duration);

    /// 清除所有以 `prefix` 开头的键，返回清除的数量
    fn flush(&self, prefix: &str) -> usize;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// 内存中的页面缓存
pub struct MemoryPageCache {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryPageCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PageCache for MemoryPageCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                debug!("Page cache hit: {}", key);
                Some(entry.value.clone())
            }
            _ => {
                debug!("Page cache miss: {}", key);
                None
            }
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
    }

    fn flush(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        info!("Flushed {} page cache entries with prefix '{}'", removed, prefix);
        removed
    }
}
