//! 缓存配置

use crate::consts::{MAX_ENTRIES, WRITE_BACK_INTERVAL};
use crate::error::{Error, ErrorKind, Result};
use core::time::Duration;

/// 扇区缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓存容量（扇区数）
    pub capacity: usize,
    /// 写回线程的刷新间隔
    pub write_back_interval: Duration,
    /// 是否启用预读
    pub read_ahead: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_ENTRIES,
            write_back_interval: WRITE_BACK_INTERVAL,
            read_ahead: true,
        }
    }
}

impl CacheConfig {
    /// 设置缓存容量
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// 设置写回间隔
    pub fn with_write_back_interval(mut self, interval: Duration) -> Self {
        self.write_back_interval = interval;
        self
    }

    /// 启用或禁用预读
    pub fn with_read_ahead(mut self, enabled: bool) -> Self {
        self.read_ahead = enabled;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be > 0"));
        }
        if self.write_back_interval.is_zero() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "write-back interval must be > 0",
            ));
        }
        Ok(())
    }
}
