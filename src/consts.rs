//! 扇区缓存常量定义

use core::time::Duration;

/// 块设备扇区大小（字节）
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// 缓存最多容纳的扇区数
pub const MAX_ENTRIES: usize = 64;

/// 写回线程两次刷新之间的间隔
pub const WRITE_BACK_INTERVAL: Duration = Duration::from_secs(5);

/// 写回线程名
pub const WRITE_BACK_THREAD_NAME: &str = "filesys_cache_writeback";

/// 预读线程名
pub const READ_AHEAD_THREAD_NAME: &str = "filesys_cache_readahead";

/// 时钟扫描的最大轮数
///
/// 第一轮清除所有 accessed 位，第二轮若仍找不到牺牲者，说明所有项都被 pin 住。
pub const CLOCK_MAX_PASSES: usize = 2;
