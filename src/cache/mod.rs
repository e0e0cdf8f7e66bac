//! 扇区缓存模块
//!
//! 这个模块在文件系统层和块设备之间提供一个容量固定的扇区缓存。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存上下文，`init` / `access` / `prefetch` / `flush_all` / `shutdown`
//! - [`SectorGuard`] - `access` 返回的句柄，drop 时释放 pin
//! - [`CacheConfig`] - 容量、写回间隔、预读开关
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 1. **单锁**：存储、元数据和设备放在同一把 `spin::Mutex` 里，
//!    驱逐时的写回和载入时的读取都在持锁期间完成
//! 2. **时钟驱逐**：第二次机会算法，被 pin 住的项永远不会被选中；
//!    所有项都被 pin 住时返回 `CacheExhausted`，不会无限扫描
//! 3. **RAII pin**：`SectorGuard` 保证每次 `access` 的 pin 恰好释放一次
//! 4. **后台线程**：写回线程定期刷新脏项；预读线程一次性载入下一个扇区，
//!    载入后立即释放 pin
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use sector_cache::{BufferCache, CacheConfig, StdHal};
//!
//! let cache: BufferCache<_, StdHal> = BufferCache::init(disk, CacheConfig::default())?;
//!
//! // 读
//! let inode_no = cache.access(12, false)?.read_u32_le(0)?;
//!
//! // 写
//! let guard = cache.access(13, true)?;
//! guard.write_u32_le(0, inode_no)?;
//! drop(guard);
//!
//! // 顺序读提示
//! cache.prefetch(13);
//!
//! let stats = cache.stats();
//! log::info!("hit rate {:.2}, {} dirty", stats.hit_rate(), stats.dirty_entries);
//!
//! cache.shutdown()?;
//! ```
//!
//! # 内存分配要求
//!
//! 本模块依赖 `alloc` crate，需要用户提供全局分配器。
//! 容量以内扩张时分配失败会直接 panic：缓存离开固定容量的存储无法工作。

mod buffer_cache;
mod config;
mod daemon;
mod entry;
mod guard;
mod store;

pub use buffer_cache::BufferCache;
pub use config::CacheConfig;
pub use guard::SectorGuard;
pub use store::CacheStats;
