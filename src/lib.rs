//! sector_cache: 文件系统与块设备之间的扇区缓存
//!
//! 这是一个纯 Rust 实现的扇区缓存库，提供：
//! - **固定容量**的扇区缓存（默认 64 个扇区）
//! - **第二次机会（时钟）**驱逐算法
//! - **RAII pin**，使用中的扇区不会被驱逐
//! - **后台写回**和**顺序预读**
//!
//! # 示例
//!
//! ```rust,ignore
//! use sector_cache::{BufferCache, CacheConfig, SectorDevice, SectorId, StdHal, Result};
//!
//! // 实现 SectorDevice trait
//! struct MyDisk {
//!     // ...
//! }
//!
//! impl SectorDevice for MyDisk {
//!     // 实现必要的方法
//!     // ...
//! }
//!
//! fn main() -> Result<()> {
//!     let config = CacheConfig::default();
//!     let cache: BufferCache<_, StdHal> = BufferCache::init(MyDisk::new(), config)?;
//!
//!     let guard = cache.access(0, false)?;
//!     let magic = guard.read_u32_le(0)?;
//!     drop(guard);
//!
//!     cache.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 扇区设备接口
//! - [`consts`] - 常量定义
//! - [`hal`] - 线程与计时接口
//! - [`cache`] - 扇区缓存

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 扇区设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 系统硬件抽象层
pub mod hal;

/// 扇区缓存
pub mod cache;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{SectorDevice, SectorId};

// HAL
pub use hal::{CacheHal, Task};
#[cfg(any(feature = "std", test))]
pub use hal::StdHal;

// Cache
pub use cache::{BufferCache, CacheConfig, CacheStats, SectorGuard};

// 常量
pub use consts::{BLOCK_SECTOR_SIZE, MAX_ENTRIES, WRITE_BACK_INTERVAL};
