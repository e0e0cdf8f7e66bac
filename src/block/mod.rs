//! 块设备抽象
//!
//! block/device.rs 定义缓存所依赖的扇区读写接口，缓存拥有设备并在持锁时调用它。

mod device;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{SectorDevice, SectorId};
