//! 扇区设备接口

use crate::error::Result;

/// 扇区编号
pub type SectorId = u32;

/// 块设备接口
///
/// 实现此 trait 以提供底层扇区读写。缓存在持有全局锁时调用这些方法，
/// 因此实现应当是同步、阻塞的。
///
/// # 示例
///
/// ```rust,ignore
/// use sector_cache::{SectorDevice, SectorId, Result};
///
/// struct MyDisk {
///     // ...
/// }
///
/// impl SectorDevice for MyDisk {
///     fn sector_size(&self) -> usize {
///         512
///     }
///
///     fn total_sectors(&self) -> u64 {
///         8192
///     }
///
///     fn read_sector(&mut self, sector: SectorId, buf: &mut [u8]) -> Result<()> {
///         // 读取一个扇区到 buf
///         Ok(())
///     }
///
///     fn write_sector(&mut self, sector: SectorId, buf: &[u8]) -> Result<()> {
///         // 把 buf 写入一个扇区
///         Ok(())
///     }
/// }
/// ```
pub trait SectorDevice: Send {
    /// 扇区大小（通常 512）
    fn sector_size(&self) -> usize;

    /// 总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取一个扇区
    ///
    /// # 参数
    ///
    /// * `sector` - 扇区编号
    /// * `buf` - 目标缓冲区（长度等于 `sector_size()`）
    fn read_sector(&mut self, sector: SectorId, buf: &mut [u8]) -> Result<()>;

    /// 写入一个扇区
    ///
    /// # 参数
    ///
    /// * `sector` - 扇区编号
    /// * `buf` - 源缓冲区（长度等于 `sector_size()`）
    fn write_sector(&mut self, sector: SectorId, buf: &[u8]) -> Result<()>;

    /// 刷新设备自身的写缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: SectorDevice + ?Sized> SectorDevice for alloc::boxed::Box<D> {
    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    fn total_sectors(&self) -> u64 {
        (**self).total_sectors()
    }

    fn read_sector(&mut self, sector: SectorId, buf: &mut [u8]) -> Result<()> {
        (**self).read_sector(sector, buf)
    }

    fn write_sector(&mut self, sector: SectorId, buf: &[u8]) -> Result<()> {
        (**self).write_sector(sector, buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
