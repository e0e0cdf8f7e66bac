//! 扇区句柄 - RAII 风格的 pin
//!
//! [`SectorGuard`] 由 `BufferCache::access` 返回，持有期间对应缓存项的
//! `pin_count` 至少为 1，不会被驱逐；drop 时恰好释放一次 pin。

use super::buffer_cache::CacheShared;
use super::entry::SectorBuf;
use crate::block::{SectorDevice, SectorId};
use crate::error::{Error, ErrorKind, Result};
use alloc::sync::Arc;
use byteorder::{ByteOrder, LittleEndian};

/// 扇区句柄
///
/// # 设计说明
///
/// - 元数据（pin、脏位）由缓存的全局锁保护，数据由缓存项自己的读写锁保护
/// - 在 `with_data` / `with_data_mut` 的闭包里不要再调用缓存，
///   写回线程可能正持有全局锁并等待这块数据
/// - `with_data_mut` 在闭包结束后把缓存项标记为脏
/// - `flush_all(true)` 拆除缓存后，旧 guard 上的写入返回 `ErrorKind::Detached`
///
/// # 示例
///
/// ```rust,ignore
/// let guard = cache.access(7, false)?;
/// let magic = guard.read_u32_le(0)?;
///
/// let guard = cache.access(8, true)?;
/// guard.with_data_mut(|data| data[..4].copy_from_slice(b"ROOT"))?;
/// // guard 离开作用域时释放 pin
/// ```
pub struct SectorGuard<D: SectorDevice> {
    shared: Arc<CacheShared<D>>,
    idx: usize,
    sector: SectorId,
    buf: Arc<SectorBuf>,
}

impl<D: SectorDevice> SectorGuard<D> {
    pub(crate) fn new(
        shared: Arc<CacheShared<D>>,
        idx: usize,
        sector: SectorId,
        buf: Arc<SectorBuf>,
    ) -> Self {
        Self {
            shared,
            idx,
            sector,
            buf,
        }
    }

    /// 扇区编号
    pub fn sector(&self) -> SectorId {
        self.sector
    }

    /// 扇区大小
    pub fn len(&self) -> usize {
        self.buf.read().len()
    }

    /// 缓冲区是否为空（只在扇区大小为 0 时成立）
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 只读访问扇区数据
    pub fn with_data<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        let data = self.buf.read();
        f(&data[..])
    }

    /// 修改扇区数据，并把缓存项标记为脏
    ///
    /// 缓存项已被拆除时返回 `ErrorKind::Detached`。
    pub fn with_data_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let ret = {
            let mut data = self.buf.write();
            f(&mut data[..])
        };
        self.mark_dirty()?;
        Ok(ret)
    }

    /// 从 `offset` 开始读取 `buf.len()` 字节
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.with_data(|data| {
            let src = slice_range(data.len(), offset, buf.len())?;
            buf.copy_from_slice(&data[src]);
            Ok(())
        })
    }

    /// 把 `buf` 写到 `offset` 处
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<()> {
        {
            let mut data = self.buf.write();
            let dst = slice_range(data.len(), offset, buf.len())?;
            data[dst].copy_from_slice(buf);
        }
        self.mark_dirty()
    }

    /// 读取小端 u16
    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        let mut raw = [0u8; 2];
        self.read_at(offset, &mut raw)?;
        Ok(LittleEndian::read_u16(&raw))
    }

    /// 读取小端 u32
    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_at(offset, &mut raw)?;
        Ok(LittleEndian::read_u32(&raw))
    }

    /// 写入小端 u32
    pub fn write_u32_le(&self, offset: usize, value: u32) -> Result<()> {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, value);
        self.write_at(offset, &raw)
    }

    /// 显式释放 pin（等价于 drop）
    pub fn release(self) {}

    fn mark_dirty(&self) -> Result<()> {
        let owned = self
            .shared
            .store
            .lock()
            .mark_dirty(self.idx, self.sector, &self.buf);
        if !owned {
            log::warn!("[CACHE] write to detached sector={} dropped", self.sector);
            return Err(Error::new(
                ErrorKind::Detached,
                "cache entry was torn down while pinned",
            ));
        }
        Ok(())
    }
}

impl<D: SectorDevice> Drop for SectorGuard<D> {
    fn drop(&mut self) {
        self.shared
            .store
            .lock()
            .release(self.idx, self.sector, &self.buf);
    }
}

impl<D: SectorDevice> core::fmt::Debug for SectorGuard<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SectorGuard")
            .field("sector", &self.sector)
            .field("slot", &self.idx)
            .finish()
    }
}

fn slice_range(len: usize, offset: usize, count: usize) -> Result<core::ops::Range<usize>> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(Error::new(
            ErrorKind::InvalidInput,
            "range exceeds sector size",
        )),
    }
}
