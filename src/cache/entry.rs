//! 缓存项结构

use crate::block::SectorId;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::RwLock;

/// 扇区数据缓冲区
///
/// 元数据由缓存的全局锁保护；数据本身由这把读写锁保护，
/// 持有 pin 的调用者在全局锁之外读写它。
pub(crate) type SectorBuf = RwLock<Vec<u8>>;

bitflags! {
    /// 缓存项标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct EntryFlags: u8 {
        /// 数据与设备不一致，复用前必须写回
        const DIRTY    = 0x01;
        /// 时钟算法的访问位
        const ACCESSED = 0x02;
    }
}

/// 缓存项
///
/// # 字段说明
///
/// - `sector`: 当前驻留的扇区，`None` 表示空槽
/// - `buf`: 扇区数据，guard 持有它的一份 `Arc`
/// - `flags`: 脏位与访问位
/// - `pin_count`: 持有者数量，> 0 时不可被驱逐
pub(crate) struct CacheEntry {
    pub sector: Option<SectorId>,
    pub buf: Arc<SectorBuf>,
    pub flags: EntryFlags,
    pub pin_count: u32,
}

impl core::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("sector", &self.sector)
            .field("flags", &self.flags)
            .field("pin_count", &self.pin_count)
            .finish()
    }
}

impl CacheEntry {
    /// 分配一个空槽
    ///
    /// 内存不足时返回 `None`。
    pub fn try_new(sector_size: usize) -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(sector_size).ok()?;
        data.resize(sector_size, 0);
        Some(Self {
            sector: None,
            buf: Arc::new(RwLock::new(data)),
            flags: EntryFlags::empty(),
            pin_count: 0,
        })
    }

    /// 把槽位分配给新扇区
    ///
    /// 调用者负责随后把扇区内容读入 `buf`。
    pub fn assign(&mut self, sector: SectorId, will_dirty: bool) {
        self.sector = Some(sector);
        self.pin_count = 1;
        self.flags = EntryFlags::ACCESSED;
        self.flags.set(EntryFlags::DIRTY, will_dirty);
    }

    /// 清空槽位（读入失败时使用）
    pub fn vacate(&mut self) {
        self.sector = None;
        self.pin_count = 0;
        self.flags = EntryFlags::empty();
    }

    /// 增加引用计数
    pub fn pin(&mut self) {
        self.pin_count = self.pin_count.saturating_add(1);
    }

    /// 减少引用计数
    pub fn unpin(&mut self) {
        debug_assert!(self.pin_count > 0, "unpin on entry with pin_count = 0");
        self.pin_count = self.pin_count.saturating_sub(1);
    }

    /// 是否被 pin 住
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn mark_dirty(&mut self) {
        self.flags.insert(EntryFlags::DIRTY);
    }

    pub fn mark_clean(&mut self) {
        self.flags.remove(EntryFlags::DIRTY);
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(EntryFlags::DIRTY)
    }

    pub fn mark_accessed(&mut self) {
        self.flags.insert(EntryFlags::ACCESSED);
    }

    pub fn clear_accessed(&mut self) {
        self.flags.remove(EntryFlags::ACCESSED);
    }

    pub fn is_accessed(&self) -> bool {
        self.flags.contains(EntryFlags::ACCESSED)
    }
}
