//! 缓存存储：查找、时钟驱逐、载入与刷新
//!
//! `CacheStore` 是缓存的全部共享状态，整体放在一把互斥锁里。
//! 这里的所有方法都假定调用者已经持有这把锁。
//!
//! # 驱逐策略
//!
//! 第二次机会（时钟）算法：从第 0 个槽位开始按固定顺序扫描，
//! - 被 pin 住的项直接跳过
//! - 访问位为 1 的项清除访问位，给它第二次机会
//! - 访问位为 0 的项即为牺牲者，若为脏则先写回设备
//!
//! 扫描最多进行 [`CLOCK_MAX_PASSES`] 轮：第一轮清掉所有访问位后，
//! 只要还有未被 pin 的项，第二轮一定能找到牺牲者；否则返回
//! `ErrorKind::CacheExhausted`，而不是无限自旋。

use super::entry::{CacheEntry, SectorBuf};
use crate::block::{SectorDevice, SectorId};
use crate::consts::CLOCK_MAX_PASSES;
use crate::error::{Error, ErrorKind, Result};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 驱逐次数
    pub evictions: u64,
    /// 写回设备的扇区数
    pub writebacks: u64,
    /// 从设备读入的扇区数
    pub device_reads: u64,
    /// 预读载入的扇区数
    pub prefetches: u64,
    /// 当前脏项数量
    pub dirty_entries: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

pub(crate) struct CacheStore<D> {
    device: D,
    entries: Vec<CacheEntry>,
    capacity: usize,
    sector_size: usize,
    stats: CacheStats,
}

impl<D: SectorDevice> CacheStore<D> {
    pub fn new(device: D, capacity: usize) -> Self {
        let sector_size = device.sector_size();
        Self {
            device,
            entries: Vec::new(),
            capacity,
            sector_size,
            stats: CacheStats::default(),
        }
    }

    /// 查找扇区所在的槽位
    pub fn find(&self, sector: SectorId) -> Option<usize> {
        self.entries.iter().position(|e| e.sector == Some(sector))
    }

    /// 访问扇区，返回已 pin 住的槽位
    ///
    /// 命中时增加 pin、合并脏位并设置访问位；未命中时载入。
    pub fn access(&mut self, sector: SectorId, will_dirty: bool) -> Result<usize> {
        self.check_sector(sector)?;
        self.stats.total_accesses += 1;

        if let Some(idx) = self.find(sector) {
            self.stats.hits += 1;
            let entry = &mut self.entries[idx];
            entry.pin();
            if will_dirty {
                entry.mark_dirty();
            }
            entry.mark_accessed();
            log::trace!(
                "[CACHE] access sector={} HIT (pins={}, dirty={})",
                sector,
                entry.pin_count,
                entry.is_dirty()
            );
            return Ok(idx);
        }

        self.stats.misses += 1;
        log::debug!(
            "[CACHE] access sector={} MISS, cache={}/{}",
            sector,
            self.entries.len(),
            self.capacity
        );
        self.load(sector, will_dirty)
    }

    /// 把扇区载入一个新的或回收的槽位
    ///
    /// 成功时槽位 `pin_count = 1`、访问位置位、脏位等于 `will_dirty`。
    pub fn load(&mut self, sector: SectorId, will_dirty: bool) -> Result<usize> {
        let idx = self.alloc_slot()?;

        let entry = &mut self.entries[idx];
        entry.assign(sector, will_dirty);

        let read = {
            let mut data = entry.buf.write();
            self.device.read_sector(sector, &mut data)
        };
        if let Err(e) = read {
            log::warn!("[CACHE] load sector={} failed: {}", sector, e);
            entry.vacate();
            return Err(e);
        }

        self.stats.device_reads += 1;
        Ok(idx)
    }

    /// 预读一个扇区
    ///
    /// 已驻留或超出设备范围时什么都不做并返回 `false`。
    /// 载入后立即释放 pin，预读的项可以被正常驱逐。
    pub fn prefetch(&mut self, sector: SectorId) -> Result<bool> {
        if u64::from(sector) >= self.device.total_sectors() || self.find(sector).is_some() {
            return Ok(false);
        }

        let idx = self.load(sector, false)?;
        self.entries[idx].unpin();
        self.stats.prefetches += 1;
        Ok(true)
    }

    /// 为新扇区腾出一个槽位
    fn alloc_slot(&mut self) -> Result<usize> {
        // 先复用载入失败留下的空槽
        if let Some(idx) = self.entries.iter().position(|e| e.sector.is_none()) {
            return Ok(idx);
        }

        if self.entries.len() < self.capacity {
            let entry = match self.entries.try_reserve(1) {
                Ok(()) => CacheEntry::try_new(self.sector_size),
                Err(_) => None,
            };
            let Some(entry) = entry else {
                panic!("not enough memory for buffer cache");
            };
            self.entries.push(entry);
            return Ok(self.entries.len() - 1);
        }

        self.evict()
    }

    /// 时钟扫描选出牺牲者，脏项先写回
    fn evict(&mut self) -> Result<usize> {
        for _ in 0..CLOCK_MAX_PASSES {
            for idx in 0..self.entries.len() {
                let entry = &mut self.entries[idx];
                if entry.is_pinned() {
                    continue;
                }
                if entry.is_accessed() {
                    entry.clear_accessed();
                    continue;
                }

                if let (true, Some(old)) = (entry.is_dirty(), entry.sector) {
                    {
                        let data = entry.buf.read();
                        self.device.write_sector(old, &data)?;
                    }
                    entry.mark_clean();
                    self.stats.writebacks += 1;
                    log::debug!("[CACHE] Evicted dirty sector={} (written back)", old);
                } else {
                    log::debug!("[CACHE] Evicted clean sector={:?}", entry.sector);
                }

                self.stats.evictions += 1;
                return Ok(idx);
            }
        }

        log::error!(
            "[CACHE] Cannot evict: all {} entries are pinned",
            self.entries.len()
        );
        Err(Error::new(
            ErrorKind::CacheExhausted,
            "All cache entries are pinned, cannot evict",
        ))
    }

    /// 释放一次 pin
    ///
    /// 只有当槽位仍然属于同一个扇区、同一块缓冲区时才生效；
    /// 存储被拆除后的释放是空操作。
    pub fn release(&mut self, idx: usize, sector: SectorId, buf: &Arc<SectorBuf>) {
        if let Some(entry) = self.owned_entry(idx, sector, buf) {
            entry.unpin();
            log::trace!("[CACHE] release sector={} (pins={})", sector, entry.pin_count);
        }
    }

    /// 持有者修改了缓冲区后标记为脏
    ///
    /// 缓存项已被拆除时返回 `false`，这次修改不会被写回。
    pub fn mark_dirty(&mut self, idx: usize, sector: SectorId, buf: &Arc<SectorBuf>) -> bool {
        match self.owned_entry(idx, sector, buf) {
            Some(entry) => {
                entry.mark_dirty();
                true
            }
            None => false,
        }
    }

    fn owned_entry(
        &mut self,
        idx: usize,
        sector: SectorId,
        buf: &Arc<SectorBuf>,
    ) -> Option<&mut CacheEntry> {
        self.entries
            .get_mut(idx)
            .filter(|e| e.sector == Some(sector) && Arc::ptr_eq(&e.buf, buf))
    }

    /// 写回单个脏扇区
    ///
    /// 返回是否真的写了设备。
    pub fn flush_sector(&mut self, sector: SectorId) -> Result<bool> {
        let Some(idx) = self.find(sector) else {
            return Ok(false);
        };
        let entry = &mut self.entries[idx];
        if !entry.is_dirty() {
            return Ok(false);
        }

        {
            let data = entry.buf.read();
            self.device.write_sector(sector, &data)?;
        }
        entry.mark_clean();
        self.stats.writebacks += 1;
        log::debug!("[CACHE] flush_sector sector={}", sector);
        Ok(true)
    }

    /// 写回所有脏项
    ///
    /// `teardown` 为真时，在全部写回成功后清空存储。
    /// 某一项写入失败时继续尝试其余项，保留失败项的脏位，最后返回第一个错误；
    /// 此时即使 `teardown` 为真也不会丢弃任何项。
    pub fn flush_all(&mut self, teardown: bool) -> Result<usize> {
        let mut written = 0;
        let mut first_err = None;

        for entry in self.entries.iter_mut() {
            let Some(sector) = entry.sector else {
                continue;
            };
            if !entry.is_dirty() {
                continue;
            }

            let res = {
                let data = entry.buf.read();
                self.device.write_sector(sector, &data)
            };
            match res {
                Ok(()) => {
                    entry.mark_clean();
                    written += 1;
                }
                Err(e) => {
                    log::warn!("[CACHE] flush sector={} failed: {}", sector, e);
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        self.stats.writebacks += written as u64;

        if let Some(e) = first_err {
            return Err(e);
        }
        self.device.flush()?;

        log::debug!(
            "[CACHE] Flushed {} dirty sectors (teardown={})",
            written,
            teardown
        );

        if teardown {
            let pinned = self.entries.iter().filter(|e| e.is_pinned()).count();
            if pinned > 0 {
                log::warn!("[CACHE] teardown with {} pinned entries", pinned);
            }
            self.entries.clear();
            self.entries.shrink_to_fit();
        }

        Ok(written)
    }

    fn check_sector(&self, sector: SectorId) -> Result<()> {
        if u64::from(sector) >= self.device.total_sectors() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "sector out of device range",
            ));
        }
        Ok(())
    }

    /// 槽位缓冲区的一份引用，交给 guard 持有
    pub fn buf_of(&self, idx: usize) -> Arc<SectorBuf> {
        Arc::clone(&self.entries[idx].buf)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.dirty_entries = self.dirty_count();
        stats
    }

    /// 驻留的扇区数，不含载入失败留下的空槽
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.sector.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dirty_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_dirty()).count()
    }

    pub fn pin_count(&self, sector: SectorId) -> Option<u32> {
        self.find(sector).map(|idx| self.entries[idx].pin_count)
    }

    pub fn is_dirty(&self, sector: SectorId) -> Option<bool> {
        self.find(sector).map(|idx| self.entries[idx].is_dirty())
    }

    #[cfg(test)]
    pub fn is_accessed(&self, sector: SectorId) -> Option<bool> {
        self.find(sector).map(|idx| self.entries[idx].is_accessed())
    }

    #[cfg(test)]
    pub fn sector_at(&self, idx: usize) -> Option<SectorId> {
        self.entries.get(idx).and_then(|e| e.sector)
    }
}

impl<D> core::fmt::Debug for CacheStore<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheStore")
            .field("capacity", &self.capacity)
            .field("slots", &self.entries.len())
            .field("sector_size", &self.sector_size)
            .field("stats", &self.stats)
            .finish()
    }
}
