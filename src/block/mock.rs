//! 测试用内存设备
//!
//! `MockDevice` 可以克隆，所有克隆共享同一份存储和计数器，
//! 这样测试在把设备交给缓存之后仍然能检查设备内容。

use super::{SectorDevice, SectorId};
use crate::consts::BLOCK_SECTOR_SIZE;
use crate::error::{Error, ErrorKind, Result};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::Mutex;

#[derive(Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct MockDevice {
    total_sectors: u64,
    storage: Arc<Mutex<Vec<u8>>>,
    counters: Arc<Counters>,
}

impl MockDevice {
    pub(crate) fn new(total_sectors: u64) -> Self {
        let storage = alloc::vec![0u8; total_sectors as usize * BLOCK_SECTOR_SIZE];
        Self {
            total_sectors,
            storage: Arc::new(Mutex::new(storage)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// 直接读取设备上的扇区内容（绕过缓存）
    pub(crate) fn sector(&self, sector: SectorId) -> Vec<u8> {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        self.storage.lock()[start..start + BLOCK_SECTOR_SIZE].to_vec()
    }

    /// 直接写入设备上的扇区内容（绕过缓存）
    pub(crate) fn fill_sector(&self, sector: SectorId, byte: u8) {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        self.storage.lock()[start..start + BLOCK_SECTOR_SIZE].fill(byte);
    }

    pub(crate) fn reads(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.counters.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.counters.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SectorDevice for MockDevice {
    fn sector_size(&self) -> usize {
        BLOCK_SECTOR_SIZE
    }

    fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    fn read_sector(&mut self, sector: SectorId, buf: &mut [u8]) -> Result<()> {
        if self.counters.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "mock read failure"));
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        buf.copy_from_slice(&self.storage.lock()[start..start + BLOCK_SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&mut self, sector: SectorId, buf: &[u8]) -> Result<()> {
        if self.counters.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "mock write failure"));
        }
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        self.storage.lock()[start..start + BLOCK_SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
