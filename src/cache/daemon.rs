//! 后台线程：定时写回与预读
//!
//! 写回线程随 `BufferCache::init` 启动，每隔固定间隔把所有脏项写回设备
//! （不驱逐）；缓存关闭或被丢弃后，它在下一次醒来时退出。
//!
//! 预读线程是一次性的：每次 `prefetch(sector)` 启动一个，尝试载入
//! `sector + 1`，任何失败都只记录日志。

use super::buffer_cache::CacheShared;
use crate::block::{SectorDevice, SectorId};
use crate::consts::{READ_AHEAD_THREAD_NAME, WRITE_BACK_THREAD_NAME};
use crate::hal::CacheHal;
use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use core::time::Duration;

/// 启动写回线程
///
/// 线程只持有弱引用，不会延长缓存的生命周期。
pub(crate) fn spawn_write_back<D, H>(shared: &Arc<CacheShared<D>>, interval: Duration)
where
    D: SectorDevice + 'static,
    H: CacheHal,
{
    let weak = Arc::downgrade(shared);
    H::spawn(
        WRITE_BACK_THREAD_NAME,
        Box::new(move || write_back_loop::<D, H>(weak, interval)),
    );
}

pub(crate) fn write_back_loop<D, H>(weak: Weak<CacheShared<D>>, interval: Duration)
where
    D: SectorDevice,
    H: CacheHal,
{
    log::debug!("[WRITEBACK] started, interval={:?}", interval);
    loop {
        H::sleep(interval);

        let Some(shared) = weak.upgrade() else {
            break;
        };
        if !shared.is_running() {
            break;
        }

        let res = shared.store.lock().flush_all(false);
        match res {
            Ok(0) => {}
            Ok(n) => log::debug!("[WRITEBACK] flushed {} sectors", n),
            Err(e) => log::warn!("[WRITEBACK] flush failed: {}", e),
        }
    }
    log::debug!("[WRITEBACK] stopped");
}

/// 启动一次性预读线程，载入 `sector` 的下一个扇区
pub(crate) fn spawn_read_ahead<D, H>(shared: &Arc<CacheShared<D>>, sector: SectorId)
where
    D: SectorDevice + 'static,
    H: CacheHal,
{
    let shared = Arc::clone(shared);
    H::spawn(
        READ_AHEAD_THREAD_NAME,
        Box::new(move || read_ahead(&shared, sector)),
    );
}

pub(crate) fn read_ahead<D: SectorDevice>(shared: &CacheShared<D>, sector: SectorId) {
    let Some(next) = sector.checked_add(1) else {
        return;
    };

    let mut store = shared.store.lock();
    if !shared.is_running() {
        return;
    }
    match store.prefetch(next) {
        Ok(true) => log::trace!("[READAHEAD] loaded sector={}", next),
        Ok(false) => log::trace!("[READAHEAD] sector={} resident or out of range", next),
        Err(e) => log::debug!("[READAHEAD] sector={} skipped: {}", next, e),
    }
}
