//! 扇区缓存上下文
//!
//! [`BufferCache`] 拥有缓存存储、设备和写回线程，是文件系统层访问
//! 扇区的唯一入口。所有操作都经过同一把全局锁串行化，设备 I/O
//! （驱逐写回、载入、刷新）也在持锁期间完成。

use super::config::CacheConfig;
use super::daemon;
use super::guard::SectorGuard;
use super::store::{CacheStats, CacheStore};
use crate::block::{SectorDevice, SectorId};
use crate::error::{Error, ErrorKind, Result};
use crate::hal::CacheHal;
use alloc::sync::Arc;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// 缓存线程之间共享的状态
pub(crate) struct CacheShared<D> {
    pub(crate) store: Mutex<CacheStore<D>>,
    running: AtomicBool,
}

impl<D: SectorDevice> CacheShared<D> {
    pub(crate) fn new(device: D, capacity: usize) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(device, capacity)),
            running: AtomicBool::new(true),
        }
    }
}

impl<D> CacheShared<D> {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// 扇区缓存
///
/// # 生命周期
///
/// - [`BufferCache::init`] 创建空缓存并启动写回线程
/// - [`BufferCache::access`] / [`BufferCache::prefetch`] / [`BufferCache::flush_all`] 供文件系统层使用
/// - [`BufferCache::shutdown`] 停止写回线程，写回全部脏项并清空缓存
///
/// 直接丢弃缓存只会停止写回线程，不会写回脏数据。
///
/// # 示例
///
/// ```rust,ignore
/// use sector_cache::{BufferCache, CacheConfig, StdHal};
///
/// let cache: BufferCache<_, StdHal> = BufferCache::init(disk, CacheConfig::default())?;
///
/// {
///     let guard = cache.access(100, true)?;
///     guard.with_data_mut(|data| data[0] = 0x42)?;
///     cache.prefetch(100);
/// } // pin 在这里释放
///
/// cache.shutdown()?;
/// ```
pub struct BufferCache<D: SectorDevice + 'static, H: CacheHal> {
    shared: Arc<CacheShared<D>>,
    config: CacheConfig,
    _hal: PhantomData<fn() -> H>,
}

impl<D: SectorDevice + 'static, H: CacheHal> BufferCache<D, H> {
    /// 初始化缓存并启动写回线程
    ///
    /// # 参数
    ///
    /// * `device` - 底层扇区设备，由缓存独占
    /// * `config` - 缓存配置
    pub fn init(device: D, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        if device.sector_size() == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "device sector size must be > 0",
            ));
        }

        log::info!(
            "[CACHE] init: capacity={}, sector_size={}, write_back={:?}, read_ahead={}",
            config.capacity,
            device.sector_size(),
            config.write_back_interval,
            config.read_ahead
        );

        let shared = Arc::new(CacheShared::new(device, config.capacity));
        daemon::spawn_write_back::<D, H>(&shared, config.write_back_interval);

        Ok(Self {
            shared,
            config,
            _hal: PhantomData,
        })
    }

    /// 访问扇区
    ///
    /// 命中时直接返回；未命中时载入（必要时驱逐）。返回的 guard 持有一次 pin，
    /// drop 时释放。`will_dirty` 为真时缓存项立即被标记为脏。
    ///
    /// # 错误
    ///
    /// - `InvalidInput`: 扇区超出设备范围
    /// - `CacheExhausted`: 缓存已满且所有项都被 pin 住
    /// - `Io`: 写回牺牲者或读入新扇区失败
    pub fn access(&self, sector: SectorId, will_dirty: bool) -> Result<SectorGuard<D>> {
        let (idx, buf) = {
            let mut store = self.shared.store.lock();
            let idx = store.access(sector, will_dirty)?;
            (idx, store.buf_of(idx))
        };
        Ok(SectorGuard::new(Arc::clone(&self.shared), idx, sector, buf))
    }

    /// 提示顺序访问：在后台预读 `sector + 1`
    ///
    /// 尽力而为，没有返回值；预读被禁用时什么都不做。
    pub fn prefetch(&self, sector: SectorId) {
        if !self.config.read_ahead {
            return;
        }
        daemon::spawn_read_ahead::<D, H>(&self.shared, sector);
    }

    /// 写回所有脏项
    ///
    /// `teardown` 为真时随后清空缓存。返回写回的扇区数。
    pub fn flush_all(&self, teardown: bool) -> Result<usize> {
        self.shared.store.lock().flush_all(teardown)
    }

    /// 写回单个扇区，返回是否真的写了设备
    pub fn flush_sector(&self, sector: SectorId) -> Result<bool> {
        self.shared.store.lock().flush_sector(sector)
    }

    /// 关闭缓存
    ///
    /// 停止写回线程，写回全部脏项并清空缓存。
    /// 写回失败时返回第一个错误，未写出的数据随缓存一起丢弃。
    pub fn shutdown(self) -> Result<usize> {
        let mut store = self.shared.store.lock();
        self.shared.stop();
        let written = store.flush_all(true)?;
        log::info!("[CACHE] shutdown: {} sectors written", written);
        Ok(written)
    }

    /// 扇区是否驻留在缓存中
    pub fn contains(&self, sector: SectorId) -> bool {
        self.shared.store.lock().find(sector).is_some()
    }

    /// 当前驻留的扇区数（载入失败留下的空槽不计入）
    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 缓存容量
    pub fn capacity(&self) -> usize {
        self.shared.store.lock().capacity()
    }

    /// 脏项数量
    pub fn dirty_count(&self) -> usize {
        self.shared.store.lock().dirty_count()
    }

    /// 扇区的 pin 计数，未驻留时返回 `None`
    pub fn pin_count(&self, sector: SectorId) -> Option<u32> {
        self.shared.store.lock().pin_count(sector)
    }

    /// 扇区是否为脏，未驻留时返回 `None`
    pub fn is_dirty(&self, sector: SectorId) -> Option<bool> {
        self.shared.store.lock().is_dirty(sector)
    }

    /// 缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.shared.store.lock().stats()
    }

    /// 缓存配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<D: SectorDevice + 'static, H: CacheHal> Drop for BufferCache<D, H> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl<D: SectorDevice + 'static, H: CacheHal> core::fmt::Debug for BufferCache<D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("config", &self.config)
            .field("store", &*self.shared.store.lock())
            .field("running", &self.shared.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::mock::MockDevice;
    use crate::consts::MAX_ENTRIES;
    use crate::hal::StdHal;
    use core::time::Duration;
    use std::time::Instant;

    type TestCache = BufferCache<MockDevice, StdHal>;

    fn cache_with(config: CacheConfig) -> (TestCache, MockDevice) {
        let device = MockDevice::new(1024);
        let cache = BufferCache::init(device.clone(), config).unwrap();
        (cache, device)
    }

    /// 轮询直到条件成立或超时
    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let device = MockDevice::new(8);
        let err = TestCache::init(device, CacheConfig::default().with_capacity(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let (cache, _device) = cache_with(CacheConfig::default());
        assert_eq!(cache.capacity(), MAX_ENTRIES);

        for s in 0..(MAX_ENTRIES as u32 * 3) {
            cache.access(s, s % 3 == 0).unwrap();
            assert!(cache.len() <= MAX_ENTRIES);
        }
        assert_eq!(cache.len(), MAX_ENTRIES);
    }

    #[test]
    fn test_pin_all_but_one() {
        let (cache, _device) = cache_with(CacheConfig::default());

        let held: alloc::vec::Vec<_> = (0..MAX_ENTRIES as u32 - 1)
            .map(|s| cache.access(s, false).unwrap())
            .collect();
        cache.access(500, false).unwrap();

        for s in 600..(600 + MAX_ENTRIES as u32 + 1) {
            cache.access(s, false).unwrap();
            assert!(cache.contains(s));
            for g in &held {
                assert_eq!(cache.pin_count(g.sector()), Some(1));
            }
        }
        assert_eq!(cache.len(), MAX_ENTRIES);
    }

    #[test]
    fn test_dirty_flushed_before_evict() {
        let (cache, device) = cache_with(CacheConfig::default());

        {
            let guard = cache.access(7, true).unwrap();
            guard.with_data_mut(|data| data.fill(0xC3)).unwrap();
        }
        for s in 100..(100 + MAX_ENTRIES as u32) {
            cache.access(s, false).unwrap();
        }

        assert!(!cache.contains(7));
        assert_eq!(device.sector(7), alloc::vec![0xC3; 512]);
    }

    #[test]
    fn test_all_pinned_is_an_error() {
        let (cache, _device) = cache_with(CacheConfig::default().with_capacity(2));
        let _a = cache.access(1, false).unwrap();
        let _b = cache.access(2, false).unwrap();

        let err = cache.access(3, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CacheExhausted);

        drop(_a);
        assert!(cache.access(3, false).is_ok());
    }

    #[test]
    fn test_concurrent_access() {
        let (cache, _device) = cache_with(CacheConfig::default().with_capacity(8));
        let cache = Arc::new(cache);

        let handles: alloc::vec::Vec<_> = (0..4u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200u32 {
                        let sector = (t * 31 + i) % 40;
                        let guard = cache.access(sector, true).unwrap();
                        guard.write_u32_le(0, sector).unwrap();
                        assert_eq!(guard.read_u32_le(0).unwrap(), sector);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(cache.len() <= 8);
        for s in 0..40 {
            if let Some(pins) = cache.pin_count(s) {
                assert_eq!(pins, 0);
            }
        }
    }

    #[test]
    fn test_write_back_cleans_without_evicting() {
        let (cache, device) = cache_with(
            CacheConfig::default().with_write_back_interval(Duration::from_millis(20)),
        );

        {
            let guard = cache.access(12, true).unwrap();
            guard.with_data_mut(|data| data[0] = 0x99).unwrap();
        }
        assert_eq!(cache.is_dirty(12), Some(true));

        assert!(wait_until(|| cache.is_dirty(12) == Some(false)));
        assert!(cache.contains(12));
        assert_eq!(cache.len(), 1);
        assert_eq!(device.sector(12)[0], 0x99);
    }

    #[test]
    fn test_prefetch_makes_next_access_a_hit() {
        let (cache, device) = cache_with(CacheConfig::default());

        drop(cache.access(20, false).unwrap());
        cache.prefetch(20);
        assert!(wait_until(|| cache.contains(21)));

        let reads = device.reads();
        let hits = cache.stats().hits;
        let guard = cache.access(21, false).unwrap();
        assert_eq!(device.reads(), reads);
        assert_eq!(cache.stats().hits, hits + 1);
        assert_eq!(cache.pin_count(21), Some(1));
        drop(guard);
        assert_eq!(cache.pin_count(21), Some(0));
    }

    #[test]
    fn test_prefetch_disabled() {
        let (cache, device) = cache_with(CacheConfig::default().with_read_ahead(false));
        cache.prefetch(1);
        std::thread::sleep(Duration::from_millis(50));
        assert!(!cache.contains(2));
        assert_eq!(device.reads(), 0);
    }

    #[test]
    fn test_shutdown_flushes_and_empties() {
        let (cache, device) = cache_with(CacheConfig::default());

        {
            let guard = cache.access(30, true).unwrap();
            guard.with_data_mut(|data| data[..4].copy_from_slice(b"LAST")).unwrap();
        }
        drop(cache.access(31, false).unwrap());
        assert_eq!(cache.dirty_count(), 1);

        let written = cache.shutdown().unwrap();
        assert_eq!(written, 1);
        assert_eq!(&device.sector(30)[..4], b"LAST");
    }

    #[test]
    fn test_flush_all_teardown_empties_store() {
        let (cache, device) = cache_with(CacheConfig::default());

        {
            let guard = cache.access(40, true).unwrap();
            guard.write_u32_le(0, 0xABCD_0123).unwrap();
        }
        assert_eq!(cache.flush_all(true).unwrap(), 1);
        assert!(cache.is_empty());
        assert_eq!(&device.sector(40)[..4], &0xABCD_0123u32.to_le_bytes());

        // 拆除后仍可继续使用
        let guard = cache.access(40, false).unwrap();
        assert_eq!(guard.read_u32_le(0).unwrap(), 0xABCD_0123);
    }

    #[test]
    fn test_stats() {
        let (cache, _device) = cache_with(CacheConfig::default());

        drop(cache.access(1, false).unwrap());
        drop(cache.access(1, true).unwrap());
        let stats = cache.stats();
        assert_eq!(stats.total_accesses, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.device_reads, 1);
        assert_eq!(stats.dirty_entries, 1);

        assert!(cache.flush_sector(1).unwrap());
        assert_eq!(cache.stats().writebacks, 1);
    }

    #[test]
    fn test_len_ignores_failed_load() {
        let (cache, device) = cache_with(CacheConfig::default());
        device.set_fail_reads(true);

        let err = cache.access(3, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert!(!cache.contains(3));

        device.set_fail_reads(false);
        drop(cache.access(3, false).unwrap());
        assert_eq!(cache.len(), 1);
    }
}
