//! 系统硬件抽象层
//!
//! 缓存的两个后台线程（写回、预读）需要宿主系统提供线程创建和睡眠能力。

use alloc::boxed::Box;
use core::time::Duration;

/// 后台任务入口
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 缓存所需的系统功能
///
/// # 示例
///
/// ```ignore
/// struct MyHal;
/// impl CacheHal for MyHal {
///     fn spawn(name: &'static str, task: Task) {
///         kernel::thread_create(name, task);
///     }
///
///     fn sleep(duration: Duration) {
///         kernel::timer_sleep(duration);
///     }
/// }
/// ```
pub trait CacheHal: 'static {
    /// 创建后台线程执行 `task`，不等待、不返回结果
    fn spawn(name: &'static str, task: Task);

    /// 让当前线程睡眠 `duration`
    fn sleep(duration: Duration);
}

/// 基于 `std::thread` 的实现
#[cfg(any(feature = "std", test))]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdHal;

#[cfg(any(feature = "std", test))]
impl CacheHal for StdHal {
    fn spawn(name: &'static str, task: Task) {
        let spawned = std::thread::Builder::new()
            .name(name.into())
            .spawn(task);
        if let Err(e) = spawned {
            log::error!("[HAL] failed to spawn thread {}: {}", name, e);
        }
    }

    fn sleep(duration: Duration) {
        std::thread::sleep(duration);
    }
}
