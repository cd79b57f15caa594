//! ### English
//! Spin-then-yield backoff used while waiting for producers that are mid-enqueue.
//!
//! Short waits spin; longer waits yield so a stalled producer thread can be scheduled.
//!
//! ### 中文
//! 等待入队中的生产者时使用的“短自旋 + 让出调度”退避工具。
//!
//! 短等待自旋；长等待让出调度，使被阻塞的生产者线程有机会运行。

use std::thread;

/// ### English
/// Spin budget before switching to `yield_now()`.
///
/// ### 中文
/// 切换到 `yield_now()` 之前的自旋次数预算。
const SPIN_LIMIT: u32 = 64;

pub(crate) struct Backoff {
    spins: u32,
}

impl Backoff {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { spins: 0 }
    }

    /// ### English
    /// Performs one backoff step.
    ///
    /// ### 中文
    /// 执行一次退避步骤。
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.spins < SPIN_LIMIT {
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }
        self.spins = self.spins.saturating_add(1);
    }
}
