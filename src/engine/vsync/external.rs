use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::VsyncSource;

/// ### English
/// Vsync driven by the host: call `tick()` from the real display callback and every waiter
/// wakes up.
///
/// ### 中文
/// 由宿主驱动的 vsync：在真实的显示回调中调用 `tick()`，所有等待者都会被唤醒。
#[derive(Default)]
pub struct ExternalVsync {
    /// ### English
    /// Number of ticks observed so far.
    ///
    /// ### 中文
    /// 迄今观察到的 tick 次数。
    generation: Mutex<u64>,
    ticked: Condvar,
}

impl ExternalVsync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.ticked.notify_all();
    }

    pub fn ticks(&self) -> u64 {
        *self.generation.lock()
    }
}

impl VsyncSource for ExternalVsync {
    /// ### English
    /// Blocks until the next `tick()`. A timeout too large to express as a deadline waits
    /// without one.
    ///
    /// ### 中文
    /// 阻塞直到下一次 `tick()`。超时过大、无法表示为截止时间时，不设截止时间地等待。
    fn wait_for_vsync(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut generation = self.generation.lock();
        let start = *generation;
        while *generation == start {
            let Some(deadline) = deadline else {
                self.ticked.wait(&mut generation);
                continue;
            };
            if self
                .ticked
                .wait_until(&mut generation, deadline)
                .timed_out()
            {
                return *generation != start;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn waiters_wake_on_the_next_tick() {
        let vsync = Arc::new(ExternalVsync::new());
        let waiter = {
            let vsync = vsync.clone();
            thread::spawn(move || vsync.wait_for_vsync(Duration::from_secs(5)))
        };

        while !waiter.is_finished() {
            vsync.tick();
            thread::sleep(Duration::from_millis(1));
        }
        assert!(waiter.join().unwrap());
        assert!(vsync.ticks() >= 1);
    }

    #[test]
    fn unbounded_timeout_waits_for_the_tick() {
        let vsync = Arc::new(ExternalVsync::new());
        let waiter = {
            let vsync = vsync.clone();
            thread::spawn(move || vsync.wait_for_vsync(Duration::MAX))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        while !waiter.is_finished() {
            vsync.tick();
            thread::sleep(Duration::from_millis(1));
        }
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_times_out_without_ticks() {
        let vsync = ExternalVsync::new();
        assert!(!vsync.wait_for_vsync(Duration::from_millis(5)));
    }
}
