use std::thread;
use std::time::{Duration, Instant};

use super::VsyncSource;

/// ### English
/// Synthetic vsync with boundaries every `interval` from a fixed origin, for hosts without a
/// display-link callback.
///
/// ### 中文
/// 从固定起点开始、每隔 `interval` 产生一次边界的模拟 vsync，用于没有 display-link 回调的宿主。
pub struct FixedIntervalVsync {
    origin: Instant,
    interval: Duration,
}

impl FixedIntervalVsync {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval: interval.max(Duration::from_micros(1)),
        }
    }

    /// ### English
    /// Creates a source ticking at `fps` (clamped to at least 1).
    ///
    /// ### 中文
    /// 创建以 `fps` 频率 tick 的源（至少为 1）。
    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs(1) / fps.max(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn next_boundary(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let interval = self.interval.as_nanos();
        let next = (elapsed / interval + 1) * interval;
        self.origin + Duration::from_nanos(u64::try_from(next).unwrap_or(u64::MAX))
    }
}

impl VsyncSource for FixedIntervalVsync {
    fn wait_for_vsync(&self, timeout: Duration) -> bool {
        let now = Instant::now();
        let boundary = self.next_boundary(now);
        let wait = boundary - now;
        if wait > timeout {
            thread::sleep(timeout);
            return false;
        }
        thread::sleep(wait);
        true
    }
}
