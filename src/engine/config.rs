//! ### English
//! Construction-time configuration for the frame queue.
//!
//! ### 中文
//! 帧队列的构造期配置。
use std::time::Duration;

use crate::engine::error::{FrameQueueError, Result};

/// ### English
/// Default import-queue capacity (frames in flight between producer and consumer).
///
/// ### 中文
/// 默认导入队列容量（生产者与消费者之间的在途帧数）。
pub const DEFAULT_IMPORT_CAPACITY: usize = 10;

/// ### English
/// Default upper bound for one vsync wait before the export proceeds anyway.
///
/// ### 中文
/// 单次 vsync 等待的默认上限；超时后仍继续导出。
pub const DEFAULT_VSYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// ### English
/// Plain configuration for `FrameBufferQueue`.
///
/// ### 中文
/// `FrameBufferQueue` 的普通配置结构。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameQueueConfig {
    /// ### English
    /// Bounded capacity `K` of the import queue. The producer blocks once `K` frames are queued.
    ///
    /// ### 中文
    /// 导入队列的有界容量 `K`。排队帧数达到 `K` 时生产者阻塞。
    pub import_capacity: usize,
    /// ### English
    /// Delay each export by one vertical-sync interval (requires a vsync source).
    ///
    /// ### 中文
    /// 每次导出前等待一个垂直同步间隔（需要提供 vsync 源）。
    pub vsync: bool,
    /// ### English
    /// Maximum time spent waiting for one vsync boundary.
    ///
    /// ### 中文
    /// 等待单个 vsync 边界的最长时间。
    pub vsync_timeout: Duration,
}

impl Default for FrameQueueConfig {
    fn default() -> Self {
        Self {
            import_capacity: DEFAULT_IMPORT_CAPACITY,
            vsync: false,
            vsync_timeout: DEFAULT_VSYNC_TIMEOUT,
        }
    }
}

impl FrameQueueConfig {
    pub fn with_import_capacity(mut self, capacity: usize) -> Self {
        self.import_capacity = capacity;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_vsync_timeout(mut self, timeout: Duration) -> Self {
        self.vsync_timeout = timeout;
        self
    }

    /// ### English
    /// Rejects configurations the queue cannot honor.
    ///
    /// #### Parameters
    /// - `has_vsync_source`: Whether a vsync source was supplied alongside this config.
    ///
    /// ### 中文
    /// 拒绝队列无法满足的配置。
    ///
    /// #### 参数
    /// - `has_vsync_source`：是否同时提供了 vsync 源。
    pub(crate) fn validate(&self, has_vsync_source: bool) -> Result<()> {
        if self.import_capacity == 0 {
            return Err(FrameQueueError::InvalidConfig(
                "import_capacity must be at least 1".to_string(),
            ));
        }
        if self.vsync && !has_vsync_source {
            return Err(FrameQueueError::InvalidConfig(
                "vsync enabled without a vsync source".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_queue() {
        let config = FrameQueueConfig::default();
        assert_eq!(config.import_capacity, 10);
        assert!(!config.vsync);
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = FrameQueueConfig::default().with_import_capacity(0);
        assert!(matches!(
            config.validate(false),
            Err(FrameQueueError::InvalidConfig(_))
        ));
    }

    #[test]
    fn vsync_requires_a_source() {
        let config = FrameQueueConfig::default().with_vsync(true);
        assert!(config.validate(false).is_err());
        assert!(config.validate(true).is_ok());
    }
}
