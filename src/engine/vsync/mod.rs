//! ### English
//! Vertical-sync sources. The queue optionally waits on one before each export, and the
//! composition loop uses one as its clock.
//!
//! ### 中文
//! 垂直同步源。队列可在每次导出前等待一次 vsync，合成循环也用它作为时钟。
use std::time::Duration;

mod external;
mod fixed_interval;

pub use external::ExternalVsync;
pub use fixed_interval::FixedIntervalVsync;

/// ### English
/// Source of vertical-sync boundaries.
///
/// ### 中文
/// 垂直同步边界的来源。
pub trait VsyncSource: Send + Sync {
    /// ### English
    /// Blocks until the next vertical sync or until `timeout` elapses.
    ///
    /// Returns `true` when a vsync boundary was observed, `false` on timeout.
    ///
    /// #### Parameters
    /// - `timeout`: Upper bound for the wait.
    ///
    /// ### 中文
    /// 阻塞直到下一次垂直同步，或直到 `timeout` 到期。
    ///
    /// 观察到 vsync 边界时返回 `true`，超时返回 `false`。
    ///
    /// #### 参数
    /// - `timeout`：等待上限。
    fn wait_for_vsync(&self, timeout: Duration) -> bool;
}
