//! ### English
//! Error type shared by every frame-queue operation.
//!
//! ### 中文
//! 所有帧队列操作共用的错误类型。

/// ### English
/// Crate-wide result alias.
///
/// ### 中文
/// crate 范围内的 `Result` 别名。
pub type Result<T, E = FrameQueueError> = std::result::Result<T, E>;

/// ### English
/// Failures surfaced by the frame queue and its collaborators.
///
/// Contract violations (`NoCurrentBuffer`, `WrongContext`) are programmer errors and are never
/// retried. An empty import queue and a full import queue are not errors.
///
/// ### 中文
/// 帧队列及其协作方上报的错误。
///
/// 契约违例（`NoCurrentBuffer`、`WrongContext`）属于编程错误，不会重试。
/// 导入队列为空或已满都不属于错误。
#[derive(Debug, thiserror::Error)]
pub enum FrameQueueError {
    /// ### English
    /// The platform cannot share textures with the compositor (fatal at construction).
    ///
    /// ### 中文
    /// 平台无法与合成器共享纹理（构造时即致命）。
    #[error("platform not supported: {0}")]
    PlatformNotSupported(String),

    /// ### English
    /// The render target is unusable after attaching an image.
    ///
    /// ### 中文
    /// 绑定图像后渲染目标不可用。
    #[error("framebuffer incomplete (status 0x{status:04X})")]
    FramebufferIncomplete { status: u32 },

    #[error("swap_buffers() must be called before accessing the current buffer")]
    NoCurrentBuffer,

    #[error("display_next() must be called on the consumer context")]
    WrongContext,

    /// ### English
    /// The queue is draining or disposed.
    ///
    /// ### 中文
    /// 队列正在 drain 或已销毁。
    #[error("frame queue is closed")]
    QueueClosed,

    #[error("consumer context has shut down")]
    ConsumerGone,

    #[error("invalid frame queue configuration: {0}")]
    InvalidConfig(String),

    /// ### English
    /// Native allocation or import failure reported by an image backend.
    ///
    /// ### 中文
    /// 图像后端上报的原生分配或导入失败。
    #[error("GPU backend error: {0}")]
    Backend(String),

    #[error("composition surface update failed: {0}")]
    SurfaceUpdate(String),
}
