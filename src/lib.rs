/// ### English
/// `xian_frame_queue` crate root.
/// Hands frames rendered on an independent producer thread to a compositing consumer context;
/// the implementation lives under `engine`.
///
/// ### 中文
/// `xian_frame_queue` 的 crate 根。
/// 将独立生产者线程渲染的帧交付给合成侧消费者上下文；实现位于 `engine` 模块。
pub mod engine;

pub use engine::config::FrameQueueConfig;
pub use engine::consumer::{ConsumerContext, ConsumerPump};
pub use engine::error::{FrameQueueError, Result};
pub use engine::image::{
    FrameImage, ImageFactory, ImageId, ImageState,
    gl::{GlDevice, GlImportedTexture, GlInterop, GlRenderTarget, GlTextureImage},
    host::{HostFrame, HostImage, HostImportedImage, HostInterop, HostSurface},
};
pub use engine::interop::{CompositionSurface, GpuInterop, ImportedHandle};
pub use engine::present::CompositionLoop;
pub use engine::producer::{FrameProducer, RenderTarget};
pub use engine::queue::{DisplayOutcome, FrameBufferQueue, FrameQueueInit, FrameQueueStats};
pub use engine::vsync::{ExternalVsync, FixedIntervalVsync, VsyncSource};
