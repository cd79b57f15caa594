//! ### English
//! Construction of `FrameBufferQueue`.
//!
//! ### 中文
//! `FrameBufferQueue` 的构造逻辑。
use std::sync::Arc;

use crate::engine::config::FrameQueueConfig;
use crate::engine::consumer::ConsumerContext;
use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::{FrameImage, ImageFactory};
use crate::engine::interop::GpuInterop;
use crate::engine::vsync::VsyncSource;

use super::FrameBufferQueue;

/// ### English
/// Initialization bundle for `FrameBufferQueue::new`.
///
/// ### 中文
/// `FrameBufferQueue::new` 的初始化参数包。
pub struct FrameQueueInit<I: FrameImage> {
    /// ### English
    /// Interop context images import against (consumer side).
    ///
    /// ### 中文
    /// 图像导入所用的互操作上下文（消费者侧）。
    pub interop: Arc<I::Interop>,
    /// ### English
    /// Allocates a new image when the pending pool cannot supply one.
    ///
    /// ### 中文
    /// 待复用池无法提供图像时用于分配新图像。
    pub factory: Box<dyn ImageFactory<I>>,
    /// ### English
    /// Context that runs imports and `display_next`.
    ///
    /// ### 中文
    /// 执行导入与 `display_next` 的上下文。
    pub consumer: ConsumerContext,
    pub config: FrameQueueConfig,
    /// ### English
    /// Required when `config.vsync` is set or vsync is enabled later.
    ///
    /// ### 中文
    /// 当 `config.vsync` 为真或之后开启 vsync 时必须提供。
    pub vsync: Option<Arc<dyn VsyncSource>>,
}

impl<I: FrameImage> FrameQueueInit<I> {
    /// ### English
    /// Bundle with the default configuration and no vsync source.
    ///
    /// #### Parameters
    /// - `interop`: Consumer-side interop context.
    /// - `factory`: Image allocator.
    /// - `consumer`: Consumer context.
    ///
    /// ### 中文
    /// 使用默认配置、不带 vsync 源的参数包。
    ///
    /// #### 参数
    /// - `interop`：消费者侧互操作上下文。
    /// - `factory`：图像分配器。
    /// - `consumer`：消费者上下文。
    pub fn new(
        interop: Arc<I::Interop>,
        factory: impl ImageFactory<I> + 'static,
        consumer: ConsumerContext,
    ) -> Self {
        Self {
            interop,
            factory: Box::new(factory),
            consumer,
            config: FrameQueueConfig::default(),
            vsync: None,
        }
    }

    pub fn with_config(mut self, config: FrameQueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_vsync_source(mut self, vsync: Arc<dyn VsyncSource>) -> Self {
        self.vsync = Some(vsync);
        self
    }
}

impl<I: FrameImage> FrameBufferQueue<I> {
    /// ### English
    /// Creates an empty queue. No image is allocated until the first `swap_buffers`.
    ///
    /// Fails with `PlatformNotSupported` when the interop context cannot share textures, and with
    /// `InvalidConfig` for an unusable configuration.
    ///
    /// #### Parameters
    /// - `init`: Initialization bundle.
    ///
    /// ### 中文
    /// 创建空队列。首次 `swap_buffers` 之前不会分配任何图像。
    ///
    /// 互操作上下文无法共享纹理时返回 `PlatformNotSupported`；配置不可用时返回 `InvalidConfig`。
    ///
    /// #### 参数
    /// - `init`：初始化参数包。
    pub fn new(init: FrameQueueInit<I>) -> Result<Self> {
        let FrameQueueInit {
            interop,
            factory,
            consumer,
            config,
            vsync,
        } = init;

        config.validate(vsync.is_some())?;

        if !interop.supports_texture_sharing() {
            log::error!("GPU interop reports no texture sharing support");
            return Err(FrameQueueError::PlatformNotSupported(
                "texture sharing with the compositor is unavailable".to_string(),
            ));
        }

        log::debug!(
            "frame queue created (import capacity {}, vsync {}) on consumer {:?}",
            config.import_capacity,
            config.vsync,
            consumer.name()
        );

        Ok(Self::from_parts(interop, factory, consumer, config, vsync))
    }
}
