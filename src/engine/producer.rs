//! ### English
//! Producer-side render loop glue: render target binding plus viewport tracking around
//! `swap_buffers`.
//!
//! ### 中文
//! 生产者侧渲染循环的粘合层：在 `swap_buffers` 前后处理渲染目标绑定与视口尺寸。
use std::sync::Arc;

use dpi::PhysicalSize;

use crate::engine::error::Result;
use crate::engine::image::FrameImage;
use crate::engine::queue::FrameBufferQueue;

/// ### English
/// Native render target the producer draws through.
///
/// ### 中文
/// 生产者用于绘制的原生渲染目标。
pub trait RenderTarget<I: FrameImage> {
    /// ### English
    /// Completes rendering into `image` before it is handed to the consumer (flush, fence).
    ///
    /// ### 中文
    /// 在 `image` 交给消费者之前完成对它的渲染（flush、fence）。
    fn finish_frame(&mut self, image: &I) -> Result<()>;

    /// ### English
    /// Makes `image` the render destination. Fails with `FramebufferIncomplete` when the target
    /// cannot render into it.
    ///
    /// ### 中文
    /// 将 `image` 设为渲染目标。目标无法渲染到该图像时返回 `FramebufferIncomplete`。
    fn attach(&mut self, image: &I) -> Result<()>;
}

/// ### English
/// Drives one producer: finishes the current frame, swaps it into the queue at the current
/// viewport size and attaches the next image to the render target.
///
/// ### 中文
/// 驱动单个生产者：完成当前帧，以当前视口尺寸将其交换进队列，并把下一张图像绑定到渲染目标。
pub struct FrameProducer<I: FrameImage, T: RenderTarget<I>> {
    queue: Arc<FrameBufferQueue<I>>,
    target: T,
    viewport: PhysicalSize<u32>,
}

fn clamp_viewport(size: PhysicalSize<u32>) -> PhysicalSize<u32> {
    PhysicalSize::new(size.width.max(1), size.height.max(1))
}

impl<I: FrameImage, T: RenderTarget<I>> FrameProducer<I, T> {
    pub fn new(queue: Arc<FrameBufferQueue<I>>, target: T, viewport: PhysicalSize<u32>) -> Self {
        Self {
            queue,
            target,
            viewport: clamp_viewport(viewport),
        }
    }

    /// ### English
    /// Sets the size used by the next swap. Each dimension is clamped to at least 1.
    ///
    /// ### 中文
    /// 设置下一次交换使用的尺寸。每个维度至少为 1。
    pub fn set_viewport_size(&mut self, size: PhysicalSize<u32>) {
        let size = clamp_viewport(size);
        if size != self.viewport {
            log::debug!("viewport resized to {}x{}", size.width, size.height);
        }
        self.viewport = size;
    }

    pub fn viewport_size(&self) -> PhysicalSize<u32> {
        self.viewport
    }

    /// ### English
    /// Finishes and publishes the current frame, then attaches the next image.
    ///
    /// The first call has no frame to publish and only acquires and attaches an image. Attach
    /// failure is fatal for the render session and is returned as is.
    ///
    /// ### 中文
    /// 完成并发布当前帧，然后绑定下一张图像。
    ///
    /// 首次调用没有可发布的帧，只会获取并绑定图像。绑定失败对渲染会话是致命的，原样返回。
    pub fn swap_buffers(&mut self) -> Result<()> {
        if self.queue.current_image_id().is_some() {
            let image = self.queue.current_buffer()?;
            self.target.finish_frame(&image)?;
        }

        self.queue.swap_buffers(self.viewport)?;

        let image = self.queue.current_buffer()?;
        self.target.attach(&image).inspect_err(|err| {
            log::error!("render target rejected the next image: {err}");
        })
    }

    pub fn queue(&self) -> &Arc<FrameBufferQueue<I>> {
        &self.queue
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}
