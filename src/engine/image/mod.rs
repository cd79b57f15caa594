//! ### English
//! Frame image capability set and the concrete backends.
//!
//! ### 中文
//! 帧图像的能力集合及具体后端实现。
use std::fmt;
use std::future::Future;

use dpi::PhysicalSize;

use crate::engine::error::Result;
use crate::engine::interop::{GpuInterop, ImportedHandle};

pub mod gl;
pub mod host;

/// ### English
/// One GPU-texture-backed surface of a fixed pixel size, the unit of buffering.
///
/// `setup` and `reset` default to no-ops; `dispose` must release the native handle.
///
/// ### 中文
/// 固定像素尺寸、以 GPU 纹理为后备的表面，是缓冲的基本单位。
///
/// `setup` 与 `reset` 默认为空操作；`dispose` 必须释放原生句柄。
pub trait FrameImage: Send + 'static {
    /// ### English
    /// Interop context the image imports against.
    ///
    /// ### 中文
    /// 图像导入时所使用的互操作上下文。
    type Interop: GpuInterop;
    /// ### English
    /// Handle produced by `import`.
    ///
    /// ### 中文
    /// `import` 产出的句柄类型。
    type Handle: ImportedHandle;

    fn size(&self) -> PhysicalSize<u32>;

    /// ### English
    /// Invoked whenever the image (new or recycled) becomes the producer's current buffer.
    ///
    /// ### 中文
    /// 图像（新建或复用）成为生产者当前缓冲时调用。
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// ### English
    /// Exports the image for the consumer context. Runs on the consumer context and must not
    /// change the image itself.
    ///
    /// ### 中文
    /// 为消费者上下文导出图像。在消费者上下文中执行，且不得修改图像本身。
    fn import(&self, interop: &Self::Interop) -> Result<Self::Handle>;

    /// ### English
    /// Invoked when the image returns to the pending pool after display.
    ///
    /// ### 中文
    /// 图像显示完毕、回到待复用池时调用。
    fn reset(&mut self) {}

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static;
}

/// ### English
/// Allocates new images on a pool miss.
///
/// Any `Fn(PhysicalSize<u32>) -> Result<I>` closure is a factory.
///
/// ### 中文
/// 待复用池未命中时分配新图像。
///
/// 任何 `Fn(PhysicalSize<u32>) -> Result<I>` 闭包都可作为工厂。
pub trait ImageFactory<I>: Send + Sync {
    fn allocate(&self, size: PhysicalSize<u32>) -> Result<I>;
}

impl<I, F> ImageFactory<I> for F
where
    F: Fn(PhysicalSize<u32>) -> Result<I> + Send + Sync,
{
    #[inline]
    fn allocate(&self, size: PhysicalSize<u32>) -> Result<I> {
        self(size)
    }
}

/// ### English
/// Queue-assigned identity of an owned image (unique per queue, never reused).
///
/// ### 中文
/// 队列为其持有的图像分配的标识（队列内唯一，不复用）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(crate) u64);

impl ImageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

/// ### English
/// Lifecycle state of an owned image. Each image is in exactly one state at a time.
///
/// ### 中文
/// 被持有图像的生命周期状态。任意时刻每个图像只处于一个状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageState {
    /// ### English
    /// Owned by the producer and being rendered into.
    ///
    /// ### 中文
    /// 由生产者持有，正在被渲染。
    Current,
    /// ### English
    /// Being exported on the consumer context.
    ///
    /// ### 中文
    /// 正在消费者上下文中导出。
    Importing,
    /// ### English
    /// Queued in the import queue, waiting for display.
    ///
    /// ### 中文
    /// 位于导入队列中，等待显示。
    InFlight,
    /// ### English
    /// Handed to the surface; recycled once the update completes.
    ///
    /// ### 中文
    /// 已交给合成表面；更新完成后回收。
    Displayed,
    PendingReuse,
    Disposed,
}
