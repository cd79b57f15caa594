//! ### English
//! Boundary traits for the collaborators the queue consumes: the GPU interop context, the
//! imported (cross-context) handle, and the compositing surface.
//!
//! ### 中文
//! 队列所依赖协作方的边界 trait：GPU 互操作上下文、导入后的跨上下文句柄、合成表面。
use std::future::Future;

use crate::engine::error::Result;

/// ### English
/// GPU interop context owned by the consumer side.
///
/// Images import themselves against it; the queue only asks whether sharing is possible at all.
///
/// ### 中文
/// 由消费者侧持有的 GPU 互操作上下文。
///
/// 图像基于它完成导入；队列只关心平台是否支持共享。
pub trait GpuInterop: Send + Sync + 'static {
    /// ### English
    /// Whether textures can be shared with the compositing context on this platform.
    ///
    /// ### 中文
    /// 当前平台是否支持与合成上下文共享纹理。
    fn supports_texture_sharing(&self) -> bool;
}

/// ### English
/// Cross-context handle derived from an image by import.
///
/// It has its own disposal step, separate from the image it was derived from.
///
/// ### 中文
/// 通过导入从图像派生出的跨上下文句柄。
///
/// 它拥有独立于源图像的释放步骤。
pub trait ImportedHandle: Send + 'static {
    /// ### English
    /// Resolves once the import is complete and the surface may consume the handle.
    ///
    /// ### 中文
    /// 导入完成、表面可以消费该句柄时 resolve。
    fn import_completed(&self) -> impl Future<Output = Result<()>> + Send;

    /// ### English
    /// Releases the import registration.
    ///
    /// ### 中文
    /// 释放导入注册。
    fn dispose(self) -> impl Future<Output = ()> + Send + 'static;
}

/// ### English
/// Compositing surface that presents imported handles.
///
/// The returned future completes once the surface no longer needs the handle's contents;
/// the queue recycles the image only after that.
///
/// ### 中文
/// 显示导入句柄的合成表面。
///
/// 返回的 future 在表面不再需要该句柄内容时完成；队列在此之后才回收图像。
pub trait CompositionSurface<H: ImportedHandle> {
    fn update(&self, handle: &H) -> impl Future<Output = Result<()>>;
}
