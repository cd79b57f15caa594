//! ### English
//! Host-memory image backend.
//!
//! The "texture" is an RGBA8 buffer shared by reference count; importing registers the buffer
//! with the `HostInterop` and the `HostSurface` copies it into its front frame. Used for headless
//! composition and as a reference implementation of the image contract.
//!
//! ### 中文
//! 主机内存图像后端。
//!
//! “纹理”是一块通过引用计数共享的 RGBA8 缓冲；导入时向 `HostInterop` 注册该缓冲，
//! `HostSurface` 将其拷贝到前台帧。用于无头合成，也作为图像契约的参考实现。
use std::future::{self, Future};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dpi::PhysicalSize;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::interop::{CompositionSurface, GpuInterop, ImportedHandle};

use super::FrameImage;

/// ### English
/// Bytes per RGBA8 pixel.
///
/// ### 中文
/// 每个 RGBA8 像素的字节数。
pub const HOST_BYTES_PER_PIXEL: usize = 4;

type SharedPixels = Arc<RwLock<Box<[u8]>>>;

fn byte_len(size: PhysicalSize<u32>) -> Result<usize> {
    (size.width as usize)
        .checked_mul(size.height as usize)
        .and_then(|pixels| pixels.checked_mul(HOST_BYTES_PER_PIXEL))
        .ok_or_else(|| {
            FrameQueueError::Backend(format!(
                "host image {}x{} overflows the address space",
                size.width, size.height
            ))
        })
}

/// ### English
/// Interop context for host images. Tracks how many imports are currently registered.
///
/// ### 中文
/// 主机图像的互操作上下文。记录当前已注册的导入数量。
#[derive(Default)]
pub struct HostInterop {
    live_imports: Arc<AtomicUsize>,
}

impl HostInterop {
    pub fn new() -> Self {
        Self::default()
    }

    /// ### English
    /// Number of imported handles that have not been disposed yet.
    ///
    /// ### 中文
    /// 尚未释放的导入句柄数量。
    pub fn live_imports(&self) -> usize {
        self.live_imports.load(Ordering::Acquire)
    }

    fn register(&self) -> HostRegistration {
        self.live_imports.fetch_add(1, Ordering::AcqRel);
        HostRegistration {
            live_imports: self.live_imports.clone(),
        }
    }
}

impl GpuInterop for HostInterop {
    fn supports_texture_sharing(&self) -> bool {
        true
    }
}

struct HostRegistration {
    live_imports: Arc<AtomicUsize>,
}

impl Drop for HostRegistration {
    fn drop(&mut self) {
        self.live_imports.fetch_sub(1, Ordering::AcqRel);
    }
}

/// ### English
/// RGBA8 image in host memory.
///
/// ### 中文
/// 位于主机内存中的 RGBA8 图像。
pub struct HostImage {
    size: PhysicalSize<u32>,
    pixels: SharedPixels,
}

impl HostImage {
    /// ### English
    /// Allocates a zeroed image of `size`.
    ///
    /// ### 中文
    /// 分配一块尺寸为 `size`、内容清零的图像。
    pub fn new(size: PhysicalSize<u32>) -> Result<Self> {
        let len = byte_len(size)?;
        Ok(Self {
            size,
            pixels: Arc::new(RwLock::new(vec![0u8; len].into_boxed_slice())),
        })
    }

    pub fn pixels(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.pixels.read()
    }

    /// ### English
    /// Write access for the producer. The consumer only reads through an imported handle.
    ///
    /// ### 中文
    /// 供生产者写入。消费者只通过导入句柄读取。
    pub fn pixels_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.pixels.write()
    }

    pub fn fill(&self, rgba: [u8; 4]) {
        let mut pixels = self.pixels.write();
        for pixel in pixels.chunks_exact_mut(HOST_BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&rgba);
        }
    }
}

impl FrameImage for HostImage {
    type Interop = HostInterop;
    type Handle = HostImportedImage;

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn import(&self, interop: &HostInterop) -> Result<HostImportedImage> {
        Ok(HostImportedImage {
            size: self.size,
            pixels: self.pixels.clone(),
            _registration: interop.register(),
        })
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        async move { drop(self) }
    }
}

/// ### English
/// Imported view of a `HostImage`, consumed by `HostSurface`.
///
/// ### 中文
/// `HostImage` 的导入视图，由 `HostSurface` 消费。
pub struct HostImportedImage {
    size: PhysicalSize<u32>,
    pixels: SharedPixels,
    _registration: HostRegistration,
}

impl HostImportedImage {
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn pixels(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.pixels.read()
    }
}

impl ImportedHandle for HostImportedImage {
    fn import_completed(&self) -> impl Future<Output = Result<()>> + Send {
        future::ready(Ok(()))
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        async move { drop(self) }
    }
}

/// ### English
/// Snapshot of the frame a `HostSurface` currently shows.
///
/// ### 中文
/// `HostSurface` 当前显示帧的快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostFrame {
    pub size: PhysicalSize<u32>,
    pub pixels: Vec<u8>,
    /// ### English
    /// 1-based presentation counter of this frame.
    ///
    /// ### 中文
    /// 该帧的显示序号（从 1 开始）。
    pub sequence: u64,
}

/// ### English
/// Compositing surface that copies each presented frame into host memory.
///
/// ### 中文
/// 将每个显示帧拷贝到主机内存的合成表面。
#[derive(Default)]
pub struct HostSurface {
    front: Mutex<Option<HostFrame>>,
    presented: AtomicU64,
}

impl HostSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_frame(&self) -> Option<HostFrame> {
        self.front.lock().clone()
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented.load(Ordering::Acquire)
    }

    fn present(&self, handle: &HostImportedImage) -> Result<()> {
        let pixels = handle.pixels();
        let mut front = self.front.lock();
        let sequence = self.presented.fetch_add(1, Ordering::AcqRel) + 1;
        match front.as_mut() {
            Some(frame) if frame.size == handle.size() => {
                frame.pixels.copy_from_slice(&pixels);
                frame.sequence = sequence;
            }
            _ => {
                *front = Some(HostFrame {
                    size: handle.size(),
                    pixels: pixels.to_vec(),
                    sequence,
                });
            }
        }
        Ok(())
    }
}

impl CompositionSurface<HostImportedImage> for HostSurface {
    fn update(&self, handle: &HostImportedImage) -> impl Future<Output = Result<()>> {
        future::ready(self.present(handle))
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn import_shares_pixels_and_registers_until_disposed() {
        let interop = HostInterop::new();
        let image = HostImage::new(PhysicalSize::new(2, 2)).unwrap();
        image.fill([1, 2, 3, 4]);

        let imported = image.import(&interop).unwrap();
        assert_eq!(interop.live_imports(), 1);
        assert_eq!(&imported.pixels()[..4], &[1, 2, 3, 4]);

        image.fill([9, 9, 9, 9]);
        assert_eq!(&imported.pixels()[..4], &[9, 9, 9, 9]);

        block_on(imported.dispose());
        assert_eq!(interop.live_imports(), 0);
        block_on(image.dispose());
    }

    #[test]
    fn surface_keeps_a_copy_of_the_presented_frame() {
        let interop = HostInterop::new();
        let surface = HostSurface::new();
        let image = HostImage::new(PhysicalSize::new(1, 1)).unwrap();
        image.fill([10, 20, 30, 255]);

        let imported = image.import(&interop).unwrap();
        block_on(surface.update(&imported)).unwrap();
        image.fill([0, 0, 0, 0]);

        let frame = surface.latest_frame().unwrap();
        assert_eq!(frame.pixels, vec![10, 20, 30, 255]);
        assert_eq!(frame.sequence, 1);
        assert_eq!(surface.presented_frames(), 1);
    }
}
