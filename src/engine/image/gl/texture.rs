//! ### English
//! Shared GL texture image and its imported handle.
//!
//! ### 中文
//! 共享 GL 纹理图像及其导入句柄。
use std::future::{self, Future};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::FrameImage;
use crate::engine::interop::ImportedHandle;

use super::{GlDevice, GlInterop, gl_extent};

/// ### English
/// Per-call timeout for `glClientWaitSync` (nanoseconds).
///
/// ### 中文
/// 单次 `glClientWaitSync` 的超时（纳秒）。
const FENCE_POLL_NANOS: i32 = 1_000_000;

/// ### English
/// Total time the consumer waits for a producer fence before reporting a backend error.
///
/// ### 中文
/// 消费者等待生产者 fence 的总时长，超时后上报后端错误。
const FENCE_WAIT_LIMIT: Duration = Duration::from_secs(2);

/// ### English
/// Color texture with immutable storage, shared with the compositing context.
///
/// ### 中文
/// 使用不可变存储、与合成上下文共享的颜色纹理。
pub struct GlTextureImage {
    device: Arc<GlDevice>,
    texture: glow::NativeTexture,
    size: PhysicalSize<u32>,
    /// ### English
    /// Producer fence (`GLsync` cast to `u64`) inserted after the last frame rendered into this
    /// texture, or `0`.
    ///
    /// ### 中文
    /// 最近一次渲染到该纹理后插入的生产者 fence（`GLsync` 转为 `u64`），无则为 `0`。
    producer_fence: AtomicU64,
}

impl GlTextureImage {
    /// ### English
    /// Allocates a texture of `size` on the calling thread's current context.
    ///
    /// ### 中文
    /// 在调用线程当前的上下文上分配一张尺寸为 `size` 的纹理。
    pub fn new(device: Arc<GlDevice>, size: PhysicalSize<u32>) -> Result<Self> {
        let (width, height) =
            gl_extent(PhysicalSize::new(size.width.max(1), size.height.max(1)))?;

        let gl = device.gl();
        let texture = unsafe { gl.create_texture() }.map_err(FrameQueueError::Backend)?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_storage_2d(glow::TEXTURE_2D, 1, device.color_format(), width, height);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        log::debug!(
            "allocated GL texture {} ({}x{})",
            texture.0.get(),
            size.width,
            size.height
        );

        Ok(Self {
            device,
            texture,
            size,
            producer_fence: AtomicU64::new(0),
        })
    }

    pub fn texture(&self) -> glow::NativeTexture {
        self.texture
    }

    pub fn texture_id(&self) -> u32 {
        self.texture.0.get()
    }

    /// ### English
    /// Stores a new producer fence, deleting the one it replaces.
    ///
    /// ### 中文
    /// 保存新的生产者 fence，并删除被替换的旧 fence。
    pub(crate) fn replace_producer_fence(&self, fence_value: u64) {
        let previous = self.producer_fence.swap(fence_value, Ordering::AcqRel);
        self.device.delete_fence(previous);
    }
}

impl FrameImage for GlTextureImage {
    type Interop = GlInterop;
    type Handle = GlImportedTexture;

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// ### English
    /// Drops the fence of the previous use; a new one is inserted when the frame is finished.
    ///
    /// ### 中文
    /// 删除上一次使用留下的 fence；帧完成时会插入新的 fence。
    fn setup(&mut self) -> Result<()> {
        self.replace_producer_fence(0);
        Ok(())
    }

    fn import(&self, interop: &GlInterop) -> Result<GlImportedTexture> {
        Ok(GlImportedTexture {
            device: interop.device().clone(),
            texture: self.texture,
            size: self.size,
            fence: self.producer_fence.load(Ordering::Acquire),
        })
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        async move {
            let fence = self.producer_fence.swap(0, Ordering::AcqRel);
            self.device.delete_fence(fence);
            unsafe {
                self.device.gl().delete_texture(self.texture);
            }
            log::debug!("deleted GL texture {}", self.texture.0.get());
        }
    }
}

/// ### English
/// Compositor-side view of a `GlTextureImage`: the shared texture name plus the producer fence
/// that must signal before sampling.
///
/// ### 中文
/// `GlTextureImage` 在合成器侧的视图：共享纹理名称，以及采样前必须 signal 的生产者 fence。
pub struct GlImportedTexture {
    device: Arc<GlDevice>,
    texture: glow::NativeTexture,
    size: PhysicalSize<u32>,
    fence: u64,
}

impl GlImportedTexture {
    pub fn texture(&self) -> glow::NativeTexture {
        self.texture
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn wait_for_producer(&self) -> Result<()> {
        if self.fence == 0 {
            return Ok(());
        }

        let sync = glow::NativeFence(self.fence as usize as *mut _);
        let deadline = Instant::now() + FENCE_WAIT_LIMIT;
        loop {
            let status = unsafe {
                self.device.gl().client_wait_sync(
                    sync,
                    glow::SYNC_FLUSH_COMMANDS_BIT,
                    FENCE_POLL_NANOS,
                )
            };
            match status {
                glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => return Ok(()),
                glow::TIMEOUT_EXPIRED if Instant::now() < deadline => continue,
                glow::TIMEOUT_EXPIRED => {
                    return Err(FrameQueueError::Backend(format!(
                        "producer fence for texture {} did not signal within {:?}",
                        self.texture.0.get(),
                        FENCE_WAIT_LIMIT
                    )));
                }
                other => {
                    return Err(FrameQueueError::Backend(format!(
                        "glClientWaitSync failed with status 0x{other:04X}"
                    )));
                }
            }
        }
    }
}

impl ImportedHandle for GlImportedTexture {
    fn import_completed(&self) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.wait_for_producer())
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        // The texture and its fence stay owned by the image.
        async move { drop(self) }
    }
}
