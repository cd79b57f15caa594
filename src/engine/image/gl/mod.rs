//! ### English
//! OpenGL image backend: textures in a share group with the compositing context.
//!
//! ### 中文
//! OpenGL 图像后端：与合成上下文处于同一共享组的纹理。
use std::ffi::c_void;
use std::sync::Arc;

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::interop::GpuInterop;

mod target;
mod texture;

pub use target::GlRenderTarget;
pub use texture::{GlImportedTexture, GlTextureImage};

/// ### English
/// Parses `(major, minor)` out of a `GL_VERSION` string.
///
/// Expected forms: `"4.6.0 ..."` or `"OpenGL ES 3.2 ..."`. Unparseable parts yield `0`.
///
/// ### 中文
/// 从 `GL_VERSION` 字符串中解析 `(major, minor)`。
///
/// 期望形式：`"4.6.0 ..."` 或 `"OpenGL ES 3.2 ..."`。无法解析的部分返回 `0`。
pub(crate) fn parse_gl_version(version: &str) -> (u32, u32) {
    let Some(token) = version
        .split_whitespace()
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))
    else {
        return (0, 0);
    };

    let mut parts = token.split('.');
    let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (major, minor)
}

/// ### English
/// Converts a pixel size to the `GLsizei` pair GL entry points take.
///
/// ### 中文
/// 将像素尺寸转换为 GL 接口所需的 `GLsizei` 对。
pub(crate) fn gl_extent(size: PhysicalSize<u32>) -> Result<(i32, i32)> {
    let width = i32::try_from(size.width)
        .map_err(|_| FrameQueueError::Backend(format!("width {} exceeds GLsizei", size.width)))?;
    let height = i32::try_from(size.height)
        .map_err(|_| FrameQueueError::Backend(format!("height {} exceeds GLsizei", size.height)))?;
    Ok((width, height))
}

/// ### English
/// A loaded GL function table for a context in the producer/compositor share group, plus the
/// capabilities the frame queue depends on.
///
/// ### 中文
/// 生产者/合成器共享组中某个上下文的 GL 函数表，以及帧队列依赖的能力信息。
pub struct GlDevice {
    gl: glow::Context,
    version: (u32, u32),
    is_gles: bool,
    fence_sync_supported: bool,
    texture_storage_supported: bool,
    srgb_supported: bool,
}

/// ### English
/// Texture, fence and framebuffer names are valid on every context of the share group. Callers
/// must have one of those contexts current on the calling thread when issuing GL work.
///
/// ### 中文
/// 纹理、fence、framebuffer 名称在共享组内的所有上下文中均有效。调用方发起 GL 操作时，
/// 必须在当前线程上使共享组中的某个上下文处于 current 状态。
unsafe impl Send for GlDevice {}
unsafe impl Sync for GlDevice {}

impl GlDevice {
    /// ### English
    /// Loads GL entry points through `loader` and probes capabilities.
    ///
    /// # Safety
    /// A GL context of the share group must be current on the calling thread, and `loader` must
    /// return valid entry points for it.
    ///
    /// ### 中文
    /// 通过 `loader` 加载 GL 入口并探测能力。
    ///
    /// # Safety
    /// 调用线程上必须有共享组中的 GL 上下文处于 current，且 `loader` 必须返回其有效入口。
    pub unsafe fn from_loader_function<F>(loader: F) -> Arc<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = unsafe { glow::Context::from_loader_function(loader) };
        Arc::new(Self::from_context(gl))
    }

    /// ### English
    /// Wraps an already loaded context and probes capabilities.
    ///
    /// ### 中文
    /// 包装一个已加载的上下文并探测能力。
    pub fn from_context(gl: glow::Context) -> Self {
        let version_string = unsafe { gl.get_parameter_string(glow::VERSION) };
        let is_gles = version_string.starts_with("OpenGL ES");
        let (major, minor) = parse_gl_version(&version_string);
        let extensions = gl.supported_extensions();

        // Desktop: sync objects are core in 3.2, immutable storage in 4.2. GLES: both in 3.0.
        let fence_sync_supported = if is_gles {
            major >= 3
        } else {
            (major, minor) >= (3, 2) || extensions.contains("GL_ARB_sync")
        };
        let texture_storage_supported = if is_gles {
            major >= 3
        } else {
            (major, minor) >= (4, 2) || extensions.contains("GL_ARB_texture_storage")
        };
        let srgb_supported = if is_gles {
            major >= 3
        } else {
            major >= 3 || (major == 2 && minor >= 1)
        };

        log::debug!(
            "GL device: {version_string:?} (fence sync: {fence_sync_supported}, \
             texture storage: {texture_storage_supported}, sRGB: {srgb_supported})"
        );

        Self {
            gl,
            version: (major, minor),
            is_gles,
            fence_sync_supported,
            texture_storage_supported,
            srgb_supported,
        }
    }

    #[inline]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    pub fn is_gles(&self) -> bool {
        self.is_gles
    }

    pub fn supports_fence_sync(&self) -> bool {
        self.fence_sync_supported
    }

    pub fn supports_texture_storage(&self) -> bool {
        self.texture_storage_supported
    }

    pub fn supports_srgb(&self) -> bool {
        self.srgb_supported
    }

    /// ### English
    /// Sized color format for new textures (sRGB when available).
    ///
    /// ### 中文
    /// 新纹理使用的定长颜色格式（可用时使用 sRGB）。
    pub(crate) fn color_format(&self) -> u32 {
        if self.srgb_supported {
            glow::SRGB8_ALPHA8
        } else {
            glow::RGBA8
        }
    }

    /// ### English
    /// Deletes one `GLsync` stored as a `u64` handle (`0` means none).
    ///
    /// ### 中文
    /// 删除一个以 `u64` 句柄保存的 `GLsync`（`0` 表示无）。
    pub(crate) fn delete_fence(&self, fence_value: u64) {
        if fence_value == 0 {
            return;
        }
        let sync = glow::NativeFence(fence_value as usize as *mut _);
        unsafe {
            self.gl.delete_sync(sync);
        }
    }
}

/// ### English
/// Interop context for GL textures, backed by the compositor-side device of the share group.
///
/// ### 中文
/// GL 纹理的互操作上下文，由共享组中合成器侧的设备支撑。
pub struct GlInterop {
    device: Arc<GlDevice>,
}

impl GlInterop {
    /// ### English
    /// Fails with `PlatformNotSupported` when the device cannot fence or allocate immutable
    /// textures; both are needed to hand textures across contexts.
    ///
    /// ### 中文
    /// 当设备不支持 fence 或不可变纹理存储时返回 `PlatformNotSupported`；跨上下文交付纹理
    /// 需要这两项能力。
    pub fn new(device: Arc<GlDevice>) -> Result<Self> {
        if !device.supports_fence_sync() {
            return Err(FrameQueueError::PlatformNotSupported(
                "GL context lacks sync objects (GL 3.2 / GLES 3.0 / ARB_sync)".to_string(),
            ));
        }
        if !device.supports_texture_storage() {
            return Err(FrameQueueError::PlatformNotSupported(
                "GL context lacks immutable texture storage".to_string(),
            ));
        }
        Ok(Self { device })
    }

    pub fn device(&self) -> &Arc<GlDevice> {
        &self.device
    }
}

impl GpuInterop for GlInterop {
    fn supports_texture_sharing(&self) -> bool {
        self.device.supports_fence_sync() && self.device.supports_texture_storage()
    }
}

#[cfg(test)]
mod tests {
    use dpi::PhysicalSize;

    use super::{gl_extent, parse_gl_version};
    use crate::engine::error::FrameQueueError;

    #[test]
    fn parses_desktop_and_es_versions() {
        assert_eq!(parse_gl_version("4.6.0 NVIDIA 535.54.03"), (4, 6));
        assert_eq!(parse_gl_version("OpenGL ES 3.2 Mesa 23.1"), (3, 2));
        assert_eq!(parse_gl_version("3.3 (Core Profile) Mesa"), (3, 3));
    }

    #[test]
    fn unparseable_versions_are_zero() {
        assert_eq!(parse_gl_version(""), (0, 0));
        assert_eq!(parse_gl_version("OpenGL ES"), (0, 0));
        assert_eq!(parse_gl_version("4"), (4, 0));
    }

    #[test]
    fn extents_beyond_glsizei_are_rejected() {
        assert_eq!(gl_extent(PhysicalSize::new(1920, 1080)).unwrap(), (1920, 1080));
        assert_eq!(
            gl_extent(PhysicalSize::new(i32::MAX as u32, 1)).unwrap(),
            (i32::MAX, 1)
        );
        assert!(matches!(
            gl_extent(PhysicalSize::new(u32::MAX, 1)),
            Err(FrameQueueError::Backend(_))
        ));
        assert!(matches!(
            gl_extent(PhysicalSize::new(1, i32::MAX as u32 + 1)),
            Err(FrameQueueError::Backend(_))
        ));
    }
}
