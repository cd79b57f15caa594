//! ### English
//! Producer-side render target: one FBO whose color attachment follows the current texture.
//!
//! ### 中文
//! 生产者侧渲染目标：一个 FBO，其颜色附件跟随当前纹理切换。
use std::sync::Arc;

use dpi::PhysicalSize;
use glow::HasContext as _;

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::FrameImage;
use crate::engine::producer::RenderTarget;

use super::{GlDevice, GlTextureImage, gl_extent};

/// ### English
/// Offscreen framebuffer with a depth-stencil renderbuffer sized to the attached texture.
///
/// Must be created, used and destroyed on the producer thread with the producer context current.
///
/// ### 中文
/// 带深度/模板 renderbuffer 的离屏 framebuffer，renderbuffer 尺寸与附加的纹理一致。
///
/// 必须在生产者线程、生产者上下文 current 的情况下创建、使用与销毁。
pub struct GlRenderTarget {
    device: Arc<GlDevice>,
    framebuffer: glow::NativeFramebuffer,
    /// ### English
    /// Depth-stencil renderbuffer and the size its storage was allocated for.
    ///
    /// ### 中文
    /// 深度/模板 renderbuffer 及其存储分配时的尺寸。
    depth_stencil: Option<(glow::NativeRenderbuffer, PhysicalSize<u32>)>,
    destroyed: bool,
}

impl GlRenderTarget {
    pub fn new(device: Arc<GlDevice>) -> Result<Self> {
        let framebuffer =
            unsafe { device.gl().create_framebuffer() }.map_err(FrameQueueError::Backend)?;
        Ok(Self {
            device,
            framebuffer,
            depth_stencil: None,
            destroyed: false,
        })
    }

    /// ### English
    /// Binds the framebuffer for rendering.
    ///
    /// ### 中文
    /// 绑定 framebuffer 以进行渲染。
    pub fn bind(&self) {
        unsafe {
            self.device
                .gl()
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
        }
    }

    /// ### English
    /// Deletes the framebuffer and renderbuffer. Safe to call more than once.
    ///
    /// ### 中文
    /// 删除 framebuffer 与 renderbuffer。可重复调用。
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let gl = self.device.gl();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if let Some((renderbuffer, _)) = self.depth_stencil.take() {
                gl.delete_renderbuffer(renderbuffer);
            }
            gl.delete_framebuffer(self.framebuffer);
        }
    }

    /// ### English
    /// Returns a depth-stencil renderbuffer with storage for `size`, reallocating only when the
    /// size changed.
    ///
    /// #### Parameters
    /// - `size`: Pixel size of the texture being attached.
    ///
    /// ### 中文
    /// 返回存储尺寸为 `size` 的深度/模板 renderbuffer，仅在尺寸变化时重新分配。
    ///
    /// #### 参数
    /// - `size`：即将附加的纹理像素尺寸。
    fn ensure_depth_stencil(&mut self, size: PhysicalSize<u32>) -> Result<glow::NativeRenderbuffer> {
        let gl = self.device.gl();
        let renderbuffer = match self.depth_stencil {
            Some((renderbuffer, allocated)) if allocated == size => return Ok(renderbuffer),
            Some((renderbuffer, _)) => renderbuffer,
            None => unsafe { gl.create_renderbuffer() }.map_err(FrameQueueError::Backend)?,
        };
        let (width, height) = gl_extent(size)?;

        unsafe {
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH24_STENCIL8, width, height);
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
        self.depth_stencil = Some((renderbuffer, size));
        Ok(renderbuffer)
    }
}

impl RenderTarget<GlTextureImage> for GlRenderTarget {
    /// ### English
    /// Flushes the producer's commands and fences them on the outgoing texture.
    ///
    /// ### 中文
    /// 刷新生产者命令，并在即将交出的纹理上插入 fence。
    fn finish_frame(&mut self, image: &GlTextureImage) -> Result<()> {
        let gl = self.device.gl();
        let fence = unsafe { gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) }
            .map_err(FrameQueueError::Backend)?;
        unsafe {
            gl.flush();
        }
        image.replace_producer_fence(fence.0 as usize as u64);
        Ok(())
    }

    fn attach(&mut self, image: &GlTextureImage) -> Result<()> {
        if self.destroyed {
            return Err(FrameQueueError::Backend(
                "render target already destroyed".to_string(),
            ));
        }

        let (width, height) = gl_extent(image.size())?;
        let renderbuffer = self.ensure_depth_stencil(image.size())?;
        let gl = self.device.gl();
        let status = unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(image.texture()),
                0,
            );
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_STENCIL_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
            gl.check_framebuffer_status(glow::FRAMEBUFFER)
        };

        if status != glow::FRAMEBUFFER_COMPLETE {
            log::error!(
                "framebuffer dead after attaching texture {} (status 0x{status:04X})",
                image.texture_id()
            );
            return Err(FrameQueueError::FramebufferIncomplete { status });
        }

        unsafe {
            gl.viewport(0, 0, width, height);
        }
        Ok(())
    }
}

impl Drop for GlRenderTarget {
    fn drop(&mut self) {
        self.destroy();
    }
}
