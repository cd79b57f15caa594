//! ### English
//! Consumer side: present the oldest queued frame and recycle its image.
//!
//! ### 中文
//! 消费者侧：显示最旧的排队帧并回收其图像。
use std::sync::atomic::Ordering;

use crate::engine::error::Result;
use crate::engine::image::{FrameImage, ImageState};
use crate::engine::interop::{CompositionSurface, ImportedHandle};

use super::{DisplayOutcome, FrameBufferQueue, ImportedFrame};

impl<I: FrameImage> FrameBufferQueue<I> {
    /// ### English
    /// Hands the oldest queued frame to `surface`, then recycles its image into the pending pool.
    ///
    /// Must run on the consumer context (`WrongContext` otherwise). Returns
    /// `DisplayOutcome::Idle` without touching the surface when nothing is queued. The image is
    /// recycled and the handle disposed even when the surface update fails.
    ///
    /// #### Parameters
    /// - `surface`: Compositing surface that presents the frame.
    ///
    /// ### 中文
    /// 将最旧的排队帧交给 `surface`，随后把图像回收到待复用池。
    ///
    /// 必须在消费者上下文中执行（否则返回 `WrongContext`）。队列为空时返回
    /// `DisplayOutcome::Idle`，且不触碰表面。即使表面更新失败，图像仍会被回收、句柄仍会被释放。
    ///
    /// #### 参数
    /// - `surface`：负责显示该帧的合成表面。
    pub async fn display_next<S>(&self, surface: &S) -> Result<DisplayOutcome>
    where
        S: CompositionSurface<I::Handle>,
    {
        self.consumer.check_access("display_next")?;
        self.ensure_open()?;

        let Some(ImportedFrame { mut slot, handle }) = self.imports.try_pop() else {
            self.stats.idle_ticks.fetch_add(1, Ordering::Relaxed);
            return Ok(DisplayOutcome::Idle);
        };

        slot.transition(ImageState::Displayed);
        let presented = match handle.import_completed().await {
            Ok(()) => surface.update(&handle).await,
            Err(err) => Err(err),
        };
        handle.dispose().await;

        let id = slot.id;
        slot.image.reset();
        if let Err(slot) = self.pool.recycle(slot) {
            slot.dispose().await;
        }

        match presented {
            Ok(()) => {
                self.stats.displayed.fetch_add(1, Ordering::Relaxed);
                log::trace!(
                    "displayed {id} ({} frame(s) still pending)",
                    self.imports.len()
                );
                Ok(DisplayOutcome::Displayed { image: id })
            }
            Err(err) => {
                log::warn!("presenting {id} failed: {err}");
                Err(err)
            }
        }
    }
}
