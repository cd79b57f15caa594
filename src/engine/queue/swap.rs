//! ### English
//! Producer side: retire the current image and acquire the next one.
//!
//! ### 中文
//! 生产者侧：交出当前图像并获取下一张。
use std::sync::Arc;
use std::sync::atomic::Ordering;

use dpi::PhysicalSize;
use parking_lot::Mutex;

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::{FrameImage, ImageId, ImageState};
use crate::engine::interop::ImportedHandle;

use super::{FrameBufferQueue, FrameSlot, ImportedFrame, QUEUE_OPEN};

impl<I: FrameImage> FrameBufferQueue<I> {
    /// ### English
    /// Publishes the current image for display and makes a `size` image current.
    ///
    /// Producer-thread API. Blocks while the import queue is full and while the consumer context
    /// imports the outgoing image. When import fails the image stays current and the error is
    /// returned.
    ///
    /// #### Parameters
    /// - `size`: Pixel size of the next frame.
    ///
    /// ### 中文
    /// 将当前图像发布以供显示，并使一张尺寸为 `size` 的图像成为当前缓冲。
    ///
    /// 生产者线程 API。导入队列已满、或消费者上下文正在导入交出的图像时会阻塞。
    /// 导入失败时该图像保持为当前缓冲，并返回错误。
    ///
    /// #### 参数
    /// - `size`：下一帧的像素尺寸。
    pub fn swap_buffers(&self, size: PhysicalSize<u32>) -> Result<()> {
        let _producer = self.producer.lock();
        self.ensure_open()?;

        let previous = self.current.lock().take();
        if let Some(slot) = previous {
            self.retire(slot)?;
        }

        let next = self.acquire(size)?;
        self.install_current(next)
    }

    /// ### English
    /// Imports `slot` on the consumer context and pushes it onto the import queue.
    ///
    /// ### 中文
    /// 在消费者上下文中导入 `slot`，并将其推入导入队列。
    fn retire(&self, slot: FrameSlot<I>) -> Result<()> {
        self.wait_for_vsync();

        let (slot, imported) = self.import_on_consumer(slot)?;
        let handle = match imported {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("import of {} failed: {err}", slot.id);
                let mut slot = slot;
                slot.transition(ImageState::Current);
                self.install_current(slot)?;
                return Err(err);
            }
        };

        let mut slot = slot;
        slot.transition(ImageState::InFlight);
        let id = slot.id;
        if let Err(frame) = self.imports.push(ImportedFrame { slot, handle }) {
            futures::executor::block_on(async move {
                futures::join!(frame.handle.dispose(), frame.slot.dispose());
            });
            return Err(FrameQueueError::QueueClosed);
        }

        log::trace!(
            "{id} queued for display ({} of {} pending)",
            self.imports.len(),
            self.imports.capacity()
        );
        Ok(())
    }

    /// ### English
    /// Runs `import` on the consumer context. The slot always comes back to the caller, even when
    /// the context is gone.
    ///
    /// ### 中文
    /// 在消费者上下文中执行 `import`。即使上下文已不存在，槽位也总会交还调用方。
    fn import_on_consumer(
        &self,
        mut slot: FrameSlot<I>,
    ) -> Result<(FrameSlot<I>, Result<I::Handle>)> {
        slot.transition(ImageState::Importing);
        let cell = Arc::new(Mutex::new(Some(slot)));

        let interop = self.interop.clone();
        let task_cell = cell.clone();
        let invoked = self.consumer.invoke(move || match task_cell.lock().as_ref() {
            Some(slot) => slot.image.import(&interop),
            None => Err(FrameQueueError::QueueClosed),
        });

        let Some(slot) = cell.lock().take() else {
            return Err(FrameQueueError::ConsumerGone);
        };
        match invoked {
            Ok(imported) => Ok((slot, imported)),
            Err(err) => {
                log::error!("consumer context unavailable while importing {}: {err}", slot.id);
                futures::executor::block_on(slot.dispose());
                Err(err)
            }
        }
    }

    fn wait_for_vsync(&self) {
        if !self.vsync_enabled.load(Ordering::Acquire) {
            return;
        }
        if let Some(source) = &self.vsync_source {
            if !source.wait_for_vsync(self.vsync_timeout) {
                log::warn!(
                    "no vertical sync within {:?}; exporting anyway",
                    self.vsync_timeout
                );
            }
        }
    }

    /// ### English
    /// Takes a same-size spare from the pool, or allocates a new image, and runs `setup`.
    ///
    /// ### 中文
    /// 从池中取出同尺寸的备用图像，或分配新图像，然后执行 `setup`。
    fn acquire(&self, size: PhysicalSize<u32>) -> Result<FrameSlot<I>> {
        self.ensure_open()?;

        let search = self.pool.search(size);
        if !search.evicted.is_empty() {
            log::debug!(
                "evicting {} pooled image(s) not matching {}x{}",
                search.evicted.len(),
                size.width,
                size.height
            );
            self.stats
                .evicted
                .fetch_add(search.evicted.len() as u64, Ordering::Relaxed);
            Self::dispose_slots_blocking(search.evicted);
        }

        let mut slot = match search.reused {
            Some(mut slot) => {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                slot.transition(ImageState::Current);
                slot
            }
            None => {
                let image = self.factory.allocate(size)?;
                let id = ImageId(self.next_image_id.fetch_add(1, Ordering::Relaxed));
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                log::debug!("allocated {id} ({}x{})", size.width, size.height);
                FrameSlot::new(id, image)
            }
        };

        if let Err(err) = slot.image.setup() {
            log::warn!("setup of {} failed: {err}", slot.id);
            futures::executor::block_on(slot.dispose());
            return Err(err);
        }
        Ok(slot)
    }

    /// ### English
    /// Stores `slot` as current unless disposal has begun, in which case it is disposed instead.
    ///
    /// ### 中文
    /// 将 `slot` 设为当前缓冲；若销毁已开始，则改为释放它。
    fn install_current(&self, slot: FrameSlot<I>) -> Result<()> {
        let mut current = self.current.lock();
        if self.state.load(Ordering::Acquire) != QUEUE_OPEN {
            drop(current);
            futures::executor::block_on(slot.dispose());
            return Err(FrameQueueError::QueueClosed);
        }
        *current = Some(slot);
        Ok(())
    }
}
