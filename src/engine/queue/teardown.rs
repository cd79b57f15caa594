//! ### English
//! Disposal of every resource the queue owns.
//!
//! ### 中文
//! 释放队列持有的全部资源。
use std::sync::atomic::Ordering;

use futures::FutureExt as _;
use futures::future::{BoxFuture, join_all};

use crate::engine::image::FrameImage;
use crate::engine::interop::ImportedHandle;

use super::{FrameBufferQueue, QUEUE_DISPOSED, QUEUE_DRAINING, QUEUE_OPEN};

impl<I: FrameImage> FrameBufferQueue<I> {
    /// ### English
    /// Releases every owned resource exactly once (idempotent).
    ///
    /// Closes the import queue, disposes both members of each queued frame, drains the pending
    /// pool and the current image, then waits for all disposals. `swap_buffers` and
    /// `display_next` fail with `QueueClosed` from the moment this starts.
    ///
    /// ### 中文
    /// 恰好释放一次所有持有的资源（幂等）。
    ///
    /// 关闭导入队列，释放每个排队帧的两部分，drain 待复用池与当前图像，然后等待全部释放完成。
    /// 从开始执行的那一刻起，`swap_buffers` 与 `display_next` 都会返回 `QueueClosed`。
    pub async fn dispose(&self) {
        if self
            .state
            .compare_exchange(
                QUEUE_OPEN,
                QUEUE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let frames = self.imports.close_and_drain();
        let pooled = self.pool.drain();
        let current = self.current.lock().take();

        log::debug!(
            "disposing frame queue: {} queued frame(s), {} pooled image(s), current: {}",
            frames.len(),
            pooled.len(),
            current.is_some()
        );

        let mut disposals: Vec<BoxFuture<'static, ()>> =
            Vec::with_capacity(frames.len() * 2 + pooled.len() + 1);
        for frame in frames {
            disposals.push(frame.handle.dispose().boxed());
            disposals.push(frame.slot.dispose().boxed());
        }
        disposals.extend(pooled.into_iter().map(|slot| slot.dispose().boxed()));
        disposals.extend(current.map(|slot| slot.dispose().boxed()));

        join_all(disposals).await;

        self.state.store(QUEUE_DISPOSED, Ordering::Release);
        log::info!("frame queue disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == QUEUE_DISPOSED
    }
}

impl<I: FrameImage> Drop for FrameBufferQueue<I> {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) == QUEUE_OPEN {
            let held = self.imports.len() + self.pool.len() + usize::from(self.current.get_mut().is_some());
            if held > 0 {
                log::warn!("frame queue dropped without dispose(); {held} image(s) not released");
            }
        }
    }
}
