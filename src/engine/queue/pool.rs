//! ### English
//! Pending pool: displayed images waiting to become current again.
//!
//! ### 中文
//! 待复用池：显示完毕、等待再次成为当前缓冲的图像。
use dpi::PhysicalSize;
use parking_lot::Mutex;

use crate::engine::image::{FrameImage, ImageState};

use super::FrameSlot;

struct PoolEntries<I> {
    slots: Vec<FrameSlot<I>>,
    closed: bool,
}

/// ### English
/// Result of one pool scan.
///
/// ### 中文
/// 一次池扫描的结果。
pub(super) struct PoolSearch<I> {
    /// ### English
    /// Same-size image handed back for reuse, if the pool could spare one.
    ///
    /// ### 中文
    /// 池可以让出时返回的同尺寸图像。
    pub(super) reused: Option<FrameSlot<I>>,
    /// ### English
    /// Stale-size images removed by the scan; the caller disposes them.
    ///
    /// ### 中文
    /// 扫描中移除的过期尺寸图像；由调用方负责释放。
    pub(super) evicted: Vec<FrameSlot<I>>,
}

pub(super) struct PendingPool<I> {
    entries: Mutex<PoolEntries<I>>,
}

impl<I: FrameImage> PendingPool<I> {
    pub(super) fn new() -> Self {
        Self {
            entries: Mutex::new(PoolEntries {
                slots: Vec::new(),
                closed: false,
            }),
        }
    }

    /// ### English
    /// Scans the whole pool for `size`.
    ///
    /// Every entry of another size is evicted. Among same-size entries, the first one found is
    /// returned only when at least two exist; a lone same-size entry stays in the pool because the
    /// surface is most likely still showing it.
    ///
    /// #### Parameters
    /// - `size`: Size requested by the producer.
    ///
    /// ### 中文
    /// 按 `size` 扫描整个池。
    ///
    /// 所有尺寸不同的条目都会被逐出。同尺寸条目中，只有存在至少两个时才返回最先找到的那个；
    /// 仅有一个同尺寸条目时保留在池中，因为表面很可能仍在显示它。
    ///
    /// #### 参数
    /// - `size`：生产者请求的尺寸。
    pub(super) fn search(&self, size: PhysicalSize<u32>) -> PoolSearch<I> {
        let mut entries = self.entries.lock();
        let (mut matching, evicted): (Vec<_>, Vec<_>) = entries
            .slots
            .drain(..)
            .partition(|slot| slot.image.size() == size);

        let reused = if matching.len() >= 2 {
            Some(matching.remove(0))
        } else {
            None
        };
        entries.slots = matching;

        PoolSearch { reused, evicted }
    }

    /// ### English
    /// Returns a displayed image to the pool. Hands it back when the pool is closed.
    ///
    /// ### 中文
    /// 将显示完毕的图像放回池中。池已关闭时原样交还。
    pub(super) fn recycle(&self, mut slot: FrameSlot<I>) -> Result<(), FrameSlot<I>> {
        let mut entries = self.entries.lock();
        if entries.closed {
            return Err(slot);
        }
        slot.transition(ImageState::PendingReuse);
        entries.slots.push(slot);
        Ok(())
    }

    /// ### English
    /// Closes the pool and takes every entry out of it.
    ///
    /// ### 中文
    /// 关闭池并取出全部条目。
    pub(super) fn drain(&self) -> Vec<FrameSlot<I>> {
        let mut entries = self.entries.lock();
        entries.closed = true;
        std::mem::take(&mut entries.slots)
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().slots.len()
    }
}
