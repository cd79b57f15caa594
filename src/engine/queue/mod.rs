//! ### English
//! Frame-buffer exchange queue.
//!
//! The producer thread calls `swap_buffers` once per frame; the consumer context calls
//! `display_next` once per display tick. Every image the queue owns sits in exactly one place:
//! the current slot, the import queue, the pending pool, or nowhere (disposed).
//!
//! ### 中文
//! 帧缓冲交换队列。
//!
//! 生产者线程每帧调用一次 `swap_buffers`；消费者上下文每个显示 tick 调用一次
//! `display_next`。队列持有的每个图像只会位于一处：当前槽位、导入队列、待复用池，或已释放。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use futures::future::join_all;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::engine::config::FrameQueueConfig;
use crate::engine::consumer::ConsumerContext;
use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::{FrameImage, ImageFactory, ImageId, ImageState};
use crate::engine::vsync::VsyncSource;

mod display;
mod import_queue;
mod init;
mod pool;
mod swap;
mod teardown;

pub use init::FrameQueueInit;

use import_queue::ImportQueue;
use pool::PendingPool;

pub(crate) const QUEUE_OPEN: u8 = 0;
pub(crate) const QUEUE_DRAINING: u8 = 1;
pub(crate) const QUEUE_DISPOSED: u8 = 2;

/// ### English
/// An owned image plus its queue-side bookkeeping.
///
/// ### 中文
/// 被持有的图像及其在队列侧的记账信息。
pub(crate) struct FrameSlot<I> {
    pub(crate) id: ImageId,
    pub(crate) image: I,
    pub(crate) state: ImageState,
}

impl<I> FrameSlot<I> {
    pub(crate) fn new(id: ImageId, image: I) -> Self {
        Self {
            id,
            image,
            state: ImageState::Current,
        }
    }

    #[inline]
    pub(crate) fn transition(&mut self, next: ImageState) {
        log::trace!("{}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

impl<I: FrameImage> FrameSlot<I> {
    pub(crate) async fn dispose(mut self) {
        self.transition(ImageState::Disposed);
        self.image.dispose().await;
    }
}

/// ### English
/// An image waiting in the import queue together with its consumer-side handle.
///
/// ### 中文
/// 在导入队列中等待的图像及其消费者侧句柄。
pub(crate) struct ImportedFrame<I: FrameImage> {
    pub(crate) slot: FrameSlot<I>,
    pub(crate) handle: I::Handle,
}

/// ### English
/// What one `display_next` call did.
///
/// ### 中文
/// 一次 `display_next` 调用的结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// ### English
    /// Nothing was queued; the surface was not touched.
    ///
    /// ### 中文
    /// 队列为空；未触碰表面。
    Idle,
    /// ### English
    /// The oldest queued frame was handed to the surface and its image returned to the pool.
    ///
    /// ### 中文
    /// 最旧的排队帧已交给表面，其图像已回到待复用池。
    Displayed { image: ImageId },
}

/// ### English
/// Snapshot of the queue's lifetime counters.
///
/// ### 中文
/// 队列累计计数器的快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameQueueStats {
    /// ### English
    /// Images created by the factory.
    ///
    /// ### 中文
    /// 由工厂创建的图像数量。
    pub allocated: u64,
    /// ### English
    /// Swaps served by a same-size spare from the pending pool.
    ///
    /// ### 中文
    /// 由待复用池中同尺寸备用图像满足的交换次数。
    pub reused: u64,
    /// ### English
    /// Pooled images disposed because their size no longer matched.
    ///
    /// ### 中文
    /// 因尺寸不再匹配而被释放的池内图像数量。
    pub evicted: u64,
    /// ### English
    /// Frames presented by `display_next`.
    ///
    /// ### 中文
    /// `display_next` 呈现的帧数。
    pub displayed: u64,
    /// ### English
    /// `display_next` calls that found the import queue empty.
    ///
    /// ### 中文
    /// `display_next` 发现导入队列为空的次数。
    pub idle_ticks: u64,
}

#[derive(Default)]
struct StatsCounters {
    allocated: AtomicU64,
    reused: AtomicU64,
    evicted: AtomicU64,
    displayed: AtomicU64,
    idle_ticks: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> FrameQueueStats {
        FrameQueueStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            displayed: self.displayed.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
        }
    }
}

/// ### English
/// Rotating pool of images exchanged between one producer thread and one consumer context.
///
/// Share it behind an `Arc`; `dispose().await` must run before the last reference is dropped.
///
/// ### 中文
/// 在单个生产者线程与单个消费者上下文之间轮转交换的图像池。
///
/// 通过 `Arc` 共享；最后一个引用释放前必须先 `dispose().await`。
pub struct FrameBufferQueue<I: FrameImage> {
    interop: Arc<I::Interop>,
    factory: Box<dyn ImageFactory<I>>,
    consumer: ConsumerContext,
    vsync_source: Option<Arc<dyn VsyncSource>>,
    vsync_enabled: AtomicBool,
    vsync_timeout: std::time::Duration,
    /// ### English
    /// Serialises `swap_buffers` callers; never taken by the consumer side.
    ///
    /// ### 中文
    /// 串行化 `swap_buffers` 调用方；消费者侧从不获取该锁。
    producer: Mutex<()>,
    current: Mutex<Option<FrameSlot<I>>>,
    pool: PendingPool<I>,
    imports: ImportQueue<ImportedFrame<I>>,
    /// ### English
    /// `QUEUE_OPEN` / `QUEUE_DRAINING` / `QUEUE_DISPOSED`.
    ///
    /// ### 中文
    /// `QUEUE_OPEN` / `QUEUE_DRAINING` / `QUEUE_DISPOSED`。
    state: AtomicU8,
    next_image_id: AtomicU64,
    stats: StatsCounters,
}

impl<I: FrameImage> FrameBufferQueue<I> {
    pub(crate) fn from_parts(
        interop: Arc<I::Interop>,
        factory: Box<dyn ImageFactory<I>>,
        consumer: ConsumerContext,
        config: FrameQueueConfig,
        vsync_source: Option<Arc<dyn VsyncSource>>,
    ) -> Self {
        Self {
            interop,
            factory,
            consumer,
            vsync_source,
            vsync_enabled: AtomicBool::new(config.vsync),
            vsync_timeout: config.vsync_timeout,
            producer: Mutex::new(()),
            current: Mutex::new(None),
            pool: PendingPool::new(),
            imports: ImportQueue::new(config.import_capacity),
            state: AtomicU8::new(QUEUE_OPEN),
            next_image_id: AtomicU64::new(1),
            stats: StatsCounters::default(),
        }
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.state.load(Ordering::Acquire) == QUEUE_OPEN {
            Ok(())
        } else {
            Err(FrameQueueError::QueueClosed)
        }
    }

    /// ### English
    /// The image the producer is rendering into.
    ///
    /// Producer-thread API. Fails with `NoCurrentBuffer` before the first `swap_buffers`.
    ///
    /// ### 中文
    /// 生产者正在渲染的图像。
    ///
    /// 生产者线程 API。首次 `swap_buffers` 之前调用返回 `NoCurrentBuffer`。
    pub fn current_buffer(&self) -> Result<MappedMutexGuard<'_, I>> {
        self.ensure_open()?;
        MutexGuard::try_map(self.current.lock(), |current| {
            current.as_mut().map(|slot| &mut slot.image)
        })
        .map_err(|_| {
            log::error!("current_buffer() called before the first swap_buffers()");
            FrameQueueError::NoCurrentBuffer
        })
    }

    pub fn current_image_id(&self) -> Option<ImageId> {
        self.current.lock().as_ref().map(|slot| slot.id)
    }

    /// ### English
    /// Frames waiting for display.
    ///
    /// ### 中文
    /// 等待显示的帧数。
    pub fn queued_len(&self) -> usize {
        self.imports.len()
    }

    pub fn import_capacity(&self) -> usize {
        self.imports.capacity()
    }

    /// ### English
    /// Images parked in the pending pool.
    ///
    /// ### 中文
    /// 待复用池中的图像数量。
    pub fn pending_len(&self) -> usize {
        self.pool.len()
    }

    pub fn stats(&self) -> FrameQueueStats {
        self.stats.snapshot()
    }

    pub fn consumer(&self) -> &ConsumerContext {
        &self.consumer
    }

    pub fn interop(&self) -> &Arc<I::Interop> {
        &self.interop
    }

    /// ### English
    /// Toggles waiting for vertical sync before each export.
    ///
    /// Fails with `InvalidConfig` when enabling without a vsync source.
    ///
    /// ### 中文
    /// 开关每次导出前的垂直同步等待。
    ///
    /// 没有 vsync 源时开启会返回 `InvalidConfig`。
    pub fn set_vsync(&self, enabled: bool) -> Result<()> {
        if enabled && self.vsync_source.is_none() {
            return Err(FrameQueueError::InvalidConfig(
                "vsync enabled without a vsync source".to_string(),
            ));
        }
        self.vsync_enabled.store(enabled, Ordering::Release);
        Ok(())
    }

    pub fn vsync_enabled(&self) -> bool {
        self.vsync_enabled.load(Ordering::Acquire)
    }

    /// ### English
    /// Whether disposal has started.
    ///
    /// ### 中文
    /// 是否已开始销毁。
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) != QUEUE_OPEN
    }

    /// ### English
    /// Disposes a batch of slots concurrently and waits for all of them.
    ///
    /// ### 中文
    /// 并发释放一批槽位并等待全部完成。
    fn dispose_slots_blocking(slots: Vec<FrameSlot<I>>) {
        if slots.is_empty() {
            return;
        }
        futures::executor::block_on(join_all(slots.into_iter().map(FrameSlot::dispose)));
    }
}
