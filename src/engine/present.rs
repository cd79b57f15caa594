//! ### English
//! Composition loop: calls `display_next` on the consumer context once per clock tick.
//!
//! ### 中文
//! 合成循环：每个时钟 tick 在消费者上下文中调用一次 `display_next`。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::error::{FrameQueueError, Result};
use crate::engine::image::FrameImage;
use crate::engine::interop::CompositionSurface;
use crate::engine::queue::FrameBufferQueue;
use crate::engine::vsync::VsyncSource;

/// ### English
/// Upper bound for one clock wait, so `stop` is observed promptly without ticks.
///
/// ### 中文
/// 单次时钟等待的上限，使得没有 tick 时也能及时响应 `stop`。
const CLOCK_WAIT: Duration = Duration::from_millis(50);

/// ### English
/// Background clock re-arming a composition update on every vertical sync.
///
/// Stops on request, when the queue closes, when the consumer context goes away, or on the first
/// display error (returned from `stop`).
///
/// ### 中文
/// 每次垂直同步时重新发起合成更新的后台时钟。
///
/// 在收到停止请求、队列关闭、消费者上下文消失，或第一次显示出错时停止（错误由 `stop` 返回）。
pub struct CompositionLoop {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl CompositionLoop {
    /// ### English
    /// Starts the loop on its own thread.
    ///
    /// #### Parameters
    /// - `queue`: Queue to display from; `display_next` runs on its consumer context.
    /// - `surface`: Compositing surface receiving each frame.
    /// - `clock`: Tick source pacing the loop.
    ///
    /// ### 中文
    /// 在独立线程上启动循环。
    ///
    /// #### 参数
    /// - `queue`：取帧显示的队列；`display_next` 在其消费者上下文中执行。
    /// - `surface`：接收每一帧的合成表面。
    /// - `clock`：为循环定步的 tick 源。
    pub fn spawn<I, S>(
        queue: Arc<FrameBufferQueue<I>>,
        surface: Arc<S>,
        clock: Arc<dyn VsyncSource>,
    ) -> Result<Self>
    where
        I: FrameImage,
        S: CompositionSurface<I::Handle> + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();

        let thread = thread::Builder::new()
            .name("frame-composition".to_string())
            .spawn(move || run_composition(&queue, &surface, clock.as_ref(), &stop_for_thread))
            .map_err(|err| {
                FrameQueueError::Backend(format!("failed to spawn composition loop: {err}"))
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// ### English
    /// Stops the loop and returns the display error that ended it, if any.
    ///
    /// ### 中文
    /// 停止循环，并返回导致其结束的显示错误（若有）。
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread
            .join()
            .unwrap_or_else(|_| Err(FrameQueueError::Backend("composition loop panicked".to_string())))
    }
}

impl Drop for CompositionLoop {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("composition loop ended with an error: {err}");
        }
    }
}

fn run_composition<I, S>(
    queue: &Arc<FrameBufferQueue<I>>,
    surface: &Arc<S>,
    clock: &dyn VsyncSource,
    stop: &AtomicBool,
) -> Result<()>
where
    I: FrameImage,
    S: CompositionSurface<I::Handle> + Send + Sync + 'static,
{
    log::debug!("composition loop started");
    while !stop.load(Ordering::Acquire) {
        if !clock.wait_for_vsync(CLOCK_WAIT) {
            continue;
        }

        let task_queue = queue.clone();
        let task_surface = surface.clone();
        let displayed = queue
            .consumer()
            .invoke_async(move || async move { task_queue.display_next(task_surface.as_ref()).await });

        match displayed {
            Ok(Ok(_)) => {}
            Ok(Err(FrameQueueError::QueueClosed)) | Err(FrameQueueError::ConsumerGone) => {
                log::debug!("composition loop stopping: queue or consumer closed");
                return Ok(());
            }
            Ok(Err(err)) | Err(err) => {
                log::error!("composition loop stopping on display error: {err}");
                return Err(err);
            }
        }
    }
    log::debug!("composition loop stopped");
    Ok(())
}
