//! ### English
//! Consumer context: the single thread that imports frames, runs `display_next` and talks to
//! the compositing surface.
//!
//! Work is marshalled onto it through a task channel. A context is either a dedicated thread
//! (`spawn`) or a host-owned thread bound with `bind_current_thread` and driven by a
//! `ConsumerPump`.
//!
//! ### 中文
//! 消费者上下文：负责导入帧、执行 `display_next` 并与合成表面交互的唯一线程。
//!
//! 工作通过任务通道投递到该线程。上下文可以是独立线程（`spawn`），也可以是通过
//! `bind_current_thread` 绑定、由 `ConsumerPump` 驱动的宿主线程。
use std::cell::Cell;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};
use parking_lot::Mutex;

use crate::engine::error::{FrameQueueError, Result};

/// ### English
/// How long `spawn` waits for the new thread to report ready.
///
/// ### 中文
/// `spawn` 等待新线程就绪的时长。
const CONTEXT_INIT_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// ### English
    /// Id of the context bound to this thread (`0` = none).
    ///
    /// ### 中文
    /// 绑定到当前线程的上下文 id（`0` 表示无）。
    static CURRENT_CONTEXT: Cell<u64> = const { Cell::new(0) };
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// ### English
/// Messages drained by the consumer thread.
///
/// ### 中文
/// 由消费者线程 drain 的消息。
enum Message {
    Run(Task),
    /// ### English
    /// Stops the task loop; queued tasks behind it are dropped unrun.
    ///
    /// ### 中文
    /// 停止任务循环；排在其后的任务不会执行而被直接丢弃。
    Shutdown,
}

struct ContextInner {
    id: u64,
    name: String,
    tasks: Sender<Message>,
    shut_down: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// ### English
/// Cloneable handle to a consumer context.
///
/// ### 中文
/// 消费者上下文的可克隆句柄。
#[derive(Clone)]
pub struct ConsumerContext {
    inner: Arc<ContextInner>,
}

impl ConsumerContext {
    /// ### English
    /// Spawns a dedicated consumer thread and blocks until it is running.
    ///
    /// #### Parameters
    /// - `name`: Thread name, also used in log messages.
    ///
    /// ### 中文
    /// 创建独立的消费者线程，并阻塞等待其开始运行。
    ///
    /// #### 参数
    /// - `name`：线程名，同时用于日志。
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tasks, receiver) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                CURRENT_CONTEXT.with(|current| current.set(id));
                let _ = ready_tx.send(());
                run_task_loop(receiver);
                CURRENT_CONTEXT.with(|current| current.set(0));
            })
            .map_err(|err| {
                FrameQueueError::Backend(format!("failed to spawn consumer thread {name:?}: {err}"))
            })?;

        if ready_rx.recv_timeout(CONTEXT_INIT_TIMEOUT).is_err() {
            let _ = tasks.send(Message::Shutdown);
            let _ = thread.join();
            return Err(FrameQueueError::ConsumerGone);
        }

        log::info!("consumer context {name:?} started on a dedicated thread");
        Ok(Self::from_parts(id, name, tasks, Some(thread)))
    }

    /// ### English
    /// Makes the calling thread the consumer context. The host keeps driving it through the
    /// returned pump (e.g. from its UI event loop).
    ///
    /// Fails with `InvalidConfig` when the thread already hosts a context.
    ///
    /// ### 中文
    /// 将调用线程设为消费者上下文。宿主通过返回的 pump 持续驱动它（例如在 UI 事件循环中）。
    ///
    /// 若当前线程已承载某个上下文，返回 `InvalidConfig`。
    pub fn bind_current_thread(name: impl Into<String>) -> Result<(Self, ConsumerPump)> {
        if CURRENT_CONTEXT.with(Cell::get) != 0 {
            return Err(FrameQueueError::InvalidConfig(
                "calling thread already hosts a consumer context".to_string(),
            ));
        }

        let name = name.into();
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tasks, receiver) = channel::unbounded();
        CURRENT_CONTEXT.with(|current| current.set(id));

        log::info!("consumer context {name:?} bound to the calling thread");
        let context = Self::from_parts(id, name, tasks, None);
        let pump = ConsumerPump {
            id,
            receiver: Some(receiver),
            _not_send: PhantomData,
        };
        Ok((context, pump))
    }

    fn from_parts(
        id: u64,
        name: String,
        tasks: Sender<Message>,
        thread: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id,
                name,
                tasks,
                shut_down: AtomicBool::new(false),
                thread: Mutex::new(thread),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// ### English
    /// Whether the calling thread is this context.
    ///
    /// ### 中文
    /// 调用线程是否就是该上下文。
    #[inline]
    pub fn is_current(&self) -> bool {
        CURRENT_CONTEXT.with(Cell::get) == self.inner.id
    }

    /// ### English
    /// Fails with `WrongContext` (logged at error level) when called off this context.
    ///
    /// #### Parameters
    /// - `operation`: Name of the guarded operation, for the log message.
    ///
    /// ### 中文
    /// 若不在该上下文中调用，则返回 `WrongContext`（并以 error 级别记录日志）。
    ///
    /// #### 参数
    /// - `operation`：被保护操作的名称，用于日志。
    pub fn check_access(&self, operation: &str) -> Result<()> {
        if self.is_current() {
            return Ok(());
        }
        log::error!(
            "{operation} called from thread {:?}, outside consumer context {:?}",
            thread::current().name().unwrap_or("<unnamed>"),
            self.inner.name
        );
        Err(FrameQueueError::WrongContext)
    }

    /// ### English
    /// Runs `f` on the context and waits for its result. Runs inline when already on the context.
    ///
    /// ### 中文
    /// 在上下文中执行 `f` 并等待结果。若已处于该上下文则直接内联执行。
    pub fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(FrameQueueError::ConsumerGone);
        }

        let (reply_tx, reply_rx) = channel::bounded(1);
        self.inner
            .tasks
            .send(Message::Run(Box::new(move || {
                let _ = reply_tx.send(f());
            })))
            .map_err(|_| FrameQueueError::ConsumerGone)?;

        // The reply sender is dropped unrun if the context stops first.
        reply_rx.recv().map_err(|_| FrameQueueError::ConsumerGone)
    }

    /// ### English
    /// Like `invoke`, but `f` builds a future that is driven to completion on the context.
    /// The future itself never leaves the consumer thread and need not be `Send`.
    ///
    /// ### 中文
    /// 与 `invoke` 相同，但 `f` 构造一个 future，并在上下文中驱动其完成。
    /// 该 future 不会离开消费者线程，因此无需 `Send`。
    pub fn invoke_async<R, F, Fut>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R>,
        R: Send + 'static,
    {
        self.invoke(move || futures::executor::block_on(f()))
    }

    /// ### English
    /// Stops the task loop. Tasks not yet started are dropped, and later `invoke` calls fail
    /// with `ConsumerGone`. Joins the dedicated thread unless called from it.
    ///
    /// ### 中文
    /// 停止任务循环。尚未开始的任务会被丢弃，之后的 `invoke` 调用返回 `ConsumerGone`。
    /// 若不是在专用线程内部调用，则会 join 该线程。
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.tasks.send(Message::Shutdown);

        if self.is_current() {
            return;
        }
        if let Some(thread) = self.inner.thread.lock().take() {
            let _ = thread.join();
        }
        log::info!("consumer context {:?} shut down", self.inner.name);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

fn run_task_loop(receiver: Receiver<Message>) {
    for message in receiver.iter() {
        match message {
            Message::Run(task) => task(),
            Message::Shutdown => break,
        }
    }
}

/// ### English
/// Drives a consumer context bound to a host-owned thread. Not `Send`: it must stay on the bound
/// thread.
///
/// ### 中文
/// 驱动绑定到宿主线程的消费者上下文。非 `Send`：必须留在被绑定的线程上。
pub struct ConsumerPump {
    id: u64,
    /// ### English
    /// Dropped on shutdown so pending and future senders observe a disconnected channel.
    ///
    /// ### 中文
    /// 在 shutdown 时被丢弃，使挂起及后续发送方观察到通道已断开。
    receiver: Option<Receiver<Message>>,
    _not_send: PhantomData<*const ()>,
}

impl ConsumerPump {
    /// ### English
    /// Runs every task queued so far without blocking and returns how many ran.
    ///
    /// ### 中文
    /// 非阻塞地执行当前已排队的全部任务，并返回执行数量。
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Some(receiver) = &self.receiver {
            match receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    ran += 1;
                }
                Ok(Message::Shutdown) => self.receiver = None,
                Err(_) => break,
            }
        }
        ran
    }

    /// ### English
    /// Blocks running tasks until the context is shut down or every handle is dropped.
    ///
    /// ### 中文
    /// 阻塞执行任务，直到上下文被 shutdown 或所有句柄都被丢弃。
    pub fn run_until_shutdown(mut self) {
        while let Some(receiver) = &self.receiver {
            match receiver.recv() {
                Ok(Message::Run(task)) => task(),
                Ok(Message::Shutdown) | Err(_) => self.receiver = None,
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.receiver.is_none()
    }
}

impl Drop for ConsumerPump {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|current| {
            if current.get() == self.id {
                current.set(0);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_runs_on_the_consumer_thread() {
        let context = ConsumerContext::spawn("consumer-test").unwrap();
        assert!(!context.is_current());

        let probe = context.clone();
        let (on_context, name) = context
            .invoke(move || {
                (
                    probe.is_current(),
                    thread::current().name().map(str::to_string),
                )
            })
            .unwrap();
        assert!(on_context);
        assert_eq!(name.as_deref(), Some("consumer-test"));
        context.shutdown();
    }

    #[test]
    fn nested_invoke_runs_inline() {
        let context = ConsumerContext::spawn("consumer-nested").unwrap();
        let inner = context.clone();
        let value = context
            .invoke(move || inner.invoke(|| 41 + 1))
            .unwrap()
            .unwrap();
        assert_eq!(value, 42);
        context.shutdown();
    }

    #[test]
    fn check_access_rejects_other_threads() {
        let context = ConsumerContext::spawn("consumer-access").unwrap();
        assert!(matches!(
            context.check_access("display_next"),
            Err(FrameQueueError::WrongContext)
        ));

        let probe = context.clone();
        assert!(
            context
                .invoke(move || probe.check_access("display_next").is_ok())
                .unwrap()
        );
        context.shutdown();
    }

    #[test]
    fn invoke_after_shutdown_reports_consumer_gone() {
        let context = ConsumerContext::spawn("consumer-gone").unwrap();
        context.shutdown();
        context.shutdown();
        assert!(context.is_shut_down());
        assert!(matches!(
            context.invoke(|| ()),
            Err(FrameQueueError::ConsumerGone)
        ));
    }

    #[test]
    fn invoke_async_drives_the_future_on_the_context() {
        let context = ConsumerContext::spawn("consumer-async").unwrap();
        let probe = context.clone();
        let on_context = context
            .invoke_async(move || async move { probe.is_current() })
            .unwrap();
        assert!(on_context);
        context.shutdown();
    }

    #[test]
    fn bound_thread_is_driven_by_its_pump() {
        let (context, mut pump) = ConsumerContext::bind_current_thread("host-ui").unwrap();
        assert!(context.is_current());
        assert!(ConsumerContext::bind_current_thread("second").is_err());

        let remote = context.clone();
        let caller = thread::spawn(move || remote.invoke(|| 7));

        let mut ran = 0;
        while ran == 0 {
            ran += pump.run_pending();
            thread::yield_now();
        }
        assert_eq!(caller.join().unwrap().unwrap(), 7);

        context.shutdown();
        assert_eq!(pump.run_pending(), 0);
        assert!(pump.is_shut_down());
        drop(pump);
        assert!(!context.is_current());
    }
}
