#![allow(dead_code)]

use std::future::{self, Future};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

use dpi::PhysicalSize;
use parking_lot::Mutex;
use xian_frame_queue::{
    CompositionSurface, ConsumerContext, DisplayOutcome, FrameBufferQueue, FrameImage,
    FrameQueueConfig, FrameQueueError, FrameQueueInit, GpuInterop, ImportedHandle, Result,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Allocated(u32),
    Setup(u32),
    Imported(u32),
    Presented(u32),
    HandleDisposed(u32),
    Reset(u32),
    Disposed(u32),
}

/// Holds mock disposals pending until `open` is called.
#[derive(Default)]
pub struct Gate {
    open: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

impl Gate {
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        for waker in self.wakers.lock().drain(..) {
            waker.wake();
        }
    }

    pub fn wait(self: Arc<Self>) -> impl Future<Output = ()> + Send + 'static {
        future::poll_fn(move |cx| {
            if self.open.load(Ordering::SeqCst) {
                return Poll::Ready(());
            }
            self.wakers.lock().push(cx.waker().clone());
            if self.open.load(Ordering::SeqCst) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}

/// Records everything mock images, handles and surfaces do.
#[derive(Default)]
pub struct Ledger {
    events: Mutex<Vec<Event>>,
    import_threads: Mutex<Vec<Option<String>>>,
    next_serial: AtomicU32,
    disposal_gate: Mutex<Option<Arc<Gate>>>,
}

impl Ledger {
    /// Makes every disposal started from now on wait for the returned gate.
    pub fn hold_disposals(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.disposal_gate.lock() = Some(gate.clone());
        gate
    }

    fn gated(&self) -> Option<Arc<Gate>> {
        self.disposal_gate.lock().clone()
    }

    pub fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|event| matches(event)).count()
    }

    pub fn disposed_images(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Disposed(serial) => Some(*serial),
                _ => None,
            })
            .collect()
    }

    pub fn allocated(&self) -> u32 {
        self.next_serial.load(Ordering::Acquire)
    }

    pub fn import_threads(&self) -> Vec<Option<String>> {
        self.import_threads.lock().clone()
    }
}

#[derive(Default)]
pub struct MockInterop {
    pub no_sharing: bool,
    pub fail_imports: AtomicBool,
}

impl GpuInterop for MockInterop {
    fn supports_texture_sharing(&self) -> bool {
        !self.no_sharing
    }
}

pub struct MockImage {
    pub serial: u32,
    size: PhysicalSize<u32>,
    ledger: Arc<Ledger>,
}

impl FrameImage for MockImage {
    type Interop = MockInterop;
    type Handle = MockHandle;

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn setup(&mut self) -> Result<()> {
        self.ledger.record(Event::Setup(self.serial));
        Ok(())
    }

    fn import(&self, interop: &MockInterop) -> Result<MockHandle> {
        if interop.fail_imports.load(Ordering::Acquire) {
            return Err(FrameQueueError::Backend("import refused".to_string()));
        }
        self.ledger
            .import_threads
            .lock()
            .push(thread::current().name().map(str::to_string));
        self.ledger.record(Event::Imported(self.serial));
        Ok(MockHandle {
            serial: self.serial,
            ledger: self.ledger.clone(),
        })
    }

    fn reset(&mut self) {
        self.ledger.record(Event::Reset(self.serial));
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        let gate = self.ledger.gated();
        async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            self.ledger.record(Event::Disposed(self.serial))
        }
    }
}

pub struct MockHandle {
    pub serial: u32,
    ledger: Arc<Ledger>,
}

impl ImportedHandle for MockHandle {
    fn import_completed(&self) -> impl Future<Output = Result<()>> + Send {
        future::ready(Ok(()))
    }

    fn dispose(self) -> impl Future<Output = ()> + Send + 'static {
        let gate = self.ledger.gated();
        async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            self.ledger.record(Event::HandleDisposed(self.serial))
        }
    }
}

#[derive(Default)]
pub struct MockSurface {
    pub presented: Mutex<Vec<u32>>,
    pub fail: AtomicBool,
}

impl MockSurface {
    pub fn presented(&self) -> Vec<u32> {
        self.presented.lock().clone()
    }
}

impl CompositionSurface<MockHandle> for MockSurface {
    fn update(&self, handle: &MockHandle) -> impl Future<Output = Result<()>> {
        let result = if self.fail.load(Ordering::Acquire) {
            Err(FrameQueueError::SurfaceUpdate("surface lost".to_string()))
        } else {
            handle.ledger.record(Event::Presented(handle.serial));
            self.presented.lock().push(handle.serial);
            Ok(())
        };
        future::ready(result)
    }
}

pub struct Harness {
    pub queue: Arc<FrameBufferQueue<MockImage>>,
    pub ledger: Arc<Ledger>,
    pub interop: Arc<MockInterop>,
    pub consumer: ConsumerContext,
    pub surface: Arc<MockSurface>,
}

pub fn mock_init(
    ledger: &Arc<Ledger>,
    interop: Arc<MockInterop>,
    consumer: ConsumerContext,
) -> FrameQueueInit<MockImage> {
    let factory_ledger = ledger.clone();
    FrameQueueInit::new(
        interop,
        move |size: PhysicalSize<u32>| -> Result<MockImage> {
            let serial = factory_ledger.next_serial.fetch_add(1, Ordering::AcqRel) + 1;
            factory_ledger.record(Event::Allocated(serial));
            Ok(MockImage {
                serial,
                size,
                ledger: factory_ledger.clone(),
            })
        },
        consumer,
    )
}

pub fn harness(config: FrameQueueConfig) -> Harness {
    init_logging();
    let ledger = Arc::new(Ledger::default());
    let interop = Arc::new(MockInterop::default());
    let consumer = ConsumerContext::spawn("test-consumer").unwrap();
    let init = mock_init(&ledger, interop.clone(), consumer.clone()).with_config(config);
    Harness {
        queue: Arc::new(FrameBufferQueue::new(init).unwrap()),
        ledger,
        interop,
        consumer,
        surface: Arc::new(MockSurface::default()),
    }
}

impl Harness {
    /// Runs `display_next` on the consumer context.
    pub fn display(&self) -> Result<DisplayOutcome> {
        let queue = self.queue.clone();
        let surface = self.surface.clone();
        self.consumer
            .invoke_async(move || async move { queue.display_next(surface.as_ref()).await })?
    }

    pub fn swap(&self, width: u32, height: u32) -> Result<()> {
        self.queue.swap_buffers(PhysicalSize::new(width, height))
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.consumer.shutdown();
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
