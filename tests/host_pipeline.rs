mod common;

use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;
use futures::executor::block_on;
use xian_frame_queue::{
    CompositionLoop, ConsumerContext, FixedIntervalVsync, FrameBufferQueue, FrameImage,
    FrameProducer, FrameQueueError, FrameQueueInit, HostImage, HostInterop, HostSurface,
    RenderTarget, Result,
};

use common::{init_logging, wait_until};

/// Paints each finished frame with a solid color derived from its frame number.
#[derive(Default)]
struct PaintTarget {
    finished: u8,
    attached: Vec<PhysicalSize<u32>>,
    max_width: Option<u32>,
}

impl RenderTarget<HostImage> for PaintTarget {
    fn finish_frame(&mut self, image: &HostImage) -> Result<()> {
        self.finished += 1;
        image.fill([self.finished, 0, 0, 255]);
        Ok(())
    }

    fn attach(&mut self, image: &HostImage) -> Result<()> {
        if self.max_width.is_some_and(|max| image.size().width > max) {
            return Err(FrameQueueError::FramebufferIncomplete { status: 0x8CD6 });
        }
        self.attached.push(image.size());
        Ok(())
    }
}

fn host_queue(consumer: &ConsumerContext, interop: &Arc<HostInterop>) -> Arc<FrameBufferQueue<HostImage>> {
    let init = FrameQueueInit::new(interop.clone(), HostImage::new, consumer.clone());
    Arc::new(FrameBufferQueue::new(init).unwrap())
}

#[test]
fn frames_flow_from_producer_to_host_surface() {
    init_logging();
    let consumer = ConsumerContext::spawn("host-consumer").unwrap();
    let interop = Arc::new(HostInterop::new());
    let queue = host_queue(&consumer, &interop);
    let surface = Arc::new(HostSurface::new());

    let mut producer = FrameProducer::new(
        queue.clone(),
        PaintTarget::default(),
        PhysicalSize::new(3, 2),
    );
    for _ in 0..5 {
        producer.swap_buffers().unwrap();
    }
    assert_eq!(producer.target().finished, 4);
    assert_eq!(producer.target().attached.len(), 5);

    let composition = CompositionLoop::spawn(
        queue.clone(),
        surface.clone(),
        Arc::new(FixedIntervalVsync::from_fps(500)),
    )
    .unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        surface.presented_frames() == 4 && queue.queued_len() == 0
    }));
    composition.stop().unwrap();

    let frame = surface.latest_frame().unwrap();
    assert_eq!(frame.size, PhysicalSize::new(3, 2));
    assert_eq!(frame.sequence, 4);
    assert_eq!(&frame.pixels[..4], &[4, 0, 0, 255]);
    assert_eq!(interop.live_imports(), 0);

    block_on(queue.dispose());
    assert!(queue.is_disposed());
    consumer.shutdown();
}

#[test]
fn viewport_is_clamped_to_one_pixel() {
    init_logging();
    let consumer = ConsumerContext::spawn("clamp-consumer").unwrap();
    let interop = Arc::new(HostInterop::new());
    let queue = host_queue(&consumer, &interop);

    let mut producer = FrameProducer::new(queue.clone(), PaintTarget::default(), PhysicalSize::new(0, 0));
    assert_eq!(producer.viewport_size(), PhysicalSize::new(1, 1));

    producer.set_viewport_size(PhysicalSize::new(0, 7));
    assert_eq!(producer.viewport_size(), PhysicalSize::new(1, 7));
    producer.swap_buffers().unwrap();
    assert_eq!(queue.current_buffer().unwrap().size(), PhysicalSize::new(1, 7));
    assert_eq!(queue.current_buffer().unwrap().pixels().len(), 7 * 4);

    block_on(queue.dispose());
    consumer.shutdown();
}

#[test]
fn attach_failure_aborts_the_render_session() {
    init_logging();
    let consumer = ConsumerContext::spawn("attach-consumer").unwrap();
    let interop = Arc::new(HostInterop::new());
    let queue = host_queue(&consumer, &interop);

    let target = PaintTarget {
        max_width: Some(64),
        ..PaintTarget::default()
    };
    let mut producer = FrameProducer::new(queue.clone(), target, PhysicalSize::new(32, 32));
    producer.swap_buffers().unwrap();

    producer.set_viewport_size(PhysicalSize::new(128, 32));
    assert!(matches!(
        producer.swap_buffers(),
        Err(FrameQueueError::FramebufferIncomplete { status: 0x8CD6 })
    ));
    assert_eq!(producer.target().attached, vec![PhysicalSize::new(32, 32)]);
    assert_eq!(queue.queued_len(), 1);

    block_on(queue.dispose());
    consumer.shutdown();
}
