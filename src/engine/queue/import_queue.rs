//! ### English
//! Bounded FIFO between `swap_buffers` (producer) and `display_next` (consumer).
//!
//! ### 中文
//! `swap_buffers`（生产者）与 `display_next`（消费者）之间的有界 FIFO。
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{self as channel, Receiver, SendError, Sender};

use crate::engine::backoff::Backoff;

pub(super) struct ImportQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: usize,
    /// ### English
    /// Producers currently inside `push` (possibly blocked on a full channel).
    ///
    /// ### 中文
    /// 当前位于 `push` 内的生产者数量（可能因通道已满而阻塞）。
    in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl<T> ImportQueue<T> {
    pub(super) fn new(capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// ### English
    /// Enqueues `item`, blocking while the queue is full. Hands the item back when the queue is
    /// closed.
    ///
    /// ### 中文
    /// 入队 `item`，队列已满时阻塞。队列已关闭时原样交还。
    pub(super) fn push(&self, item: T) -> Result<(), T> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(item);
        }
        // SeqCst pairs with `close_and_drain`: either this load sees `closed`, or the closer sees
        // this producer in `in_flight` and keeps draining until it leaves.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::Release);
            return Err(item);
        }

        let result = self.sender.send(item).map_err(|SendError(item)| item);
        self.in_flight.fetch_sub(1, Ordering::Release);
        result
    }

    pub(super) fn try_pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub(super) fn len(&self) -> usize {
        self.receiver.len()
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    /// ### English
    /// Rejects further pushes and returns everything still queued, oldest first.
    ///
    /// Producers blocked on a full queue are released by draining while they finish.
    ///
    /// ### 中文
    /// 拒绝后续 push，并返回仍在队列中的全部条目（最旧的在前）。
    ///
    /// 在阻塞于满队列的生产者完成之前持续 drain，以释放它们。
    pub(super) fn close_and_drain(&self) -> Vec<T> {
        self.closed.store(true, Ordering::SeqCst);

        let mut drained = Vec::new();
        let mut backoff = Backoff::new();
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            drained.extend(self.receiver.try_iter());
            backoff.snooze();
        }
        drained.extend(self.receiver.try_iter());
        drained
    }
}
