/// ### English
/// Frame exchange internals (image backends, pending pool, import queue, consumer context, vsync).
///
/// ### 中文
/// 帧交换的内部模块（图像后端、待复用池、导入队列、消费者上下文、vsync 等）。
pub(crate) mod backoff;
pub mod config;
pub mod consumer;
pub mod error;
pub mod image;
pub mod interop;
pub mod present;
pub mod producer;
pub mod queue;
pub mod vsync;
