//! 与 GPU 设备无关的帧数据与逻辑
//!
//! 帧计数与资源环索引、Halton 抖动序列、上采样器重置检测、光源归一化、
//! 渲染参数双缓冲以及原子样式，都在这里以纯 CPU 逻辑实现，便于单元测试。

pub mod arguments;
pub mod atoms;
pub mod error;
pub mod frame_counter;
pub mod jitter;
pub mod light;
pub mod projection;
pub mod quality;
pub mod render_extent;
pub mod reset_tracker;
pub mod settings;
pub mod time_context;
