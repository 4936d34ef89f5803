//! Halton(2, 3) 抖动序列
//!
//! 每帧把相机光线的起点平移一个亚像素偏移，时域上采样器累积多帧之后，
//! 每个像素内的采样点分布比纯随机更均匀。

/// 抖动序列的周期
pub const JITTER_PERIOD: u64 = 32;

/// Halton 序列的第 `index` 项（index 从 1 开始时结果落在 (0, 1)）
pub fn halton(mut index: u64, base: u64) -> f32 {
    let mut result = 0.0_f32;
    let mut fraction = 1.0_f32;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// 第 `jitter_frame_id` 帧的抖动偏移，范围 `[-0.5, 0.5)²`
///
/// 序号取 `(jitter_frame_id mod 32) + 1`，跳过 Halton 序列的第 0 项（恒为 0）。
#[inline]
pub fn jitter_offset(jitter_frame_id: u64) -> glam::Vec2 {
    let index = (jitter_frame_id % JITTER_PERIOD) + 1;
    glam::vec2(halton(index, 2) - 0.5, halton(index, 3) - 0.5)
}
