use std::{fmt::Display, ops::Deref};

/// 中间纹理环中的槽位（A/B）
///
/// 通过 `Deref` 转换为索引 0/1。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSlot {
    A,
    B,
}
impl SurfaceSlot {
    const INDEX: [usize; 2] = [0, 1];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            _ => panic!("Invalid surface slot index: {idx}"),
        }
    }

    /// 另一个槽位，也就是上一帧写入的那一组纹理
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}
impl Deref for SurfaceSlot {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for SurfaceSlot {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// 光源缓冲中的分区（A/B/C）
///
/// 光源环比纹理环多一格，GPU 最多落后 CPU 两帧时也不会覆盖仍在读取的光源数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightBankLabel {
    A,
    B,
    C,
}
impl LightBankLabel {
    const INDEX: [usize; 3] = [0, 1, 2];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => panic!("Invalid light bank index: {idx}"),
        }
    }
}
impl Deref for LightBankLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for LightBankLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "a"),
            Self::B => write!(f, "b"),
            Self::C => write!(f, "c"),
        }
    }
}

/// 一帧开始时确定下来的帧上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub absolute_frame_count: u64,
    pub jitter_frame_id: u64,
}

/// 帧计数器
///
/// 纹理槽位与光源分区都由 `jitter_frame_id` 推导，二者一同前进。
#[derive(Debug, Default, Clone)]
pub struct FrameCounter {
    /// 每次渲染前累加，从 1 开始使用
    jitter_frame_id: u64,
}
// new & init
impl FrameCounter {
    pub fn new() -> Self {
        Self { jitter_frame_id: 0 }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn advance(&mut self) {
        self.jitter_frame_id = self.jitter_frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    pub const SURFACE_RING_SIZE: usize = 2;
    pub const LIGHT_RING_SIZE: usize = 3;

    #[inline]
    pub fn jitter_frame_id(&self) -> u64 {
        self.jitter_frame_id
    }
    #[inline]
    pub const fn surface_slots() -> [SurfaceSlot; Self::SURFACE_RING_SIZE] {
        [SurfaceSlot::A, SurfaceSlot::B]
    }
    #[inline]
    pub const fn light_banks() -> [LightBankLabel; Self::LIGHT_RING_SIZE] {
        [LightBankLabel::A, LightBankLabel::B, LightBankLabel::C]
    }
    #[inline]
    pub fn surface_slot(&self) -> SurfaceSlot {
        SurfaceSlot::from_usize((self.jitter_frame_id % Self::SURFACE_RING_SIZE as u64) as usize)
    }
    /// render index，同时决定光源分区与每帧的参数 buffer
    #[inline]
    pub fn render_index(&self) -> LightBankLabel {
        LightBankLabel::from_usize((self.jitter_frame_id % Self::LIGHT_RING_SIZE as u64) as usize)
    }
    #[inline]
    pub fn frame_context(&self, absolute_frame_count: u64) -> FrameContext {
        FrameContext {
            absolute_frame_count,
            jitter_frame_id: self.jitter_frame_id,
        }
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}{}]", self.jitter_frame_id, self.surface_slot(), self.render_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_slot_alternates() {
        let mut counter = FrameCounter::new();
        let mut slots = vec![];
        for _ in 0..6 {
            counter.advance();
            slots.push(*counter.surface_slot());
        }
        // 第一次渲染使用的 jitter_frame_id 为 1
        assert_eq!(slots, vec![1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_render_index_period_3() {
        let mut counter = FrameCounter::new();
        let mut banks = vec![];
        for _ in 0..7 {
            counter.advance();
            banks.push(*counter.render_index());
        }
        assert_eq!(banks, vec![1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_frame_name() {
        let mut counter = FrameCounter::new();
        counter.advance();
        assert_eq!(counter.frame_name(), "[F1Bb]");
        counter.advance();
        assert_eq!(counter.frame_name(), "[F2Ac]");
    }

    #[test]
    fn test_other_slot() {
        assert_eq!(SurfaceSlot::A.other(), SurfaceSlot::B);
        assert_eq!(SurfaceSlot::B.other(), SurfaceSlot::A);
        assert_eq!(*SurfaceSlot::B.other(), 0);
    }

    #[test]
    fn test_frame_context() {
        let mut counter = FrameCounter::new();
        counter.advance();
        let ctx = counter.frame_context(42);
        assert_eq!(ctx.absolute_frame_count, 42);
        assert_eq!(ctx.jitter_frame_id, 1);
    }
}
