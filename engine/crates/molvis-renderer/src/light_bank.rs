use molvis_render_interface::{
    frame_counter::{FrameCounter, LightBankLabel},
    light::GpuLight,
};

/// 光源 buffer 是否需要重新分配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightBankStatus {
    /// 现有容量足够
    Reused,
    /// 容量翻倍后重新分配，`bytes` 为新 buffer 的大小
    Grown { bytes: u64 },
}

/// 一个 buffer 内的 3 个光源分区
///
/// 每个分区的起始 offset 按 storage buffer 的对齐要求对齐。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightBankLayout {
    lights_per_bank: usize,
    alignment: u64,
}
impl LightBankLayout {
    pub const INITIAL_LIGHTS_PER_BANK: usize = 8;

    /// alignment 为 0 时视为 1
    pub fn new(alignment: u64) -> Self {
        Self {
            lights_per_bank: Self::INITIAL_LIGHTS_PER_BANK,
            alignment: alignment.max(1),
        }
    }

    /// 容量不足时返回翻倍后的布局
    pub fn fit(&self, light_count: usize) -> Option<Self> {
        if light_count <= self.lights_per_bank {
            return None;
        }
        let mut lights_per_bank = self.lights_per_bank;
        while lights_per_bank < light_count {
            lights_per_bank *= 2;
        }
        Some(Self {
            lights_per_bank,
            alignment: self.alignment,
        })
    }

    #[inline]
    pub fn lights_per_bank(&self) -> usize {
        self.lights_per_bank
    }

    /// 一个分区内光源数据的字节数，也是 descriptor 的 range
    #[inline]
    pub fn bank_range(&self) -> u64 {
        (self.lights_per_bank * GpuLight::STRIDE) as u64
    }

    #[inline]
    pub fn bank_stride(&self) -> u64 {
        self.bank_range().div_ceil(self.alignment) * self.alignment
    }

    #[inline]
    pub fn buffer_size(&self) -> u64 {
        self.bank_stride() * FrameCounter::LIGHT_RING_SIZE as u64
    }

    #[inline]
    pub fn bank_offset(&self, bank: LightBankLabel) -> u64 {
        *bank as u64 * self.bank_stride()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_capacity_is_reused() {
        let layout = LightBankLayout::new(64);
        assert_eq!(layout.fit(0), None);
        assert_eq!(layout.fit(8), None);
        assert_eq!(layout.bank_range(), 128);
        assert_eq!(layout.buffer_size(), 3 * 128);
    }

    #[test]
    fn capacity_doubles_until_it_fits() {
        let layout = LightBankLayout::new(16);
        let grown = layout.fit(9).unwrap();
        assert_eq!(grown.lights_per_bank(), 16);
        let grown = layout.fit(100).unwrap();
        assert_eq!(grown.lights_per_bank(), 128);
        assert!(3 * 100 * GpuLight::STRIDE as u64 <= grown.buffer_size());
    }

    #[test]
    fn bank_offsets_are_aligned() {
        // 8 个光源 128 字节，对齐到 256
        let layout = LightBankLayout::new(256);
        assert_eq!(layout.bank_stride(), 256);
        assert_eq!(layout.bank_offset(LightBankLabel::A), 0);
        assert_eq!(layout.bank_offset(LightBankLabel::B), 256);
        assert_eq!(layout.bank_offset(LightBankLabel::C), 512);
        assert_eq!(layout.buffer_size(), 768);
    }

    #[test]
    fn zero_alignment_is_treated_as_one() {
        let layout = LightBankLayout::new(0);
        assert_eq!(layout.bank_stride(), layout.bank_range());
    }
}
