use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{error::ConfigError, time_context::TimeContext};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AtomFlags: u8 {
        /// 元素没有可用的样式
        const UNAVAILABLE = 0x1;
        /// 使用了 0 号样式代替
        const FALLBACK_STYLE = 0x2;
    }
}

/// GPU 侧的原子，16 字节
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Atom {
    pub origin: [f32; 3],
    pub element: u8,
    pub flags: u8,
    pub radius_squared: f16,
}
const _: () = assert!(size_of::<Atom>() == 16);

impl Atom {
    #[inline]
    pub fn new(origin: glam::Vec3, element: u8) -> Self {
        Self {
            origin: origin.to_array(),
            element,
            flags: 0,
            radius_squared: f16::ZERO,
        }
    }

    #[inline]
    pub fn flags(&self) -> AtomFlags {
        AtomFlags::from_bits_truncate(self.flags)
    }
}

/// 每种元素的着色样式，8 字节
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AtomStyle {
    pub color: [f16; 3],
    pub radius: f16,
}
impl AtomStyle {
    #[inline]
    pub fn new(color: [f32; 3], radius: f32) -> Self {
        Self {
            color: color.map(f16::from_f32),
            radius: f16::from_f32(radius),
        }
    }

    #[inline]
    fn radius_squared(&self) -> f16 {
        let radius = self.radius.to_f32();
        f16::from_f32(radius * radius)
    }
}

/// 每一帧提供原子数据
pub trait AtomProvider {
    fn atoms(&mut self, time: &TimeContext) -> Vec<Atom>;
}

/// 提供元素样式，以元素序号索引
pub trait AtomStyleProvider {
    fn styles(&self) -> &[AtomStyle];
    /// 哪些元素有可用的样式
    fn available(&self) -> &[bool];
}

/// 静态场景：每一帧返回相同的原子
pub struct ArrayAtomProvider {
    atoms: Vec<Atom>,
}
impl ArrayAtomProvider {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }
}
impl AtomProvider for ArrayAtomProvider {
    fn atoms(&mut self, _time: &TimeContext) -> Vec<Atom> {
        self.atoms.clone()
    }
}

/// 轨迹回放：按绝对帧号取帧，超过末尾时停在最后一帧
pub struct FrameSequenceAtomProvider {
    frames: Vec<Vec<Atom>>,
}
impl FrameSequenceAtomProvider {
    pub fn new(frames: Vec<Vec<Atom>>) -> Self {
        Self { frames }
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
impl AtomProvider for FrameSequenceAtomProvider {
    fn atoms(&mut self, time: &TimeContext) -> Vec<Atom> {
        let Some(last) = self.frames.len().checked_sub(1) else {
            return Vec::new();
        };
        let frame_id = usize::try_from(time.absolute_frames).unwrap_or(usize::MAX).min(last);
        self.frames[frame_id].clone()
    }
}

/// 固定的样式表
pub struct StaticStyleProvider {
    styles: Vec<AtomStyle>,
    available: Vec<bool>,
}
impl StaticStyleProvider {
    /// 所有给出的样式都可用
    pub fn new(styles: Vec<AtomStyle>) -> Self {
        let available = vec![true; styles.len()];
        Self { styles, available }
    }

    pub fn with_available(styles: Vec<AtomStyle>, available: Vec<bool>) -> Self {
        Self { styles, available }
    }
}
impl AtomStyleProvider for StaticStyleProvider {
    fn styles(&self) -> &[AtomStyle] {
        &self.styles
    }
    fn available(&self) -> &[bool] {
        &self.available
    }
}

/// 为每个原子写入半径平方与有效标记
///
/// 元素没有可用样式（包括越界的元素序号）时改用 0 号样式，并标记为
/// `UNAVAILABLE | FALLBACK_STYLE`。
pub fn apply_styles(atoms: &mut [Atom], styles: &[AtomStyle], available: &[bool]) -> Result<(), ConfigError> {
    for atom in atoms.iter_mut() {
        let element = atom.element as usize;
        let style = styles.get(element).filter(|_| available.get(element).copied().unwrap_or(false));
        match style {
            Some(style) => {
                atom.radius_squared = style.radius_squared();
                atom.flags = 0;
            }
            None => {
                let fallback = styles.first().ok_or(ConfigError::MissingFallbackStyle)?;
                atom.element = 0;
                atom.radius_squared = fallback.radius_squared();
                atom.flags = (AtomFlags::UNAVAILABLE | AtomFlags::FALLBACK_STYLE).bits();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles() -> StaticStyleProvider {
        StaticStyleProvider::with_available(
            vec![
                AtomStyle::new([1.0, 0.0, 1.0], 0.5),
                AtomStyle::new([1.0, 1.0, 1.0], 0.25),
                AtomStyle::new([0.2, 0.2, 0.2], 1.5),
            ],
            vec![true, true, false],
        )
    }

    #[test]
    fn test_available_element() {
        let provider = styles();
        let mut atoms = vec![Atom::new(glam::Vec3::ZERO, 1)];
        atoms[0].flags = 0xff;
        apply_styles(&mut atoms, provider.styles(), provider.available()).unwrap();
        assert_eq!(atoms[0].element, 1);
        assert_eq!(atoms[0].radius_squared.to_f32(), 0.0625);
        assert_eq!(atoms[0].flags(), AtomFlags::empty());
    }

    #[test]
    fn test_unavailable_element() {
        let provider = styles();
        let mut atoms = vec![Atom::new(glam::Vec3::ONE, 2), Atom::new(glam::Vec3::ONE, 200)];
        apply_styles(&mut atoms, provider.styles(), provider.available()).unwrap();
        for atom in &atoms {
            assert_eq!(atom.element, 0);
            assert_eq!(atom.radius_squared.to_f32(), 0.25);
            assert_eq!(atom.flags, 0x1 | 0x2);
        }
    }

    #[test]
    fn test_missing_fallback() {
        let mut atoms = vec![Atom::new(glam::Vec3::ZERO, 3)];
        assert_eq!(apply_styles(&mut atoms, &[], &[]), Err(ConfigError::MissingFallbackStyle));
        // 没有原子需要回退时不报错
        assert!(apply_styles(&mut [], &[], &[]).is_ok());
    }

    #[test]
    fn test_frame_sequence_clamps() {
        let frames = (0..3).map(|i| vec![Atom::new(glam::vec3(i as f32, 0.0, 0.0), 6)]).collect();
        let mut provider = FrameSequenceAtomProvider::new(frames);
        assert_eq!(provider.frame_count(), 3);

        let at = |frame| TimeContext::new(frame, 1, 120);
        assert_eq!(provider.atoms(&at(1))[0].origin[0], 1.0);
        assert_eq!(provider.atoms(&at(99))[0].origin[0], 2.0);

        let mut empty = FrameSequenceAtomProvider::new(vec![]);
        assert!(empty.atoms(&at(0)).is_empty());
    }

    #[test]
    fn test_array_provider() {
        let mut provider = ArrayAtomProvider::new(vec![Atom::new(glam::Vec3::Z, 6); 4]);
        assert_eq!(provider.atoms(&TimeContext::new(0, 0, 60)).len(), 4);
        assert_eq!(provider.atoms(&TimeContext::new(50, 1, 60)).len(), 4);
    }
}
