use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::error::ConfigError;

bitflags::bitflags! {
    /// 光源标记，在 GPU 侧打包进漫反射强度 f16 的最低位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LightFlags: u16 {
        /// 光源位于相机处，shader 可以走更便宜的着色路径
        const CAMERA_CENTERED = 0x1;
    }
}

/// CPU 侧的光源描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub origin: glam::Vec3,
    pub diffuse_power: f32,
    pub specular_power: f32,
    pub flags: LightFlags,
}
impl Light {
    #[inline]
    pub fn new(origin: glam::Vec3, diffuse_power: f32, specular_power: f32) -> Self {
        Self {
            origin,
            diffuse_power,
            specular_power,
            flags: LightFlags::empty(),
        }
    }

    #[inline]
    pub fn is_camera_centered(&self) -> bool {
        self.flags.contains(LightFlags::CAMERA_CENTERED)
    }
}

/// GPU 侧的光源，16 字节
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub origin: [f32; 3],
    pub diffuse_power: f16,
    pub specular_power: f16,
}
const _: () = assert!(size_of::<GpuLight>() == 16);

impl GpuLight {
    pub const STRIDE: usize = size_of::<GpuLight>();

    const FLAG_MASK: u16 = LightFlags::all().bits();

    #[inline]
    pub fn flags(&self) -> LightFlags {
        LightFlags::from_bits_truncate(self.diffuse_power.to_bits() & Self::FLAG_MASK)
    }
}
impl From<&Light> for GpuLight {
    fn from(light: &Light) -> Self {
        // 先清空标记位，再写入本帧的标记
        let diffuse_bits = f16::from_f32(light.diffuse_power).to_bits() & !Self::FLAG_MASK;
        let diffuse_power = f16::from_bits(diffuse_bits | light.flags.bits());

        Self {
            origin: light.origin.to_array(),
            diffuse_power,
            specular_power: f16::from_f32(light.specular_power),
        }
    }
}

/// 光源强度归一化
pub struct LightNormalizer;
impl LightNormalizer {
    /// 光源数量必须可以用 u16 表示
    pub const MAX_LIGHT_COUNT: usize = u16::MAX as usize;

    /// 与相机距离小于该值的光源视为位于相机处
    pub const CAMERA_CENTERED_EPSILON: f32 = 1e-3;

    /// 漫反射与高光强度分别除以各自的总和，使两者在整个列表上分别求和为 1
    ///
    /// 顺序保持不变；总和为 0 的那一项保持为 0。
    pub fn normalize(lights: &[Light], camera_position: glam::Vec3) -> Result<Vec<Light>, ConfigError> {
        if lights.len() > Self::MAX_LIGHT_COUNT {
            return Err(ConfigError::TooManyLights {
                count: lights.len(),
                max: Self::MAX_LIGHT_COUNT,
            });
        }

        let total_diffuse: f32 = lights.iter().map(|l| l.diffuse_power).sum();
        let total_specular: f32 = lights.iter().map(|l| l.specular_power).sum();
        let scale = |power: f32, total: f32| if total > 0.0 { power / total } else { 0.0 };

        Ok(lights
            .iter()
            .map(|light| {
                let mut flags = LightFlags::empty();
                if light.origin.distance(camera_position) < Self::CAMERA_CENTERED_EPSILON {
                    flags |= LightFlags::CAMERA_CENTERED;
                }
                Light {
                    origin: light.origin,
                    diffuse_power: scale(light.diffuse_power, total_diffuse),
                    specular_power: scale(light.specular_power, total_specular),
                    flags,
                }
            })
            .collect())
    }

    /// 打包为 GPU 布局
    pub fn pack(lights: &[Light]) -> Vec<GpuLight> {
        lights.iter().map(GpuLight::from).collect()
    }
}
