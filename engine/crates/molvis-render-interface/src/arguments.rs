use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::{error::ConfigError, settings::ShadingSettings};

/// 光追 shader 的逐帧参数
///
/// 布局与 shader 中的 uniform 一致：旋转矩阵每一列按 16 字节对齐。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderArguments {
    pub fov_multiplier: f32,
    pub position: [f32; 3],
    /// 3 列，每列的最后一个分量为填充
    pub rotation: [[f32; 4]; 3],
    pub jitter: [f32; 2],
    pub frame_seed: u32,
    pub light_count: u16,

    pub min_samples: f16,
    pub max_samples: f16,
    pub quality_coefficient: f16,

    pub max_ray_hit_time: f32,
    pub exponential_falloff_decay_constant: f32,
    pub minimum_ambient_illumination: f32,
    pub diffuse_reflectance_scale: f32,

    pub grid_width: u16,
    _padding: [u16; 5],
}

/// 一个参数槽的字节数
pub const ARGUMENT_SLOT_SIZE: usize = 128;
/// 当前帧与上一帧两个槽
pub const ARGUMENT_BLOCK_SIZE: usize = 2 * ARGUMENT_SLOT_SIZE;

const _: () = assert!(size_of::<RenderArguments>() <= ARGUMENT_SLOT_SIZE);

/// 构造 `RenderArguments` 所需的相机与采样参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraArguments {
    pub fov_multiplier: f32,
    pub position: glam::Vec3,
    pub rotation: glam::Mat3,
    pub frame_seed: u32,
    pub light_count: u16,
    pub min_samples: f32,
    pub max_samples: f32,
    /// 已经按分辨率缩放
    pub quality_coefficient: f32,
}

// new & init
impl RenderArguments {
    pub fn new(camera: &CameraArguments, shading: &ShadingSettings) -> Self {
        let column = |c: glam::Vec3| [c.x, c.y, c.z, 0.0];
        Self {
            fov_multiplier: camera.fov_multiplier,
            position: camera.position.to_array(),
            rotation: [
                column(camera.rotation.x_axis),
                column(camera.rotation.y_axis),
                column(camera.rotation.z_axis),
            ],
            // 抖动与网格宽度在编码时才确定
            jitter: [0.0; 2],
            frame_seed: camera.frame_seed,
            light_count: camera.light_count,

            min_samples: f16::from_f32(camera.min_samples),
            max_samples: f16::from_f32(camera.max_samples),
            quality_coefficient: f16::from_f32(camera.quality_coefficient),

            max_ray_hit_time: shading.max_ray_hit_time,
            exponential_falloff_decay_constant: shading.exponential_falloff_decay_constant,
            minimum_ambient_illumination: shading.minimum_ambient_illumination,
            diffuse_reflectance_scale: shading.diffuse_reflectance_scale,

            grid_width: 0,
            _padding: [0; 5],
        }
    }
}
// getters
impl RenderArguments {
    #[inline]
    pub fn position(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.position)
    }

    #[inline]
    pub fn rotation(&self) -> glam::Mat3 {
        let column = |c: [f32; 4]| glam::vec3(c[0], c[1], c[2]);
        glam::Mat3::from_cols(column(self.rotation[0]), column(self.rotation[1]), column(self.rotation[2]))
    }

    #[inline]
    pub fn jitter(&self) -> glam::Vec2 {
        glam::Vec2::from_array(self.jitter)
    }
}

/// 当前帧与上一帧的参数，shader 据此计算逐像素的 motion vector
///
/// 第一帧时上一帧等于当前帧，即没有运动。
#[derive(Debug, Default, Clone)]
pub struct ArgumentDoubleBuffer {
    current: Option<RenderArguments>,
    /// `None` 表示还没有上一帧，此时跟随当前帧
    previous: Option<RenderArguments>,
}
// update
impl ArgumentDoubleBuffer {
    /// 当前帧移入上一帧，再写入新的当前帧
    pub fn rotate(&mut self, new_args: RenderArguments) {
        self.previous = self.current.take();
        self.current = Some(new_args);
    }

    /// 写入编码时才确定的字段，并在第一帧时固定上一帧
    ///
    /// 返回 `None` 表示还没有调用过 [`Self::rotate`]
    pub fn finalize(&mut self, jitter: glam::Vec2, grid_width: u16) -> Option<(&RenderArguments, &RenderArguments)> {
        let current = self.current.as_mut()?;
        current.jitter = jitter.to_array();
        current.grid_width = grid_width;

        let current = *current;
        let previous = self.previous.get_or_insert(current);
        Some((self.current.as_ref()?, previous))
    }
}
// getters
impl ArgumentDoubleBuffer {
    #[inline]
    pub fn current(&self) -> Option<&RenderArguments> {
        self.current.as_ref()
    }

    #[inline]
    pub fn previous(&self) -> Option<&RenderArguments> {
        self.previous.as_ref().or(self.current.as_ref())
    }
}

/// 打包好的参数块：[0, 128) 为当前帧，[128, 256) 为上一帧
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PackedArgumentBlock {
    bytes: [u8; ARGUMENT_BLOCK_SIZE],
}
impl PackedArgumentBlock {
    pub fn pack<T: Pod>(current: &T, previous: &T) -> Result<Self, ConfigError> {
        let size = size_of::<T>();
        if size > ARGUMENT_SLOT_SIZE {
            return Err(ConfigError::ArgumentRecordTooLarge {
                size,
                slot: ARGUMENT_SLOT_SIZE,
            });
        }

        let mut block = Self::zeroed();
        block.bytes[..size].copy_from_slice(bytemuck::bytes_of(current));
        block.bytes[ARGUMENT_SLOT_SIZE..ARGUMENT_SLOT_SIZE + size].copy_from_slice(bytemuck::bytes_of(previous));
        Ok(block)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn current_slot(&self) -> &[u8] {
        &self.bytes[..ARGUMENT_SLOT_SIZE]
    }

    #[inline]
    pub fn previous_slot(&self) -> &[u8] {
        &self.bytes[ARGUMENT_SLOT_SIZE..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(position: glam::Vec3) -> CameraArguments {
        CameraArguments {
            fov_multiplier: 1.0 / 160.0,
            position,
            rotation: glam::Mat3::from_rotation_y(0.3),
            frame_seed: 7,
            light_count: 2,
            min_samples: 3.0,
            max_samples: 7.0,
            quality_coefficient: 15.0,
        }
    }

    fn args(position: glam::Vec3) -> RenderArguments {
        RenderArguments::new(&camera(position), &ShadingSettings::default())
    }

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<RenderArguments>(), 112);
        assert_eq!(std::mem::offset_of!(RenderArguments, rotation), 16);
        assert_eq!(std::mem::offset_of!(RenderArguments, jitter), 64);
        assert_eq!(std::mem::offset_of!(RenderArguments, max_ray_hit_time), 84);
        assert_eq!(std::mem::offset_of!(RenderArguments, grid_width), 100);
    }

    #[test]
    fn test_rotation_round_trip() {
        let a = args(glam::Vec3::ONE);
        assert!(a.rotation().abs_diff_eq(glam::Mat3::from_rotation_y(0.3), 1e-6));
        assert_eq!(a.position(), glam::Vec3::ONE);
        assert_eq!(a.min_samples.to_f32(), 3.0);
        assert_eq!(a.max_ray_hit_time, 1.0);
    }

    #[test]
    fn test_first_frame_previous_equals_current() {
        let mut buffer = ArgumentDoubleBuffer::default();
        assert!(buffer.finalize(glam::Vec2::ZERO, 0).is_none());

        buffer.rotate(args(glam::Vec3::X));
        assert_eq!(buffer.previous(), buffer.current());

        let (current, previous) = buffer.finalize(glam::vec2(0.25, -0.1), 64).unwrap();
        assert_eq!(current, previous);
        assert_eq!(current.grid_width, 64);
        assert_eq!(current.jitter(), glam::vec2(0.25, -0.1));
    }

    #[test]
    fn test_previous_is_prior_current() {
        let mut buffer = ArgumentDoubleBuffer::default();
        buffer.rotate(args(glam::Vec3::X));
        buffer.finalize(glam::vec2(0.1, 0.1), 8);
        let first = *buffer.current().unwrap();

        buffer.rotate(args(glam::Vec3::Y));
        let (current, previous) = buffer.finalize(glam::vec2(0.2, 0.2), 8).unwrap();
        assert_eq!(*previous, first);
        assert_eq!(current.position(), glam::Vec3::Y);
        assert_eq!(previous.jitter(), glam::vec2(0.1, 0.1));
    }

    #[test]
    fn test_pack_block() {
        let current = args(glam::Vec3::X);
        let previous = args(glam::Vec3::Y);
        let block = PackedArgumentBlock::pack(&current, &previous).unwrap();

        let size = size_of::<RenderArguments>();
        assert_eq!(block.as_bytes().len(), ARGUMENT_BLOCK_SIZE);
        assert_eq!(&block.current_slot()[..size], bytemuck::bytes_of(&current));
        assert_eq!(&block.previous_slot()[..size], bytemuck::bytes_of(&previous));
        assert!(block.current_slot()[size..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_pack_oversized_record() {
        #[repr(C)]
        #[derive(Clone, Copy, Pod, Zeroable)]
        struct Oversized {
            data: [u32; 48],
        }
        let record = Oversized { data: [0; 48] };
        let err = PackedArgumentBlock::pack(&record, &record).err().unwrap();
        assert_eq!(err, ConfigError::ArgumentRecordTooLarge { size: 192, slot: 128 });
    }
}
