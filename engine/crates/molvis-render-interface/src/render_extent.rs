use ash::vk;

use crate::error::ConfigError;

/// 渲染尺寸
///
/// 光追在中间分辨率（输出的一半）进行，时域上采样器放大 2 倍到输出分辨率。
/// 输出尺寸的宽高都必须是偶数，在分配任何 GPU 资源之前检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderExtent {
    output: vk::Extent2D,
}
// new & init
impl RenderExtent {
    pub const UPSCALE_FACTOR: u32 = 2;

    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroDimension { width, height });
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ConfigError::OddDimension { width, height });
        }
        Ok(Self {
            output: vk::Extent2D { width, height },
        })
    }
}
// getters
impl RenderExtent {
    /// 上采样之后的尺寸，与 swapchain 一致
    #[inline]
    pub fn output(&self) -> vk::Extent2D {
        self.output
    }

    /// 光追 pass 的尺寸
    #[inline]
    pub fn intermediate(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.output.width / Self::UPSCALE_FACTOR,
            height: self.output.height / Self::UPSCALE_FACTOR,
        }
    }

    #[inline]
    pub fn half_intermediate_width(&self) -> f32 {
        0.5 * self.intermediate().width as f32
    }

    /// 以 `group_size` x `group_size` 的线程组覆盖中间分辨率
    #[inline]
    pub fn dispatch_groups(extent: vk::Extent2D, group_size: u32) -> glam::UVec3 {
        glam::uvec3(extent.width.div_ceil(group_size), extent.height.div_ceil(group_size), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_640() {
        let extent = RenderExtent::new(640, 640).unwrap();
        assert_eq!(extent.output(), vk::Extent2D { width: 640, height: 640 });
        assert_eq!(extent.intermediate(), vk::Extent2D { width: 320, height: 320 });
        assert_eq!(extent.half_intermediate_width(), 160.0);
    }

    #[test]
    fn test_odd_dimension() {
        assert_eq!(
            RenderExtent::new(641, 640),
            Err(ConfigError::OddDimension {
                width: 641,
                height: 640
            })
        );
        assert!(matches!(RenderExtent::new(640, 3), Err(ConfigError::OddDimension { .. })));
        assert!(matches!(RenderExtent::new(0, 640), Err(ConfigError::ZeroDimension { .. })));
    }

    #[test]
    fn test_dispatch_groups() {
        let extent = RenderExtent::new(1284, 640).unwrap();
        // 642 x 320，每组 8x8
        assert_eq!(RenderExtent::dispatch_groups(extent.intermediate(), 8), glam::uvec3(81, 40, 1));
    }
}
