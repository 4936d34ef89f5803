use serde::{Deserialize, Serialize};

/// 采样质量
///
/// `quality_coefficient` 以 640x640 -> 1280x1280 为基准标定，
/// 其他输出分辨率按像素数的平方根缩放，使感知质量与分辨率无关。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    pub min_samples: f32,
    pub max_samples: f32,
    pub quality_coefficient: f32,
}
impl Quality {
    pub const CALIBRATION_WIDTH: f32 = 1280.0;

    #[inline]
    pub fn new(min_samples: f32, max_samples: f32, quality_coefficient: f32) -> Self {
        Self {
            min_samples,
            max_samples,
            quality_coefficient,
        }
    }

    /// 按输出分辨率缩放后的质量系数
    #[inline]
    pub fn scaled_coefficient(&self, output: ash::vk::Extent2D) -> f32 {
        let screen_magnitude = ((output.width * output.height) as f32).sqrt() / Self::CALIBRATION_WIDTH;
        self.quality_coefficient * screen_magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ash::vk;

    #[test]
    fn test_calibration_point() {
        let quality = Quality::new(3.0, 7.0, 30.0);
        let output = vk::Extent2D { width: 1280, height: 1280 };
        assert_relative_eq!(quality.scaled_coefficient(output), 30.0);
    }

    #[test]
    fn test_scaled_by_resolution() {
        let quality = Quality::new(3.0, 7.0, 30.0);
        let output = vk::Extent2D { width: 640, height: 640 };
        assert_relative_eq!(quality.scaled_coefficient(output), 15.0);

        let output = vk::Extent2D { width: 2560, height: 1440 };
        assert_relative_eq!(quality.scaled_coefficient(output), 30.0 * (2560.0_f32 * 1440.0).sqrt() / 1280.0);
    }
}
