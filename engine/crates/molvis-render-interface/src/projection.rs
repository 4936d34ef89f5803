/// 视场角到光线方向缩放系数的换算
///
/// 像素相对画面中心的横向偏移乘以该系数，在视场边缘恰好等于半角的正切。
/// 90° 时 `tan(45°) = 1`，结果就是 `1 / half_intermediate_width`。
#[inline]
pub fn fov_multiplier(fov_degrees: f32, half_intermediate_width: f32) -> f32 {
    // 在 f64 中求正切，保证 90° 时得到精确的 1.0
    let tangent = (fov_degrees as f64 * std::f64::consts::PI / 360.0).tan() as f32;
    tangent / half_intermediate_width
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fov_90_is_exact() {
        for width in (2..=4096_u32).step_by(2) {
            let half = width as f32 / 2.0;
            assert_eq!(fov_multiplier(90.0, half), 1.0 / half, "width {width}");
        }
    }

    #[test]
    fn test_fov_60() {
        let half = 320.0;
        assert_relative_eq!(fov_multiplier(60.0, half), (30.0_f32).to_radians().tan() / half, epsilon = 1e-7);
    }

    #[test]
    fn test_wider_fov_is_larger() {
        assert!(fov_multiplier(100.0, 320.0) > fov_multiplier(90.0, 320.0));
        assert!(fov_multiplier(30.0, 320.0) < fov_multiplier(90.0, 320.0));
    }
}
