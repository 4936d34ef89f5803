/// 调用方给出的当前帧时间
///
/// - `absolute_frames`: 从轨迹起点开始的帧号，回放拖动到起点时会回到 0
/// - `relative_frames`: 距上一次渲染经过的帧数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeContext {
    pub absolute_frames: u64,
    pub relative_frames: u64,
    pub frame_rate: u32,
}
// new & init
impl TimeContext {
    #[inline]
    pub fn new(absolute_frames: u64, relative_frames: u64, frame_rate: u32) -> Self {
        Self {
            absolute_frames,
            relative_frames,
            frame_rate,
        }
    }
}
// getters
impl TimeContext {
    #[inline]
    pub fn absolute_seconds(&self) -> f64 {
        Self::frames_to_seconds(self.absolute_frames, self.frame_rate)
    }

    #[inline]
    pub fn relative_seconds(&self) -> f64 {
        Self::frames_to_seconds(self.relative_frames, self.frame_rate)
    }

    fn frames_to_seconds(frames: u64, frame_rate: u32) -> f64 {
        if frame_rate == 0 { 0.0 } else { frames as f64 / frame_rate as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds() {
        let time = TimeContext::new(240, 2, 120);
        assert_eq!(time.absolute_seconds(), 2.0);
        assert!((time.relative_seconds() - 1.0 / 60.0).abs() < 1e-12);

        // frame rate 为 0 时不产生 NaN
        assert_eq!(TimeContext::new(10, 1, 0).absolute_seconds(), 0.0);
    }
}
