/// 上采样器的历史状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// 沿用历史累积，通过 motion vector 混合
    Tracking,
    /// 本帧丢弃历史累积
    JustReset,
}

/// 检测帧号的不连续：回放被拖回起点时需要重置时域上采样器
///
/// 只有新的绝对帧号为 0 且与上一次记录的帧号不同时才会重置。
#[derive(Debug, Default, Clone, Copy)]
pub struct ResetTracker {
    /// `None` 表示还没有观察过任何帧
    last_frame_id: Option<u64>,
    reset_pending: bool,
}
// update
impl ResetTracker {
    /// 根据本帧的绝对帧号更新状态，返回本帧是否需要重置
    pub fn update(&mut self, absolute_frame_id: u64) -> bool {
        self.reset_pending = absolute_frame_id == 0 && self.last_frame_id != Some(absolute_frame_id);
        self.last_frame_id = Some(absolute_frame_id);
        if self.reset_pending {
            log::debug!("temporal upscaler reset at absolute frame {}", absolute_frame_id);
        }
        self.reset_pending
    }
}
// getters
impl ResetTracker {
    #[inline]
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    #[inline]
    pub fn last_frame_id(&self) -> Option<u64> {
        self.last_frame_id
    }

    #[inline]
    pub fn state(&self) -> ResetState {
        if self.reset_pending { ResetState::JustReset } else { ResetState::Tracking }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ids: &[u64]) -> Vec<bool> {
        let mut tracker = ResetTracker::default();
        ids.iter().map(|id| tracker.update(*id)).collect()
    }

    #[test]
    fn test_seek_to_start() {
        assert_eq!(run(&[5, 6, 0, 1]), vec![false, false, true, false]);
    }

    #[test]
    fn test_first_observed_frame_zero() {
        // 首帧为 0 时也视为从起点开始
        assert_eq!(run(&[0, 1, 2]), vec![true, false, false]);
    }

    #[test]
    fn test_paused_at_zero() {
        // 停留在第 0 帧不会反复重置
        assert_eq!(run(&[0, 0, 0, 1, 0]), vec![true, false, false, false, true]);
    }

    #[test]
    fn test_state_and_last_frame() {
        let mut tracker = ResetTracker::default();
        assert_eq!(tracker.last_frame_id(), None);
        tracker.update(3);
        assert_eq!(tracker.state(), ResetState::Tracking);
        assert_eq!(tracker.last_frame_id(), Some(3));
        tracker.update(0);
        assert_eq!(tracker.state(), ResetState::JustReset);
        assert!(tracker.reset_pending());
    }
}
