use molvis_render_interface::{
    arguments::{ArgumentDoubleBuffer, PackedArgumentBlock, RenderArguments},
    frame_counter::{FrameContext, FrameCounter, LightBankLabel, SurfaceSlot},
    jitter::jitter_offset,
    light::Light,
    reset_tracker::ResetTracker,
    time_context::TimeContext,
};

use crate::error::{RendererError, RendererResult};

/// 一帧开始时确定下来的全部索引与标志，在各阶段之间显式传递
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub context: FrameContext,
    pub surface_slot: SurfaceSlot,
    pub render_index: LightBankLabel,
    pub jitter: glam::Vec2,
    /// 时域上采样器是否丢弃历史
    pub reset: bool,
    /// 是否提前提交几何部分以采样 GPU 耗时
    pub profile: bool,
    pub name: String,
}

/// set_camera 生成、等待下一次 render 使用的相机参数与光源
#[derive(Debug, Clone)]
pub struct PendingCamera {
    pub arguments: RenderArguments,
    /// 已经归一化
    pub lights: Vec<Light>,
}

/// 两次 render 之间由调用方提供的输入，在 render 开始时一次性取走
#[derive(Debug, Clone, Default)]
pub struct FrameInputs {
    pub time: Option<TimeContext>,
    pub camera: Option<PendingCamera>,
}

/// 跨帧保存的 CPU 侧状态
///
/// 参数双缓冲与光源只在帧真正推进时更新，没有被渲染的相机不会进入 previous。
#[derive(Debug, Default)]
pub struct FrameState {
    counter: FrameCounter,
    reset_tracker: ResetTracker,
    arguments: ArgumentDoubleBuffer,
    lights: Vec<Light>,
    inputs: FrameInputs,
}

// new & init
impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }
}
// 调用方输入
impl FrameState {
    #[inline]
    pub fn set_time(&mut self, time: TimeContext) {
        self.inputs.time = Some(time);
    }

    /// 每次 render 之前只能设置一次相机
    pub fn set_camera(&mut self, arguments: RenderArguments, lights: Vec<Light>) -> RendererResult<()> {
        if self.inputs.camera.is_some() {
            return Err(RendererError::MissingPrecondition("set_camera was called twice without render"));
        }
        self.inputs.camera = Some(PendingCamera { arguments, lights });
        Ok(())
    }

    #[inline]
    pub fn camera_pending(&self) -> bool {
        self.inputs.camera.is_some()
    }

    #[inline]
    pub fn time_pending(&self) -> bool {
        self.inputs.time.is_some()
    }

    /// 取走本帧的输入，之后无论 render 从哪条路径退出，时间上下文都已清空
    #[inline]
    pub fn take_inputs(&mut self) -> FrameInputs {
        std::mem::take(&mut self.inputs)
    }
}
// 帧推进
impl FrameState {
    /// 推进帧计数，重新计算抖动与重置标志，并轮换参数双缓冲
    pub fn advance(&mut self, time: &TimeContext, camera: PendingCamera, profile: bool) -> FramePlan {
        self.counter.advance();
        let reset = self.reset_tracker.update(time.absolute_frames);
        let jitter_frame_id = self.counter.jitter_frame_id();
        self.arguments.rotate(camera.arguments);
        self.lights = camera.lights;

        FramePlan {
            context: self.counter.frame_context(time.absolute_frames),
            surface_slot: self.counter.surface_slot(),
            render_index: self.counter.render_index(),
            jitter: jitter_offset(jitter_frame_id),
            reset,
            profile,
            name: self.counter.frame_name(),
        }
    }

    /// 写入本帧的抖动与网格宽度，并打包当前帧与上一帧的参数
    pub fn pack_arguments(&mut self, plan: &FramePlan, grid_width: u16) -> RendererResult<PackedArgumentBlock> {
        let (current, previous) = self
            .arguments
            .finalize(plan.jitter, grid_width)
            .ok_or(RendererError::MissingPrecondition("no camera arguments before encoding"))?;
        Ok(PackedArgumentBlock::pack(current, previous)?)
    }
}
// getters
impl FrameState {
    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[inline]
    pub fn arguments(&self) -> &ArgumentDoubleBuffer {
        &self.arguments
    }

    #[inline]
    pub fn counter(&self) -> &FrameCounter {
        &self.counter
    }

    #[inline]
    pub fn reset_tracker(&self) -> &ResetTracker {
        &self.reset_tracker
    }
}

#[cfg(test)]
mod tests {
    use molvis_render_interface::{arguments::CameraArguments, settings::ShadingSettings};

    use super::*;

    fn arguments(x: f32) -> RenderArguments {
        let camera = CameraArguments {
            fov_multiplier: 1.0,
            position: glam::Vec3::new(x, 0.0, 0.0),
            rotation: glam::Mat3::IDENTITY,
            frame_seed: 7,
            light_count: 0,
            min_samples: 1.0,
            max_samples: 4.0,
            quality_coefficient: 1.0,
        };
        RenderArguments::new(&camera, &ShadingSettings::default())
    }

    #[test]
    fn test_set_camera_twice_is_rejected() {
        let mut state = FrameState::new();
        state.set_camera(arguments(0.0), vec![]).unwrap();
        assert!(matches!(
            state.set_camera(arguments(1.0), vec![]),
            Err(RendererError::MissingPrecondition(_))
        ));
    }

    fn camera(x: f32) -> PendingCamera {
        PendingCamera {
            arguments: arguments(x),
            lights: vec![],
        }
    }

    #[test]
    fn test_take_inputs_clears_time_and_camera() {
        let mut state = FrameState::new();
        state.set_time(TimeContext::new(3, 1, 60));
        state.set_camera(arguments(0.0), vec![]).unwrap();

        let inputs = state.take_inputs();
        assert_eq!(inputs.time, Some(TimeContext::new(3, 1, 60)));
        assert!(inputs.camera.is_some());

        let again = state.take_inputs();
        assert!(again.time.is_none());
        assert!(again.camera.is_none());
        assert!(!state.time_pending());
    }

    #[test]
    fn test_discarded_camera_never_becomes_previous() {
        let mut state = FrameState::new();
        state.set_camera(arguments(0.0), vec![]).unwrap();
        assert!(state.arguments().current().is_none());
        // render 失败时输入被整体丢弃
        drop(state.take_inputs());

        state.set_camera(arguments(5.0), vec![]).unwrap();
        let pending = state.take_inputs().camera.unwrap();
        let plan = state.advance(&TimeContext::new(0, 0, 60), pending, false);
        let block = state.pack_arguments(&plan, 16).unwrap();
        assert_eq!(block.current_slot(), block.previous_slot());
        assert_eq!(state.arguments().previous().unwrap().position(), glam::Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_advance_derives_slots_from_frame_id() {
        let mut state = FrameState::new();
        let time = TimeContext::new(0, 0, 60);

        let first = state.advance(&time, camera(0.0), false);
        assert_eq!(first.context.jitter_frame_id, 1);
        assert_eq!(first.surface_slot, SurfaceSlot::B);
        assert_eq!(first.render_index, LightBankLabel::B);
        assert_eq!(first.jitter, jitter_offset(1));

        let second = state.advance(&time, camera(1.0), true);
        assert_eq!(second.surface_slot, SurfaceSlot::A);
        assert_eq!(second.render_index, LightBankLabel::C);
        assert!(second.profile);
    }

    #[test]
    fn test_reset_follows_absolute_frame() {
        let mut state = FrameState::new();
        let resets = [5, 6, 0, 1]
            .into_iter()
            .map(|abs| state.advance(&TimeContext::new(abs, 1, 60), camera(0.0), false).reset)
            .collect::<Vec<_>>();
        assert_eq!(resets, vec![false, false, true, false]);
    }

    #[test]
    fn test_first_frame_previous_equals_current() {
        let mut state = FrameState::new();
        let plan = state.advance(&TimeContext::new(0, 0, 60), camera(2.0), false);

        let block = state.pack_arguments(&plan, 16).unwrap();
        assert_eq!(block.current_slot(), block.previous_slot());

        let current = state.arguments().current().unwrap();
        assert_eq!(current.grid_width, 16);
        assert_eq!(current.jitter(), plan.jitter);
    }

    #[test]
    fn test_pack_without_advance_fails() {
        let mut state = FrameState::new();
        let plan = FramePlan {
            context: state.counter().frame_context(0),
            surface_slot: SurfaceSlot::A,
            render_index: LightBankLabel::A,
            jitter: glam::Vec2::ZERO,
            reset: false,
            profile: false,
            name: "frame".to_string(),
        };
        assert!(state.pack_arguments(&plan, 1).is_err());
    }
}
