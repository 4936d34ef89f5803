use molvis_render_interface::{
    arguments::{CameraArguments, PackedArgumentBlock, RenderArguments},
    atoms::{Atom, AtomProvider, AtomStyle, AtomStyleProvider, apply_styles},
    error::ConfigError,
    light::{GpuLight, Light, LightNormalizer},
    projection::fov_multiplier,
    quality::Quality,
    render_extent::RenderExtent,
    settings::RendererSettings,
    time_context::TimeContext,
};

use crate::{
    error::{RendererError, RendererResult},
    frame_state::{FrameInputs, FramePlan, FrameState},
    light_bank::LightBankStatus,
};

/// 一帧在提交管线中所处的阶段
///
/// `Idle -> ResourcesAdvanced -> GeometryEncoded -> [Profiled] -> SurfaceAcquired -> Upscaled -> Presented -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    ResourcesAdvanced,
    GeometryEncoded,
    Profiled,
    SurfaceAcquired,
    Upscaled,
    Presented,
}
impl FramePhase {
    #[inline]
    pub fn can_transition(self, to: Self) -> bool {
        use FramePhase::*;
        matches!(
            (self, to),
            (Idle, ResourcesAdvanced)
                | (ResourcesAdvanced, GeometryEncoded)
                | (GeometryEncoded, Profiled)
                | (GeometryEncoded, SurfaceAcquired)
                | (Profiled, SurfaceAcquired)
                | (SurfaceAcquired, Upscaled)
                | (Upscaled, Presented)
                | (Presented, Idle)
        )
    }
}

/// 帧的 GPU 工作全部完成后，在后台线程上调用
pub type CompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// 提交管线与设备之间的边界
///
/// 管线只决定顺序与索引，具体的命令录制与提交由实现者完成。
/// 每个方法都拿到本帧的 [`FramePlan`]，不需要在实现内部维护帧计数。
pub trait FrameBackend {
    /// 获取到的呈现目标，只在一次 render 内有效
    type Surface;

    fn set_geometry(&mut self, atoms: Vec<Atom>, styles: &[AtomStyle]) -> RendererResult<()>;

    /// 保证光源 buffer 能容纳 `count` 个光源，不够时扩容
    fn reserve_lights(&mut self, count: usize) -> RendererResult<LightBankStatus>;

    /// 本帧是否请求采样 GPU 耗时，在帧推进之前询问一次
    fn profile_this_frame(&self) -> bool {
        false
    }

    /// 等待复用本帧资源的那一帧完成，开始录制
    fn begin_frame(&mut self, plan: &FramePlan) -> RendererResult<()>;

    /// 刷新加速结构，返回写入参数的网格宽度
    fn update_geometry(&mut self, plan: &FramePlan) -> RendererResult<u16>;

    /// 写入参数与光源，录制光追 dispatch
    fn encode_geometry(
        &mut self,
        plan: &FramePlan,
        arguments: &PackedArgumentBlock,
        lights: &[GpuLight],
    ) -> RendererResult<()>;

    /// 提前提交已经录制的几何部分，为本帧打开新的命令序列
    fn commit_profiled(&mut self, plan: &FramePlan) -> RendererResult<()>;

    fn acquire_surface(&mut self, plan: &FramePlan) -> RendererResult<Self::Surface>;

    fn upscale(&mut self, plan: &FramePlan, surface: &Self::Surface) -> RendererResult<()>;

    fn present(&mut self, plan: &FramePlan, surface: Self::Surface, on_complete: CompletionHandler)
    -> RendererResult<()>;

    /// 某个阶段失败后调用，丢弃本帧尚未提交的命令
    fn abort_frame(&mut self, plan: &FramePlan);
}

/// 帧提交状态机
///
/// 由单个线程驱动。调用方每帧依次调用 [`Self::set_geometry`]、[`Self::set_camera`]、[`Self::render`]。
/// 任何一次调用返回致命错误后，管线进入失败状态，之后的调用都返回 [`RendererError::Poisoned`]。
pub struct FrameSubmissionPipeline<B: FrameBackend> {
    backend: B,
    state: FrameState,
    extent: RenderExtent,
    settings: RendererSettings,
    phase: FramePhase,
    failed: bool,
}

// new & init
impl<B: FrameBackend> FrameSubmissionPipeline<B> {
    pub fn new(backend: B, extent: RenderExtent, settings: RendererSettings) -> RendererResult<Self> {
        settings.validate()?;
        Ok(Self {
            backend,
            state: FrameState::new(),
            extent,
            settings,
            phase: FramePhase::Idle,
            failed: false,
        })
    }

    fn ensure_usable(&self) -> RendererResult<()> {
        if self.failed {
            return Err(RendererError::Poisoned);
        }
        Ok(())
    }

    fn latch<T>(&mut self, result: RendererResult<T>) -> RendererResult<T> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            self.failed = true;
        }
        result
    }
}
// 调用方输入
impl<B: FrameBackend> FrameSubmissionPipeline<B> {
    /// 取出 `time` 时刻的原子，写入样式后交给 backend，并记录本帧的时间
    pub fn set_geometry(
        &mut self,
        time: TimeContext,
        atom_provider: &mut dyn AtomProvider,
        style_provider: &dyn AtomStyleProvider,
    ) -> RendererResult<()> {
        self.ensure_usable()?;
        let result = self.apply_geometry(time, atom_provider, style_provider);
        self.latch(result)
    }

    /// 归一化光源，生成下一帧的参数；参数在 render 推进帧时才进入双缓冲
    ///
    /// 返回光源 buffer 是否因此扩容。
    pub fn set_camera(
        &mut self,
        fov_degrees: f32,
        position: glam::Vec3,
        rotation: glam::Mat3,
        lights: &[Light],
        quality: Quality,
    ) -> RendererResult<LightBankStatus> {
        self.ensure_usable()?;
        let result = self.stage_camera(fov_degrees, position, rotation, lights, quality);
        self.latch(result)
    }

    fn apply_geometry(
        &mut self,
        time: TimeContext,
        atom_provider: &mut dyn AtomProvider,
        style_provider: &dyn AtomStyleProvider,
    ) -> RendererResult<()> {
        let mut atoms = atom_provider.atoms(&time);
        apply_styles(&mut atoms, style_provider.styles(), style_provider.available())?;
        self.backend.set_geometry(atoms, style_provider.styles())?;
        self.state.set_time(time);
        Ok(())
    }

    fn stage_camera(
        &mut self,
        fov_degrees: f32,
        position: glam::Vec3,
        rotation: glam::Mat3,
        lights: &[Light],
        quality: Quality,
    ) -> RendererResult<LightBankStatus> {
        if self.state.camera_pending() {
            return Err(RendererError::MissingPrecondition("set_camera was called twice without render"));
        }

        let lights = LightNormalizer::normalize(lights, position)?;
        let light_count = u16::try_from(lights.len()).map_err(|_| ConfigError::TooManyLights {
            count: lights.len(),
            max: LightNormalizer::MAX_LIGHT_COUNT,
        })?;
        let status = self.backend.reserve_lights(lights.len())?;

        let camera = CameraArguments {
            fov_multiplier: fov_multiplier(fov_degrees, self.extent.half_intermediate_width()),
            position,
            rotation,
            frame_seed: rand::random(),
            light_count,
            min_samples: quality.min_samples,
            max_samples: quality.max_samples,
            quality_coefficient: quality.scaled_coefficient(self.extent.output()),
        };
        let arguments = RenderArguments::new(&camera, &self.settings.shading);
        self.state.set_camera(arguments, lights)?;

        Ok(status)
    }
}
// render
impl<B: FrameBackend> FrameSubmissionPipeline<B> {
    /// 编码并提交一帧，`on_complete` 在 GPU 完成后异步调用
    ///
    /// 无论从哪条路径返回，本帧的时间上下文都会被清空。
    pub fn render(&mut self, on_complete: CompletionHandler) -> RendererResult<()> {
        let inputs = self.state.take_inputs();
        self.ensure_usable()?;
        let result = self.render_frame(inputs, on_complete);
        self.latch(result)
    }

    fn render_frame(&mut self, inputs: FrameInputs, on_complete: CompletionHandler) -> RendererResult<()> {
        let time = inputs
            .time
            .ok_or(RendererError::MissingPrecondition("set_geometry must be called before render"))?;
        let camera = inputs
            .camera
            .ok_or(RendererError::MissingPrecondition("set_camera must be called before render"))?;

        self.phase = FramePhase::Idle;
        let plan = {
            let _span = tracy_client::span!("FrameSubmissionPipeline::advance");
            self.transition(FramePhase::ResourcesAdvanced)?;
            let profile = self.settings.profiling.enabled && self.backend.profile_this_frame();
            self.state.advance(&time, camera, profile)
        };

        let result = self.submit_frame(&plan, on_complete);
        if let Err(e) = &result {
            log::error!("{} aborted in phase {:?}: {}", plan.name, self.phase, e);
            self.backend.abort_frame(&plan);
        }
        self.phase = FramePhase::Idle;
        result
    }

    fn submit_frame(&mut self, plan: &FramePlan, on_complete: CompletionHandler) -> RendererResult<()> {
        self.backend.begin_frame(plan)?;
        let grid_width = self.backend.update_geometry(plan)?;
        let arguments = self.state.pack_arguments(plan, grid_width)?;
        let lights = LightNormalizer::pack(self.state.lights());
        self.backend.encode_geometry(plan, &arguments, &lights)?;
        self.transition(FramePhase::GeometryEncoded)?;

        if plan.profile {
            self.backend.commit_profiled(plan)?;
            self.transition(FramePhase::Profiled)?;
        }

        let surface = self.backend.acquire_surface(plan)?;
        self.transition(FramePhase::SurfaceAcquired)?;

        self.backend.upscale(plan, &surface)?;
        self.transition(FramePhase::Upscaled)?;

        self.backend.present(plan, surface, on_complete)?;
        self.transition(FramePhase::Presented)?;

        self.transition(FramePhase::Idle)
    }

    fn transition(&mut self, to: FramePhase) -> RendererResult<()> {
        if !self.phase.can_transition(to) {
            return Err(RendererError::PhaseViolation { from: self.phase, to });
        }
        self.phase = to;
        Ok(())
    }
}
// getters
impl<B: FrameBackend> FrameSubmissionPipeline<B> {
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    #[inline]
    pub fn extent(&self) -> RenderExtent {
        self.extent
    }

    #[inline]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// 是否已经因为致命错误停止工作
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use approx::assert_relative_eq;
    use molvis_render_interface::{
        arguments::ARGUMENT_SLOT_SIZE,
        atoms::{ArrayAtomProvider, StaticStyleProvider},
        frame_counter::{LightBankLabel, SurfaceSlot},
        light::LightFlags,
    };

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Vec<&'static str>,
        fail_at: Option<&'static str>,
        atoms: Vec<Atom>,
        slots: Vec<SurfaceSlot>,
        banks: Vec<LightBankLabel>,
        resets: Vec<bool>,
        arguments: Vec<Vec<u8>>,
        lights: Vec<Vec<GpuLight>>,
        capacity: usize,
        /// 第 i 帧是否请求采样，超出部分视为不请求
        profile_requests: Vec<bool>,
        profiled: Vec<bool>,
    }
    impl RecordingBackend {
        fn record(&mut self, call: &'static str) -> RendererResult<()> {
            self.calls.push(call);
            if self.fail_at == Some(call) {
                return Err(RendererError::MissingPrecondition("injected failure"));
            }
            Ok(())
        }
    }
    impl FrameBackend for RecordingBackend {
        type Surface = SurfaceSlot;

        fn set_geometry(&mut self, atoms: Vec<Atom>, _styles: &[AtomStyle]) -> RendererResult<()> {
            self.atoms = atoms;
            Ok(())
        }

        fn reserve_lights(&mut self, count: usize) -> RendererResult<LightBankStatus> {
            if count <= self.capacity {
                return Ok(LightBankStatus::Reused);
            }
            self.capacity = count;
            Ok(LightBankStatus::Grown { bytes: count as u64 * 48 })
        }

        fn profile_this_frame(&self) -> bool {
            self.profile_requests.get(self.slots.len()).copied().unwrap_or(false)
        }

        fn begin_frame(&mut self, plan: &FramePlan) -> RendererResult<()> {
            self.slots.push(plan.surface_slot);
            self.banks.push(plan.render_index);
            self.resets.push(plan.reset);
            self.profiled.push(plan.profile);
            self.record("begin_frame")
        }

        fn update_geometry(&mut self, _plan: &FramePlan) -> RendererResult<u16> {
            self.record("update_geometry")?;
            Ok(32)
        }

        fn encode_geometry(
            &mut self,
            _plan: &FramePlan,
            arguments: &PackedArgumentBlock,
            lights: &[GpuLight],
        ) -> RendererResult<()> {
            self.arguments.push(arguments.as_bytes().to_vec());
            self.lights.push(lights.to_vec());
            self.record("encode_geometry")
        }

        fn commit_profiled(&mut self, _plan: &FramePlan) -> RendererResult<()> {
            self.record("commit_profiled")
        }

        fn acquire_surface(&mut self, plan: &FramePlan) -> RendererResult<SurfaceSlot> {
            self.record("acquire_surface")?;
            Ok(plan.surface_slot)
        }

        fn upscale(&mut self, plan: &FramePlan, surface: &SurfaceSlot) -> RendererResult<()> {
            assert_eq!(*surface, plan.surface_slot);
            self.record("upscale")
        }

        fn present(&mut self, _plan: &FramePlan, _surface: SurfaceSlot, on_complete: CompletionHandler) -> RendererResult<()> {
            self.record("present")?;
            on_complete();
            Ok(())
        }

        fn abort_frame(&mut self, _plan: &FramePlan) {
            self.calls.push("abort_frame");
        }
    }

    fn pipeline(profiling: bool) -> FrameSubmissionPipeline<RecordingBackend> {
        molvis_crate_tools::init_log::init_log();
        let mut settings = RendererSettings::default();
        settings.profiling.enabled = profiling;
        FrameSubmissionPipeline::new(RecordingBackend::default(), RenderExtent::new(640, 640).unwrap(), settings).unwrap()
    }

    fn styles() -> StaticStyleProvider {
        StaticStyleProvider::new(vec![AtomStyle::new([1.0, 1.0, 1.0], 0.5)])
    }

    fn lights() -> Vec<Light> {
        vec![
            Light::new(glam::Vec3::ZERO, 1.0, 1.0),
            Light::new(glam::Vec3::X, 1.0, 3.0),
            Light::new(glam::Vec3::Y, 2.0, 0.0),
        ]
    }

    fn prepare(pipeline: &mut FrameSubmissionPipeline<RecordingBackend>, absolute_frame: u64) {
        let mut atoms = ArrayAtomProvider::new(vec![Atom::new(glam::Vec3::ZERO, 0)]);
        pipeline
            .set_geometry(TimeContext::new(absolute_frame, 1, 60), &mut atoms, &styles())
            .unwrap();
        pipeline
            .set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0))
            .unwrap();
    }

    fn frame(pipeline: &mut FrameSubmissionPipeline<RecordingBackend>, absolute_frame: u64) -> RendererResult<()> {
        prepare(pipeline, absolute_frame);
        pipeline.render(Box::new(|| ()))
    }

    #[test]
    fn test_stage_order() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();
        assert_eq!(
            pipeline.backend().calls,
            vec!["begin_frame", "update_geometry", "encode_geometry", "acquire_surface", "upscale", "present"]
        );
        assert_eq!(pipeline.phase(), FramePhase::Idle);
    }

    #[test]
    fn test_profiling_commits_before_acquire() {
        let mut pipeline = pipeline(true);
        pipeline.backend_mut().profile_requests = vec![true];
        frame(&mut pipeline, 0).unwrap();
        assert_eq!(
            pipeline.backend().calls,
            vec![
                "begin_frame",
                "update_geometry",
                "encode_geometry",
                "commit_profiled",
                "acquire_surface",
                "upscale",
                "present"
            ]
        );
    }

    #[test]
    fn test_profiling_follows_per_frame_requests() {
        let mut pipeline = pipeline(true);
        pipeline.backend_mut().profile_requests = vec![false, true, false, true];
        for abs in 0..4 {
            frame(&mut pipeline, abs).unwrap();
        }
        let backend = pipeline.backend();
        assert_eq!(backend.profiled, vec![false, true, false, true]);
        assert_eq!(backend.calls.iter().filter(|call| **call == "commit_profiled").count(), 2);
    }

    #[test]
    fn test_profiling_disabled_ignores_requests() {
        let mut pipeline = pipeline(false);
        pipeline.backend_mut().profile_requests = vec![true, true];
        frame(&mut pipeline, 0).unwrap();
        frame(&mut pipeline, 1).unwrap();
        assert_eq!(pipeline.backend().profiled, vec![false, false]);
        assert!(!pipeline.backend().calls.contains(&"commit_profiled"));
    }

    #[test]
    fn test_slots_and_banks_rotate() {
        let mut pipeline = pipeline(false);
        for abs in 0..6 {
            frame(&mut pipeline, abs).unwrap();
        }
        let backend = pipeline.backend();
        assert_eq!(
            backend.slots,
            vec![SurfaceSlot::B, SurfaceSlot::A, SurfaceSlot::B, SurfaceSlot::A, SurfaceSlot::B, SurfaceSlot::A]
        );
        assert_eq!(
            backend.banks,
            vec![
                LightBankLabel::B,
                LightBankLabel::C,
                LightBankLabel::A,
                LightBankLabel::B,
                LightBankLabel::C,
                LightBankLabel::A
            ]
        );
    }

    #[test]
    fn test_reset_flags_follow_absolute_frames() {
        let mut pipeline = pipeline(false);
        for abs in [5, 6, 0, 1] {
            frame(&mut pipeline, abs).unwrap();
        }
        assert_eq!(pipeline.backend().resets, vec![false, false, true, false]);
    }

    #[test]
    fn test_first_frame_previous_equals_current() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();
        let block = &pipeline.backend().arguments[0];
        assert_eq!(block[..ARGUMENT_SLOT_SIZE], block[ARGUMENT_SLOT_SIZE..]);

        let arguments = pipeline.state().arguments();
        assert_eq!(arguments.current(), arguments.previous());
        assert_eq!(arguments.current().unwrap().grid_width, 32);
    }

    #[test]
    fn test_second_frame_previous_is_prior_current() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();
        let first = *pipeline.state().arguments().current().unwrap();
        frame(&mut pipeline, 1).unwrap();

        let block = &pipeline.backend().arguments[1];
        assert_eq!(&block[ARGUMENT_SLOT_SIZE..ARGUMENT_SLOT_SIZE + size_of::<RenderArguments>()], bytemuck::bytes_of(&first));
        assert_eq!(pipeline.state().arguments().previous(), Some(&first));
    }

    #[test]
    fn test_lights_are_normalized_and_flagged() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();

        let lights = pipeline.state().lights();
        let diffuse = lights.iter().map(|l| l.diffuse_power).collect::<Vec<_>>();
        assert_eq!(diffuse, vec![0.25, 0.25, 0.5]);
        assert!(lights[0].flags.contains(LightFlags::CAMERA_CENTERED));
        assert!(!lights[1].flags.contains(LightFlags::CAMERA_CENTERED));
        assert_eq!(pipeline.backend().lights[0].len(), 3);
        assert_eq!(pipeline.state().arguments().current().unwrap().light_count, 3);
    }

    #[test]
    fn test_light_bank_grows_once() {
        let mut pipeline = pipeline(false);
        let mut atoms = ArrayAtomProvider::new(vec![]);
        pipeline
            .set_geometry(TimeContext::new(0, 1, 60), &mut atoms, &styles())
            .unwrap();
        let status = pipeline
            .set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0))
            .unwrap();
        assert!(matches!(status, LightBankStatus::Grown { .. }));
        pipeline.render(Box::new(|| ())).unwrap();

        pipeline
            .set_geometry(TimeContext::new(1, 1, 60), &mut atoms, &styles())
            .unwrap();
        let status = pipeline
            .set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0))
            .unwrap();
        assert_eq!(status, LightBankStatus::Reused);
    }

    #[test]
    fn test_fov_multiplier_uses_half_intermediate_width() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();
        let current = pipeline.state().arguments().current().unwrap();
        assert_eq!(current.fov_multiplier, 1.0 / 160.0);
    }

    #[test]
    fn test_quality_scales_with_output() {
        let mut pipeline = pipeline(false);
        frame(&mut pipeline, 0).unwrap();
        let current = pipeline.state().arguments().current().unwrap();
        // 640x640 输出是标定分辨率 1280x1280 的一半
        assert_relative_eq!(current.quality_coefficient.to_f32(), 0.5);
        assert_relative_eq!(current.max_samples.to_f32(), 4.0);
    }

    #[test]
    fn test_completion_handler_runs() {
        let mut pipeline = pipeline(false);
        prepare(&mut pipeline, 0);
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = count.clone();
        pipeline
            .render(Box::new(move || {
                handler_count.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_without_geometry_fails() {
        let mut pipeline = pipeline(false);
        pipeline
            .set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0))
            .unwrap();
        assert!(matches!(
            pipeline.render(Box::new(|| ())),
            Err(RendererError::MissingPrecondition(_))
        ));
        assert!(pipeline.backend().calls.is_empty());
        // 没有被渲染的相机不会进入参数双缓冲
        assert!(pipeline.state().arguments().current().is_none());
        assert!(pipeline.is_failed());
    }

    #[test]
    fn test_calls_after_fatal_error_are_rejected() {
        let mut pipeline = pipeline(false);
        pipeline
            .set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0))
            .unwrap();
        assert!(pipeline.render(Box::new(|| ())).is_err());

        let mut atoms = ArrayAtomProvider::new(vec![Atom::new(glam::Vec3::ZERO, 0)]);
        assert!(matches!(
            pipeline.set_geometry(TimeContext::new(0, 1, 60), &mut atoms, &styles()),
            Err(RendererError::Poisoned)
        ));
        assert!(matches!(
            pipeline.set_camera(90.0, glam::Vec3::splat(5.0), glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0)),
            Err(RendererError::Poisoned)
        ));
        assert!(matches!(pipeline.render(Box::new(|| ())), Err(RendererError::Poisoned)));
        assert!(pipeline.backend().calls.is_empty());
        assert!(pipeline.state().arguments().current().is_none());
    }

    #[test]
    fn test_render_without_camera_fails_and_clears_time() {
        let mut pipeline = pipeline(false);
        let mut atoms = ArrayAtomProvider::new(vec![]);
        pipeline
            .set_geometry(TimeContext::new(0, 1, 60), &mut atoms, &styles())
            .unwrap();
        assert!(matches!(
            pipeline.render(Box::new(|| ())),
            Err(RendererError::MissingPrecondition(_))
        ));
        assert!(!pipeline.state().time_pending());
    }

    #[test]
    fn test_set_camera_twice_fails() {
        let mut pipeline = pipeline(false);
        prepare(&mut pipeline, 0);
        assert!(matches!(
            pipeline.set_camera(90.0, glam::Vec3::ZERO, glam::Mat3::IDENTITY, &lights(), Quality::new(1.0, 4.0, 1.0)),
            Err(RendererError::MissingPrecondition(_))
        ));
        assert!(matches!(pipeline.render(Box::new(|| ())), Err(RendererError::Poisoned)));
    }

    #[test]
    fn test_backend_failure_aborts_and_latches() {
        let mut pipeline = pipeline(false);
        pipeline.backend_mut().fail_at = Some("acquire_surface");
        assert!(frame(&mut pipeline, 0).is_err());
        assert_eq!(pipeline.backend().calls.last(), Some(&"abort_frame"));
        assert!(!pipeline.backend().calls.contains(&"upscale"));
        assert_eq!(pipeline.phase(), FramePhase::Idle);
        assert!(pipeline.is_failed());

        // 致命错误之后不再提交任何帧
        pipeline.backend_mut().fail_at = None;
        let calls = pipeline.backend().calls.len();
        let mut atoms = ArrayAtomProvider::new(vec![]);
        assert!(matches!(
            pipeline.set_geometry(TimeContext::new(1, 1, 60), &mut atoms, &styles()),
            Err(RendererError::Poisoned)
        ));
        assert!(matches!(pipeline.render(Box::new(|| ())), Err(RendererError::Poisoned)));
        assert_eq!(pipeline.backend().calls.len(), calls);
    }

    #[test]
    fn test_unavailable_elements_fall_back() {
        let mut pipeline = pipeline(false);
        let mut atoms = ArrayAtomProvider::new(vec![Atom::new(glam::Vec3::ZERO, 0), Atom::new(glam::Vec3::X, 9)]);
        pipeline
            .set_geometry(TimeContext::new(0, 1, 60), &mut atoms, &styles())
            .unwrap();
        let atoms = &pipeline.backend().atoms;
        assert_eq!(atoms[0].flags, 0);
        assert_eq!(atoms[1].element, 0);
        assert_eq!(atoms[1].flags, 0x3);
    }

    #[test]
    fn test_phase_transitions() {
        use FramePhase::*;
        assert!(Idle.can_transition(ResourcesAdvanced));
        assert!(GeometryEncoded.can_transition(SurfaceAcquired));
        assert!(GeometryEncoded.can_transition(Profiled));
        assert!(!Idle.can_transition(GeometryEncoded));
        assert!(!SurfaceAcquired.can_transition(Profiled));
        assert!(!Upscaled.can_transition(Idle));
    }
}
