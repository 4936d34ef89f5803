use ash::vk;
use molvis_gfx::{
    commands::{
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        semaphore::{GfxSemaphore, wait_timeline},
        submit_info::GfxSubmitInfo,
    },
    error::GfxResult,
    gfx::Gfx,
    swapchain::{
        render_swapchain::{GfxRenderSwapchain, GfxSwapchainDesc},
        surface::GfxSurface,
    },
};
use molvis_render_interface::{
    arguments::PackedArgumentBlock,
    atoms::{Atom, AtomStyle},
    frame_counter::FrameCounter,
    light::GpuLight,
    render_extent::RenderExtent,
    settings::{RendererSettings, UpscalerSettings},
};

use crate::{
    completion::CompletionWorker,
    error::{RendererError, RendererResult},
    frame_pipeline::{CompletionHandler, FrameBackend},
    frame_state::FramePlan,
    light_bank::LightBankStatus,
    renderer::ShaderBinaries,
    vulkan::{
        accel::AccelBuilder,
        argument_buffer::ArgumentBuffers,
        gpu_light_bank::GpuLightBank,
        profiler::GeometryProfiler,
        rt_pass::RtPass,
        surface_ring::SurfaceRing,
        upscale_pass::{UpscalePass, UpscaleParams},
    },
};

/// 第 N 帧提前提交时 signal 的值
#[inline]
fn geometry_timeline_value(jitter_frame_id: u64) -> u64 {
    2 * jitter_frame_id - 1
}

/// 第 N 帧全部提交后 signal 的值
#[inline]
fn frame_timeline_value(jitter_frame_id: u64) -> u64 {
    2 * jitter_frame_id
}

/// 开始第 N 帧之前需要等待的值：复用同一组帧资源的第 N-3 帧
///
/// 中途失败的帧不会 signal，因此不超过已经提交过的最大值
fn reuse_wait_value(jitter_frame_id: u64, last_submitted: u64) -> Option<u64> {
    let ring = FrameCounter::LIGHT_RING_SIZE as u64;
    if jitter_frame_id <= ring {
        return None;
    }
    Some(frame_timeline_value(jitter_frame_id - ring).min(last_submitted)).filter(|value| *value > 0)
}

/// 每个 render index 的命令与同步对象
struct FrameResources {
    /// 几何部分，不采样耗时时也包含上采样
    main_cmd: GfxCommandBuffer,
    /// 提前提交之后的上采样部分
    tail_cmd: GfxCommandBuffer,
    acquire_semaphore: GfxSemaphore,
}
impl FrameResources {
    fn new(pool: &GfxCommandPool, label: impl std::fmt::Display) -> RendererResult<Self> {
        Ok(Self {
            main_cmd: GfxCommandBuffer::new(pool, &format!("frame-{}-main", label))?,
            tail_cmd: GfxCommandBuffer::new(pool, &format!("frame-{}-tail", label))?,
            acquire_semaphore: GfxSemaphore::new(&format!("frame-{}-acquire", label))?,
        })
    }
}

/// 本帧获取到的 swapchain image
#[derive(Debug, Clone, Copy)]
pub struct AcquiredSurface {
    pub image_index: usize,
    pub image: vk::Image,
    pub extent: vk::Extent2D,
}

/// 基于 Vulkan 的 [`FrameBackend`]
///
/// 每帧的 GPU 工作 signal 同一个 timeline semaphore：提前提交时为 `2N-1`，整帧为 `2N`。
///
/// # destroy
/// 字段按声明顺序销毁：完成回调线程最先 join，command pool 最后销毁。
/// 调用方需要保证销毁前 GPU 已经空闲。
pub struct VulkanFrameBackend<A: AccelBuilder> {
    completion: CompletionWorker,

    accel: A,
    rt_pass: RtPass,
    upscale_pass: UpscalePass,
    profiler: Option<GeometryProfiler>,

    light_bank: GpuLightBank,
    argument_buffers: ArgumentBuffers,
    surfaces: SurfaceRing,

    frames: [FrameResources; FrameCounter::LIGHT_RING_SIZE],
    /// 以 swapchain image index 索引
    present_semaphores: Vec<GfxSemaphore>,
    timeline: GfxSemaphore,
    swapchain: GfxRenderSwapchain,
    /// 帧资源中的 command buffer 从这里分配
    _command_pool: GfxCommandPool,

    extent: RenderExtent,
    upscaler: UpscalerSettings,
    styles: Vec<AtomStyle>,

    /// 正在录制的命令
    recording: Option<GfxCommandBuffer>,
    need_recreate: bool,
    /// 另一个槽位的 upscaled 是否是完整的上一帧
    history_valid: bool,
    last_submitted: u64,
}

// new & init
impl<A: AccelBuilder> VulkanFrameBackend<A> {
    pub fn new(
        surface: GfxSurface,
        extent: RenderExtent,
        settings: &RendererSettings,
        shaders: &ShaderBinaries,
        accel: A,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("VulkanFrameBackend::new");
        let gfx = Gfx::get();

        let present_mode = if settings.present.vsync {
            vk::PresentModeKHR::FIFO
        } else {
            vk::PresentModeKHR::MAILBOX
        };
        let swapchain = GfxRenderSwapchain::new(
            surface,
            GfxSwapchainDesc {
                extent: extent.output(),
                present_mode,
                surface_format: vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            },
        )?;
        Self::check_surface(&swapchain, &extent)?;

        let command_pool = GfxCommandPool::new(
            gfx.gfx_queue().queue_family().clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame",
        )?;
        let [a, b, c] = FrameCounter::light_banks();
        let frames = [
            FrameResources::new(&command_pool, a)?,
            FrameResources::new(&command_pool, b)?,
            FrameResources::new(&command_pool, c)?,
        ];
        let present_semaphores = Self::create_present_semaphores(swapchain.image_count())?;
        let timeline = GfxSemaphore::new_timeline(0, "frame-timeline")?;

        let rt_pass = RtPass::new(&shaders.raytrace, &shaders.entry_point, accel.descriptor_set_layout())?;
        let upscale_pass = UpscalePass::new(&shaders.upscale, &shaders.entry_point)?;
        let profiler = if settings.profiling.enabled { GeometryProfiler::new()? } else { None };

        let device = gfx.gfx_device().ash_device().clone();
        let timeline_handle = timeline.handle();
        let completion = CompletionWorker::new("Frame-Completion", move |value| {
            wait_timeline(&device, timeline_handle, value, u64::MAX).map_err(|e| e.to_string())
        })
        .map_err(|e| RendererError::EnvironmentUnavailable(format!("failed to spawn completion thread: {}", e)))?;

        Ok(Self {
            completion,
            accel,
            rt_pass,
            upscale_pass,
            profiler,
            light_bank: GpuLightBank::new()?,
            argument_buffers: ArgumentBuffers::new()?,
            surfaces: SurfaceRing::new(&extent)?,
            frames,
            present_semaphores,
            timeline,
            swapchain,
            _command_pool: command_pool,
            extent,
            upscaler: settings.upscaler,
            styles: vec![],
            recording: None,
            need_recreate: false,
            history_valid: false,
            last_submitted: 0,
        })
    }

    fn create_present_semaphores(count: usize) -> RendererResult<Vec<GfxSemaphore>> {
        let semaphores = (0..count)
            .map(|idx| GfxSemaphore::new(&format!("present-{}", idx)))
            .collect::<GfxResult<Vec<_>>>()?;
        Ok(semaphores)
    }

    /// swapchain 的大小必须与输出分辨率一致，blit 不做缩放
    fn check_surface(swapchain: &GfxRenderSwapchain, extent: &RenderExtent) -> RendererResult<()> {
        if swapchain.extent() != extent.output() {
            return Err(RendererError::SurfaceMismatch {
                expected: extent.output(),
                actual: swapchain.extent(),
            });
        }
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> RendererResult<()> {
        let _span = tracy_client::span!("VulkanFrameBackend::recreate_swapchain");
        Gfx::get().wait_idle()?;
        self.swapchain.rebuild(self.extent.output())?;
        if self.swapchain.image_count() != self.present_semaphores.len() {
            self.present_semaphores = Self::create_present_semaphores(self.swapchain.image_count())?;
        }
        self.need_recreate = false;
        Self::check_surface(&self.swapchain, &self.extent)
    }
}
// getters
impl<A: AccelBuilder> VulkanFrameBackend<A> {
    #[inline]
    pub fn accel(&self) -> &A {
        &self.accel
    }

    #[inline]
    pub fn accel_mut(&mut self) -> &mut A {
        &mut self.accel
    }

    #[inline]
    pub fn last_submitted(&self) -> u64 {
        self.last_submitted
    }

    fn recording(&self) -> RendererResult<&GfxCommandBuffer> {
        self.recording
            .as_ref()
            .ok_or(RendererError::MissingPrecondition("no command buffer is recording for this frame"))
    }
}

impl<A: AccelBuilder> FrameBackend for VulkanFrameBackend<A> {
    type Surface = AcquiredSurface;

    fn set_geometry(&mut self, atoms: Vec<Atom>, styles: &[AtomStyle]) -> RendererResult<()> {
        self.styles = styles.to_vec();
        self.accel.set_geometry(atoms, styles)
    }

    fn reserve_lights(&mut self, count: usize) -> RendererResult<LightBankStatus> {
        self.light_bank.reserve(count, self.last_submitted)
    }

    fn profile_this_frame(&self) -> bool {
        self.profiler.is_some() && self.accel.profile_this_frame()
    }

    fn begin_frame(&mut self, plan: &FramePlan) -> RendererResult<()> {
        let frame_id = plan.context.jitter_frame_id;
        if let Some(value) = reuse_wait_value(frame_id, self.last_submitted) {
            let _span = tracy_client::span!("VulkanFrameBackend::wait_frame_reuse");
            self.timeline.wait_timeline(value, u64::MAX)?;
            // 第 N-3 帧的耗时读取在本帧重置 query 之前必须结束
            self.completion.wait_processed(value);
        }
        self.light_bank.reclaim(self.timeline.timeline_value()?);

        let frame = &self.frames[*plan.render_index];
        frame.main_cmd.reset()?;
        frame.tail_cmd.reset()?;
        let cmd = frame.main_cmd.clone();
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &plan.name)?;
        if plan.profile
            && let Some(profiler) = &self.profiler
        {
            profiler.record_begin(&cmd, plan.render_index);
        }
        self.recording = Some(cmd);
        Ok(())
    }

    fn update_geometry(&mut self, plan: &FramePlan) -> RendererResult<u16> {
        let cmd = self.recording()?.clone();
        self.accel.update_resources(&plan.context)?;
        self.accel.build_dense_grid(&cmd)?;
        Ok(self.accel.grid_width())
    }

    fn encode_geometry(
        &mut self,
        plan: &FramePlan,
        arguments: &PackedArgumentBlock,
        lights: &[GpuLight],
    ) -> RendererResult<()> {
        let cmd = self.recording()?;
        self.light_bank.write(plan.render_index, lights)?;
        self.argument_buffers.record_upload(cmd, plan.render_index, arguments, &self.styles);
        self.rt_pass.encode(
            cmd,
            plan,
            &self.extent,
            self.surfaces.set(plan.surface_slot),
            &self.argument_buffers,
            &self.light_bank,
            &self.accel,
        );
        if plan.profile
            && let Some(profiler) = &self.profiler
        {
            profiler.record_end(cmd, plan.render_index);
        }
        Ok(())
    }

    fn commit_profiled(&mut self, plan: &FramePlan) -> RendererResult<()> {
        let cmd = self.recording()?.clone();
        cmd.end()?;
        self.recording = None;

        let value = geometry_timeline_value(plan.context.jitter_frame_id);
        Gfx::get().gfx_queue().submit(
            vec![GfxSubmitInfo::new(std::slice::from_ref(&cmd)).signal(
                &self.timeline,
                vk::PipelineStageFlags2::ALL_COMMANDS,
                Some(value),
            )],
            None,
        )?;
        self.last_submitted = value;

        if let Some(profiler) = &self.profiler
            && let Some(handler) = self.accel.sampling_handler()
        {
            self.completion.submit(value, profiler.sampling_task(plan.render_index, handler));
        }

        let tail = self.frames[*plan.render_index].tail_cmd.clone();
        tail.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{}-tail", plan.name))?;
        self.recording = Some(tail);
        Ok(())
    }

    fn acquire_surface(&mut self, plan: &FramePlan) -> RendererResult<AcquiredSurface> {
        if self.need_recreate {
            self.recreate_swapchain()?;
        }

        let semaphore = &self.frames[*plan.render_index].acquire_semaphore;
        if !self.swapchain.acquire_next_image(semaphore, u64::MAX)? {
            log::info!("{} swapchain out of date, rebuilding", plan.name);
            self.recreate_swapchain()?;
            let semaphore = &self.frames[*plan.render_index].acquire_semaphore;
            if !self.swapchain.acquire_next_image(semaphore, u64::MAX)? {
                return Err(RendererError::EnvironmentUnavailable(
                    "swapchain is still out of date after rebuild".to_string(),
                ));
            }
        }

        Ok(AcquiredSurface {
            image_index: self.swapchain.current_image_index(),
            image: self.swapchain.current_image(),
            extent: self.swapchain.extent(),
        })
    }

    fn upscale(&mut self, plan: &FramePlan, surface: &AcquiredSurface) -> RendererResult<()> {
        if surface.extent != self.extent.output() {
            return Err(RendererError::SurfaceMismatch {
                expected: self.extent.output(),
                actual: surface.extent,
            });
        }

        let cmd = self.recording()?;
        let params = UpscaleParams::new(plan, &self.extent, &self.upscaler, self.history_valid);
        self.upscale_pass.encode(
            cmd,
            &params,
            self.surfaces.set(plan.surface_slot),
            self.surfaces.set(plan.surface_slot.other()),
            surface.image,
            surface.extent,
        );
        Ok(())
    }

    fn present(
        &mut self,
        plan: &FramePlan,
        surface: AcquiredSurface,
        on_complete: CompletionHandler,
    ) -> RendererResult<()> {
        let cmd = self.recording()?.clone();
        cmd.end()?;
        self.recording = None;

        let value = frame_timeline_value(plan.context.jitter_frame_id);
        let present_semaphore = &self.present_semaphores[surface.image_index];
        Gfx::get().gfx_queue().submit(
            vec![
                GfxSubmitInfo::new(std::slice::from_ref(&cmd))
                    .wait(
                        &self.frames[*plan.render_index].acquire_semaphore,
                        vk::PipelineStageFlags2::BLIT,
                        None,
                    )
                    .signal(present_semaphore, vk::PipelineStageFlags2::ALL_COMMANDS, None)
                    .signal(&self.timeline, vk::PipelineStageFlags2::ALL_COMMANDS, Some(value)),
            ],
            None,
        )?;
        self.last_submitted = value;
        self.history_valid = true;
        self.completion.submit(value, on_complete);

        if self.swapchain.present_image(Gfx::get().gfx_queue(), &[present_semaphore])? {
            log::info!("{} swapchain suboptimal, rebuilding before next frame", plan.name);
            self.need_recreate = true;
        }
        Ok(())
    }

    fn abort_frame(&mut self, plan: &FramePlan) {
        if let Some(cmd) = self.recording.take()
            && let Err(e) = cmd.end()
        {
            log::error!("{} failed to end aborted command buffer: {}", plan.name, e);
        }
        // 当前槽位可能只写了一半，下一帧不能把它当作历史
        self.history_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_values_interleave() {
        assert_eq!(geometry_timeline_value(1), 1);
        assert_eq!(frame_timeline_value(1), 2);
        assert_eq!(geometry_timeline_value(2), 3);
        assert_eq!(frame_timeline_value(2), 4);
    }

    #[test]
    fn test_reuse_waits_three_frames_back() {
        assert_eq!(reuse_wait_value(1, 2), None);
        assert_eq!(reuse_wait_value(3, 6), None);
        assert_eq!(reuse_wait_value(4, 6), Some(2));
        assert_eq!(reuse_wait_value(10, 18), Some(14));
    }

    #[test]
    fn test_reuse_wait_never_exceeds_submitted() {
        assert_eq!(reuse_wait_value(10, 9), Some(9));
        assert_eq!(reuse_wait_value(5, 0), None);
    }
}
