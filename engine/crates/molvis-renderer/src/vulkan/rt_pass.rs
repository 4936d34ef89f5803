use std::path::Path;

use ash::vk;
use itertools::Itertools;
use molvis_gfx::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBarrierMask, GfxImageBarrier},
        command_buffer::GfxCommandBuffer,
    },
    pipelines::{compute_pipeline::GfxComputePipeline, descriptor_write::GfxWriteDescriptorSet},
};
use molvis_render_interface::render_extent::RenderExtent;

use crate::{
    error::RendererResult,
    frame_state::FramePlan,
    vulkan::{
        accel::AccelBuilder, argument_buffer::ArgumentBuffers, gpu_light_bank::GpuLightBank, surface_ring::SurfaceSet,
    },
};

mod binding {
    pub const ARGUMENTS: u32 = 0;
    pub const STYLES: u32 = 1;
    pub const LIGHTS: u32 = 2;
    pub const COLOR: u32 = 3;
    pub const DEPTH: u32 = 4;
    pub const MOTION: u32 = 5;

    /// 加速结构使用的 descriptor set
    pub const ACCEL_SET: u32 = 1;
}

/// 光追 pass：把本帧的 color、depth、motion 写入当前槽位
pub struct RtPass {
    pipeline: GfxComputePipeline<()>,
}
impl RtPass {
    pub const GROUP_SIZE: u32 = 8;

    pub fn new(
        shader_path: &Path,
        entry_point: &std::ffi::CStr,
        accel_set_layout: vk::DescriptorSetLayout,
    ) -> RendererResult<Self> {
        let bindings = [
            (binding::ARGUMENTS, vk::DescriptorType::STORAGE_BUFFER),
            (binding::STYLES, vk::DescriptorType::STORAGE_BUFFER),
            (binding::LIGHTS, vk::DescriptorType::STORAGE_BUFFER),
            (binding::COLOR, vk::DescriptorType::STORAGE_IMAGE),
            (binding::DEPTH, vk::DescriptorType::STORAGE_IMAGE),
            (binding::MOTION, vk::DescriptorType::STORAGE_IMAGE),
        ]
        .into_iter()
        .map(|(binding, ty)| GfxComputePipeline::<()>::storage_binding(binding, ty))
        .collect_vec();

        let pipeline = GfxComputePipeline::new(shader_path, entry_point, &bindings, &[accel_set_layout], "raytrace")?;
        log::info!("raytrace pipeline created from {}", shader_path.display());
        Ok(Self { pipeline })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode<A: AccelBuilder>(
        &self,
        cmd: &GfxCommandBuffer,
        plan: &FramePlan,
        extent: &RenderExtent,
        surfaces: &SurfaceSet,
        arguments: &ArgumentBuffers,
        lights: &GpuLightBank,
        accel: &A,
    ) {
        let _span = tracy_client::span!("RtPass::encode");
        cmd.begin_label("raytrace", LabelColor::COLOR_PASS);

        let targets = [surfaces.color.image(), surfaces.depth.image(), surfaces.motion.image()];

        // 该槽位上一次被两帧之前的上采样读取
        let before = targets
            .iter()
            .map(|image| {
                GfxImageBarrier::new()
                    .image(image.handle())
                    .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                    .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ)
                    .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
            })
            .collect_vec();
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &before);

        let bank = plan.render_index;
        let writes = [
            arguments.arguments_write(binding::ARGUMENTS, bank),
            arguments.styles_write(binding::STYLES, bank),
            lights.descriptor_write(binding::LIGHTS, bank),
            GfxWriteDescriptorSet::storage_image(binding::COLOR, surfaces.color.view()),
            GfxWriteDescriptorSet::storage_image(binding::DEPTH, surfaces.depth.view()),
            GfxWriteDescriptorSet::storage_image(binding::MOTION, surfaces.motion.view()),
        ];
        self.pipeline.bind(cmd, &writes, &());
        accel.bind_grid(cmd, self.pipeline.pipeline_layout(), binding::ACCEL_SET);
        cmd.cmd_dispatch(RenderExtent::dispatch_groups(extent.intermediate(), Self::GROUP_SIZE));

        let after = targets
            .iter()
            .map(|image| {
                GfxImageBarrier::new()
                    .image(image.handle())
                    .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                    .mask(GfxBarrierMask::COMPUTE_WRITE_TO_READ)
            })
            .collect_vec();
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &after);

        cmd.end_label();
    }
}
