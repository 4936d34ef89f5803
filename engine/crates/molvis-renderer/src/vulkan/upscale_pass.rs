use std::{ffi::CStr, path::Path};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use molvis_gfx::{
    basic::color::LabelColor,
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    gfx::Gfx,
    pipelines::{compute_pipeline::GfxComputePipeline, descriptor_write::GfxWriteDescriptorSet},
    resources::image::GfxImage2D,
};
use molvis_render_interface::{render_extent::RenderExtent, settings::UpscalerSettings};

use crate::{
    error::{RendererError, RendererResult},
    frame_state::FramePlan,
    vulkan::surface_ring::SurfaceSet,
};

/// 时域上采样 shader 的 push constant
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UpscaleParams {
    /// 光追使用的抖动取反，单位为中间分辨率的像素
    pub jitter: [f32; 2],
    /// 非 0 时丢弃历史
    pub reset: u32,
    pub depth_reversed: u32,
    pub motion_vector_scale: f32,
    pub history_weight: f32,
    pub input_extent: [u32; 2],
    pub output_extent: [u32; 2],
}
impl UpscaleParams {
    pub fn new(plan: &FramePlan, extent: &RenderExtent, settings: &UpscalerSettings, history_valid: bool) -> Self {
        let input = extent.intermediate();
        let output = extent.output();
        Self {
            jitter: (-plan.jitter).to_array(),
            reset: (plan.reset || !history_valid) as u32,
            depth_reversed: settings.depth_reversed as u32,
            motion_vector_scale: settings.motion_vector_scale,
            history_weight: settings.history_weight,
            input_extent: [input.width, input.height],
            output_extent: [output.width, output.height],
        }
    }
}

mod binding {
    pub const COLOR: u32 = 0;
    pub const DEPTH: u32 = 1;
    pub const MOTION: u32 = 2;
    pub const HISTORY: u32 = 3;
    pub const OUTPUT: u32 = 4;
}

/// 时域上采样 pass
///
/// 以另一个槽位的 upscaled 作为历史，写入当前槽位的 upscaled，再 blit 到 swapchain image。
pub struct UpscalePass {
    pipeline: GfxComputePipeline<UpscaleParams>,
}
impl UpscalePass {
    pub const GROUP_SIZE: u32 = 8;

    pub fn new(shader_path: &Path, entry_point: &CStr) -> RendererResult<Self> {
        if !Gfx::get().format_supports(SurfaceSet::UPSCALED_FORMAT, vk::FormatFeatureFlags::BLIT_SRC) {
            return Err(RendererError::EnvironmentUnavailable(format!(
                "{:?} cannot be used as blit source",
                SurfaceSet::UPSCALED_FORMAT
            )));
        }

        let bindings = [binding::COLOR, binding::DEPTH, binding::MOTION, binding::HISTORY, binding::OUTPUT]
            .map(|binding| GfxComputePipeline::<UpscaleParams>::storage_binding(binding, vk::DescriptorType::STORAGE_IMAGE));
        let pipeline = GfxComputePipeline::new(shader_path, entry_point, &bindings, &[], "temporal-upscale")?;

        log::info!("temporal upscale pipeline created from {}", shader_path.display());
        Ok(Self { pipeline })
    }

    pub fn encode(
        &self,
        cmd: &GfxCommandBuffer,
        params: &UpscaleParams,
        current: &SurfaceSet,
        history: &SurfaceSet,
        target: vk::Image,
        target_extent: vk::Extent2D,
    ) {
        let _span = tracy_client::span!("UpscalePass::encode");
        cmd.begin_label("temporal-upscale", LabelColor::COLOR_PASS);

        let output = current.upscaled.image();
        let history_image = history.upscaled.image();
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[
                // 两帧之前被 blit 读取，上一帧被当作历史读取
                GfxImageBarrier::new()
                    .image(output.handle())
                    .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                    .src_mask(
                        vk::PipelineStageFlags2::COMPUTE_SHADER | vk::PipelineStageFlags2::BLIT,
                        vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::TRANSFER_READ,
                    )
                    .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE),
                GfxImageBarrier::new()
                    .image(history_image.handle())
                    .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                    .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
                    .dst_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ),
            ],
        );

        let writes = [
            GfxWriteDescriptorSet::storage_image(binding::COLOR, current.color.view()),
            GfxWriteDescriptorSet::storage_image(binding::DEPTH, current.depth.view()),
            GfxWriteDescriptorSet::storage_image(binding::MOTION, current.motion.view()),
            GfxWriteDescriptorSet::storage_image(binding::HISTORY, history.upscaled.view()),
            GfxWriteDescriptorSet::storage_image(binding::OUTPUT, current.upscaled.view()),
        ];
        self.pipeline.bind(cmd, &writes, params);
        cmd.cmd_dispatch(RenderExtent::dispatch_groups(output.extent(), Self::GROUP_SIZE));
        cmd.end_label();

        Self::blit_to_target(cmd, output, target, target_extent);
    }

    /// upscaled 保持 GENERAL；swapchain image 最终进入 PRESENT_SRC
    fn blit_to_target(cmd: &GfxCommandBuffer, source: &GfxImage2D, target: vk::Image, target_extent: vk::Extent2D) {
        cmd.begin_label("blit-to-swapchain", LabelColor::COLOR_CMD);
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[
                GfxImageBarrier::new()
                    .image(source.handle())
                    .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                    .src_mask(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
                    .dst_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_READ),
                GfxImageBarrier::new()
                    .image(target)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::NONE)
                    .dst_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_WRITE),
            ],
        );

        let layers = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);
        let corner = |extent: vk::Extent2D| vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        };
        let region = vk::ImageBlit2::default()
            .src_subresource(layers)
            .src_offsets([vk::Offset3D::default(), corner(source.extent())])
            .dst_subresource(layers)
            .dst_offsets([vk::Offset3D::default(), corner(target_extent)]);
        let blit_info = vk::BlitImageInfo2::default()
            .src_image(source.handle())
            .src_image_layout(vk::ImageLayout::GENERAL)
            .dst_image(target)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .regions(std::slice::from_ref(&region))
            .filter(vk::Filter::NEAREST);
        cmd.cmd_blit_image(&blit_info);

        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxImageBarrier::new()
                .image(target)
                .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR)
                .src_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_WRITE)
                .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE)],
        );
        cmd.end_label();
    }
}
