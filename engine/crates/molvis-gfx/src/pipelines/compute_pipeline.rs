use std::{ffi::CStr, path::Path};

use ash::vk;

use crate::{
    commands::command_buffer::GfxCommandBuffer,
    error::GfxResult,
    gfx::Gfx,
    pipelines::{descriptor_write::GfxWriteDescriptorSet, shader::GfxShaderModule},
};

/// compute shader 与其 pipeline layout
///
/// - set 0 是 push descriptor，由 `bindings` 描述
/// - set 1 之后是外部传入的 descriptor set layout，生命周期由外部管理
/// - 泛型参数 P 表示 compute shader 的参数，以 push constant 的形式传入 shader，
///   为 `()` 时不创建 push constant range
pub struct GfxComputePipeline<P: bytemuck::Pod> {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    push_set_layout: vk::DescriptorSetLayout,

    _phantom: std::marker::PhantomData<P>,
}
impl<P: bytemuck::Pod> GfxComputePipeline<P> {
    pub fn new(
        shader_path: &Path,
        entry_point: &CStr,
        bindings: &[vk::DescriptorSetLayoutBinding],
        extra_set_layouts: &[vk::DescriptorSetLayout],
        debug_name: &str,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxComputePipeline::new");
        let gfx_device = Gfx::get().gfx_device();

        let shader_module = GfxShaderModule::new(shader_path)?;

        let push_set_layout = unsafe {
            gfx_device.create_descriptor_set_layout(
                &vk::DescriptorSetLayoutCreateInfo::default()
                    .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
                    .bindings(bindings),
                None,
            )?
        };
        let mut pipeline = Self {
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            push_set_layout,
            _phantom: std::marker::PhantomData,
        };

        let set_layouts = std::iter::once(push_set_layout).chain(extra_set_layouts.iter().copied()).collect::<Vec<_>>();
        let push_constant_ranges = if size_of::<P>() == 0 {
            vec![]
        } else {
            vec![
                vk::PushConstantRange::default()
                    .stage_flags(vk::ShaderStageFlags::COMPUTE)
                    .offset(0)
                    .size(size_of::<P>() as u32),
            ]
        };
        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        pipeline.pipeline_layout = unsafe { gfx_device.create_pipeline_layout(&pipeline_layout_ci, None)? };

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .module(shader_module.handle())
            .stage(vk::ShaderStageFlags::COMPUTE)
            .name(entry_point);
        let pipeline_ci =
            vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(pipeline.pipeline_layout);
        let pipelines = unsafe {
            gfx_device
                .create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
                .map_err(|(_, e)| e)?
        };
        pipeline.pipeline = pipelines[0];

        gfx_device.set_object_debug_name(pipeline.pipeline, format!("ComputePipeline::{}", debug_name));
        gfx_device.set_object_debug_name(pipeline.pipeline_layout, format!("PipelineLayout::{}", debug_name));
        Ok(pipeline)
    }

    /// 绑定 pipeline，写入 push descriptor 与 push constant
    pub fn bind(&self, cmd: &GfxCommandBuffer, writes: &[GfxWriteDescriptorSet], params: &P) {
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, self.pipeline);
        cmd.cmd_push_descriptor_set(vk::PipelineBindPoint::COMPUTE, self.pipeline_layout, 0, writes);
        if size_of::<P>() != 0 {
            cmd.cmd_push_constants(
                self.pipeline_layout,
                vk::ShaderStageFlags::COMPUTE,
                0,
                bytemuck::bytes_of(params),
            );
        }
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// compute pipeline 中某个 storage binding 的 layout
    pub fn storage_binding(binding: u32, descriptor_type: vk::DescriptorType) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
    }
}
impl<P: bytemuck::Pod> Drop for GfxComputePipeline<P> {
    fn drop(&mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_pipeline(self.pipeline, None);
            gfx_device.destroy_pipeline_layout(self.pipeline_layout, None);
            gfx_device.destroy_descriptor_set_layout(self.push_set_layout, None);
        }
    }
}
