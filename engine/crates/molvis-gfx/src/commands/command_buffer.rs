use ash::vk;
use itertools::Itertools;

use crate::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_pool::GfxCommandPool,
    },
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::descriptor_write::GfxWriteDescriptorSet,
    query::query_pool::GfxQueryPool,
};

/// Primary command buffer
///
/// 仅持有 handle，clone 不会复制底层对象；生命周期跟随所属的 command pool。
///
/// 本文件中的命令均录制在同一个 graphics|compute|transfer queue family 上，
/// 各命令要求的 queue 能力：
///
/// | 命令 | 需要的 queue 能力 |
/// |---|---|
/// | update / clear / dispatch / push | compute |
/// | blit | graphics |
/// | query / barrier | 任意 |
#[derive(Clone)]
pub struct GfxCommandBuffer {
    handle: vk::CommandBuffer,
    _pool: vk::CommandPool,
}

impl GfxCommandBuffer {
    pub fn new(pool: &GfxCommandPool, debug_name: &str) -> GfxResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let device = Gfx::get().gfx_device();
        let handles = unsafe { device.allocate_command_buffers(&alloc_info)? };
        let cmd = Self {
            handle: handles[0],
            _pool: pool.handle(),
        };
        device.set_debug_name(&cmd, debug_name);
        Ok(cmd)
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// 开始录制，并打开一个同名的 debug label
    pub fn begin(&self, usage: vk::CommandBufferUsageFlags, label: &str) -> GfxResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage);
        unsafe { Gfx::get().gfx_device().begin_command_buffer(self.handle, &begin_info)? };
        self.begin_label(label, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 关闭 [`Self::begin`] 打开的 label 并结束录制
    pub fn end(&self) -> GfxResult<()> {
        self.end_label();
        unsafe { Gfx::get().gfx_device().end_command_buffer(self.handle)? };
        Ok(())
    }

    /// 所属 pool 必须带 `RESET_COMMAND_BUFFER`
    pub fn reset(&self) -> GfxResult<()> {
        unsafe {
            Gfx::get().gfx_device().reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }
}

// transfer
impl GfxCommandBuffer {
    /// 数据先内联进 command buffer，执行时再写入 buffer；单次最多 64KB，offset 与长度需 4 字节对齐
    #[inline]
    pub fn cmd_update_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, data: &[u8]) {
        unsafe { Gfx::get().gfx_device().cmd_update_buffer(self.handle, buffer, offset, data) }
    }

    #[inline]
    pub fn cmd_blit_image(&self, info: &vk::BlitImageInfo2) {
        unsafe { Gfx::get().gfx_device().cmd_blit_image2(self.handle, info) }
    }

    #[inline]
    pub fn cmd_clear_color_image(
        &self,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe { Gfx::get().gfx_device().cmd_clear_color_image(self.handle, image, layout, color, ranges) }
    }
}

// compute
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { Gfx::get().gfx_device().cmd_bind_pipeline(self.handle, bind_point, pipeline) }
    }

    #[inline]
    pub fn cmd_push_constants(&self, layout: vk::PipelineLayout, stage: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe { Gfx::get().gfx_device().cmd_push_constants(self.handle, layout, stage, offset, data) }
    }

    /// 绑定由调用者自己分配的 descriptor set，例如加速结构提供的 set
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            Gfx::get().gfx_device().cmd_bind_descriptor_sets(self.handle, bind_point, layout, first_set, sets, &[]);
        }
    }

    /// push descriptor：写入直接进入 command buffer，不需要 descriptor pool
    pub fn cmd_push_descriptor_set(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: &[GfxWriteDescriptorSet],
    ) {
        let push_descriptor = &Gfx::get().gfx_device().push_descriptor;
        GfxWriteDescriptorSet::with_writes(writes, |raw| unsafe {
            push_descriptor.cmd_push_descriptor_set(self.handle, bind_point, layout, set, raw);
        })
    }

    #[inline]
    pub fn cmd_dispatch(&self, groups: glam::UVec3) {
        unsafe { Gfx::get().gfx_device().cmd_dispatch(self.handle, groups.x, groups.y, groups.z) }
    }
}

// query
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_reset_query_pool(&self, pool: &GfxQueryPool, first: u32, count: u32) {
        unsafe { Gfx::get().gfx_device().cmd_reset_query_pool(self.handle, pool.handle(), first, count) }
    }

    #[inline]
    pub fn cmd_write_timestamp(&self, stage: vk::PipelineStageFlags2, pool: &GfxQueryPool, query: u32) {
        unsafe { Gfx::get().gfx_device().cmd_write_timestamp2(self.handle, stage, pool.handle(), query) }
    }
}

// sync2 barrier
impl GfxCommandBuffer {
    pub fn image_memory_barrier(&self, flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let raw = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency = vk::DependencyInfo::default().dependency_flags(flags).image_memory_barriers(&raw);
        unsafe { Gfx::get().gfx_device().cmd_pipeline_barrier2(self.handle, &dependency) }
    }

    pub fn buffer_memory_barrier(&self, flags: vk::DependencyFlags, barriers: &[GfxBufferBarrier]) {
        let raw = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency = vk::DependencyInfo::default().dependency_flags(flags).buffer_memory_barriers(&raw);
        unsafe { Gfx::get().gfx_device().cmd_pipeline_barrier2(self.handle, &dependency) }
    }
}

// debug label
impl GfxCommandBuffer {
    /// label 名含内部 NUL 时退化为空字符串
    pub fn begin_label(&self, name: &str, color: glam::Vec4) {
        let name = std::ffi::CString::new(name).unwrap_or_default();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color.into());
        unsafe { Gfx::get().gfx_device().debug_utils.cmd_begin_debug_utils_label(self.handle, &label) }
    }

    pub fn end_label(&self) {
        unsafe { Gfx::get().gfx_device().debug_utils.cmd_end_debug_utils_label(self.handle) }
    }
}

impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
