use ash::vk;
use molvis_gfx::commands::command_buffer::GfxCommandBuffer;
use molvis_render_interface::{
    atoms::{Atom, AtomStyle},
    frame_counter::FrameContext,
};

use crate::error::RendererResult;

/// 提前提交时测得的几何部分 GPU 耗时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuFrameTiming {
    pub gpu_time_ns: u64,
}

/// 在完成回调线程上接收 GPU 耗时
pub type SamplingHandler = Box<dyn FnOnce(GpuFrameTiming) + Send + 'static>;

/// 加速结构构建者
///
/// 由外部提供：负责把原子组织成稠密网格，并把网格绑定到光追 pipeline 的 set 1。
pub trait AccelBuilder {
    fn set_geometry(&mut self, atoms: Vec<Atom>, styles: &[AtomStyle]) -> RendererResult<()>;

    /// 每帧开始编码前调用，可以在此上传本帧的数据
    fn update_resources(&mut self, frame: &FrameContext) -> RendererResult<()>;

    /// 在光追 dispatch 之前录制网格的构建命令
    fn build_dense_grid(&mut self, cmd: &GfxCommandBuffer) -> RendererResult<()>;

    /// 网格每一维的格子数
    fn grid_width(&self) -> u16;

    /// 光追 pipeline 的 set 1
    fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout;

    fn bind_grid(&self, cmd: &GfxCommandBuffer, pipeline_layout: vk::PipelineLayout, set: u32);

    /// 是否对即将推进的这一帧采样 GPU 耗时
    ///
    /// 返回 true 时几何部分单独提前提交，代价是本帧多一次 queue submit。
    fn profile_this_frame(&self) -> bool {
        false
    }

    /// 每次提前提交时取一次；返回 None 时不读取 timestamp
    fn sampling_handler(&mut self) -> Option<SamplingHandler> {
        None
    }
}
