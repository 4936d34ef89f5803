//! 分子光追渲染器的帧管线
//!
//! [`frame_pipeline::FrameSubmissionPipeline`] 以固定顺序驱动每一帧：
//! 推进资源环、编码几何与光追、(可选) 提前提交以采样 GPU 耗时、获取呈现目标、时域上采样、呈现。
//! 与设备相关的部分通过 [`frame_pipeline::FrameBackend`] 抽象，Vulkan 实现位于 [`vulkan`]。

pub mod completion;
pub mod error;
pub mod frame_pipeline;
pub mod frame_state;
pub mod light_bank;
pub mod renderer;

pub mod vulkan {
    pub mod accel;
    pub mod argument_buffer;
    pub mod backend;
    pub mod gpu_light_bank;
    pub mod profiler;
    pub mod rt_pass;
    pub mod surface_ring;
    pub mod upscale_pass;
}
