//! Vulkan RHI (Rendering Hardware Interface) 抽象层
//!
//! 提供对 Vulkan API 的封装，包括设备管理、命令缓冲、同步对象、资源、计算管线与交换链。
//! 所有 Vulkan 核心对象通过 [`gfx::Gfx`] 单例统一管理，简化生命周期和借用关系。

pub mod basic {
    pub mod color;
}
pub mod commands {
    pub mod barrier;
    pub mod command_buffer;
    pub mod command_pool;
    pub mod command_queue;
    pub mod semaphore;
    pub mod submit_info;
}
pub mod foundation {
    pub mod debug_messenger;
    pub mod device;
    pub mod instance;
    pub mod mem_allocator;
    pub mod physical_device;
}
pub mod pipelines {
    pub mod compute_pipeline;
    pub mod descriptor_write;
    pub mod shader;
}
pub mod query {
    pub mod query_pool;
}
pub mod resources {
    pub mod buffer;
    pub mod image;
    pub mod image_view;
}
pub mod swapchain {
    pub mod render_swapchain;
    pub mod surface;
}

pub mod error;
pub mod gfx;
pub mod gfx_core;
