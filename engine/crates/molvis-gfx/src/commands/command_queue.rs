use ash::vk;
use itertools::Itertools;

use crate::{
    commands::submit_info::GfxSubmitInfo,
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx::Gfx,
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
    /// 为 0 表示该 queue 不支持 timestamp
    pub timestamp_valid_bits: u32,
}

/// # destroy
///
/// queue 在 device 销毁时会被销毁
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
}

impl GfxCommandQueue {
    pub(crate) fn new(gfx_device: &GfxDevice, queue_family: GfxQueueFamily, queue_index: u32) -> Self {
        let vk_queue = unsafe { gfx_device.get_device_queue(queue_family.queue_family_index, queue_index) };
        let queue = Self { vk_queue, queue_family };
        gfx_device.set_debug_name(&queue, &queue.queue_family.name);
        queue
    }
}

impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}

// getter
impl GfxCommandQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxCommandQueue {
    pub fn submit(&self, batches: Vec<GfxSubmitInfo>, fence: Option<vk::Fence>) -> GfxResult<()> {
        // batches 持有 submit_infos 引用的内存
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe {
            Gfx::get().gfx_device().queue_submit2(self.vk_queue, &submit_infos, fence.unwrap_or_default())?;
        }
        Ok(())
    }

    /// 按 Vulkan 规范，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { Gfx::get().gfx_device().queue_wait_idle(self.vk_queue)? };
        Ok(())
    }
}
