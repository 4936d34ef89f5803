use ash::vk;

use crate::{
    commands::command_queue::GfxQueueFamily,
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx::Gfx,
};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
///
/// # destroy
/// drop 时自动销毁，pool 内分配的 command buffer 一并失效
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    _queue_family: GfxQueueFamily,

    debug_name: String,
    /// 由 Gfx 内部持有的 pool 需要手动销毁，此时为 false
    auto_destroy: bool,
}
// init & destory
impl GfxCommandPool {
    #[inline]
    pub fn new(queue_family: GfxQueueFamily, flags: vk::CommandPoolCreateFlags, debug_name: &str) -> GfxResult<Self> {
        let mut pool = Self::new_internal(Gfx::get().gfx_device(), queue_family, flags, debug_name)?;
        pool.auto_destroy = true;
        Ok(pool)
    }

    /// 内部构造函数，用于 Gfx 初始化时使用
    /// 因为在 Gfx 初始化过程中，单例还没有准备好
    #[inline]
    pub(crate) fn new_internal(
        gfx_device: &GfxDevice,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool = unsafe {
            gfx_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family.queue_family_index).flags(flags),
                None,
            )?
        };

        let command_pool = Self {
            handle: pool,
            _queue_family: queue_family,
            debug_name: debug_name.to_string(),
            auto_destroy: false,
        };
        gfx_device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub(crate) fn destroy_internal(mut self, gfx_device: &GfxDevice) {
        unsafe {
            gfx_device.destroy_command_pool(self.handle, None);
        }
        self.handle = vk::CommandPool::null();
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        if self.handle == vk::CommandPool::null() {
            return;
        }
        debug_assert!(self.auto_destroy, "internal CommandPool must be destroyed manually.");
        log::info!("Dropping CommandPool: {}", self.debug_name);
        unsafe {
            Gfx::get().gfx_device().destroy_command_pool(self.handle, None);
        }
    }
}
