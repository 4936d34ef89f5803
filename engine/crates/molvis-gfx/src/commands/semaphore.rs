use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// # Destroy
/// drop 时自动销毁，需要保证 GPU 已经不再使用
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let semaphore = unsafe { gfx_device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };

        let semaphore = Self { semaphore };
        gfx_device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    pub fn new_timeline(initial_value: u64, debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let semaphore = unsafe { gfx_device.create_semaphore(&timeline_semaphore_ci, None)? };

        let semaphore = Self { semaphore };
        gfx_device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }
}

impl Drop for GfxSemaphore {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

// tools
impl GfxSemaphore {
    /// 阻塞等待 timeline semaphore 到达指定的值
    #[inline]
    pub fn wait_timeline(&self, timeline_value: u64, timeout_ns: u64) -> GfxResult<()> {
        wait_timeline(Gfx::get().gfx_device().ash_device(), self.semaphore, timeline_value, timeout_ns)
    }

    /// timeline semaphore 当前的值
    #[inline]
    pub fn timeline_value(&self) -> GfxResult<u64> {
        let value = unsafe { Gfx::get().gfx_device().get_semaphore_counter_value(self.semaphore)? };
        Ok(value)
    }
}

/// 不依赖 Gfx 单例的等待，可以在其他线程中使用
pub fn wait_timeline(
    device: &ash::Device,
    semaphore: vk::Semaphore,
    timeline_value: u64,
    timeout_ns: u64,
) -> GfxResult<()> {
    unsafe {
        let wait_semaphore = [semaphore];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&wait_semaphore)
            .values(std::slice::from_ref(&timeline_value));
        device.wait_semaphores(&wait_info, timeout_ns)?;
    }
    Ok(())
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
