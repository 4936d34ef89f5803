use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

/// 窗口对应的 vk surface，window 需要比 surface 活得更久
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(display_handle: RawDisplayHandle, window_handle: RawWindowHandle) -> GfxResult<Self> {
        let gfx_core = Gfx::get().vk_core();
        let surface_pf = ash::khr::surface::Instance::new(&gfx_core.vk_entry, &gfx_core.instance.ash_instance);

        let handle = unsafe {
            ash_window::create_surface(
                &gfx_core.vk_entry,
                &gfx_core.instance.ash_instance,
                display_handle,
                window_handle,
                None,
            )?
        };
        let surface = GfxSurface { handle, pf: surface_pf };

        let queue_family_index = gfx_core.physical_device.gfx_queue_family.queue_family_index;
        let present_supported = unsafe {
            surface.pf.get_physical_device_surface_support(
                gfx_core.physical_device.vk_handle,
                queue_family_index,
                surface.handle,
            )?
        };
        if !present_supported {
            return Err(GfxError::Unsupported {
                kind: "present queue",
                name: format!("queue family {}", queue_family_index),
            });
        }

        gfx_core.gfx_device.set_debug_name(&surface, "main");
        Ok(surface)
    }

    /// 每次创建 swapchain 都需要重新查询，窗口大小可能已经改变
    pub fn capabilities(&self) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        let pdevice = Gfx::get().physical_device().vk_handle;
        let capabilities = unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle)? };
        Ok(capabilities)
    }

    pub fn formats(&self) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        let pdevice = Gfx::get().physical_device().vk_handle;
        let formats = unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle)? };
        Ok(formats)
    }

    pub fn present_modes(&self) -> GfxResult<Vec<vk::PresentModeKHR>> {
        let pdevice = Gfx::get().physical_device().vk_handle;
        let modes = unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle)? };
        Ok(modes)
    }
}

impl Drop for GfxSurface {
    fn drop(&mut self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
