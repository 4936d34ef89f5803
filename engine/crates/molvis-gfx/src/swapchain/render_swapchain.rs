use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    error::GfxResult,
    gfx::Gfx,
    swapchain::surface::GfxSurface,
};

/// 期望的 swapchain 参数，实际参数受 surface 能力限制
#[derive(Clone, Copy, Debug)]
pub struct GfxSwapchainDesc {
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub surface_format: vk::SurfaceFormatKHR,
}

pub struct GfxRenderSwapchain {
    surface: GfxSurface,
    swapchain_handle: vk::SwapchainKHR,

    /// 这里的 image 并非手动创建的，因此无法使用 GfxImage2D 类型
    swapchain_images: Vec<vk::Image>,
    swapchain_image_index: usize,

    desc: GfxSwapchainDesc,
}

// 构建过程
impl GfxRenderSwapchain {
    pub fn new(surface: GfxSurface, desc: GfxSwapchainDesc) -> GfxResult<Self> {
        let mut swapchain = Self {
            surface,
            swapchain_handle: vk::SwapchainKHR::null(),
            swapchain_images: vec![],
            swapchain_image_index: 0,
            desc,
        };
        swapchain.rebuild(desc.extent)?;
        Ok(swapchain)
    }

    /// 重建 swapchain，旧的 swapchain 会被销毁；调用方需要保证旧的 image 不再被使用
    pub fn rebuild(&mut self, extent: vk::Extent2D) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxRenderSwapchain::rebuild");
        let gfx_device = Gfx::get().gfx_device();
        let capabilities = self.surface.capabilities()?;
        let surface_format = Self::choose_surface_format(&self.surface.formats()?, self.desc.surface_format);
        let present_mode = Self::choose_present_mode(&self.surface.present_modes()?, self.desc.present_mode);
        let extent = Self::calculate_swapchain_extent(&capabilities, extent);

        // max_image_count == 0，表示不限制 image 数量
        let image_count = if capabilities.max_image_count == 0 {
            capabilities.min_image_count + 1
        } else {
            u32::min(capabilities.max_image_count, capabilities.min_image_count + 1)
        };

        let old_swapchain = self.swapchain_handle;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // 结果通过 blit 写入 swapchain image
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_handle = unsafe { gfx_device.swapchain.create_swapchain(&create_info, None)? };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { gfx_device.swapchain.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain_handle = swapchain_handle;
        gfx_device.set_object_debug_name(swapchain_handle, "main");

        let images = unsafe { gfx_device.swapchain.get_swapchain_images(swapchain_handle)? };
        for (img_idx, img) in images.iter().enumerate() {
            gfx_device.set_object_debug_name(*img, format!("swapchain-image-{img_idx}"));
        }
        log::info!(
            "swapchain built: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        self.swapchain_images = images;
        self.swapchain_image_index = 0;
        self.desc = GfxSwapchainDesc {
            extent,
            present_mode,
            surface_format,
        };
        Ok(())
    }

    /// surface 的 current_extent 为 u32::MAX 时，由 swapchain 决定大小
    pub fn calculate_swapchain_extent(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        requested: vk::Extent2D,
    ) -> vk::Extent2D {
        if capabilities.current_extent.width != u32::MAX {
            return capabilities.current_extent;
        }
        vk::Extent2D {
            width: requested.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: requested.height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    }

    fn choose_surface_format(
        formats: &[vk::SurfaceFormatKHR],
        preferred: vk::SurfaceFormatKHR,
    ) -> vk::SurfaceFormatKHR {
        formats
            .iter()
            .copied()
            .find_or_first(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .unwrap_or(preferred)
    }

    /// FIFO 一定受支持
    fn choose_present_mode(modes: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if modes.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO }
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.surface_format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len()
    }

    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.swapchain_images[self.swapchain_image_index]
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.swapchain_image_index
    }
}

// tools
impl GfxRenderSwapchain {
    /// timeout: nano seconds
    ///
    /// # return
    /// swapchain 已经过期，需要重建时返回 false
    #[inline]
    pub fn acquire_next_image(&mut self, semaphore: &GfxSemaphore, timeout: u64) -> GfxResult<bool> {
        let result = unsafe {
            Gfx::get().gfx_device().swapchain.acquire_next_image(
                self.swapchain_handle,
                timeout,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };
        match result {
            // suboptimal 的 image 仍然可以使用，留到 present 时重建
            Ok((image_index, _suboptimal)) => {
                self.swapchain_image_index = image_index as usize;
                Ok(true)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// # return
    /// swapchain 需要重建时返回 true
    #[inline]
    pub fn present_image(&self, queue: &GfxCommandQueue, wait_semaphores: &[&GfxSemaphore]) -> GfxResult<bool> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [self.swapchain_image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { Gfx::get().gfx_device().swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().swapchain.destroy_swapchain(self.swapchain_handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let caps = capabilities(vk::Extent2D {
            width: 800,
            height: 600,
        });
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_surface_extent_uses_clamped_request() {
        let caps = capabilities(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps,
            vk::Extent2D {
                width: 8192,
                height: 1080,
            },
        );
        assert_eq!((extent.width, extent.height), (4096, 1080));
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            GfxRenderSwapchain::choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
    }
}
