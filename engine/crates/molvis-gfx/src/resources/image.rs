use ash::vk;
use vk_mem::Alloc;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// 只有单个 mip 与单个 layer 的 2D image，分配在 device memory 上
///
/// # destroy
/// drop 时自动销毁
pub struct GfxImage2D {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent2D,
    format: vk::Format,

    name: String,
}
impl DebugType for GfxImage2D {
    fn debug_type_name() -> &'static str {
        "GfxImage2D"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImage2D {
    pub fn new(
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent.into())
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (handle, allocation) = unsafe { Gfx::get().allocator().create_image(&image_ci, &alloc_ci)? };

        let image = Self {
            handle,
            allocation,
            extent,
            format,
            name: name.as_ref().to_string(),
        };
        Gfx::get().gfx_device().set_debug_name(&image, &image.name);
        Ok(image)
    }
}
impl Drop for GfxImage2D {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().allocator().destroy_image(self.handle, &mut self.allocation);
        }
    }
}
// getters
impl GfxImage2D {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 整张 image 的 color subresource range
    #[inline]
    pub fn color_range() -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
    }
}
