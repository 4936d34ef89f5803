use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// 单 mip、单 layer 的 image view
///
/// drop 时销毁，必须先于所引用的 image 释放。
pub struct GfxImageView {
    handle: vk::ImageView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxImageViewDesc {
    /// 可以和 image 的 format 不同，只要二者兼容
    pub(crate) format: vk::Format,
    pub(crate) view_type: vk::ImageViewType,
    pub(crate) aspect: vk::ImageAspectFlags,
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect,
        }
    }
}

impl GfxImageView {
    pub fn new(image: vk::Image, desc: GfxImageViewDesc, name: impl AsRef<str>) -> GfxResult<Self> {
        let range = vk::ImageSubresourceRange::default().aspect_mask(desc.aspect).level_count(1).layer_count(1);
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(desc.view_type)
            .format(desc.format)
            .subresource_range(range);

        let device = Gfx::get().gfx_device();
        let handle = unsafe { device.create_image_view(&create_info, None)? };
        let view = Self { handle };
        device.set_debug_name(&view, name.as_ref());
        Ok(view)
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl Drop for GfxImageView {
    fn drop(&mut self) {
        unsafe { Gfx::get().gfx_device().destroy_image_view(self.handle, None) }
    }
}

impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
