use ash::vk;
use itertools::Itertools;

/// 一次 descriptor 写入，用于 push descriptor
///
/// buffer_infos 与 image_infos 只能有一个非空，由 descriptor_type 决定
pub struct GfxWriteDescriptorSet {
    pub dst_binding: u32,
    pub descriptor_type: vk::DescriptorType,

    pub buffer_infos: Vec<vk::DescriptorBufferInfo>,
    pub image_infos: Vec<vk::DescriptorImageInfo>,
}
impl GfxWriteDescriptorSet {
    pub fn storage_buffer(
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        Self {
            dst_binding: binding,
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            buffer_infos: vec![vk::DescriptorBufferInfo::default().buffer(buffer).offset(offset).range(range)],
            image_infos: vec![],
        }
    }

    /// storage image 始终处于 GENERAL layout
    pub fn storage_image(binding: u32, image_view: vk::ImageView) -> Self {
        Self {
            dst_binding: binding,
            descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
            buffer_infos: vec![],
            image_infos: vec![
                vk::DescriptorImageInfo::default().image_view(image_view).image_layout(vk::ImageLayout::GENERAL),
            ],
        }
    }

    pub fn to_vk_type(&self) -> vk::WriteDescriptorSet<'_> {
        debug_assert!(
            self.buffer_infos.is_empty() != self.image_infos.is_empty(),
            "exactly one of buffer_infos and image_infos should be set in GfxWriteDescriptorSet"
        );
        let write = vk::WriteDescriptorSet::default()
            .dst_binding(self.dst_binding)
            .dst_array_element(0)
            .descriptor_type(self.descriptor_type);
        // 选择 buffer ptr 还是 image ptr，是由 descriptor type 控制的
        if self.buffer_infos.is_empty() {
            write.image_info(&self.image_infos)
        } else {
            write.buffer_info(&self.buffer_infos)
        }
    }

    pub fn with_writes(writes: &[Self], cbk: impl FnOnce(&[vk::WriteDescriptorSet])) {
        let writes = writes.iter().map(|w| w.to_vk_type()).collect_vec();
        cbk(&writes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_write_points_at_the_buffer_infos() {
        let write = GfxWriteDescriptorSet::storage_buffer(2, vk::Buffer::null(), 512, 256);
        let vk_write = write.to_vk_type();
        assert_eq!(vk_write.dst_binding, 2);
        assert_eq!(vk_write.descriptor_count, 1);
        assert_eq!(vk_write.descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(write.buffer_infos[0].offset, 512);
    }

    #[test]
    fn image_write_uses_general_layout() {
        let write = GfxWriteDescriptorSet::storage_image(4, vk::ImageView::null());
        let vk_write = write.to_vk_type();
        assert_eq!(vk_write.descriptor_count, 1);
        assert_eq!(write.image_infos[0].image_layout, vk::ImageLayout::GENERAL);
    }
}
