use ash::vk;

/// barrier 两端的 stage 与 access
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxBarrierMask {
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl GfxBarrierMask {
    /// compute shader 写入之后，compute shader 读取
    pub const COMPUTE_WRITE_TO_READ: Self = Self {
        src_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
        dst_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
        src_access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
        dst_access: vk::AccessFlags2::SHADER_STORAGE_READ,
    };

    /// transfer 写入之后，compute shader 读取
    pub const TRANSFER_WRITE_TO_COMPUTE_READ: Self = Self {
        src_stage: vk::PipelineStageFlags2::TRANSFER,
        dst_stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
        src_access: vk::AccessFlags2::TRANSFER_WRITE,
        dst_access: vk::AccessFlags2::SHADER_STORAGE_READ,
    };
}

/// 便捷创建 image memory barrier 的结构体
///
/// 默认只覆盖 mip 0 与 layer 0
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2 {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_array_layer: 0,
                    layer_count: 1,
                    base_mip_level: 0,
                    level_count: 1,
                },
                ..Default::default()
            },
        }
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'_> {
        &self.inner
    }

    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    #[inline]
    pub fn mask(self, mask: GfxBarrierMask) -> Self {
        self.src_mask(mask.src_stage, mask.src_access).dst_mask(mask.dst_stage, mask.dst_access)
    }

    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }
}

pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}

impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2 {
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                size: vk::WHOLE_SIZE,
                ..Default::default()
            },
        }
    }
}

impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::BufferMemoryBarrier2<'_> {
        &self.inner
    }

    #[inline]
    pub fn mask(mut self, mask: GfxBarrierMask) -> Self {
        self.inner.src_stage_mask = mask.src_stage;
        self.inner.dst_stage_mask = mask.dst_stage;
        self.inner.src_access_mask = mask.src_access;
        self.inner.dst_access_mask = mask.dst_access;
        self
    }

    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.inner.buffer = buffer;
        self.inner.offset = offset;
        self.inner.size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_barrier_defaults_to_single_color_subresource() {
        let barrier = GfxImageBarrier::new()
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL)
            .mask(GfxBarrierMask::COMPUTE_WRITE_TO_READ);
        let inner = barrier.inner();
        assert_eq!(inner.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(inner.subresource_range.level_count, 1);
        assert_eq!(inner.new_layout, vk::ImageLayout::GENERAL);
        assert_eq!(inner.src_access_mask, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(inner.dst_stage_mask, vk::PipelineStageFlags2::COMPUTE_SHADER);
    }

    #[test]
    fn buffer_barrier_covers_the_requested_range() {
        let barrier = GfxBufferBarrier::new()
            .mask(GfxBarrierMask::TRANSFER_WRITE_TO_COMPUTE_READ)
            .buffer(vk::Buffer::null(), 256, 128);
        assert_eq!(barrier.inner().offset, 256);
        assert_eq!(barrier.inner().size, 128);
        assert_eq!(barrier.inner().src_stage_mask, vk::PipelineStageFlags2::TRANSFER);
    }
}
