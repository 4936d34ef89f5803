use ash::vk;
use molvis_gfx::{
    commands::{
        barrier::{GfxBarrierMask, GfxBufferBarrier},
        command_buffer::GfxCommandBuffer,
    },
    gfx::Gfx,
    pipelines::descriptor_write::GfxWriteDescriptorSet,
    resources::buffer::GfxBuffer,
};
use molvis_render_interface::{
    arguments::{ARGUMENT_BLOCK_SIZE, PackedArgumentBlock},
    atoms::AtomStyle,
    frame_counter::{FrameCounter, LightBankLabel},
};

use crate::error::RendererResult;

/// 按 render index 分区的一块 device buffer
struct RegionBuffer {
    buffer: GfxBuffer,
    /// 对齐之后的分区大小
    stride: vk::DeviceSize,
    /// 分区内有效的字节数
    range: vk::DeviceSize,
}
impl RegionBuffer {
    fn new(range: vk::DeviceSize, name: &str) -> RendererResult<Self> {
        let align = Gfx::get().min_storage_buffer_offset_align().max(1);
        let stride = range.div_ceil(align) * align;
        let buffer = GfxBuffer::new(
            stride * FrameCounter::LIGHT_RING_SIZE as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            Some(align),
            false,
            name,
        )?;
        Ok(Self { buffer, stride, range })
    }

    #[inline]
    fn offset(&self, bank: LightBankLabel) -> vk::DeviceSize {
        *bank as vk::DeviceSize * self.stride
    }

    fn barrier(&self, bank: LightBankLabel) -> GfxBufferBarrier {
        GfxBufferBarrier::new()
            .buffer(self.buffer.vk_buffer(), self.offset(bank), self.range)
            .mask(GfxBarrierMask::TRANSFER_WRITE_TO_COMPUTE_READ)
    }

    fn write(&self, binding: u32, bank: LightBankLabel) -> GfxWriteDescriptorSet {
        GfxWriteDescriptorSet::storage_buffer(binding, self.buffer.vk_buffer(), self.offset(bank), self.range)
    }
}

/// 每帧的渲染参数与原子样式
///
/// 两个 buffer 都按 render index 分为 3 个区，在命令中通过 `vkCmdUpdateBuffer` 写入，
/// 因此与仍在执行的前两帧互不干扰。
pub struct ArgumentBuffers {
    arguments: RegionBuffer,
    styles: RegionBuffer,
}
// new & init
impl ArgumentBuffers {
    /// 元素序号为 u8，最多 256 种样式
    pub const MAX_STYLES: usize = 256;

    pub fn new() -> RendererResult<Self> {
        Ok(Self {
            arguments: RegionBuffer::new(ARGUMENT_BLOCK_SIZE as vk::DeviceSize, "render-arguments")?,
            styles: RegionBuffer::new(
                (Self::MAX_STYLES * size_of::<AtomStyle>()) as vk::DeviceSize,
                "atom-styles",
            )?,
        })
    }
}
// tools
impl ArgumentBuffers {
    /// 录制参数与样式的上传，并使其对之后的 compute shader 可见
    pub fn record_upload(
        &self,
        cmd: &GfxCommandBuffer,
        bank: LightBankLabel,
        arguments: &PackedArgumentBlock,
        styles: &[AtomStyle],
    ) {
        cmd.cmd_update_buffer(self.arguments.buffer.vk_buffer(), self.arguments.offset(bank), arguments.as_bytes());

        let styles = &styles[..styles.len().min(Self::MAX_STYLES)];
        if !styles.is_empty() {
            cmd.cmd_update_buffer(
                self.styles.buffer.vk_buffer(),
                self.styles.offset(bank),
                bytemuck::cast_slice(styles),
            );
        }

        cmd.buffer_memory_barrier(
            vk::DependencyFlags::empty(),
            &[self.arguments.barrier(bank), self.styles.barrier(bank)],
        );
    }

    #[inline]
    pub fn arguments_write(&self, binding: u32, bank: LightBankLabel) -> GfxWriteDescriptorSet {
        self.arguments.write(binding, bank)
    }

    #[inline]
    pub fn styles_write(&self, binding: u32, bank: LightBankLabel) -> GfxWriteDescriptorSet {
        self.styles.write(binding, bank)
    }
}
