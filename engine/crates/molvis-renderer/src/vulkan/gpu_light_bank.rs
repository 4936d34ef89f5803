use ash::vk;
use molvis_gfx::{gfx::Gfx, pipelines::descriptor_write::GfxWriteDescriptorSet, resources::buffer::GfxBuffer};
use molvis_render_interface::{frame_counter::LightBankLabel, light::GpuLight};

use crate::{
    error::RendererResult,
    light_bank::{LightBankLayout, LightBankStatus},
};

/// 被替换下来的 buffer，等到 GPU 越过 `retire_value` 之后释放
struct RetiredBuffer {
    /// 只用于延长生命周期
    _buffer: GfxBuffer,
    retire_value: u64,
}

/// host 可见的光源 buffer，分为 3 个分区轮流使用
///
/// 第 N 帧写入 `render_index` 对应的分区。同一分区上一次被使用是 3 帧之前，
/// 开始录制前已经等待过那一帧，因此写入时不会与 GPU 的读取冲突。
pub struct GpuLightBank {
    buffer: GfxBuffer,
    layout: LightBankLayout,
    retired: Vec<RetiredBuffer>,
    generation: usize,
}
// new & init
impl GpuLightBank {
    pub fn new() -> RendererResult<Self> {
        let layout = LightBankLayout::new(Gfx::get().min_storage_buffer_offset_align());
        Ok(Self {
            buffer: Self::create_buffer(&layout, 0)?,
            layout,
            retired: vec![],
            generation: 0,
        })
    }

    fn create_buffer(layout: &LightBankLayout, generation: usize) -> RendererResult<GfxBuffer> {
        let buffer = GfxBuffer::new(
            layout.buffer_size(),
            vk::BufferUsageFlags::STORAGE_BUFFER,
            None,
            true,
            format!("light-bank-{}", generation),
        )?;
        Ok(buffer)
    }
}
// update
impl GpuLightBank {
    /// 保证每个分区能容纳 `light_count` 个光源
    ///
    /// 扩容时旧 buffer 可能仍被提交过的帧读取，等 timeline 越过 `retire_value` 后才释放
    pub fn reserve(&mut self, light_count: usize, retire_value: u64) -> RendererResult<LightBankStatus> {
        let Some(layout) = self.layout.fit(light_count) else {
            return Ok(LightBankStatus::Reused);
        };

        let buffer = Self::create_buffer(&layout, self.generation + 1)?;
        let old = std::mem::replace(&mut self.buffer, buffer);
        self.retired.push(RetiredBuffer {
            _buffer: old,
            retire_value,
        });
        self.layout = layout;
        self.generation += 1;

        let bytes = layout.buffer_size();
        log::info!(
            "light bank grown to {} lights per bank ({} bytes) for {} lights",
            layout.lights_per_bank(),
            bytes,
            light_count
        );
        Ok(LightBankStatus::Grown { bytes })
    }

    /// 释放 GPU 已经用完的旧 buffer
    pub fn reclaim(&mut self, completed_value: u64) {
        self.retired.retain(|retired| retired.retire_value > completed_value);
    }

    /// 将本帧的光源写入对应分区
    pub fn write(&self, bank: LightBankLabel, lights: &[GpuLight]) -> RendererResult<()> {
        debug_assert!(lights.len() <= self.layout.lights_per_bank());
        self.buffer
            .write_by_mmap(self.layout.bank_offset(bank), bytemuck::cast_slice(lights))?;
        Ok(())
    }
}
// getters
impl GpuLightBank {
    #[inline]
    pub fn layout(&self) -> &LightBankLayout {
        &self.layout
    }

    #[inline]
    pub fn descriptor_write(&self, binding: u32, bank: LightBankLabel) -> GfxWriteDescriptorSet {
        GfxWriteDescriptorSet::storage_buffer(
            binding,
            self.buffer.vk_buffer(),
            self.layout.bank_offset(bank),
            self.layout.bank_range(),
        )
    }
}
