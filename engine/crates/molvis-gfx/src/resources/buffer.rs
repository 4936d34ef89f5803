use ash::vk;

use vk_mem::Alloc;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,

    debug_name: String,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.map_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }

            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// init & destroy
impl GfxBuffer {
    /// - align: buffer 起始地址的内存对齐，默认对齐到 8 字节
    /// - 优先使用 device memory
    pub fn new(
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let allocator = Gfx::get().allocator();
        let align = align.unwrap_or(8);
        let (buffer, mut alloc) = unsafe { allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, align)? };

        let mut mapped_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => mapped_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e.into());
                }
            }
        }

        Gfx::get().gfx_device().set_object_debug_name(buffer, format!("Buffer::{}", name.as_ref()));
        Ok(Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr: mapped_ptr,
            debug_name: name.as_ref().to_string(),
        })
    }
}
// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    /// 通过 mem map 的方式将 data 写入到 buffer 的 offset 处，并 flush
    pub fn write_by_mmap(&self, offset: vk::DeviceSize, data: &[u8]) -> GfxResult<()> {
        let map_ptr = self.map_ptr.ok_or_else(|| GfxError::NotMapped(self.debug_name.clone()))?;
        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(GfxError::BufferOverflow {
                name: self.debug_name.clone(),
                offset,
                len,
                size: self.size,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), map_ptr.add(offset as usize), data.len());
        }
        Gfx::get().allocator().flush_allocation(&self.allocation, offset, len)?;
        Ok(())
    }
}
