use std::ffi::CStr;

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        submit_info::GfxSubmitInfo,
    },
    error::GfxResult,
    foundation::{
        device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice,
    },
    gfx_core::GfxCore,
};

/// Vulkan 图形上下文单例
///
/// 管理所有 Vulkan 核心资源，包括实例、设备、队列、内存分配器等。
/// 采用单例模式简化参数传递和生命周期管理，仅适用于单线程环境。
///
/// # 初始化流程
/// ```ignore
/// Gfx::init("MyApp", &extra_extensions)?;
/// let device = Gfx::get().gfx_device();
/// // 使用...
/// Gfx::destroy();
/// ```
pub struct Gfx {
    pub(crate) gfx_core: GfxCore,
    pub(crate) vm_allocator: GfxMemAllocator,

    /// 临时的 graphics command pool，主要用于临时的命令缓冲区
    pub(crate) temp_graphics_command_pool: GfxCommandPool,
}

static mut G_GFX: Option<Gfx> = None;

// 创建与销毁
impl Gfx {
    fn new(app_name: &str, instance_extra_exts: &[&'static CStr]) -> GfxResult<Self> {
        let _span = tracy_client::span!("Gfx::new");
        let vk_ctx = GfxCore::new(app_name, instance_extra_exts)?;

        // 在初始化过程中，单例还没有被初始化，需要使用传统的参数传递方式
        let gfx_command_pool = match GfxCommandPool::new_internal(
            &vk_ctx.gfx_device,
            vk_ctx.physical_device.gfx_queue_family.clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-temp-graphics",
        ) {
            Ok(pool) => pool,
            Err(e) => {
                vk_ctx.destroy();
                return Err(e);
            }
        };

        let allocator = match GfxMemAllocator::new(
            &vk_ctx.instance.ash_instance,
            vk_ctx.physical_device.vk_handle,
            &vk_ctx.gfx_device,
        ) {
            Ok(allocator) => allocator,
            Err(e) => {
                gfx_command_pool.destroy_internal(&vk_ctx.gfx_device);
                vk_ctx.destroy();
                return Err(e);
            }
        };

        Ok(Self {
            gfx_core: vk_ctx,
            vm_allocator: allocator,
            temp_graphics_command_pool: gfx_command_pool,
        })
    }

    /// 获取 Gfx 单例
    ///
    /// # Panics
    /// 如果 Gfx 尚未初始化，此方法会 panic
    ///
    /// # Safety
    /// 此方法仅在单线程环境下安全
    #[inline]
    pub fn get() -> &'static Gfx {
        unsafe {
            // 使用 addr_of! 避免直接对 static mut 创建引用，编译器不允许这种行为
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).as_ref().expect("Gfx not initialized. Call Gfx::init() first.")
        }
    }

    #[inline]
    pub fn is_initialized() -> bool {
        unsafe {
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).is_some()
        }
    }

    /// 初始化 Gfx 单例
    ///
    /// # Parameters
    /// - `app_name`: 应用程序名称
    /// - `instance_extra_exts`: 额外的 Vulkan 实例扩展，例如 surface 所需的扩展
    ///
    /// # Panics
    /// 如果 Gfx 已经被初始化，此方法会 panic
    pub fn init(app_name: &str, instance_extra_exts: &[&'static CStr]) -> GfxResult<()> {
        let gfx = Self::new(app_name, instance_extra_exts)?;
        unsafe {
            // 使用 addr_of_mut! 避免直接对 static mut 创建可变引用
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            assert!((*ptr).is_none(), "Gfx already initialized");
            *ptr = Some(gfx);
        }
        Ok(())
    }

    /// 销毁 Gfx 单例，所有依赖 Gfx 的资源需要提前销毁
    ///
    /// # Safety
    /// 调用此方法后，不应再使用 Gfx::get()
    pub fn destroy() {
        unsafe {
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            let Some(context) = (*ptr).take() else {
                log::warn!("Gfx::destroy called without Gfx::init");
                return;
            };

            context.vm_allocator.destroy();
            context.temp_graphics_command_pool.destroy_internal(&context.gfx_core.gfx_device);
            context.gfx_core.destroy();
        }
    }
}

// getter
impl Gfx {
    #[inline]
    pub fn vk_core(&self) -> &GfxCore {
        &self.gfx_core
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.gfx_core.instance
    }

    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.vm_allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.gfx_queue
    }

    /// storage buffer 的 descriptor offset 必须是这个值的整数倍
    ///
    /// 注：这个值一定是 power of 2
    #[inline]
    pub fn min_storage_buffer_offset_align(&self) -> vk::DeviceSize {
        self.gfx_core.physical_device.basic_props.limits.min_storage_buffer_offset_alignment
    }

    /// 一个 timestamp tick 对应的纳秒数
    #[inline]
    pub fn timestamp_period(&self) -> f32 {
        self.gfx_core.physical_device.basic_props.limits.timestamp_period
    }
}

// tools
impl Gfx {
    /// 根据给定的格式，返回支持的格式
    pub fn format_supports(&self, format: vk::Format, features: vk::FormatFeatureFlags) -> bool {
        let props = unsafe {
            self.instance()
                .ash_instance
                .get_physical_device_format_properties(self.physical_device().vk_handle, format)
        };
        props.optimal_tiling_features.contains(features)
    }

    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let command_buffer =
            GfxCommandBuffer::new(&self.temp_graphics_command_pool, &format!("one-time-{}", name.as_ref()))?;

        let result: GfxResult<R> = (|| {
            command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref())?;
            let result = func(&command_buffer);
            command_buffer.end()?;

            self.gfx_queue().submit(vec![GfxSubmitInfo::new(std::slice::from_ref(&command_buffer))], None)?;
            self.gfx_queue().wait_idle()?;
            Ok(result)
        })();

        unsafe {
            self.gfx_device()
                .free_command_buffers(self.temp_graphics_command_pool.handle(), &[command_buffer.vk_handle()]);
        }

        result
    }

    pub fn wait_idle(&self) -> GfxResult<()> {
        self.gfx_device().wait_idle()
    }
}
