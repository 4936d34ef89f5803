use ash::vk;
use itertools::Itertools;
use std::cell::Cell;
use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use crate::{
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, physical_device::GfxPhysicalDevice},
};

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及各种扩展的函数指针。
/// 这些函数指针在应用生命周期中保持不变，可以安全共享。
///
/// # 扩展支持
/// - Swapchain (KHR)
/// - Push Descriptor (KHR)
/// - Debug Utils (EXT)
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils: ash::ext::debug_utils::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,
    /// 推送描述符扩展 API
    pub(crate) push_descriptor: ash::khr::push_descriptor::Device,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: &GfxPhysicalDevice,
        queue_create_info: &[vk::DeviceQueueCreateInfo],
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxDevice::new");

        // device 所需的所有 extension
        let basic_exts = Self::basic_device_exts();
        if let Some(missing) = basic_exts.iter().find(|ext| !pdevice.supports_extension(ext)) {
            return Err(GfxError::Unsupported {
                kind: "device extension",
                name: missing.to_string_lossy().into_owned(),
            });
        }
        let device_exts = basic_exts.iter().map(|e| e.as_ptr()).collect_vec();
        log::info!("device exts: {}", basic_exts.iter().map(|ext| ext.to_string_lossy()).join(", "));

        // device 所需的所有 features
        let mut vk11_features = vk::PhysicalDeviceVulkan11Features::default()
            // 16 bit 的 f16/u16 字段直接存放在 storage buffer 中
            .storage_buffer16_bit_access(true)
            .uniform_and_storage_buffer16_bit_access(true);
        let mut vk12_features = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .shader_float16(true)
            // 参数块使用紧密排列的 scalar layout
            .scalar_block_layout(true)
            .host_query_reset(true);
        let mut vk13_features = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .features(Self::physical_device_basic_features())
            .push_next(&mut vk11_features)
            .push_next(&mut vk12_features)
            .push_next(&mut vk13_features);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_info)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.create_device(pdevice.vk_handle, &device_create_info, None)? };

        let vk_debug_utils_device = ash::ext::debug_utils::Device::new(instance, &device);
        let vk_swapchain = ash::khr::swapchain::Device::new(instance, &device);
        let vk_push_descriptor = ash::khr::push_descriptor::Device::new(instance, &device);

        Ok(Self {
            device,
            debug_utils: vk_debug_utils_device,
            swapchain: vk_swapchain,
            push_descriptor: vk_push_descriptor,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
            // 参数块中的 light count 和 grid width 是 u16
            .shader_int16(true)
    }

    /// 必要的 device extensions
    fn basic_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME, ash::khr::push_descriptor::NAME]
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }
    /// 裸的函数指针表，可以 clone 到其他线程中使用
    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }
    #[inline]
    pub fn debug_utils(&self) -> &ash::ext::debug_utils::Device {
        &self.debug_utils
    }
    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
    #[inline]
    pub fn push_descriptor(&self) -> &ash::khr::push_descriptor::Device {
        &self.push_descriptor
    }
}

// tools
impl GfxDevice {
    /// debug name 只用于调试，设置失败时仅记录日志
    #[inline]
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let Ok(name) = CString::new(name.as_ref()) else {
            return;
        };
        let result = unsafe {
            self.debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        self.set_object_debug_name(handle.vk_handle(), debug_name);
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}
