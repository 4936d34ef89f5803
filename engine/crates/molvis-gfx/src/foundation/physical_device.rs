use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxQueueFamily,
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 支持的 device extensions
    pub(crate) device_extensions: Vec<vk::ExtensionProperties>,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    /// 全能的 queue family：graphics, compute, transfer
    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    ///
    /// 没有 graphics + compute queue 的 gpu 会被直接跳过
    pub fn new_descrete_physical_device(instance: &ash::Instance) -> GfxResult<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices()? };
        pdevices
            .iter()
            .filter_map(|pdevice| GfxPhysicalDevice::new(*pdevice, instance).transpose())
            .collect::<GfxResult<Vec<_>>>()?
            .into_iter()
            // 优先使用独立显卡
            .find_or_first(GfxPhysicalDevice::is_descrete_gpu)
            .ok_or(GfxError::NoSuitableGpu)
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> GfxResult<Option<Self>> {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}", physical_device_name);
            log::debug!("physical device limits:\n{:#?}", basic_props.limits);

            // 找到当前 gpu 支持的 extensions，并打印出来
            let device_extensions = instance.enumerate_device_extension_properties(pdevice)?;
            let device_extension_strs = device_extensions
                .iter()
                .map(|ext| CStr::from_ptr(ext.extension_name.as_ptr()).to_string_lossy())
                .join("\n");
            log::debug!("physical device supports extensions: {}", device_extension_strs);

            let queue_familiy_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::info!("physical device: queue family props:\n{:#?}", queue_familiy_props);

            let include_flags = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
            let gfx_queue_family = queue_familiy_props
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(include_flags))
                .map(|(family_idx, props)| GfxQueueFamily {
                    name: "gfx".to_string(),
                    queue_family_index: family_idx as u32,
                    queue_flags: props.queue_flags,
                    queue_count: props.queue_count,
                    timestamp_valid_bits: props.timestamp_valid_bits,
                });

            let Some(gfx_queue_family) = gfx_queue_family else {
                log::warn!("gpu {:?} has no graphics + compute queue, skipped", physical_device_name);
                return Ok(None);
            };

            Ok(Some(Self {
                vk_handle: pdevice,
                device_extensions,
                basic_props,
                gfx_queue_family,
            }))
        }
    }

    pub fn destroy(self) {
        // 无需销毁
    }

    #[inline]
    /// 当前 gpu 是否是独立显卡
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    /// 检查某个 device extension 是否受支持
    pub fn supports_extension(&self, ext: &CStr) -> bool {
        self.device_extensions.iter().any(|props| ext == unsafe { CStr::from_ptr(props.extension_name.as_ptr()) })
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.basic_props.limits
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
