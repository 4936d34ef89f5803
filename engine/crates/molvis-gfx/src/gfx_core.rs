use ash::vk;
use std::ffi::CStr;

use crate::{
    commands::command_queue::GfxCommandQueue,
    error::GfxResult,
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
};

pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,

    pub(crate) gfx_device: GfxDevice,

    pub(crate) debug_utils: GfxDebugMsger,

    pub(crate) gfx_queue: GfxCommandQueue,
}

// 创建与销毁
impl GfxCore {
    pub fn new(app_name: &str, instance_extra_exts: &[&'static CStr]) -> GfxResult<Self> {
        let vk_pf = unsafe { ash::Entry::load()? };
        let instance = GfxInstance::new(&vk_pf, app_name, instance_extra_exts)?;

        // instance 之后的步骤失败时，需要手动销毁 instance
        let physical_device = match GfxPhysicalDevice::new_descrete_physical_device(instance.ash_instance()) {
            Ok(pdevice) => pdevice,
            Err(e) => {
                instance.destroy();
                return Err(e);
            }
        };

        // 渲染只使用一个全能的 queue，rt、upscale 与 present 之间的顺序由 submit 顺序保证
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];

        let device = match GfxDevice::new(&instance.ash_instance, &physical_device, &queue_create_infos) {
            Ok(device) => device,
            Err(e) => {
                instance.destroy();
                return Err(e);
            }
        };
        let debug_utils = match GfxDebugMsger::new(&vk_pf, &instance.ash_instance) {
            Ok(debug_utils) => debug_utils,
            Err(e) => {
                device.destroy();
                instance.destroy();
                return Err(e);
            }
        };

        let gfx_queue = GfxCommandQueue::new(&device, physical_device.gfx_queue_family.clone(), 0);
        log::info!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        // 在 device 以及 debug_utils 之前创建的 vk::Handle
        device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
        device.set_object_debug_name(physical_device.vk_handle, "GfxPhysicalDevice");
        device.set_object_debug_name(device.vk_handle(), "GfxDevice");

        Ok(Self {
            vk_entry: vk_pf,
            instance,
            physical_device,
            gfx_device: device,
            debug_utils,
            gfx_queue,
        })
    }

    pub fn destroy(self) {
        self.gfx_device.destroy();
        self.debug_utils.destroy();
        self.physical_device.destroy();
        self.instance.destroy();
    }
}
