use std::{
    collections::HashSet,
    ffi::{CStr, CString, c_char},
};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::GfxDebugMsger,
};

pub struct GfxInstance {
    /// 仅仅是函数指针，以及一个裸的 handle，可以随意 clone
    ///
    /// 生命周期由 GfxCore 手动控制
    pub(crate) ash_instance: ash::Instance,
}

impl GfxInstance {
    /// 设置所需的 extensions，创建 vk instance
    pub fn new(vk_entry: &ash::Entry, app_name: &str, extra_instance_exts: &[&'static CStr]) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxInstance::new");

        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = c"molvis";
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, extra_instance_exts)?;
        let mut enabled_extensions_str = String::new();
        for ext in &enabled_extensions {
            enabled_extensions_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance extensions: {}", enabled_extensions_str);

        // 无需开启 validation layer，使用 vulkan configurator 控制 validation layer 的开启
        let mut instance_ci =
            vk::InstanceCreateInfo::default().application_info(&app_info).enabled_extension_names(&enabled_extensions);

        // 为 instance info 添加 debug messenger，覆盖 instance 创建和销毁的过程
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None)? };

        Ok(Self { ash_instance: handle })
    }

    pub fn destroy(self) {
        log::info!("Destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

/// getter
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

/// 构造过程
impl GfxInstance {
    /// instance 所需的，且受支持的 extension
    fn get_extensions(vk_entry: &ash::Entry, extra_instance_exts: &[&'static CStr]) -> GfxResult<Vec<*const c_char>> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };
        let mut enabled_extensions: HashSet<&'static CStr> = HashSet::new();

        for ext in extra_instance_exts.iter().copied().chain(Self::basic_instance_exts()) {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| ext == unsafe { CStr::from_ptr(supported_ext.extension_name.as_ptr()) });
            if !supported {
                return Err(GfxError::Unsupported {
                    kind: "instance extension",
                    name: ext.to_string_lossy().into_owned(),
                });
            }
            enabled_extensions.insert(ext);
        }

        Ok(enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec())
    }

    /// 必须要开启的 instance extensions
    fn basic_instance_exts() -> Vec<&'static CStr> {
        vec![
            // debug messenger，debug name，以及 command buffer 中的 label
            vk::EXT_DEBUG_UTILS_NAME,
        ]
    }
}
