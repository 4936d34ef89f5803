use std::ffi::CStr;

use ash::vk;

use crate::error::GfxResult;

pub struct GfxDebugMsger {
    pub vk_debug_utils_instance: ash::ext::debug_utils::Instance,
    pub vk_debug_utils_messenger: vk::DebugUtilsMessengerEXT,
}

impl GfxDebugMsger {
    pub fn new(vk_pf: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_pf, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let debug_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(Self {
            vk_debug_utils_instance: loader,
            vk_debug_utils_messenger: debug_messenger,
        })
    }

    pub fn destroy(self) {
        // 触发 drop 进行销毁
    }
}

impl Drop for GfxDebugMsger {
    fn drop(&mut self) {
        unsafe {
            log::info!("Destroying GfxDebugMsger");
            self.vk_debug_utils_instance.destroy_debug_utils_messenger(self.vk_debug_utils_messenger, None);
        }
    }
}

/// debug messenger 的回调函数
/// # Safety
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let format_msg = format!("[{:?}]\n{}\n", message_type, split_main_message(msg.as_ref()));

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// validation layer 的消息可能是 json，其中的 MainMessage 字段带有换行符，需要单独输出
fn split_main_message(msg: &str) -> String {
    let Ok(serde_json::Value::Object(mut obj)) = serde_json::from_str::<serde_json::Value>(msg) else {
        return msg.to_string();
    };
    let main_msg = obj.remove("MainMessage");
    let main_msg = main_msg.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let rest = serde_json::to_string_pretty(&obj).unwrap_or_else(|_| msg.to_string());
    format!("{}\n{}", rest, main_msg)
}

// 构造过程辅助函数
impl GfxDebugMsger {
    pub fn debug_msg_type() -> vk::DebugUtilsMessageTypeFlagsEXT {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
    }

    pub fn debug_msg_severity() -> vk::DebugUtilsMessageSeverityFlagsEXT {
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    }

    /// 用于创建 debug messenger 的结构体
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::debug_msg_severity())
            .message_type(Self::debug_msg_type())
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_message_is_kept() {
        assert_eq!(split_main_message("plain text"), "plain text");
    }

    #[test]
    fn main_message_is_moved_to_the_end() {
        let out = split_main_message(r#"{"MainMessage":"line1\nline2","Id":7}"#);
        assert!(out.ends_with("line1\nline2"));
        assert!(out.contains("\"Id\": 7"));
        assert!(!out.contains("MainMessage"));
    }
}
