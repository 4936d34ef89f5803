use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxQueryPool {
    handle: vk::QueryPool,
    query_type: vk::QueryType,

    /// pool 的容量
    cnt: u32,
}
impl DebugType for GfxQueryPool {
    fn debug_type_name() -> &'static str {
        "GfxQueryPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxQueryPool {
    fn drop(&mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_query_pool(self.handle, None);
        }
    }
}
impl GfxQueryPool {
    /// 创建后所有 query 都会在 host 端 reset 一次，未使用的 query 也处于可用状态
    #[inline]
    pub fn new(ty: vk::QueryType, cnt: u32, debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let create_info = vk::QueryPoolCreateInfo {
            query_type: ty,
            query_count: cnt,
            ..Default::default()
        };

        let handle = unsafe { gfx_device.create_query_pool(&create_info, None)? };
        unsafe { gfx_device.reset_query_pool(handle, 0, cnt) };

        let query_pool = Self {
            handle,
            query_type: ty,
            cnt,
        };
        gfx_device.set_debug_name(&query_pool, debug_name);
        Ok(query_pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::QueryPool {
        self.handle
    }

    #[inline]
    pub fn query_type(&self) -> vk::QueryType {
        self.query_type
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.cnt
    }
}

/// 阻塞读取 64 位的 timestamp 结果；不依赖 Gfx 单例，可以在其他线程中使用
pub fn read_timestamps(
    device: &ash::Device,
    query_pool: vk::QueryPool,
    first_query: u32,
    query_cnt: u32,
) -> GfxResult<Vec<u64>> {
    let mut res = vec![0_u64; query_cnt as usize];
    unsafe {
        device.get_query_pool_results(
            query_pool,
            first_query,
            &mut res,
            vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
        )?;
    }
    Ok(res)
}
