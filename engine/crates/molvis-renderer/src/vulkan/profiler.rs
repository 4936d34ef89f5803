use ash::vk;
use molvis_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    gfx::Gfx,
    query::query_pool::{GfxQueryPool, read_timestamps},
};
use molvis_render_interface::frame_counter::{FrameCounter, LightBankLabel};

use crate::{
    completion::CompletionTask,
    error::RendererResult,
    vulkan::accel::{GpuFrameTiming, SamplingHandler},
};

/// 两个 timestamp 之间经过的纳秒数，考虑计数器的有效位数回绕
pub fn elapsed_ns(begin: u64, end: u64, valid_bits: u32, period_ns: f32) -> u64 {
    let mask = if valid_bits >= 64 { u64::MAX } else { (1_u64 << valid_bits) - 1 };
    let ticks = end.wrapping_sub(begin) & mask;
    (ticks as f64 * period_ns as f64) as u64
}

/// 用一对 timestamp 包住几何部分的 GPU 工作
///
/// 每个 render index 占用两个 query，读取发生在完成回调线程上。
/// 同一对 query 在 3 帧之后重置，重置前 backend 会等读取任务执行完。
pub struct GeometryProfiler {
    query_pool: GfxQueryPool,
    valid_bits: u32,
    period_ns: f32,
}
// new & init
impl GeometryProfiler {
    const QUERIES_PER_FRAME: u32 = 2;

    /// queue 不支持 timestamp 时返回 None
    pub fn new() -> RendererResult<Option<Self>> {
        let gfx = Gfx::get();
        let valid_bits = gfx.gfx_queue().queue_family().timestamp_valid_bits;
        if valid_bits == 0 {
            log::warn!("queue does not support timestamps, GPU timing sampling is disabled");
            return Ok(None);
        }

        let query_pool = GfxQueryPool::new(
            vk::QueryType::TIMESTAMP,
            Self::QUERIES_PER_FRAME * FrameCounter::LIGHT_RING_SIZE as u32,
            "geometry-timestamps",
        )?;
        Ok(Some(Self {
            query_pool,
            valid_bits,
            period_ns: gfx.timestamp_period(),
        }))
    }
}
// tools
impl GeometryProfiler {
    #[inline]
    fn first_query(bank: LightBankLabel) -> u32 {
        *bank as u32 * Self::QUERIES_PER_FRAME
    }

    pub fn record_begin(&self, cmd: &GfxCommandBuffer, bank: LightBankLabel) {
        let first = Self::first_query(bank);
        cmd.cmd_reset_query_pool(&self.query_pool, first, Self::QUERIES_PER_FRAME);
        cmd.cmd_write_timestamp(vk::PipelineStageFlags2::TOP_OF_PIPE, &self.query_pool, first);
    }

    pub fn record_end(&self, cmd: &GfxCommandBuffer, bank: LightBankLabel) {
        cmd.cmd_write_timestamp(vk::PipelineStageFlags2::ALL_COMMANDS, &self.query_pool, Self::first_query(bank) + 1);
    }

    /// 读取 timestamp 并交给 handler 的任务，需要在几何部分完成之后执行
    pub fn sampling_task(&self, bank: LightBankLabel, handler: SamplingHandler) -> CompletionTask {
        let device = Gfx::get().gfx_device().ash_device().clone();
        let query_pool = self.query_pool.handle();
        let first = Self::first_query(bank);
        let valid_bits = self.valid_bits;
        let period_ns = self.period_ns;

        Box::new(move || match read_timestamps(&device, query_pool, first, Self::QUERIES_PER_FRAME) {
            Ok(stamps) => handler(GpuFrameTiming {
                gpu_time_ns: elapsed_ns(stamps[0], stamps[1], valid_bits, period_ns),
            }),
            Err(e) => log::error!("failed to read geometry timestamps: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_scales_by_period() {
        assert_eq!(elapsed_ns(100, 300, 64, 1.0), 200);
        assert_eq!(elapsed_ns(100, 300, 64, 2.5), 500);
    }

    #[test]
    fn test_elapsed_wraps_within_valid_bits() {
        // 36 位计数器从末尾回绕到 10
        let max = (1_u64 << 36) - 1;
        assert_eq!(elapsed_ns(max - 9, 10, 36, 1.0), 20);
    }
}
