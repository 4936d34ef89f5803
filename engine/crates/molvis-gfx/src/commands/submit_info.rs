use ash::vk;
use itertools::Itertools;

use crate::commands::{command_buffer::GfxCommandBuffer, semaphore::GfxSemaphore};

/// 一个 `vkQueueSubmit2` batch 的构建器
///
/// ```ignore
/// GfxSubmitInfo::new(&[cmd])
///     .wait(&acquire, vk::PipelineStageFlags2::BLIT, None)
///     .signal(&timeline, vk::PipelineStageFlags2::ALL_COMMANDS, Some(value));
/// ```
#[derive(Default)]
pub struct GfxSubmitInfo {
    commands: Vec<vk::CommandBufferSubmitInfo<'static>>,
    waits: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signals: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        Self {
            commands: commands
                .iter()
                .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd.vk_handle()))
                .collect_vec(),
            ..Default::default()
        }
    }

    /// `value` 只对 timeline semaphore 有意义，binary semaphore 传 None
    pub fn wait(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.waits.push(Self::semaphore_info(semaphore, stage, value));
        self
    }

    /// 同 [`Self::wait`]
    pub fn signal(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.signals.push(Self::semaphore_info(semaphore, stage, value));
        self
    }

    pub fn submit_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default()
            .command_buffer_infos(&self.commands)
            .wait_semaphore_infos(&self.waits)
            .signal_semaphore_infos(&self.signals)
    }

    fn semaphore_info(
        semaphore: &GfxSemaphore,
        stage: vk::PipelineStageFlags2,
        value: Option<u64>,
    ) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default().semaphore(semaphore.handle()).stage_mask(stage).value(value.unwrap_or(0))
    }
}
