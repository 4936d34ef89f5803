use std::{
    sync::{Arc, Condvar, Mutex},
    thread,
};

use crossbeam_channel::Sender;

/// 在 GPU 完成某个 timeline 值之后执行的任务
pub type CompletionTask = Box<dyn FnOnce() + Send + 'static>;

struct CompletionJob {
    /// 等到 timeline semaphore 达到这个值
    wait_value: u64,
    task: CompletionTask,
}

/// 后台线程已经处理完的最大 timeline 值；线程退出后为 `u64::MAX`
#[derive(Default)]
struct Progress {
    processed: Mutex<u64>,
    changed: Condvar,
}
impl Progress {
    fn mark(&self, value: u64) {
        let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        *processed = (*processed).max(value);
        self.changed.notify_all();
    }

    fn wait_for(&self, value: u64) {
        let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        while *processed < value {
            processed = self.changed.wait(processed).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// 完成回调的后台线程
///
/// 主线程通过 `submit` 提交 (timeline 值, 任务)。后台线程按提交顺序等待每个值，
/// 等到之后执行任务。任务之间的顺序与提交顺序一致。
///
/// 任务可能读取之后会被复用的 GPU 资源，复用前先用 [`Self::wait_processed`] 等任务跑完。
///
/// # 线程生命周期
/// 线程与 `CompletionWorker` 实例绑定。Drop 时先销毁 sender，
/// 后台线程处理完队列中剩余的任务后退出，Drop 再 join 等待其结束。
pub struct CompletionWorker {
    job_sender: Option<Sender<CompletionJob>>,
    worker_thread: Option<thread::JoinHandle<()>>,
    progress: Arc<Progress>,
    /// 已提交任务中最大的 timeline 值
    submitted: u64,
}

impl CompletionWorker {
    /// `waiter` 阻塞直到 timeline 达到给定值，返回错误时跳过对应任务
    pub fn new<W>(name: &str, waiter: W) -> std::io::Result<Self>
    where
        W: Fn(u64) -> Result<(), String> + Send + 'static,
    {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<CompletionJob>();
        let progress = Arc::new(Progress::default());

        let worker_progress = progress.clone();
        let worker_thread = thread::Builder::new().name(name.to_string()).spawn(move || {
            // 任务 panic 时同样放行所有等待者
            let _exit = scopeguard::guard(worker_progress.clone(), |progress| progress.mark(u64::MAX));
            while let Ok(job) = job_rx.recv() {
                let _span = tracy_client::span!("CompletionWorker::wait");
                match waiter(job.wait_value) {
                    Ok(()) => (job.task)(),
                    Err(e) => {
                        log::error!("failed to wait for timeline value {}: {}", job.wait_value, e);
                    }
                }
                worker_progress.mark(job.wait_value);
            }
        })?;

        Ok(Self {
            job_sender: Some(job_tx),
            worker_thread: Some(worker_thread),
            progress,
            submitted: 0,
        })
    }

    pub fn submit(&mut self, wait_value: u64, task: CompletionTask) {
        let Some(sender) = &self.job_sender else {
            return;
        };
        match sender.send(CompletionJob { wait_value, task }) {
            Ok(()) => self.submitted = self.submitted.max(wait_value),
            Err(e) => log::error!("failed to submit completion task for timeline value {}: {}", wait_value, e),
        }
    }

    /// 阻塞直到 timeline 值不超过 `value` 的任务都已执行或跳过
    ///
    /// 只等待已经提交过的值，从未提交的部分直接忽略。
    pub fn wait_processed(&self, value: u64) {
        let value = value.min(self.submitted);
        if value == 0 {
            return;
        }
        let _span = tracy_client::span!("CompletionWorker::wait_processed");
        self.progress.wait_for(value);
    }
}

impl Drop for CompletionWorker {
    fn drop(&mut self) {
        // 必须先 drop sender，否则 recv 一直阻塞，join 会死锁
        self.job_sender = None;

        if let Some(thread) = self.worker_thread.take()
            && thread.join().is_err()
        {
            log::error!("failed to join completion worker thread");
        }
        log::debug!("completion worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_tasks_run_in_submit_order() {
        let waited = Arc::new(Mutex::new(vec![]));
        let ran = Arc::new(Mutex::new(vec![]));

        let waited_in = waited.clone();
        let mut worker = CompletionWorker::new("test-completion", move |value| {
            waited_in.lock().unwrap().push(value);
            Ok(())
        })
        .unwrap();

        for value in [2, 4, 6] {
            let ran = ran.clone();
            worker.submit(value, Box::new(move || ran.lock().unwrap().push(value)));
        }
        drop(worker);

        assert_eq!(*waited.lock().unwrap(), vec![2, 4, 6]);
        assert_eq!(*ran.lock().unwrap(), vec![2, 4, 6]);
    }

    #[test]
    fn test_failed_wait_skips_task() {
        let ran = Arc::new(Mutex::new(vec![]));
        let mut worker = CompletionWorker::new("test-completion", |value| {
            if value == 3 { Err("device lost".to_string()) } else { Ok(()) }
        })
        .unwrap();

        for value in [1, 3, 5] {
            let ran = ran.clone();
            worker.submit(value, Box::new(move || ran.lock().unwrap().push(value)));
        }
        drop(worker);

        assert_eq!(*ran.lock().unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_wait_processed_blocks_until_task_finishes() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let read = Arc::new(Mutex::new(vec![]));

        let mut worker = CompletionWorker::new("test-completion", |_| Ok(())).unwrap();
        let read_in = read.clone();
        worker.submit(
            3,
            Box::new(move || {
                release_rx.recv().unwrap();
                read_in.lock().unwrap().push(3);
            }),
        );

        let releaser = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            release_tx.send(()).unwrap();
        });
        worker.wait_processed(3);
        // 返回时任务已经读完，之后复用资源是安全的
        assert_eq!(*read.lock().unwrap(), vec![3]);
        releaser.join().unwrap();
    }

    #[test]
    fn test_wait_processed_ignores_values_never_submitted() {
        let mut worker = CompletionWorker::new("test-completion", |_| Ok(())).unwrap();
        worker.wait_processed(8);

        worker.submit(2, Box::new(|| {}));
        // 只等到 2，不会因为 8 从未提交而一直阻塞
        worker.wait_processed(8);
    }

    #[test]
    fn test_wait_processed_returns_after_task_panics() {
        let mut worker = CompletionWorker::new("test-completion", |_| Ok(())).unwrap();
        worker.submit(1, Box::new(|| panic!("sampling task failed")));
        worker.submit(2, Box::new(|| {}));
        worker.wait_processed(2);
    }
}
