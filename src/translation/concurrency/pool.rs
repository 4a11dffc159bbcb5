//! 翻译工作池
//!
//! 固定数量的工作任务从有界任务队列中取出批次、调用翻译回调，并把结果推入结果队列。
//! 队列容量由 `queue_backlog` 决定，提交方在队列满时等待。
//!
//! 并发派发的批次之间没有顺序保证；[`WorkerPool::process_all`] 收齐结果后按任务编号排序返回。
//!
//! 每次 `process_all` 是一个独立的运行：任务带有运行编号和运行级取消令牌。调用方取消后，
//! 该运行中排队或进行中的任务不再产生结果，迟到的结果按运行编号丢弃，不会进入下一次运行。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::translation::config::constants;
use crate::translation::core::translator::Translator;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::node::NodeId;

/// 工作池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_backlog: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: constants::DEFAULT_WORKER_COUNT,
            queue_backlog: constants::DEFAULT_QUEUE_BACKLOG,
        }
    }
}

/// 一个待翻译的批次
pub struct TranslationJob {
    pub id: usize,
    /// 批次中的节点，按批次顺序
    pub nodes: Vec<NodeId>,
    /// 编码后的标记文本
    pub payload: String,
    pub translator: Arc<dyn Translator>,
}

/// 批次翻译结果
#[derive(Debug)]
pub struct JobResult {
    pub id: usize,
    pub nodes: Vec<NodeId>,
    pub result: TranslationResult<String>,
    pub elapsed: Duration,
}

/// 队列中的任务，附带所属运行
struct QueuedJob {
    job: TranslationJob,
    generation: u64,
    cancel: CancellationToken,
}

/// 工作者产出的结果，附带所属运行
struct TaggedResult {
    generation: u64,
    result: JobResult,
}

type SharedReceiver<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;

/// 有界翻译工作池
pub struct WorkerPool {
    config: PoolConfig,
    job_tx: parking_lot::Mutex<Option<mpsc::Sender<QueuedJob>>>,
    result_rx: tokio::sync::Mutex<mpsc::Receiver<TaggedResult>>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    // 同一时刻只允许一次 process_all
    run_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// 启动工作池，必须在 tokio 运行时内调用
    ///
    /// 工作任务监听 `parent` 的子令牌：父令牌取消或调用 [`shutdown`](Self::shutdown) 时全部退出。
    pub fn new(config: PoolConfig, parent: &CancellationToken) -> Self {
        let workers = config.workers.max(1);
        let backlog = config.queue_backlog.max(1);
        let cancel = parent.child_token();

        let (job_tx, job_rx) = mpsc::channel::<QueuedJob>(backlog);
        let (result_tx, result_rx) = mpsc::channel::<TaggedResult>(backlog);
        let job_rx: SharedReceiver<QueuedJob> = Arc::new(tokio::sync::Mutex::new(job_rx));

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::debug!("工作池启动: {} 个工作者，队列容量 {}", workers, backlog);

        Self {
            config: PoolConfig {
                workers,
                queue_backlog: backlog,
            },
            job_tx: parking_lot::Mutex::new(Some(job_tx)),
            result_rx: tokio::sync::Mutex::new(result_rx),
            handles: parking_lot::Mutex::new(handles),
            run_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            cancel,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.job_tx.lock().is_none() || self.cancel.is_cancelled()
    }

    /// 提交全部任务并收齐结果，结果按任务编号排序
    ///
    /// `cancel` 取消或返回的 future 被丢弃时，本次运行剩余的任务随之取消。
    pub async fn process_all(
        &self,
        jobs: Vec<TranslationJob>,
        cancel: &CancellationToken,
    ) -> TranslationResult<Vec<JobResult>> {
        let _guard = self.run_lock.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let run = cancel.child_token();
        let _run_guard = run.clone().drop_guard();

        let sender = self
            .job_tx
            .lock()
            .clone()
            .ok_or_else(|| TranslationError::ConcurrencyError("工作池已关闭".to_string()))?;

        let expected = jobs.len();
        if expected == 0 {
            return Ok(Vec::new());
        }

        let submit_cancel = run.clone();
        let submit = async move {
            for job in jobs {
                let queued = QueuedJob {
                    job,
                    generation,
                    cancel: submit_cancel.clone(),
                };
                let sent = tokio::select! {
                    biased;
                    _ = submit_cancel.cancelled() => break,
                    sent = sender.send(queued) => sent,
                };
                sent.map_err(|_| TranslationError::ConcurrencyError("任务队列已关闭".to_string()))?;
            }
            Ok::<(), TranslationError>(())
        };

        let collect = async {
            let mut rx = self.result_rx.lock().await;
            let mut results = Vec::with_capacity(expected);
            while results.len() < expected {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        // 工作者已退出，停止提交
                        run.cancel();
                        return Err(TranslationError::Cancelled);
                    }
                    _ = run.cancelled() => return Err(TranslationError::Cancelled),
                    received = rx.recv() => match received {
                        Some(tagged) if tagged.generation == generation => results.push(tagged.result),
                        Some(stale) => {
                            tracing::debug!(
                                "丢弃已取消运行 {} 的迟到结果（任务 {}）",
                                stale.generation,
                                stale.result.id
                            );
                        }
                        None => {
                            run.cancel();
                            return Err(TranslationError::ConcurrencyError(
                                "结果队列已关闭".to_string(),
                            ));
                        }
                    },
                }
            }
            if self.cancel.is_cancelled() || run.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }
            Ok(results)
        };

        let (submitted, collected) = tokio::join!(submit, collect);
        // 取消优先于队列关闭错误
        let mut results = collected?;
        submitted?;

        results.sort_by_key(|result| result.id);
        Ok(results)
    }

    /// 取消全部工作者、关闭任务队列并清空结果队列，返回被丢弃的结果数量
    pub async fn shutdown(&self) -> usize {
        self.cancel.cancel();
        self.job_tx.lock().take();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("工作者退出异常: {}", e);
            }
        }

        let mut rx = self.result_rx.lock().await;
        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }

        tracing::debug!("工作池已关闭，丢弃 {} 个未领取的结果", drained);
        drained
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: SharedReceiver<QueuedJob>,
    results: mpsc::Sender<TaggedResult>,
    cancel: CancellationToken,
) {
    loop {
        let queued = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(QueuedJob {
            job,
            generation,
            cancel: run,
        }) = queued
        else {
            break;
        };

        // 所属运行已取消的任务直接丢弃
        if run.is_cancelled() {
            tracing::trace!("工作者 {} 跳过已取消运行 {} 的任务 {}", worker_id, generation, job.id);
            continue;
        }

        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
            _ = run.cancelled() => Err(TranslationError::Cancelled),
            result = job.translator.translate(&run, &job.payload) => result,
        };

        if run.is_cancelled() {
            continue;
        }

        tracing::trace!(
            "工作者 {} 完成任务 {}（{} 个节点，{:?}）",
            worker_id,
            job.id,
            job.nodes.len(),
            started.elapsed()
        );

        let outcome = TaggedResult {
            generation,
            result: JobResult {
                id: job.id,
                nodes: job.nodes,
                result,
                elapsed: started.elapsed(),
            },
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => false,
            sent = results.send(outcome) => sent.is_ok(),
        };
        if !sent {
            break;
        }
    }
}
