//! 有界分发队列
//!
//! 入口只做 `try_send`，不等待分发结果。队列满时丢弃并告警；
//! 关闭时停止接收，排空已入队的事件。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use super::event::PostbackEvent;

/// 入口提交分发任务的接口
pub trait PostbackSink: Send + Sync {
    fn submit(&self, event: PostbackEvent);
}

pub struct DispatchQueue {
    tx: mpsc::Sender<PostbackEvent>,
    accepting: AtomicBool,
}

impl DispatchQueue {
    /// 创建队列并启动消费任务
    ///
    /// `workers` 同时处理的事件数上限；`shutdown` 变为 true 后排空剩余事件再退出。
    pub fn start(
        dispatcher: Arc<Dispatcher>,
        capacity: usize,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Arc::new(Self {
            tx,
            accepting: AtomicBool::new(true),
        });
        let handle = tokio::spawn(run_worker(dispatcher, rx, workers.max(1), shutdown));
        (queue, handle)
    }

    /// 当前排队中的事件数
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }
}

impl PostbackSink for DispatchQueue {
    fn submit(&self, event: PostbackEvent) {
        if !self.is_accepting() {
            warn!(
                clickid = %event.click_id,
                "Dispatch queue closed, postback dropped"
            );
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    clickid = %event.click_id,
                    event_type = %event.event_type,
                    "Dispatch queue full, postback dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    clickid = %event.click_id,
                    "Dispatch worker stopped, postback dropped"
                );
            }
        }
    }
}

fn spawn_dispatch(set: &mut JoinSet<()>, dispatcher: &Arc<Dispatcher>, event: PostbackEvent) {
    let dispatcher = Arc::clone(dispatcher);
    set.spawn(async move {
        let summary = dispatcher.dispatch(&event).await;
        debug!(
            clickid = %event.click_id,
            event_type = %event.event_type,
            matched = summary.matched,
            delivered = summary.delivered,
            failed = summary.failed,
            "Dispatch finished"
        );
    });
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Dispatch task panicked: {}", e);
    }
}

async fn run_worker(
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::Receiver<PostbackEvent>,
    workers: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut set = JoinSet::new();

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(result) = set.join_next(), if !set.is_empty() => log_join(result),
            next = rx.recv(), if set.len() < workers => match next {
                Some(event) => spawn_dispatch(&mut set, &dispatcher, event),
                None => break,
            },
        }
    }

    // 排空：不再接收新事件，已入队的继续分发（退避等待会被取消）
    rx.close();
    let pending = rx.len();
    if pending > 0 || !set.is_empty() {
        info!(
            "Draining dispatch queue: {} queued, {} in flight",
            pending,
            set.len()
        );
    }
    while let Some(event) = rx.recv().await {
        while set.len() >= workers {
            match set.join_next().await {
                Some(result) => log_join(result),
                None => break,
            }
        }
        spawn_dispatch(&mut set, &dispatcher, event);
    }
    while let Some(result) = set.join_next().await {
        log_join(result);
    }
    info!("Dispatch worker stopped");
}
