use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::web;
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use super::shutdown::DispatchHandle;
use crate::api::{AppState, ClientSettings};
use crate::config::{StaticConfig, get_config};
use crate::postback::{DispatchQueue, DispatchSettings, Dispatcher, PostbackTransport, UreqTransport};
use crate::services::{BlacklistFilter, ProfileService};
use crate::storage::{SeaOrmStorage, StorageFactory};
use crate::tracking::{HeaderEnricher, TrackingService, TrackingStores};

pub struct StartupContext {
    pub state: web::Data<AppState>,
    pub dispatch: DispatchHandle,
}

/// 准备服务器启动的上下文：存储、分发队列、各服务
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {:?}", e))?;

    let config = get_config();

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let transport: Arc<dyn PostbackTransport> =
        Arc::new(UreqTransport::new(config.postback.user_agent.clone()));

    let ctx = assemble(storage, transport, &config);

    info!(
        "Pre-startup completed in {:?} ({} postback workers, queue capacity {})",
        start_time.elapsed(),
        config.postback.workers,
        config.postback.queue_capacity
    );
    Ok(ctx)
}

/// 组装各组件；测试用它注入自己的 transport
///
/// 会启动分发队列的消费任务，必须在 tokio runtime 中调用。
pub fn assemble(
    storage: Arc<SeaOrmStorage>,
    transport: Arc<dyn PostbackTransport>,
    config: &StaticConfig,
) -> StartupContext {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Arc::new(Dispatcher::new(
        storage.clone(),
        storage.clone(),
        transport,
        DispatchSettings::from(&config.postback),
        shutdown_rx.clone(),
    ));
    let (queue, worker) = DispatchQueue::start(
        dispatcher.clone(),
        config.postback.queue_capacity,
        config.postback.workers,
        shutdown_rx,
    );

    let blacklist = Arc::new(BlacklistFilter::new(
        storage.clone(),
        config.blacklist.cache_ttl_secs,
    ));
    let tracking = Arc::new(TrackingService::new(
        TrackingStores {
            clicks: storage.clone(),
            events: storage.clone(),
            offers: storage.clone(),
            links: storage.clone(),
        },
        blacklist.clone(),
        Arc::new(HeaderEnricher::new()),
        queue.clone(),
        config.tracking.default_landing_url.clone(),
    ));
    let profiles = Arc::new(ProfileService::new(storage.clone()));

    let state = web::Data::new(AppState {
        tracking,
        profiles,
        dispatcher,
        queue: queue.clone(),
        blacklist,
        deliveries: storage.clone(),
        health: storage,
        client: ClientSettings::from(&config.tracking),
        started_at: chrono::Utc::now(),
    });

    StartupContext {
        state,
        dispatch: DispatchHandle::new(
            queue,
            shutdown_tx,
            worker,
            Duration::from_secs(config.postback.shutdown_grace_secs),
        ),
    }
}
