use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing::{error, info, warn};

use callcache::cache::{ReadCache, Subscription};
use callcache::config::Config;
use callcache::error::CallCacheError;
use callcache::handler::{self, AppState};
use callcache::reader::RpcReader;
use callcache::{watch, watcher};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let log_level = if config.verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "warn,callcache=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    info!(
        port = %config.port,
        rpc_url = %config.rpc_url,
        poll_interval_ms = %config.poll_interval,
        watches = config.watch.len(),
        verbose = config.verbose,
        "starting callcache"
    );

    let reader = match RpcReader::new(config.rpc_url.clone(), config.request_timeout()) {
        Ok(reader) => Arc::new(reader),
        Err(e) => {
            error!(error = %e, "failed to build node client");
            std::process::exit(1);
        }
    };

    let cache = ReadCache::new(config.cache_config());

    for spec in &config.watch {
        let call = match watch::parse_watch(spec) {
            Ok(call) => call,
            Err(e) => {
                error!(watch = %spec, error = %e, "invalid watch");
                std::process::exit(1);
            }
        };
        let subscription = cache.observe(call.clone(), reader.fetcher(call));
        tokio::spawn(log_updates(subscription));
    }

    tokio::spawn(watcher::start_block_watcher(
        reader.clone(),
        cache.clone(),
        config.poll_interval(),
    ));

    let app = handler::router(AppState { cache });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!(addr = %addr, "callcache listening");
    axum::serve(listener, app).await.expect("server error");
}

async fn log_updates(mut subscription: Subscription<String, CallCacheError>) {
    while let Some(state) = subscription.next().await {
        if state.loading {
            continue;
        }
        match (&state.value, &state.error) {
            (_, Some(e)) => warn!(call = %subscription.key(), error = %e, "read failed"),
            (Some(value), None) => info!(call = %subscription.key(), value = %value, "read updated"),
            (None, None) => {}
        }
    }
}
