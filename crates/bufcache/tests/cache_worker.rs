//! End-to-end tests of the cache client against an in-memory worker.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bufcache::ArrayBufferCache;
use bufcache::BufferId;
use bufcache::Error;
use bufcache::FailedStorePolicy;
use bufcache::WorkerPort;
use portrpc::Transport;
use portrpc::broker;
use tokio::task::JoinSet;

use common::MemoryWorker;
use common::init_tracing;

fn start() -> (ArrayBufferCache, MemoryWorker) {
    init_tracing();
    let worker = MemoryWorker::new();
    let cache = bufcache::load({
        let worker = worker.clone();
        move |port| worker.serve(port)
    });
    (cache, worker)
}

async fn store_and_clone(cache: &ArrayBufferCache, bytes: Vec<u8>) -> bufcache::Result<(BufferId, Vec<u8>)> {
    let id = cache.store(bytes).await?;
    let copy = cache.clone(id).await?;
    Ok((id, copy))
}

/// Polls `check` until it holds or a second has passed.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_store_then_clone_returns_same_bytes() -> anyhow::Result<()> {
    let (cache, worker) = start();

    let original: Vec<u8> = (0..=255).collect();
    let (id, copy) = store_and_clone(&cache, original.clone()).await?;

    assert_eq!(copy, original);
    assert!(cache.buffer_ids().contains(id));
    assert_eq!(worker.stored(), 1);

    // clones are independent copies
    let mut first = cache.clone(id).await?;
    first[0] = 42;
    assert_eq!(cache.clone(id).await?, original);
    Ok(())
}

#[tokio::test]
async fn test_slice_ranges() -> anyhow::Result<()> {
    let (cache, _worker) = start();
    let id = cache.store((0..100).collect()).await?;

    let middle = cache.slice(id, 10, Some(20)).await?;
    assert_eq!(middle.len(), 10);
    assert_eq!(middle, (10..20).collect::<Vec<u8>>());

    let tail = cache.slice(id, 95, None).await?;
    assert_eq!(tail, vec![95, 96, 97, 98, 99]);

    // bounds are interpreted by the worker, not checked here
    let from_end = cache.slice(id, -3, None).await?;
    assert_eq!(from_end, vec![97, 98, 99]);
    assert!(cache.slice(id, 50, Some(10)).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_purge_then_clone_rejects() -> anyhow::Result<()> {
    let (cache, worker) = start();
    let id = cache.store(vec![1, 2, 3]).await?;

    cache.purge(id).await?;
    assert!(!cache.buffer_ids().contains(id));
    assert_eq!(worker.stored(), 0);

    let err = cache.clone(id).await.unwrap_err();
    assert_eq!(err.remote_message(), Some(format!("{} is not stored", id).as_str()));

    // purging twice is the worker's call to reject
    let err = cache.purge(id).await.unwrap_err();
    assert!(matches!(err, Error::Broker(broker::Error::Remote(_))));
    assert_eq!(cache.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_calls_share_one_channel() -> anyhow::Result<()> {
    let (cache, worker) = start();
    let cache = Arc::new(cache);

    let mut tasks = JoinSet::new();
    for i in 0..32u8 {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            let bytes = vec![i; usize::from(i) + 1];
            let (id, copy) = store_and_clone(&cache, bytes.clone()).await?;
            assert_eq!(copy, bytes);
            Ok::<_, Error>(id)
        });
    }

    let mut ids = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        ids.insert(joined??);
    }

    assert_eq!(ids.len(), 32);
    assert_eq!(cache.buffer_ids().len(), 32);
    assert_eq!(worker.stored(), 32);
    assert_eq!(cache.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_buffer_ids_unique_until_purged() -> anyhow::Result<()> {
    let (cache, _worker) = start();

    let mut ids = Vec::new();
    for i in 0..100u8 {
        ids.push(cache.store(vec![i]).await?);
    }
    let unique: HashSet<BufferId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 100);

    for id in &ids[..50] {
        cache.purge(*id).await?;
    }
    assert_eq!(cache.buffer_ids().len(), 50);
    assert!(ids[50..].iter().all(|id| cache.buffer_ids().contains(*id)));
    Ok(())
}

#[tokio::test]
async fn test_connected_client_shares_cache() -> anyhow::Result<()> {
    let (cache, worker) = start();

    let (client, server) = bufcache::channel();
    let channel = server.channel_id();
    cache.connect(server).await?;
    assert!(worker.is_connected(channel));

    let other = ArrayBufferCache::wrap(client);
    let id = cache.store(b"shared".to_vec()).await?;
    assert_eq!(other.clone(id).await?, b"shared".to_vec());

    let id = other.store(b"back".to_vec()).await?;
    assert_eq!(cache.clone(id).await?, b"back".to_vec());

    // hanging up detaches the channel
    drop(other);
    assert!(eventually(|| !worker.is_connected(channel)).await);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_detaches_channel() -> anyhow::Result<()> {
    let (cache, worker) = start();

    let (client, server) = bufcache::channel();
    let channel = server.channel_id();
    cache.connect(server).await?;
    assert_eq!(worker.connected(), 1);

    cache.disconnect(client).await?;
    assert!(!worker.is_connected(channel));
    assert_eq!(worker.connected(), 0);

    let (stray, _server) = bufcache::channel();
    let err = cache.disconnect(stray).await.unwrap_err();
    assert!(err.remote_message().is_some_and(|m| m.ends_with("is not connected")));
    Ok(())
}

#[tokio::test]
async fn test_worker_exit_rejects_pending_call() {
    init_tracing();

    // takes one request and goes away without answering
    let cache = bufcache::load(|port: WorkerPort| async move {
        let _ = port.recv().await;
    });

    let err = cache.clone(BufferId(1)).await.unwrap_err();
    assert!(
        matches!(err, Error::Broker(broker::Error::Disconnected)),
        "got {:?}",
        err
    );
    assert_eq!(cache.pending_calls(), 0);
}

#[tokio::test]
async fn test_timeout_against_silent_worker() {
    init_tracing();

    let config = bufcache::Config::default()
        .with_name("silent")
        .with_call_timeout(Duration::from_millis(50));
    let cache = bufcache::load_with_config(
        |port: WorkerPort| async move {
            // read everything, answer nothing
            while let Ok(Some(_)) = port.recv().await {}
        },
        config,
    );

    let err = cache.store(vec![0; 16]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Broker(broker::Error::Timeout { method: "store", .. })
    ));
    assert_eq!(cache.pending_calls(), 0);
    assert_eq!(cache.buffer_ids().len(), 1);
}

#[tokio::test]
async fn test_timed_out_store_keeps_id_under_release() -> anyhow::Result<()> {
    init_tracing();

    let config = bufcache::Config::default()
        .with_call_timeout(Duration::from_millis(30))
        .with_failed_store(FailedStorePolicy::Release);
    let worker = MemoryWorker::new();
    let cache = bufcache::load_with_config(
        {
            let worker = worker.clone();
            move |port: WorkerPort| async move {
                // too slow to answer within the deadline
                tokio::time::sleep(Duration::from_millis(100)).await;
                worker.serve(port).await
            }
        },
        config,
    );

    let err = cache.store(vec![7; 16]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Broker(broker::Error::Timeout { method: "store", .. })
    ));

    // the worker still stores the buffer, so its id must stay taken
    assert!(eventually(|| worker.stored() == 1).await);
    assert_eq!(cache.buffer_ids().len(), 1);
    assert_eq!(cache.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_clone_through_shared_handle() -> anyhow::Result<()> {
    let (cache, _worker) = start();
    let cache = Arc::new(cache);

    let id = cache.store(b"shared".to_vec()).await?;
    let handle = Arc::clone(&cache);
    assert_eq!((*handle).clone(id).await?, b"shared".to_vec());
    Ok(())
}
