//! In-memory cache worker used by the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bufcache::BufferId;
use bufcache::CacheResult;
use bufcache::Call;
use bufcache::WorkerPort;
use dashmap::DashMap;
use portrpc::ChannelId;
use portrpc::Response;
use portrpc::Transport;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A cache worker keeping buffers in a map, serving any number of channels.
#[derive(Clone, Default)]
pub struct MemoryWorker {
    buffers: Arc<DashMap<BufferId, Vec<u8>>>,
    connected: Arc<DashMap<ChannelId, JoinHandle<()>>>,
}

impl MemoryWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> usize {
        self.buffers.len()
    }

    pub fn connected(&self) -> usize {
        self.connected.len()
    }

    pub fn is_connected(&self, channel: ChannelId) -> bool {
        self.connected.contains_key(&channel)
    }

    /// Answers requests on `port` until the client hangs up.
    pub fn serve(self, port: WorkerPort) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let channel = port.channel_id();
            while let Ok(Some(request)) = port.recv().await {
                let response = match self.handle(request.call) {
                    Ok(result) => Response::success(request.id, result),
                    Err(message) => Response::failure(request.id, message),
                };
                if port.send(response).await.is_err() {
                    break;
                }
            }
            self.connected.remove(&channel);
        })
    }

    fn handle(&self, call: Call) -> Result<Option<CacheResult>, String> {
        match call {
            Call::Store { array_buffer, array_buffer_id } => {
                if self.buffers.contains_key(&array_buffer_id) {
                    return Err(format!("{} is already stored", array_buffer_id));
                }
                self.buffers.insert(array_buffer_id, array_buffer);
                Ok(None)
            }
            Call::Clone { array_buffer_id } => {
                let bytes = self.get(array_buffer_id)?;
                Ok(Some(CacheResult { array_buffer: bytes }))
            }
            Call::Slice { array_buffer_id, begin, end } => {
                let bytes = self.get(array_buffer_id)?;
                let len = bytes.len() as i64;
                let begin = clamp(begin, len);
                let end = clamp(end.unwrap_or(len), len).max(begin);
                Ok(Some(CacheResult {
                    array_buffer: bytes[begin as usize..end as usize].to_vec(),
                }))
            }
            Call::Purge { array_buffer_id } => {
                self.buffers
                    .remove(&array_buffer_id)
                    .map(|_| None)
                    .ok_or_else(|| format!("{} is not stored", array_buffer_id))
            }
            Call::Connect { port } => {
                let channel = port.channel_id();
                let task = tokio::spawn(self.clone().serve(port));
                self.connected.insert(channel, task);
                Ok(None)
            }
            Call::Disconnect { port } => {
                let channel = port.channel_id();
                match self.connected.remove(&channel) {
                    Some((_, task)) => {
                        task.abort();
                        Ok(None)
                    }
                    None => Err(format!("{} is not connected", channel)),
                }
            }
        }
    }

    fn get(&self, id: BufferId) -> Result<Vec<u8>, String> {
        self.buffers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| format!("{} is not stored", id))
    }
}

/// Resolves a possibly negative index against `len`, counting back from the end.
fn clamp(index: i64, len: i64) -> i64 {
    if index < 0 {
        (len + index).max(0)
    } else {
        index.min(len)
    }
}
