// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Export Host
//!
//! Makes local recommenders reachable over HTTP. Every port gets one axum
//! listener serving the objects exported on that port and no others; an
//! object is addressed by the UUID in its [`RemoteHandle`].
//!
//! Export and unexport are idempotent. Exporting an object that is already
//! exported returns its existing handle; unexporting an object that was never
//! exported is a no-op. The listener of a port shuts down gracefully once its
//! last object is unexported.

use crate::domain::recommender::Recommender;
use crate::presentation::api;
use crate::presentation::wire::RemoteHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object is not exported: {0}")]
    NotExported(Uuid),
}

struct ExportedObject {
    handle: RemoteHandle,
    alg: Arc<dyn Recommender>,
    key: usize,
}

struct PortBinding {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

#[derive(Default)]
struct ExportTable {
    objects: HashMap<Uuid, ExportedObject>,
    by_key: HashMap<usize, Uuid>,
    ports: HashMap<u16, PortBinding>,
}

struct ExportHostInner {
    bind_host: String,
    advertised_host: String,
    table: RwLock<ExportTable>,
    /// Serializes export/unexport so bindings are never raced
    ops: Mutex<()>,
    started: Instant,
}

/// Cloneable handle to the set of exported objects of this process
#[derive(Clone)]
pub struct ExportHost {
    inner: Arc<ExportHostInner>,
}

fn object_key(alg: &Arc<dyn Recommender>) -> usize {
    Arc::as_ptr(alg) as *const () as usize
}

impl ExportHost {
    /// Listeners bind to `bind_host`; handle URLs use the same host, or
    /// loopback when binding to every interface
    pub fn new(bind_host: impl Into<String>) -> Self {
        let bind_host = bind_host.into();
        let advertised_host = match bind_host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1".to_string(),
            host => host.to_string(),
        };
        Self::with_advertised_host(bind_host, advertised_host)
    }

    pub fn with_advertised_host(bind_host: impl Into<String>, advertised_host: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ExportHostInner {
                bind_host: bind_host.into(),
                advertised_host: advertised_host.into(),
                table: RwLock::new(ExportTable::default()),
                ops: Mutex::new(()),
                started: Instant::now(),
            }),
        }
    }

    /// Export `alg` on `port`. Port 0 binds a fresh ephemeral port.
    pub async fn export(
        &self,
        alg: Arc<dyn Recommender>,
        port: u16,
    ) -> Result<RemoteHandle, ExportError> {
        let _ops = self.inner.ops.lock().await;
        let key = object_key(&alg);

        if let Some(handle) = self.handle_by_key(key) {
            debug!(alg = %handle.name, id = %handle.id, "Already exported");
            return Ok(handle);
        }

        let bound = (port != 0)
            .then(|| self.inner.table.read().ports.get(&port).map(|b| b.addr))
            .flatten();
        let addr = match bound {
            Some(addr) => addr,
            None => self.bind(port).await?,
        };

        let id = Uuid::new_v4();
        let handle = RemoteHandle {
            id,
            name: alg.name(),
            port: addr.port(),
            url: format!("http://{}:{}/objects/{}", self.inner.advertised_host, addr.port(), id),
        };
        {
            let mut table = self.inner.table.write();
            table.by_key.insert(key, id);
            table.objects.insert(
                id,
                ExportedObject {
                    handle: handle.clone(),
                    alg,
                    key,
                },
            );
        }

        metrics::counter!("recforge_exports_total", "algorithm" => handle.name.clone()).increment(1);
        info!(alg = %handle.name, url = %handle.url, "Exported");
        Ok(handle)
    }

    async fn bind(&self, port: u16) -> Result<SocketAddr, ExportError> {
        let addr = format!("{}:{}", self.inner.bind_host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ExportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| ExportError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let router = api::router(self.clone(), local.port());
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await
            {
                error!(addr = %local, error = %e, "Export listener failed");
            }
            debug!(addr = %local, "Export listener stopped");
        });

        self.inner.table.write().ports.insert(
            local.port(),
            PortBinding {
                addr: local,
                shutdown,
            },
        );
        info!(addr = %local, "Export listener started");
        Ok(local)
    }

    /// Remove the binding of `alg`. Returns whether it was exported.
    pub async fn unexport(&self, alg: &Arc<dyn Recommender>) -> bool {
        let _ops = self.inner.ops.lock().await;
        let id = self.inner.table.read().by_key.get(&object_key(alg)).copied();
        match id {
            Some(id) => self.remove(id),
            None => false,
        }
    }

    pub async fn unexport_id(&self, id: Uuid) -> bool {
        let _ops = self.inner.ops.lock().await;
        self.remove(id)
    }

    /// Unexport everything and stop all listeners
    pub async fn unexport_all(&self) -> usize {
        let _ops = self.inner.ops.lock().await;
        let ids: Vec<Uuid> = self.inner.table.read().objects.keys().copied().collect();
        ids.into_iter().filter(|id| self.remove(*id)).count()
    }

    fn remove(&self, id: Uuid) -> bool {
        let mut table = self.inner.table.write();
        let Some(object) = table.objects.remove(&id) else {
            return false;
        };
        table.by_key.remove(&object.key);

        let port = object.handle.port;
        let port_in_use = table.objects.values().any(|o| o.handle.port == port);
        if !port_in_use {
            if let Some(binding) = table.ports.remove(&port) {
                binding.shutdown.cancel();
            }
        }
        info!(alg = %object.handle.name, id = %id, "Unexported");
        true
    }

    fn handle_by_key(&self, key: usize) -> Option<RemoteHandle> {
        let table = self.inner.table.read();
        let id = table.by_key.get(&key)?;
        table.objects.get(id).map(|o| o.handle.clone())
    }

    pub fn exported_handle(&self, alg: &Arc<dyn Recommender>) -> Option<RemoteHandle> {
        self.handle_by_key(object_key(alg))
    }

    pub fn is_exported(&self, alg: &Arc<dyn Recommender>) -> bool {
        self.exported_handle(alg).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<dyn Recommender>> {
        self.inner
            .table
            .read()
            .objects
            .get(&id)
            .map(|o| Arc::clone(&o.alg))
    }

    pub fn require(&self, id: Uuid) -> Result<Arc<dyn Recommender>, ExportError> {
        self.get(id).ok_or(ExportError::NotExported(id))
    }

    /// Object `id` if it is exported on `port`
    pub fn require_on(&self, port: u16, id: Uuid) -> Result<Arc<dyn Recommender>, ExportError> {
        self.inner
            .table
            .read()
            .objects
            .get(&id)
            .filter(|o| o.handle.port == port)
            .map(|o| Arc::clone(&o.alg))
            .ok_or(ExportError::NotExported(id))
    }

    pub fn handles(&self) -> Vec<RemoteHandle> {
        let mut handles: Vec<RemoteHandle> = self
            .inner
            .table
            .read()
            .objects
            .values()
            .map(|o| o.handle.clone())
            .collect();
        handles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        handles
    }

    pub fn handles_on(&self, port: u16) -> Vec<RemoteHandle> {
        self.handles()
            .into_iter()
            .filter(|handle| handle.port == port)
            .collect()
    }

    pub fn bound_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.inner.table.read().ports.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }
}

impl Default for ExportHost {
    fn default() -> Self {
        Self::new("127.0.0.1")
    }
}
