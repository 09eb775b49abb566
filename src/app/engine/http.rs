//! HTTP transfer engine
//!
//! Each registered locator gets one GET request. Registration returns once
//! the response headers are in, which is when the total size becomes known;
//! the body is then streamed to a `.part` file by a background task and
//! renamed into place when it ends. Byte counts live in atomics so progress
//! queries from the event loop never wait on the download tasks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};
use url::Url;

use crate::app::engine::{file_name_from_url, TransferDescriptor, TransferEngine};
use crate::constants::{http, sources};
use crate::errors::{EngineError, EngineResult};

/// Configuration for the HTTP engine and its client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory downloads are written to; resolved from the command line
    #[serde(skip)]
    pub download_dir: PathBuf,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// TCP keep-alive settings
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(sources::DEFAULT_DOWNLOAD_DIR),
            connect_timeout: http::CONNECT_TIMEOUT,
            tcp_keepalive: Some(http::TCP_KEEPALIVE),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            user_agent: http::USER_AGENT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Set the download directory
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Builds the HTTP client with the specified configuration
    ///
    /// No overall request timeout is set: a transfer may legitimately run
    /// for hours.
    pub fn build_http_client(&self) -> EngineResult<Client> {
        let mut client_builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .tcp_nodelay(self.tcp_nodelay);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        Ok(client_builder.build()?)
    }
}

/// One transfer owned by the HTTP engine
#[derive(Debug)]
pub struct HttpTransfer {
    id: usize,
    name: String,
    url: Url,
    destination: PathBuf,
    completed: AtomicU64,
    total: AtomicU64,
    size_known: AtomicBool,
    finished: AtomicBool,
}

impl HttpTransfer {
    fn new(id: usize, name: String, url: Url, destination: PathBuf, total: Option<u64>) -> Self {
        Self {
            id,
            name,
            url,
            destination,
            completed: AtomicU64::new(0),
            total: AtomicU64::new(total.unwrap_or(0)),
            size_known: AtomicBool::new(total.is_some()),
            finished: AtomicBool::new(false),
        }
    }

    /// Engine-assigned identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Final path of the downloaded file
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Source URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the body has ended, successfully or not
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn partial_path(&self) -> PathBuf {
        let mut file_name = self.destination.as_os_str().to_owned();
        file_name.push(http::PARTIAL_FILE_SUFFIX);
        PathBuf::from(file_name)
    }

    fn missing(&self) -> EngineResult<u64> {
        if !self.size_known.load(Ordering::Acquire) {
            return Err(EngineError::SizeUnknown {
                name: self.name.clone(),
            });
        }
        let total = self.total.load(Ordering::Acquire);
        Ok(total.saturating_sub(self.completed.load(Ordering::Acquire)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EngineStatus {
    active: usize,
    closed: bool,
}

/// Transfer engine that downloads `http` and `https` locators
pub struct HttpEngine {
    config: EngineConfig,
    client: Client,
    next_id: AtomicUsize,
    status: Arc<watch::Sender<EngineStatus>>,
    cancel_tx: broadcast::Sender<()>,
    closed: AtomicBool,
    /// File names handed out so far; no two transfers share a destination
    claimed_names: Mutex<HashSet<String>>,
}

impl HttpEngine {
    /// Create an engine writing into `config.download_dir`
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let client = config.build_http_client()?;
        let (status, _) = watch::channel(EngineStatus::default());
        let (cancel_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            client,
            next_id: AtomicUsize::new(0),
            status: Arc::new(status),
            cancel_tx,
            closed: AtomicBool::new(false),
            claimed_names: Mutex::new(HashSet::new()),
        })
    }

    /// Number of transfers whose body has not ended yet
    pub fn active_transfers(&self) -> usize {
        self.status.borrow().active
    }

    /// Reserve `name`, or the first free `stem-N.ext` variant of it
    fn claim_file_name(&self, name: String) -> String {
        let mut claimed = self
            .claimed_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut unique = name.clone();
        let mut n = 0;
        while claimed.contains(&unique) {
            n += 1;
            unique = numbered_file_name(&name, n);
        }

        if n > 0 {
            debug!("{} is already taken, saving as {}", name, unique);
        }
        claimed.insert(unique.clone());
        unique
    }

    async fn add_url(&self, locator: &str, name: Option<String>) -> EngineResult<Arc<HttpTransfer>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }

        let url = parse_http_locator(locator)?;
        let name = sanitize_file_name(name.or_else(|| file_name_from_url(&url)));

        debug!("Requesting {}", url);
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::ServerError {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        let name = self.claim_file_name(name);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let destination = self.config.download_dir.join(&name);
        let transfer = Arc::new(HttpTransfer::new(
            id,
            name,
            url,
            destination,
            response.content_length(),
        ));

        self.status.send_modify(|status| status.active += 1);
        tokio::spawn(run_transfer(
            response,
            Arc::clone(&transfer),
            self.cancel_tx.subscribe(),
            Arc::clone(&self.status),
        ));

        Ok(transfer)
    }
}

impl TransferEngine for HttpEngine {
    type Handle = Arc<HttpTransfer>;

    async fn add_from_descriptor(&self, path: &Path) -> EngineResult<Self::Handle> {
        let descriptor = TransferDescriptor::load(path).await?;
        self.add_url(&descriptor.url, descriptor.name).await
    }

    async fn add_from_locator(&self, locator: &str) -> EngineResult<Self::Handle> {
        self.add_url(locator, None).await
    }

    fn bytes_completed(&self, handle: &Self::Handle) -> EngineResult<u64> {
        Ok(handle.completed.load(Ordering::Acquire))
    }

    fn bytes_missing(&self, handle: &Self::Handle) -> EngineResult<u64> {
        handle.missing()
    }

    fn name(&self, handle: &Self::Handle) -> String {
        handle.name.clone()
    }

    async fn wait_all_complete(&self) -> bool {
        let mut status_rx = self.status.subscribe();
        let closed = status_rx
            .wait_for(|status| status.closed || status.active == 0)
            .await
            .map(|status| status.closed)
            .unwrap_or(true);
        !closed
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.cancel_tx.send(());
        self.status.send_modify(|status| status.closed = true);
        info!("Transfer engine closed");
    }
}

/// Parse a locator, accepting only `http` and `https` URLs
fn parse_http_locator(locator: &str) -> EngineResult<Url> {
    let url = Url::parse(locator.trim()).map_err(|e| EngineError::InvalidLocator {
        locator: locator.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(EngineError::InvalidLocator {
            locator: locator.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

/// Reduce a requested name to a single path component
fn sanitize_file_name(name: Option<String>) -> String {
    name.as_deref()
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(http::FALLBACK_FILE_NAME)
        .to_string()
}

/// `data.bin` becomes `data-1.bin`; everything after the first dot is kept
/// as the extension so `a.tar.gz` becomes `a-1.tar.gz`
fn numbered_file_name(name: &str, n: usize) -> String {
    match name.char_indices().skip(1).find(|&(_, c)| c == '.') {
        Some((dot, _)) => format!("{}-{}{}", &name[..dot], n, &name[dot..]),
        None => format!("{}-{}", name, n),
    }
}

async fn run_transfer(
    response: Response,
    transfer: Arc<HttpTransfer>,
    mut cancel_rx: broadcast::Receiver<()>,
    status: Arc<watch::Sender<EngineStatus>>,
) {
    let result = tokio::select! {
        result = stream_body(response, &transfer) => result,
        _ = cancel_rx.recv() => {
            debug!("Transfer {} cancelled", transfer.name);
            Ok(false)
        }
    };

    match result {
        Ok(true) => info!(
            "Finished {} ({} bytes) -> {}",
            transfer.name,
            transfer.completed.load(Ordering::Acquire),
            transfer.destination.display()
        ),
        Ok(false) => {}
        Err(e) => error!("Transfer {} failed: {}", transfer.name, e),
    }

    transfer.finished.store(true, Ordering::Release);
    status.send_modify(|status| status.active = status.active.saturating_sub(1));
}

/// Stream the response body to disk. Returns `Ok(true)` once the file is in
/// its final place.
async fn stream_body(mut response: Response, transfer: &HttpTransfer) -> EngineResult<bool> {
    let partial_path = transfer.partial_path();
    let mut file = File::create(&partial_path).await?;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        transfer
            .completed
            .fetch_add(chunk.len() as u64, Ordering::AcqRel);
    }
    file.flush().await?;
    drop(file);

    if !transfer.size_known.load(Ordering::Acquire) {
        transfer
            .total
            .store(transfer.completed.load(Ordering::Acquire), Ordering::Release);
        transfer.size_known.store(true, Ordering::Release);
    }

    tokio::fs::rename(&partial_path, &transfer.destination).await?;
    Ok(true)
}
