// src/s3_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Blocking S3 clients built on the async AWS Rust SDK.
//!
//! Owns a single background multi-thread Tokio runtime; every request is
//! spawned there and the calling thread blocks until it completes.
//!
//! Two client shapes exist:
//! - [`RegionalClient`]: bound to one resolved region.
//! - [`DiscoveringClient`]: no region configured. Requests start in
//!   `us-east-1`; when S3 answers with `x-amz-bucket-region` naming another
//!   region, the bucket's region is remembered and the request is sent once
//!   more to that region.

use anyhow::Context;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_smithy_http_client::tls::rustls_provider::CryptoMode;
use aws_smithy_http_client::{tls, Builder as HttpClientBuilder};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use std::{fs, thread};
use tokio::io::AsyncWriteExt;
use tokio::runtime::{Builder as TokioBuilder, Handle};
use tracing::{debug, info, warn};

use crate::client_factory::ClientBuilder;
use crate::config::{parse_flag, StaticCredentials};
use crate::constants::{
    BUCKET_REGION_HEADER, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_REGION, KEY_CA_BUNDLE, KEY_CONNECT_TIMEOUT, KEY_ENDPOINT, KEY_FORCE_PATH_STYLE,
    KEY_OPERATION_TIMEOUT, KEY_USE_PATH_STYLE_ENDPOINT,
};
use crate::env::{runtime_threads, ProcessEnv};
use crate::error::{BoxError, ClientError};
use crate::object_client::{GetObjectRequest, ObjectBody, ObjectClient, StorageClientHandle, Target};
use crate::region::ResolvedRegionConfig;


// -----------------------------------------------------------------------------
// Global runtime (lazy, thread-safe)
// -----------------------------------------------------------------------------
static RT_HANDLE: OnceCell<Handle> = OnceCell::new();

// Create (once) a background multi-thread Tokio runtime and return its Handle.
fn global_rt_handle() -> Result<&'static Handle, ClientError> {
    RT_HANDLE.get_or_try_init(|| {
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("s3fetch-rt".to_string())
            .spawn(move || {
                let threads = runtime_threads(&ProcessEnv);
                debug!("Creating Tokio runtime with {} worker threads", threads);

                let rt = match TokioBuilder::new_multi_thread()
                    .enable_io()
                    .enable_time()
                    .worker_threads(threads)
                    .thread_name("s3fetch-rt-worker")
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                // Send a Handle clone back to the creator, then park the runtime forever.
                let _ = tx.send(Ok(rt.handle().clone()));
                rt.block_on(std::future::pending::<()>());
            })
            .map_err(ClientError::other)?;

        rx.recv()
            .map_err(ClientError::other)?
            .map_err(ClientError::other)
    })
}

/// Run an async `fut` on the global runtime and block the **current** thread
/// until it completes. Works from plain threads and from inside other runtimes.
pub fn run_on_global_rt<F, T>(fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = Result<T, ClientError>> + Send + 'static,
    T: Send + 'static,
{
    let handle = global_rt_handle()?;
    // std channel: a blocking recv is legal even on an async worker thread
    let (tx, rx) = mpsc::channel();

    handle.spawn(async move {
        let _ = tx.send(fut.await);
    });

    rx.recv()
        .map_err(|_| ClientError::other("global runtime task crashed: RecvError(())"))?
}


// -----------------------------------------------------------------------------
// TLS helper, for CA bundle
// -----------------------------------------------------------------------------

/// Create a TLS context using a CA bundle file
fn tls_context_from_pem(filename: impl AsRef<Path>) -> anyhow::Result<tls::TlsContext> {
    let pem_contents = fs::read(&filename)
        .with_context(|| format!("Failed to read CA bundle file: {}", filename.as_ref().display()))?;

    let trust_store = tls::TrustStore::empty()
        .with_pem_certificate(pem_contents.as_slice());

    tls::TlsContext::builder()
        .with_trust_store(trust_store)
        .build()
        .with_context(|| format!("Failed to build TLS context from PEM {}", filename.as_ref().display()))
}


// -----------------------------------------------------------------------------
// Settings understood by the SDK builder
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClientSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub credentials: Option<StaticCredentials>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub ca_bundle: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

impl ClientSettings {
    pub(crate) fn from_resolved(resolved: &ResolvedRegionConfig) -> Self {
        let raw = &resolved.raw_overrides;
        let get = |key: &str| setting(raw, key);

        Self {
            region: resolved.region.clone(),
            profile: resolved.profile.clone(),
            credentials: resolved.credentials.clone(),
            endpoint: get(KEY_ENDPOINT).map(str::to_string),
            force_path_style: get(KEY_USE_PATH_STYLE_ENDPOINT)
                .or_else(|| get(KEY_FORCE_PATH_STYLE))
                .is_some_and(parse_flag),
            ca_bundle: get(KEY_CA_BUNDLE).map(PathBuf::from),
            connect_timeout: seconds(raw, KEY_CONNECT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT_SECS),
            operation_timeout: seconds(raw, KEY_OPERATION_TIMEOUT, DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }
}

fn setting<'a>(raw: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    raw.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn seconds(raw: &BTreeMap<String, String>, key: &str, default: u64) -> Duration {
    let secs = match setting(raw, key) {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring non-numeric `{}` = '{}', using {}s", key, v, default);
            default
        }),
    };
    Duration::from_secs(secs)
}

async fn load_sdk_config(settings: &ClientSettings) -> Result<SdkConfig, ClientError> {
    let bootstrap = settings
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(bootstrap));

    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(creds) = &settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            creds.key.clone(),
            creds.secret.clone(),
            creds.token.clone(),
            None,
            "s3fetch-config",
        ));
    }
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(ca_bundle) = &settings.ca_bundle {
        info!("Loading CA bundle from: {}", ca_bundle.display());
        let tls_context = tls_context_from_pem(ca_bundle).map_err(ClientError::other)?;
        loader = loader.http_client(
            HttpClientBuilder::new()
                .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
                .tls_context(tls_context)
                .build_https(),
        );
    }

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(settings.connect_timeout)
        .operation_timeout(settings.operation_timeout)
        .build();

    Ok(loader.timeout_config(timeout_config).load().await)
}

fn regional_s3_client(sdk: &SdkConfig, region: &str, force_path_style: bool) -> Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk)
        .region(Region::new(region.to_string()))
        .force_path_style(force_path_style)
        .build();
    Client::from_conf(s3_config)
}


// -----------------------------------------------------------------------------
// Client factory backend
// -----------------------------------------------------------------------------

/// Builds SDK-backed clients: regional when a region is known, discovering otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsClientBuilder;

impl ClientBuilder for AwsClientBuilder {
    fn build(&self, resolved: &ResolvedRegionConfig) -> Result<StorageClientHandle, ClientError> {
        let settings = ClientSettings::from_resolved(resolved);
        debug!(
            "building S3 client: region={:?} profile={:?} endpoint={:?} static_credentials={}",
            settings.region,
            settings.profile,
            settings.endpoint,
            settings.credentials.is_some()
        );

        run_on_global_rt(async move {
            let sdk = load_sdk_config(&settings).await?;
            let handle: StorageClientHandle = match &settings.region {
                Some(region) => Arc::new(RegionalClient {
                    client: regional_s3_client(&sdk, region, settings.force_path_style),
                    region: region.clone(),
                }),
                None => Arc::new(DiscoveringClient::new(sdk, settings.force_path_style)),
            };
            Ok(handle)
        })
    }
}


// -----------------------------------------------------------------------------
// GET plumbing shared by both clients
// -----------------------------------------------------------------------------

#[derive(Debug)]
enum FetchError {
    Sdk(SdkError<GetObjectError, HttpResponse>),
    /// Body stream broke off mid-transfer
    Body(BoxError),
    Io(std::io::Error),
}

impl FetchError {
    fn into_client_error(self) -> ClientError {
        match self {
            FetchError::Sdk(err) => classify_sdk_error(err),
            FetchError::Body(err) => ClientError::service(err),
            FetchError::Io(err) => ClientError::other(err),
        }
    }
}

fn classify_sdk_error(err: SdkError<GetObjectError, HttpResponse>) -> ClientError {
    if is_credentials_failure(&err) {
        return ClientError::credentials(err);
    }
    match err {
        SdkError::ServiceError(_) => ClientError::service(err),
        SdkError::ConstructionFailure(_) => {
            // Identity resolution failures surface here on some SDK versions
            if DisplayErrorContext(&err).to_string().to_lowercase().contains("credential") {
                ClientError::credentials(err)
            } else {
                ClientError::other(err)
            }
        }
        // dispatch, timeout and response failures are connectivity problems
        _ => ClientError::service(err),
    }
}

/// True when a credentials provider failure appears anywhere in the cause chain.
pub(crate) fn is_credentials_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<CredentialsError>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

fn redirect_region(err: &SdkError<GetObjectError, HttpResponse>) -> Option<String> {
    err.raw_response()
        .and_then(|resp| resp.headers().get(BUCKET_REGION_HEADER))
        .map(str::to_string)
}

async fn fetch(client: &Client, request: &GetObjectRequest) -> Result<ObjectBody, FetchError> {
    let output = client
        .get_object()
        .bucket(&request.bucket)
        .key(&request.key)
        .send()
        .await
        .map_err(FetchError::Sdk)?;

    match &request.target {
        Target::Memory => {
            let data = output
                .body
                .collect()
                .await
                .map_err(|e| FetchError::Body(e.into()))?
                .into_bytes();
            Ok(ObjectBody::Bytes(data))
        }
        Target::File(path) => {
            let written = save_body(output.body, path).await?;
            Ok(ObjectBody::Saved {
                path: path.clone(),
                bytes_written: written,
            })
        }
    }
}

/// Stream `body` into a temp file next to `path`, then move it into place.
/// `path` is left untouched unless the whole body arrived.
async fn save_body(mut body: ByteStream, path: &Path) -> Result<u64, FetchError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (staged, staged_path) = tempfile::Builder::new()
        .prefix(".s3fetch-")
        .tempfile_in(dir)
        .map_err(FetchError::Io)?
        .into_parts();

    let mut file = tokio::fs::File::from_std(staged);
    let mut written = 0u64;
    while let Some(chunk) = body.try_next().await.map_err(|e| FetchError::Body(e.into()))? {
        file.write_all(&chunk).await.map_err(FetchError::Io)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(FetchError::Io)?;
    drop(file);

    staged_path.persist(path).map_err(|e| FetchError::Io(e.error))?;
    Ok(written)
}


// -----------------------------------------------------------------------------
// Clients
// -----------------------------------------------------------------------------

/// Client bound to a single region.
#[derive(Debug)]
pub struct RegionalClient {
    client: Client,
    region: String,
}

impl ObjectClient for RegionalClient {
    fn get_object(&self, request: GetObjectRequest) -> Result<ObjectBody, ClientError> {
        let client = self.client.clone();
        run_on_global_rt(async move {
            fetch(&client, &request)
                .await
                .map_err(FetchError::into_client_error)
        })
    }

    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }
}

/// Client that learns each bucket's region from S3's redirect responses.
#[derive(Debug)]
pub struct DiscoveringClient {
    sdk: SdkConfig,
    force_path_style: bool,
    clients: Mutex<HashMap<String, Client>>,
    bucket_regions: Mutex<HashMap<String, String>>,
}

impl DiscoveringClient {
    fn new(sdk: SdkConfig, force_path_style: bool) -> Self {
        Self {
            sdk,
            force_path_style,
            clients: Mutex::new(HashMap::new()),
            bucket_regions: Mutex::new(HashMap::new()),
        }
    }

    fn region_for(&self, bucket: &str) -> String {
        let regions = self.bucket_regions.lock().unwrap_or_else(|e| e.into_inner());
        regions
            .get(bucket)
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    fn remember(&self, bucket: &str, region: &str) {
        let mut regions = self.bucket_regions.lock().unwrap_or_else(|e| e.into_inner());
        regions.insert(bucket.to_string(), region.to_string());
    }

    /// Region to resend to when `err` redirects `bucket` away from `tried`.
    /// Remembers the bucket's region; `None` means no resend.
    fn redirect_target(
        &self,
        bucket: &str,
        tried: &str,
        err: &SdkError<GetObjectError, HttpResponse>,
    ) -> Option<String> {
        let actual = redirect_region(err).filter(|actual| actual != tried)?;
        info!("bucket {} lives in {}, not {}; resending", bucket, actual, tried);
        self.remember(bucket, &actual);
        Some(actual)
    }

    fn client_for(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients
            .entry(region.to_string())
            .or_insert_with(|| regional_s3_client(&self.sdk, region, self.force_path_style))
            .clone()
    }
}

impl ObjectClient for DiscoveringClient {
    fn get_object(&self, request: GetObjectRequest) -> Result<ObjectBody, ClientError> {
        let region = self.region_for(&request.bucket);
        let client = self.client_for(&region);

        let first = {
            let request = request.clone();
            run_on_global_rt(async move { Ok(fetch(&client, &request).await) })?
        };

        match first {
            Ok(body) => Ok(body),
            Err(FetchError::Sdk(err)) => match self.redirect_target(&request.bucket, &region, &err) {
                Some(actual) => {
                    let client = self.client_for(&actual);
                    run_on_global_rt(async move {
                        fetch(&client, &request)
                            .await
                            .map_err(FetchError::into_client_error)
                    })
                }
                None => Err(classify_sdk_error(err)),
            },
            Err(other) => Err(other.into_client_error()),
        }
    }

    fn region(&self) -> Option<&str> {
        None
    }
}
