// tests/common/mod.rs
//
// Offline test doubles for the storage client and its builder.

#![allow(dead_code)]

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use s3fetch::{
    ClientBuilder, ClientError, Downloader, GetObjectRequest, IoSink, MapEnv,
    MissingRegionPolicy, ObjectBody, ObjectClient, Overrides, RegionResolver,
    ResolvedRegionConfig, StorageClientFactory, StorageClientHandle, Target,
    LocalProfileFile,
};

/// What the fake client does with each GET.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Serve this body (written to the target file, if any).
    Serve(Bytes),
    /// Report success without touching the target file.
    ClaimSuccess,
    CredentialsFailure,
    ServiceFailure,
    OtherFailure,
}

#[derive(Debug)]
pub struct MockClient {
    behaviour: Behaviour,
    region: Option<String>,
    requests: Mutex<Vec<GetObjectRequest>>,
}

impl MockClient {
    pub fn requests(&self) -> Vec<GetObjectRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ObjectClient for MockClient {
    fn get_object(&self, request: GetObjectRequest) -> Result<ObjectBody, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.behaviour {
            Behaviour::Serve(body) => match request.target {
                Target::Memory => Ok(ObjectBody::Bytes(body.clone())),
                Target::File(path) => {
                    fs::write(&path, body).map_err(ClientError::other)?;
                    Ok(ObjectBody::Saved { path, bytes_written: body.len() as u64 })
                }
            },
            Behaviour::ClaimSuccess => match request.target {
                Target::Memory => Ok(ObjectBody::Bytes(Bytes::new())),
                Target::File(path) => Ok(ObjectBody::Saved { path, bytes_written: 0 }),
            },
            Behaviour::CredentialsFailure => {
                Err(ClientError::credentials("no providers in chain provided credentials"))
            }
            Behaviour::ServiceFailure => Err(ClientError::service("dispatch failure: connection refused")),
            Behaviour::OtherFailure => Err(ClientError::other("invalid configuration")),
        }
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Hands out clients and records every resolution it was asked to build from.
pub struct MockBuilder {
    behaviour: Behaviour,
    pub builds: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<ResolvedRegionConfig>>>,
    pub last: Arc<Mutex<Option<Arc<MockClient>>>>,
}

impl MockBuilder {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            builds: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            last: Arc::new(Mutex::new(None)),
        }
    }
}

impl ClientBuilder for MockBuilder {
    fn build(&self, resolved: &ResolvedRegionConfig) -> Result<StorageClientHandle, ClientError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(resolved.clone());
        let client = Arc::new(MockClient {
            behaviour: self.behaviour.clone(),
            region: resolved.region.clone(),
            requests: Mutex::new(Vec::new()),
        });
        *self.last.lock().unwrap() = Some(Arc::clone(&client));
        Ok(client)
    }
}

/// Shared views into a [`MockBuilder`] after it has been moved into a factory.
pub struct Probe {
    pub builds: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<ResolvedRegionConfig>>>,
    last: Arc<Mutex<Option<Arc<MockClient>>>>,
}

impl Probe {
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> Arc<MockClient> {
        self.last.lock().unwrap().clone().expect("no client built yet")
    }
}

/// Factory with an empty environment, no profile file and the default policy.
pub fn offline_factory(behaviour: Behaviour, io: Arc<dyn IoSink>) -> (StorageClientFactory, Probe) {
    offline_factory_with(behaviour, MissingRegionPolicy::default(), io)
}

pub fn offline_factory_with(
    behaviour: Behaviour,
    policy: MissingRegionPolicy,
    io: Arc<dyn IoSink>,
) -> (StorageClientFactory, Probe) {
    let builder = MockBuilder::new(behaviour);
    let probe = Probe {
        builds: Arc::clone(&builder.builds),
        seen: Arc::clone(&builder.seen),
        last: Arc::clone(&builder.last),
    };
    let resolver = RegionResolver::new(
        Arc::new(MapEnv::new()),
        Arc::new(LocalProfileFile::new()),
        policy,
    );
    (StorageClientFactory::new(resolver, Box::new(builder), io), probe)
}

pub fn offline_downloader(behaviour: Behaviour, io: Arc<dyn IoSink>) -> (Downloader, Probe) {
    let (factory, probe) = offline_factory(behaviour, Arc::clone(&io));
    (Downloader::new(Arc::new(factory), Overrides::new(), io), probe)
}
