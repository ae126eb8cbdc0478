use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, GetOptions, GetRange, ObjectStore, ObjectStoreScheme};
use tracing::{debug, info};
use url::Url;

use crate::config::ServerConfig;
use crate::range::ByteRange;

/// A listed object: full key relative to the library root plus its size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub content_type: String,
}

pub struct ObjectBody {
    /// Total object size, not the length of the returned span.
    pub size: u64,
    pub content_type: String,
    pub range: Option<ByteRange>,
    pub stream: BoxStream<'static, Result<Bytes, StoreError>>,
}

/// The narrow object-store surface the engine needs.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Lists every object under `prefix`, following continuation pages to the end.
    async fn list_all(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError>;

    async fn head_object(&self, key: &str) -> Result<ObjectHead, StoreError>;

    async fn get_object(&self, key: &str, range: Option<ByteRange>)
        -> Result<ObjectBody, StoreError>;

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    NotFound { key: String },
    Transient { key: String, message: String },
    ListingIncomplete { prefix: String, message: String },
    Unsupported(&'static str),
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    fn from_object_store(key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: key.to_string(),
            },
            object_store::Error::NotSupported { .. } | object_store::Error::NotImplemented => {
                StoreError::Unsupported("operation not supported by backend")
            }
            other => StoreError::Transient {
                key: key.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { key } => write!(f, "object not found: {}", key),
            StoreError::Transient { key, message } => {
                write!(f, "object store error for {}: {}", key, message)
            }
            StoreError::ListingIncomplete { prefix, message } => {
                write!(f, "listing of {} did not complete: {}", prefix, message)
            }
            StoreError::Unsupported(what) => write!(f, "unsupported: {}", what),
            StoreError::Backend(message) => write!(f, "object store setup failed: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// `ObjectSource` backed by any `object_store` implementation.
#[derive(Clone)]
pub struct BucketStore {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    root: String,
}

impl BucketStore {
    pub fn new(store: Arc<dyn ObjectStore>, signer: Option<Arc<dyn Signer>>) -> Self {
        Self {
            store,
            signer,
            root: String::new(),
        }
    }

    /// Keys are resolved relative to `root` inside the store.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into().trim_matches('/').to_string();
        self
    }

    /// Builds the backend named by `store_url`: `s3://`, `file://` or `memory:///`.
    pub fn open(config: &ServerConfig) -> Result<Self, StoreError> {
        let url = Url::parse(config.store_url.trim())
            .map_err(|err| StoreError::Backend(format!("invalid store_url: {}", err)))?;
        let (scheme, root) = ObjectStoreScheme::parse(&url)
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        let store = match scheme {
            ObjectStoreScheme::AmazonS3 => {
                let client_options = ClientOptions::new()
                    .with_timeout(Duration::from_secs(config.request_timeout_secs))
                    .with_allow_http(config.allow_http);
                let mut builder = AmazonS3Builder::from_env()
                    .with_url(url.as_str())
                    .with_client_options(client_options);
                if !config.region.trim().is_empty() {
                    builder = builder.with_region(config.region.trim());
                }
                if !config.endpoint.trim().is_empty() {
                    builder = builder.with_endpoint(config.endpoint.trim());
                }
                if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
                    builder = builder
                        .with_access_key_id(&config.access_key_id)
                        .with_secret_access_key(&config.secret_access_key);
                }
                let s3 = Arc::new(
                    builder
                        .build()
                        .map_err(|err| StoreError::Backend(err.to_string()))?,
                );
                info!("Using S3 object store at {}", url);
                Self::new(Arc::clone(&s3) as Arc<dyn ObjectStore>, Some(s3 as Arc<dyn Signer>))
            }
            ObjectStoreScheme::Local | ObjectStoreScheme::Memory => {
                let (store, _) = object_store::parse_url(&url)
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
                info!("Using {:?} object store at {}", scheme, url);
                Self::new(Arc::from(store), None)
            }
            other => {
                return Err(StoreError::Backend(format!(
                    "unsupported store scheme: {:?}",
                    other
                )))
            }
        };
        Ok(store.with_root(root.as_ref()))
    }

    fn path_for(&self, key: &str) -> ObjectPath {
        if self.root.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{}", self.root, key))
        }
    }

    fn key_for(&self, location: &ObjectPath) -> String {
        let full = location.to_string();
        if self.root.is_empty() {
            return full;
        }
        match full.strip_prefix(&format!("{}/", self.root)) {
            Some(rest) => rest.to_string(),
            None => full,
        }
    }
}

#[async_trait]
impl ObjectSource for BucketStore {
    async fn list_all(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let prefix_path = self.path_for(prefix);
        let mut listing = self.store.list(Some(&prefix_path));
        let mut objects = Vec::new();
        while let Some(item) = listing.next().await {
            match item {
                Ok(meta) => objects.push(ObjectEntry {
                    key: self.key_for(&meta.location),
                    size: meta.size,
                }),
                Err(err) => {
                    return Err(StoreError::ListingIncomplete {
                        prefix: prefix.to_string(),
                        message: err.to_string(),
                    })
                }
            }
        }
        debug!(prefix, objects = objects.len(), "listed objects");
        Ok(objects)
    }

    async fn head_object(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let meta = self
            .store
            .head(&self.path_for(key))
            .await
            .map_err(|err| StoreError::from_object_store(key, err))?;
        Ok(ObjectHead {
            size: meta.size,
            content_type: content_type_for_key(key),
        })
    }

    async fn get_object(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<ObjectBody, StoreError> {
        let options = GetOptions {
            range: range.map(|r| GetRange::Bounded(r.start..r.end + 1)),
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&self.path_for(key), options)
            .await
            .map_err(|err| StoreError::from_object_store(key, err))?;
        let size = result.meta.size;
        let owned_key = key.to_string();
        let stream = result
            .into_stream()
            .map(move |chunk| {
                chunk.map_err(|err| StoreError::Transient {
                    key: owned_key.clone(),
                    message: err.to_string(),
                })
            })
            .boxed();
        Ok(ObjectBody {
            size,
            content_type: content_type_for_key(key),
            range,
            stream,
        })
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let Some(signer) = &self.signer else {
            return Err(StoreError::Unsupported("backend cannot sign urls"));
        };
        let url = signer
            .signed_url(Method::GET, &self.path_for(key), expires_in)
            .await
            .map_err(|err| StoreError::from_object_store(key, err))?;
        Ok(url.to_string())
    }
}

pub fn content_type_for_key(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::{ObjectStore, PutPayload};

    use super::{BucketStore, ObjectBody, ObjectEntry, ObjectHead, ObjectSource, StoreError};
    use crate::range::ByteRange;

    pub(crate) async fn memory_store(objects: &[(&str, Vec<u8>)]) -> BucketStore {
        let store = Arc::new(InMemory::new());
        for (key, data) in objects {
            store
                .put(&ObjectPath::from(*key), PutPayload::from(Bytes::from(data.clone())))
                .await
                .unwrap();
        }
        BucketStore::new(store, None)
    }

    /// Wraps a store with injected failures: chosen keys fail with `Transient`,
    /// listings can fail outright or be slowed down.
    pub(crate) struct FlakySource {
        inner: BucketStore,
        transient_keys: Vec<String>,
        fail_listing: bool,
        list_delay: Duration,
    }

    impl FlakySource {
        pub(crate) fn new(inner: BucketStore) -> Self {
            Self {
                inner,
                transient_keys: Vec::new(),
                fail_listing: false,
                list_delay: Duration::ZERO,
            }
        }

        pub(crate) fn with_transient(mut self, key: &str) -> Self {
            self.transient_keys.push(key.to_string());
            self
        }

        pub(crate) fn failing_listing(mut self) -> Self {
            self.fail_listing = true;
            self
        }

        pub(crate) fn with_list_delay(mut self, delay: Duration) -> Self {
            self.list_delay = delay;
            self
        }

        fn check(&self, key: &str) -> Result<(), StoreError> {
            if self.transient_keys.iter().any(|k| k == key) {
                return Err(StoreError::Transient {
                    key: key.to_string(),
                    message: "connection reset by peer".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ObjectSource for FlakySource {
        async fn list_all(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
            tokio::time::sleep(self.list_delay).await;
            if self.fail_listing {
                return Err(StoreError::ListingIncomplete {
                    prefix: prefix.to_string(),
                    message: "request timed out".to_string(),
                });
            }
            self.inner.list_all(prefix).await
        }

        async fn head_object(&self, key: &str) -> Result<ObjectHead, StoreError> {
            self.check(key)?;
            self.inner.head_object(key).await
        }

        async fn get_object(
            &self,
            key: &str,
            range: Option<ByteRange>,
        ) -> Result<ObjectBody, StoreError> {
            self.check(key)?;
            self.inner.get_object(key, range).await
        }

        async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
            self.check(key)?;
            self.inner.signed_url(key, expires_in).await
        }
    }

    async fn collect(body: ObjectBody) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = body.stream;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn lists_every_object_under_prefix() {
        let store = memory_store(&[
            ("albums/Boston/Foreplay.mp3", vec![0; 10]),
            ("albums/Yes - Fragile/01.mp3", vec![0; 20]),
            ("other/readme.txt", vec![0; 5]),
        ])
        .await;
        let mut listed = store.list_all("albums").await.unwrap();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        let keys: Vec<&str> = listed.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["albums/Boston/Foreplay.mp3", "albums/Yes - Fragile/01.mp3"]);
        assert_eq!(listed[1].size, 20);
    }

    #[tokio::test]
    async fn root_prefix_is_hidden_from_keys() {
        let store = Arc::new(InMemory::new());
        store
            .put(
                &ObjectPath::from("music/albums/Boston/Foreplay.mp3"),
                PutPayload::from(Bytes::from_static(b"abc")),
            )
            .await
            .unwrap();
        let store = BucketStore::new(store, None).with_root("/music/");
        let listed = store.list_all("albums").await.unwrap();
        assert_eq!(listed[0].key, "albums/Boston/Foreplay.mp3");
        let head = store.head_object("albums/Boston/Foreplay.mp3").await.unwrap();
        assert_eq!(head.size, 3);
        assert_eq!(head.content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn ranged_get_returns_only_the_span() {
        let data: Vec<u8> = (0..=255).collect();
        let store = memory_store(&[("albums/Boston/Foreplay.mp3", data)]).await;
        let body = store
            .get_object("albums/Boston/Foreplay.mp3", Some(ByteRange { start: 10, end: 19 }))
            .await
            .unwrap();
        assert_eq!(body.size, 256);
        assert_eq!(collect(body).await, (10..20).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn missing_objects_map_to_not_found() {
        let store = memory_store(&[]).await;
        let err = store.head_object("albums/nope/x.mp3").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.get_object("albums/nope/x.mp3", None).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn signing_requires_a_signer() {
        let store = memory_store(&[]).await;
        let err = store
            .signed_url("albums/Boston/Foreplay.mp3", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
