use crate::adapters::storage::LocalStorage;
use crate::config::toml_config::TableSourceConfig;
use crate::domain::ports::{Storage, TableSource};
use crate::utils::error::{ProtocolError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;

/// A table held in memory, e.g. the built-in protocol or a test fixture.
#[derive(Debug, Clone)]
pub struct InlineTableSource {
    data: String,
}

impl InlineTableSource {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl TableSource for InlineTableSource {
    async fn read_table(&self) -> Result<String> {
        Ok(self.data.clone())
    }

    fn describe(&self) -> String {
        format!("inline table ({} lines)", self.data.lines().count())
    }
}

/// A table file read through a [`Storage`] backend.
#[derive(Debug, Clone)]
pub struct StorageTableSource<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> StorageTableSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

#[async_trait]
impl<S: Storage> TableSource for StorageTableSource<S> {
    async fn read_table(&self) -> Result<String> {
        tracing::debug!("Reading table file {}", self.path);
        let bytes = self.storage.read_file(&self.path).await?;
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8: {}", self.path, e),
            ))
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path)
    }
}

/// A table served over HTTP(S), fetched with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpTableSource {
    client: Client,
    url: String,
}

impl HttpTableSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TableSource for HttpTableSource {
    async fn read_table(&self) -> Result<String> {
        tracing::debug!("Requesting table from {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        tracing::debug!("Table response status: {}", response.status());

        let body = response.error_for_status()?.text().await?;
        Ok(body)
    }

    fn describe(&self) -> String {
        format!("url {}", self.url)
    }
}

/// Builds the source described by configuration. Relative file paths are
/// resolved against `base_dir`, normally the directory of the config file.
pub fn build_table_source(config: &TableSourceConfig, base_dir: &Path) -> Box<dyn TableSource> {
    match config {
        TableSourceConfig::Inline { data } => Box::new(InlineTableSource::new(data.clone())),
        TableSourceConfig::File { path } => {
            let storage = LocalStorage::new(base_dir.to_string_lossy().into_owned());
            Box::new(StorageTableSource::new(storage, path.clone()))
        }
        TableSourceConfig::Http { url } => Box::new(HttpTableSource::new(url.clone())),
    }
}
