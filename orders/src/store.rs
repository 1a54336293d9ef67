use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::Order;

#[derive(Error, Debug)]
pub enum OrderBoardError {
    #[error("order board io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("order board file is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk schema. Versioned so a future migration can branch on it.
#[derive(Serialize, Deserialize)]
struct OrderBoardFile {
    version: u32,
    orders: Vec<Order>,
}

const FILE_VERSION: u32 = 1;

#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Order>, OrderBoardError>;
    async fn persist(&self, orders: &[Order]) -> Result<(), OrderBoardError>;
}

/// Production store: one JSON file, rewritten in full through a sibling temp
/// file + rename so readers never observe a torn write.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: std::io::Error) -> OrderBoardError {
        OrderBoardError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl OrderStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Order>, OrderBoardError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let file: OrderBoardFile = serde_json::from_str(&raw)?;
                debug!(path = %self.path.display(), orders = file.orders.len(), "order board loaded");
                Ok(file.orders)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    async fn persist(&self, orders: &[Order]) -> Result<(), OrderBoardError> {
        let file = OrderBoardFile {
            version: FILE_VERSION,
            orders: orders.to_vec(),
        };
        let body = serde_json::to_vec_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| self.io_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))
    }
}

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    orders: parking_lot::Mutex<Vec<Order>>,
}

#[async_trait::async_trait]
impl OrderStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Order>, OrderBoardError> {
        Ok(self.orders.lock().clone())
    }

    async fn persist(&self, orders: &[Order]) -> Result<(), OrderBoardError> {
        *self.orders.lock() = orders.to_vec();
        Ok(())
    }
}
