use crate::errors::{AppError, RoutineError};
use crate::generation::{FallbackGenerator, RoutineGenerator};
use crate::models::AppData;
use crate::storage::persist_data;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    pub generator: Arc<dyn RoutineGenerator>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            generator: Arc::new(FallbackGenerator),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn RoutineGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Runs `op` against a draft of the store while holding the lock. The
    /// draft is persisted and committed only when `op` succeeds, so a failed
    /// operation leaves no partial writes behind.
    pub async fn transaction<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut AppData) -> Result<T, RoutineError>,
    {
        let mut data = self.data.lock().await;
        let mut draft = data.clone();
        let value = op(&mut draft)?;
        persist_data(&self.data_path, &draft).await?;
        *data = draft;
        Ok(value)
    }

    pub async fn read<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&AppData) -> Result<T, RoutineError>,
    {
        let data = self.data.lock().await;
        Ok(op(&data)?)
    }
}
