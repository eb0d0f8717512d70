use crate::annotation::AnnotationError;
use crate::config::ConfigError;
use crate::datasource::DataSourceError;
use crate::orchestration::{EngineError, ReplayError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Bar data error: {0}")]
    DataSource(#[from] DataSourceError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Annotation error: {0}")]
    Annotation(#[from] AnnotationError),
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::DataSource(e) => AppError::DataSource(e),
            ReplayError::Engine(e) => AppError::Engine(e),
        }
    }
}
