//! Converter interface

use async_trait::async_trait;
use std::path::Path;

use crate::{ConversionSummary, ExecutionFailure};

/// Applies a statement file to a database target.
///
/// Targets and inputs are configured first; `convert` then performs one run.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Execute every statement of the input against the target in one transaction
    async fn convert(&self) -> Result<ConversionSummary, ExecutionFailure>;

    /// Set the connection URL of the target database
    fn set_url(&mut self, url: &str);

    /// Set the statement file to read
    fn set_input(&mut self, input: &Path);
}
