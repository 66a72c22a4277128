use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Hardware providers worth trying on this platform; CPU is always the fallback.
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Opens a detector model with a single inference thread.
///
/// Detection runs on one dedicated worker, so extra intra-op threads would
/// only compete with the camera and UI threads.
pub fn open_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .with_execution_providers(platform_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}
