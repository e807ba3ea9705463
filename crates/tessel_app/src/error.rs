//! Error types for tessel_app

use thiserror::Error;

/// Errors raised by the frame pipeline
#[derive(Error, Debug)]
pub enum AppError {
    /// The render thread could not be started
    #[error("Failed to spawn the render thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The render thread exited while frames were still being submitted
    #[error("Render thread stopped")]
    RenderThreadStopped,

    /// The render thread panicked
    #[error("Render thread panicked")]
    RenderThreadPanicked,
}

/// Result type for tessel_app operations
pub type Result<T> = std::result::Result<T, AppError>;
