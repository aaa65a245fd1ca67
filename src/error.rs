use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

pub type RendererResult<T> = Result<T, RendererError>;

/// Fatal renderer failures. Recoverable surface conditions (out of date,
/// suboptimal) are plain outcomes in the frame loop, not errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("could not load the vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("no physical device supports graphics and presentation")]
    NoSuitableDevice,

    #[error("no memory type satisfies the requested properties")]
    NoSuitableMemoryType,

    #[error("could not load shader {path}: {message}")]
    Shader { path: PathBuf, message: String },
}
