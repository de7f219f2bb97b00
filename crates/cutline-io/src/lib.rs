//! cutline-io: filesystem collaborators for the cutline pipeline.
//!
//! The pipeline crate never touches the filesystem. This crate supplies
//! the file-backed pieces it consumes: the JSON configuration loader,
//! an on-disk [`MaskCache`](cutline_pipeline::MaskCache), and image file
//! reading and PNG writing.

pub mod cache;
pub mod config;
pub mod raster;

pub use cache::FsMaskCache;
pub use config::load_config;
pub use raster::{encode_png, read_image, write_png};

/// Errors from filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be parsed.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An image could not be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A parsed value was rejected by the pipeline.
    #[error(transparent)]
    Pipeline(#[from] cutline_pipeline::PipelineError),
}
