//! Error types shared by the sampler, compositor and platform host.
//!
//! None of these are fatal: the tick handler logs them and carries on with
//! whatever it could produce this frame.

use thiserror::Error;

/// Failure reading a single metric source.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),

    #[error("GPU query failed: {0}")]
    Gpu(String),

    #[error("network interface '{0}' disappeared")]
    InterfaceGone(String),
}

/// Failure producing or presenting a frame.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("cannot allocate a {width}x{height} surface")]
    SurfaceAllocation { width: u32, height: u32 },

    #[error("failed to present overlay surface: {0}")]
    Present(String),
}
