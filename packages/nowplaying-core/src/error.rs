//! Centralized error types for the now-playing core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Gives every error a machine-readable code for logs
//! - Converts area-specific errors into the crate-wide [`NowPlayingError`]
//!
//! Most of these errors never reach a caller: the decoder, art cache and
//! reconciler log them at their policy boundary and carry on.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

/// Failure to parse a single metadata-pipe item block.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The block is not well-formed XML.
    #[error("malformed item XML: {0}")]
    Xml(String),

    /// The block has no `<code>` element.
    #[error("item has no code")]
    MissingCode,

    /// The code is not valid hex.
    #[error("invalid hex code {0:?}")]
    InvalidCode(String),

    /// The `<data>` element declared base64 but did not decode.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

impl ErrorCode for PipeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Xml(_) => "pipe_malformed_xml",
            Self::MissingCode => "pipe_missing_code",
            Self::InvalidCode(_) => "pipe_invalid_code",
            Self::InvalidBase64(_) => "pipe_invalid_base64",
        }
    }
}

/// Failure to interpret a renderer state variable.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The DIDL-Lite document is not well-formed XML.
    #[error("malformed DIDL-Lite: {0}")]
    Didl(String),
}

impl ErrorCode for RendererError {
    fn code(&self) -> &'static str {
        match self {
            Self::Didl(_) => "renderer_malformed_didl",
        }
    }
}

/// Failure while producing a cover-art thumbnail.
#[derive(Debug, Error)]
pub enum ArtError {
    /// The locator is neither a file path nor an http(s) URL.
    #[error("unsupported art locator: {0}")]
    UnsupportedLocator(String),

    /// Remote fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Local read or cache write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not a decodable image, or re-encoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// The blocking transcode worker panicked or was cancelled.
    #[error("transcode worker failed: {0}")]
    Worker(String),
}

impl ErrorCode for ArtError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedLocator(_) => "art_unsupported_locator",
            Self::Fetch(_) => "art_fetch_failed",
            Self::Io(_) => "art_io_error",
            Self::Image(_) => "art_image_error",
            Self::Worker(_) => "art_worker_failed",
        }
    }
}

/// A candidate session record broke one of its invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A stopped record still carries track fields.
    #[error("stopped record carries track field `{0}`")]
    StoppedWithTrackField(&'static str),

    /// Transport state string outside the known vocabulary.
    #[error("unknown transport state {0:?}")]
    UnknownTransportState(String),
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::StoppedWithTrackField(_) => "session_invariant_violation",
            Self::UnknownTransportState(_) => "session_unknown_transport_state",
        }
    }
}

/// Invalid core configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        "configuration_error"
    }
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum NowPlayingError {
    /// Metadata pipe parse failure.
    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    /// Renderer event failure.
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),

    /// Cover-art failure.
    #[error("Artwork error: {0}")]
    Art(#[from] ArtError),

    /// Session invariant failure.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Socket or file error outside the art cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for NowPlayingError {
    fn code(&self) -> &'static str {
        match self {
            Self::Pipe(e) => e.code(),
            Self::Renderer(e) => e.code(),
            Self::Art(e) => e.code(),
            Self::Session(e) => e.code(),
            Self::Configuration(e) => e.code(),
            Self::Io(_) => "io_error",
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type NowPlayingResult<T> = Result<T, NowPlayingError>;

/// Result alias for art cache operations.
pub type ArtResult<T> = Result<T, ArtError>;

/// Result alias for pipe item parsing.
pub type PipeResult<T> = Result<T, PipeError>;
