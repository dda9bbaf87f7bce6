//! Create-step negotiation for chunked, content-addressed uploads to a
//! cloud drive.
//!
//! Build an [`UploadIntent`](data::UploadIntent), hand it to an
//! [`UploadNegotiator`](negotiator::UploadNegotiator) and act on the returned
//! [`UploadCreateOutcome`](data::UploadCreateOutcome): either the service
//! already has the content, or each chunk has to be sent to its target URL.

pub mod chunk;
pub mod config;
pub mod data;
pub mod error;
pub mod hash;
pub mod negotiator;
pub mod payloads;
pub mod transport;

pub use config::NegotiatorConfig;
pub use data::{CheckNameMode, FileDetails, NextStep, UploadCreateOutcome, UploadIntent};
pub use error::{NegotiationError, TransportError};
pub use negotiator::UploadNegotiator;
