//! E-Klaim Wire Protocol
//!
//! This crate implements the transport half of the claims gateway: everything
//! needed to put a JSON payload on the wire to the national clearing service
//! and get a classified answer back.
//!
//! # Pipeline
//!
//! ```text
//! RequestEnvelope -> JSON -> RateLimiter -> codec::encrypt -> Transport (retry/backoff)
//!                                                                 |
//! ResponseEnvelope <- metadata classification <- codec::decrypt <-+
//! ```
//!
//! Wire format of every body:
//! `Base64( HMAC-SHA256(ciphertext, key)[0..10] || IV[16] || AES-256-CBC-PKCS7(payload) )`

pub mod error;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod rate_limiter;
pub mod retry;
pub mod transport;
pub mod client;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::EklaimError;
pub use codec::SecretKey;
pub use config::{EklaimConfig, EklaimConfigRecord};
pub use envelope::{EklaimAction, RequestEnvelope, ResponseEnvelope, ResponseMetadata};
pub use rate_limiter::RateLimiterRegistry;
pub use retry::RetryPolicy;
pub use transport::{HttpConfig, ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use client::{Exchange, ExchangeTrace, ResilientClient};
