//! Boundary to the external generative model.
//!
//! The model itself lives in a separate service. This crate defines what a
//! single repetition asks of it ([`GenerationParams`]), the capability the
//! job executor depends on ([`VariationGenerator`]), how its failures are
//! classified ([`GeneratorError`]), and an HTTP client for the service
//! ([`HttpGenerator`]).

pub mod error;
pub mod http;
pub mod params;

use async_trait::async_trait;

pub use error::GeneratorError;
pub use http::HttpGenerator;
pub use params::{GeneratedVariation, GenerationParams};

/// Produces one variation of an input track.
#[async_trait]
pub trait VariationGenerator: Send + Sync {
    async fn generate(
        &self,
        params: &GenerationParams<'_>,
    ) -> Result<GeneratedVariation, GeneratorError>;
}
