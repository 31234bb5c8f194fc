//! AI content transformation.
//!
//! `ContentTransformer` is the capability the workflows call; the shipped
//! implementation talks to Gemini over REST. Credential sourcing is its own
//! capability (`ApiKeySource`) so ambient-key and caller-supplied-key runs
//! share one transform path.

mod credentials;
mod gemini;
mod transformer;

pub use credentials::{AmbientKey, ApiKey, ApiKeySource, SuppliedKey};
pub use gemini::GeminiTransformer;
pub use transformer::{ContentTransformer, TransformError};
