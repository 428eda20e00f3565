//! The event pipeline: decrypt, validate, dedup, reassemble, dispatch,
//! transform, chunk, and publish — the hard part of the relay-backed HTTP
//! bridge, with relay transport, HTTP dispatch, and route matching injected
//! by the caller as trait objects.

pub mod chunker;
pub mod dedup;
pub mod error;
pub mod http_client;
pub mod pipeline;
pub mod publisher;
pub mod reassembly;
pub mod route_gate;
pub mod transformer;

pub use error::PipelineError;
pub use http_client::{HttpClient, HttpRequestSpec, HttpResponse};
pub use pipeline::{Pipeline, PipelineConfig};
pub use publisher::{Publisher, RelayPool};
pub use route_gate::RouteGate;
pub use transformer::{ResponseTransformer, TransformerInput, TransformerOutput};
