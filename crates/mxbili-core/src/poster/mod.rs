//! Cover image lookup.
//!
//! Turns a video identifier into the CDN URL of its poster by asking the
//! platform's public view API. Nothing is cached; every call is a fresh lookup.

mod api;
mod id;
mod resolve;

pub use api::{ViewData, ViewEnvelope};
pub use id::VideoId;
pub use resolve::{PosterDescriptor, PosterResolver, ResolveError};
