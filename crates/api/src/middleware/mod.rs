//! Request extractors.
//!
//! - [`caller::ResolvedCaller`] -- Resolves who is calling (subscriber
//!   session, API key, or anonymous fingerprint) for quota purposes.

pub mod caller;
