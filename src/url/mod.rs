//! URL handling module
//!
//! This module provides URL normalization, host extraction and the same-site
//! comparison used to keep a crawl on its seed's domain.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, origin, same_site, site_key};
pub use normalize::normalize_url;
