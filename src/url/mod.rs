//! URL handling module for Sumi-Swell
//!
//! This module provides URL normalization, reference resolution, origin
//! checks, page-document detection, and the mapping between site files and
//! the URLs they are served under.

mod local;
mod matcher;
mod normalize;
mod origin;

pub use local::{local_path_for, url_for_local_path};
pub use matcher::{is_page_document, longest_prefix};
pub use normalize::{normalize_url, resolve_reference};
pub use origin::same_origin;
