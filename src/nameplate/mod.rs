//! Nameplate variants and the shared social-info rotator
//!
//! This module provides:
//! - The `NameplateVariant` capability trait
//! - Central registration of all supported variants
//! - The rotator task every mounted nameplate runs
//!
//! Variant-specific behaviour lives in the variant modules; fade and
//! rotation timing lives only in `rotator`.

pub mod commentator;
pub mod rotator;
pub mod runner;
pub mod variant;

use std::sync::Arc;

use variant::NameplateVariant;

pub use rotator::mount;

/// Returns a nameplate variant by name.
///
/// CONTRACT:
/// - `name` MUST match `nameplates[].variant` in config.json
/// - Returned variants are shared across every nameplate of that kind
///
pub fn get_variant(name: &str) -> Option<Arc<dyn NameplateVariant>> {
    match name {
        "runner" => Some(Arc::new(runner::RunnerNameplate)),
        "commentator" => Some(Arc::new(commentator::CommentatorNameplate)),
        _ => None,
    }
}
