//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&Database` as the first argument.

pub mod account_repo;
pub mod batch_repo;
pub mod image_repo;
pub mod usage_repo;
pub mod variant_repo;

pub use account_repo::AccountRepo;
pub use batch_repo::BatchRepo;
pub use image_repo::ImageRepo;
pub use usage_repo::UsageRepo;
pub use variant_repo::VariantRepo;
