pub mod batch;
pub mod image;
pub mod usage;
pub mod variant;
