//! Image optimization pipeline.
//!
//! Components are constructed once at startup with their configuration and
//! shared through `Arc`:
//!
//! - [`codec`]: decode/resize/encode capability trait and its two backends.
//! - [`storage`]: byte storage for originals and derived assets.
//! - [`conversion`]: resize rules plus encoding of converted assets.
//! - [`variants`]: the breakpoint x format variant matrix.
//! - [`signature`]: visual-signature extraction off the async runtime.
//! - [`ledger`]: quota authorization and usage recording.
//! - [`orchestrator`]: batch submission and the per-image state machine.

pub mod codec;
pub mod conversion;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod signature;
pub mod storage;
pub mod variants;

pub use codec::{select_backend, BackendPreference, CodecBackend};
pub use conversion::ConversionEngine;
pub use error::PipelineError;
pub use ledger::{AccountSeed, QuotaLedger};
pub use orchestrator::{BatchOrchestrator, BatchSubmission, SourceFile};
pub use storage::{LocalStorage, MemoryStorage, StorageProvider};
