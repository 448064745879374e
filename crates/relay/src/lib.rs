//! Allure Relay
//!
//! Turns the lifecycle events of an end-to-end browser test runner into
//! Allure results:
//! - Parses loosely typed fixture and test metadata into labels, links and
//!   parameters
//! - Merges repeated steps and errors
//! - Assigns the runner's flat screenshot list to the steps that took them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  AllureReporter (façade)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  start_group(name, meta)   -> Metadata (group scope)        │
//! │  start_test(name, meta)    -> AllureTest in open group      │
//! │  end_test(name, info, meta)                                 │
//! │    ├── parse_error_text + merge_errors                      │
//! │    ├── Metadata::apply_to_test (merge with group)           │
//! │    └── merge_steps + screenshot cursor                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AllureRuntime -> ResultsWriter (filesystem | memory)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod errors;
pub mod metadata;
pub mod model;
pub mod reporter;
pub mod runner;
pub mod runtime;
pub mod step;
pub mod writer;

pub use config::ReporterConfig;
pub use error::{RelayError, RelayResult};
pub use metadata::{MetaScope, Metadata};
pub use reporter::{AllureReporter, RunSummary};
pub use runner::{ErrorFormatter, PlainErrorFormatter, TestRunInfo};
pub use step::{record_step, StepAttachment, TestStep};
pub use writer::{FileSystemWriter, MemoryWriter, ResultsWriter};

/// Relay version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
