//! # Core Module
//!
//! The in-memory atomic structure model and the services it relies on.
//!
//! ## Architecture
//!
//! - **Structure Model** ([`models`]) - Atoms, bonds, residues, coordinate sets, chains and
//!   pseudobonds owned by an [`AtomicStructure`](models::structure::AtomicStructure)
//! - **Change Tracking** ([`tracking`]) - Created/modified/deleted records keyed by reason codes
//! - **Residue Templates** ([`topology`]) - Template files and the cache behind atom-type
//!   assignment
//! - **Sessions** ([`session`]) - Versioned integer/float buffers for saving and restoring state
//! - **Configuration** ([`config`]) - Where template files are found
//! - **Errors** ([`error`]) - The error type returned by structure operations
//! - **Name Tables** ([`utils`]) - Backbone atom names, water names and one-letter codes
//!
//! ## Threading
//!
//! The shared change tracker, template cache and inter-model pseudobond manager are per-thread
//! singletons held in `Rc<RefCell<_>>`. Structures are therefore bound to the thread that
//! created them. Each singleton can be swapped out with its `install` function, which is how
//! tests get fresh instances.

pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod topology;
pub mod tracking;
pub mod utils;
