//! Vantage Domain Core
//!
//! This crate contains the pure orchestration logic for the Vantage OSINT
//! platform: the data model (Query, WorkerId, CorpusId, Framework, Evidence,
//! RunRecord, RunEvent), the Context Fusion ranking algorithm, the Context
//! Orchestrator theme classifier, and the Router intent classifier.
//!
//! This crate MUST NOT import HTTP frameworks, filesystem APIs beyond what
//! `std` already provides for pure computation, or any generation-model SDK.
//! Everything here is a deterministic function of its inputs.

pub mod corpus;
pub mod errors;
pub mod evidence;
pub mod orchestrator;
pub mod query;
pub mod router;
pub mod run;
pub mod worker;

pub use corpus::*;
pub use errors::*;
pub use evidence::*;
pub use orchestrator::*;
pub use query::*;
pub use router::*;
pub use run::*;
pub use worker::*;
