//! Persistence layer for [`cvs_analyzer_core`]'s output: the artifact
//! files named in the configuration (§6, "Artifact files"). The core
//! itself never touches disk; a front end calls [`sink::write_collector`]
//! once a batch's [`cvs_analyzer_core::GlobalCollector`] has finished.

mod connection;
mod error;
mod sql;

pub mod sink;

pub use error::Error;
pub use sink::{write_collector, ArtifactSink, SqliteSink};
