//! Python support for tugcheck.
//!
//! This crate provides:
//! - Module discovery: mapping files and directories to dotted module ids
//!   and pairing sources with their stubs
//! - The parsed module tree model
//! - Merging a stub tree into its source tree
//! - A loading pipeline over an external parser

mod error_bridges;
pub mod fscache;
pub mod identity;
pub mod merge;
pub mod pipeline;
pub mod sources;
pub mod tree;
pub mod validation;

pub use fscache::{FileSystem, FileSystemCache};
pub use merge::{merge_stub_into_source, MergeError, MergeOrigin, MergeSummary};
pub use pipeline::{load_modules, LoadedModule, ModuleParser, ParseFailure, PipelineError};
pub use sources::{
    create_source_list, BuildSource, FinderOptions, SourceFinder, SourceListError, StubSource,
};
pub use tree::{ModuleTree, Node, NodeId};
