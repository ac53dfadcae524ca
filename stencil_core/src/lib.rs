//! `stencil_core` is a streaming text templating engine. It runs a set of
//! token driven rules (replacements, regions, conditionals, flags, includes
//! and variable expansion) over an input stream in one forward pass, with a
//! bounded buffer and output that does not depend on how the input is
//! chunked.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Read source
//!   -> ProcessorState (chunked buffer, pass-through output, seek primitives)
//!   -> TrieEvaluationDriver (maps sequence numbers onto the buffer, refills)
//!   -> TrieEvaluator (one candidate per start offset over the merged Trie)
//!   -> Processor (dispatches each match to the rule that owns the token)
//!   -> Write target
//! ```
//!
//! ## Key Types
//!
//! - [`Trie`]: byte tokens with insertion-order ids and a payload.
//! - [`TrieEvaluator`]: incremental longest-match resolution.
//! - [`TrieEvaluationDriver`]: buffer refill and position bookkeeping.
//! - [`ProcessorState`]: the buffered [`StreamState`] over a reader/writer.
//! - [`Processor`]: runs a list of [`OperationProvider`]s over a stream.
//! - [`RunSpec`]: a rule file loaded from `stencil.toml`.
//!
//! ## Quick Start
//!
//! ```rust
//! use stencil_core::EngineConfig;
//! use stencil_core::OperationProvider;
//! use stencil_core::Processor;
//! use stencil_core::Replacement;
//!
//! let providers: Vec<Box<dyn OperationProvider>> = vec![Box::new(Replacement::new("value", "foo"))];
//! let processor = Processor::new(EngineConfig::default(), providers);
//!
//! let mut output = Vec::new();
//! let changed = processor
//! 	.run(&mut "test value test".as_bytes(), &mut output)
//! 	.unwrap();
//!
//! assert!(changed);
//! assert_eq!(output, b"test foo test");
//! ```

pub use condition::*;
pub use config::*;
pub use driver::*;
pub use error::*;
pub use evaluator::*;
pub use operations::*;
pub use processor::*;
pub use state::*;
pub use trie::*;
pub use variables::*;

mod condition;
pub mod config;
mod driver;
#[allow(unused_assignments)]
mod error;
mod evaluator;
pub mod operations;
mod processor;
mod state;
mod trie;
mod variables;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
