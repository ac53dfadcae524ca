//! Transformation rules that plug into the shared scan.
//!
//! A rule is split in two: an [`OperationProvider`] is built once from
//! configuration and owns the trigger tokens, while an [`Operation`] is
//! created per run and may keep state between matches (open regions, the
//! conditional stack).

use crate::ProcessorState;
use crate::StencilResult;
use crate::StreamState;
use crate::Trie;

pub use conditional::*;
pub use expand_variables::*;
pub use include::*;
pub use region::*;
pub use replacement::*;
pub use set_flag::*;

mod conditional;
mod expand_variables;
mod include;
mod region;
mod replacement;
mod set_flag;

/// A configured rule: the tokens it reacts to and a factory for its per-run
/// handler.
pub trait OperationProvider {
	/// Short rule kind used in logs and listings, e.g. `"replacement"`.
	fn kind(&self) -> &'static str;

	/// Optional flag name. While that flag is `false` matches of this rule are
	/// copied through unchanged.
	fn id(&self) -> Option<&str> {
		None
	}

	/// Trigger tokens. Terminal ids are the token indexes passed to
	/// [`Operation::handle_match`].
	fn tokens(&self) -> &Trie;

	/// A flag this rule seeds at the start of each run.
	fn flag_default(&self) -> Option<(&str, bool)> {
		None
	}

	fn create_operation(&self) -> Box<dyn Operation + '_>;
}

/// Per-run handler for one rule.
pub trait Operation {
	/// Called with the state positioned just past the matched token. The
	/// handler may emit bytes, consume more input through the seek
	/// primitives, or trim pass-through output that precedes the token.
	/// Returns whether the output now differs from a plain copy.
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, token: usize) -> StencilResult<bool>;
}

/// How much surrounding text goes away together with a marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerTrim {
	/// Drop spaces and tabs on either side of the marker.
	pub trim: bool,
	/// Drop the rest of the marker's line, including text before the marker
	/// and the line ending.
	pub whole_line: bool,
}

/// Tries used to trim around markers.
#[derive(Debug, Clone)]
pub(crate) struct LineTrimmer {
	whitespace: Trie,
	line_end: Trie,
}

impl Default for LineTrimmer {
	fn default() -> Self {
		Self {
			whitespace: Trie::from_tokens([" ", "\t"]),
			line_end: Trie::from_tokens(["\r\n", "\n", "\r"]),
		}
	}
}

impl LineTrimmer {
	pub(crate) fn line_end(&self) -> &Trie {
		&self.line_end
	}

	/// Trim output that precedes a marker.
	pub(crate) fn before(&self, state: &mut ProcessorState<'_>, style: MarkerTrim) -> StencilResult<()> {
		if style.whole_line {
			state.seek_back_until(&self.line_end, false)
		} else if style.trim {
			state.seek_back_while(&self.whitespace)
		} else {
			Ok(())
		}
	}

	/// Skip input that follows a marker.
	pub(crate) fn after(&self, state: &mut ProcessorState<'_>, style: MarkerTrim) -> StencilResult<()> {
		if style.whole_line {
			state.seek_forward_through(&self.line_end)?;
			Ok(())
		} else if style.trim {
			state.seek_forward_while(&self.whitespace)
		} else {
			Ok(())
		}
	}
}

/// Build a trie whose terminal ids are the positions in `tokens`. Empty
/// tokens are left out without shifting the ids of later ones.
pub(crate) fn indexed_tokens(tokens: &[&[u8]]) -> Trie {
	let mut trie = Trie::new();
	for (index, token) in tokens.iter().enumerate() {
		if !token.is_empty() {
			trie.insert_with_id(token, index, ());
		}
	}
	trie
}
