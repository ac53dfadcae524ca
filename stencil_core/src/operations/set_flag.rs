use super::Operation;
use super::OperationProvider;
use super::indexed_tokens;
use crate::ProcessorState;
use crate::StencilResult;
use crate::Trie;

const ON: usize = 0;
const OFF: usize = 1;
const ON_NO_EMIT: usize = 2;
const OFF_NO_EMIT: usize = 3;

/// Marker tokens for a [`SetFlag`] rule. Empty markers are not recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagMarkers {
	/// Turns the flag on and is kept in the output.
	pub on: String,
	/// Turns the flag off and is kept in the output.
	pub off: String,
	/// Turns the flag on and is removed from the output.
	pub on_no_emit: String,
	/// Turns the flag off and is removed from the output.
	pub off_no_emit: String,
}

/// Toggle a named flag when its markers are seen. Rules carrying the same
/// name as their id are skipped while the flag is off.
#[derive(Debug, Clone)]
pub struct SetFlag {
	name: String,
	tokens: Trie,
	markers: [Vec<u8>; 4],
	default: Option<bool>,
}

impl SetFlag {
	pub fn new(name: impl Into<String>, markers: &FlagMarkers) -> Self {
		let markers = [
			markers.on.as_bytes().to_vec(),
			markers.off.as_bytes().to_vec(),
			markers.on_no_emit.as_bytes().to_vec(),
			markers.off_no_emit.as_bytes().to_vec(),
		];

		Self {
			name: name.into(),
			tokens: indexed_tokens(&[
				markers[0].as_slice(),
				markers[1].as_slice(),
				markers[2].as_slice(),
				markers[3].as_slice(),
			]),
			markers,
			default: None,
		}
	}

	#[must_use]
	pub fn with_default(mut self, value: bool) -> Self {
		self.default = Some(value);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl OperationProvider for SetFlag {
	fn kind(&self) -> &'static str {
		"flag"
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn flag_default(&self) -> Option<(&str, bool)> {
		self.default.map(|value| (self.name.as_str(), value))
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(SetFlagRun(self))
	}
}

struct SetFlagRun<'p>(&'p SetFlag);

impl Operation for SetFlagRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, token: usize) -> StencilResult<bool> {
		let flag = self.0;
		let value = matches!(token, ON | ON_NO_EMIT);
		tracing::debug!(flag = flag.name, value, "set flag");
		state.set_flag(flag.name.as_str(), value);

		match token {
			ON | OFF => {
				state.write(&flag.markers[token])?;
				Ok(false)
			}
			_ => {
				debug_assert!(matches!(token, ON_NO_EMIT | OFF_NO_EMIT));
				Ok(true)
			}
		}
	}
}
