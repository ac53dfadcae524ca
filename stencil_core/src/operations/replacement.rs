use super::Operation;
use super::OperationProvider;
use crate::ProcessorState;
use crate::StencilResult;
use crate::Trie;

/// Replace every occurrence of a token with fixed bytes.
#[derive(Debug, Clone)]
pub struct Replacement {
	tokens: Trie,
	replacement: Vec<u8>,
	changes_output: bool,
	id: Option<String>,
}

impl Replacement {
	pub fn new(token: impl AsRef<[u8]>, replacement: impl Into<Vec<u8>>) -> Self {
		let token = token.as_ref();
		let replacement = replacement.into();

		Self {
			changes_output: token != replacement.as_slice(),
			tokens: Trie::from_tokens([token]),
			replacement,
			id: None,
		}
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}
}

impl OperationProvider for Replacement {
	fn kind(&self) -> &'static str {
		"replacement"
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(ReplacementRun(self))
	}
}

struct ReplacementRun<'p>(&'p Replacement);

impl Operation for ReplacementRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, _token: usize) -> StencilResult<bool> {
		state.write(&self.0.replacement)?;
		Ok(self.0.changes_output)
	}
}
