use super::Operation;
use super::OperationProvider;
use crate::ProcessorState;
use crate::StencilResult;
use crate::Trie;
use crate::VariableCollection;
use crate::display_value;

/// Replace formatted variable references with their values.
///
/// Every key visible in the collection becomes a token by substituting it
/// for `{0}` in the format, so with `${0}$` the key `name` is referenced as
/// `$name$`.
#[derive(Debug, Clone)]
pub struct ExpandVariables {
	tokens: Trie,
	values: Vec<Vec<u8>>,
	id: Option<String>,
}

impl ExpandVariables {
	pub fn new(variables: &VariableCollection, format: &str) -> Self {
		let mut tokens = Trie::new();
		let mut values = Vec::new();

		for key in variables.keys() {
			let Some(value) = variables.get(key) else {
				continue;
			};
			let token = format.replace("{0}", key);
			if token.is_empty() {
				continue;
			}

			tokens.insert_with_id(token.as_bytes(), values.len(), ());
			values.push(display_value(value).into_bytes());
		}

		Self {
			tokens,
			values,
			id: None,
		}
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}
}

impl OperationProvider for ExpandVariables {
	fn kind(&self) -> &'static str {
		"expand_variables"
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(ExpandVariablesRun(self))
	}
}

struct ExpandVariablesRun<'p>(&'p ExpandVariables);

impl Operation for ExpandVariablesRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, token: usize) -> StencilResult<bool> {
		let Some(value) = self.0.values.get(token) else {
			return Ok(false);
		};

		state.write(value)?;
		Ok(true)
	}
}
