use std::collections::BTreeMap;
use std::io::Read;
use std::io::Write;

use crate::DEFAULT_CHUNK_SIZE;
use crate::DEFAULT_LOOKBEHIND;
use crate::OperationProvider;
use crate::ProcessorState;
use crate::StencilResult;
use crate::StreamState;
use crate::Trie;
use crate::TrieEvaluationDriver;
use crate::VariableCollection;

/// Settings shared by every run of a [`Processor`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Bytes read from the source per refill.
	pub chunk_size: usize,
	/// Unwritten pass-through bytes kept across refills for trimming.
	pub lookbehind: usize,
	pub variables: VariableCollection,
	/// Initial flag values, applied before the defaults of flag rules.
	pub flags: BTreeMap<String, bool>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			chunk_size: DEFAULT_CHUNK_SIZE,
			lookbehind: DEFAULT_LOOKBEHIND,
			variables: VariableCollection::root(),
			flags: BTreeMap::new(),
		}
	}
}

/// Payload of the merged trie: which rule a token belongs to and its index
/// within that rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTerminal {
	pub operation: usize,
	pub token: usize,
}

/// Runs a set of rules over a stream in a single pass.
///
/// The trigger tokens of all rules are merged into one trie so every input
/// byte is examined once, whatever the number of rules.
pub struct Processor {
	config: EngineConfig,
	providers: Vec<Box<dyn OperationProvider>>,
	trie: Trie<OperationTerminal>,
}

impl Processor {
	pub fn new(config: EngineConfig, providers: Vec<Box<dyn OperationProvider>>) -> Self {
		let mut trie = Trie::new();

		for (operation, provider) in providers.iter().enumerate() {
			trie.merge_with(provider.tokens(), |terminal| {
				OperationTerminal {
					operation,
					token: terminal.id,
				}
			});
		}

		tracing::debug!(
			operations = providers.len(),
			tokens = trie.count(),
			"built processor"
		);

		Self {
			config,
			providers,
			trie,
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn providers(&self) -> &[Box<dyn OperationProvider>] {
		&self.providers
	}

	/// The merged trigger tokens.
	pub fn trie(&self) -> &Trie<OperationTerminal> {
		&self.trie
	}

	/// Transform `source` into `target` with the configured chunk size.
	/// Returns whether the output differs from the input.
	pub fn run(&self, source: &mut dyn Read, target: &mut dyn Write) -> StencilResult<bool> {
		self.run_with_chunk_size(source, target, self.config.chunk_size)
	}

	pub fn run_with_chunk_size(
		&self,
		source: &mut dyn Read,
		target: &mut dyn Write,
		chunk_size: usize,
	) -> StencilResult<bool> {
		let mut state = ProcessorState::new(source, target, chunk_size, &self.config.variables)?
			.with_lookbehind(self.config.lookbehind);

		for (name, value) in &self.config.flags {
			state.set_flag(name.as_str(), *value);
		}
		for provider in &self.providers {
			if let Some((name, value)) = provider.flag_default() {
				state.set_flag(name, value);
			}
		}

		let mut operations: Vec<_> = self
			.providers
			.iter()
			.map(|provider| provider.create_operation())
			.collect();
		let mut driver = TrieEvaluationDriver::new(&self.trie);
		let mut net = 0isize;
		let mut changed = false;

		while let Some(found) = driver.evaluate(&mut state, net)? {
			net = 0;
			let OperationTerminal { operation, token } = found.terminal.payload;
			let provider = &self.providers[operation];

			if let Some(id) = provider.id() {
				if state.flag(id) == Some(false) {
					tracing::trace!(
						kind = provider.kind(),
						id,
						location = found.location,
						"rule disabled, passing token through"
					);
					continue;
				}
			}

			let frontier = state.sequence_number();
			tracing::debug!(
				kind = provider.kind(),
				token,
				sequence_number = state.origin() + found.location,
				"dispatching match"
			);

			state.begin_match(found.location, found.end());
			changed |= operations[operation].handle_match(&mut state, token)?;
			state.end_match()?;

			let resume = state.sequence_number();
			net = isize::try_from(resume).unwrap_or(isize::MAX)
				- isize::try_from(frontier).unwrap_or(isize::MAX);

			if net < 0 {
				// The handler resumed inside bytes the driver already scanned.
				state.set_current_buffer_position(frontier - state.origin());
			}
		}

		state.finish()?;
		Ok(changed)
	}
}
