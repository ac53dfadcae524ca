use super::LineTrimmer;
use super::MarkerTrim;
use super::Operation;
use super::OperationProvider;
use super::indexed_tokens;
use crate::ProcessorState;
use crate::StencilResult;
use crate::StreamState;
use crate::Trie;
use crate::evaluate_condition;

const IF: usize = 0;
const ELSE_IF: usize = 1;
const ELSE: usize = 2;
const END_IF: usize = 3;

/// Marker tokens for a [`Conditional`] rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalMarkers {
	pub if_token: String,
	pub else_if_token: String,
	pub else_token: String,
	pub end_if_token: String,
}

impl Default for ConditionalMarkers {
	fn default() -> Self {
		Self {
			if_token: "#if".into(),
			else_if_token: "#elseif".into(),
			else_token: "#else".into(),
			end_if_token: "#endif".into(),
		}
	}
}

/// Keep the first branch of an `if / elseif / else / endif` chain whose
/// condition holds and drop the others along with every marker.
///
/// The condition is the rest of the marker's line and is evaluated with
/// [`evaluate_condition`]. Chains nest.
#[derive(Debug, Clone)]
pub struct Conditional {
	tokens: Trie,
	markers: [Vec<u8>; 4],
	style: MarkerTrim,
	trimmer: LineTrimmer,
	id: Option<String>,
}

impl Conditional {
	pub fn new(markers: &ConditionalMarkers, style: MarkerTrim) -> Self {
		let markers = [
			markers.if_token.as_bytes().to_vec(),
			markers.else_if_token.as_bytes().to_vec(),
			markers.else_token.as_bytes().to_vec(),
			markers.end_if_token.as_bytes().to_vec(),
		];

		Self {
			tokens: indexed_tokens(&[
				markers[IF].as_slice(),
				markers[ELSE_IF].as_slice(),
				markers[ELSE].as_slice(),
				markers[END_IF].as_slice(),
			]),
			markers,
			style,
			trimmer: LineTrimmer::default(),
			id: None,
		}
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}
}

impl OperationProvider for Conditional {
	fn kind(&self) -> &'static str {
		"conditional"
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(ConditionalRun {
			conditional: self,
			depth: 0,
		})
	}
}

struct ConditionalRun<'p> {
	conditional: &'p Conditional,
	/// Chains whose taken branch is currently being emitted.
	depth: usize,
}

impl ConditionalRun<'_> {
	/// Read the rest of the marker line and evaluate it. The line ending is
	/// left in place for the trimmer.
	fn read_condition(&self, state: &mut ProcessorState<'_>) -> StencilResult<bool> {
		let (raw, _) = state.read_until(self.conditional.trimmer.line_end(), false)?;
		let expression = String::from_utf8_lossy(&raw);
		let result = evaluate_condition(&expression, state.variables())?;
		tracing::debug!(expression = %expression.trim(), result, "evaluated condition");
		Ok(result)
	}

	/// Skip input up to and including the next marker of this chain, passing
	/// over nested chains. Returns `None` when the stream ends first.
	fn skip_branch(&self, state: &mut ProcessorState<'_>) -> StencilResult<Option<usize>> {
		let mut nested = 0usize;

		loop {
			match state.seek_forward_until(&self.conditional.tokens, true)? {
				None => return Ok(None),
				Some(IF) => nested += 1,
				Some(END_IF) if nested > 0 => nested -= 1,
				Some(token) if nested == 0 => return Ok(Some(token)),
				Some(_) => {}
			}
		}
	}

	/// Skip branches until one is taken or the chain ends.
	fn find_taken_branch(&mut self, state: &mut ProcessorState<'_>) -> StencilResult<()> {
		let conditional = self.conditional;
		let trimmer = &conditional.trimmer;
		let style = conditional.style;

		loop {
			match self.skip_branch(state)? {
				Some(ELSE_IF) => {
					let taken = self.read_condition(state)?;
					trimmer.after(state, style)?;
					if taken {
						self.depth += 1;
						return Ok(());
					}
				}
				Some(ELSE) => {
					trimmer.after(state, style)?;
					self.depth += 1;
					return Ok(());
				}
				Some(_) => {
					trimmer.after(state, style)?;
					return Ok(());
				}
				None => return Ok(()),
			}
		}
	}

	/// The taken branch ended at an `elseif` or `else`: drop the rest of the
	/// chain.
	fn skip_to_end(&mut self, state: &mut ProcessorState<'_>) -> StencilResult<()> {
		loop {
			match self.skip_branch(state)? {
				Some(END_IF) => {
					self.conditional.trimmer.after(state, self.conditional.style)?;
					break;
				}
				Some(_) => {}
				None => break,
			}
		}

		self.depth -= 1;
		Ok(())
	}
}

impl Operation for ConditionalRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, token: usize) -> StencilResult<bool> {
		let conditional = self.conditional;
		let trimmer = &conditional.trimmer;
		let style = conditional.style;

		if token == IF {
			trimmer.before(state, style)?;
			let taken = self.read_condition(state)?;
			trimmer.after(state, style)?;

			if taken {
				self.depth += 1;
			} else {
				self.find_taken_branch(state)?;
			}

			return Ok(true);
		}

		if self.depth == 0 {
			state.write(&conditional.markers[token])?;
			return Ok(false);
		}

		trimmer.before(state, style)?;

		if token == END_IF {
			trimmer.after(state, style)?;
			self.depth -= 1;
		} else {
			self.skip_to_end(state)?;
		}

		Ok(true)
	}
}
