use super::LineTrimmer;
use super::MarkerTrim;
use super::Operation;
use super::OperationProvider;
use super::indexed_tokens;
use crate::ProcessorState;
use crate::StencilResult;
use crate::StreamState;
use crate::Trie;

const START: usize = 0;
const END: usize = 1;

/// A span delimited by start and end markers.
///
/// Without `include` the markers and everything between them are removed.
/// With `include` only the markers are removed and the content is kept.
#[derive(Debug, Clone)]
pub struct Region {
	tokens: Trie,
	end: Vec<u8>,
	include: bool,
	style: MarkerTrim,
	trimmer: LineTrimmer,
	id: Option<String>,
}

impl Region {
	pub fn new(start: impl AsRef<[u8]>, end: impl AsRef<[u8]>, include: bool, style: MarkerTrim) -> Self {
		let end = end.as_ref().to_vec();

		Self {
			tokens: indexed_tokens(&[start.as_ref(), end.as_slice()]),
			end,
			include,
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

impl OperationProvider for Region {
	fn kind(&self) -> &'static str {
		"region"
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(RegionRun {
			region: self,
			open: 0,
		})
	}
}

struct RegionRun<'p> {
	region: &'p Region,
	/// Regions opened in include mode and not yet closed.
	open: usize,
}

impl RegionRun<'_> {
	/// Skip to the end marker that closes the current region, honouring
	/// nested regions with the same markers.
	fn skip_region(&self, state: &mut ProcessorState<'_>) -> StencilResult<()> {
		let mut depth = 1;

		while depth > 0 {
			match state.seek_forward_until(&self.region.tokens, true)? {
				Some(START) => depth += 1,
				Some(END) => depth -= 1,
				_ => break,
			}
		}

		Ok(())
	}
}

impl Operation for RegionRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, token: usize) -> StencilResult<bool> {
		let trimmer = &self.region.trimmer;
		let style = self.region.style;

		match token {
			START if self.region.include => {
				trimmer.before(state, style)?;
				trimmer.after(state, style)?;
				self.open += 1;
			}
			START => {
				trimmer.before(state, style)?;
				self.skip_region(state)?;
				trimmer.after(state, style)?;
			}
			END if self.open > 0 => {
				trimmer.before(state, style)?;
				trimmer.after(state, style)?;
				self.open -= 1;
			}
			_ => {
				state.write(&self.region.end)?;
				return Ok(false);
			}
		}

		Ok(true)
	}
}
