use std::io;
use std::io::Cursor;
use std::io::ErrorKind;
use std::io::Read;

use crate::Conditional;
use crate::ConditionalMarkers;
use crate::EngineConfig;
use crate::MarkerTrim;
use crate::OperationProvider;
use crate::Parameters;
use crate::Processor;
use crate::Replacement;
use crate::StencilResult;
use crate::StreamState;
use crate::VariableCollection;

pub fn replacement_rules(pairs: &[(&str, &str)]) -> Vec<Box<dyn OperationProvider>> {
	pairs
		.iter()
		.map(|(token, value)| Box::new(Replacement::new(token, *value)) as Box<dyn OperationProvider>)
		.collect()
}

/// `#if / #elseif / #else / #endif` with whole line removal.
pub fn conditional_rules() -> Vec<Box<dyn OperationProvider>> {
	let style = MarkerTrim {
		trim: false,
		whole_line: true,
	};
	vec![Box::new(Conditional::new(&ConditionalMarkers::default(), style))]
}

pub fn variables(pairs: &[(&str, &str)]) -> VariableCollection {
	let parameters: Parameters = pairs.iter().copied().collect();
	VariableCollection::from_parameters(&parameters, "{0}")
}

/// Serves `header.txt` from memory and fails for anything else.
pub fn resolve_fixture(path: &str) -> io::Result<Box<dyn Read>> {
	match path {
		"header.txt" => Ok(Box::new(Cursor::new(b"HEADER".to_vec()))),
		other => Err(io::Error::new(ErrorKind::NotFound, format!("no fixture named {other}"))),
	}
}

/// Run `providers` over `input` and return the output and the changed flag.
pub fn run_rules(
	providers: Vec<Box<dyn OperationProvider>>,
	input: &str,
	chunk_size: usize,
) -> StencilResult<(String, bool)> {
	run_rules_with_variables(providers, VariableCollection::root(), input, chunk_size)
}

pub fn run_rules_with_variables(
	providers: Vec<Box<dyn OperationProvider>>,
	variables: VariableCollection,
	input: &str,
	chunk_size: usize,
) -> StencilResult<(String, bool)> {
	let config = EngineConfig {
		variables,
		..EngineConfig::default()
	};
	let processor = Processor::new(config, providers);
	run_processor(&processor, input, chunk_size)
}

pub fn run_processor(processor: &Processor, input: &str, chunk_size: usize) -> StencilResult<(String, bool)> {
	let mut output = Vec::new();
	let changed = processor.run_with_chunk_size(&mut input.as_bytes(), &mut output, chunk_size)?;
	Ok((String::from_utf8_lossy(&output).into_owned(), changed))
}

/// A chunk size at least as large as any test input.
pub const WHOLE: usize = 4096;

/// One recorded call to [`StreamState::advance_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceCall {
	pub discard: usize,
	/// Sequence number of the first byte in the buffer before the call.
	pub origin: usize,
	pub buffer_length: usize,
}

/// A minimal [`StreamState`] that serves a fixed input in chunks, discards
/// exactly what it is asked to and records every refill.
///
/// It provides no seek primitives.
pub struct RecordingState {
	input: Vec<u8>,
	chunk_size: usize,
	loaded: usize,
	buffer: Vec<u8>,
	position: usize,
	pub origin: usize,
	pub calls: Vec<AdvanceCall>,
}

impl RecordingState {
	pub fn new(input: &str, chunk_size: usize) -> Self {
		let input = input.as_bytes().to_vec();
		let loaded = chunk_size.min(input.len());

		Self {
			buffer: input[..loaded].to_vec(),
			input,
			chunk_size,
			loaded,
			position: 0,
			origin: 0,
			calls: Vec::new(),
		}
	}

	/// Sequence number of the byte at the current position.
	pub fn sequence_number(&self) -> usize {
		self.origin + self.position
	}
}

impl StreamState for RecordingState {
	fn current_buffer(&self) -> &[u8] {
		&self.buffer
	}

	fn current_buffer_position(&self) -> usize {
		self.position
	}

	fn set_current_buffer_position(&mut self, position: usize) {
		self.position = position;
	}

	fn is_final_buffer(&self) -> bool {
		self.loaded >= self.input.len()
	}

	fn advance_buffer(&mut self, discard: usize) -> StencilResult<bool> {
		self.calls.push(AdvanceCall {
			discard,
			origin: self.origin,
			buffer_length: self.buffer.len(),
		});

		self.buffer.drain(..discard);
		self.position -= discard;
		self.origin += discard;

		let next = (self.loaded + self.chunk_size).min(self.input.len());
		self.buffer.extend_from_slice(&self.input[self.loaded..next]);
		let loaded_any = next > self.loaded;
		self.loaded = next;

		Ok(loaded_any)
	}
}
