use std::collections::HashMap;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;

use crate::StencilError;
use crate::StencilResult;
use crate::Trie;
use crate::VariableCollection;

/// Default number of bytes read from the source per refill.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Default number of unwritten pass-through bytes kept across a refill so
/// rules can still trim indentation that precedes their marker.
pub const DEFAULT_LOOKBEHIND: usize = 128;

/// What the [`crate::TrieEvaluationDriver`] and the rules need from the
/// stream they scan.
///
/// Only the buffer accessors and [`StreamState::advance_buffer`] are
/// required. The seek primitives are optional capabilities and fail with
/// [`StencilError::UnsupportedSeek`] unless an implementation provides them.
pub trait StreamState {
	/// Bytes currently loaded.
	fn current_buffer(&self) -> &[u8];

	fn current_buffer_length(&self) -> usize {
		self.current_buffer().len()
	}

	/// Index of the next unprocessed byte in [`StreamState::current_buffer`].
	fn current_buffer_position(&self) -> usize;

	fn set_current_buffer_position(&mut self, position: usize);

	/// True once the source has no more bytes to load.
	fn is_final_buffer(&self) -> bool;

	/// Drop `discard` bytes from the front of the buffer and load more input
	/// behind the retained bytes. Positions shift down by however many bytes
	/// were actually dropped. Returns whether new bytes were loaded.
	fn advance_buffer(&mut self, discard: usize) -> StencilResult<bool>;

	/// Move the output cursor back until a token of `trie` ends there. With
	/// `consume` the token itself is removed as well.
	fn seek_back_until(&mut self, _trie: &Trie, _consume: bool) -> StencilResult<()> {
		Err(StencilError::UnsupportedSeek("seek_back_until"))
	}

	/// Move the output cursor back over tokens of `trie`.
	fn seek_back_while(&mut self, _trie: &Trie) -> StencilResult<()> {
		Err(StencilError::UnsupportedSeek("seek_back_while"))
	}

	/// Skip input up to and including the next token of `trie`. Returns false
	/// when the stream ended first.
	fn seek_forward_through(&mut self, _trie: &Trie) -> StencilResult<bool> {
		Err(StencilError::UnsupportedSeek("seek_forward_through"))
	}

	/// Skip input while it starts with a token of `trie`.
	fn seek_forward_while(&mut self, _trie: &Trie) -> StencilResult<()> {
		Err(StencilError::UnsupportedSeek("seek_forward_while"))
	}

	/// Skip input until a token of `trie` starts, returning that token's
	/// terminal id. With `consume` the token is skipped as well.
	fn seek_forward_until(&mut self, _trie: &Trie, _consume: bool) -> StencilResult<Option<usize>> {
		Err(StencilError::UnsupportedSeek("seek_forward_until"))
	}
}

/// Buffered scan state over a reader/writer pair.
///
/// The buffer holds a window of the input. Bytes before `written` have
/// already been emitted or consumed by a rule; bytes from `written` up to the
/// scan position are pass-through content that has not been flushed yet.
/// While a rule handles a match, `pending_end` marks where the pass-through
/// content stops and the matched token begins.
pub struct ProcessorState<'a> {
	source: &'a mut dyn Read,
	target: &'a mut dyn Write,
	buffer: Vec<u8>,
	chunk_size: usize,
	lookbehind: usize,
	position: usize,
	/// Sequence number of `buffer[0]`.
	origin: usize,
	written: usize,
	pending_end: Option<usize>,
	exhausted: bool,
	variables: &'a VariableCollection,
	flags: HashMap<String, bool>,
}

impl<'a> ProcessorState<'a> {
	/// Create the state and load the first chunk.
	pub fn new(
		source: &'a mut dyn Read,
		target: &'a mut dyn Write,
		chunk_size: usize,
		variables: &'a VariableCollection,
	) -> StencilResult<Self> {
		if chunk_size == 0 {
			return Err(StencilError::InvalidChunkSize);
		}

		let mut state = Self {
			source,
			target,
			buffer: Vec::with_capacity(chunk_size * 2),
			chunk_size,
			lookbehind: DEFAULT_LOOKBEHIND,
			position: 0,
			origin: 0,
			written: 0,
			pending_end: None,
			exhausted: false,
			variables,
			flags: HashMap::new(),
		};
		state.fill()?;

		Ok(state)
	}

	#[must_use]
	pub fn with_lookbehind(mut self, lookbehind: usize) -> Self {
		self.lookbehind = lookbehind;
		self
	}

	/// Sequence number of the byte at the current position.
	pub fn sequence_number(&self) -> usize {
		self.origin + self.position
	}

	/// Sequence number of the first byte still held in the buffer.
	pub(crate) fn origin(&self) -> usize {
		self.origin
	}

	pub fn variables(&self) -> &VariableCollection {
		self.variables
	}

	pub fn flag(&self, name: &str) -> Option<bool> {
		self.flags.get(name).copied()
	}

	pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
		self.flags.insert(name.into(), value);
	}

	/// Emit `bytes`, after any pass-through content that precedes them.
	pub fn write(&mut self, bytes: &[u8]) -> StencilResult<()> {
		self.flush_pending()?;
		self.target.write_all(bytes)?;
		Ok(())
	}

	/// Copy everything `reader` produces to the output.
	pub fn write_from(&mut self, reader: &mut dyn Read) -> StencilResult<u64> {
		self.flush_pending()?;
		Ok(std::io::copy(reader, &mut *self.target)?)
	}

	/// Collect input bytes up to the next token of `trie`. The token is
	/// skipped when `consume` is set. Returns the collected bytes and the
	/// terminal id that stopped the scan, if any.
	pub fn read_until(&mut self, trie: &Trie, consume: bool) -> StencilResult<(Vec<u8>, Option<usize>)> {
		let mut collected = Vec::new();
		let found = self.scan_forward(trie, consume, Some(&mut collected))?;
		Ok((collected, found))
	}

	/// Mark the token at `start..end` as matched and place the cursor after
	/// it. Content before `start` stays pending pass-through so rules may
	/// still trim it.
	pub(crate) fn begin_match(&mut self, start: usize, end: usize) {
		self.pending_end = Some(start.max(self.written));
		self.position = end;
	}

	/// Settle everything up to the cursor: pending pass-through is flushed
	/// and the matched bytes count as consumed.
	pub(crate) fn end_match(&mut self) -> StencilResult<()> {
		self.flush_pending()?;
		self.pending_end = None;
		self.written = self.position;
		Ok(())
	}

	/// Flush the remaining pass-through content and the target.
	pub(crate) fn finish(&mut self) -> StencilResult<()> {
		let end = self.buffer.len();
		self.flush_range(end)?;
		self.target.flush()?;
		Ok(())
	}

	fn flush_pending(&mut self) -> StencilResult<()> {
		if let Some(end) = self.pending_end {
			self.flush_range(end)?;
		}
		Ok(())
	}

	fn flush_range(&mut self, end: usize) -> StencilResult<()> {
		if self.written < end {
			self.target.write_all(&self.buffer[self.written..end])?;
			self.written = end;
		}
		Ok(())
	}

	/// Read the next chunk behind the loaded bytes.
	fn fill(&mut self) -> StencilResult<bool> {
		if self.exhausted {
			return Ok(false);
		}

		let start = self.buffer.len();
		self.buffer.resize(start + self.chunk_size, 0);

		let read = loop {
			match self.source.read(&mut self.buffer[start..]) {
				Ok(read) => break read,
				Err(error) if error.kind() == ErrorKind::Interrupted => {}
				Err(error) => {
					self.buffer.truncate(start);
					return Err(error.into());
				}
			}
		};

		self.buffer.truncate(start + read);
		if read == 0 {
			self.exhausted = true;
		}

		Ok(read > 0)
	}

	/// Make sure at least `needed` bytes follow the cursor, unless the
	/// stream ends first. Returns whether any byte follows the cursor.
	fn fill_for_match(&mut self, needed: usize) -> StencilResult<bool> {
		while self.buffer.len() - self.position < needed && !self.exhausted {
			let discard = self.position;
			self.advance_buffer(discard)?;
		}

		Ok(self.position < self.buffer.len())
	}

	fn scan_forward(
		&mut self,
		trie: &Trie,
		consume: bool,
		mut collected: Option<&mut Vec<u8>>,
	) -> StencilResult<Option<usize>> {
		let needed = trie.max_length().max(1);

		while self.fill_for_match(needed)? {
			if let Some((terminal, end)) = trie.match_at(&self.buffer, self.position) {
				if consume {
					self.position = end;
				}
				return Ok(Some(terminal.id));
			}

			if let Some(collected) = collected.as_deref_mut() {
				collected.push(self.buffer[self.position]);
			}
			self.position += 1;
		}

		Ok(None)
	}

	/// The end of the pass-through content that rules may trim.
	fn output_floor_and_end(&self) -> Option<(usize, usize)> {
		self.pending_end.map(|end| (self.written, end))
	}
}

impl StreamState for ProcessorState<'_> {
	fn current_buffer(&self) -> &[u8] {
		&self.buffer
	}

	fn current_buffer_position(&self) -> usize {
		self.position
	}

	fn set_current_buffer_position(&mut self, position: usize) {
		self.position = position.min(self.buffer.len());
	}

	fn is_final_buffer(&self) -> bool {
		self.exhausted
	}

	fn advance_buffer(&mut self, discard: usize) -> StencilResult<bool> {
		let discard = discard.min(self.buffer.len());

		let drop = if let Some(end) = self.pending_end {
			self.flush_range(end.min(discard))?;
			discard
		} else if self.written >= discard {
			discard
		} else {
			let keep_from = self.written.max(discard.saturating_sub(self.lookbehind));
			self.flush_range(keep_from)?;
			keep_from
		};

		if drop > 0 {
			self.buffer.copy_within(drop.., 0);
			self.buffer.truncate(self.buffer.len() - drop);
			self.position = self.position.saturating_sub(drop);
			self.written = self.written.saturating_sub(drop);
			self.pending_end = self.pending_end.map(|end| end.saturating_sub(drop));
			self.origin += drop;
		}

		tracing::trace!(
			requested = discard,
			dropped = drop,
			origin = self.origin,
			retained = self.buffer.len(),
			"advanced buffer"
		);

		self.fill()
	}

	fn seek_back_until(&mut self, trie: &Trie, consume: bool) -> StencilResult<()> {
		let Some((floor, mut end)) = self.output_floor_and_end() else {
			return Ok(());
		};

		while end > floor {
			if let Some(start) = trie.match_ending_at(&self.buffer, floor, end) {
				if consume {
					end = start;
				}
				break;
			}
			end -= 1;
		}

		self.pending_end = Some(end);
		Ok(())
	}

	fn seek_back_while(&mut self, trie: &Trie) -> StencilResult<()> {
		let Some((floor, mut end)) = self.output_floor_and_end() else {
			return Ok(());
		};

		while let Some(start) = trie.match_ending_at(&self.buffer, floor, end) {
			end = start;
		}

		self.pending_end = Some(end);
		Ok(())
	}

	fn seek_forward_through(&mut self, trie: &Trie) -> StencilResult<bool> {
		Ok(self.scan_forward(trie, true, None)?.is_some())
	}

	fn seek_forward_while(&mut self, trie: &Trie) -> StencilResult<()> {
		let needed = trie.max_length().max(1);

		while self.fill_for_match(needed)? {
			match trie.match_at(&self.buffer, self.position) {
				Some((_, end)) if end > self.position => self.position = end,
				_ => break,
			}
		}

		Ok(())
	}

	fn seek_forward_until(&mut self, trie: &Trie, consume: bool) -> StencilResult<Option<usize>> {
		self.scan_forward(trie, consume, None)
	}
}
