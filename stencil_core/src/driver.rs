use std::cmp::Ordering;

use crate::StencilResult;
use crate::StreamState;
use crate::TerminalLocation;
use crate::Trie;
use crate::TrieEvaluator;

/// Bridges the evaluator's logical sequence numbers and the physical buffer
/// of a [`StreamState`].
///
/// Between refills `sequence_number - buffer_position` is constant. Each
/// refill drops only the bytes in front of the oldest candidate the
/// evaluator still holds, then the relationship is derived again from the
/// state's new position.
#[derive(Debug)]
pub struct TrieEvaluationDriver<'t, T> {
	evaluator: TrieEvaluator<'t, T>,
	sequence_number: usize,
}

impl<'t, T> TrieEvaluationDriver<'t, T> {
	pub fn new(trie: &'t Trie<T>) -> Self {
		Self {
			evaluator: TrieEvaluator::new(trie),
			sequence_number: 0,
		}
	}

	/// Sequence number of the next byte the driver will feed.
	pub fn sequence_number(&self) -> usize {
		self.sequence_number
	}

	pub fn evaluator(&self) -> &TrieEvaluator<'t, T> {
		&self.evaluator
	}

	/// Scan forward from the state's position until a match resolves or the
	/// stream ends.
	///
	/// `last_net_buffer_effect` is how far the caller moved the position
	/// relative to where the previous call left it. A positive value means
	/// bytes were consumed outside this driver and everything pending is
	/// dropped. Zero or negative means the caller resumed inside bytes that
	/// were already scanned; candidates starting before that point are
	/// dropped and scanning continues from where it stopped.
	///
	/// The returned location is an index into the state's current buffer.
	pub fn evaluate<S>(
		&mut self,
		state: &mut S,
		last_net_buffer_effect: isize,
	) -> StencilResult<Option<TerminalLocation<'t, T>>>
	where
		S: StreamState + ?Sized,
	{
		match last_net_buffer_effect.cmp(&0) {
			Ordering::Greater => {
				self.sequence_number += last_net_buffer_effect.unsigned_abs();
				self.evaluator.restart_at(self.sequence_number);
			}
			Ordering::Less => {
				let resume = self
					.sequence_number
					.saturating_sub(last_net_buffer_effect.unsigned_abs());
				self.evaluator.discard_before(resume);
			}
			Ordering::Equal => {}
		}

		let mut buffer_position = state.current_buffer_position();
		let mut buffer_length = state.current_buffer_length();
		let mut relationship = self.sequence_number - buffer_position;

		let at_end = state.is_final_buffer() && buffer_position >= buffer_length;
		let mut terminal = self
			.evaluator
			.try_get_next(at_end, self.sequence_number);

		if terminal.is_none() && !at_end {
			loop {
				if buffer_position >= buffer_length {
					if !state.is_final_buffer() {
						let oldest = self.evaluator.oldest_required_sequence_number();
						let discard = buffer_length + oldest - self.sequence_number;
						tracing::trace!(
							sequence_number = self.sequence_number,
							oldest,
							discard,
							"refilling buffer"
						);
						// The state shifts its own position on refill, so it must hold
						// where the scan stopped.
						state.set_current_buffer_position(buffer_position);
						state.advance_buffer(discard)?;
						buffer_position = state.current_buffer_position();
						buffer_length = state.current_buffer_length();
						relationship = self.sequence_number - buffer_position;
						continue;
					}

					terminal = self
						.evaluator
						.finalize_matches_in_progress(self.sequence_number);
					break;
				}

				let byte = state.current_buffer()[buffer_position];
				let resolved = self.evaluator.accept(byte, self.sequence_number);
				self.sequence_number += 1;
				buffer_position += 1;

				if resolved.is_some() {
					terminal = resolved;
					break;
				}
			}
		}

		state.set_current_buffer_position(buffer_position);

		Ok(terminal.map(|mut terminal| {
			terminal.location -= relationship;
			terminal
		}))
	}
}
