use crate::trie::ROOT;
use crate::trie::Terminal;
use crate::trie::Trie;

/// A resolved match: which terminal, and where the token starts.
///
/// The evaluator reports `location` as a logical sequence number. The
/// [`crate::TrieEvaluationDriver`] rebases it to a buffer index before
/// handing it out.
#[derive(Debug)]
pub struct TerminalLocation<'t, T> {
	pub terminal: &'t Terminal<T>,
	pub location: usize,
}

impl<T> Clone for TerminalLocation<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for TerminalLocation<'_, T> {}

impl<T> TerminalLocation<'_, T> {
	/// Position just past the matched token, in the same coordinates as
	/// `location`.
	pub fn end(&self) -> usize {
		self.location + self.terminal.length
	}
}

/// One in-progress walk through the trie, anchored where it started.
#[derive(Debug, Clone, Copy)]
struct Candidate {
	start: usize,
	/// Current node, or `None` once the walk can not be extended.
	node: Option<usize>,
	/// Longest completed token seen so far: terminal index and end sequence.
	best: Option<(usize, usize)>,
}

/// Consumes a stream one byte at a time and reports the earliest starting,
/// longest completed token as soon as no live candidate could beat it.
///
/// Every byte spawns a candidate at the root, so matches that start inside
/// the look-ahead of an earlier candidate are never lost and bytes are never
/// fed twice.
#[derive(Debug)]
pub struct TrieEvaluator<'t, T> {
	trie: &'t Trie<T>,
	/// Live and resolvable candidates ordered by `start`.
	candidates: Vec<Candidate>,
	/// Sequence number of the next byte this evaluator expects.
	sequence_number: usize,
}

impl<'t, T> TrieEvaluator<'t, T> {
	pub fn new(trie: &'t Trie<T>) -> Self {
		Self {
			trie,
			candidates: Vec::new(),
			sequence_number: 0,
		}
	}

	/// Feed the byte at `sequence_number` to every candidate.
	pub fn accept(&mut self, byte: u8, sequence_number: usize) -> Option<TerminalLocation<'t, T>> {
		let trie = self.trie;

		for candidate in &mut self.candidates {
			let Some(node) = candidate.node else {
				continue;
			};

			match trie.child(node, byte) {
				Some(next) => {
					if let Some(terminal) = trie.terminal_index(next) {
						candidate.best = Some((terminal, sequence_number + 1));
					}
					candidate.node = trie.has_children(next).then_some(next);
				}
				None => candidate.node = None,
			}
		}

		if let Some(next) = trie.child(ROOT, byte) {
			self.candidates.push(Candidate {
				start: sequence_number,
				node: trie.has_children(next).then_some(next),
				best: trie
					.terminal_index(next)
					.map(|terminal| (terminal, sequence_number + 1)),
			});
		}

		self.candidates
			.retain(|candidate| candidate.node.is_some() || candidate.best.is_some());
		self.sequence_number = sequence_number + 1;
		self.resolve_front()
	}

	/// Drain a match that is already decided without consuming a new byte.
	///
	/// With `is_at_end_of_stream` every candidate is treated as unable to
	/// grow, so the best completed token wins.
	pub fn try_get_next(
		&mut self,
		is_at_end_of_stream: bool,
		sequence_number: usize,
	) -> Option<TerminalLocation<'t, T>> {
		self.sequence_number = self.sequence_number.max(sequence_number);

		if is_at_end_of_stream {
			return self.finalize_matches_in_progress(sequence_number);
		}

		self.resolve_front()
	}

	/// Stop every live walk and resolve the best completed candidate, if any.
	/// Only meaningful once no more input can arrive.
	pub fn finalize_matches_in_progress(
		&mut self,
		sequence_number: usize,
	) -> Option<TerminalLocation<'t, T>> {
		self.sequence_number = self.sequence_number.max(sequence_number);

		for candidate in &mut self.candidates {
			candidate.node = None;
		}
		self.candidates.retain(|candidate| candidate.best.is_some());

		let resolved = self.resolve_front();
		tracing::trace!(
			sequence_number,
			resolved = resolved.is_some(),
			remaining = self.candidates.len(),
			"finalized matches in progress"
		);
		resolved
	}

	/// The smallest start of any candidate still held, or the next sequence
	/// number when nothing is pending. Bytes at or after this position must
	/// stay buffered.
	pub fn oldest_required_sequence_number(&self) -> usize {
		self.candidates
			.first()
			.map_or(self.sequence_number, |candidate| candidate.start)
	}

	/// Forget candidates that start before `sequence_number`; the caller has
	/// consumed those bytes itself.
	pub fn discard_before(&mut self, sequence_number: usize) {
		self.candidates
			.retain(|candidate| candidate.start >= sequence_number);
	}

	/// Drop all state and expect the next byte at `sequence_number`.
	pub fn restart_at(&mut self, sequence_number: usize) {
		self.candidates.clear();
		self.sequence_number = sequence_number;
	}

	/// Number of candidates still walking the trie.
	pub fn live_candidates(&self) -> usize {
		self.candidates
			.iter()
			.filter(|candidate| candidate.node.is_some())
			.count()
	}

	/// True when no candidate, live or resolvable, is held.
	pub fn is_idle(&self) -> bool {
		self.candidates.is_empty()
	}

	/// Start positions of every candidate held, in order.
	pub fn candidate_starts(&self) -> impl Iterator<Item = usize> + '_ {
		self.candidates.iter().map(|candidate| candidate.start)
	}

	/// The earliest candidate wins once it can no longer grow. Candidates that
	/// start inside the winning token are consumed along with it.
	fn resolve_front(&mut self) -> Option<TerminalLocation<'t, T>> {
		let front = self.candidates.first()?;
		if front.node.is_some() {
			return None;
		}

		let (terminal, end) = front.best?;
		let start = front.start;
		self.candidates.retain(|candidate| candidate.start >= end);

		Some(TerminalLocation {
			terminal: self.trie.terminal(terminal),
			location: start,
		})
	}
}
