//! Byte-keyed token index shared by every rule in a scan pass.
//!
//! Nodes live in a flat arena and refer to each other by index, so walkers
//! (see [`crate::TrieEvaluator`]) can hold lightweight `(node, start)` pairs
//! while the trie itself stays immutable for the duration of a scan.

pub(crate) const ROOT: usize = 0;

/// The payload attached to a fully matched token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal<T> {
	/// Identifier assigned at insertion time. Dense and insertion ordered
	/// unless an explicit id was supplied.
	pub id: usize,
	/// Length in bytes of the token that produced this terminal.
	pub length: usize,
	/// Opaque caller data, e.g. which rule owns the token.
	pub payload: T,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
	/// Outgoing edges, kept sorted by byte for binary search. Token alphabets
	/// are sparse so this beats a 256 entry table on memory.
	children: Vec<(u8, usize)>,
	/// Index into `Trie::terminals` for the token that ends at this node.
	terminal: Option<usize>,
}

impl TrieNode {
	fn child(&self, byte: u8) -> Option<usize> {
		self.children
			.binary_search_by_key(&byte, |(edge, _)| *edge)
			.ok()
			.map(|index| self.children[index].1)
	}
}

/// A set of literal byte tokens.
///
/// `T` is the payload carried by each terminal. Rules that only need to
/// know *that* something matched use the default `()` payload.
#[derive(Debug, Clone)]
pub struct Trie<T = ()> {
	nodes: Vec<TrieNode>,
	terminals: Vec<Terminal<T>>,
	tokens: Vec<Vec<u8>>,
	max_length: usize,
	min_length: usize,
}

impl<T> Default for Trie<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Trie<T> {
	pub fn new() -> Self {
		Self {
			nodes: vec![TrieNode::default()],
			terminals: Vec::new(),
			tokens: Vec::new(),
			max_length: 0,
			min_length: 0,
		}
	}

	/// Number of tokens inserted, duplicates included.
	pub fn count(&self) -> usize {
		self.terminals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.terminals.is_empty()
	}

	/// Length of the longest inserted token.
	pub fn max_length(&self) -> usize {
		self.max_length
	}

	/// Length of the shortest non-empty inserted token, or `0` when nothing
	/// has been inserted.
	pub fn min_length(&self) -> usize {
		self.min_length
	}

	/// Insert `token` with the next insertion-order id and return that id.
	pub fn insert(&mut self, token: impl AsRef<[u8]>, payload: T) -> usize {
		let id = self.count();
		self.insert_with_id(token, id, payload)
	}

	/// Insert `token` under an explicit terminal id.
	///
	/// Inserting the same bytes twice replaces the terminal at that node but
	/// still counts as a second token.
	pub fn insert_with_id(&mut self, token: impl AsRef<[u8]>, id: usize, payload: T) -> usize {
		let token = token.as_ref();
		let terminal_index = self.terminals.len();
		self.terminals.push(Terminal {
			id,
			length: token.len(),
			payload,
		});
		self.tokens.push(token.to_vec());

		if token.is_empty() {
			return id;
		}

		self.max_length = self.max_length.max(token.len());
		self.min_length = if self.min_length == 0 {
			token.len()
		} else {
			self.min_length.min(token.len())
		};

		let mut current = ROOT;
		for &byte in token {
			current = match self.nodes[current].child(byte) {
				Some(next) => next,
				None => {
					let next = self.nodes.len();
					self.nodes.push(TrieNode::default());
					let children = &mut self.nodes[current].children;
					let slot = children.partition_point(|(edge, _)| *edge < byte);
					children.insert(slot, (byte, next));
					next
				}
			};
		}

		self.nodes[current].terminal = Some(terminal_index);
		id
	}

	/// Re-insert every token of `other` into this trie, assigning fresh
	/// insertion-order ids.
	pub fn merge(&mut self, other: &Trie<T>)
	where
		T: Clone,
	{
		self.merge_with(other, |terminal| terminal.payload.clone());
	}

	/// Like [`Trie::merge`] but maps each foreign terminal to a new payload.
	pub fn merge_with<U>(&mut self, other: &Trie<U>, mut map: impl FnMut(&Terminal<U>) -> T) {
		for (token, terminal) in other.iter() {
			let payload = map(terminal);
			self.insert(token, payload);
		}
	}

	/// Iterate over every inserted token in insertion order together with the
	/// terminal it created.
	pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Terminal<T>)> {
		self.tokens
			.iter()
			.map(Vec::as_slice)
			.zip(self.terminals.iter())
	}

	/// Exact lookup of a complete token.
	pub fn lookup(&self, token: &[u8]) -> Option<&Terminal<T>> {
		let mut current = ROOT;
		for &byte in token {
			current = self.nodes[current].child(byte)?;
		}

		self.nodes[current]
			.terminal
			.map(|index| &self.terminals[index])
	}

	/// Walk `buffer` from `position` and return the longest token that starts
	/// there, along with the position just past it.
	///
	/// A shorter token seen along the walk stays the answer when a longer
	/// continuation fails, so `"a"` still matches `"abx"` when `"abc"` is also
	/// present.
	pub fn match_at(&self, buffer: &[u8], position: usize) -> Option<(&Terminal<T>, usize)> {
		if position > buffer.len() || buffer.len() - position < self.min_length || self.is_empty() {
			return None;
		}

		let mut current = ROOT;
		let mut best = None;

		for (index, &byte) in buffer.iter().enumerate().skip(position) {
			let Some(next) = self.nodes[current].child(byte) else {
				break;
			};

			current = next;
			if let Some(terminal) = self.nodes[current].terminal {
				best = Some((terminal, index + 1));
			}
		}

		best.map(|(terminal, end)| (&self.terminals[terminal], end))
	}

	/// Find the longest token that ends exactly at `end` and starts no earlier
	/// than `floor`. Returns the token's start.
	pub fn match_ending_at(&self, buffer: &[u8], floor: usize, end: usize) -> Option<usize> {
		if self.is_empty() || end > buffer.len() {
			return None;
		}

		let longest = self.max_length.min(end.saturating_sub(floor));
		(self.min_length.max(1)..=longest)
			.rev()
			.map(|length| end - length)
			.find(|&start| self.lookup(&buffer[start..end]).is_some())
	}

	pub(crate) fn child(&self, node: usize, byte: u8) -> Option<usize> {
		self.nodes[node].child(byte)
	}

	pub(crate) fn has_children(&self, node: usize) -> bool {
		!self.nodes[node].children.is_empty()
	}

	pub(crate) fn terminal_index(&self, node: usize) -> Option<usize> {
		self.nodes[node].terminal
	}

	pub(crate) fn terminal(&self, index: usize) -> &Terminal<T> {
		&self.terminals[index]
	}
}

impl Trie<()> {
	/// Build a payload-free trie from a list of tokens, skipping empty ones.
	pub fn from_tokens<I, B>(tokens: I) -> Self
	where
		I: IntoIterator<Item = B>,
		B: AsRef<[u8]>,
	{
		let mut trie = Self::new();
		for token in tokens {
			if !token.as_ref().is_empty() {
				trie.insert(token, ());
			}
		}
		trie
	}
}
