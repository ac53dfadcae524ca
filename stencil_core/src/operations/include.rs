use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::PathBuf;

use super::Operation;
use super::OperationProvider;
use crate::ProcessorState;
use crate::StencilError;
use crate::StencilResult;
use crate::Trie;

/// Opens the sources named by include markers.
pub trait SourceResolver {
	fn open(&self, path: &str) -> io::Result<Box<dyn Read>>;
}

impl<F> SourceResolver for F
where
	F: Fn(&str) -> io::Result<Box<dyn Read>>,
{
	fn open(&self, path: &str) -> io::Result<Box<dyn Read>> {
		self(path)
	}
}

/// Resolves include paths against a base directory.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
	root: PathBuf,
}

impl DirectoryResolver {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl SourceResolver for DirectoryResolver {
	fn open(&self, path: &str) -> io::Result<Box<dyn Read>> {
		let file = File::open(self.root.join(path))?;
		Ok(Box::new(file))
	}
}

/// Replace `start path end` with the raw contents of `path`.
pub struct Include {
	tokens: Trie,
	end: Trie,
	resolver: Box<dyn SourceResolver>,
	id: Option<String>,
}

impl fmt::Debug for Include {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Include")
			.field("tokens", &self.tokens)
			.field("end", &self.end)
			.field("id", &self.id)
			.finish_non_exhaustive()
	}
}

impl Include {
	pub fn new(
		start: impl AsRef<[u8]>,
		end: impl AsRef<[u8]>,
		resolver: impl SourceResolver + 'static,
	) -> Self {
		Self {
			tokens: Trie::from_tokens([start.as_ref()]),
			end: Trie::from_tokens([end.as_ref()]),
			resolver: Box::new(resolver),
			id: None,
		}
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}
}

impl OperationProvider for Include {
	fn kind(&self) -> &'static str {
		"include"
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	fn tokens(&self) -> &Trie {
		&self.tokens
	}

	fn create_operation(&self) -> Box<dyn Operation + '_> {
		Box::new(IncludeRun(self))
	}
}

struct IncludeRun<'p>(&'p Include);

impl Operation for IncludeRun<'_> {
	fn handle_match(&mut self, state: &mut ProcessorState<'_>, _token: usize) -> StencilResult<bool> {
		let (raw, found) = state.read_until(&self.0.end, true)?;
		let path = String::from_utf8_lossy(&raw).trim().to_string();

		if found.is_none() {
			return Err(StencilError::Include {
				path,
				reason: "missing end marker".into(),
			});
		}

		let mut source = self
			.0
			.resolver
			.open(&path)
			.map_err(|error| {
				StencilError::Include {
					path: path.clone(),
					reason: error.to_string(),
				}
			})?;

		let copied = state.write_from(&mut *source)?;
		tracing::debug!(path, bytes = copied, "included source");

		Ok(true)
	}
}
