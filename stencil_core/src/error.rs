use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum StencilError {
	#[error(transparent)]
	#[diagnostic(code(stencil::io_error))]
	Io(#[from] std::io::Error),

	#[error("the stream state does not support `{0}`")]
	#[diagnostic(
		code(stencil::unsupported_seek),
		help("use a stream state that implements `{0}`, such as `ProcessorState`")
	)]
	UnsupportedSeek(&'static str),

	#[error("chunk size must be at least 1 byte")]
	#[diagnostic(code(stencil::invalid_chunk_size))]
	InvalidChunkSize,

	#[error("failed to parse rule file: {0}")]
	#[diagnostic(
		code(stencil::config_parse),
		help("check that stencil.toml is valid TOML with the documented rule sections")
	)]
	ConfigParse(String),

	#[error("unknown variable source `{0}` in [variables].order")]
	#[diagnostic(
		code(stencil::unknown_variable_source),
		help("supported sources: environment, user")
	)]
	UnknownVariableSource(String),

	#[error("replacement for `{token}` refers to unknown parameter `{parameter}`")]
	#[diagnostic(
		code(stencil::unknown_parameter),
		help("add `{parameter}` to [parameters] or fix the name in [replacements]")
	)]
	UnknownParameter { token: String, parameter: String },

	#[error("invalid condition `{expression}`: {reason}")]
	#[diagnostic(
		code(stencil::invalid_condition),
		help("conditions support identifiers, literals, `!`, `==`, `!=`, `&&`, `||` and parentheses")
	)]
	InvalidCondition { expression: String, reason: String },

	#[error("failed to include `{path}`: {reason}")]
	#[diagnostic(code(stencil::include))]
	Include { path: String, reason: String },
}

pub type StencilResult<T> = Result<T, StencilError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
