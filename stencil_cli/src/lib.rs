use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Rewrite text streams with declarative token rules.",
	long_about = "stencil applies the rules in a `stencil.toml` file to an input stream in a single \
	              forward pass: token replacements, removable regions, `#if` style conditionals, \
	              flags that switch rules on and off, file includes and variable \
	              expansion.\n\nQuick start:\n  stencil process template.txt      Print the \
	              result\n  stencil process -i template.txt   Rewrite the file\n  stencil \
	              process --check file  Exit 1 if the file would change\n  stencil tokens        \
	              List every registered token"
)]
pub struct StencilCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the rule file. Defaults to `stencil.toml`, `.stencil.toml` or
	/// `.config/stencil.toml` in the current directory.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Run the configured rules over a file or stdin.
	///
	/// The result goes to stdout unless `--output` or `--in-place` is given.
	/// Include paths in the rules resolve relative to the rule file.
	Process {
		/// File to process, or `-` for stdin.
		input: PathBuf,

		/// Bytes read per refill. Overrides `chunk_size` from the rule file.
		#[arg(long)]
		chunk_size: Option<usize>,

		/// Write the result to this file.
		#[arg(long, short, conflicts_with = "in_place")]
		output: Option<PathBuf>,

		/// Overwrite the input file with the result.
		#[arg(long, short, default_value_t = false)]
		in_place: bool,

		/// Write nothing and exit with status 1 when the input would change.
		#[arg(long, default_value_t = false, conflicts_with_all = ["output", "in_place"])]
		check: bool,

		/// Print a unified diff between the input and the result instead of
		/// the result.
		#[arg(long, default_value_t = false, conflicts_with_all = ["output", "in_place"])]
		diff: bool,

		/// Set a parameter, overriding the rule file. Repeatable.
		#[arg(long = "set", short = 'D', value_name = "NAME=VALUE", value_parser = parse_parameter)]
		parameters: Vec<(String, String)>,
	},
	/// List every trigger token with its terminal id in the merged scan trie
	/// and the rule that owns it.
	Tokens,
}

fn parse_parameter(raw: &str) -> Result<(String, String), String> {
	raw.split_once('=')
		.map(|(name, value)| (name.trim().to_string(), value.to_string()))
		.filter(|(name, _)| !name.is_empty())
		.ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))
}
