use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use similar::TextDiff;
use stencil_cli::Commands;
use stencil_cli::StencilCli;
use stencil_core::AnyEmptyResult;
use stencil_core::AnyResult;
use stencil_core::Processor;
use stencil_core::RunSpec;
use stencil_core::StencilError;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = StencilCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_ansi(use_color)
		.init();

	let result = match &args.command {
		Some(Commands::Process {
			input,
			chunk_size,
			output,
			in_place,
			check,
			diff,
			parameters,
		}) => {
			let options = ProcessOptions {
				input,
				chunk_size: *chunk_size,
				output: output.as_deref(),
				in_place: *in_place,
				check: *check,
				diff: *diff,
				parameters,
			};
			run_process(&args, &options)
		}
		Some(Commands::Tokens) => run_tokens(&args),
		None => {
			eprintln!("No subcommand specified. Run `stencil --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Render core errors through miette for codes and help text.
		match e.downcast::<StencilError>() {
			Ok(stencil_err) => {
				let report: miette::Report = (*stencil_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

struct ProcessOptions<'a> {
	input: &'a Path,
	chunk_size: Option<usize>,
	output: Option<&'a Path>,
	in_place: bool,
	check: bool,
	diff: bool,
	parameters: &'a [(String, String)],
}

/// Load the rule file named on the command line, or the first candidate
/// found in the current directory. Returns the rules and the directory that
/// include paths resolve against.
fn load_spec(args: &StencilCli) -> AnyResult<(RunSpec, PathBuf)> {
	let path = match &args.config {
		Some(path) => Some(path.clone()),
		None => RunSpec::resolve_path(Path::new(".")),
	};

	let Some(path) = path else {
		tracing::debug!("no rule file found, running without rules");
		return Ok((RunSpec::default(), PathBuf::from(".")));
	};

	tracing::debug!(path = %path.display(), "loading rule file");
	let spec = RunSpec::load(&path)?;
	let root = path
		.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.map_or_else(|| PathBuf::from("."), Path::to_path_buf);

	Ok((spec, root))
}

fn build_processor(args: &StencilCli, parameters: &[(String, String)]) -> AnyResult<Processor> {
	let (mut spec, root) = load_spec(args)?;
	for (name, value) in parameters {
		spec.parameters.insert(name.clone(), value.clone());
	}

	Ok(spec.processor(&root)?)
}

fn open_input(input: &Path) -> AnyResult<Box<dyn Read>> {
	if input.as_os_str() == "-" {
		return Ok(Box::new(io::stdin().lock()));
	}

	Ok(Box::new(File::open(input)?))
}

fn run_process(args: &StencilCli, options: &ProcessOptions<'_>) -> AnyEmptyResult {
	let processor = build_processor(args, options.parameters)?;
	let chunk_size = options
		.chunk_size
		.unwrap_or(processor.config().chunk_size);
	let mut source = open_input(options.input)?;

	if options.check {
		let changed = processor.run_with_chunk_size(&mut source, &mut io::sink(), chunk_size)?;
		if changed {
			eprintln!(
				"{} {} would change",
				colored!("stale:", red),
				options.input.display()
			);
			process::exit(1);
		}
		return Ok(());
	}

	if options.diff {
		let mut original = Vec::new();
		source.read_to_end(&mut original)?;
		let mut result = Vec::new();
		processor.run_with_chunk_size(&mut original.as_slice(), &mut result, chunk_size)?;

		print_diff(
			&options.input.display().to_string(),
			&String::from_utf8_lossy(&original),
			&String::from_utf8_lossy(&result),
		);
		return Ok(());
	}

	if options.in_place {
		return rewrite_in_place(&processor, &mut source, options.input, chunk_size);
	}

	let changed = match options.output {
		Some(path) => {
			let mut target = BufWriter::new(File::create(path)?);
			let changed = processor.run_with_chunk_size(&mut source, &mut target, chunk_size)?;
			target.flush()?;
			changed
		}
		None => {
			let mut target = BufWriter::new(io::stdout().lock());
			let changed = processor.run_with_chunk_size(&mut source, &mut target, chunk_size)?;
			target.flush()?;
			changed
		}
	};

	tracing::debug!(changed, "processed input");

	Ok(())
}

/// Stream the result into a temporary file next to `input` and move it over
/// the input only when something changed.
fn rewrite_in_place(
	processor: &Processor,
	source: &mut dyn Read,
	input: &Path,
	chunk_size: usize,
) -> AnyEmptyResult {
	if input.as_os_str() == "-" {
		return Err("--in-place needs a file path, not stdin".into());
	}

	let directory = input
		.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	let mut temp = NamedTempFile::new_in(directory)?;

	let changed = {
		let mut target = BufWriter::new(temp.as_file_mut());
		let changed = processor.run_with_chunk_size(source, &mut target, chunk_size)?;
		target.flush()?;
		changed
	};

	if changed {
		temp.persist(input)?;
		println!("{} {}", colored!("Updated", green), input.display());
	}

	Ok(())
}

fn run_tokens(args: &StencilCli) -> AnyEmptyResult {
	let processor = build_processor(args, &[])?;

	if processor.providers().is_empty() {
		println!("No rules configured.");
		return Ok(());
	}

	let merged: Vec<_> = processor.trie().iter().collect();

	for (index, provider) in processor.providers().iter().enumerate() {
		let gate = provider
			.id()
			.map(|id| format!(" (flag `{id}`)"))
			.unwrap_or_default();
		println!(
			"{}",
			colored!(format!("[{index}] {}{gate}", provider.kind()), bold)
		);

		for (token, terminal) in merged
			.iter()
			.filter(|(_, terminal)| terminal.payload.operation == index)
		{
			println!("  {:>3}  {}", terminal.id, String::from_utf8_lossy(token));
		}
	}

	Ok(())
}

/// Print a unified diff between two strings, colorized.
fn print_diff(name: &str, current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	let unified = diff
		.unified_diff()
		.context_radius(3)
		.header(name, name)
		.to_string();

	for line in unified.lines() {
		if line.starts_with('+') && !line.starts_with("+++") {
			println!("{}", colored!(line, green));
		} else if line.starts_with('-') && !line.starts_with("---") {
			println!("{}", colored!(line, red));
		} else {
			println!("{line}");
		}
	}
}
