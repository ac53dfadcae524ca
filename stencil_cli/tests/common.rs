use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;

pub const RULES: &str = r#"
[parameters]
name = "World"

[replacements]
"NAME" = "name"
"#;

pub fn stencil_cmd() -> Command {
	let mut cmd = Command::new(cargo_bin("stencil"));
	cmd.env("NO_COLOR", "1");
	cmd
}

/// Write `stencil.toml` and `input.txt` into `dir`.
pub fn write_project(dir: &Path, rules: &str, input: &str) -> std::io::Result<()> {
	std::fs::write(dir.join("stencil.toml"), rules)?;
	std::fs::write(dir.join("input.txt"), input)
}
