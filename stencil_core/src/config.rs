use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::Conditional;
use crate::ConditionalMarkers;
use crate::DEFAULT_CHUNK_SIZE;
use crate::DirectoryResolver;
use crate::EngineConfig;
use crate::ExpandVariables;
use crate::FlagMarkers;
use crate::Include;
use crate::MarkerTrim;
use crate::OperationProvider;
use crate::Parameters;
use crate::Processor;
use crate::Region;
use crate::Replacement;
use crate::SetFlag;
use crate::StencilError;
use crate::StencilResult;
use crate::VariableCollection;
use crate::display_value;
use crate::infer_literal;

/// Candidate rule file names, checked in order.
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["stencil.toml", ".stencil.toml", ".config/stencil.toml"];

/// Default reference format for variable expansion.
pub const DEFAULT_VARIABLE_FORMAT: &str = "$({0})";

/// A rule file as written in `stencil.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RunSpec {
	/// Bytes read per refill.
	#[serde(default)]
	pub chunk_size: Option<usize>,
	/// Reference format used by variable expansion, `{0}` is the key.
	#[serde(default)]
	pub variable_format: Option<String>,
	/// Register a rule that expands variable references.
	#[serde(default)]
	pub expand_variables: bool,
	#[serde(default)]
	pub parameters: Parameters,
	#[serde(default)]
	pub variables: VariablesConfig,
	/// Token to parameter name.
	#[serde(default)]
	pub replacements: BTreeMap<String, String>,
	#[serde(default)]
	pub regions: Vec<RegionConfig>,
	#[serde(default)]
	pub conditionals: Option<ConditionalsConfig>,
	#[serde(default)]
	pub include: Option<IncludeConfig>,
	#[serde(default)]
	pub flags: BTreeMap<String, FlagConfig>,
}

/// Where variables come from and which sources shadow which.
#[derive(Debug, Clone, Deserialize)]
pub struct VariablesConfig {
	/// Sources in increasing precedence.
	#[serde(default = "default_variable_order")]
	pub order: Vec<String>,
	/// Key format for environment variables.
	#[serde(default)]
	pub environment: Option<String>,
	/// Key format for parameters.
	#[serde(default)]
	pub user: Option<String>,
	/// A second key format registered for every source.
	#[serde(default)]
	pub fallback_format: Option<String>,
}

impl Default for VariablesConfig {
	fn default() -> Self {
		Self {
			order: default_variable_order(),
			environment: None,
			user: None,
			fallback_format: None,
		}
	}
}

fn default_variable_order() -> Vec<String> {
	vec!["user".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
	pub start: String,
	pub end: String,
	#[serde(default)]
	pub include: bool,
	#[serde(default)]
	pub trim: bool,
	#[serde(default)]
	pub whole_line: bool,
	/// Flag name gating this region. Defaults to `regions`.
	#[serde(default)]
	pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalsConfig {
	#[serde(rename = "if", default = "default_if")]
	pub if_token: String,
	#[serde(rename = "elseif", default = "default_else_if")]
	pub else_if_token: String,
	#[serde(rename = "else", default = "default_else")]
	pub else_token: String,
	#[serde(rename = "endif", default = "default_end_if")]
	pub end_if_token: String,
	#[serde(default)]
	pub trim: bool,
	#[serde(default)]
	pub whole_line: bool,
}

fn default_if() -> String {
	ConditionalMarkers::default().if_token
}

fn default_else_if() -> String {
	ConditionalMarkers::default().else_if_token
}

fn default_else() -> String {
	ConditionalMarkers::default().else_token
}

fn default_end_if() -> String {
	ConditionalMarkers::default().end_if_token
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeConfig {
	pub start: String,
	pub end: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FlagConfig {
	#[serde(default)]
	pub on: String,
	#[serde(default)]
	pub off: String,
	#[serde(default)]
	pub on_no_emit: String,
	#[serde(default)]
	pub off_no_emit: String,
	#[serde(default)]
	pub default: Option<bool>,
}

impl RunSpec {
	/// Find the rule file in `root`, if any.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	pub fn load(path: &Path) -> StencilResult<Self> {
		let content = std::fs::read_to_string(path)?;
		Self::from_toml(&content)
	}

	pub fn from_toml(content: &str) -> StencilResult<Self> {
		toml::from_str(content).map_err(|e| StencilError::ConfigParse(e.to_string()))
	}

	pub fn chunk_size(&self) -> usize {
		self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
	}

	pub fn variable_format(&self) -> &str {
		self.variable_format
			.as_deref()
			.unwrap_or(DEFAULT_VARIABLE_FORMAT)
	}

	/// Assemble the variable chain. Each source in `order` shadows the ones
	/// before it, and within a source the fallback keys shadow the primary
	/// ones.
	pub fn build_variables(&self) -> StencilResult<VariableCollection> {
		let mut chain: Option<VariableCollection> = None;

		for source in &self.variables.order {
			let collection = match source.as_str() {
				"environment" => {
					let format = self.variables.environment.as_deref().unwrap_or("{0}");
					let primary = VariableCollection::environment(format);
					match self.variables.fallback_format.as_deref() {
						Some(fallback) => VariableCollection::environment(fallback).with_parent(primary),
						None => primary,
					}
				}
				"user" => {
					let format = self.variables.user.as_deref().unwrap_or("{0}");
					let primary = VariableCollection::from_parameters(&self.parameters, format);
					match self.variables.fallback_format.as_deref() {
						Some(fallback) => {
							VariableCollection::from_parameters(&self.parameters, fallback)
								.with_parent(primary)
						}
						None => primary,
					}
				}
				other => return Err(StencilError::UnknownVariableSource(other.to_string())),
			};

			chain = Some(match chain {
				Some(previous) => {
					let mut collection = collection;
					collection.attach_root(previous);
					collection
				}
				None => collection,
			});
		}

		Ok(chain.unwrap_or_default())
	}

	/// Build the rule list in dispatch order: include, regions,
	/// conditionals, flags, replacements, then variable expansion. Include
	/// paths resolve against `root`.
	pub fn build(&self, root: &Path) -> StencilResult<(Vec<Box<dyn OperationProvider>>, VariableCollection)> {
		let variables = self.build_variables()?;
		let mut providers: Vec<Box<dyn OperationProvider>> = Vec::new();

		if let Some(include) = &self.include {
			providers.push(Box::new(
				Include::new(&include.start, &include.end, DirectoryResolver::new(root)).with_id("include"),
			));
		}

		for region in &self.regions {
			let style = MarkerTrim {
				trim: region.trim,
				whole_line: region.whole_line,
			};
			let id = region.id.as_deref().unwrap_or("regions");
			providers.push(Box::new(
				Region::new(&region.start, &region.end, region.include, style).with_id(id),
			));
		}

		if let Some(conditionals) = &self.conditionals {
			let markers = ConditionalMarkers {
				if_token: conditionals.if_token.clone(),
				else_if_token: conditionals.else_if_token.clone(),
				else_token: conditionals.else_token.clone(),
				end_if_token: conditionals.end_if_token.clone(),
			};
			let style = MarkerTrim {
				trim: conditionals.trim,
				whole_line: conditionals.whole_line,
			};
			providers.push(Box::new(Conditional::new(&markers, style).with_id("conditionals")));
		}

		for (name, flag) in &self.flags {
			let markers = FlagMarkers {
				on: flag.on.clone(),
				off: flag.off.clone(),
				on_no_emit: flag.on_no_emit.clone(),
				off_no_emit: flag.off_no_emit.clone(),
			};
			let mut set_flag = SetFlag::new(name.as_str(), &markers);
			if let Some(default) = flag.default {
				set_flag = set_flag.with_default(default);
			}
			providers.push(Box::new(set_flag));
		}

		for (token, parameter) in &self.replacements {
			let Some(value) = self.parameters.get(parameter) else {
				return Err(StencilError::UnknownParameter {
					token: token.clone(),
					parameter: parameter.clone(),
				});
			};
			providers.push(Box::new(
				Replacement::new(token, display_value(&infer_literal(value))).with_id("replacements"),
			));
		}

		if self.expand_variables {
			providers.push(Box::new(
				ExpandVariables::new(&variables, self.variable_format()).with_id("expand_variables"),
			));
		}

		Ok((providers, variables))
	}

	/// Build a ready-to-run [`Processor`].
	pub fn processor(&self, root: &Path) -> StencilResult<Processor> {
		let (providers, variables) = self.build(root)?;
		let config = EngineConfig {
			chunk_size: self.chunk_size(),
			variables,
			..EngineConfig::default()
		};

		Ok(Processor::new(config, providers))
	}
}
