use std::ops::Range;

use float_cmp::approx_eq;
use logos::Logos;
use serde_json::Value;
use snailquote::unescape;

use crate::StencilError;
use crate::StencilResult;
use crate::VariableCollection;
use crate::display_value;
use crate::infer_literal;
use crate::is_truthy;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum ConditionToken {
	#[token("(")]
	OpenParen,
	#[token(")")]
	CloseParen,
	#[token("!")]
	Not,
	#[token("&&")]
	And,
	#[token("||")]
	Or,
	#[token("==")]
	Equal,
	#[token("!=")]
	NotEqual,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_.]*")]
	Ident,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r"[0-9]+(\.[0-9]+)?")]
	Number,
}

/// Evaluate a condition expression against `variables`.
///
/// Identifiers resolve through the collection (unknown names are null),
/// `true`, `false` and `null` are literals, and operands combine with `!`,
/// `==`, `!=`, `&&`, `||` and parentheses. Parsing stops at the first token
/// that cannot continue the expression, so trailing text such as a comment
/// terminator is ignored.
pub fn evaluate_condition(expression: &str, variables: &VariableCollection) -> StencilResult<bool> {
	let tokens: Vec<_> = ConditionToken::lexer(expression).spanned().collect();
	let mut parser = ConditionParser {
		source: expression,
		tokens,
		cursor: 0,
		variables,
	};

	let value = parser.parse_or()?;
	Ok(is_truthy(&value))
}

struct ConditionParser<'a> {
	source: &'a str,
	tokens: Vec<(Result<ConditionToken, ()>, Range<usize>)>,
	cursor: usize,
	variables: &'a VariableCollection,
}

impl ConditionParser<'_> {
	fn peek(&self) -> Option<ConditionToken> {
		self.tokens
			.get(self.cursor)
			.and_then(|(token, _)| token.ok())
	}

	fn eat(&mut self, expected: ConditionToken) -> bool {
		if self.peek() == Some(expected) {
			self.cursor += 1;
			return true;
		}
		false
	}

	fn slice(&self) -> &str {
		self.tokens
			.get(self.cursor)
			.map_or("", |(_, span)| &self.source[span.clone()])
	}

	fn error(&self, reason: &str) -> StencilError {
		StencilError::InvalidCondition {
			expression: self.source.trim().to_string(),
			reason: reason.to_string(),
		}
	}

	fn parse_or(&mut self) -> StencilResult<Value> {
		let mut value = self.parse_and()?;
		while self.eat(ConditionToken::Or) {
			let right = self.parse_and()?;
			value = Value::Bool(is_truthy(&value) || is_truthy(&right));
		}
		Ok(value)
	}

	fn parse_and(&mut self) -> StencilResult<Value> {
		let mut value = self.parse_unary()?;
		while self.eat(ConditionToken::And) {
			let right = self.parse_unary()?;
			value = Value::Bool(is_truthy(&value) && is_truthy(&right));
		}
		Ok(value)
	}

	fn parse_unary(&mut self) -> StencilResult<Value> {
		if self.eat(ConditionToken::Not) {
			let value = self.parse_unary()?;
			return Ok(Value::Bool(!is_truthy(&value)));
		}

		self.parse_comparison()
	}

	fn parse_comparison(&mut self) -> StencilResult<Value> {
		let left = self.parse_primary()?;

		if self.eat(ConditionToken::Equal) {
			let right = self.parse_primary()?;
			return Ok(Value::Bool(values_equal(&left, &right)));
		}

		if self.eat(ConditionToken::NotEqual) {
			let right = self.parse_primary()?;
			return Ok(Value::Bool(!values_equal(&left, &right)));
		}

		Ok(left)
	}

	fn parse_primary(&mut self) -> StencilResult<Value> {
		let Some(token) = self.peek() else {
			return Err(self.error("expected a value"));
		};
		let slice = self.slice().to_string();

		let value = match token {
			ConditionToken::OpenParen => {
				self.cursor += 1;
				let value = self.parse_or()?;
				if !self.eat(ConditionToken::CloseParen) {
					return Err(self.error("missing closing parenthesis"));
				}
				return Ok(value);
			}
			ConditionToken::Ident => {
				match slice.as_str() {
					"true" => Value::Bool(true),
					"false" => Value::Bool(false),
					"null" => Value::Null,
					name => self.variables.get(name).cloned().unwrap_or(Value::Null),
				}
			}
			ConditionToken::Number => infer_literal(&slice),
			ConditionToken::DoubleQuotedString | ConditionToken::SingleQuotedString => {
				let inner = &slice[1..slice.len() - 1];
				if inner.contains('\\') {
					let unescaped = unescape(inner).map_err(|error| self.error(&error.to_string()))?;
					Value::String(unescaped)
				} else {
					Value::String(inner.to_string())
				}
			}
			_ => return Err(self.error("expected a value")),
		};

		self.cursor += 1;
		Ok(value)
	}
}

fn values_equal(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Null, Value::Null) => true,
		(Value::Null, _) | (_, Value::Null) => false,
		(Value::Number(left), Value::Number(right)) => {
			match (left.as_f64(), right.as_f64()) {
				(Some(left), Some(right)) => approx_eq!(f64, left, right, ulps = 2),
				_ => left == right,
			}
		}
		(Value::Bool(left), Value::Bool(right)) => left == right,
		_ => display_value(left) == display_value(right),
	}
}
