use std::path::Path;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;

#[test]
fn trie_assigns_insertion_order_ids() {
	let mut trie = Trie::new();

	assert_eq!(trie.insert("alpha", ()), 0);
	assert_eq!(trie.insert("beta", ()), 1);
	assert_eq!(trie.insert("gamma", ()), 2);
	assert_eq!(trie.count(), 3);
	assert_eq!(trie.max_length(), 5);
	assert_eq!(trie.min_length(), 4);
}

#[test]
fn trie_duplicate_insert_counts_twice_and_keeps_latest_terminal() {
	let mut trie = Trie::new();
	trie.insert("a", ());
	trie.insert("a", ());

	assert_eq!(trie.count(), 2);
	assert_eq!(trie.lookup(b"a").map(|terminal| terminal.id), Some(1));
}

#[test]
fn trie_from_tokens_skips_empty_tokens() {
	let trie = Trie::from_tokens(["", "x", ""]);

	assert_eq!(trie.count(), 1);
	assert_eq!(trie.lookup(b"x").map(|terminal| terminal.id), Some(0));
}

#[rstest]
#[case::longest(&["a", "ab"], "abx", Some((1, 2)))]
#[case::prefix_fallback(&["a", "abc"], "abx", Some((0, 1)))]
#[case::exact(&["abc"], "abc", Some((0, 3)))]
#[case::no_match(&["abc"], "xyz", None)]
#[case::too_short(&["abc"], "ab", None)]
fn trie_match_at(#[case] tokens: &[&str], #[case] input: &str, #[case] expected: Option<(usize, usize)>) {
	let trie = Trie::from_tokens(tokens.iter().copied());
	let found = trie
		.match_at(input.as_bytes(), 0)
		.map(|(terminal, end)| (terminal.id, end));

	assert_eq!(found, expected);
}

#[test]
fn trie_match_at_respects_start_position() {
	let trie = Trie::from_tokens(["abc"]);

	assert_eq!(trie.match_at(b"xabc", 1).map(|(_, end)| end), Some(4));
	assert!(trie.match_at(b"xab", 1).is_none());
}

#[test]
fn trie_match_ending_at_stops_at_floor() {
	let trie = Trie::from_tokens([" ", "\t"]);

	assert_eq!(trie.match_ending_at(b"ab \t", 0, 4), Some(3));
	assert_eq!(trie.match_ending_at(b"ab \t", 4, 4), None);
	assert_eq!(trie.match_ending_at(b"ab", 0, 2), None);
}

#[test]
fn trie_merge_with_assigns_fresh_ids_and_payloads() {
	let first = Trie::from_tokens(["one", "two"]);
	let second = Trie::from_tokens(["three"]);
	let mut merged: Trie<usize> = Trie::new();
	merged.merge_with(&first, |terminal| terminal.id);
	merged.merge_with(&second, |terminal| 100 + terminal.id);

	let three = merged.lookup(b"three");
	assert_eq!(merged.count(), 3);
	assert_eq!(three.map(|terminal| terminal.id), Some(2));
	assert_eq!(three.map(|terminal| terminal.payload), Some(100));
}

fn feed<'t, T>(evaluator: &mut TrieEvaluator<'t, T>, input: &str) -> Vec<(usize, usize)> {
	input
		.bytes()
		.enumerate()
		.filter_map(|(sequence_number, byte)| evaluator.accept(byte, sequence_number))
		.map(|found| (found.location, found.terminal.length))
		.collect()
}

#[test]
fn evaluator_falls_back_to_shorter_token() {
	let trie = Trie::from_tokens(["a", "abc"]);
	let mut evaluator = TrieEvaluator::new(&trie);

	assert_eq!(feed(&mut evaluator, "abx"), vec![(0, 1)]);
	assert!(evaluator.is_idle());
}

#[test]
fn evaluator_prefers_earliest_start() {
	let trie = Trie::from_tokens(["bc", "abcd"]);
	let mut evaluator = TrieEvaluator::new(&trie);

	assert!(feed(&mut evaluator, "ab").is_empty());
	assert_eq!(evaluator.candidate_starts().collect::<Vec<_>>(), vec![0, 1]);
	assert_eq!(evaluator.oldest_required_sequence_number(), 0);

	// `abcd` dies at `e`, which releases the later `bc`.
	assert_eq!(evaluator.accept(b'c', 2).map(|found| found.location), None);
	let found = evaluator.accept(b'e', 3);
	assert_eq!(found.map(|found| (found.location, found.terminal.length)), Some((1, 2)));
}

#[test]
fn evaluator_oldest_required_tracks_next_byte_when_idle() {
	let trie = Trie::from_tokens(["value"]);
	let mut evaluator = TrieEvaluator::new(&trie);

	feed(&mut evaluator, "test ");
	assert!(evaluator.is_idle());
	assert_eq!(evaluator.oldest_required_sequence_number(), 5);
}

#[test]
fn evaluator_finalize_resolves_pending_and_leaves_idle() {
	let trie = Trie::from_tokens(["ab", "abcd"]);
	let mut evaluator = TrieEvaluator::new(&trie);

	assert!(feed(&mut evaluator, "abc").is_empty());
	assert_eq!(evaluator.live_candidates(), 1);

	let found = evaluator.finalize_matches_in_progress(3);
	assert_eq!(found.map(|found| (found.location, found.terminal.length)), Some((0, 2)));
	assert!(evaluator.is_idle());
	assert!(evaluator.finalize_matches_in_progress(3).is_none());
}

#[test]
fn evaluator_drops_candidates_inside_resolved_match() {
	let trie = Trie::from_tokens(["aa"]);
	let mut evaluator = TrieEvaluator::new(&trie);

	assert_eq!(feed(&mut evaluator, "aaaa"), vec![(0, 2), (2, 2)]);
}

#[test]
fn driver_discards_only_bytes_before_oldest_candidate() -> StencilResult<()> {
	let trie = Trie::from_tokens(["value"]);
	let mut state = RecordingState::new("test value test", 4);
	let mut driver = TrieEvaluationDriver::new(&trie);

	let found = driver.evaluate(&mut state, 0)?;
	let Some(found) = found else {
		panic!("expected a match");
	};
	assert_eq!(found.location, 0);
	assert_eq!(&state.current_buffer()[found.location..found.end()], b"value".as_slice());
	assert_eq!(state.origin, 5);

	assert!(driver.evaluate(&mut state, 0)?.is_none());
	assert!(driver.evaluator().is_idle());
	assert_eq!(
		state.calls,
		vec![
			AdvanceCall {
				discard: 4,
				origin: 0,
				buffer_length: 4,
			},
			AdvanceCall {
				discard: 1,
				origin: 4,
				buffer_length: 4,
			},
			AdvanceCall {
				discard: 7,
				origin: 5,
				buffer_length: 7,
			},
		]
	);

	Ok(())
}

#[rstest]
fn driver_scans_each_byte_once_with_lookbehind(#[values(1, 2, 3)] chunk_size: usize) -> StencilResult<()> {
	let trie = Trie::from_tokens(["zz"]);
	let variables = VariableCollection::root();
	let mut source = "0123456789".as_bytes();
	let mut output = Vec::new();

	{
		let mut state = ProcessorState::new(&mut source, &mut output, chunk_size, &variables)?;
		let mut driver = TrieEvaluationDriver::new(&trie);

		assert!(driver.evaluate(&mut state, 0)?.is_none());
		assert_eq!(driver.sequence_number(), 10);
		assert_eq!(state.sequence_number(), 10);
		state.finish()?;
	}

	assert_eq!(output, b"0123456789".as_slice());

	Ok(())
}

#[rstest]
fn driver_reports_buffer_relative_location_after_refills(
	#[values(1, 2, 4, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let trie = Trie::from_tokens(["a", "abc"]);
	let mut state = RecordingState::new("xxabx", chunk_size);
	let mut driver = TrieEvaluationDriver::new(&trie);

	let Some(found) = driver.evaluate(&mut state, 0)? else {
		panic!("expected a match");
	};
	assert_eq!(found.terminal.id, 0);
	assert_eq!(state.origin + found.location, 2);
	assert_eq!(&state.current_buffer()[found.location..found.end()], b"a".as_slice());

	Ok(())
}

#[test]
fn driver_positive_net_effect_skips_consumed_bytes() -> StencilResult<()> {
	let trie = Trie::from_tokens(["ab"]);
	let mut state = RecordingState::new("ab ab ab", WHOLE);
	let mut driver = TrieEvaluationDriver::new(&trie);

	let first = driver.evaluate(&mut state, 0)?.map(|found| found.location);
	assert_eq!(first, Some(0));
	assert_eq!(state.current_buffer_position(), 2);

	// A rule consumed " ab " on its own.
	state.set_current_buffer_position(6);
	let second = driver.evaluate(&mut state, 4)?.map(|found| found.location);
	assert_eq!(second, Some(6));
	assert_eq!(driver.sequence_number(), 8);

	Ok(())
}

#[test]
fn driver_negative_net_effect_keeps_lookahead_candidates() -> StencilResult<()> {
	let trie = Trie::from_tokens(["xy", "xyzw", "z"]);
	let mut state = RecordingState::new("xyzq", WHOLE);
	let mut driver = TrieEvaluationDriver::new(&trie);

	let first = driver
		.evaluate(&mut state, 0)?
		.map(|found| (found.terminal.id, found.location));
	assert_eq!(first, Some((0, 0)));
	assert_eq!(state.sequence_number(), 4);

	// The rule resumed right after `xy`, two bytes behind the driver.
	let second = driver
		.evaluate(&mut state, -2)?
		.map(|found| (found.terminal.id, found.location));
	assert_eq!(second, Some((2, 2)));
	assert!(driver.evaluate(&mut state, 0)?.is_none());

	Ok(())
}

#[test]
fn default_seek_primitives_are_unsupported() {
	let trie = Trie::from_tokens(["x"]);
	let mut state = RecordingState::new("x", WHOLE);

	let result = state.seek_back_while(&trie);
	assert!(matches!(result, Err(StencilError::UnsupportedSeek("seek_back_while"))));

	let result = state.seek_forward_until(&trie, true);
	assert!(matches!(result, Err(StencilError::UnsupportedSeek("seek_forward_until"))));
}

#[rstest]
fn replacement_is_chunk_size_independent(#[values(1, 2, 3, 6, WHOLE)] chunk_size: usize) -> StencilResult<()> {
	let (output, changed) = run_rules(replacement_rules(&[("value", "foo")]), "test value test", chunk_size)?;

	assert_eq!(output, "test foo test");
	assert!(changed);

	Ok(())
}

#[rstest]
fn unmatched_input_passes_through(#[values(1, 3, WHOLE)] chunk_size: usize) -> StencilResult<()> {
	let (output, changed) = run_rules(replacement_rules(&[("value", "foo")]), "nothing valu here", chunk_size)?;

	assert_eq!(output, "nothing valu here");
	assert!(!changed);

	Ok(())
}

#[rstest]
#[case::longest_wins(&[("a", "1"), ("ab", "2")], "abab a", "22 1")]
#[case::prefix_fallback(&[("a", "1"), ("abc", "3")], "abx abc", "1bx 3")]
#[case::adjacent(&[("x", "y")], "xxx", "yyy")]
#[case::match_at_end(&[("end", "END")], "the end", "the END")]
fn replacement_resolution(
	#[case] pairs: &[(&str, &str)],
	#[case] input: &str,
	#[case] expected: &str,
	#[values(1, 2, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let (output, _) = run_rules(replacement_rules(pairs), input, chunk_size)?;
	assert_eq!(output, expected);

	Ok(())
}

#[test]
fn replacement_with_identical_bytes_reports_unchanged() -> StencilResult<()> {
	let (output, changed) = run_rules(replacement_rules(&[("same", "same")]), "the same", WHOLE)?;

	assert_eq!(output, "the same");
	assert!(!changed);

	Ok(())
}

#[test]
fn zero_chunk_size_is_rejected() {
	let result = run_rules(replacement_rules(&[("a", "b")]), "a", 0);
	assert!(matches!(result, Err(StencilError::InvalidChunkSize)));
}

#[test]
fn empty_input_produces_empty_output() -> StencilResult<()> {
	let (output, changed) = run_rules(replacement_rules(&[("a", "b")]), "", 4)?;

	assert_eq!(output, "");
	assert!(!changed);

	Ok(())
}

#[test]
fn processor_merges_all_rule_tokens() {
	let mut providers = replacement_rules(&[("one", "1"), ("two", "2")]);
	providers.extend(conditional_rules());
	let processor = Processor::new(EngineConfig::default(), providers);

	assert_eq!(processor.trie().count(), 6);
	let endif = processor.trie().lookup(b"#endif").map(|terminal| terminal.payload);
	assert_eq!(
		endif,
		Some(OperationTerminal {
			operation: 2,
			token: 3,
		})
	);
}

#[test]
#[traced_test]
fn processor_logs_dispatched_matches() {
	let result = run_rules(replacement_rules(&[("value", "foo")]), "a value", WHOLE);

	assert!(result.is_ok());
	assert!(logs_contain("dispatching match"));
}

fn region(include: bool, trim: bool, whole_line: bool) -> Vec<Box<dyn OperationProvider>> {
	let style = MarkerTrim { trim, whole_line };
	vec![Box::new(Region::new("<s>", "<e>", include, style))]
}

#[rstest]
#[case::removed(region(false, false, false), "keep<s>drop<e>keep", "keepkeep")]
#[case::included(region(true, false, false), "a<s>b<e>c", "abc")]
#[case::nested(region(false, false, false), "a<s>1<s>2<e>3<e>b", "ab")]
#[case::trimmed(region(false, true, false), "a  <s>x<e>  b", "ab")]
#[case::whole_line(
	region(false, false, true),
	"line1\n  // <s>\nhidden\n  // <e>\nline2\n",
	"line1\nline2\n"
)]
#[case::whole_line_included(
	region(true, false, true),
	"line1\n  <s> -->\nshown\n  <e> -->\nline2\n",
	"line1\nshown\nline2\n"
)]
fn region_rules(
	#[case] providers: Vec<Box<dyn OperationProvider>>,
	#[case] input: &str,
	#[case] expected: &str,
	#[values(1, 3, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let (output, changed) = run_rules(providers, input, chunk_size)?;

	assert_eq!(output, expected);
	assert!(changed);

	Ok(())
}

#[test]
fn region_end_after_closed_region_passes_through() -> StencilResult<()> {
	let (output, changed) = run_rules(region(true, false, false), "a<s>b<e>c<e>d", 1)?;

	assert_eq!(output, "abc<e>d");
	assert!(changed);

	Ok(())
}

#[test]
fn stray_region_end_passes_through() -> StencilResult<()> {
	let (output, changed) = run_rules(region(false, false, false), "a<e>b", WHOLE)?;

	assert_eq!(output, "a<e>b");
	assert!(!changed);

	Ok(())
}

const IF_ELSE: &str = "start\n#if DEBUG\ndebug\n#else\nrelease\n#endif\nend\n";

#[rstest]
#[case::taken("true", "start\ndebug\nend\n")]
#[case::not_taken("false", "start\nrelease\nend\n")]
fn conditional_selects_one_branch(
	#[case] debug: &str,
	#[case] expected: &str,
	#[values(1, 2, 3, 6, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let (output, changed) = run_rules_with_variables(
		conditional_rules(),
		variables(&[("DEBUG", debug)]),
		IF_ELSE,
		chunk_size,
	)?;

	assert_eq!(output, expected);
	assert!(changed);

	Ok(())
}

const CHAIN: &str = "#if A\na\n#elseif B\nb\n#else\nc\n#endif\n";

#[rstest]
#[case::first("true", "true", "a\n")]
#[case::second("false", "true", "b\n")]
#[case::fallback("false", "false", "c\n")]
fn conditional_chain(
	#[case] a: &str,
	#[case] b: &str,
	#[case] expected: &str,
	#[values(1, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let (output, _) = run_rules_with_variables(
		conditional_rules(),
		variables(&[("A", a), ("B", b)]),
		CHAIN,
		chunk_size,
	)?;
	assert_eq!(output, expected);

	Ok(())
}

const NESTED: &str = "#if A\nouter\n#if B\ninner\n#endif\n#endif\ndone\n";

#[rstest]
#[case::both("true", "true", "outer\ninner\ndone\n")]
#[case::outer_only("true", "false", "outer\ndone\n")]
#[case::neither("false", "true", "done\n")]
fn conditional_nesting(#[case] a: &str, #[case] b: &str, #[case] expected: &str) -> StencilResult<()> {
	let (output, _) = run_rules_with_variables(
		conditional_rules(),
		variables(&[("A", a), ("B", b)]),
		NESTED,
		2,
	)?;
	assert_eq!(output, expected);

	Ok(())
}

#[test]
fn conditional_ignores_comment_terminator() -> StencilResult<()> {
	let input = "<!-- #if name == \"app\" -->\nyes\n<!-- #else -->\nno\n<!-- #endif -->\n";
	let (output, _) =
		run_rules_with_variables(conditional_rules(), variables(&[("name", "app")]), input, 3)?;

	insta::assert_snapshot!(output.trim_end(), @"yes");

	Ok(())
}

#[test]
fn stray_conditional_markers_pass_through() -> StencilResult<()> {
	let (output, changed) = run_rules(conditional_rules(), "a #endif b #else c", WHOLE)?;

	assert_eq!(output, "a #endif b #else c");
	assert!(!changed);

	Ok(())
}

#[test]
fn conditional_without_expression_is_an_error() {
	let result = run_rules(conditional_rules(), "#if\nfoo\n#endif\n", WHOLE);
	assert!(matches!(result, Err(StencilError::InvalidCondition { .. })));
}

#[rstest]
#[case::identifier("debug", true)]
#[case::negation("!debug", false)]
#[case::missing("missing", false)]
#[case::number_equal("count == 3", true)]
#[case::float_equal("count == 3.0", true)]
#[case::number_not_equal("count != 3", false)]
#[case::double_quoted("name == \"app\"", true)]
#[case::single_quoted("name == 'app'", true)]
#[case::and("debug && missing", false)]
#[case::or("debug || missing", true)]
#[case::grouped("!(debug && missing)", true)]
#[case::precedence("missing && debug || count", true)]
#[case::empty_string("empty", false)]
#[case::literal_true("true", true)]
#[case::trailing_text("debug -->", true)]
fn condition_evaluation(#[case] expression: &str, #[case] expected: bool) -> StencilResult<()> {
	let variables = variables(&[("debug", "true"), ("count", "3"), ("name", "app"), ("empty", "")]);

	assert_eq!(evaluate_condition(expression, &variables)?, expected);

	Ok(())
}

#[rstest]
#[case::empty("")]
#[case::unclosed("(debug")]
#[case::dangling_operator("debug &&")]
fn condition_errors(#[case] expression: &str) {
	let result = evaluate_condition(expression, &VariableCollection::root());
	assert!(matches!(result, Err(StencilError::InvalidCondition { .. })));
}

fn flag_rules(markers: FlagMarkers, default: Option<bool>) -> Vec<Box<dyn OperationProvider>> {
	let mut flag = SetFlag::new("replacements", &markers);
	if let Some(default) = default {
		flag = flag.with_default(default);
	}

	vec![
		Box::new(flag),
		Box::new(Replacement::new("x", "y").with_id("replacements")),
	]
}

#[rstest]
#[case::emitted_markers(
	FlagMarkers { on: "//+r".into(), off: "//-r".into(), ..FlagMarkers::default() },
	None,
	"x //-r x //+r x",
	"y //-r x //+r y"
)]
#[case::hidden_markers(
	FlagMarkers { on_no_emit: "[+]".into(), off_no_emit: "[-]".into(), ..FlagMarkers::default() },
	None,
	"x[-]x[+]x",
	"yxy"
)]
#[case::default_off(
	FlagMarkers { on_no_emit: "[+]".into(), ..FlagMarkers::default() },
	Some(false),
	"x[+]x",
	"xy"
)]
fn flags_gate_rules(
	#[case] markers: FlagMarkers,
	#[case] default: Option<bool>,
	#[case] input: &str,
	#[case] expected: &str,
	#[values(1, WHOLE)] chunk_size: usize,
) -> StencilResult<()> {
	let (output, _) = run_rules(flag_rules(markers, default), input, chunk_size)?;
	assert_eq!(output, expected);

	Ok(())
}

#[test]
fn emitted_flag_marker_alone_is_not_a_change() -> StencilResult<()> {
	let markers = FlagMarkers {
		off: "//-r".into(),
		..FlagMarkers::default()
	};
	let (output, changed) = run_rules(flag_rules(markers, None), "a //-r b", WHOLE)?;

	assert_eq!(output, "a //-r b");
	assert!(!changed);

	Ok(())
}

#[rstest]
fn include_copies_resolved_source(#[values(1, 4, WHOLE)] chunk_size: usize) -> StencilResult<()> {
	let providers: Vec<Box<dyn OperationProvider>> =
		vec![Box::new(Include::new("#include(", ")", resolve_fixture))];
	let (output, changed) = run_rules(providers, "a #include(header.txt) b", chunk_size)?;

	assert_eq!(output, "a HEADER b");
	assert!(changed);

	Ok(())
}

#[test]
fn include_of_missing_source_is_an_error() {
	let providers: Vec<Box<dyn OperationProvider>> =
		vec![Box::new(Include::new("#include(", ")", resolve_fixture))];
	let result = run_rules(providers, "#include(nope.txt)", WHOLE);

	let Err(StencilError::Include { path, .. }) = result else {
		panic!("expected an include error");
	};
	assert_eq!(path, "nope.txt");
}

#[test]
fn include_without_end_marker_is_an_error() {
	let providers: Vec<Box<dyn OperationProvider>> =
		vec![Box::new(Include::new("#include(", ")", resolve_fixture))];
	let result = run_rules(providers, "#include(header.txt", WHOLE);

	assert!(matches!(result, Err(StencilError::Include { .. })));
}

#[rstest]
fn expand_variables_replaces_references(#[values(1, WHOLE)] chunk_size: usize) -> StencilResult<()> {
	let variables = variables(&[("name", "app"), ("version", "1.2")]);
	let providers: Vec<Box<dyn OperationProvider>> = vec![Box::new(ExpandVariables::new(&variables, "$({0})"))];
	let (output, changed) =
		run_rules_with_variables(providers, variables, "$(name) v$(version) $(other)", chunk_size)?;

	assert_eq!(output, "app v1.2 $(other)");
	assert!(changed);

	Ok(())
}

#[test]
fn variables_child_shadows_parent() {
	let mut parent = VariableCollection::root();
	parent.set("a", 2);
	parent.set("b", 3);
	let mut child = VariableCollection::root();
	child.set("a", 1);
	let child = child.with_parent(parent);

	assert_eq!(child.get("a"), Some(&serde_json::json!(1)));
	assert_eq!(child.get("b"), Some(&serde_json::json!(3)));
	assert_eq!(child.get("c"), None);
	assert_eq!(child.keys(), vec!["a", "b"]);
}

#[test]
fn variables_attach_root_extends_chain() {
	let mut top = VariableCollection::root();
	top.set("top", true);
	let mut middle = VariableCollection::root();
	middle.set("middle", true);
	let mut bottom = VariableCollection::root();
	bottom.set("bottom", true);

	let mut chain = top.with_parent(middle);
	chain.attach_root(bottom);

	assert!(chain.contains_key("bottom"));
	assert!(chain.parent().and_then(VariableCollection::parent).is_some());
}

#[rstest]
#[case::bool_true("true", serde_json::json!(true))]
#[case::bool_upper("FALSE", serde_json::json!(false))]
#[case::null("null", serde_json::Value::Null)]
#[case::float("1.5", serde_json::json!(1.5))]
#[case::integer("42", serde_json::json!(42))]
#[case::hex("0x1F", serde_json::json!(31))]
#[case::quoted("\"quoted\"", serde_json::json!("quoted"))]
#[case::text("text", serde_json::json!("text"))]
fn literal_inference(#[case] literal: &str, #[case] expected: serde_json::Value) {
	assert_eq!(infer_literal(literal), expected);
}

const FULL_CONFIG: &str = r##"
chunk_size = 64
variable_format = "$({0})"
expand_variables = true

[parameters]
name = "MyApp"
debug = "false"

[variables]
order = ["environment", "user"]
environment = "env.{0}"
user = "{0}"

[replacements]
"APP_NAME" = "name"

[[regions]]
start = "#region-start"
end = "#region-end"
whole_line = true

[conditionals]
whole_line = true

[include]
start = "#include("
end = ")"

[flags.replacements]
on = "//+:replacements"
off = "//-:replacements"
default = true
"##;

#[test]
fn config_builds_rules_in_dispatch_order() -> StencilResult<()> {
	let spec = RunSpec::from_toml(FULL_CONFIG)?;
	let (providers, variables) = spec.build(Path::new("."))?;
	let kinds: Vec<_> = providers.iter().map(|provider| provider.kind()).collect();

	assert_eq!(spec.chunk_size(), 64);
	assert_eq!(
		kinds,
		vec!["include", "region", "conditional", "flag", "replacement", "expand_variables"]
	);
	assert_eq!(variables.get("name"), Some(&serde_json::json!("MyApp")));
	assert_eq!(variables.get("debug"), Some(&serde_json::json!(false)));

	Ok(())
}

#[test]
fn config_processor_applies_rules() -> StencilResult<()> {
	let spec = RunSpec::from_toml(FULL_CONFIG)?;
	let processor = spec.processor(Path::new("."))?;
	let input = "title: APP_NAME $(name)\n#if debug\ndebug build\n#else\nrelease build\n#endif\n//-:replacements\nAPP_NAME\n";
	let (output, changed) = run_processor(&processor, input, 5)?;

	assert_eq!(output, "title: MyApp MyApp\nrelease build\n//-:replacements\nAPP_NAME\n");
	assert!(changed);

	Ok(())
}

#[test]
fn config_include_resolves_relative_to_root() -> StencilResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::write(tmp.path().join("part.txt"), "included")?;
	let spec = RunSpec::from_toml("[include]\nstart = \"{{\"\nend = \"}}\"\n")?;
	let processor = spec.processor(tmp.path())?;
	let (output, _) = run_processor(&processor, "[{{ part.txt }}]", 2)?;

	assert_eq!(output, "[included]");

	Ok(())
}

#[test]
fn config_load_and_resolve_path() -> StencilResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	assert!(RunSpec::resolve_path(tmp.path()).is_none());

	std::fs::write(tmp.path().join(".stencil.toml"), "chunk_size = 3\n")?;
	let path = RunSpec::resolve_path(tmp.path()).unwrap_or_else(|| panic!("config not found"));
	let spec = RunSpec::load(&path)?;

	assert_eq!(spec.chunk_size(), 3);
	assert_eq!(spec.variable_format(), DEFAULT_VARIABLE_FORMAT);

	Ok(())
}

#[test]
fn config_parse_errors_are_reported() {
	let result = RunSpec::from_toml("replacements = [");
	assert!(matches!(result, Err(StencilError::ConfigParse(_))));
}

#[test]
fn config_rejects_unknown_variable_source() {
	let result = RunSpec::from_toml("[variables]\norder = [\"registry\"]\n").and_then(|spec| spec.build_variables());

	let Err(StencilError::UnknownVariableSource(source)) = result else {
		panic!("expected an unknown source error");
	};
	assert_eq!(source, "registry");
}

#[test]
fn config_rejects_unknown_replacement_parameter() {
	let result = RunSpec::from_toml("[replacements]\nTOKEN = \"absent\"\n").and_then(|spec| spec.build(Path::new(".")));

	assert!(matches!(result, Err(StencilError::UnknownParameter { .. })));
}

#[test]
fn config_fallback_format_shadows_primary_keys() -> StencilResult<()> {
	let spec = RunSpec::from_toml("[parameters]\nname = \"x\"\n[variables]\nfallback_format = \"p.{0}\"\n")?;
	let variables = spec.build_variables()?;

	assert_eq!(variables.get("name"), Some(&serde_json::json!("x")));
	assert_eq!(variables.get("p.name"), Some(&serde_json::json!("x")));
	assert_eq!(variables.keys(), vec!["p.name", "name"]);

	Ok(())
}
