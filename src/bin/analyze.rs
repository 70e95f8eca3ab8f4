//! Minimal CLI front end.
//!
//! Builds one of a small set of named built-in scenarios and prints an
//! `AnalysisSummary` as JSON. The full source-language front end (parsing,
//! scope tracking, DOT emission) is out of scope for this crate; this binary
//! only exercises the engine end to end against the scenarios the test suite
//! already knows about.

#![forbid(unsafe_code)]

use std::env;

use opsemcheck::config::EngineConfig;
use opsemcheck::driver::{self, analyze};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let scenario = parse_flag(&args, "--scenario").unwrap_or_else(|| "s1".to_string());
    let fail_fast = args.iter().any(|a| a == "--fail-fast");

    let mut config = EngineConfig::default();
    if fail_fast {
        config = config.fail_fast();
    }

    let summary = match scenario.as_str() {
        "s1" => analyze("s1-sequential-assignment", &driver::scenario_s1_sequential_assignment(), &config),
        "s2" => analyze("s2-message-passing", &driver::scenario_s2_message_passing(), &config),
        "s3" => analyze("s3-causal-loop-trigger", &driver::scenario_s3_causal_loop_trigger(), &config),
        "s4" => analyze("s4-hidden-visible-side-effect", &driver::scenario_s4_hidden_visible_side_effect(), &config),
        "s5" => analyze("s5-release-sequence-break", &driver::scenario_s5_release_sequence_break(), &config),
        "conditional-write" => analyze("conditional-write", &driver::scenario_conditional_write(), &config),
        other => anyhow::bail!("unknown scenario {other:?}; expected one of s1..s5 or conditional-write"),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
