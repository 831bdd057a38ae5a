//! # lionsync CLI
//!
//! Command-line utilities for inspecting, converting and replaying recorded
//! delta protocol messages.

use anyhow::{Context, Result};
use lionsync_core::{FixedParticipation, ParticipationIdProvider};
use lionsync_proto::DeltaMessage;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod config;
mod replay;
mod wire;

use config::CliConfig;
use replay::Replayer;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let config = CliConfig::from_env()?;

    match args[1].as_str() {
        "inspect" => {
            let Some(input) = args.get(2) else {
                usage("lionsync inspect <messages>");
            };
            let messages = wire::read(Path::new(input), config.format)?;
            inspect(&messages);
        }
        "convert" => {
            let (Some(input), Some(output)) = (args.get(2), args.get(3)) else {
                usage("lionsync convert <input> <output>");
            };
            let messages = wire::read(Path::new(input), config.format)?;
            wire::write(Path::new(output), config.format, &messages)?;
            tracing::info!(count = messages.len(), %input, %output, "Converted messages");
        }
        "replay" => {
            let Some(input) = args.get(2) else {
                usage("lionsync replay <messages> [partitions.json]");
            };
            run_replay(&config, Path::new(input), args.get(3).map(Path::new))?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn usage(line: &str) -> ! {
    eprintln!("Usage: {line}");
    std::process::exit(1);
}

fn inspect(messages: &[DeltaMessage]) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (index, message) in messages.iter().enumerate() {
        let category = message.category();
        *counts.entry(category.to_string()).or_default() += 1;
        println!(
            "{index:>5}  {:<16} {:<48} {}",
            category.as_str(),
            message.kind(),
            detail(message)
        );
    }
    println!();
    for (category, count) in &counts {
        println!("{category:<16} {count}");
    }
}

fn detail(message: &DeltaMessage) -> String {
    match message {
        DeltaMessage::Command(command) => command
            .command_ids()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        DeltaMessage::Event(event) => {
            let origins = event
                .event
                .parts()
                .iter()
                .flat_map(|part| part.origin_commands.iter().map(ToString::to_string))
                .collect::<Vec<_>>()
                .join(",");
            format!("#{} {origins}", event.sequence_number)
        }
        DeltaMessage::QueryRequest(request) => request.query_id.to_string(),
        DeltaMessage::QueryResponse(response) => response.query_id.to_string(),
        DeltaMessage::CommandResponse(response) => response.command_id.to_string(),
        DeltaMessage::Error(error) => error.error_code.clone(),
    }
}

fn run_replay(config: &CliConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    if config.languages.is_empty() {
        anyhow::bail!("replay needs language definitions; set LIONSYNC_LANGUAGES");
    }
    let types = replay::load_languages(&config.languages)?;
    let participation = config
        .participation_id
        .clone()
        .map_or_else(FixedParticipation::random, FixedParticipation::new)
        .participation_id();
    tracing::info!(
        %participation,
        enforce_sequence = config.enforce_sequence,
        "Replaying messages"
    );

    let messages = wire::read(input, config.format)?;
    let mut replayer = Replayer::new(types, participation, config.enforce_sequence);
    let summary = replayer.replay(&messages)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to encode replay summary")?
    );

    if let Some(output) = output {
        let partitions = replayer.partitions()?;
        let json =
            serde_json::to_string_pretty(&partitions).context("Failed to encode partitions")?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tracing::info!(count = partitions.len(), output = %output.display(), "Wrote partitions");
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"lionsync CLI

USAGE:
    lionsync <COMMAND> [OPTIONS]

COMMANDS:
    inspect <messages>                List recorded messages with their category and kind
    convert <input> <output>          Re-encode a message file (.json lines or .cbor)
    replay <messages> [output.json]   Apply commands and events to an empty forest
    help                              Show this help message

ENVIRONMENT:
    LIONSYNC_FORMAT              json or cbor, for files without a known extension
    LIONSYNC_LANGUAGES           language definition files used by replay
    LIONSYNC_PARTICIPATION_ID    participation replayed commands are attributed to
    LIONSYNC_ENFORCE_SEQUENCE    drop duplicate events and stop at gaps (default true)
    RUST_LOG                     log filter (default info)

EXAMPLES:
    lionsync inspect session.jsonl
    lionsync convert session.jsonl session.cbor
    LIONSYNC_LANGUAGES=library.json lionsync replay session.jsonl partitions.json
"#
    );
}
