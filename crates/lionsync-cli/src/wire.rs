//! Reading and writing message files.

use crate::config::WireFormat;
use anyhow::{Context, Result};
use lionsync_proto::DeltaMessage;
use std::fs;
use std::path::Path;

/// Decode all messages of a file.
pub fn decode(bytes: &[u8], format: WireFormat) -> Result<Vec<DeltaMessage>> {
    match format {
        WireFormat::Json => {
            let text = std::str::from_utf8(bytes).context("JSON message file is not UTF-8")?;
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    DeltaMessage::from_json(line).with_context(|| format!("line {}", n + 1))
                })
                .collect()
        }
        WireFormat::Cbor => ciborium::from_reader(bytes).context("Invalid CBOR message array"),
    }
}

/// Encode messages for a file.
pub fn encode(messages: &[DeltaMessage], format: WireFormat) -> Result<Vec<u8>> {
    match format {
        WireFormat::Json => {
            let mut out = String::new();
            for message in messages {
                let json = message
                    .to_json()
                    .with_context(|| format!("encoding {}", message.kind()))?;
                out.push_str(&json);
                out.push('\n');
            }
            Ok(out.into_bytes())
        }
        WireFormat::Cbor => {
            let mut out = Vec::new();
            ciborium::into_writer(messages, &mut out)
                .context("Failed to encode CBOR message array")?;
            Ok(out)
        }
    }
}

/// Read a message file; the extension decides the format, `fallback` otherwise.
pub fn read(path: &Path, fallback: WireFormat) -> Result<Vec<DeltaMessage>> {
    let format = WireFormat::from_path(path).unwrap_or(fallback);
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    decode(&bytes, format)
        .with_context(|| format!("Failed to decode {} as {format}", path.display()))
}

/// Write a message file; the extension decides the format, `fallback` otherwise.
pub fn write(path: &Path, fallback: WireFormat, messages: &[DeltaMessage]) -> Result<()> {
    let format = WireFormat::from_path(path).unwrap_or(fallback);
    let bytes = encode(messages, format)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lionsync_proto::{CommandKind, CommandResponse, DeltaCommand, SingleCommand};

    fn sample() -> Vec<DeltaMessage> {
        vec![
            DeltaCommand::from(SingleCommand::new(
                "c1",
                CommandKind::DeletePartition {
                    deleted_partition: "p".into(),
                },
            ))
            .into(),
            CommandResponse::new("c1").into(),
        ]
    }

    #[test]
    fn json_lines_skip_blank_lines() {
        let mut bytes = encode(&sample(), WireFormat::Json).unwrap();
        bytes.extend_from_slice(b"\n   \n");

        assert_eq!(decode(&bytes, WireFormat::Json).unwrap(), sample());
    }

    #[test]
    fn cbor_array_decodes_to_same_messages() {
        let bytes = encode(&sample(), WireFormat::Cbor).unwrap();
        assert_eq!(decode(&bytes, WireFormat::Cbor).unwrap(), sample());
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let error = decode(b"\n{\"type\":\"nope\"}\n", WireFormat::Json).unwrap_err();
        assert!(format!("{error:#}").contains("line 2"));
    }
}
