//! Command line for replaying a chat log through the gateway.
//!
//! Every line of the log is one of:
//!
//! ```text
//! [rolebond] 11|Kaede Ito|Owner      received relationship message
//! > propose Kaede Ito|Pet            local action
//! > accept Kaede Ito
//! > decline Kaede Ito
//! > end Kaede Ito
//! > lock Kaede Ito|0|1h30m
//! anything else                      ignored chat
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::{lean::RoleLean, message::MessageCodec};

const LOCAL_PREFIX: char = '>';

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Display name of the local player, sent in outbound lines
    #[arg(short = 'n', long, default_value = "You")]
    pub name: String,

    /// Whitelisted partner display name (repeatable)
    #[arg(short = 'p', long = "partner", required = true)]
    pub partners: Vec<String>,

    /// Chat log to replay
    #[arg(short = 'l', long)]
    pub log: PathBuf,

    /// Hardcore settings file, loaded before and saved after the replay
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    /// Protocol config file; falls back to $ROLEBOND_CONFIG, then defaults
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CliError {
    #[error("Unknown local command: {0}")]
    UnknownCommand(String),
    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("Invalid lock layer: {0}")]
    InvalidLayer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayLine {
    Inbound(String),
    Propose { partner: String, lean: RoleLean },
    Accept(String),
    Decline(String),
    End(String),
    Lock {
        partner: String,
        layer: usize,
        duration: String,
    },
    Chat,
}

pub fn parse_line(line: &str, codec: &MessageCodec) -> Result<ReplayLine, CliError> {
    let line = line.trim();
    if codec.is_tagged(line) {
        return Ok(ReplayLine::Inbound(line.to_string()));
    }
    let Some(command) = line.strip_prefix(LOCAL_PREFIX) else {
        return Ok(ReplayLine::Chat);
    };

    let command = command.trim();
    let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
    let mut args = rest.split('|').map(str::trim);
    let partner = args
        .next()
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or(CliError::MissingArgument("partner"))?;

    match verb {
        "propose" => {
            let lean = args.next().ok_or(CliError::MissingArgument("lean"))?;
            Ok(ReplayLine::Propose {
                partner,
                lean: RoleLean::from_lean_str(lean),
            })
        }
        "accept" => Ok(ReplayLine::Accept(partner)),
        "decline" => Ok(ReplayLine::Decline(partner)),
        "end" => Ok(ReplayLine::End(partner)),
        "lock" => {
            let layer = args.next().ok_or(CliError::MissingArgument("layer"))?;
            let layer = layer
                .parse()
                .map_err(|_| CliError::InvalidLayer(layer.to_string()))?;
            let duration = args.next().ok_or(CliError::MissingArgument("duration"))?;
            Ok(ReplayLine::Lock {
                partner,
                layer,
                duration: duration.to_string(),
            })
        }
        other => Err(CliError::UnknownCommand(other.to_string())),
    }
}
