//! Built-in probe definitions
//!
//! Each protocol is data: a list of steps with their payloads, terminators
//! and field patterns. Protocols that need per-run input take a typed config.

use serde::{Deserialize, Serialize};

use super::{ProbeDefinition, ProbeStep, StatusCheck};
use crate::frame::Terminator;

/// Numeric replies that end IRC registration: welcome, or a nick rejection
const IRC_REGISTRATION: &str = r"(?-u)(?:[^\n]*\n)*?:[^ \n]+ (?P<reply>001|43[1-6]|46[1-5]) [^\n]*\n(?:[^\n]*\n)*";

/// JOIN echo or one of the join failure numerics, in the command position
const IRC_JOIN: &str =
    r"(?-u)(?:[^\n]*\n)*?:[^ \n]+ (?P<join_reply>JOIN|403|405|471|473|474|475|476|477|479) [^\n]*\n(?:[^\n]*\n)*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    pub nick: String,
    pub user: String,
    pub channel: String,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            nick: "bot".to_string(),
            user: "bot".to_string(),
            channel: "#mychannel".to_string(),
        }
    }
}

/// rexec request: port, user, password and command, NUL separated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub request: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            request: "0\0guest\0guest\0id\0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngreslockConfig {
    /// Command to run once the shell prompt is seen
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistccdConfig {
    pub probe: String,
}

impl Default for DistccdConfig {
    fn default() -> Self {
        Self {
            probe: "HELO\n".to_string(),
        }
    }
}

/// Per-protocol settings, resolved before any scan starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    pub irc: IrcConfig,
    pub exec: ExecConfig,
    pub ingreslock: IngreslockConfig,
    pub distccd: DistccdConfig,
}

/// Java RMI registry; success only on status 1099
pub fn rmiregistry() -> crate::Result<ProbeDefinition> {
    let terminator = Terminator::new(r"(?-u)(?:.*\r?\n)*RMI Registry (?P<status_code>[0-9]+)\r?\n")?;

    Ok(ProbeDefinition::new("rmiregistry", 1099)
        .with_description("Read the RMI registry banner and check its status code")
        .with_step(ProbeStep::read("banner", terminator).with_status(StatusCheck::new("status_code", ["1099"]))))
}

pub fn ajp13() -> crate::Result<ProbeDefinition> {
    let terminator = Terminator::new(r"AJP/1\.3 (?P<version>\d+\.\d+)\r?\n")?;

    Ok(ProbeDefinition::new("ajp13", 8009)
        .with_description("Read the AJP13 banner")
        .with_step(ProbeStep::read("banner", terminator))
        .with_max_frame_size(1024))
}

/// Register with NICK/USER, then try to join the configured channel
pub fn irc(config: &IrcConfig) -> crate::Result<ProbeDefinition> {
    let register = format!("NICK {}\r\nUSER {} 0 * :{}\r\n", config.nick, config.user, config.user);
    let join = format!("JOIN {}\r\n", config.channel);

    let registration = ProbeStep::send("register", register, Terminator::new(IRC_REGISTRATION)?)
        .with_field("nick", r"(?m)^:\S+ 001 (\S+)")?
        .with_status(StatusCheck::new("reply", ["001"]));

    let joining = ProbeStep::send("join", join, Terminator::new(IRC_JOIN)?)
        .with_field("join_channel", r"(?m)^:\S+ JOIN :?([#&][^\s,]+)")?
        .with_status(StatusCheck::new("join_reply", ["JOIN"]))
        .with_flag("joined");

    Ok(ProbeDefinition::new("irc", 6667)
        .with_description("Register with an IRC server and join a channel")
        .with_step(registration)
        .with_step(joining)
        .with_max_frame_size(16 * 1024))
}

pub fn exec(config: &ExecConfig) -> crate::Result<ProbeDefinition> {
    let mut request = config.request.clone().into_bytes();
    request.push(b'\n');

    let step = ProbeStep::send("request", request, Terminator::new(r"(?s-u)\x00[^\n]*\n|.*\n")?)
        .with_field("service", r"Service: ([^\s]+)")?
        .with_field("version", r"Version: ([^\s]+)")?;

    Ok(ProbeDefinition::new("exec", 512)
        .with_description("Send a rexec request and read the reply")
        .with_step(step)
        .with_max_frame_size(4096))
}

/// Portmapper; any bytes count as a banner
pub fn rpcbind() -> crate::Result<ProbeDefinition> {
    Ok(ProbeDefinition::new("rpcbind", 111)
        .with_description("Read whatever the portmapper sends on connect")
        .with_step(ProbeStep::read("banner", Terminator::any()?))
        .with_max_frame_size(4096))
}

/// Bound shell on 1524; optionally runs one command after the prompt
pub fn ingreslock(config: &IngreslockConfig) -> crate::Result<ProbeDefinition> {
    let prompt = r"(?s-u).*(?:[#$] |\n)";

    let mut definition = ProbeDefinition::new("ingreslock", 1524)
        .with_description("Read the ingreslock banner or shell prompt")
        .with_step(ProbeStep::read("banner", Terminator::new(prompt)?).with_field("prompt", r"([#$]) ?$")?)
        .with_max_frame_size(4096);

    if let Some(command) = &config.command {
        let step = ProbeStep::send("command", format!("{}\n", command), Terminator::new(prompt)?)
            .with_field("uid", r"uid=(\d+)")?
            .with_flag("command_executed");
        definition = definition.with_step(step);
    }

    Ok(definition)
}

pub fn distccd(config: &DistccdConfig) -> crate::Result<ProbeDefinition> {
    let step = ProbeStep::send("probe", config.probe.clone(), Terminator::line()?)
        .with_field("service", r"(distccd)")?
        .with_field("version", r"(?m)distccd.*version ([\d.]+)")?;

    Ok(ProbeDefinition::new("distccd", 3632)
        .with_description("Probe a distcc daemon for its name and version")
        .with_step(step)
        .with_max_frame_size(1024))
}

/// Every built-in, configured from `settings`
pub fn all(settings: &ProtocolSettings) -> crate::Result<Vec<ProbeDefinition>> {
    Ok(vec![
        rmiregistry()?,
        ajp13()?,
        irc(&settings.irc)?,
        exec(&settings.exec)?,
        rpcbind()?,
        ingreslock(&settings.ingreslock)?,
        distccd(&settings.distccd)?,
    ])
}
