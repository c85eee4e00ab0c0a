// ABOUTME: Line commands accepted on stdin by the companion binary.
// ABOUTME: Parses a line into a Command and runs it against the AppContext, returning the text to print.

use std::path::PathBuf;

use cwal_scr::ScrEvent;

use crate::client::{ClientStatus, ScrClientFactory};
use crate::context::AppContext;
use crate::download::{self, DownloadKind};
use crate::host::{PathResolver, TextFiles};
use crate::replay::Replay;
use crate::settings::SettingsPatch;

pub const HELP: &str = "\
commands:
  show                                 current settings
  status                               store and SC:R client state
  defaults                             what reset would restore
  replay-path <path>                   set the replay download folder
  map-path <path>                      set the map download folder
  set <json>                           merge fields, e.g. {\"mapDownloadPath\": \"/maps\"}
  reset                                restore defaults
  port <n> | down                      SC:R web server came up / went away
  event <json>                         feed an SC:R event, e.g. {\"WebServerRunning\":{\"port\":57421}}
  gateways                             list gateways from the SC:R web API
  download replay|map <url> <file>     download into the configured folder
  download-replay <url> <file>         download a replay and summarize it
  replay <path>                        summarize a replay file on disk
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Show,
    Status,
    Defaults,
    ReplayPath(String),
    MapPath(String),
    Set(SettingsPatch),
    Reset,
    Port(Option<u16>),
    Event(ScrEvent),
    Gateways,
    Download {
        kind: DownloadKind,
        url: String,
        file_name: String,
    },
    DownloadReplay {
        url: String,
        file_name: String,
    },
    ReplayInfo(PathBuf),
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "help" | "?" => Command::Help,
        "show" => Command::Show,
        "status" => Command::Status,
        "defaults" => Command::Defaults,
        "replay-path" => Command::ReplayPath(required(word, rest)?.to_string()),
        "map-path" => Command::MapPath(required(word, rest)?.to_string()),
        "set" => {
            let patch: SettingsPatch = serde_json::from_str(required(word, rest)?)
                .map_err(|e| format!("set: invalid settings JSON: {e}"))?;
            if patch.is_empty() {
                return Err("set: no recognized fields (replayDownloadPath, mapDownloadPath)".to_string());
            }
            Command::Set(patch)
        }
        "reset" => Command::Reset,
        "port" => {
            let port = required(word, rest)?
                .parse()
                .map_err(|e| format!("port: {e}"))?;
            Command::Port(Some(port))
        }
        "down" => Command::Port(None),
        "event" => {
            let event = serde_json::from_str(required(word, rest)?)
                .map_err(|e| format!("event: invalid SC:R event: {e}"))?;
            Command::Event(event)
        }
        "gateways" => Command::Gateways,
        "download" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(kind), Some(url), Some(file_name), None) => Command::Download {
                    kind: kind.parse()?,
                    url: url.to_string(),
                    file_name: file_name.to_string(),
                },
                _ => return Err("usage: download replay|map <url> <file>".to_string()),
            }
        }
        "download-replay" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(url), Some(file_name), None) => Command::DownloadReplay {
                    url: url.to_string(),
                    file_name: file_name.to_string(),
                },
                _ => return Err("usage: download-replay <url> <file>".to_string()),
            }
        }
        "replay" => Command::ReplayInfo(PathBuf::from(required(word, rest)?)),
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command {other:?} (try help)")),
    };
    Ok(Some(command))
}

fn required<'a>(word: &str, rest: &'a str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("{word}: missing argument"))
    } else {
        Ok(rest)
    }
}

/// Run a command and describe the outcome.
pub async fn execute<H>(
    ctx: &AppContext<H, ScrClientFactory>,
    http: &reqwest::Client,
    command: Command,
) -> String
where
    H: PathResolver + TextFiles + 'static,
{
    let store = ctx.settings();
    match command {
        Command::Help => HELP.to_string(),
        Command::Show => describe(&store.settings()),
        Command::Status => status(ctx),
        Command::Defaults => describe(&store.resolved_defaults().await),
        Command::ReplayPath(path) => {
            store.update_replay_path(path).await;
            describe(&store.settings())
        }
        Command::MapPath(path) => {
            store.update_map_path(path).await;
            describe(&store.settings())
        }
        Command::Set(patch) => {
            store.update_settings(patch).await;
            describe(&store.settings())
        }
        Command::Reset => {
            store.reset_to_defaults().await;
            describe(&store.settings())
        }
        Command::Port(port) => {
            ctx.ports().publish(port);
            match port {
                Some(port) => format!("web server port set to {port}"),
                None => "web server marked down".to_string(),
            }
        }
        Command::Event(event) => {
            if ctx.ports().apply(&event) {
                format!("port signal updated from {event:?}")
            } else {
                format!("ignored {event:?}")
            }
        }
        Command::Gateways => gateways(ctx).await,
        Command::Download { kind, url, file_name } => {
            let destination = kind.destination(&store.settings());
            match download::download_file(http, &url, &destination, &file_name).await {
                Ok(path) => format!("saved {}", path.display()),
                Err(e) => format!("download failed: {e}"),
            }
        }
        Command::DownloadReplay { url, file_name } => {
            let destination = DownloadKind::Replay.destination(&store.settings());
            let path = match download::download_file(http, &url, &destination, &file_name).await {
                Ok(path) => path,
                Err(e) => return format!("download failed: {e}"),
            };
            match Replay::read(&path).await {
                Ok(replay) => format!("saved {}\n{}", path.display(), summarize(&replay)),
                Err(e) => format!("saved {} but could not read it as a replay: {e}", path.display()),
            }
        }
        Command::ReplayInfo(path) => match Replay::read(&path).await {
            Ok(replay) => summarize(&replay),
            Err(e) => format!("{e}"),
        },
        Command::Quit => String::new(),
    }
}

fn summarize(replay: &Replay) -> String {
    let game = &replay.game;
    let mut lines = vec![
        format!("game: {} on {} hosted by {}", game.title, game.map, game.host),
        format!(
            "duration: {} ({} ms)",
            clock(replay.duration_ms()),
            replay.duration_ms()
        ),
        format!("started: {} ms since epoch", replay.start_time_ms()),
    ];
    for player in game.participants() {
        lines.push(format!(
            "player: {} ({}) {} APM",
            player.name,
            player.race,
            replay.actions_per_minute(player.id)
        ));
    }
    let chat = replay.chat_messages();
    if chat.is_empty() {
        lines.push("chat: none".to_string());
    } else {
        lines.push("chat:".to_string());
        for line in chat {
            lines.push(format!(
                "  [{}] {}: {}",
                clock(line.timestamp_ms),
                line.sender_name,
                line.message
            ));
        }
    }
    lines.join("\n")
}

/// `m:ss` game clock.
fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn status<H>(ctx: &AppContext<H, ScrClientFactory>) -> String
where
    H: PathResolver + TextFiles + 'static,
{
    let store = ctx.settings();
    let file = store
        .settings_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none (memory only)".to_string());
    let client = match ctx.clients().current_handle() {
        None => "no web server".to_string(),
        Some(handle) => match handle.status() {
            ClientStatus::Connecting => format!("connecting to port {}", handle.port()),
            ClientStatus::Ready(_) => format!("ready on port {}", handle.port()),
            ClientStatus::Failed(e) => format!("port {} unusable: {e}", handle.port()),
        },
    };
    format!(
        "initialized: {}\nsettings file: {file}\nsaving replay path: {}\nsaving map path: {}\nSC:R client: {client}",
        store.is_initialized(),
        store.is_saving_replay_path(),
        store.is_saving_map_path(),
    )
}

async fn gateways<H>(ctx: &AppContext<H, ScrClientFactory>) -> String
where
    H: PathResolver + TextFiles + 'static,
{
    let Some(handle) = ctx.clients().current_handle() else {
        return "SC:R web API unavailable: no web server port known".to_string();
    };
    let api = match handle.client().await {
        Ok(api) => api,
        Err(e) => return format!("SC:R web API unavailable: {e}"),
    };
    match api.gateways().await {
        Ok(gateways) => gateways
            .iter()
            .map(|g| format!("{:>4}  {}", g.id, g.name))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => format!("SC:R web API request failed: {e}"),
    }
}

fn describe(settings: &crate::settings::Settings) -> String {
    format!(
        "replayDownloadPath: {}\nmapDownloadPath: {}",
        settings.replay_download_path, settings.map_download_path
    )
}
