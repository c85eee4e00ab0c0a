// ABOUTME: Decodes the fixed-layout game info block of a replay: timing, names, and the twelve player slots.
// ABOUTME: Offsets follow the Remastered layout; fields nothing reads are skipped, not kept.

use std::fmt;

use nom::IResult;
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::{le_i8, le_u8, le_u16, le_u32};

use super::{ReplayError, truncated};

const PLAYER_SLOTS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    Zerg,
    Terran,
    Protoss,
    Unknown(u8),
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Race::Zerg => f.write_str("Zerg"),
            Race::Terran => f.write_str("Terran"),
            Race::Protoss => f.write_str("Protoss"),
            Race::Unknown(code) => write!(f, "race {code}"),
        }
    }
}

impl From<u8> for Race {
    fn from(value: u8) -> Self {
        match value {
            0 => Race::Zerg,
            1 => Race::Terran,
            2 => Race::Protoss,
            other => Race::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayPlayer {
    pub slot_id: u16,
    pub id: u8,
    pub race: Race,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct GameInfo {
    /// Length of the game in logic frames.
    pub frames: u32,
    /// Seconds since the Unix epoch.
    pub start_time: u32,
    pub title: String,
    pub host: String,
    pub map: String,
    pub players: Vec<ReplayPlayer>,
}

impl GameInfo {
    pub fn parse(data: &[u8]) -> Result<Self, ReplayError> {
        game_info(data).map(|(_, info)| info).map_err(truncated("game info"))
    }

    /// Occupied slots.
    pub fn participants(&self) -> impl Iterator<Item = &ReplayPlayer> {
        self.players.iter().filter(|p| !p.name.is_empty())
    }

    /// Name for a chat sender, falling back to its slot number.
    pub fn player_name(&self, slot_id: u8) -> String {
        self.players
            .iter()
            .find(|p| p.slot_id == u16::from(slot_id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Player {slot_id}"))
    }
}

fn game_info(input: &[u8]) -> IResult<&[u8], GameInfo> {
    let (input, _engine) = le_i8(input)?;
    let (input, frames) = le_u32(input)?;
    let (input, _) = take(3usize)(input)?;
    let (input, start_time) = le_u32(input)?;
    let (input, _) = take(12usize)(input)?;
    let (input, title) = fixed_str(28)(input)?;
    // Map size, slot count, speed, game type and sub type.
    let (input, _) = take(20usize)(input)?;
    let (input, host) = fixed_str(24)(input)?;
    let (input, _) = take(1usize)(input)?;
    let (input, map_name) = fixed_str(26)(input)?;
    let (input, _) = take(38usize)(input)?;
    let (input, players) = count(player, PLAYER_SLOTS)(input)?;

    Ok((
        input,
        GameInfo {
            frames,
            start_time,
            title,
            host,
            map: map_name,
            players,
        },
    ))
}

fn player(input: &[u8]) -> IResult<&[u8], ReplayPlayer> {
    let (input, slot_id) = le_u16(input)?;
    let (input, _) = take(2usize)(input)?;
    let (input, id) = le_u8(input)?;
    let (input, _) = take(3usize)(input)?;
    let (input, _kind) = le_u8(input)?;
    let (input, race) = map(le_u8, Race::from)(input)?;
    let (input, _team) = le_u8(input)?;
    let (input, name) = fixed_str(25)(input)?;

    Ok((
        input,
        ReplayPlayer {
            slot_id,
            id,
            race,
            name,
        },
    ))
}

/// A NUL-padded string field of `len` bytes.
fn fixed_str(len: usize) -> impl Fn(&[u8]) -> IResult<&[u8], String> {
    move |input| map(take(len), until_nul)(input)
}

fn until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
