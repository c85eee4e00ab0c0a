// ABOUTME: Reads StarCraft: Remastered replay files far enough to summarize a game.
// ABOUTME: Splits the file into its sections, inflates them, and pulls out duration, start time, and chat.

mod frames;
mod game_info;

use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use nom::IResult;
use nom::bytes::complete::take;
use nom::multi::{count, length_data};
use nom::number::complete::le_u32;
use nom::sequence::tuple;
use thiserror::Error;

use frames::{Command, Frame};
use game_info::GameInfo;

/// Game time covered by one logic frame on fastest speed.
pub const FRAME_MS: u64 = 42;

const REMASTERED_MAGIC: &str = "seRS";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay is truncated in the {0} section")]
    Truncated(&'static str),

    #[error("unsupported replay format {0:?} (only Remastered replays are read)")]
    UnsupportedVersion(String),

    #[error("invalid replay data: {0}")]
    InvalidData(String),

    #[error("could not read replay {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn truncated<E>(section: &'static str) -> impl FnOnce(E) -> ReplayError {
    move |_| ReplayError::Truncated(section)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_name: String,
    pub message: String,
    pub timestamp_ms: u64,
}

/// A parsed replay.
#[derive(Debug, Clone)]
pub struct Replay {
    pub game: GameInfo,
    pub frames: Vec<Frame>,
}

impl Replay {
    pub fn parse(bytes: &[u8]) -> Result<Self, ReplayError> {
        let (rest, (_crc, chunks, size, magic, _remaining)) = header(bytes).map_err(truncated("header"))?;
        if chunks != 1 || size != 4 {
            return Err(ReplayError::InvalidData(format!(
                "replay id section has {chunks} chunks of {size} bytes, expected 1 of 4"
            )));
        }
        let magic = String::from_utf8_lossy(magic);
        if magic != REMASTERED_MAGIC {
            return Err(ReplayError::UnsupportedVersion(magic.into_owned()));
        }

        let (rest, info_chunks) = section(rest).map_err(truncated("game info"))?;
        let [info] = info_chunks.as_slice() else {
            return Err(ReplayError::InvalidData(format!(
                "game info has {} chunks, expected 1",
                info_chunks.len()
            )));
        };
        let game = GameInfo::parse(&inflate(info))?;

        // Section size table, not needed to walk the rest.
        let (rest, _) = section(rest).map_err(truncated("section sizes"))?;

        let (_, command_chunks) = section(rest).map_err(truncated("commands"))?;
        let mut commands = Vec::new();
        for chunk in command_chunks {
            commands.extend_from_slice(&inflate(chunk));
        }
        let frames = frames::parse_frames(&commands);

        Ok(Self { game, frames })
    }

    pub async fn read(path: &Path) -> Result<Self, ReplayError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes)
    }

    pub fn duration_ms(&self) -> u64 {
        u64::from(self.game.frames) * FRAME_MS
    }

    pub fn start_time_ms(&self) -> u64 {
        u64::from(self.game.start_time) * 1000
    }

    /// Commands per minute of game time issued by `player_id`.
    pub fn actions_per_minute(&self, player_id: u8) -> u64 {
        let duration_ms = self.duration_ms();
        if duration_ms == 0 {
            return 0;
        }
        let actions = self
            .frames
            .iter()
            .flat_map(|frame| &frame.commands)
            .filter(|command| command.player_id == player_id && command.kind != frames::CHAT)
            .count() as u64;
        actions * 60_000 / duration_ms
    }

    /// Non-empty chat lines in the order they were sent.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.frames
            .iter()
            .flat_map(|frame| frame.commands.iter().map(move |command| (frame.number, command)))
            .filter_map(|(frame, command)| self.chat_message(frame, command))
            .collect()
    }

    fn chat_message(&self, frame: u32, command: &Command) -> Option<ChatMessage> {
        if command.kind != frames::CHAT || command.data.len() < 81 {
            return None;
        }
        let sender_id = command.data[0];
        let text = &command.data[1..81];
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let message = String::from_utf8_lossy(&text[..end]).trim().to_string();
        if message.is_empty() {
            return None;
        }
        Some(ChatMessage {
            sender_name: self.game.player_name(sender_id),
            message,
            timestamp_ms: u64::from(frame) * FRAME_MS,
        })
    }
}

fn header(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, &[u8], u32)> {
    tuple((le_u32, le_u32, le_u32, take(4usize), le_u32))(input)
}

/// CRC, chunk count, then that many length-prefixed chunks.
fn section(input: &[u8]) -> IResult<&[u8], Vec<&[u8]>> {
    let (input, _crc) = le_u32(input)?;
    let (input, chunks) = le_u32(input)?;
    count(length_data(le_u32), chunks as usize)(input)
}

/// Chunks are zlib streams; one that does not inflate is taken as stored.
fn inflate(chunk: &[u8]) -> Cow<'_, [u8]> {
    let mut out = Vec::new();
    match ZlibDecoder::new(chunk).read_to_end(&mut out) {
        Ok(_) => Cow::Owned(out),
        Err(_) => Cow::Borrowed(chunk),
    }
}

/// Builders for small synthetic replays.
#[cfg(test)]
pub(crate) mod fixture {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    fn padded(text: &str, len: usize) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, 0);
        bytes
    }

    /// Game info block. Players are `(slot, name, race)`; the first one hosts.
    pub fn game_info(frames: u32, start_time: u32, players: &[(u16, &str, u8)]) -> Vec<u8> {
        let mut b = vec![0u8];
        b.extend(frames.to_le_bytes());
        b.extend([0u8; 3]);
        b.extend(start_time.to_le_bytes());
        b.extend([0u8; 12]);
        b.extend(padded("Ladder Game", 28));
        b.extend([0u8; 20]);
        b.extend(padded(players.first().map_or("", |p| p.1), 24));
        b.push(0);
        b.extend(padded("Polypoid", 26));
        b.extend([0u8; 38]);
        for slot in 0..12 {
            let (slot_id, name, race) = players.get(slot).copied().unwrap_or((0xffff, "", 0));
            b.extend(slot_id.to_le_bytes());
            b.extend([0u8; 2]);
            b.push(slot as u8);
            b.extend([0u8; 3]);
            b.push(if name.is_empty() { 0 } else { 2 });
            b.push(race);
            b.push(0);
            b.extend(padded(name, 25));
        }
        b.extend([0u8; 32]);
        b
    }

    /// Chat command bytes: player, kind, sender, 80 byte message.
    pub fn chat(sender: u8, text: &str) -> Vec<u8> {
        let mut b = vec![sender, super::frames::CHAT, sender];
        b.extend(padded(text, 80));
        b
    }

    pub fn frame(number: u32, commands: &[Vec<u8>]) -> Vec<u8> {
        let block: Vec<u8> = commands.concat();
        let mut b = number.to_le_bytes().to_vec();
        b.push(block.len() as u8);
        b.extend(block);
        b
    }

    pub fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub fn section(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut b = 0u32.to_le_bytes().to_vec();
        b.extend((chunks.len() as u32).to_le_bytes());
        for chunk in chunks {
            b.extend((chunk.len() as u32).to_le_bytes());
            b.extend(chunk);
        }
        b
    }

    /// A whole replay file with the given magic around prepared section chunks.
    pub fn replay_with(magic: &[u8; 4], game_info: Vec<u8>, commands: Vec<u8>) -> Vec<u8> {
        let mut b = Vec::new();
        for field in [0u32, 1, 4] {
            b.extend(field.to_le_bytes());
        }
        b.extend(magic);
        b.extend(0u32.to_le_bytes());
        b.extend(section(&[game_info]));
        b.extend(section(&[vec![0u8; 4]]));
        b.extend(section(&[commands]));
        b
    }

    /// 1000 frames starting at 1_700_000_000, Flash vs Jaedong, three chat lines one of them blank.
    pub fn ladder_replay() -> Vec<u8> {
        let info = game_info(1000, 1_700_000_000, &[(0, "Flash", 1), (1, "Jaedong", 0)]);
        let mut commands = frame(0, &[vec![0, 0x18], vec![1, 0x20, 5]]);
        commands.extend(frame(100, &[chat(0, "gl hf")]));
        commands.extend(frame(240, &[vec![1, 0x18], chat(7, "  gg  ")]));
        commands.extend(frame(300, &[chat(1, "")]));
        replay_with(b"seRS", zlib(&info), zlib(&commands))
    }
}
