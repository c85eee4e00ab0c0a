// ABOUTME: Walks the command stream of a replay: frames of length-prefixed blocks holding player commands.
// ABOUTME: Stops quietly at the first undecodable frame; everything before it is kept.

use nom::IResult;
use nom::bytes::complete::take;
use nom::multi::{length_data, many0};
use nom::number::complete::{le_u8, le_u32};

/// In-game chat: sender slot followed by an 80 byte NUL-padded message.
pub const CHAT: u8 = 0x5c;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub number: u32,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub player_id: u8,
    pub kind: u8,
    pub data: Vec<u8>,
}

pub fn parse_frames(data: &[u8]) -> Vec<Frame> {
    match many0(frame)(data) {
        Ok((rest, frames)) => {
            if !rest.is_empty() {
                tracing::debug!("Ignoring {} undecodable command bytes", rest.len());
            }
            frames
        }
        Err(e) => {
            tracing::debug!("Command stream unreadable: {e}");
            Vec::new()
        }
    }
}

fn frame(input: &[u8]) -> IResult<&[u8], Frame> {
    let (input, number) = le_u32(input)?;
    let (input, block) = length_data(le_u8)(input)?;
    // A command cut off inside the block ends the block.
    let (_, commands) = many0(command)(block)?;
    Ok((input, Frame { number, commands }))
}

fn command(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, player_id) = le_u8(input)?;
    let (input, kind) = le_u8(input)?;
    let (input, data) = take(payload_len(kind, input.len()))(input)?;
    Ok((
        input,
        Command {
            player_id,
            kind,
            data: data.to_vec(),
        },
    ))
}

/// Payload size following the command byte.
fn payload_len(kind: u8, available: usize) -> usize {
    match kind {
        0x08 | 0x10 | 0x11 | 0x18 | 0x19 | 0x1b | 0x1c | 0x1d | 0x27 | 0x2a | 0x2e | 0x31 | 0x33 | 0x34
        | 0x36 | 0x38 | 0x39 | 0x3c | 0x54 | 0x5a | 0x5b => 0,
        0x0f | 0x20 | 0x21 | 0x22 | 0x30 | 0x32 | 0x55 | 0x57 => 1,
        0x29 | 0x62 => 2,
        CHAT => 81,
        _ => available.min(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::fixture;

    #[test]
    fn frames_keep_their_commands() {
        let mut data = fixture::frame(0, &[vec![0, 0x18], vec![1, 0x20, 5]]);
        data.extend(fixture::frame(100, &[fixture::chat(0, "gl hf")]));

        let frames = parse_frames(&data);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].commands.len(), 2);
        assert_eq!(
            frames[0].commands[1],
            Command {
                player_id: 1,
                kind: 0x20,
                data: vec![5]
            }
        );
        assert_eq!(frames[1].number, 100);
        assert_eq!(frames[1].commands[0].kind, CHAT);
        assert_eq!(frames[1].commands[0].data.len(), 81);
    }

    #[test]
    fn trailing_garbage_is_dropped() {
        let mut data = fixture::frame(3, &[vec![0, 0x18]]);
        data.extend([0xff, 0xff, 0xff]);

        let frames = parse_frames(&data);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].number, 3);
    }

    #[test]
    fn chat_cut_short_ends_the_block() {
        let mut chat = fixture::chat(0, "hi");
        chat.truncate(20);
        let frames = parse_frames(&fixture::frame(9, &[vec![0, 0x18], chat]));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].commands.len(), 1);
    }
}
