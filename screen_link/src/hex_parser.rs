use crate::{
    error::{Error, Result},
    frame::{
        parser::{align_frame, frame_payload},
        RawFrame,
    },
};
use nom::{
    bytes::complete::take,
    character::complete::multispace0,
    combinator::{all_consuming, map_res, verify},
    multi::many1,
    sequence::{preceded, terminated},
    IResult,
};

/// Two hex digits making up a single byte of a dump, "C3" -> 0xC3
fn dump_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        verify(take(2usize), |pair: &str| pair.chars().all(|c| c.is_ascii_hexdigit())),
        |pair| u8::from_str_radix(pair, 16),
    )(input)
}

/// Parses a whitespace separated hex dump, line breaks included
pub fn parse_hex_str(input: &str) -> IResult<&str, Vec<u8>> {
    all_consuming(preceded(multispace0, many1(terminated(dump_byte, multispace0))))(input)
}

/// Splits a hex dump of a captured stream into frames, trailing incomplete frame is dropped
pub fn decode_from_string(input: &str) -> Result<Vec<RawFrame>> {
    let (_, data) = parse_hex_str(input).map_err(|_| Error::InvalidData("Could not parse hex dump"))?;
    let mut data = &data[..];
    let mut frames = Vec::new();
    loop {
        let Ok((aligned, _)) = align_frame(data) else {
            break;
        };
        match frame_payload(aligned) {
            Ok((tail, payload)) => {
                frames.push(RawFrame::try_from(payload)?);
                data = tail;
            }
            Err(nom::Err::Incomplete(_)) => break,
            Err(_) => return Err(Error::InvalidData("Could not split frame payload")),
        }
    }
    Ok(frames)
}
