use nom::{
    bytes::streaming::{tag, take, take_until},
    combinator::map,
    sequence::terminated,
    IResult,
};

use super::{DELIMITER, FRAME_SIZE};

/// Drops every byte up to and including the first frame delimiter.
///
/// Returns `Incomplete` while no complete delimiter is present in the input.
pub fn align_frame(input: &[u8]) -> IResult<&[u8], ()> {
    map(
        terminated(take_until(&DELIMITER[..]), tag(&DELIMITER[..])),
        |_| (),
    )(input)
}

/// Takes aligned input and splits a frame payload off of it
pub fn frame_payload(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take(FRAME_SIZE)(input)
}

/// Amount of bytes at the end of unaligned input that could still turn out to be a start of a
/// delimiter once more data arrives
pub fn delimiter_tail_len(input: &[u8]) -> usize {
    (1..DELIMITER.len())
        .rev()
        .find(|&n| input.len() >= n && input.ends_with(&DELIMITER[..n]))
        .unwrap_or(0)
}
