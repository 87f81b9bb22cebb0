use lazy_static::lazy_static;
use manifest_dir_macros::exist_relative_path;
use mockall::mock;
use nom::{
    character::complete::{hex_digit1, multispace0},
    combinator::{all_consuming, map_opt},
    multi::fold_many1,
    sequence::terminated,
    IResult,
};
use std::io::{Read, Write};

/// Whitespace separated hex words, each with an even number of digits ("DEAD BE EF")
fn hex_word(input: &str) -> IResult<&str, Vec<u8>> {
    map_opt(hex_digit1, |word: &str| -> Option<Vec<u8>> {
        if word.len() % 2 != 0 {
            return None;
        }
        (0..word.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&word[i..i + 2], 16).ok())
            .collect()
    })(input)
}

fn parse_capture(input: &str) -> IResult<&str, Vec<u8>> {
    let (input, _) = multispace0(input)?;
    all_consuming(fold_many1(
        terminated(hex_word, multispace0),
        Vec::new,
        |mut bytes, word| {
            bytes.extend(word);
            bytes
        },
    ))(input)
}

lazy_static! {
    /// Capture of a device answering `screen_stream`: two frames and a third one cut off
    pub static ref STREAM_CAPTURE: Vec<u8> = {
        let hex_str = include_str!(exist_relative_path!(
            "../resources/test/stream_example.txt"
        ));
        let (_, data) = parse_capture(hex_str)
            .expect("Failed to parse resources/test/stream_example.txt");
        data
    };
}

mock! {
    pub Port {}
    impl Read for Port {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    }
    impl Write for Port {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
        fn flush(&mut self) -> std::io::Result<()>;
    }
}

impl MockPort {
    /// Mock which plays back `data` and then reports end of stream, writes are accepted
    pub fn replaying(data: Vec<u8>) -> Self {
        let mut cursor = std::io::Cursor::new(data);
        let mut mock_port = MockPort::new();
        mock_port.expect_read().returning(move |buf| cursor.read(buf));
        mock_port.expect_write().returning(|buf| Ok(buf.len()));
        mock_port.expect_flush().returning(|| Ok(()));
        mock_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn capture_words() {
        assert_ok_eq!(parse_capture("F0E1D2C3"), ("", vec![0xF0, 0xE1, 0xD2, 0xC3]));
        assert_ok_eq!(
            parse_capture("\n F0 E1\nD2C3  \n"),
            ("", vec![0xF0, 0xE1, 0xD2, 0xC3])
        );
        // Half a byte can't be replayed
        assert_err!(parse_capture("F0E"));
        assert_err!(parse_capture("screen"));
    }

    #[test]
    fn capture_is_loaded() {
        assert!(STREAM_CAPTURE.starts_with(b"screen_stream\r\n"));
    }

    #[test]
    fn replay_ends_stream() {
        let mut mock_port = MockPort::replaying(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_ok_eq!(mock_port.read(&mut buf), 3);
        assert_ok_eq!(mock_port.read(&mut buf), 0);
    }
}
