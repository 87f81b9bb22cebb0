/// Package that can be sent to the device
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub(crate) enum Command {
    /// Asks the device to start emitting framed screen contents
    ScreenStream,
}

impl Command {
    /// Textual name of the command as understood by the device shell
    fn name(&self) -> &'static str {
        use Command::*;
        match *self {
            ScreenStream => "screen_stream",
        }
    }

    /// Commands are terminated with a carriage return, no line feed
    pub fn encode(&self) -> Vec<u8> {
        let mut package = self.name().as_bytes().to_vec();
        package.push(b'\r');
        package
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_screen_stream() {
        assert_eq!(Command::ScreenStream.encode(), b"screen_stream\r".to_vec());
    }
}
