use crate::{
    error::{Error, Result},
    link::ScreenLink,
};
use serialport::SerialPort;
use std::{
    io::{self, Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

// Upper bound on how long a cancellation request can go unnoticed while waiting between attempts
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared flag asking a streamer to stop at the next blocking call boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first. Returns `false` if sleep was interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

/// Delay between failed attempts to open a device, doubled after every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

/// Opens a byte stream to a device, implemented separately for real serial ports and tests
pub trait PortOpener {
    type Port: Read + Write;

    fn open(&mut self, path: &str) -> core::result::Result<Self::Port, serialport::Error>;
}

/// Opens real serial ports through `serialport`
#[derive(Debug, Clone, Copy)]
pub struct SerialOpener {
    baud_rate: u32,
    timeout: Duration,
}

impl SerialOpener {
    /// `timeout` bounds a single read, and with it the reaction time to a cancellation request
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        SerialOpener { baud_rate, timeout }
    }
}

impl PortOpener for SerialOpener {
    type Port = Box<dyn SerialPort>;

    fn open(&mut self, path: &str) -> core::result::Result<Self::Port, serialport::Error> {
        check_device_path(path)?;
        serialport::new(path, self.baud_rate)
            .timeout(self.timeout)
            .open()
    }
}

/// Rejects paths which exist but can never become a serial port, like regular files.
///
/// `serialport` reports those as `ErrorKind::Unknown`, same as short lived driver hiccups, so
/// they have to be told apart before opening. Missing paths pass, the device may show up later.
#[cfg(unix)]
fn check_device_path(path: &str) -> core::result::Result<(), serialport::Error> {
    use std::os::unix::fs::FileTypeExt;
    match std::fs::metadata(path) {
        Ok(meta) if !meta.file_type().is_char_device() => Err(serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            format!("{} is not a character device", path),
        )),
        _ => Ok(()),
    }
}

// COM ports are not files, nothing to check up front
#[cfg(not(unix))]
fn check_device_path(_path: &str) -> core::result::Result<(), serialport::Error> {
    Ok(())
}

/// Sorts a failure to open a device into fatal and retryable ones
pub(crate) fn classify_open_error(path: &str, err: serialport::Error) -> Error {
    use serialport::ErrorKind;
    match err.kind() {
        ErrorKind::Io(io::ErrorKind::PermissionDenied) => Error::PermissionDenied {
            path: path.to_owned(),
        },
        ErrorKind::InvalidInput => Error::InvalidSerialPath {
            path: path.to_owned(),
        },
        _ => Error::TransientOpenFailure(err),
    }
}

/// Opens a link to the device at `path`, retrying until it succeeds.
///
/// Gives up right away on errors which can't go away by waiting, like missing permissions.
/// Device missing or being busy is retried indefinitely, following `policy` for delays.
pub fn connect<O: PortOpener>(
    opener: &mut O,
    path: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ScreenLink<O::Port>> {
    let mut delay = policy.initial_delay;
    let mut attempt: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        attempt += 1;
        match opener.open(path) {
            Ok(port) => {
                log::debug!("Opened {} after {} attempt(s)", path, attempt);
                return Ok(ScreenLink::new(port).with_cancellation(cancel.clone()));
            }
            Err(err) => match classify_open_error(path, err) {
                Error::TransientOpenFailure(err) => {
                    log::trace!("Attempt {} to open {} failed: {}", attempt, path, err);
                }
                fatal => return Err(fatal),
            },
        }
        if !cancel.sleep(delay) {
            return Err(Error::Cancelled);
        }
        delay = policy.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use std::collections::VecDeque;
    use utilities::MockPort;

    /// Hands out prepared results, counts how many times opening was attempted
    struct ScriptedOpener {
        results: VecDeque<core::result::Result<MockPort, serialport::Error>>,
        attempts: usize,
    }

    impl ScriptedOpener {
        fn new(results: Vec<core::result::Result<MockPort, serialport::Error>>) -> Self {
            ScriptedOpener {
                results: results.into(),
                attempts: 0,
            }
        }
    }

    impl PortOpener for ScriptedOpener {
        type Port = MockPort;

        fn open(&mut self, _path: &str) -> core::result::Result<MockPort, serialport::Error> {
            self.attempts += 1;
            self.results
                .pop_front()
                .unwrap_or_else(|| Err(busy()))
        }
    }

    fn busy() -> serialport::Error {
        serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::Other),
            "Device or resource busy",
        )
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn permission_denied_is_not_retried() {
        let mut opener = ScriptedOpener::new(vec![Err(serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Permission denied",
        ))]);
        let res = connect(&mut opener, "/dev/ttyACM0", &no_wait(), &CancellationToken::new());
        match res.err() {
            Some(Error::PermissionDenied { path }) => assert_eq!(path, "/dev/ttyACM0"),
            other => panic!("Expected permission error, got {:?}", other),
        }
        // Single attempt, no retries
        assert_eq!(opener.attempts, 1);
    }

    #[test]
    fn transient_failures_are_retried() {
        let mut opener = ScriptedOpener::new(vec![
            Err(busy()),
            Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "No such device",
            )),
            Ok(MockPort::new()),
        ]);
        let res = connect(&mut opener, "/dev/ttyACM0", &no_wait(), &CancellationToken::new());
        assert_ok!(res);
        assert_eq!(opener.attempts, 3);
    }

    #[test]
    fn missing_device_is_retried() {
        let mut opener = ScriptedOpener::new(vec![
            Err(serialport::Error::new(
                serialport::ErrorKind::Io(io::ErrorKind::NotFound),
                "No such file or directory",
            )),
            Ok(MockPort::new()),
        ]);
        let res = connect(&mut opener, "/dev/ttyACM0", &no_wait(), &CancellationToken::new());
        assert_ok!(res);
        assert_eq!(opener.attempts, 2);
    }

    #[test]
    fn unsupported_settings_are_fatal() {
        let mut opener = ScriptedOpener::new(vec![Err(serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            "Unsupported baud rate",
        ))]);
        let res = connect(&mut opener, "/dev/ttyACM0", &no_wait(), &CancellationToken::new());
        assert_matches!(res.err(), Some(Error::InvalidSerialPath { .. }));
        assert_eq!(opener.attempts, 1);
    }

    #[cfg(unix)]
    #[test]
    fn regular_file_is_not_a_device() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let err = assert_err!(check_device_path(path));
        assert_eq!(err.kind(), serialport::ErrorKind::InvalidInput);

        // Real serial opener gives up right away instead of retrying forever
        let mut opener = SerialOpener::new(9600, Duration::from_millis(10));
        let res = connect(&mut opener, path, &no_wait(), &CancellationToken::new());
        match res.err() {
            Some(Error::InvalidSerialPath { path: p }) => assert_eq!(p, path),
            other => panic!("Expected invalid path error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn device_and_missing_paths_pass_check() {
        assert_ok!(check_device_path("/dev/null"));
        assert_ok!(check_device_path("/dev/ttyDOES_NOT_EXIST0"));
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let mut opener = ScriptedOpener::new(vec![Ok(MockPort::new())]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = connect(&mut opener, "/dev/ttyACM0", &no_wait(), &cancel);
        assert_matches!(res.err(), Some(Error::Cancelled));
        assert_eq!(opener.attempts, 0);
    }

    #[test]
    fn cancel_interrupts_retry_loop() {
        // Never succeeds on its own
        let mut opener = ScriptedOpener::new(Vec::new());
        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            })
        };
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        let res = connect(&mut opener, "/dev/ttyACM0", &policy, &cancel);
        canceller.join().unwrap();
        assert_matches!(res.err(), Some(Error::Cancelled));
        assert_ge!(opener.attempts, 1);
    }

    #[test]
    fn backoff_is_bounded() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        for _ in 0..64 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, policy.max_delay);
        assert_eq!(
            policy.next_delay(Duration::from_millis(50)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn interrupted_sleep() {
        let cancel = CancellationToken::new();
        assert!(cancel.sleep(Duration::from_millis(1)));
        cancel.cancel();
        assert!(!cancel.sleep(Duration::from_secs(60)));
    }
}
