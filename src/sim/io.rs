//! IO handling for LC-3.
//!
//! The trap routines of the simulator (`GETC`, `OUT`, `PUTS`, `IN`, `PUTSP`)
//! read and write characters through the [`IODevice`] trait.
//! The simulator holds its device as a [`SimIO`].
//!
//! Available devices:
//! - [`ConsoleIO`]: An `IODevice` which reads from stdin and writes to stdout (the default).
//! - [`EmptyIO`]: no input, discarded output.
//! - [`BufferedIO`]: shared in-memory input and output buffers.
//! - [`ChannelIO`]: An `IODevice` which reads from and writes to channels.
//!
//! All reads are blocking. If a device has no more input, reads produce a 0 byte.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crossbeam_channel as cbc;

/// An IO device that characters can be read from and written to.
pub trait IODevice {
    /// Reads one character, blocking until one is available.
    ///
    /// If the device has no more input, this returns 0.
    fn read_char(&self) -> u8;

    /// Writes one character.
    fn write_char(&self, ch: u8);

    /// Flushes any characters written so far.
    fn flush(&self) {}
}
impl dyn IODevice {} // assert IODevice is dyn safe

/// No IO. All reads return 0 and all writes are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyIO;
impl IODevice for EmptyIO {
    fn read_char(&self) -> u8 {
        0
    }

    fn write_char(&self, _ch: u8) {}
}

/// IO which reads from stdin and writes to stdout.
///
/// Note that due to how stdin works in terminals, data is only sent once a new line is typed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleIO;
impl IODevice for ConsoleIO {
    fn read_char(&self) -> u8 {
        let mut stdin = std::io::stdin().lock();
        match stdin.fill_buf() {
            Ok(&[byte, ..]) => {
                stdin.consume(1);
                byte
            },
            Ok(_) => 0,
            Err(e) => {
                tracing::warn!("could not read from stdin: {e}");
                0
            }
        }
    }

    fn write_char(&self, ch: u8) {
        if let Err(e) = std::io::stdout().write_all(&[ch]) {
            tracing::warn!("could not write to stdout: {e}");
        }
    }

    fn flush(&self) {
        if let Err(e) = std::io::stdout().flush() {
            tracing::warn!("could not flush stdout: {e}");
        }
    }
}

/// IO backed by an in-memory input queue and output buffer.
///
/// Both buffers are shared, so they can be filled and inspected from outside through [`BufferedIO::get_input`] and [`BufferedIO::get_output`].
///
/// Note that a lock guard on either buffer blocks the simulator's access to it,
/// so a lock guard should not be held while the simulator runs.
///
/// ```
/// use lc3_twopass::sim::io::{BufferedIO, IODevice};
///
/// let io = BufferedIO::new();
/// io.get_input().write().unwrap().extend(b"hi");
///
/// let ch = io.read_char();
/// io.write_char(ch.to_ascii_uppercase());
/// assert_eq!(*io.get_output().read().unwrap(), b"H");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferedIO {
    input: Arc<RwLock<VecDeque<u8>>>,
    output: Arc<RwLock<Vec<u8>>>
}
impl BufferedIO {
    /// Creates a device with empty buffers.
    pub fn new() -> Self {
        Self { input: Default::default(), output: Default::default() }
    }
    /// Creates a device over existing buffers.
    pub fn with_bufs(input: Arc<RwLock<VecDeque<u8>>>, output: Arc<RwLock<Vec<u8>>>) -> Self {
        Self { input, output }
    }

    fn input(&self) -> RwLockWriteGuard<'_, VecDeque<u8>> {
        self.input.write().unwrap_or_else(|e| e.into_inner())
    }
    fn output(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.output.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The input queue. Trap routines pop from its front.
    pub fn get_input(&self) -> &Arc<RwLock<VecDeque<u8>>> {
        &self.input
    }
    /// The output buffer. Trap routines push to its back.
    pub fn get_output(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.output
    }
}
impl IODevice for BufferedIO {
    fn read_char(&self) -> u8 {
        self.input().pop_front().unwrap_or(0)
    }

    fn write_char(&self, ch: u8) {
        self.output().push(ch);
    }
}

/// IO that reads from one channel and writes to another.
///
/// Reads block until a character is sent through the input channel.
/// If the input channel's senders are all dropped, reads return 0.
/// If the output channel's receivers are all dropped, writes are discarded.
///
/// ```
/// use lc3_twopass::sim::io::{ChannelIO, IODevice};
///
/// let (io, input, output) = ChannelIO::unbounded();
/// input.send(b'a').unwrap();
///
/// let ch = io.read_char();
/// io.write_char(ch);
/// assert_eq!(output.recv(), Ok(b'a'));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelIO {
    input: cbc::Receiver<u8>,
    output: cbc::Sender<u8>
}
impl ChannelIO {
    /// Creates a new channel IO device from an input channel and an output channel.
    pub fn new(input: cbc::Receiver<u8>, output: cbc::Sender<u8>) -> Self {
        Self { input, output }
    }

    /// Creates a new channel IO device with unbounded channels,
    /// returning the device, the sender to its input, and the receiver of its output.
    pub fn unbounded() -> (Self, cbc::Sender<u8>, cbc::Receiver<u8>) {
        let (input_tx, input_rx) = cbc::unbounded();
        let (output_tx, output_rx) = cbc::unbounded();

        (Self::new(input_rx, output_tx), input_tx, output_rx)
    }
}
impl IODevice for ChannelIO {
    fn read_char(&self) -> u8 {
        self.input.recv().unwrap_or(0)
    }

    fn write_char(&self, ch: u8) {
        // a disconnected output just has nobody listening
        let _ = self.output.send(ch);
    }
}

/// The IO device held by a [`Simulator`](super::Simulator).
#[derive(Default)]
pub enum SimIO {
    /// See [`ConsoleIO`].
    #[default]
    Console,
    /// See [`EmptyIO`].
    Empty,
    /// See [`BufferedIO`].
    Buffered(BufferedIO),
    /// See [`ChannelIO`].
    Channel(ChannelIO),
    /// Any other device.
    Custom(Box<dyn IODevice + Send + Sync>)
}
impl SimIO {
    /// Wraps a custom IO device.
    pub fn custom(device: impl IODevice + Send + Sync + 'static) -> Self {
        SimIO::Custom(Box::new(device))
    }
}
impl std::fmt::Debug for SimIO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            SimIO::Console     => "Console",
            SimIO::Empty       => "Empty",
            SimIO::Buffered(_) => "Buffered",
            SimIO::Channel(_)  => "Channel",
            SimIO::Custom(_)   => "Custom",
        };
        f.debug_tuple("SimIO").field(&kind).finish()
    }
}
impl From<ConsoleIO> for SimIO {
    fn from(_value: ConsoleIO) -> Self {
        SimIO::Console
    }
}
impl From<EmptyIO> for SimIO {
    fn from(_value: EmptyIO) -> Self {
        SimIO::Empty
    }
}
impl From<BufferedIO> for SimIO {
    fn from(value: BufferedIO) -> Self {
        SimIO::Buffered(value)
    }
}
impl From<ChannelIO> for SimIO {
    fn from(value: ChannelIO) -> Self {
        SimIO::Channel(value)
    }
}
impl IODevice for SimIO {
    fn read_char(&self) -> u8 {
        match self {
            SimIO::Console => ConsoleIO.read_char(),
            SimIO::Empty => EmptyIO.read_char(),
            SimIO::Buffered(io) => io.read_char(),
            SimIO::Channel(io) => io.read_char(),
            SimIO::Custom(io) => io.read_char(),
        }
    }

    fn write_char(&self, ch: u8) {
        match self {
            SimIO::Console => ConsoleIO.write_char(ch),
            SimIO::Empty => EmptyIO.write_char(ch),
            SimIO::Buffered(io) => io.write_char(ch),
            SimIO::Channel(io) => io.write_char(ch),
            SimIO::Custom(io) => io.write_char(ch),
        }
    }

    fn flush(&self) {
        match self {
            SimIO::Console => ConsoleIO.flush(),
            SimIO::Empty => EmptyIO.flush(),
            SimIO::Buffered(io) => io.flush(),
            SimIO::Channel(io) => io.flush(),
            SimIO::Custom(io) => io.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, RwLock};

    use super::{BufferedIO, ChannelIO, EmptyIO, IODevice, SimIO};

    #[test]
    fn test_buffered_exhausted() {
        let input = Arc::new(RwLock::new(VecDeque::from(*b"ab")));
        let io = BufferedIO::with_bufs(input, Default::default());

        assert_eq!(io.read_char(), b'a');
        assert_eq!(io.read_char(), b'b');
        assert_eq!(io.read_char(), 0);
    }

    #[test]
    fn test_channel_disconnected() {
        let (io, input, output) = ChannelIO::unbounded();
        input.send(b'x').unwrap();
        std::mem::drop(input);
        std::mem::drop(output);

        assert_eq!(io.read_char(), b'x');
        assert_eq!(io.read_char(), 0);
        io.write_char(b'y'); // discarded
    }

    #[test]
    fn test_sim_io_dispatch() {
        let buf = BufferedIO::new();
        let io = SimIO::from(buf.clone());
        io.write_char(b'!');
        io.flush();
        assert_eq!(*buf.get_output().read().unwrap(), b"!");

        let io = SimIO::custom(EmptyIO);
        assert_eq!(io.read_char(), 0);
        assert_eq!(format!("{io:?}"), "SimIO(\"Custom\")");
    }
}
