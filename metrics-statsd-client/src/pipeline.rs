use tracing::trace;

use crate::{
    client::{SendOutcome, StatsdClient},
    format::LineFormatter,
    writer::PacketWriter,
    MetricEmitter,
};

/// Result of flushing a [`Pipeline`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushResult {
    lines_flushed: u64,
    packets_sent: u64,
    packets_dropped: u64,
}

impl FlushResult {
    /// Returns the number of lines that were pending when the flush started.
    pub const fn lines_flushed(&self) -> u64 {
        self.lines_flushed
    }

    /// Returns the number of packets handed to the transport.
    pub const fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Returns the number of packets dropped.
    pub const fn packets_dropped(&self) -> u64 {
        self.packets_dropped
    }

    /// Returns `true` if any packet was dropped.
    pub const fn any_failures(&self) -> bool {
        self.packets_dropped != 0
    }
}

/// A batch of metric lines sent together in as few packets as possible.
///
/// Lines are buffered in the order they are appended, and packed into packets when the pipeline is flushed. The
/// pipeline borrows its client for its whole lifetime, and flushes any pending lines when dropped, so lines are never
/// lost by returning early (including through `?`) or unwinding.
pub struct Pipeline<'a> {
    client: &'a mut StatsdClient,
    lines: Vec<String>,
    writer: PacketWriter,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(client: &'a mut StatsdClient) -> Self {
        let writer = PacketWriter::new(client.max_packet_size());
        Self { client, lines: Vec::new(), writer }
    }

    /// Appends a line to the batch.
    ///
    /// No size check happens here: lines are only packed into packets on flush.
    pub fn append<L>(&mut self, line: L)
    where
        L: Into<String>,
    {
        self.lines.push(line.into());
    }

    /// Returns the number of pending lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if there are no pending lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sends all pending lines.
    ///
    /// Lines are packed greedily into packets, in order. Flushing an empty pipeline sends nothing.
    pub fn flush(&mut self) -> FlushResult {
        let mut result = FlushResult::default();
        if self.lines.is_empty() {
            return result;
        }

        for line in self.lines.drain(..) {
            self.writer.write_line(&line);
            result.lines_flushed += 1;
        }

        let mut packets = self.writer.packets();
        trace!(lines = result.lines_flushed, packets = packets.len(), "Flushing pipeline.");

        while let Some(packet) = packets.next_packet() {
            match self.client.raw_send(packet) {
                SendOutcome::Sent { .. } => result.packets_sent += 1,
                SendOutcome::Dropped(_) => result.packets_dropped += 1,
            }
        }

        result
    }
}

impl<'a> MetricEmitter for Pipeline<'a> {
    fn formatter(&self) -> &LineFormatter {
        self.client.formatter()
    }

    fn emit_line(&mut self, line: String) {
        self.append(line);
    }
}

impl<'a> Drop for Pipeline<'a> {
    fn drop(&mut self) {
        self.flush();
    }
}
