use std::{
    ops::{Deref, DerefMut},
    vec::Drain,
};

/// Packs metric lines into newline-delimited packets.
///
/// StatsD lines are always newline delimited, which means that multiple lines can be sent in a single packet and then
/// trivially split apart by the remote server. Lines are packed greedily, in the order they were written: a line is
/// appended to the current packet unless doing so would bring the packet to `max_packet_size` bytes or more, in which
/// case the current packet is finalized and the line starts a new one.
///
/// The size check only decides whether a line joins the current packet. A single line longer than the maximum packet
/// size still gets a packet of its own, whole.
pub(crate) struct PacketWriter {
    max_packet_size: usize,
    packets_buf: Vec<u8>,
    offsets: Vec<usize>,
    lines_in_packet: usize,
}

impl PacketWriter {
    /// Creates a new `PacketWriter` with the given maximum packet size.
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size, packets_buf: Vec::new(), offsets: Vec::new(), lines_in_packet: 0 }
    }

    fn last_offset(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Returns the number of bytes in the current packet.
    fn current_packet_len(&self) -> usize {
        self.packets_buf.len() - self.last_offset()
    }

    /// Finalizes the current packet, if it holds any line.
    fn finalize_current_packet(&mut self) {
        if self.lines_in_packet == 0 {
            return;
        }

        self.offsets.push(self.packets_buf.len());
        self.lines_in_packet = 0;
    }

    /// Writes a line, starting a new packet first if the line does not fit in the current one.
    pub fn write_line(&mut self, line: &str) {
        if self.lines_in_packet > 0 {
            // NOTE: `>=` rather than `>`, so a combined packet always stays strictly below the maximum size.
            if self.current_packet_len() + 1 + line.len() >= self.max_packet_size {
                self.finalize_current_packet();
            } else {
                self.packets_buf.push(b'\n');
            }
        }

        self.packets_buf.extend_from_slice(line.as_bytes());
        self.lines_in_packet += 1;
    }

    /// Returns a consuming iterator over all packets written by this writer.
    ///
    /// The iterator will yield packets in the order they were written, and the packets will be cleared from the writer
    /// when the iterator is dropped.
    pub fn packets(&mut self) -> Packets<'_> {
        self.finalize_current_packet();

        Packets::new(&mut self.packets_buf, &mut self.offsets)
    }
}

/// Iterator over all packets written by a `PacketWriter`.
pub(crate) struct Packets<'a> {
    packets_buf: ConsumingBufferSwap<'a, u8>,
    start: usize,
    offsets: Drain<'a, usize>,
}

impl<'a> Packets<'a> {
    fn new(packets_buf: &'a mut Vec<u8>, offsets: &'a mut Vec<usize>) -> Self {
        Self { packets_buf: ConsumingBufferSwap::new(packets_buf), start: 0, offsets: offsets.drain(..) }
    }

    /// Returns the number of remaining packets.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns the next packet.
    ///
    /// If there are no more packets, `None` is returned.
    pub fn next_packet(&mut self) -> Option<&[u8]> {
        let offset = self.offsets.next()?;

        let packet = &self.packets_buf[self.start..offset];
        self.start = offset;

        Some(packet)
    }
}

// Swaps a buffer out for an empty one for the duration of a draining operation.
//
// The source buffer is empty as soon as this is created, so even if the drop logic never runs, the writer is left
// cleared rather than in an indeterminate state. Dropping hands the (cleared) allocation back for reuse.
struct ConsumingBufferSwap<'a, T> {
    source: &'a mut Vec<T>,
    original: Vec<T>,
}

impl<'a, T> ConsumingBufferSwap<'a, T> {
    fn new(source: &'a mut Vec<T>) -> Self {
        let original = std::mem::take(source);
        Self { source, original }
    }
}

impl<'a, T> Drop for ConsumingBufferSwap<'a, T> {
    fn drop(&mut self) {
        self.original.clear();
        std::mem::swap(self.source, &mut self.original);
    }
}

impl<'a, T> Deref for ConsumingBufferSwap<'a, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.original
    }
}

impl<'a, T> DerefMut for ConsumingBufferSwap<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.original
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec as arb_vec, prelude::*, proptest};

    use super::PacketWriter;

    fn packets_from_writer(writer: &mut PacketWriter) -> Vec<String> {
        let mut packets = writer.packets();
        let mut out = Vec::with_capacity(packets.len());
        while let Some(packet) = packets.next_packet() {
            out.push(String::from_utf8(packet.to_vec()).unwrap());
        }

        out
    }

    fn write_all(max_packet_size: usize, lines: &[&str]) -> Vec<String> {
        let mut writer = PacketWriter::new(max_packet_size);
        for line in lines {
            writer.write_line(line);
        }

        packets_from_writer(&mut writer)
    }

    #[test]
    fn greedy_packing() {
        let packets = write_all(20, &["a.b:1|c", "c.d:2|c", "e.f:3|c"]);
        assert_eq!(packets, vec!["a.b:1|c\nc.d:2|c", "e.f:3|c"]);
    }

    #[test]
    fn packet_never_reaches_max_size() {
        // 7 + 1 + 7 = 15, which is not allowed when the maximum is 15.
        let packets = write_all(15, &["a.b:1|c", "c.d:2|c"]);
        assert_eq!(packets, vec!["a.b:1|c", "c.d:2|c"]);

        let packets = write_all(16, &["a.b:1|c", "c.d:2|c"]);
        assert_eq!(packets, vec!["a.b:1|c\nc.d:2|c"]);
    }

    #[test]
    fn oversized_line_is_sent_whole() {
        let long = "x".repeat(64);
        let packets = write_all(16, &["a:1|c", &long, "b:2|c"]);
        assert_eq!(packets, vec!["a:1|c".to_string(), long, "b:2|c".to_string()]);
    }

    #[test]
    fn empty_writer_has_no_packets() {
        let mut writer = PacketWriter::new(512);
        assert!(packets_from_writer(&mut writer).is_empty());
    }

    #[test]
    fn writer_is_reusable_after_draining() {
        let mut writer = PacketWriter::new(512);
        writer.write_line("a:1|c");
        assert_eq!(packets_from_writer(&mut writer), vec!["a:1|c"]);

        writer.write_line("b:2|c");
        writer.write_line("c:3|c");
        assert_eq!(packets_from_writer(&mut writer), vec!["b:2|c\nc:3|c"]);
    }

    #[test]
    fn empty_line_joins_current_packet() {
        let mut writer = PacketWriter::new(10);
        writer.write_line("a:1|c");
        writer.write_line("b:2|c");
        writer.write_line("");
        assert_eq!(packets_from_writer(&mut writer), vec!["a:1|c", "b:2|c\n"]);
    }

    proptest! {
        #[test]
        fn property_test_gauntlet(max_packet_size in 1..1024usize, lines in arb_vec("[a-z0-9.:|]{1,96}", 0..128)) {
            let mut writer = PacketWriter::new(max_packet_size);
            for line in &lines {
                writer.write_line(line);
            }

            let longest_line = lines.iter().map(String::len).max().unwrap_or(0);
            let packets = packets_from_writer(&mut writer);
            if lines.is_empty() {
                prop_assert!(packets.is_empty());
            }

            let mut emitted = Vec::with_capacity(lines.len());
            for packet in &packets {
                prop_assert!(packet.len() <= max_packet_size.max(longest_line));

                let packet_lines = packet.split('\n').collect::<Vec<_>>();
                if packet_lines.len() > 1 {
                    prop_assert!(packet.len() < max_packet_size);
                }

                emitted.extend(packet_lines.into_iter().map(str::to_string));
            }

            prop_assert_eq!(emitted, lines);
        }
    }
}
