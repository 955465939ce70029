//! Deterministic in-memory engines and containers.
//!
//! `MockCodec` behaves like a native codec context opened in one direction: it
//! buffers `delay` outputs before emitting anything (B-frame style reordering
//! depth), refuses input with `Again` once `capacity` outputs are pending,
//! rejects a second flush with `Eof`, and answers calls for the other
//! direction with `InvalidArgument`.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::engine::{Decode, Demux, Encode, Mux};
use crate::error::{Error, Result};
use crate::format::{FrameFormat, PixelFormat};
use crate::frame::Frame;
use crate::packet::{Packet, PacketFlags};
use crate::rational::TimeBase;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Decoder,
    Encoder,
}

#[derive(Clone, Debug)]
struct Payload {
    data: Bytes,
    pts: Option<i64>,
}

#[derive(Debug)]
pub struct MockCodec {
    mode: Mode,
    delay: usize,
    capacity: usize,
    outputs_per_input: usize,
    fail_at: Option<usize>,
    queue: VecDeque<Payload>,
    sent: usize,
    emitted: i64,
    started: bool,
    flushing: bool,
    drained: bool,
}

impl MockCodec {
    pub fn decoder() -> Self {
        Self::new(Mode::Decoder)
    }

    pub fn encoder() -> Self {
        Self::new(Mode::Encoder)
    }

    fn new(mode: Mode) -> Self {
        Self {
            mode,
            delay: 0,
            capacity: usize::MAX,
            outputs_per_input: 1,
            fail_at: None,
            queue: VecDeque::new(),
            sent: 0,
            emitted: 0,
            started: false,
            flushing: false,
            drained: false,
        }
    }

    /// Outputs held back until flush or until more input arrives.
    pub fn with_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    /// Pending outputs at which `send` starts answering `Again`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_outputs_per_input(mut self, n: usize) -> Self {
        self.outputs_per_input = n;
        self
    }

    /// The input with this zero-based ordinal is rejected as corrupt.
    pub fn failing_at(mut self, ordinal: usize) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    fn require_mode(&self, mode: Mode) -> Result<()> {
        if self.mode != mode {
            return Err(Error::invalid_argument(format!(
                "{:?} called in {:?} mode",
                mode, self.mode
            )));
        }
        Ok(())
    }

    fn submit(&mut self, payload: Option<Payload>) -> Result<()> {
        if self.flushing {
            return Err(Error::Eof);
        }
        self.started = true;
        let Some(payload) = payload else {
            self.flushing = true;
            return Ok(());
        };
        if self.queue.len() >= self.capacity {
            return Err(Error::Again);
        }
        let ordinal = self.sent;
        self.sent += 1;
        if self.fail_at == Some(ordinal) {
            return Err(Error::codec(format!("corrupt input #{ordinal}")));
        }
        for _ in 0..self.outputs_per_input {
            self.queue.push_back(payload.clone());
        }
        Ok(())
    }

    fn extract(&mut self) -> Result<Payload> {
        if !self.started {
            return Err(Error::invalid_argument("receive called before any send"));
        }
        if self.drained {
            return Err(Error::Eof);
        }
        if self.queue.len() > self.delay || (self.flushing && !self.queue.is_empty()) {
            if let Some(payload) = self.queue.pop_front() {
                self.emitted += 1;
                return Ok(payload);
            }
        }
        if self.flushing {
            self.drained = true;
            return Err(Error::Eof);
        }
        Err(Error::Again)
    }
}

impl Decode for MockCodec {
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        self.require_mode(Mode::Decoder)?;
        let payload = packet.filter(|p| !p.is_empty()).map(|p| Payload {
            data: p.bytes(),
            pts: p.pts(),
        });
        self.submit(payload)
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        self.require_mode(Mode::Decoder)?;
        let payload = self.extract()?;
        let linesize = payload.data.len();
        frame.set_plane(0, payload.data, linesize);
        frame.set_format(FrameFormat::Video(PixelFormat::Gray8));
        frame.set_dimensions(linesize as u32, 1);
        frame.set_pts(payload.pts);
        Ok(())
    }
}

impl Encode for MockCodec {
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        self.require_mode(Mode::Encoder)?;
        let payload = frame.filter(|f| !f.is_empty()).map(|f| Payload {
            data: Bytes::copy_from_slice(f.data(0)),
            pts: f.pts(),
        });
        self.submit(payload)
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        self.require_mode(Mode::Encoder)?;
        let payload = self.extract()?;
        let dts = self.emitted - 1;
        packet.set_data(payload.data);
        packet.set_pts(payload.pts);
        packet.set_dts(Some(dts));
        packet.set_duration(1);
        if dts == 0 {
            packet.set_flags(PacketFlags::KEY);
        }
        Ok(())
    }
}

/// Container reader over a fixed packet list.
#[derive(Debug, Default)]
pub struct MockDemuxer {
    time_bases: Vec<TimeBase>,
    packets: VecDeque<Packet>,
}

impl MockDemuxer {
    pub fn new(time_bases: Vec<TimeBase>, packets: impl IntoIterator<Item = Packet>) -> Self {
        Self {
            time_bases,
            packets: packets.into_iter().collect(),
        }
    }
}

impl Demux for MockDemuxer {
    fn stream_count(&self) -> usize {
        self.time_bases.len()
    }

    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        self.time_bases.get(stream).copied()
    }

    fn read_packet(&mut self, packet: &mut Packet) -> Result<()> {
        match self.packets.pop_front() {
            Some(next) => {
                *packet = next;
                Ok(())
            }
            None => Err(Error::Eof),
        }
    }
}

/// Container writer that records every packet it is given.
#[derive(Debug, Default)]
pub struct MockMuxer {
    time_bases: Vec<TimeBase>,
    header_pending: bool,
    written: Vec<Packet>,
}

impl MockMuxer {
    pub fn new(time_bases: Vec<TimeBase>) -> Self {
        Self {
            time_bases,
            header_pending: false,
            written: Vec::new(),
        }
    }

    /// A muxer whose time bases are only known once
    /// [`MockMuxer::write_header`] has been called.
    pub fn with_pending_header(mut self) -> Self {
        self.header_pending = true;
        self
    }

    pub fn write_header(&mut self) {
        self.header_pending = false;
    }

    pub fn written(&self) -> &[Packet] {
        &self.written
    }
}

impl Mux for MockMuxer {
    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        if self.header_pending {
            return None;
        }
        self.time_bases.get(stream).copied()
    }

    fn write_interleaved(&mut self, packet: &mut Packet) -> Result<()> {
        if self.header_pending {
            return Err(Error::invalid_argument("header not written"));
        }
        if packet.stream() >= self.time_bases.len() {
            return Err(Error::invalid_argument(format!(
                "no output stream {}",
                packet.stream()
            )));
        }
        // Interleaved writes take ownership of the payload.
        self.written.push(std::mem::take(packet));
        Ok(())
    }
}
