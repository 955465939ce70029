//! Stream copy from a container reader to one or more writers.

use std::collections::HashMap;

use crate::{
    engine::{Demux, Mux},
    error::{Error, Result},
    packet::{Packet, UNKNOWN_POSITION},
    rational::TimeBase,
    rescale::{Rnd, rescale_q_rnd},
    stream::StreamMapping,
};

/// Where `remux_packet` sent a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    Written(usize),
    Dropped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemuxStats {
    pub read: u64,
    pub written: u64,
    pub dropped: u64,
}

impl RemuxStats {
    fn record(&mut self, routed: Routed) {
        self.read += 1;
        match routed {
            Routed::Written(_) => self.written += 1,
            Routed::Dropped => self.dropped += 1,
        }
    }
}

/// Moves pts, dts and duration from `from` to `to` rounding to nearest,
/// keeping unknown timestamps unknown, and forgets the byte position.
pub fn remux_timestamps(packet: &mut Packet, from: TimeBase, to: TimeBase) {
    let rnd = Rnd::NEAR_INF_PASS_MINMAX;
    let pts = rescale_q_rnd(packet.raw_pts(), from, to, rnd);
    let dts = rescale_q_rnd(packet.raw_dts(), from, to, rnd);
    let duration = rescale_q_rnd(packet.duration(), from, to, rnd);
    packet.set_raw_timestamps(pts, dts, duration);
    packet.set_position(UNKNOWN_POSITION);
}

fn input_time_base<D: Demux + ?Sized>(demux: &D, stream: usize) -> Result<TimeBase> {
    demux.time_base(stream).ok_or_else(|| {
        Error::invalid_argument(format!("input stream {stream} has no time base"))
    })
}

fn output_time_base<M: Mux + ?Sized>(mux: &M, stream: usize) -> Result<TimeBase> {
    mux.time_base(stream).ok_or_else(|| {
        Error::invalid_argument(format!("output stream {stream} has no time base"))
    })
}

pub struct Remuxer {
    mapping: StreamMapping,
    stats: RemuxStats,
}

impl Remuxer {
    pub fn new(mapping: StreamMapping) -> Self {
        Self {
            mapping,
            stats: RemuxStats::default(),
        }
    }

    pub fn mapping(&self) -> &StreamMapping {
        &self.mapping
    }

    pub fn stats(&self) -> RemuxStats {
        self.stats
    }

    /// Rescales and writes one packet read from `demux`, or drops it when its
    /// stream is not mapped. The packet is left to the caller to unref.
    pub fn remux_packet<D, M>(
        &mut self,
        demux: &D,
        mux: &mut M,
        packet: &mut Packet,
    ) -> Result<Routed>
    where
        D: Demux + ?Sized,
        M: Mux + ?Sized,
    {
        let input = packet.stream();
        let Some(output) = self.mapping.get(input) else {
            self.stats.record(Routed::Dropped);
            return Ok(Routed::Dropped);
        };

        let from = input_time_base(demux, input)?;
        let to = output_time_base(mux, output)?;
        remux_timestamps(packet, from, to);
        packet.set_stream(output);
        mux.write_interleaved(packet)?;

        self.stats.record(Routed::Written(output));
        Ok(Routed::Written(output))
    }

    /// Copies every packet until the reader reports end of input.
    pub fn remux_all<D, M>(&mut self, demux: &mut D, mux: &mut M) -> Result<RemuxStats>
    where
        D: Demux + ?Sized,
        M: Mux + ?Sized,
    {
        let mut packet = Packet::empty();
        loop {
            match demux.read_packet(&mut packet) {
                Ok(()) => {}
                Err(Error::Eof) => break,
                Err(e) => return Err(e),
            }
            let routed = self.remux_packet(demux, mux, &mut packet);
            packet.unref();
            if let Routed::Written(output) = routed? {
                log::trace!("packet written to stream {}", output);
            }
        }

        log::debug!(
            "remux finished, {} read, {} written, {} dropped",
            self.stats.read,
            self.stats.written,
            self.stats.dropped
        );
        Ok(self.stats)
    }
}

/// Copies every stream that has a muxer in `muxers` into it as stream 0.
/// Packets of streams without a muxer are dropped.
pub fn split_all<D, M>(demux: &mut D, muxers: &mut HashMap<usize, M>) -> Result<RemuxStats>
where
    D: Demux + ?Sized,
    M: Mux,
{
    let mut stats = RemuxStats::default();
    let mut packet = Packet::empty();
    loop {
        match demux.read_packet(&mut packet) {
            Ok(()) => {}
            Err(Error::Eof) => break,
            Err(e) => return Err(e),
        }
        let input = packet.stream();
        let routed = match muxers.get_mut(&input) {
            Some(mux) => write_split(demux, mux, &mut packet, input).map(|()| Routed::Written(0)),
            None => Ok(Routed::Dropped),
        };
        packet.unref();
        stats.record(routed?);
    }
    Ok(stats)
}

fn write_split<D, M>(demux: &D, mux: &mut M, packet: &mut Packet, input: usize) -> Result<()>
where
    D: Demux + ?Sized,
    M: Mux,
{
    let from = input_time_base(demux, input)?;
    let to = output_time_base(mux, 0)?;
    remux_timestamps(packet, from, to);
    packet.set_stream(0);
    mux.write_interleaved(packet)
}

#[cfg(test)]
#[path = "remux_test.rs"]
mod remux_test;
