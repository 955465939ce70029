//! Boundary traits for the codec engine and container I/O.
//!
//! Every call reports its status through [`Result`]: `Ok` is success,
//! [`Error::Again`](crate::Error::Again) and [`Error::Eof`](crate::Error::Eof)
//! are the state-machine signals, anything else is a failure. Implementations
//! are driven from a single thread; none of these calls may be issued
//! concurrently on the same value.

use crate::error::Result;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::rational::TimeBase;

/// Packet-in, frame-out codec engine.
pub trait Decode {
    /// Submits compressed input. `None` signals end of input; the engine then
    /// drains its buffered frames through [`Decode::receive_frame`].
    ///
    /// Returns `Again` if output must be read first, `Eof` if the engine was
    /// already flushed.
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()>;

    /// Fills `frame` with the next decoded frame.
    ///
    /// Returns `Again` when more input is needed, `Eof` once fully drained.
    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()>;
}

/// Frame-in, packet-out codec engine.
pub trait Encode {
    /// Submits raw input. `None` signals end of input.
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()>;

    /// Fills `packet` with the next encoded packet.
    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()>;
}

/// Container reader.
pub trait Demux {
    fn stream_count(&self) -> usize;

    fn time_base(&self, stream: usize) -> Option<TimeBase>;

    /// Reads the next packet in container order. `Eof` at the end of input.
    fn read_packet(&mut self, packet: &mut Packet) -> Result<()>;
}

/// Container writer.
pub trait Mux {
    /// The time base packets for `stream` must be written in. `None` until
    /// that time base is final, which for most containers is after the
    /// header has been written.
    fn time_base(&self, stream: usize) -> Option<TimeBase>;

    /// Hands a packet to the container's interleaving queue. Timestamps must
    /// already be in the output stream's time base.
    fn write_interleaved(&mut self, packet: &mut Packet) -> Result<()>;
}

impl<T: Decode + ?Sized> Decode for &mut T {
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        (**self).send_packet(packet)
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        (**self).receive_frame(frame)
    }
}

impl<T: Encode + ?Sized> Encode for &mut T {
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        (**self).receive_packet(packet)
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        (**self).send_packet(packet)
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        (**self).receive_frame(frame)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        (**self).send_frame(frame)
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        (**self).receive_packet(packet)
    }
}
