//! The send/receive state machine shared by the decode and encode pumps.
//!
//! One submission is followed by extraction until the engine reports `Again`
//! (wants more input) or `Eof` (fully drained). Stopping earlier would leave
//! buffered output inside the engine.

use crate::engine::{Decode, Encode};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::packet::Packet;

/// How a pump call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Drained {
    /// Every available output was delivered; the engine needs more input.
    NeedsInput,
    /// The engine was flushed and has no more output.
    Finished,
    /// The engine had already been flushed before this call and rejected the
    /// submission. Nothing was delivered.
    AlreadyFlushed,
}

impl Drained {
    /// No further input will be accepted by the engine.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Drained::NeedsInput)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Non-flush inputs accepted by the engine.
    pub submitted: u64,
    /// Outputs handed to the callback.
    pub emitted: u64,
    /// A flush was accepted by the engine.
    pub flushed: bool,
}

pub(crate) trait Reusable {
    fn unref(&mut self);
}

impl Reusable for Frame {
    fn unref(&mut self) {
        Frame::unref(self);
    }
}

impl Reusable for Packet {
    fn unref(&mut self) {
        Packet::unref(self);
    }
}

/// One direction of a codec engine seen as a send/receive pair.
pub(crate) trait Direction {
    type Input;
    type Output: Reusable;

    const NAME: &'static str;

    fn send(&mut self, input: Option<&Self::Input>) -> Result<()>;

    fn receive(&mut self, output: &mut Self::Output) -> Result<()>;
}

pub(crate) struct Decoding<'a, D: ?Sized>(pub &'a mut D);

impl<D: Decode + ?Sized> Direction for Decoding<'_, D> {
    type Input = Packet;
    type Output = Frame;

    const NAME: &'static str = "decoder";

    fn send(&mut self, input: Option<&Packet>) -> Result<()> {
        self.0.send_packet(input)
    }

    fn receive(&mut self, output: &mut Frame) -> Result<()> {
        self.0.receive_frame(output)
    }
}

pub(crate) struct Encoding<'a, E: ?Sized>(pub &'a mut E);

impl<E: Encode + ?Sized> Direction for Encoding<'_, E> {
    type Input = Frame;
    type Output = Packet;

    const NAME: &'static str = "encoder";

    fn send(&mut self, input: Option<&Frame>) -> Result<()> {
        self.0.send_frame(input)
    }

    fn receive(&mut self, output: &mut Packet) -> Result<()> {
        self.0.receive_packet(output)
    }
}

/// Extracts until `Again` or `Eof`, unreferencing `item` after each callback.
fn drain<E, F>(
    engine: &mut E,
    item: &mut E::Output,
    on_item: &mut F,
    stats: &mut PumpStats,
) -> Result<Drained>
where
    E: Direction,
    F: FnMut(&E::Output) -> Result<()>,
{
    loop {
        match engine.receive(item) {
            Ok(()) => {
                stats.emitted += 1;
                let delivered = on_item(item);
                item.unref();
                delivered?;
            }
            Err(Error::Again) => return Ok(Drained::NeedsInput),
            Err(Error::Eof) => {
                log::trace!("{} drained, {} outputs", E::NAME, stats.emitted);
                return Ok(Drained::Finished);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Submits `input` (`None` flushes) and drains the engine.
pub(crate) fn run<E, F>(
    engine: &mut E,
    input: Option<&E::Input>,
    item: &mut E::Output,
    mut on_item: F,
    stats: &mut PumpStats,
) -> Result<Drained>
where
    E: Direction,
    F: FnMut(&E::Output) -> Result<()>,
{
    match engine.send(input) {
        Ok(()) => {}
        Err(Error::Again) => {
            // Output is pending; deliver it and offer the input once more.
            log::trace!("{} busy, draining before resend", E::NAME);
            if drain(engine, item, &mut on_item, stats)? == Drained::Finished {
                return Ok(Drained::Finished);
            }
            match engine.send(input) {
                Ok(()) => {}
                Err(Error::Again) => {
                    return Err(Error::invalid_argument(format!(
                        "{} refused input with no output pending",
                        E::NAME
                    )));
                }
                Err(Error::Eof) => return Ok(already_flushed::<E>(input.is_some())),
                Err(e) => return Err(e),
            }
        }
        Err(Error::Eof) => return Ok(already_flushed::<E>(input.is_some())),
        Err(e) => return Err(e),
    }

    if input.is_some() {
        stats.submitted += 1;
    } else {
        log::trace!("{} flush accepted", E::NAME);
        stats.flushed = true;
    }

    drain(engine, item, &mut on_item, stats)
}

fn already_flushed<E: Direction>(had_data: bool) -> Drained {
    if had_data {
        log::warn!("{} already flushed, input discarded", E::NAME);
    } else {
        log::debug!("{} already flushed", E::NAME);
    }
    Drained::AlreadyFlushed
}

#[cfg(test)]
#[path = "pump_test.rs"]
mod pump_test;
