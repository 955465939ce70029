//! Aborting blocking engine and container calls from another task.

use tokio_util::sync::CancellationToken;

use crate::{
    engine::{Decode, Demux, Encode, Mux},
    error::{Error, Result},
    frame::Frame,
    packet::Packet,
    rational::TimeBase,
};

/// Polled before every blocking call; once the token is cancelled the call
/// fails with [`Error::Exit`].
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    cancel: CancellationToken,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_interrupted() {
            return Err(Error::Exit);
        }
        Ok(())
    }
}

/// Engine or container whose calls all go through an [`Interrupt`].
#[derive(Debug)]
pub struct Interruptible<T> {
    inner: T,
    interrupt: Interrupt,
}

impl<T> Interruptible<T> {
    pub fn new(inner: T, interrupt: Interrupt) -> Self {
        Self { inner, interrupt }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Decode> Decode for Interruptible<T> {
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        self.interrupt.check()?;
        self.inner.send_packet(packet)
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        self.interrupt.check()?;
        self.inner.receive_frame(frame)
    }
}

impl<T: Encode> Encode for Interruptible<T> {
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        self.interrupt.check()?;
        self.inner.send_frame(frame)
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        self.interrupt.check()?;
        self.inner.receive_packet(packet)
    }
}

impl<T: Demux> Demux for Interruptible<T> {
    fn stream_count(&self) -> usize {
        self.inner.stream_count()
    }

    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        self.inner.time_base(stream)
    }

    fn read_packet(&mut self, packet: &mut Packet) -> Result<()> {
        self.interrupt.check()?;
        self.inner.read_packet(packet)
    }
}

impl<T: Mux> Mux for Interruptible<T> {
    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        self.inner.time_base(stream)
    }

    fn write_interleaved(&mut self, packet: &mut Packet) -> Result<()> {
        self.interrupt.check()?;
        self.inner.write_interleaved(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodePump;
    use crate::error::ErrorKind;
    use crate::mock::{MockCodec, MockDemuxer, MockMuxer};
    use crate::remux::Remuxer;
    use crate::stream::StreamMapping;

    #[test]
    fn check_fails_once_interrupted() {
        let interrupt = Interrupt::new();
        assert!(interrupt.check().is_ok());
        interrupt.token().cancel();
        assert!(matches!(interrupt.check(), Err(Error::Exit)));
        assert_eq!(Error::Exit.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn interrupted_decoder_aborts_the_pump() {
        let interrupt = Interrupt::new();
        let mut decoder = Interruptible::new(MockCodec::decoder(), interrupt.clone());
        let mut pump = DecodePump::new();
        let mut packet = Packet::copy(&[1]);
        assert!(pump.decode(&mut decoder, Some(&packet), |_| Ok(())).is_ok());

        interrupt.interrupt();
        packet.unref();
        packet.set_data(vec![2u8]);
        let err = pump
            .decode(&mut decoder, Some(&packet), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::Exit));
        assert_eq!(pump.stats().submitted, 1);
    }

    #[test]
    fn interrupted_remux_stops_reading() {
        let interrupt = Interrupt::new();
        interrupt.interrupt();
        let mut demuxer = Interruptible::new(
            MockDemuxer::new(vec![TimeBase::MPEG], [Packet::copy(&[0])]),
            interrupt,
        );
        let mut muxer = MockMuxer::new(vec![TimeBase::MPEG]);
        let err = Remuxer::new(StreamMapping::identity(1))
            .remux_all(&mut demuxer, &mut muxer)
            .unwrap_err();
        assert!(matches!(err, Error::Exit));
        assert!(muxer.written().is_empty());
        assert_eq!(demuxer.get_ref().stream_count(), 1);
    }
}
