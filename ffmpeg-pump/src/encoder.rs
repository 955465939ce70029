use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::{
    engine::Encode,
    error::{ErrorKind, Result},
    frame::{Frame, FrameCmd, FrameReceiver},
    packet::{Packet, PacketCmd, PacketReceiver, PacketSender},
    pump::{self, Drained, Encoding, PumpStats},
};

/// Drives an [`Encode`] engine: one frame in, every available packet out.
pub struct EncodePump {
    packet: Packet,
    stats: PumpStats,
}

impl Default for EncodePump {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodePump {
    pub fn new() -> Self {
        Self {
            packet: Packet::empty(),
            stats: PumpStats::default(),
        }
    }

    /// Submits `frame` and hands every packet the encoder can produce to
    /// `on_packet`. `None` or a frame without planes flushes the encoder.
    pub fn encode<E, F>(
        &mut self,
        encoder: &mut E,
        frame: Option<&Frame>,
        on_packet: F,
    ) -> Result<Drained>
    where
        E: Encode + ?Sized,
        F: FnMut(&Packet) -> Result<()>,
    {
        let frame = frame.filter(|f| !f.is_empty());
        pump::run(
            &mut Encoding(encoder),
            frame,
            &mut self.packet,
            on_packet,
            &mut self.stats,
        )
    }

    pub fn flush<E, F>(&mut self, encoder: &mut E, on_packet: F) -> Result<Drained>
    where
        E: Encode + ?Sized,
        F: FnMut(&Packet) -> Result<()>,
    {
        self.encode(encoder, None, on_packet)
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }
}

/// One-shot form of [`EncodePump::encode`].
pub fn encode_all<E, F>(encoder: &mut E, frame: Option<&Frame>, on_packet: F) -> Result<Drained>
where
    E: Encode + ?Sized,
    F: FnMut(&Packet) -> Result<()>,
{
    EncodePump::new().encode(encoder, frame, on_packet)
}

/// Encoder output is compressed and small; a moderate capacity absorbs bursts.
const PACKET_CHAN_CAP: usize = 64;

pub struct EncoderTask {
    cancel: CancellationToken,
    packet_chan: PacketSender,
}

impl Default for EncoderTask {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderTask {
    pub fn new() -> Self {
        let cancel = CancellationToken::new();
        let (sender, _) = tokio::sync::broadcast::channel(PACKET_CHAN_CAP);

        Self {
            cancel,
            packet_chan: sender,
        }
    }

    pub fn subscribe(&self) -> PacketReceiver {
        self.packet_chan.subscribe()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts encoding frames; every packet produced is tagged with
    /// `stream_index`.
    ///
    /// Frames are queued for the encoder thread without loss, however far
    /// behind it falls.
    pub fn start<E>(
        &self,
        encoder: E,
        mut frames: FrameReceiver,
        stream_index: usize,
    ) -> tokio::task::JoinHandle<PumpStats>
    where
        E: Encode + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let sender = self.packet_chan.clone();
        log::info!("encoder loop started, stream index: {}", stream_index);
        tokio::spawn(async move {
            let (tx, rx) = std::sync::mpsc::channel::<FrameCmd>();
            let handle_cancel = cancel.clone();
            let handle = tokio::task::spawn_blocking(move || {
                Self::encoder_loop(encoder, handle_cancel, rx, sender, stream_index)
            });
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break;
                    }
                    frame = frames.recv() => {
                        let ok = match frame {
                            Ok(FrameCmd::Data(frame)) => tx.send(FrameCmd::Data(frame)).is_ok(),
                            Ok(FrameCmd::Eof) | Err(RecvError::Closed) => {
                                let _ = tx.send(FrameCmd::Eof);
                                false
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                log::warn!("encoder input lagged, {} frames skipped", skipped);
                                true
                            }
                        };
                        if !ok {
                            break;
                        }
                    }
                }
            }
            drop(tx);
            let stats = handle.await.unwrap_or_else(|e| {
                log::error!("encoder thread failed: {}", e);
                PumpStats::default()
            });
            log::info!("encoder task finished");
            stats
        })
    }

    fn encoder_loop<E: Encode>(
        mut encoder: E,
        cancel: CancellationToken,
        rx: std::sync::mpsc::Receiver<FrameCmd>,
        out: PacketSender,
        stream_index: usize,
    ) -> PumpStats {
        let mut pump = EncodePump::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let frame = match rx.recv_timeout(Duration::from_millis(1)) {
                Ok(FrameCmd::Data(frame)) => Some(frame),
                Ok(FrameCmd::Eof) => None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let result = pump.encode(&mut encoder, frame.as_ref(), |packet| {
                let mut packet = packet.clone();
                packet.set_stream(stream_index);
                let _ = out.send(PacketCmd::Data(packet));
                Ok(())
            });
            match result {
                Ok(drained) if drained.is_terminal() => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Codec => {
                    log::warn!("skipping frame the encoder rejected: {}", e);
                }
                Err(e) => {
                    log::error!("encoder failed: {}", e);
                    break;
                }
            }
        }

        let stats = pump.stats();
        log::debug!(
            "end of encode loop, stream {}: {} frames in, {} packets out",
            stream_index,
            stats.submitted,
            stats.emitted
        );
        let _ = out.send(PacketCmd::Eof);
        stats
    }
}
