use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::{
    engine::Decode,
    error::{ErrorKind, Result},
    frame::{Frame, FrameCmd, FrameReceiver, FrameSender},
    packet::{Packet, PacketCmd, PacketReceiver},
    pump::{self, Decoding, Drained, PumpStats},
};

/// Drives a [`Decode`] engine: one packet in, every available frame out.
///
/// The pump owns the frame it decodes into and reuses it for the whole
/// lifetime of the loop.
pub struct DecodePump {
    frame: Frame,
    stats: PumpStats,
}

impl Default for DecodePump {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodePump {
    pub fn new() -> Self {
        Self {
            frame: Frame::empty(),
            stats: PumpStats::default(),
        }
    }

    /// Submits `packet` and hands every frame the decoder can produce to
    /// `on_frame`. `None` or an empty packet flushes the decoder.
    ///
    /// The packet stays owned by the caller, who unrefs it afterwards.
    pub fn decode<D, F>(
        &mut self,
        decoder: &mut D,
        packet: Option<&Packet>,
        on_frame: F,
    ) -> Result<Drained>
    where
        D: Decode + ?Sized,
        F: FnMut(&Frame) -> Result<()>,
    {
        let packet = packet.filter(|p| !p.is_empty());
        pump::run(
            &mut Decoding(decoder),
            packet,
            &mut self.frame,
            on_frame,
            &mut self.stats,
        )
    }

    pub fn flush<D, F>(&mut self, decoder: &mut D, on_frame: F) -> Result<Drained>
    where
        D: Decode + ?Sized,
        F: FnMut(&Frame) -> Result<()>,
    {
        self.decode(decoder, None, on_frame)
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }
}

/// One-shot form of [`DecodePump::decode`].
pub fn decode_all<D, F>(decoder: &mut D, packet: Option<&Packet>, on_frame: F) -> Result<Drained>
where
    D: Decode + ?Sized,
    F: FnMut(&Frame) -> Result<()>,
{
    DecodePump::new().decode(decoder, packet, on_frame)
}

/// Runs a decoder on a blocking thread, fed from a packet broadcast and
/// publishing frames on its own broadcast channel.
pub struct DecoderTask {
    cancel: CancellationToken,
    frame_chan: FrameSender,
}

impl Default for DecoderTask {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderTask {
    pub fn new() -> Self {
        let cancel = CancellationToken::new();
        let (sender, _) = tokio::sync::broadcast::channel(1024);

        Self {
            cancel,
            frame_chan: sender,
        }
    }

    pub fn subscribe(&self) -> FrameReceiver {
        self.frame_chan.subscribe()
    }

    /// Decoded frames as a stream; lagged receivers skip what they missed.
    pub fn stream(&self) -> impl Stream<Item = FrameCmd> + Send + 'static {
        BroadcastStream::new(self.frame_chan.subscribe())
            .filter_map(|cmd| futures::future::ready(cmd.ok()))
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts decoding packets of `stream_index` (every stream when `None`).
    ///
    /// The decoder is moved to a blocking thread and stays there. The
    /// returned handle resolves to the pump statistics once the decoder has
    /// been flushed or the task was stopped.
    pub fn start<D>(
        &self,
        decoder: D,
        mut packets: PacketReceiver,
        stream_index: Option<usize>,
    ) -> tokio::task::JoinHandle<PumpStats>
    where
        D: Decode + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let sender = self.frame_chan.clone();
        tokio::spawn(async move {
            let (packet_tx, packet_rx) = std::sync::mpsc::channel::<PacketCmd>();

            let handle_cancel = cancel.clone();
            let handle = tokio::task::spawn_blocking(move || {
                Self::decoder_loop(decoder, handle_cancel, packet_rx, sender)
            });
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break;
                    }
                    packet = packets.recv() => {
                        match packet {
                            Ok(PacketCmd::Data(packet)) => {
                                if stream_index.is_some_and(|index| packet.stream() != index) {
                                    continue;
                                }
                                if packet_tx.send(PacketCmd::Data(packet)).is_err() {
                                    break;
                                }
                            }
                            Ok(PacketCmd::Eof) | Err(RecvError::Closed) => {
                                let _ = packet_tx.send(PacketCmd::Eof);
                                break;
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                log::warn!("decoder input lagged, {} packets skipped", skipped);
                            }
                        }
                    }
                }
            }
            drop(packet_tx);
            handle.await.unwrap_or_else(|e| {
                log::error!("decoder thread failed: {}", e);
                PumpStats::default()
            })
        })
    }

    fn decoder_loop<D: Decode>(
        mut decoder: D,
        cancel: CancellationToken,
        packet_rx: std::sync::mpsc::Receiver<PacketCmd>,
        out_sender: FrameSender,
    ) -> PumpStats {
        let mut pump = DecodePump::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let packet = match packet_rx.recv_timeout(Duration::from_millis(1)) {
                Ok(PacketCmd::Data(packet)) => Some(packet),
                Ok(PacketCmd::Eof) => None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let result = pump.decode(&mut decoder, packet.as_ref(), |frame| {
                let _ = out_sender.send(FrameCmd::Data(frame.clone()));
                Ok(())
            });
            match result {
                Ok(drained) if drained.is_terminal() => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Codec => {
                    log::warn!("skipping undecodable packet: {}", e);
                }
                Err(e) => {
                    log::error!("decoder failed: {}", e);
                    break;
                }
            }
        }

        let stats = pump.stats();
        log::debug!(
            "decoder loop finished, {} packets in, {} frames out",
            stats.submitted,
            stats.emitted
        );
        let _ = out_sender.send(FrameCmd::Eof);
        stats
    }
}
