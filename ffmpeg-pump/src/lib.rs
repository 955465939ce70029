//! Send/receive pumps, timestamp rescaling and stream copy over codec and
//! container engines.
//!
//! The engines themselves sit behind the [`Decode`], [`Encode`], [`Demux`]
//! and [`Mux`] traits. With the `ffmpeg` feature, [`ffmpeg`] binds them to
//! the native libraries; [`mock`] provides deterministic in-memory versions.

pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod format;
pub mod frame;
pub mod interrupt;
pub mod mock;
pub mod options;
pub mod packet;
mod pump;
pub mod rational;
pub mod remux;
pub mod rescale;
pub mod stream;

pub use decoder::{DecodePump, DecoderTask, decode_all};
pub use encoder::{EncodePump, EncoderTask, encode_all};
pub use engine::{Decode, Demux, Encode, Mux};
pub use error::{Error, ErrorKind, Result};
pub use format::{FrameFormat, MediaType, PixelFormat, SampleFormat};
pub use frame::{Frame, FrameCmd};
pub use interrupt::{Interrupt, Interruptible};
pub use options::Options;
pub use packet::{Packet, PacketCmd, PacketFlags};
pub use pump::{Drained, PumpStats};
pub use rational::{Rational, TimeBase};
pub use remux::{RemuxStats, Remuxer, Routed, remux_timestamps, split_all};
pub use rescale::{NOPTS_VALUE, Rnd, Rounding, compare_ts, rescale_q, rescale_q_rnd, rescale_rnd};
pub use stream::{StreamInfo, StreamMapping};
