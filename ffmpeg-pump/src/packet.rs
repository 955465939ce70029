use std::ops::{BitOr, BitOrAssign};

use bytes::Bytes;

use crate::rational::TimeBase;
use crate::rescale::{NOPTS_VALUE, rescale_q};

pub type PacketSender = tokio::sync::broadcast::Sender<PacketCmd>;
pub type PacketReceiver = tokio::sync::broadcast::Receiver<PacketCmd>;

/// Byte position value meaning "not known".
pub const UNKNOWN_POSITION: i64 = -1;

#[derive(Clone, Debug)]
pub enum PacketCmd {
    Data(Packet),
    Eof,
}

/// Packet flag set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PacketFlags(u32);

impl PacketFlags {
    /// The packet contains a keyframe.
    pub const KEY: PacketFlags = PacketFlags(0x0001);
    /// The packet content is corrupted.
    pub const CORRUPT: PacketFlags = PacketFlags(0x0002);
    /// Required for decoder state but not for output, drop after decoding.
    pub const DISCARD: PacketFlags = PacketFlags(0x0004);
    /// The packet comes from a trusted source.
    pub const TRUSTED: PacketFlags = PacketFlags(0x0008);
    /// Frames that can be discarded by the decoder.
    pub const DISPOSABLE: PacketFlags = PacketFlags(0x0010);

    const ALL: u32 = 0x001f;

    pub const fn empty() -> Self {
        PacketFlags(0)
    }

    pub const fn from_bits_truncate(bits: u32) -> Self {
        PacketFlags(bits & Self::ALL)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PacketFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PacketFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for PacketFlags {
    type Output = PacketFlags;

    fn bitor(self, rhs: PacketFlags) -> PacketFlags {
        PacketFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PacketFlags {
    fn bitor_assign(&mut self, rhs: PacketFlags) {
        self.0 |= rhs.0;
    }
}

/// A compressed data unit.
///
/// A packet with no data is the flush sentinel when handed to an engine.
#[derive(Clone, Debug)]
pub struct Packet {
    data: Bytes,
    pts: i64,
    dts: i64,
    duration: i64,
    stream: usize,
    position: i64,
    flags: PacketFlags,
}

impl Default for Packet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Packet {
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            stream: 0,
            position: UNKNOWN_POSITION,
            flags: PacketFlags::empty(),
        }
    }

    pub fn copy(data: &[u8]) -> Self {
        Self::from(Bytes::copy_from_slice(data))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the packet payload.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pts(&self) -> Option<i64> {
        (self.pts != NOPTS_VALUE).then_some(self.pts)
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts.unwrap_or(NOPTS_VALUE);
    }

    pub fn dts(&self) -> Option<i64> {
        (self.dts != NOPTS_VALUE).then_some(self.dts)
    }

    pub fn set_dts(&mut self, dts: Option<i64>) {
        self.dts = dts.unwrap_or(NOPTS_VALUE);
    }

    /// Raw pts, [`NOPTS_VALUE`] when unknown.
    pub fn raw_pts(&self) -> i64 {
        self.pts
    }

    /// Raw dts, [`NOPTS_VALUE`] when unknown.
    pub fn raw_dts(&self) -> i64 {
        self.dts
    }

    pub(crate) fn set_raw_timestamps(&mut self, pts: i64, dts: i64, duration: i64) {
        self.pts = pts;
        self.dts = dts;
        self.duration = duration;
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.duration = duration;
    }

    pub fn stream(&self) -> usize {
        self.stream
    }

    pub fn set_stream(&mut self, index: usize) {
        self.stream = index;
    }

    pub fn position(&self) -> Option<i64> {
        (self.position >= 0).then_some(self.position)
    }

    /// Negative values mean unknown.
    pub fn set_position(&mut self, position: i64) {
        self.position = if position < 0 {
            UNKNOWN_POSITION
        } else {
            position
        };
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PacketFlags) {
        self.flags = flags;
    }

    pub fn is_key(&self) -> bool {
        self.flags.contains(PacketFlags::KEY)
    }

    /// Releases the payload and resets every field, leaving the packet ready
    /// to be filled again.
    pub fn unref(&mut self) {
        *self = Self::empty();
    }

    /// Converts known timestamps and a positive duration from `from` to `to`.
    pub fn rescale_ts(&mut self, from: TimeBase, to: TimeBase) {
        if self.pts != NOPTS_VALUE {
            self.pts = rescale_q(self.pts, from, to);
        }
        if self.dts != NOPTS_VALUE {
            self.dts = rescale_q(self.dts, from, to);
        }
        if self.duration > 0 {
            self.duration = rescale_q(self.duration, from, to);
        }
    }
}

impl From<Bytes> for Packet {
    fn from(data: Bytes) -> Self {
        Self {
            data,
            ..Self::empty()
        }
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_packet_is_flush_sentinel() {
        let pkt = Packet::empty();
        assert!(pkt.is_empty());
        assert_eq!(pkt.pts(), None);
        assert_eq!(pkt.dts(), None);
        assert_eq!(pkt.position(), None);
        assert!(Packet::copy(&[]).is_empty());
    }

    #[test]
    fn unref_resets_everything() {
        let mut pkt = Packet::copy(&[1, 2, 3]);
        pkt.set_pts(Some(10));
        pkt.set_dts(Some(9));
        pkt.set_duration(2);
        pkt.set_stream(3);
        pkt.set_position(4096);
        pkt.set_flags(PacketFlags::KEY);
        assert_eq!(pkt.size(), 3);
        assert!(pkt.is_key());

        pkt.unref();
        assert!(pkt.is_empty());
        assert_eq!(pkt.pts(), None);
        assert_eq!(pkt.duration(), 0);
        assert_eq!(pkt.stream(), 0);
        assert_eq!(pkt.position(), None);
        assert!(pkt.flags().is_empty());
    }

    #[test]
    fn rescale_ts_keeps_unknown() {
        let mut pkt = Packet::copy(&[0]);
        pkt.set_pts(Some(90000));
        pkt.set_duration(3000);
        pkt.rescale_ts(TimeBase::MPEG, TimeBase::MILLISECONDS);
        assert_eq!(pkt.pts(), Some(1000));
        assert_eq!(pkt.dts(), None);
        assert_eq!(pkt.duration(), 33);
    }

    #[test]
    fn flags() {
        let mut flags = PacketFlags::KEY | PacketFlags::TRUSTED;
        assert!(flags.contains(PacketFlags::KEY));
        assert!(!flags.contains(PacketFlags::CORRUPT));
        flags.remove(PacketFlags::KEY);
        assert_eq!(flags, PacketFlags::TRUSTED);
        flags |= PacketFlags::DISCARD;
        assert_eq!(flags.bits(), 0x000c);
        assert_eq!(PacketFlags::from_bits_truncate(0xffff).bits(), 0x001f);
    }

    #[test]
    fn negative_position_is_unknown() {
        let mut pkt = Packet::empty();
        pkt.set_position(-7);
        assert_eq!(pkt.position(), None);
        pkt.set_position(0);
        assert_eq!(pkt.position(), Some(0));
    }
}
