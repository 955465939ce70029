use serde::{Deserialize, Serialize};

/// Kind of data carried by a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl MediaType {
    /// Streams a remux keeps by default; data and attachment streams are dropped.
    pub fn is_remuxable(self) -> bool {
        matches!(self, MediaType::Video | MediaType::Audio | MediaType::Subtitle)
    }
}

/// Video pixel formats. A subset of what the native library knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum PixelFormat {
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Nv12,
    Rgb24,
    Bgr24,
    Rgba,
    Bgra,
    Gray8,
}

impl PixelFormat {
    /// Number of data planes a frame in this format carries.
    pub const fn planes(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 => 2,
            Self::Rgb24 | Self::Bgr24 | Self::Rgba | Self::Bgra | Self::Gray8 => 1,
        }
    }
}

/// Audio sample formats, packed and planar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    U8p,
    S16p,
    S32p,
    Fltp,
    Dblp,
}

impl SampleFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::Flt | Self::Fltp => 4,
            Self::Dbl | Self::Dblp => 8,
        }
    }

    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::Fltp | Self::Dblp
        )
    }
}

/// Format tag of a [`Frame`](crate::frame::Frame).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    #[default]
    None,
    Video(PixelFormat),
    Audio(SampleFormat),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remuxable_media() {
        assert!(MediaType::Video.is_remuxable());
        assert!(MediaType::Subtitle.is_remuxable());
        assert!(!MediaType::Data.is_remuxable());
        assert!(!MediaType::Attachment.is_remuxable());
    }

    #[test]
    fn plane_counts() {
        assert_eq!(PixelFormat::Yuv420p.planes(), 3);
        assert_eq!(PixelFormat::Nv12.planes(), 2);
        assert_eq!(PixelFormat::Rgba.planes(), 1);
        assert!(SampleFormat::Fltp.is_planar());
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
    }
}
