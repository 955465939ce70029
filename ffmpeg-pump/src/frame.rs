use bytes::Bytes;

use crate::format::{FrameFormat, PixelFormat, SampleFormat};
use crate::rescale::NOPTS_VALUE;

pub type FrameSender = tokio::sync::broadcast::Sender<FrameCmd>;
pub type FrameReceiver = tokio::sync::broadcast::Receiver<FrameCmd>;

#[derive(Clone, Debug)]
pub enum FrameCmd {
    Data(Frame),
    Eof,
}

/// An uncompressed data unit: a video picture or a run of audio samples.
///
/// A frame with no planes is the flush sentinel when handed to an encoder.
#[derive(Clone, Debug)]
pub struct Frame {
    planes: Vec<Bytes>,
    linesize: Vec<usize>,
    format: FrameFormat,
    pts: i64,
    width: u32,
    height: u32,
    samples: usize,
    channels: usize,
    key: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl Frame {
    pub fn empty() -> Self {
        Self {
            planes: Vec::new(),
            linesize: Vec::new(),
            format: FrameFormat::None,
            pts: NOPTS_VALUE,
            width: 0,
            height: 0,
            samples: 0,
            channels: 0,
            key: false,
        }
    }

    /// Allocates a zeroed picture.
    pub fn video(format: PixelFormat, width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let layout: Vec<(usize, usize)> = match format {
            PixelFormat::Yuv420p => vec![(w, h), (cw, ch), (cw, ch)],
            PixelFormat::Yuv422p => vec![(w, h), (cw, h), (cw, h)],
            PixelFormat::Yuv444p => vec![(w, h), (w, h), (w, h)],
            PixelFormat::Nv12 => vec![(w, h), (cw * 2, ch)],
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => vec![(w * 3, h)],
            PixelFormat::Rgba | PixelFormat::Bgra => vec![(w * 4, h)],
            PixelFormat::Gray8 => vec![(w, h)],
        };

        Self {
            planes: layout
                .iter()
                .map(|(line, rows)| Bytes::from(vec![0u8; line * rows]))
                .collect(),
            linesize: layout.iter().map(|(line, _)| *line).collect(),
            format: FrameFormat::Video(format),
            width,
            height,
            ..Self::empty()
        }
    }

    /// Allocates `samples` zeroed samples for each of `channels` channels.
    pub fn audio(format: SampleFormat, samples: usize, channels: usize) -> Self {
        let bytes = format.bytes_per_sample();
        let (count, line) = if format.is_planar() {
            (channels, samples * bytes)
        } else {
            (1, samples * bytes * channels)
        };

        Self {
            planes: (0..count).map(|_| Bytes::from(vec![0u8; line])).collect(),
            linesize: vec![line; count],
            format: FrameFormat::Audio(format),
            samples,
            channels,
            ..Self::empty()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn planes(&self) -> usize {
        self.planes.len()
    }

    pub fn data(&self, index: usize) -> &[u8] {
        self.planes.get(index).map(|p| &p[..]).unwrap_or(&[])
    }

    pub fn linesize(&self, index: usize) -> usize {
        self.linesize.get(index).copied().unwrap_or(0)
    }

    /// Replaces or appends plane `index`.
    pub fn set_plane(&mut self, index: usize, data: impl Into<Bytes>, linesize: usize) {
        let data = data.into();
        if index < self.planes.len() {
            self.planes[index] = data;
            self.linesize[index] = linesize;
        } else {
            self.planes.push(data);
            self.linesize.push(linesize);
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn set_format(&mut self, format: FrameFormat) {
        self.format = format;
    }

    pub fn pts(&self) -> Option<i64> {
        (self.pts != NOPTS_VALUE).then_some(self.pts)
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts.unwrap_or(NOPTS_VALUE);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn set_samples(&mut self, samples: usize, channels: usize) {
        self.samples = samples;
        self.channels = channels;
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn set_key(&mut self, key: bool) {
        self.key = key;
    }

    /// Releases every plane and resets the frame for reuse.
    pub fn unref(&mut self) {
        *self = Self::empty();
    }
}
