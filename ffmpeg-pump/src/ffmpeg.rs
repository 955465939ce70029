//! Engine and container adapters over the native FFmpeg libraries.

use std::collections::HashMap;
use std::path::Path;

use ffmpeg_next::{Dictionary, format::Pixel, format::Sample, format::sample::Type as SampleType};

use crate::{
    engine::{Decode, Demux, Encode, Mux},
    error::{Error, Result},
    format::{FrameFormat, MediaType, PixelFormat, SampleFormat},
    frame::Frame,
    options::Options,
    packet::{Packet, PacketFlags},
    rational::TimeBase,
    remux::{RemuxStats, Remuxer},
    stream::{StreamInfo, StreamMapping},
};

/// Registers FFmpeg components. Call once at startup.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

impl From<ffmpeg_next::Error> for Error {
    fn from(err: ffmpeg_next::Error) -> Self {
        Error::from_code(i32::from(err))
    }
}

fn time_base(rate: ffmpeg_next::Rational) -> Option<TimeBase> {
    TimeBase::new(rate.numerator(), rate.denominator()).ok()
}

fn media_type(medium: ffmpeg_next::media::Type) -> MediaType {
    use ffmpeg_next::media::Type;
    match medium {
        Type::Video => MediaType::Video,
        Type::Audio => MediaType::Audio,
        Type::Subtitle => MediaType::Subtitle,
        Type::Data => MediaType::Data,
        Type::Attachment => MediaType::Attachment,
        Type::Unknown => MediaType::Unknown,
    }
}

fn to_dictionary(options: &Options) -> Dictionary<'static> {
    let mut dict = Dictionary::new();
    for (key, value) in options.iter() {
        dict.set(key, value);
    }
    dict
}

/// What an open call left in its option dictionary.
fn leftovers(dict: &Dictionary) -> Options {
    dict.iter().collect()
}

fn pixel_format(format: Pixel) -> Option<PixelFormat> {
    Some(match format {
        Pixel::YUV420P => PixelFormat::Yuv420p,
        Pixel::YUV422P => PixelFormat::Yuv422p,
        Pixel::YUV444P => PixelFormat::Yuv444p,
        Pixel::NV12 => PixelFormat::Nv12,
        Pixel::RGB24 => PixelFormat::Rgb24,
        Pixel::BGR24 => PixelFormat::Bgr24,
        Pixel::RGBA => PixelFormat::Rgba,
        Pixel::BGRA => PixelFormat::Bgra,
        Pixel::GRAY8 => PixelFormat::Gray8,
        _ => return None,
    })
}

fn native_pixel_format(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Gray8 => Pixel::GRAY8,
    }
}

fn sample_format(format: Sample) -> Option<SampleFormat> {
    Some(match format {
        Sample::U8(SampleType::Packed) => SampleFormat::U8,
        Sample::I16(SampleType::Packed) => SampleFormat::S16,
        Sample::I32(SampleType::Packed) => SampleFormat::S32,
        Sample::F32(SampleType::Packed) => SampleFormat::Flt,
        Sample::F64(SampleType::Packed) => SampleFormat::Dbl,
        Sample::U8(SampleType::Planar) => SampleFormat::U8p,
        Sample::I16(SampleType::Planar) => SampleFormat::S16p,
        Sample::I32(SampleType::Planar) => SampleFormat::S32p,
        Sample::F32(SampleType::Planar) => SampleFormat::Fltp,
        Sample::F64(SampleType::Planar) => SampleFormat::Dblp,
        _ => return None,
    })
}

fn to_native_packet(packet: &Packet) -> ffmpeg_next::Packet {
    let mut native = ffmpeg_next::Packet::copy(packet.data());
    native.set_pts(packet.pts());
    native.set_dts(packet.dts());
    native.set_duration(packet.duration());
    native.set_stream(packet.stream());
    native.set_position(packet.position().unwrap_or(-1) as isize);
    native.set_flags(ffmpeg_next::packet::Flags::from_bits_truncate(
        packet.flags().bits() as i32,
    ));
    native
}

fn from_native_packet(native: &ffmpeg_next::Packet, packet: &mut Packet) {
    packet.set_data(
        native
            .data()
            .map(bytes::Bytes::copy_from_slice)
            .unwrap_or_default(),
    );
    packet.set_pts(native.pts());
    packet.set_dts(native.dts());
    packet.set_duration(native.duration());
    packet.set_stream(native.stream());
    packet.set_position(native.position() as i64);
    packet.set_flags(PacketFlags::from_bits_truncate(native.flags().bits() as u32));
}

enum Scratch {
    Video(ffmpeg_next::frame::Video),
    Audio(ffmpeg_next::frame::Audio),
}

/// An opened native decoder.
pub struct FfmpegDecoder {
    inner: ffmpeg_next::decoder::Opened,
    scratch: Scratch,
}

// The decoder is only ever used from the thread it was moved to.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    /// Opens a decoder for `stream` of `input`.
    pub fn from_stream(input: &FfmpegDemuxer, stream: usize) -> Result<Self> {
        let st = input
            .inner
            .stream(stream)
            .ok_or_else(|| Error::invalid_argument(format!("no input stream {stream}")))?;
        let mut ctx = ffmpeg_next::codec::Context::new();
        ctx.set_parameters(st.parameters())?;

        match media_type(st.parameters().medium()) {
            MediaType::Video => {
                let decoder = ctx.decoder().video()?;
                Ok(Self {
                    inner: decoder.0,
                    scratch: Scratch::Video(ffmpeg_next::frame::Video::empty()),
                })
            }
            MediaType::Audio => {
                let decoder = ctx.decoder().audio()?;
                Ok(Self {
                    inner: decoder.0,
                    scratch: Scratch::Audio(ffmpeg_next::frame::Audio::empty()),
                })
            }
            other => Err(Error::invalid_argument(format!(
                "no decoder for {other:?} streams"
            ))),
        }
    }
}

impl Decode for FfmpegDecoder {
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        match packet {
            Some(packet) => self.inner.send_packet(&to_native_packet(packet))?,
            None => self.inner.send_eof()?,
        }
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        match &mut self.scratch {
            Scratch::Video(native) => {
                self.inner.receive_frame(native)?;
                let format = pixel_format(native.format()).ok_or_else(|| {
                    Error::codec(format!("unsupported pixel format {:?}", native.format()))
                })?;
                for plane in 0..native.planes() {
                    frame.set_plane(
                        plane,
                        bytes::Bytes::copy_from_slice(native.data(plane)),
                        native.stride(plane),
                    );
                }
                frame.set_format(FrameFormat::Video(format));
                frame.set_dimensions(native.width(), native.height());
                frame.set_pts(native.pts());
                frame.set_key(native.is_key());
            }
            Scratch::Audio(native) => {
                self.inner.receive_frame(native)?;
                let format = sample_format(native.format()).ok_or_else(|| {
                    Error::codec(format!("unsupported sample format {:?}", native.format()))
                })?;
                for plane in 0..native.planes() {
                    let data = native.data(plane);
                    frame.set_plane(plane, bytes::Bytes::copy_from_slice(data), data.len());
                }
                frame.set_format(FrameFormat::Audio(format));
                frame.set_samples(native.samples(), native.channels() as usize);
                frame.set_pts(native.pts());
            }
        }
        Ok(())
    }
}

/// Settings for [`FfmpegEncoder::open_video`].
#[derive(Clone, Debug)]
pub struct VideoSettings {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub time_base: TimeBase,
    pub options: Options,
}

impl Default for VideoSettings {
    fn default() -> Self {
        let mut options = Options::new();
        options.set("preset", "ultrafast").set("tune", "zerolatency");
        Self {
            codec: "libx264".to_string(),
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Yuv420p,
            time_base: TimeBase::MICROSECONDS,
            options,
        }
    }
}

/// An opened native video encoder.
pub struct FfmpegEncoder {
    inner: ffmpeg_next::codec::encoder::Video,
    time_base: TimeBase,
}

unsafe impl Send for FfmpegEncoder {}

impl FfmpegEncoder {
    pub fn open_video(settings: &VideoSettings) -> Result<Self> {
        let codec = ffmpeg_next::encoder::find_by_name(&settings.codec).ok_or_else(|| {
            Error::invalid_argument(format!("codec not found: {}", settings.codec))
        })?;
        let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = ctx.encoder().video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(native_pixel_format(settings.pixel_format));
        encoder.set_time_base(ffmpeg_next::Rational::new(
            settings.time_base.num(),
            settings.time_base.den(),
        ));

        let encoder = encoder.open_with(to_dictionary(&settings.options))?;
        log::info!("encoder opened successfully: {}", settings.codec);

        Ok(Self {
            inner: encoder,
            time_base: settings.time_base,
        })
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }
}

impl Encode for FfmpegEncoder {
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        let Some(frame) = frame else {
            self.inner.send_eof()?;
            return Ok(());
        };
        let FrameFormat::Video(format) = frame.format() else {
            return Err(Error::invalid_argument("only video frames can be encoded"));
        };

        let mut native = ffmpeg_next::frame::Video::new(
            native_pixel_format(format),
            frame.width(),
            frame.height(),
        );
        for plane in 0..frame.planes().min(native.planes()) {
            let src = frame.data(plane);
            let src_stride = frame.linesize(plane);
            let dst_stride = native.stride(plane);
            let row = src_stride.min(dst_stride);
            if src_stride == 0 {
                continue;
            }
            let dst = native.data_mut(plane);
            for (src_row, dst_row) in src.chunks(src_stride).zip(dst.chunks_mut(dst_stride)) {
                let len = row.min(src_row.len()).min(dst_row.len());
                dst_row[..len].copy_from_slice(&src_row[..len]);
            }
        }
        native.set_pts(frame.pts());
        if frame.is_key() {
            native.set_kind(ffmpeg_next::picture::Type::I);
        }
        self.inner.send_frame(&native)?;
        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        let mut native = ffmpeg_next::Packet::empty();
        self.inner.receive_packet(&mut native)?;
        from_native_packet(&native, packet);
        Ok(())
    }
}

/// A container opened for reading.
pub struct FfmpegDemuxer {
    inner: ffmpeg_next::format::context::Input,
    streams: Vec<StreamInfo>,
}

unsafe impl Send for FfmpegDemuxer {}

impl FfmpegDemuxer {
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let path = path.as_ref();
        let inner = if options.is_empty() {
            ffmpeg_next::format::input(path)?
        } else {
            ffmpeg_next::format::input_with_dictionary(path, to_dictionary(options))?
        };

        let streams = inner
            .streams()
            .filter_map(|st| {
                let tb = time_base(st.time_base())?;
                Some(StreamInfo::new(st.index(), media_type(st.parameters().medium()), tb))
            })
            .collect();

        Ok(Self { inner, streams })
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }
}

impl Demux for FfmpegDemuxer {
    fn stream_count(&self) -> usize {
        self.inner.nb_streams() as usize
    }

    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        self.inner.stream(stream).and_then(|st| time_base(st.time_base()))
    }

    fn read_packet(&mut self, packet: &mut Packet) -> Result<()> {
        let mut native = ffmpeg_next::Packet::empty();
        native.read(&mut self.inner)?;
        from_native_packet(&native, packet);
        Ok(())
    }
}

/// A container opened for writing.
///
/// Streams are added first, then [`FfmpegMuxer::write_header`] fixes the
/// output time bases. Packets are accepted only after that, and the trailer
/// is written by [`FfmpegMuxer::finish`].
pub struct FfmpegMuxer {
    inner: ffmpeg_next::format::context::Output,
    have_written_header: bool,
    have_written_trailer: bool,
}

unsafe impl Send for FfmpegMuxer {}

impl FfmpegMuxer {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let inner = ffmpeg_next::format::output(path.as_ref())?;
        Ok(Self {
            inner,
            have_written_header: false,
            have_written_trailer: false,
        })
    }

    /// Adds an output stream copying the codec parameters of `input`'s
    /// stream `index`. Returns the output index.
    pub fn add_stream_from(&mut self, input: &FfmpegDemuxer, index: usize) -> Result<usize> {
        let st = input
            .inner
            .stream(index)
            .ok_or_else(|| Error::invalid_argument(format!("no input stream {index}")))?;
        let mut parameters = st.parameters();
        // The muxer picks a tag valid for its own container.
        unsafe {
            (*parameters.as_mut_ptr()).codec_tag = 0;
        }
        let mut out = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(parameters.id()))?;
        out.set_parameters(parameters);
        out.set_time_base(st.time_base());
        Ok(out.index())
    }

    /// Writes the header. Output time bases are final only afterwards.
    pub fn write_header(&mut self, options: &Options) -> Result<()> {
        if self.have_written_header {
            return Ok(());
        }
        if options.is_empty() {
            self.inner.write_header()?;
        } else {
            let left = self.inner.write_header_with(to_dictionary(options))?;
            leftovers(&left).warn_unrecognized("muxer");
        }
        self.have_written_header = true;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.inner.write_trailer()?;
        }
        Ok(())
    }
}

impl Mux for FfmpegMuxer {
    fn time_base(&self, stream: usize) -> Option<TimeBase> {
        // The container may still rewrite it while writing the header.
        if !self.have_written_header {
            return None;
        }
        self.inner.stream(stream).and_then(|st| time_base(st.time_base()))
    }

    fn write_interleaved(&mut self, packet: &mut Packet) -> Result<()> {
        if !self.have_written_header {
            return Err(Error::invalid_argument("muxer header not written"));
        }
        to_native_packet(packet).write_interleaved(&mut self.inner)?;
        packet.unref();
        Ok(())
    }
}

/// Copies the audio, video and subtitle streams of `input` into `output`.
pub fn remux_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<RemuxStats> {
    let mut demuxer = FfmpegDemuxer::open(input, &Options::new())?;
    let mut muxer = FfmpegMuxer::create(output)?;

    let mapping = StreamMapping::from_media_types(
        (0..demuxer.stream_count()).map(|i| {
            demuxer
                .streams()
                .iter()
                .find(|s| s.index == i)
                .map_or(MediaType::Unknown, |s| s.media_type)
        }),
    );
    for (input, _) in mapping.kept() {
        muxer.add_stream_from(&demuxer, input)?;
    }
    muxer.write_header(&Options::new())?;

    let stats = Remuxer::new(mapping).remux_all(&mut demuxer, &mut muxer)?;
    muxer.finish()?;
    Ok(stats)
}

/// Writes every kept stream of `input` to its own file, named by `name`.
pub fn split_file<F>(input: impl AsRef<Path>, mut name: F) -> Result<RemuxStats>
where
    F: FnMut(&StreamInfo) -> std::path::PathBuf,
{
    let mut demuxer = FfmpegDemuxer::open(input, &Options::new())?;
    let mut muxers = HashMap::new();
    for info in demuxer.streams().to_vec() {
        if !info.media_type.is_remuxable() {
            continue;
        }
        let mut muxer = FfmpegMuxer::create(name(&info))?;
        muxer.add_stream_from(&demuxer, info.index)?;
        muxer.write_header(&Options::new())?;
        muxers.insert(info.index, muxer);
    }

    let stats = crate::remux::split_all(&mut demuxer, &mut muxers)?;
    for muxer in muxers.values_mut() {
        muxer.finish()?;
    }
    Ok(stats)
}
