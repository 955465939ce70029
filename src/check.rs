//! `self-check`: drives the pumps and the remuxer against in-memory engines
//! and fails if any output was lost.

use ffmpeg_pump::mock::{MockCodec, MockDemuxer, MockMuxer};
use ffmpeg_pump::{
    DecodePump, Drained, EncodePump, MediaType, Packet, Remuxer, StreamMapping, TimeBase,
};

const PACKETS: i64 = 50;

pub(crate) fn run() -> anyhow::Result<()> {
    let (frames, packets) = decode_encode()?;
    log::info!(
        "decode/encode: {} packets -> {} frames -> {} packets",
        PACKETS,
        frames,
        packets
    );

    let stats = remux()?;
    log::info!(
        "remux: {} read, {} written, {} dropped",
        stats.read,
        stats.written,
        stats.dropped
    );
    println!("self-check passed");
    Ok(())
}

fn decode_encode() -> anyhow::Result<(u64, u64)> {
    let mut decoder = MockCodec::decoder().with_delay(3);
    let mut encoder = MockCodec::encoder().with_delay(2);
    let mut decode = DecodePump::new();
    let mut encode = EncodePump::new();
    let mut packets_out = 0u64;

    let mut packet = Packet::empty();
    for pts in 0..PACKETS {
        packet.set_data(vec![pts as u8; 16]);
        packet.set_pts(Some(pts));
        decode.decode(&mut decoder, Some(&packet), |frame| {
            encode.encode(&mut encoder, Some(frame), |_| {
                packets_out += 1;
                Ok(())
            })?;
            Ok(())
        })?;
        packet.unref();
    }
    decode.flush(&mut decoder, |frame| {
        encode.encode(&mut encoder, Some(frame), |_| {
            packets_out += 1;
            Ok(())
        })?;
        Ok(())
    })?;
    let drained = encode.flush(&mut encoder, |_| {
        packets_out += 1;
        Ok(())
    })?;

    let frames = decode.stats().emitted;
    anyhow::ensure!(drained == Drained::Finished, "encoder not drained: {:?}", drained);
    anyhow::ensure!(
        frames == PACKETS as u64 && packets_out == frames,
        "lost output: {} frames, {} packets",
        frames,
        packets_out
    );
    Ok((frames, packets_out))
}

fn remux() -> anyhow::Result<ffmpeg_pump::RemuxStats> {
    let input = [TimeBase::MPEG, TimeBase::new(1, 48000)?, TimeBase::MPEG];
    let packets = (0..PACKETS).map(|i| {
        let mut pkt = Packet::copy(&[0u8; 4]);
        pkt.set_stream(i as usize % input.len());
        pkt.set_pts(Some(i * 3000));
        pkt.set_dts(Some(i * 3000));
        pkt
    });
    let mut demuxer = MockDemuxer::new(input.to_vec(), packets.collect::<Vec<_>>());
    let mut muxer = MockMuxer::new(vec![TimeBase::MILLISECONDS; 2]);
    let mapping =
        StreamMapping::from_media_types([MediaType::Video, MediaType::Audio, MediaType::Data]);

    let stats = Remuxer::new(mapping).remux_all(&mut demuxer, &mut muxer)?;
    anyhow::ensure!(
        stats.written as usize == muxer.written().len(),
        "muxer saw {} packets, {} reported written",
        muxer.written().len(),
        stats.written
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    #[test]
    fn self_check_passes() {
        super::run().unwrap();
    }
}
