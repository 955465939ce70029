use super::*;
use crate::decoder::{DecodePump, decode_all};
use crate::encoder::{EncodePump, encode_all};
use crate::error::ErrorKind;
use crate::format::PixelFormat;
use crate::mock::MockCodec;

fn packet(pts: i64) -> Packet {
    let mut pkt = Packet::copy(&[pts as u8, 0xAB, 0xCD]);
    pkt.set_pts(Some(pts));
    pkt
}

fn picture(pts: i64) -> Frame {
    let mut frame = Frame::video(PixelFormat::Gray8, 4, 1);
    frame.set_pts(Some(pts));
    frame
}

#[test]
fn every_buffered_frame_comes_out_by_the_flush() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder().with_delay(2);
    let mut pump = DecodePump::new();
    let mut pts = Vec::new();

    for i in 0..5 {
        let drained = pump.decode(&mut decoder, Some(&packet(i)), |frame| {
            pts.push(frame.pts());
            Ok(())
        })?;
        assert_eq!(drained, Drained::NeedsInput);
    }
    // Two frames are still held back by the reorder delay.
    assert_eq!(pts.len(), 3);
    assert_eq!(decoder.pending(), 2);

    let drained = pump.flush(&mut decoder, |frame| {
        pts.push(frame.pts());
        Ok(())
    })?;
    assert_eq!(drained, Drained::Finished);
    assert_eq!(pts, (0..5).map(Some).collect::<Vec<_>>());
    assert!(decoder.is_drained());

    let stats = pump.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.emitted, 5);
    assert!(stats.flushed);
    Ok(())
}

#[test]
fn frame_count_does_not_depend_on_delay() -> anyhow::Result<()> {
    for delay in [0, 1, 3, 10] {
        let mut decoder = MockCodec::decoder()
            .with_delay(delay)
            .with_outputs_per_input(2);
        let mut pump = DecodePump::new();
        let mut count = 0;
        for i in 0..4 {
            pump.decode(&mut decoder, Some(&packet(i)), |_| {
                count += 1;
                Ok(())
            })?;
        }
        pump.flush(&mut decoder, |_| {
            count += 1;
            Ok(())
        })?;
        assert_eq!(count, 8, "delay {delay}");
    }
    Ok(())
}

#[test]
fn batched_and_streamed_submission_emit_the_same_frames() -> anyhow::Result<()> {
    const PACKETS: i64 = 7;
    let codec = || MockCodec::decoder().with_delay(3).with_outputs_per_input(2);

    let mut streamed = Vec::new();
    let mut decoder = codec();
    let mut pump = DecodePump::new();
    for i in 0..PACKETS {
        pump.decode(&mut decoder, Some(&packet(i)), |frame| {
            streamed.push(frame.pts());
            Ok(())
        })?;
    }
    pump.flush(&mut decoder, |frame| {
        streamed.push(frame.pts());
        Ok(())
    })?;

    let mut batched = Vec::new();
    let mut decoder = codec();
    for i in 0..PACKETS {
        decoder.send_packet(Some(&packet(i)))?;
    }
    let mut pump = DecodePump::new();
    let drained = pump.flush(&mut decoder, |frame| {
        batched.push(frame.pts());
        Ok(())
    })?;

    assert_eq!(drained, Drained::Finished);
    assert_eq!(streamed.len(), 2 * PACKETS as usize);
    assert_eq!(batched, streamed);
    Ok(())
}

#[test]
fn receive_before_any_send_is_invalid() {
    let err = MockCodec::decoder()
        .receive_frame(&mut Frame::empty())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn second_flush_is_benign() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder();
    let mut pump = DecodePump::new();
    pump.decode(&mut decoder, Some(&packet(0)), |_| Ok(()))?;
    assert_eq!(pump.flush(&mut decoder, |_| Ok(()))?, Drained::Finished);

    // The engine itself reports end of stream on a repeated flush.
    assert!(decoder.send_packet(None).unwrap_err().is_eof());

    let mut called = false;
    let drained = pump.flush(&mut decoder, |_| {
        called = true;
        Ok(())
    })?;
    assert_eq!(drained, Drained::AlreadyFlushed);
    assert!(drained.is_terminal());
    assert!(!called);
    Ok(())
}

#[test]
fn data_after_flush_is_discarded() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder();
    decode_all(&mut decoder, None, |_| Ok(()))?;
    let drained = decode_all(&mut decoder, Some(&packet(9)), |_| {
        panic!("no frame expected")
    })?;
    assert_eq!(drained, Drained::AlreadyFlushed);
    Ok(())
}

#[test]
fn empty_packet_flushes() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder().with_delay(4);
    let mut pump = DecodePump::new();
    let mut count = 0;
    pump.decode(&mut decoder, Some(&packet(0)), |_| {
        count += 1;
        Ok(())
    })?;
    assert_eq!(count, 0);

    let drained = pump.decode(&mut decoder, Some(&Packet::empty()), |_| {
        count += 1;
        Ok(())
    })?;
    assert_eq!(drained, Drained::Finished);
    assert_eq!(count, 1);
    assert!(pump.stats().flushed);
    assert_eq!(pump.stats().submitted, 1);
    Ok(())
}

#[test]
fn busy_engine_is_drained_then_resent() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder().with_capacity(1);
    // Leave one frame pending so the next submission is refused.
    decoder.send_packet(Some(&packet(0)))?;
    assert_eq!(decoder.pending(), 1);

    let mut pts = Vec::new();
    let drained = decode_all(&mut decoder, Some(&packet(1)), |frame| {
        pts.push(frame.pts());
        Ok(())
    })?;
    assert_eq!(drained, Drained::NeedsInput);
    assert_eq!(pts, vec![Some(0), Some(1)]);
    assert_eq!(decoder.pending(), 0);
    Ok(())
}

#[test]
fn input_refused_twice_is_invalid() {
    let mut decoder = MockCodec::decoder().with_capacity(0);
    let err = decode_all(&mut decoder, Some(&packet(0)), |_| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn codec_error_propagates_and_loop_continues() -> anyhow::Result<()> {
    let mut decoder = MockCodec::decoder().failing_at(1);
    let mut pump = DecodePump::new();
    let mut count = 0;

    pump.decode(&mut decoder, Some(&packet(0)), |_| {
        count += 1;
        Ok(())
    })?;
    let err = pump
        .decode(&mut decoder, Some(&packet(1)), |_| Ok(()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codec);

    pump.decode(&mut decoder, Some(&packet(2)), |_| {
        count += 1;
        Ok(())
    })?;
    assert_eq!(count, 2);
    assert_eq!(pump.stats().submitted, 2);
    Ok(())
}

#[test]
fn callback_error_stops_the_drain() {
    let mut decoder = MockCodec::decoder().with_outputs_per_input(3);
    let mut frame = Frame::empty();
    let mut stats = PumpStats::default();
    let mut seen = 0;

    let err = run(
        &mut Decoding(&mut decoder),
        Some(&packet(0)),
        &mut frame,
        |_| {
            seen += 1;
            Err(Error::Exit)
        },
        &mut stats,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Exit));
    assert_eq!(seen, 1);
    // The frame was released before the error surfaced.
    assert!(frame.is_empty());
    assert_eq!(decoder.pending(), 2);
}

#[test]
fn wrong_direction_is_rejected() {
    let mut decoder = MockCodec::decoder();
    let err = encode_all(&mut decoder, Some(&picture(0)), |_| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let mut encoder = MockCodec::encoder();
    let err = decode_all(&mut encoder, Some(&packet(0)), |_| Ok(())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn encoder_mirrors_the_decoder() -> anyhow::Result<()> {
    let mut encoder = MockCodec::encoder().with_delay(1);
    let mut pump = EncodePump::new();
    let mut out = Vec::new();

    for i in 0..3 {
        pump.encode(&mut encoder, Some(&picture(i * 10)), |pkt| {
            out.push(pkt.clone());
            Ok(())
        })?;
    }
    assert_eq!(out.len(), 2);

    // A frame without planes is the flush sentinel.
    let drained = pump.encode(&mut encoder, Some(&Frame::empty()), |pkt| {
        out.push(pkt.clone());
        Ok(())
    })?;
    assert_eq!(drained, Drained::Finished);
    assert_eq!(out.len(), 3);
    assert!(out[0].is_key());
    assert!(!out[1].is_key());
    assert_eq!(
        out.iter().map(|p| p.dts()).collect::<Vec<_>>(),
        vec![Some(0), Some(1), Some(2)]
    );
    assert_eq!(out[2].pts(), Some(20));

    assert_eq!(
        pump.flush(&mut encoder, |_| Ok(()))?,
        Drained::AlreadyFlushed
    );
    Ok(())
}
