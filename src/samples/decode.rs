// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoding of fetched sample bytes into playable buffers.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::SampleBuffer;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized audio format: {0}")]
    Probe(#[source] SymphoniaError),

    #[error("no audio track found")]
    NoTrack,

    #[error("sample rate not specified")]
    UnknownSampleRate,

    #[error("decoding failed: {0}")]
    Decoder(#[from] SymphoniaError),

    #[error("no audio data decoded")]
    Empty,
}

/// Decodes a complete audio file held in memory. `extension` hints the
/// container format. When `target_rate` is given and differs from the file's
/// rate the result is resampled to it.
pub fn decode(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_rate: Option<u32>,
) -> Result<SampleBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(DecodeError::Probe)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut decode_buffer: Option<DecodeBuffer<f32>> = None;
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped; the rest of the file may be fine.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channel_count == 0 {
            channel_count = spec.channels.count() as u16;
        }
        let needed = decoded.capacity() * spec.channels.count();
        if decode_buffer
            .as_ref()
            .map_or(true, |buffer| buffer.capacity() < needed)
        {
            decode_buffer = Some(DecodeBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buffer) = decode_buffer.as_mut() {
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
    }

    if samples.is_empty() || channel_count == 0 {
        return Err(DecodeError::Empty);
    }

    let (samples, sample_rate) = match target_rate {
        Some(target_rate) if target_rate != source_rate => {
            info!(
                source_rate,
                target_rate, "Resampling sample to output rate"
            );
            (
                resample(&samples, channel_count, source_rate, target_rate),
                target_rate,
            )
        }
        _ => (samples, source_rate),
    };

    Ok(SampleBuffer::new(samples, channel_count, sample_rate))
}

/// Converts interleaved samples from one rate to another with linear
/// interpolation, which is plenty for one-shot notes.
pub(crate) fn resample(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_decode_wav() {
        let bytes = wav_bytes(&[0.5; 441], 1, 44100);
        let buffer = decode(bytes, Some("wav"), None).unwrap();

        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 441);
        assert!((buffer.sample(100, 0) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let bytes = wav_bytes(&[0.25; 2 * 441], 2, 22050);
        let buffer = decode(bytes, None, Some(44100)).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 882);
        assert!((buffer.sample(500, 1) - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(b"definitely not audio".to_vec(), Some("mp3"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_resample_length() {
        let source: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = resample(&source, 1, 44100, 48000);
        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_resample_keeps_channels_apart() {
        let source = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = resample(&source, 2, 44100, 22050);

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], 1.0);
        assert_eq!(result[1], -1.0);
    }
}
