//! WAV serialisation — mono 16-bit signed PCM with the canonical 44-byte
//! RIFF/WAVE header.
//!
//! Quantisation is clamp to [-1, 1], scale by 32767, then floor.  Floor (not
//! round) matches the reference output bit-for-bit; negative samples land one
//! step lower than rounding would put them.  Keep the rule unless bit-exact
//! compatibility stops mattering.

use std::io::Cursor;
use std::path::Path;

use crate::error::Result;

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Quantise one float sample to i16.
fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).floor() as i16
}

/// Serialise `samples` into an in-memory WAV byte buffer.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, wav_spec(sample_rate))?;
        for &s in samples {
            writer.write_sample(quantize(s))?;
        }
        writer.finalize()?;
    }
    Ok(buffer.into_inner())
}

/// Write `samples` to a WAV file.
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate))?;
    for &s in samples {
        writer.write_sample(quantize(s))?;
    }
    writer.finalize()?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
