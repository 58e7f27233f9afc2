//! RIFF/WAVE container for 16-bit PCM.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use piper_voice_domain::{AudioFormat, PiperError, Result};

/// Size of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

/// Write the 44-byte header for `num_samples` interleaved samples.
/// Fails with `AudioTooLong`, writing nothing, when the sizes overflow `u32`.
pub fn write_wav_header<W: Write>(
    w: &mut W,
    num_samples: usize,
    format: AudioFormat,
) -> Result<()> {
    let data_size = u32::try_from(num_samples)
        .ok()
        .and_then(|n| n.checked_mul(u32::from(format.sample_width)))
        .filter(|size| size.checked_add(36).is_some())
        .ok_or(PiperError::AudioTooLong(num_samples))?;

    // RIFF header -----------------------------------------------------------
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(36 + data_size)?;
    w.write_all(b"WAVE")?;

    // fmt  sub-chunk --------------------------------------------------------
    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?; // PCM header size
    w.write_u16::<LittleEndian>(1)?; // PCM = 1
    w.write_u16::<LittleEndian>(format.channels)?;
    w.write_u32::<LittleEndian>(format.sample_rate)?;
    w.write_u32::<LittleEndian>(format.byte_rate())?;
    w.write_u16::<LittleEndian>(format.block_align())?;
    w.write_u16::<LittleEndian>(format.bits_per_sample())?;

    // data sub-chunk --------------------------------------------------------
    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_size)?;
    Ok(())
}

/// Little-endian PCM payload without a header.
pub fn write_pcm<W: Write>(w: &mut W, samples: &[i16]) -> Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.write_i16::<LittleEndian>(sample)?;
    }
    w.write_all(&bytes)?;
    Ok(())
}

/// Header followed by the payload.
pub fn write_wav<W: Write>(w: &mut W, samples: &[i16], format: AudioFormat) -> Result<()> {
    write_wav_header(w, samples.len(), format)?;
    write_pcm(w, samples)?;
    w.flush()?;
    Ok(())
}
