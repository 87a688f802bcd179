/// Reinterpret a raw 16-bit little-endian PCM payload as signed amplitudes.
///
/// Sample `i` is built from bytes `2i` and `2i + 1`; a trailing odd byte is
/// never read, so the output length is `floor(pcm.len() / 2)`. Each sample is
/// scaled by `height_coefficient`, a purely visual multiplier that downstream
/// consumers must not re-apply. The scaling product saturates at `i32` bounds
/// instead of wrapping.
pub fn extract_amplitudes(pcm: &[u8], height_coefficient: f32) -> Vec<i32> {
    pcm.chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            (f32::from(sample) * height_coefficient) as i32
        })
        .collect()
}
