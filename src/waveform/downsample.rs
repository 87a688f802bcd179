use super::AmplitudeProfile;

/// Full-scale divisor for 16-bit magnitudes.
const SAMPLE_NORM: f64 = 65_536.0;

/// Reduce an arbitrary-length amplitude sequence to a fixed-width profile.
///
/// Buckets cover `samples.len() / width` consecutive samples each (integer
/// division; the trailing remainder is dropped) and hold the mean of
/// `abs(sample) / 65536`. Inputs shorter than `width` produce a zero-filled
/// profile rather than dividing by zero. Identical input always produces
/// bit-identical output.
pub fn downsample(samples: &[i32], width: usize) -> AmplitudeProfile {
    let width = width.max(1);
    let bucket_size = samples.len() / width;
    if bucket_size == 0 {
        return AmplitudeProfile::zeroed(width);
    }
    let mut buckets = Vec::with_capacity(width);
    for bucket in 0..width {
        let start = bucket * bucket_size;
        let mut sum = 0.0_f64;
        for &sample in &samples[start..start + bucket_size] {
            sum += f64::from(sample.unsigned_abs()) / SAMPLE_NORM;
        }
        buckets.push((sum / bucket_size as f64) as f32);
    }
    AmplitudeProfile::from_buckets(buckets)
}
