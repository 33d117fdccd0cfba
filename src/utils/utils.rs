/// pcm16_le_to_samples decodes little-endian signed 16-bit PCM into samples kept at 16-bit scale.
///
/// A trailing odd byte is ignored.
pub fn pcm16_le_to_samples(v: &[u8]) -> Vec<f32> {
    v.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32)
        .collect()
}

/// mean_and_std returns the population mean and standard deviation of `values`.
pub fn mean_and_std<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    (mean, var.sqrt())
}
