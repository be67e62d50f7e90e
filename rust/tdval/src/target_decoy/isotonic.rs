/// Least squares non-increasing fit (pool adjacent violators).
///
/// `values` are ordered from the worst to the best match, so the fitted
/// decoy ratio can only go down as quality goes up.
pub fn antitonic_fit(values: &[f64]) -> Vec<f64> {
    // (sum, count) per pooled block
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(values.len());
    for &v in values {
        blocks.push((v, 1));
        while let [.., prev, last] = blocks.as_slice() {
            let ((prev_sum, prev_count), (last_sum, last_count)) = (*prev, *last);
            if prev_sum / prev_count as f64 >= last_sum / last_count as f64 {
                break;
            }
            blocks.pop();
            let tail = blocks.len() - 1;
            blocks[tail] = (prev_sum + last_sum, prev_count + last_count);
        }
    }

    let mut out = Vec::with_capacity(values.len());
    for (sum, count) in blocks {
        let mean = (sum / count as f64).clamp(0.0, 1.0);
        out.extend(std::iter::repeat_n(mean, count));
    }
    out
}
