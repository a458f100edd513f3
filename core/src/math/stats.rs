pub struct StatsHelper;

impl StatsHelper {
    pub fn rms<'a, I>(samples: I) -> f32
    where
        I: IntoIterator<Item = &'a f32>,
    {
        let (count, sum_sq) = samples
            .into_iter()
            .fold((0usize, 0.0f32), |(n, acc), &v| (n + 1, acc + v * v));
        if count == 0 {
            return 0.0;
        }
        (sum_sq / count as f32).sqrt()
    }

    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}
