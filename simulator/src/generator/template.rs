use std::f32::consts::PI;

/// Samples `cycles` periods of a sine over `length` points.
pub fn sine_wave(length: usize, cycles: f32) -> Vec<f32> {
    (0..length)
        .map(|i| ((i as f32 * cycles) / length as f32 * 2.0 * PI).sin())
        .collect()
}

/// Gaussian bump centred on `centre` with the given width, peak 1.0.
pub fn bump(length: usize, centre: f32, width: f32) -> Vec<f32> {
    let width = width.max(f32::EPSILON);
    (0..length)
        .map(|i| {
            let d = (i as f32 - centre) / width;
            (-0.5 * d * d).exp()
        })
        .collect()
}
