use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Rotates the columns of `matrix` left by `width / 2`. For even widths
    /// this exchanges the left and right halves, so applying it twice is the
    /// identity. Doppler bins arrive centred on zero and leave monotonic.
    pub fn swap_halves<T: Clone>(matrix: ArrayView2<T>) -> Array2<T> {
        let half = matrix.ncols() / 2;
        if half == 0 {
            return matrix.to_owned();
        }
        // both slices share the row count, so the concatenation cannot fail
        match concatenate(
            Axis(1),
            &[matrix.slice(s![.., half..]), matrix.slice(s![.., ..half])],
        ) {
            Ok(swapped) => swapped,
            Err(_) => matrix.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn swap_exchanges_halves() {
        let m = array![[1u16, 2, 3, 4], [5, 6, 7, 8]];
        let swapped = MatrixHelper::swap_halves(m.view());
        assert_eq!(swapped, array![[3u16, 4, 1, 2], [7, 8, 5, 6]]);
    }

    #[test]
    fn swap_is_an_involution_for_even_widths() {
        let m = Array2::from_shape_fn((5, 16), |(r, c)| (r * 16 + c) as u16);
        let twice = MatrixHelper::swap_halves(MatrixHelper::swap_halves(m.view()).view());
        assert_eq!(twice, m);
    }

    #[test]
    fn single_column_is_untouched() {
        let m = array![[1.0f32], [2.0]];
        assert_eq!(MatrixHelper::swap_halves(m.view()), m);
    }
}
