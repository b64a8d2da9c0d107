use crate::dtype::Element;

/// Elementwise product of an input window with one lane's weights.
#[inline]
pub fn dot_product<T: Element>(window: &[T], weights: &[T], products: &mut [T]) {
    debug_assert_eq!(window.len(), weights.len());
    debug_assert_eq!(window.len(), products.len());
    for ((p, &x), &w) in products.iter_mut().zip(window).zip(weights) {
        *p = x.mul_wrapping(w);
    }
}

/// Second-stage multiply of a fused layer.
///
/// `intermediate` holds the adjusted first-stage values of slice `k`, one per
/// lane. For every output channel `o`, `products[o][g]` becomes
/// `intermediate[g] * l2_weights[o][k * G + g]`, where `l2_weights` is laid
/// out `[out_channel][l1_channel]` and `G == intermediate.len()`.
pub fn l2_multiply<T: Element>(
    intermediate: &[T],
    l2_weights: &[T],
    l1_channels: usize,
    k: usize,
    products: &mut [Vec<T>],
) {
    let group = intermediate.len();
    let base = k * group;
    for (o, row) in products.iter_mut().enumerate() {
        let weights = &l2_weights[o * l1_channels + base..o * l1_channels + base + group];
        debug_assert_eq!(row.len(), group);
        for ((p, &x), &w) in row.iter_mut().zip(intermediate).zip(weights) {
            *p = x.mul_wrapping(w);
        }
    }
}

/// Reduce each output channel's products from [`l2_multiply`] to one
/// partial sum.
pub fn l2_accumulate<T: Element>(products: &[Vec<T>], partials: &mut [T]) {
    debug_assert_eq!(products.len(), partials.len());
    for (s, row) in partials.iter_mut().zip(products) {
        *s = crate::reduce::pairwise_sum(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let mut out = [0i32; 4];
        dot_product(&[1, 2, 3, 4], &[2, 2, -1, 0], &mut out);
        assert_eq!(out, [2, 4, -3, 0]);
    }

    #[test]
    fn test_l2_multiply_selects_slice() {
        // 2 output channels, 4 intermediate channels, groups of 2
        let weights = [
            1.0f32, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0,
        ];
        let mut products = vec![vec![0.0f32; 2]; 2];
        l2_multiply(&[10.0, 100.0], &weights, 4, 1, &mut products);
        assert_eq!(products[0], vec![30.0, 400.0]);
        assert_eq!(products[1], vec![70.0, 800.0]);

        let mut partials = [0.0f32; 2];
        l2_accumulate(&products, &mut partials);
        assert_eq!(partials, [430.0, 870.0]);
    }
}
