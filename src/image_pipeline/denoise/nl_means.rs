//! Non-local means filtering for single-channel 16-bit images.

use ndarray::{Array2, ArrayView2};

/// Standard deviation of the Gaussian patch kernel used in slow mode.
const PATCH_KERNEL_STD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Side of the square patches compared, odd
    pub patch_size: usize,
    /// Maximum shift searched in each direction
    pub patch_distance: usize,
    /// Cut-off distance controlling smoothing strength
    pub h: f64,
    /// Noise standard deviation subtracted from patch distances, 0 when unknown
    pub sigma: f64,
    /// Uniform patch weights through integral images instead of Gaussian weights
    pub fast_mode: bool,
}

/// Each output pixel is the weighted mean of the pixels in its search
/// window, weighted by `exp(-max(d - 2 sigma^2, 0) / h^2)` where `d` is the
/// mean squared difference of the surrounding patches. Borders use reflect
/// padding.
pub fn denoise_nl_means(image: ArrayView2<'_, u16>, params: &NlMeansParams) -> Array2<f64> {
    let radius = params.patch_size / 2;
    let pad = radius + params.patch_distance;
    let padded = reflect_pad(image, pad);

    if params.fast_mode {
        fast_nl_means(&padded, image.dim(), radius, params)
    } else {
        slow_nl_means(&padded, image.dim(), radius, params)
    }
}

fn patch_weight(distance: f64, sigma2: f64, h2: f64) -> f64 {
    let excess = (distance - 2.0 * sigma2).max(0.0);
    if h2 > 0.0 {
        (-excess / h2).exp()
    } else if excess == 0.0 {
        1.0
    } else {
        0.0
    }
}

fn slow_nl_means(
    padded: &Array2<f64>,
    (height, width): (usize, usize),
    radius: usize,
    params: &NlMeansParams,
) -> Array2<f64> {
    let pad = radius + params.patch_distance;
    let kernel = gaussian_kernel(radius);
    let h2 = params.h * params.h;
    let sigma2 = params.sigma * params.sigma;
    let search = params.patch_distance as isize;
    let r = radius as isize;

    Array2::from_shape_fn((height, width), |(y, x)| {
        let cy = (y + pad) as isize;
        let cx = (x + pad) as isize;
        let mut weight_sum = 0.0;
        let mut acc = 0.0;

        for ty in -search..=search {
            for tx in -search..=search {
                let ny = cy + ty;
                let nx = cx + tx;
                let mut distance = 0.0;
                for py in -r..=r {
                    for px in -r..=r {
                        let k = kernel[[(py + r) as usize, (px + r) as usize]];
                        let diff = padded[[(cy + py) as usize, (cx + px) as usize]]
                            - padded[[(ny + py) as usize, (nx + px) as usize]];
                        distance += k * diff * diff;
                    }
                }
                let w = patch_weight(distance, sigma2, h2);
                weight_sum += w;
                acc += w * padded[[ny as usize, nx as usize]];
            }
        }

        acc / weight_sum
    })
}

fn fast_nl_means(
    padded: &Array2<f64>,
    (height, width): (usize, usize),
    radius: usize,
    params: &NlMeansParams,
) -> Array2<f64> {
    let search = params.patch_distance;
    let pad = radius + search;
    let h2 = params.h * params.h;
    let sigma2 = params.sigma * params.sigma;
    let patch_area = (params.patch_size * params.patch_size) as f64;

    // Squared differences are needed for every pixel of every patch around an
    // output pixel, i.e. a (height + 2r) x (width + 2r) region starting at `search`.
    let region_h = height + 2 * radius;
    let region_w = width + 2 * radius;

    let mut weight_sum = Array2::<f64>::zeros((height, width));
    let mut acc = Array2::<f64>::zeros((height, width));
    let mut integral = Array2::<f64>::zeros((region_h + 1, region_w + 1));

    for ty in -(search as isize)..=search as isize {
        for tx in -(search as isize)..=search as isize {
            for u in 0..region_h {
                let mut row_sum = 0.0;
                for v in 0..region_w {
                    let py = search + u;
                    let px = search + v;
                    let diff = padded[[py, px]]
                        - padded[[(py as isize + ty) as usize, (px as isize + tx) as usize]];
                    row_sum += diff * diff;
                    integral[[u + 1, v + 1]] = integral[[u, v + 1]] + row_sum;
                }
            }

            let side = 2 * radius + 1;
            for y in 0..height {
                for x in 0..width {
                    let sum = integral[[y + side, x + side]] - integral[[y, x + side]]
                        - integral[[y + side, x]]
                        + integral[[y, x]];
                    let w = patch_weight(sum / patch_area, sigma2, h2);
                    let ny = (y + pad) as isize + ty;
                    let nx = (x + pad) as isize + tx;
                    weight_sum[[y, x]] += w;
                    acc[[y, x]] += w * padded[[ny as usize, nx as usize]];
                }
            }
        }
    }

    acc / weight_sum
}

fn gaussian_kernel(radius: usize) -> Array2<f64> {
    let side = 2 * radius + 1;
    let r = radius as f64;
    let kernel = Array2::from_shape_fn((side, side), |(y, x)| {
        let dy = y as f64 - r;
        let dx = x as f64 - r;
        (-(dy * dy + dx * dx) / (2.0 * PATCH_KERNEL_STD * PATCH_KERNEL_STD)).exp()
    });
    let total = kernel.sum();
    kernel / total
}

/// Mirror index without repeating the edge sample, like numpy's `reflect`.
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

fn reflect_pad(image: ArrayView2<'_, u16>, pad: usize) -> Array2<f64> {
    let (height, width) = image.dim();
    Array2::from_shape_fn((height + 2 * pad, width + 2 * pad), |(y, x)| {
        let sy = reflect_index(y as isize - pad as isize, height);
        let sx = reflect_index(x as isize - pad as isize, width);
        f64::from(image[[sy, sx]])
    })
}
