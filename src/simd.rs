use std::ops::{Add, Div, Mul, Sub};

use crate::consts::VECTOR_WIDTH;

/// A fixed number of f32 lanes processed together.
/// Plain arrays in, plain arrays out: LLVM lowers the lane loops to SSE/AVX on its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lanes<const N: usize>(pub [f32; N]);

/// The lane type the engine runs on
pub type MX = Lanes<{ VECTOR_WIDTH }>;

impl<const N: usize> Lanes<N> {
    #[inline(always)]
    pub fn splat(v: f32) -> Self {
        Lanes([v; N])
    }

    #[inline(always)]
    pub fn load(src: &[f32]) -> Self {
        let mut a = [0.0; N];
        a.copy_from_slice(&src[..N]);
        Lanes(a)
    }

    #[inline(always)]
    pub fn store(self, dst: &mut [f32]) {
        dst[..N].copy_from_slice(&self.0);
    }

    #[inline(always)]
    pub fn sqrt(self) -> Self {
        let mut a = self.0;
        for v in a.iter_mut() {
            *v = v.sqrt();
        }
        Lanes(a)
    }

    /// Sums all lanes by folding the upper half onto the lower half, like the
    /// usual extract/movehl/shuffle sequence. N has to be a power of two.
    #[inline(always)]
    pub fn hsum(self) -> f32 {
        debug_assert!(N.is_power_of_two());
        let mut a = self.0;
        let mut width = N;
        while width > 1 {
            let half = width / 2;
            for i in 0..half {
                a[i] += a[i + half];
            }
            width = half;
        }
        a[0]
    }
}

macro_rules! lanewise {
    ($tr:ident, $f:ident, $op:tt) => {
        impl<const N: usize> $tr for Lanes<N> {
            type Output = Lanes<N>;
            #[inline(always)]
            fn $f(self, rhs: Lanes<N>) -> Lanes<N> {
                let mut a = self.0;
                for i in 0..N {
                    a[i] = a[i] $op rhs.0[i];
                }
                Lanes(a)
            }
        }
    };
}

lanewise!(Add, add, +);
lanewise!(Sub, sub, -);
lanewise!(Mul, mul, *);
lanewise!(Div, div, /);

/// Inner product of two equally long slices whose length is a multiple of W
#[inline(always)]
pub fn dot<const W: usize>(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len() % W, 0);
    let mut accu = Lanes::<W>::splat(0.0);
    for (ca, cb) in a.chunks_exact(W).zip(b.chunks_exact(W)) {
        accu = accu + Lanes::<W>::load(ca) * Lanes::<W>::load(cb);
    }
    accu.hsum()
}

/// out = scale * src, chunk by chunk
#[inline(always)]
pub fn scale_into<const W: usize>(scale: f32, src: &[f32], out: &mut [f32]) {
    let s = Lanes::<W>::splat(scale);
    for (cs, co) in src.chunks_exact(W).zip(out.chunks_exact_mut(W)) {
        (s * Lanes::<W>::load(cs)).store(co);
    }
}

/// out += scale * src, chunk by chunk
#[inline(always)]
pub fn scale_add_into<const W: usize>(scale: f32, src: &[f32], out: &mut [f32]) {
    let s = Lanes::<W>::splat(scale);
    for (cs, co) in src.chunks_exact(W).zip(out.chunks_exact_mut(W)) {
        (Lanes::<W>::load(co) + s * Lanes::<W>::load(cs)).store(co);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsum() {
        let l = Lanes([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(l.hsum(), 10.0);
        let l = Lanes([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(l.hsum(), 36.0);
        assert_eq!(Lanes([3.5]).hsum(), 3.5);
    }

    #[test]
    fn test_lanewise_ops() {
        let a = Lanes([1.0, 2.0, 3.0, 4.0]);
        let b = Lanes::<4>::splat(2.0);
        assert_eq!(a + b, Lanes([3.0, 4.0, 5.0, 6.0]));
        assert_eq!(a - b, Lanes([-1.0, 0.0, 1.0, 2.0]));
        assert_eq!(a * b, Lanes([2.0, 4.0, 6.0, 8.0]));
        assert_eq!(a / b, Lanes([0.5, 1.0, 1.5, 2.0]));
        assert_eq!(Lanes([4.0, 9.0]).sqrt(), Lanes([2.0, 3.0]));
    }

    #[test]
    fn test_dot_independent_of_width() {
        let a: Vec<f32> = (0..16).map(|i| 0.1 * i as f32 - 0.7).collect();
        let b: Vec<f32> = (0..16).map(|i| 0.3 - 0.05 * i as f32).collect();
        let scalar: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let d4 = dot::<4>(&a, &b);
        let d8 = dot::<8>(&a, &b);
        let d16 = dot::<16>(&a, &b);
        for d in [d4, d8, d16].iter() {
            assert!((d - scalar).abs() <= 1e-5 * scalar.abs().max(1.0));
        }
    }

    #[test]
    fn test_scale_helpers() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut out = [0.0; 8];
        scale_into::<4>(0.5, &src, &mut out);
        assert_eq!(out, [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0]);
        scale_add_into::<4>(2.0, &src, &mut out);
        assert_eq!(out, [2.5, 5.0, 7.5, 10.0, 12.5, 15.0, 17.5, 20.0]);
    }
}
