//! Shamir secret sharing over GF(2^8)
//!
//! Every byte of the secret is shared independently: for each byte position a
//! random polynomial of degree `t - 1` is sampled with that byte as its
//! constant term and evaluated at `x = 1..=n`. Reconstruction is Lagrange
//! interpolation at `x = 0`.
//!
//! `combine` cannot tell how many shares the split required. Handing it fewer
//! than the threshold produces a well-formed but wrong secret, so callers must
//! make sure they feed it enough genuine shares.

use super::secret::{Secret, SECRET_SIZE};

/// GF(2^8) has 255 non-zero evaluation points
pub const MAX_SHARES: usize = 255;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShamirError {
    #[error("invalid parameters: need 1 <= t ({threshold}) <= n ({shares}) <= 255 and a 16 byte secret (got {secret_len})")]
    InvalidParameters {
        threshold: usize,
        shares: usize,
        secret_len: usize,
    },
    #[error("no shares to combine")]
    NoShares,
    #[error("share index 0 is not a valid evaluation point")]
    InvalidIndex,
    #[error("duplicate share index {0}")]
    DuplicateIndex(u8),
    #[error("failed to sample polynomial coefficients: {0}")]
    Entropy(#[from] getrandom::Error),
}

/// One evaluation of the sharing polynomials
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    index: u8,
    value: [u8; SECRET_SIZE],
}

// share values are key material, keep them out of logs
impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share").field("index", &self.index).finish()
    }
}

impl Share {
    pub fn new(index: u8, value: [u8; SECRET_SIZE]) -> Self {
        Self { index, value }
    }

    /// Evaluation point, in `1..=n`
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn value(&self) -> &[u8; SECRET_SIZE] {
        &self.value
    }
}

/// Split `secret` into `shares` shares, any `threshold` of which recover it
pub fn split(secret: &[u8], threshold: usize, shares: usize) -> Result<Vec<Share>, ShamirError> {
    if threshold < 1 || threshold > shares || shares > MAX_SHARES || secret.len() != SECRET_SIZE {
        return Err(ShamirError::InvalidParameters {
            threshold,
            shares,
            secret_len: secret.len(),
        });
    }

    // coeffs[0] is the secret, coeffs[1..t] are random
    let mut coeffs: Vec<[u8; SECRET_SIZE]> = Vec::with_capacity(threshold);
    let mut constant = [0u8; SECRET_SIZE];
    constant.copy_from_slice(secret);
    coeffs.push(constant);
    for _ in 1..threshold {
        let mut c = [0u8; SECRET_SIZE];
        getrandom::getrandom(&mut c)?;
        coeffs.push(c);
    }

    let out = (1..=shares)
        .map(|i| {
            let x = i as u8;
            let mut y = [0u8; SECRET_SIZE];
            for (b, out) in y.iter_mut().enumerate() {
                // Horner: (((a_{t-1} x + a_{t-2}) x + ...) x + a_0)
                let mut acc = coeffs[threshold - 1][b];
                for k in (0..threshold - 1).rev() {
                    acc = gf256_add(gf256_mul(acc, x), coeffs[k][b]);
                }
                *out = acc;
            }
            Share::new(x, y)
        })
        .collect();

    Ok(out)
}

/// Reconstruct a secret from shares by interpolating at zero
pub fn combine(shares: &[Share]) -> Result<Secret, ShamirError> {
    if shares.is_empty() {
        return Err(ShamirError::NoShares);
    }

    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 {
            return Err(ShamirError::InvalidIndex);
        }
        if seen[share.index as usize] {
            return Err(ShamirError::DuplicateIndex(share.index));
        }
        seen[share.index as usize] = true;
    }

    // λ_i(0) = Π_{j≠i} x_j / (x_j - x_i), subtraction is XOR in char 2
    let basis: Vec<u8> = shares
        .iter()
        .map(|si| {
            let (num, den) = shares
                .iter()
                .filter(|sj| sj.index != si.index)
                .fold((1u8, 1u8), |(num, den), sj| {
                    (
                        gf256_mul(num, sj.index),
                        gf256_mul(den, gf256_add(sj.index, si.index)),
                    )
                });
            gf256_mul(num, gf256_inv(den))
        })
        .collect();

    let mut secret = [0u8; SECRET_SIZE];
    for (b, out) in secret.iter_mut().enumerate() {
        *out = shares
            .iter()
            .zip(&basis)
            .fold(0u8, |acc, (share, l)| gf256_add(acc, gf256_mul(*l, share.value[b])));
    }

    Ok(Secret::from(secret))
}

// GF(2^8) with the AES polynomial x^8 + x^4 + x^3 + x + 1 (0x11b)

#[inline]
fn gf256_add(a: u8, b: u8) -> u8 {
    a ^ b
}

#[inline]
fn gf256_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p: u8 = 0;
    for _ in 0..8 {
        if (b & 1) != 0 {
            p ^= a;
        }
        let hi = a & 0x80;
        a <<= 1;
        if hi != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    p
}

#[inline]
fn gf256_pow(mut a: u8, mut e: u16) -> u8 {
    let mut r: u8 = 1;
    while e > 0 {
        if (e & 1) == 1 {
            r = gf256_mul(r, a);
        }
        a = gf256_mul(a, a);
        e >>= 1;
    }
    r
}

#[inline]
fn gf256_inv(a: u8) -> u8 {
    // a^254 for non-zero a; indices are validated distinct so den != 0
    gf256_pow(a, 254)
}
