//! Black-Scholes primitives used to derive greeks from chain implied volatility.
//!
//! Every function here is total: inputs are floored before they reach a
//! division or a logarithm, so finite positive spot/strike never produce NaN
//! or infinity, whatever the volatility or time to expiry.

/// Volatility floor applied before any division by sigma.
pub const MIN_SIGMA: f64 = 1e-6;
/// Time floor (years) applied before any division by sqrt(T).
pub const MIN_TIME: f64 = 1e-8;
/// Strike floor applied inside the log-moneyness term.
pub const MIN_STRIKE: f64 = 1e-8;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

// Abramowitz & Stegun 26.2.17, absolute error below 7.5e-8.
const AS_P: f64 = 0.231_641_9;
const AS_A1: f64 = 0.319_381_530;
const AS_A2: f64 = -0.356_563_782;
const AS_A3: f64 = 1.781_477_937;
const AS_A4: f64 = -1.821_255_978;
const AS_A5: f64 = 1.330_274_429;

/// Standard normal probability density function.
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal cumulative distribution function (Abramowitz & Stegun 26.2.17).
///
/// Negative arguments reflect through `1 - N(|x|)`, so `N(-x) + N(x) == 1`
/// holds exactly in floating point terms of the polynomial.
pub fn normal_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + AS_P * x.abs());
    let poly = ((((AS_A5 * k + AS_A4) * k + AS_A3) * k + AS_A2) * k + AS_A1) * k;
    let cdf = 1.0 - normal_pdf(x.abs()) * poly;
    if x >= 0.0 {
        cdf
    } else {
        1.0 - cdf
    }
}

fn floored(sigma: f64, t: f64) -> (f64, f64) {
    (sigma.max(MIN_SIGMA), t.max(MIN_TIME))
}

/// Black-Scholes d1 with floored sigma, time and strike.
pub fn d1(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (vol, time) = floored(sigma, t);
    ((s / k.max(MIN_STRIKE)).ln() + (r + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// Black-Scholes d2 = d1 - sigma * sqrt(T), using the same floors as [`d1`].
pub fn d2(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (vol, time) = floored(sigma, t);
    d1(s, k, r, sigma, t) - vol * time.sqrt()
}

/// Delta of a European call, N(d1).
pub fn call_delta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    normal_cdf(d1(s, k, r, sigma, t))
}

/// Delta of a European put, derived from the call delta by put-call parity.
pub fn put_delta(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    call_delta(s, k, r, sigma, t) - 1.0
}

/// Gamma (identical for calls and puts). Never negative.
pub fn gamma(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let (vol, time) = floored(sigma, t);
    normal_pdf(d1(s, k, r, sigma, t)) / (s * vol * time.sqrt())
}
