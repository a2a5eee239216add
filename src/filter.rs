//! Band-filtering and instantaneous phase extraction.
//!
//! A state-independent utility applied downstream of stored series:
//! zero-phase (forward-backward) Butterworth bandpass filtering with
//! canonical named bands, and analytic-signal phase/amplitude via a
//! Hilbert transform. Filter coefficients are computed directly from the
//! analog prototype (lowpass-to-bandpass transform, bilinear transform),
//! the same way the difference-equation coefficients are laid out in
//! classic acquisition-side notch filters.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::{ConvertError, Result};

const TWO_PI: f64 = 2.0 * PI;

/// Lower cutoff used in place of a 0 Hz band edge. A true DC edge makes
/// the band a lowpass; the clamp keeps a single bandpass code path.
const DC_CLAMP_HZ: f64 = 0.1;

/// A frequency band, either canonical by name or an explicit cutoff pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Passband {
    /// One of the canonical band names: "delta", "theta", "spindles",
    /// "gamma", "ripples"
    Named(String),
    /// Explicit (low, high) cutoffs in Hz
    Explicit(f64, f64),
}

impl From<&str> for Passband {
    fn from(name: &str) -> Self {
        Passband::Named(name.to_string())
    }
}

impl From<(f64, f64)> for Passband {
    fn from((low, high): (f64, f64)) -> Self {
        Passband::Explicit(low, high)
    }
}

/// Resolves a passband to explicit (low, high) cutoffs in Hz.
///
/// Canonical bands: delta 0-4, theta 4-10, spindles 10-20, gamma 30-80,
/// ripples 100-250. Explicit pairs are returned unchanged.
pub fn parse_passband(passband: &Passband) -> Result<(f64, f64)> {
    match passband {
        Passband::Explicit(low, high) => Ok((*low, *high)),
        Passband::Named(name) => match name.as_str() {
            "delta" => Ok((0.0, 4.0)),
            "theta" => Ok((4.0, 10.0)),
            "spindles" => Ok((10.0, 20.0)),
            "gamma" => Ok((30.0, 80.0)),
            "ripples" => Ok((100.0, 250.0)),
            other => Err(ConvertError::UnknownBand(other.to_string())),
        },
    }
}

/// Supported filter kinds. Only Butterworth is implemented; the others are
/// accepted as names so that requesting one fails loudly instead of
/// silently passing the signal through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Butterworth,
    Cheby1,
    Fir1,
}

impl FilterKind {
    fn name(self) -> &'static str {
        match self {
            FilterKind::Butterworth => "butterworth",
            FilterKind::Cheby1 => "cheby1",
            FilterKind::Fir1 => "fir1",
        }
    }
}

/// Applies a zero-phase Butterworth bandpass filter to a signal.
///
/// The filter runs forward and backward, which doubles the attenuation and
/// cancels phase delay. `order` is the prototype order (4 is the
/// conventional choice for field-potential bands).
pub fn bandpass_filter(
    signal: &[f64],
    sampling_rate: f64,
    passband: &Passband,
    order: usize,
    kind: FilterKind,
) -> Result<Vec<f64>> {
    if kind != FilterKind::Butterworth {
        return Err(ConvertError::UnsupportedFilterKind(kind.name()));
    }

    let (low, high) = parse_passband(passband)?;
    let low = if low <= 0.0 { DC_CLAMP_HZ } else { low };
    if !(low < high) || high >= sampling_rate / 2.0 {
        return Err(ConvertError::InvalidPassband {
            low,
            high,
            rate: sampling_rate,
        });
    }

    let (b, a) = butter_bandpass(order.max(1), low, high, sampling_rate);
    Ok(filtfilt(&b, &a, signal))
}

/// Computes instantaneous phase and amplitude of a (filtered) signal.
///
/// The analytic signal is obtained via a Hilbert transform. The FFT input
/// is zero-padded to the next power of two purely as a performance
/// optimization; the padded tail is discarded. Returns
/// `(phase in [0, 2π), amplitude envelope)`, both the input's length.
pub fn phase_amplitude(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let nfft = next_power_of_2(n);
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(nfft - n))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(nfft).process(&mut buffer);

    // Analytic-signal spectrum: keep DC and Nyquist, double the positive
    // frequencies, zero the negative ones.
    if nfft > 1 {
        for value in buffer.iter_mut().take(nfft / 2).skip(1) {
            *value *= 2.0;
        }
        for value in buffer.iter_mut().skip(nfft / 2 + 1) {
            *value = Complex::new(0.0, 0.0);
        }
    }

    planner.plan_fft_inverse(nfft).process(&mut buffer);

    let scale = 1.0 / nfft as f64;
    let mut phase = Vec::with_capacity(n);
    let mut amplitude = Vec::with_capacity(n);
    for value in buffer.iter().take(n) {
        let analytic = *value * scale;
        phase.push(wrap_phase(analytic.arg()));
        amplitude.push(analytic.norm());
    }
    (phase, amplitude)
}

/// Wraps an angle from `arg()`'s (-π, π] range into [0, 2π). A tiny
/// negative angle plus 2π rounds to exactly 2π in f64, so the result is
/// re-checked against the upper bound.
fn wrap_phase(angle: f64) -> f64 {
    let mut wrapped = angle;
    if wrapped < 0.0 {
        wrapped += TWO_PI;
    }
    if wrapped >= TWO_PI {
        wrapped = 0.0;
    }
    wrapped
}

/// Smallest power of two greater than or equal to `x`; 1 for `x == 0`.
pub fn next_power_of_2(x: usize) -> usize {
    let mut power = 1;
    while power < x {
        power *= 2;
    }
    power
}

/// Designs a digital Butterworth bandpass filter of the given prototype
/// order, returning `(b, a)` transfer-function coefficients.
fn butter_bandpass(order: usize, low: f64, high: f64, fs: f64) -> (Vec<f64>, Vec<f64>) {
    let fs2 = 2.0 * fs;
    // Pre-warp the band edges for the bilinear transform.
    let w1 = fs2 * (PI * low / fs).tan();
    let w2 = fs2 * (PI * high / fs).tan();
    let bw = w2 - w1;
    let w0 = (w1 * w2).sqrt();

    // Analog prototype lowpass poles on the unit circle's left half.
    let prototype: Vec<Complex<f64>> = (0..order)
        .map(|k| {
            let theta = PI * (2 * k + 1 + order) as f64 / (2 * order) as f64;
            Complex::new(theta.cos(), theta.sin())
        })
        .collect();

    // Lowpass-to-bandpass: each prototype pole splits in two.
    let mut poles = Vec::with_capacity(2 * order);
    for &p in &prototype {
        let half = p * (bw / 2.0);
        let offset = (half * half - w0 * w0).sqrt();
        poles.push(half + offset);
        poles.push(half - offset);
    }

    // Bilinear transform of poles; zeros land at z = 1 (from s = 0) and
    // z = -1 (from the poles at infinity), `order` of each.
    let fs2c = Complex::new(fs2, 0.0);
    let z_poles: Vec<Complex<f64>> = poles.iter().map(|&s| (fs2c + s) / (fs2c - s)).collect();
    let mut z_zeros = Vec::with_capacity(2 * order);
    z_zeros.extend(std::iter::repeat(Complex::new(1.0, 0.0)).take(order));
    z_zeros.extend(std::iter::repeat(Complex::new(-1.0, 0.0)).take(order));

    let mut b: Vec<f64> = poly_from_roots(&z_zeros).iter().map(|c| c.re).collect();
    let a: Vec<f64> = poly_from_roots(&z_poles).iter().map(|c| c.re).collect();

    // Normalize to unit gain at the band's center frequency.
    let w_center = TWO_PI * (low * high).sqrt() / fs;
    let gain = frequency_response(&b, &a, w_center).norm();
    for coeff in &mut b {
        *coeff /= gain;
    }

    (b, a)
}

/// Expands a monic polynomial from its roots.
fn poly_from_roots(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

/// Evaluates H(e^{jw}) for transfer-function coefficients.
fn frequency_response(b: &[f64], a: &[f64], w: f64) -> Complex<f64> {
    let eval = |coeffs: &[f64]| {
        coeffs
            .iter()
            .enumerate()
            .map(|(k, &c)| Complex::from_polar(c, -w * k as f64))
            .sum::<Complex<f64>>()
    };
    eval(b) / eval(a)
}

/// Single-direction IIR filter, direct form II transposed, zero initial
/// state.
fn lfilter(b: &[f64], a: &[f64], signal: &[f64]) -> Vec<f64> {
    let n = b.len().max(a.len());
    let mut bn = b.to_vec();
    let mut an = a.to_vec();
    bn.resize(n, 0.0);
    an.resize(n, 0.0);
    let a0 = an[0];
    for c in &mut bn {
        *c /= a0;
    }
    for c in &mut an {
        *c /= a0;
    }

    let mut state = vec![0.0; n.saturating_sub(1)];
    let mut out = Vec::with_capacity(signal.len());
    for &x in signal {
        let y = bn[0] * x + state.first().copied().unwrap_or(0.0);
        for i in 1..n - 1 {
            state[i - 1] = bn[i] * x + state[i] - an[i] * y;
        }
        if n > 1 {
            state[n - 2] = bn[n - 1] * x - an[n - 1] * y;
        }
        out.push(y);
    }
    out
}

/// Forward-backward filtering with odd-reflection edge padding. The
/// padding absorbs the zero-state transient at both ends and is discarded
/// from the result.
fn filtfilt(b: &[f64], a: &[f64], signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let ntaps = b.len().max(a.len());
    let pad = (3 * (ntaps - 1)).min(n - 1);

    let mut extended = Vec::with_capacity(n + 2 * pad);
    for i in (1..=pad).rev() {
        extended.push(2.0 * signal[0] - signal[i]);
    }
    extended.extend_from_slice(signal);
    for i in (1..=pad).rev() {
        extended.push(2.0 * signal[n - 1] - signal[n - 1 - i]);
    }

    let mut filtered = lfilter(b, a, &extended);
    filtered.reverse();
    let mut filtered = lfilter(b, a, &filtered);
    filtered.reverse();

    filtered[pad..pad + n].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinusoid(freq: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (TWO_PI * freq * i as f64 / rate).sin())
            .collect()
    }

    /// RMS over the middle half of a signal, away from edge transients.
    fn middle_rms(signal: &[f64]) -> f64 {
        let quarter = signal.len() / 4;
        let middle = &signal[quarter..signal.len() - quarter];
        (middle.iter().map(|x| x * x).sum::<f64>() / middle.len() as f64).sqrt()
    }

    #[test]
    fn next_power_of_2_properties() {
        assert_eq!(next_power_of_2(0), 1);
        assert_eq!(next_power_of_2(1), 1);
        assert_eq!(next_power_of_2(2), 2);
        assert_eq!(next_power_of_2(3), 4);
        assert_eq!(next_power_of_2(1024), 1024);
        assert_eq!(next_power_of_2(1025), 2048);
    }

    #[test]
    fn canonical_band_resolution_is_exact() {
        assert_eq!(parse_passband(&"theta".into()).unwrap(), (4.0, 10.0));
        assert_eq!(parse_passband(&"ripples".into()).unwrap(), (100.0, 250.0));
        assert_eq!(parse_passband(&"delta".into()).unwrap(), (0.0, 4.0));
        assert_eq!(parse_passband(&"spindles".into()).unwrap(), (10.0, 20.0));
        assert_eq!(parse_passband(&"gamma".into()).unwrap(), (30.0, 80.0));
    }

    #[test]
    fn explicit_cutoffs_pass_through_unchanged() {
        assert_eq!(
            parse_passband(&Passband::Explicit(12.5, 42.0)).unwrap(),
            (12.5, 42.0)
        );
    }

    #[test]
    fn unknown_band_name_is_rejected() {
        assert!(matches!(
            parse_passband(&"sigma".into()),
            Err(ConvertError::UnknownBand(_))
        ));
    }

    #[test]
    fn non_butterworth_kinds_fail_instead_of_passing_through() {
        let signal = sinusoid(8.0, 250.0, 500);
        assert!(matches!(
            bandpass_filter(&signal, 250.0, &"theta".into(), 4, FilterKind::Cheby1),
            Err(ConvertError::UnsupportedFilterKind("cheby1"))
        ));
        assert!(matches!(
            bandpass_filter(&signal, 250.0, &"theta".into(), 4, FilterKind::Fir1),
            Err(ConvertError::UnsupportedFilterKind("fir1"))
        ));
    }

    #[test]
    fn invalid_passband_is_rejected() {
        let signal = sinusoid(8.0, 250.0, 100);
        // High edge at/above Nyquist.
        assert!(matches!(
            bandpass_filter(
                &signal,
                250.0,
                &Passband::Explicit(10.0, 130.0),
                4,
                FilterKind::Butterworth
            ),
            Err(ConvertError::InvalidPassband { .. })
        ));
        // Inverted edges.
        assert!(matches!(
            bandpass_filter(
                &signal,
                250.0,
                &Passband::Explicit(20.0, 10.0),
                4,
                FilterKind::Butterworth
            ),
            Err(ConvertError::InvalidPassband { .. })
        ));
    }

    #[test]
    fn in_band_sinusoid_keeps_its_amplitude() {
        let rate = 250.0;
        // Near the theta band's geometric center.
        let signal = sinusoid(6.3, rate, 2500);
        let filtered =
            bandpass_filter(&signal, rate, &"theta".into(), 4, FilterKind::Butterworth).unwrap();
        let ratio = middle_rms(&filtered) / middle_rms(&signal);
        assert!(
            (0.9..=1.1).contains(&ratio),
            "in-band amplitude ratio {}",
            ratio
        );
    }

    #[test]
    fn out_of_band_sinusoid_is_attenuated() {
        let rate = 250.0;
        let signal = sinusoid(50.0, rate, 2500);
        let filtered =
            bandpass_filter(&signal, rate, &"theta".into(), 4, FilterKind::Butterworth).unwrap();
        let ratio = middle_rms(&filtered) / middle_rms(&signal);
        assert!(ratio < 0.05, "out-of-band amplitude ratio {}", ratio);
    }

    #[test]
    fn wrap_phase_stays_below_two_pi() {
        // -1e-18 + 2π rounds to exactly 2π in f64; the wrap must not
        // let that escape the [0, 2π) range.
        assert_eq!(wrap_phase(-1e-18), 0.0);
        assert_eq!(wrap_phase(0.0), 0.0);
        assert_eq!(wrap_phase(1.0), 1.0);
        assert!((wrap_phase(-0.1) - (TWO_PI - 0.1)).abs() < 1e-12);
        assert!(wrap_phase(-f64::EPSILON) < TWO_PI);
        assert!(wrap_phase(PI) < TWO_PI);
    }

    #[test]
    fn phase_is_wrapped_to_the_unit_circle() {
        // A signal with no particular structure.
        let signal: Vec<f64> = (0..777)
            .map(|i| {
                let t = i as f64;
                (0.07 * t).sin() + 0.4 * (0.31 * t + 1.0).cos() - 0.1
            })
            .collect();
        let (phase, amplitude) = phase_amplitude(&signal);
        assert_eq!(phase.len(), signal.len());
        assert_eq!(amplitude.len(), signal.len());
        for &p in &phase {
            assert!((0.0..TWO_PI).contains(&p), "phase {} out of range", p);
        }
        for &a in &amplitude {
            assert!(a >= 0.0);
        }
    }

    #[test]
    fn envelope_of_a_pure_sinusoid_is_flat() {
        let rate = 250.0;
        let amplitude_in = 3.5;
        let signal: Vec<f64> = sinusoid(10.0, rate, 2048)
            .iter()
            .map(|x| x * amplitude_in)
            .collect();
        let (_, envelope) = phase_amplitude(&signal);
        let quarter = envelope.len() / 4;
        for &a in &envelope[quarter..envelope.len() - quarter] {
            assert!(
                (a - amplitude_in).abs() / amplitude_in < 0.05,
                "envelope {} far from {}",
                a,
                amplitude_in
            );
        }
    }

    #[test]
    fn hilbert_phase_advances_with_a_sinusoid() {
        let rate = 250.0;
        let freq = 10.0;
        let signal = sinusoid(freq, rate, 2048);
        let (phase, _) = phase_amplitude(&signal);
        // Expected per-sample phase increment.
        let step = TWO_PI * freq / rate;
        let mid = phase.len() / 2;
        for i in mid..mid + 100 {
            let mut diff = phase[i + 1] - phase[i];
            if diff < 0.0 {
                diff += TWO_PI;
            }
            assert!((diff - step).abs() < 0.05, "phase step {} vs {}", diff, step);
        }
    }
}
