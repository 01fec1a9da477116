use std::borrow::Cow;
use std::f64::consts::PI;

use once_cell::sync::Lazy;

/// Standard vindusbredde for pulsglatting (antall økter).
pub const HR_SMOOTH_WINDOW: usize = 6;

static DEFAULT_WEIGHTS: Lazy<Vec<f64>> = Lazy::new(|| cosine_window(HR_SMOOTH_WINDOW));

/// Symmetrisk cosinusvindu (sinus-halvbølge), normalisert til sum 1.
/// w[k] = sin(pi * (k + 0.5) / n)
pub fn cosine_window(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let raw: Vec<f64> = (0..n)
        .map(|k| (PI * (k as f64 + 0.5) / n as f64).sin())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

fn weights_for(window: usize) -> Cow<'static, [f64]> {
    if window == HR_SMOOTH_WINDOW {
        Cow::Borrowed(DEFAULT_WEIGHTS.as_slice())
    } else {
        Cow::Owned(cosine_window(window))
    }
}

/// Cosinus-vektet rullende snitt.
///
/// Verdien på indeks i bruker vinduet `values[i+1-window ..= i]`, så de første
/// `window - 1` plassene blir `None`. Et vindu som inneholder en manglende
/// verdi gir også `None`.
pub fn cosine_rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let weights = weights_for(window);
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        let mut acc = 0.0;
        let mut complete = true;
        for (v, w) in slice.iter().zip(weights.iter()) {
            match v {
                Some(x) if x.is_finite() => acc += x * w,
                _ => {
                    complete = false;
                    break;
                }
            }
        }
        out.push(if complete { Some(acc) } else { None });
    }

    out
}
