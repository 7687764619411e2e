//upper bound on how many trailing values feed a key
pub const MAX_KEY_WINDOW: usize = 512;

//builds a deterministic cache key for an indicator computation
//only the last `period + 1` values of the series are hashed (capped at MAX_KEY_WINDOW),
//so the indicator must not depend on anything older than that window
pub fn indicator_key(name: &str, series: &[f64], period: usize, extra: &[(&str, f64)]) -> String {
    let window = series
        .len()
        .min(period.saturating_add(1))
        .min(MAX_KEY_WINDOW);
    let sample = &series[series.len() - window..];

    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(&(period as u64).to_le_bytes());
    hasher.update(&(window as u64).to_le_bytes());
    for value in sample {
        hasher.update(&value.to_bits().to_le_bytes());
    }

    //params are order-insensitive
    let mut params = extra.to_vec();
    params.sort_by(|a, b| a.0.cmp(b.0));
    for (param, value) in params {
        hasher.update(param.as_bytes());
        hasher.update(&[0]);
        hasher.update(&value.to_bits().to_le_bytes());
    }

    let hex = hasher.finalize().to_hex();
    format!("{}:{}:{}", name, period, &hex.as_str()[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_window_same_key() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [9.0, 9.0, 3.0, 4.0, 5.0];
        //period 2 hashes only the last three values
        assert_eq!(indicator_key("sma", &a, 2, &[]), indicator_key("sma", &b, 2, &[]));
        assert_ne!(indicator_key("sma", &a, 4, &[]), indicator_key("sma", &b, 4, &[]));
    }

    #[test]
    fn growing_series_keeps_key_for_same_tail() {
        let short = [3.0, 4.0, 5.0];
        let long = [0.5, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(indicator_key("rsi", &short, 2, &[]), indicator_key("rsi", &long, 2, &[]));
    }

    #[test]
    fn name_period_and_params_distinguish_keys() {
        let s = [1.0, 2.0, 3.0];
        assert_ne!(indicator_key("sma", &s, 2, &[]), indicator_key("ema", &s, 2, &[]));
        assert_ne!(indicator_key("sma", &s, 2, &[]), indicator_key("sma", &s, 1, &[]));
        assert_ne!(
            indicator_key("bb", &s, 2, &[("k", 2.0)]),
            indicator_key("bb", &s, 2, &[("k", 2.5)])
        );
        assert_eq!(
            indicator_key("bb", &s, 2, &[("k", 2.0), ("m", 1.0)]),
            indicator_key("bb", &s, 2, &[("m", 1.0), ("k", 2.0)])
        );
    }

    #[test]
    fn short_and_empty_series() {
        let key = indicator_key("rsi", &[], 14, &[]);
        assert!(key.starts_with("rsi:14:"));
        assert_ne!(key, indicator_key("rsi", &[1.0], 14, &[]));
    }
}
