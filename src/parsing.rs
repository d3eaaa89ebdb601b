use std::time::Duration;

/// Parse a Kubernetes quantity (`"3920m"`, `"4"`, `"16283240Ki"`, `"1G"`) into
/// a plain float: cores for CPU, bytes for memory.
pub fn parse_quantity(q: &str) -> Option<f64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }

    // Order matters: check binary suffixes first (Ki, Mi, ...), then decimal (k, M, ...)
    const BINARY_UNITS: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1048576.0),
        ("Gi", 1073741824.0),
        ("Ti", 1099511627776.0),
        ("Pi", 1125899906842624.0),
        ("Ei", 1152921504606846976.0),
    ];
    const FRACTION_UNITS: &[(&str, f64)] = &[("n", 1e9), ("u", 1e6), ("m", 1e3)];
    const DECIMAL_UNITS: &[(&str, f64)] = &[
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    for (suf, mul) in BINARY_UNITS.iter().chain(DECIMAL_UNITS) {
        if let Some(stripped) = q.strip_suffix(suf) {
            return stripped.parse::<f64>().ok().map(|v| v * mul);
        }
    }
    for (suf, div) in FRACTION_UNITS {
        if let Some(stripped) = q.strip_suffix(suf) {
            return stripped.parse::<f64>().ok().map(|v| v / div);
        }
    }
    q.parse::<f64>().ok()
}

/// `100 * used / allocatable`. A zero allocatable yields `inf` or `NaN`.
pub fn percent_of(used: f64, allocatable: f64) -> f64 {
    100.0 * (used / allocatable)
}

/// Render a byte count with binary units: `"500.000000 B"`, `"2.0Ki"`, `"1.0Gi"`.
pub fn byte_count_iec(bytes: f64) -> String {
    const UNIT: f64 = 1024.0;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes.is_nan() || bytes < UNIT {
        return format!("{:.6} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < PREFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1}{}i", bytes / div, PREFIXES[exp])
}

/// Format a window the way PromQL range selectors expect it (`24h`, `1h30m`, `90s`).
pub fn format_prometheus_duration(d: Duration) -> String {
    const UNITS: &[(u128, &str)] = &[(3_600_000, "h"), (60_000, "m"), (1_000, "s"), (1, "ms")];

    let mut millis = d.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (size, suffix) in UNITS {
        if millis >= *size {
            out.push_str(&format!("{}{}", millis / size, suffix));
            millis %= size;
        }
    }
    out
}

/// Parse a Go-style duration such as `24h`, `90m` or `1h30m`.
pub fn parse_go_duration(s: &str) -> Result<Duration, String> {
    let nanos = go_parse_duration::parse_duration(s.trim())
        .map_err(|e| format!("invalid duration {:?}: {:?}", s, e))?;
    Ok(Duration::from_nanos(nanos.max(0) as u64))
}
