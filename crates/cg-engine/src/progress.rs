//! Parsing of ffmpeg `-progress` output into completion ratios.
//!
//! ffmpeg writes `key=value` blocks terminated by `progress=continue` or
//! `progress=end`. The total is taken from the input header
//! (`Duration: HH:MM:SS.ss`) and capped by any `-t` limit on the command
//! line, since output stops at whichever comes first.

/// Incremental parser for one ffmpeg run.
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    input_duration_us: Option<i64>,
    cap_us: Option<i64>,
    out_time_us: Option<i64>,
}

impl ProgressParser {
    /// Parser with no known duration yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser whose total is capped by the `-t` argument found in `args`.
    pub fn from_args(args: &[String]) -> Self {
        let cap_us = args
            .windows(2)
            .find(|w| w[0] == "-t")
            .and_then(|w| parse_timestamp_us(&w[1]));
        Self {
            cap_us,
            ..Self::default()
        }
    }

    /// Effective total duration in seconds, if known.
    pub fn total_secs(&self) -> Option<f64> {
        self.total_us().map(|us| us as f64 / 1_000_000.0)
    }

    fn total_us(&self) -> Option<i64> {
        match (self.input_duration_us, self.cap_us) {
            (Some(d), Some(c)) => Some(d.min(c)),
            (Some(d), None) => Some(d),
            (None, Some(c)) => Some(c),
            (None, None) => None,
        }
        .filter(|&us| us > 0)
    }

    /// Feed one stderr line. Returns a ratio in `[0, 1]` at the end of each
    /// progress block once a total is known; `progress=end` always yields
    /// `1.0`.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Duration:") {
            if self.input_duration_us.is_none() {
                let stamp = rest.split(',').next().unwrap_or("").trim();
                self.input_duration_us = parse_timestamp_us(stamp);
            }
            return None;
        }

        if let Some(val) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = val.trim().parse::<i64>() {
                self.out_time_us = Some(us);
            }
            return None;
        }

        // Despite the name, ffmpeg reports this field in microseconds too.
        if let Some(val) = line.strip_prefix("out_time_ms=") {
            if self.out_time_us.is_none() {
                if let Ok(us) = val.trim().parse::<i64>() {
                    self.out_time_us = Some(us);
                }
            }
            return None;
        }

        if let Some(state) = line.strip_prefix("progress=") {
            if state.trim() == "end" {
                return Some(1.0);
            }
            let ratio = match (self.out_time_us, self.total_us()) {
                (Some(out), Some(total)) => Some((out as f64 / total as f64).clamp(0.0, 1.0)),
                _ => None,
            };
            self.out_time_us = None;
            return ratio;
        }

        None
    }
}

/// Parse `HH:MM:SS(.frac)` or plain seconds (`5`, `2.5`) into microseconds.
fn parse_timestamp_us(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" {
        return None;
    }

    let secs = if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return None;
        }
        let h: f64 = parts[0].parse().ok()?;
        let m: f64 = parts[1].parse().ok()?;
        let sec: f64 = parts[2].parse().ok()?;
        h * 3600.0 + m * 60.0 + sec
    } else {
        s.parse::<f64>().ok()?
    };

    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1_000_000.0).round() as i64)
}
