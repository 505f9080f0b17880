//! Higher-timeframe resampling.
//!
//! Base bars are grouped into contiguous buckets by an [`HtfRule`]. Each bucket
//! aggregates OHLC as first/max/min/last. Volume is summed only when every bar
//! in the bucket carries one.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};

use crate::domain::Bar;
use crate::error::ConfigError;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtfRule {
    /// ISO week (Monday start).
    Week,
    /// Calendar month.
    Month,
    /// `n`-day buckets counted from the Unix epoch.
    Days(u32),
    /// `n`-hour buckets counted from the Unix epoch.
    Hours(u32),
}

impl HtfRule {
    /// Monotone bucket key for a timestamp.
    pub fn bucket_key(&self, ts: &NaiveDateTime) -> i64 {
        match self {
            HtfRule::Week => {
                let date = ts.date();
                i64::from(date.num_days_from_ce())
                    - i64::from(date.weekday().num_days_from_monday())
            }
            HtfRule::Month => i64::from(ts.year()) * 12 + i64::from(ts.month0()),
            HtfRule::Days(n) => ts
                .and_utc()
                .timestamp()
                .div_euclid(SECONDS_PER_DAY * i64::from(*n)),
            HtfRule::Hours(n) => ts
                .and_utc()
                .timestamp()
                .div_euclid(SECONDS_PER_HOUR * i64::from(*n)),
        }
    }
}

impl FromStr for HtfRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim().to_ascii_uppercase();
        match rule.as_str() {
            "W" | "1W" => return Ok(HtfRule::Week),
            "M" | "1M" => return Ok(HtfRule::Month),
            _ => {}
        }

        let unknown = || ConfigError::UnknownHtfRule(s.to_string());
        let Some((split, _)) = rule.char_indices().last() else {
            return Err(unknown());
        };
        let (count, unit) = rule.split_at(split);
        let n = if count.is_empty() {
            1
        } else {
            count.parse::<u32>().map_err(|_| unknown())?
        };
        if n == 0 {
            return Err(unknown());
        }
        match unit {
            "D" => Ok(HtfRule::Days(n)),
            "H" => Ok(HtfRule::Hours(n)),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for HtfRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtfRule::Week => write!(f, "W"),
            HtfRule::Month => write!(f, "M"),
            HtfRule::Days(n) => write!(f, "{n}D"),
            HtfRule::Hours(n) => write!(f, "{n}H"),
        }
    }
}

/// One aggregated higher-timeframe bar.
#[derive(Debug, Clone, PartialEq)]
pub struct HtfBar {
    pub bar: Bar,
    /// First base-bar index in the bucket.
    pub first_index: usize,
    /// Last base-bar index in the bucket.
    pub last_index: usize,
}

/// Resampled bars plus, for each base bar, the index of the bucket holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub buckets: Vec<HtfBar>,
    pub bucket_of: Vec<usize>,
}

/// Group `bars` (already time-ordered) into buckets.
pub fn resample(bars: &[Bar], rule: HtfRule) -> Resampled {
    let mut buckets: Vec<HtfBar> = Vec::new();
    let mut bucket_of = Vec::with_capacity(bars.len());
    let mut current_key: Option<i64> = None;

    for (i, bar) in bars.iter().enumerate() {
        let key = rule.bucket_key(&bar.timestamp);
        match buckets.last_mut() {
            Some(last) if current_key == Some(key) => {
                last.bar.high = last.bar.high.max(bar.high);
                last.bar.low = last.bar.low.min(bar.low);
                last.bar.close = bar.close;
                last.bar.volume = match (last.bar.volume, bar.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
                last.last_index = i;
            }
            _ => {
                buckets.push(HtfBar {
                    bar: bar.clone(),
                    first_index: i,
                    last_index: i,
                });
                current_key = Some(key);
            }
        }
        bucket_of.push(buckets.len() - 1);
    }

    Resampled { buckets, bucket_of }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar_on(y: i32, m: u32, d: u32, close: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close).with_volume(10.0)
    }

    #[test]
    fn parse_rules() {
        assert_eq!("W".parse::<HtfRule>().unwrap(), HtfRule::Week);
        assert_eq!("m".parse::<HtfRule>().unwrap(), HtfRule::Month);
        assert_eq!("3D".parse::<HtfRule>().unwrap(), HtfRule::Days(3));
        assert_eq!("4h".parse::<HtfRule>().unwrap(), HtfRule::Hours(4));
        assert_eq!("D".parse::<HtfRule>().unwrap(), HtfRule::Days(1));
        assert!("0D".parse::<HtfRule>().is_err());
        assert!("Q".parse::<HtfRule>().is_err());
        assert!("".parse::<HtfRule>().is_err());
        assert!("xD".parse::<HtfRule>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for rule in [
            HtfRule::Week,
            HtfRule::Month,
            HtfRule::Days(2),
            HtfRule::Hours(6),
        ] {
            assert_eq!(rule.to_string().parse::<HtfRule>().unwrap(), rule);
        }
    }

    #[test]
    fn weekly_buckets_split_on_monday() {
        // 2024-01-04 Thu, 05 Fri, 08 Mon, 09 Tue
        let bars = vec![
            bar_on(2024, 1, 4, 10.0),
            bar_on(2024, 1, 5, 12.0),
            bar_on(2024, 1, 8, 11.0),
            bar_on(2024, 1, 9, 15.0),
        ];
        let r = resample(&bars, HtfRule::Week);
        assert_eq!(r.buckets.len(), 2);
        assert_eq!(r.bucket_of, vec![0, 0, 1, 1]);

        let first = &r.buckets[0];
        assert_eq!(first.bar.open, 10.0);
        assert_eq!(first.bar.close, 12.0);
        assert_eq!(first.bar.high, 13.0);
        assert_eq!(first.bar.low, 9.0);
        assert_eq!(first.bar.volume, Some(20.0));
        assert_eq!((first.first_index, first.last_index), (0, 1));
    }

    #[test]
    fn monthly_buckets() {
        let bars = vec![
            bar_on(2024, 1, 30, 10.0),
            bar_on(2024, 1, 31, 11.0),
            bar_on(2024, 2, 1, 12.0),
        ];
        let r = resample(&bars, HtfRule::Month);
        assert_eq!(r.bucket_of, vec![0, 0, 1]);
    }

    #[test]
    fn missing_volume_drops_bucket_volume() {
        let mut bars = vec![bar_on(2024, 1, 8, 10.0), bar_on(2024, 1, 9, 11.0)];
        bars[1].volume = None;
        let r = resample(&bars, HtfRule::Week);
        assert_eq!(r.buckets[0].bar.volume, None);
    }
}
