//! Analysis module - rolling buffer, trend and rate-of-change estimation

mod buffer;
mod regression;

pub use buffer::{RollingBuffer, SharedBuffer};
pub use regression::{minutes_since, to_points, LinearFit, DENOMINATOR_EPSILON};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::sensors::Sample;

/// How the long trend slope is estimated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendMethod {
    /// Least-squares slope over every point in the window
    #[default]
    Regression,
    /// Difference quotient between the first and last point
    Endpoint,
}

/// Short-horizon rate of change over the rate window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateOfChange {
    /// NTU per minute
    pub slope: f64,
    /// Last minus first turbidity in the window
    pub delta: f64,
    pub duration_min: f64,
    pub points: usize,
}

/// Per-sample analysis result handed to the alert engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// Long trend in NTU/min, `None` with fewer than two points
    pub long_slope: Option<f64>,
    pub rising_fast: bool,
    pub rate: Option<RateOfChange>,
    pub rate_exceeded: bool,
}

/// One point of the smoothed display curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub observed_at: DateTime<Utc>,
    pub raw: f64,
    pub fitted: f64,
}

/// Chart export: the buffer tail with the fitted curve where it overlaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub observed_at: DateTime<Utc>,
    pub turbidity: f64,
    pub fitted: Option<f64>,
}

/// Trend analyzer
pub struct TrendAnalyzer {
    config: AnalysisConfig,
}

impl TrendAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze the buffer as of `now`
    pub fn update(&self, buffer: &RollingBuffer, now: DateTime<Utc>) -> TrendSnapshot {
        let long_window = buffer.window(secs(self.config.trend_window_secs), now);
        let long_slope = self.long_trend(&long_window);
        let rising_fast = long_slope
            .map(|s| s >= self.config.trend_threshold_per_min)
            .unwrap_or(false);

        let rate_window = buffer.window(secs(self.config.rate_window_secs), now);
        let rate = self.rate_of_change(&rate_window);
        let rate_exceeded = rate.map(|r| self.rate_exceeds(&r)).unwrap_or(false);

        if rising_fast || rate_exceeded {
            debug!(
                "Trend update: long_slope={:?} rate={:?} rising_fast={} rate_exceeded={}",
                long_slope, rate, rising_fast, rate_exceeded
            );
        }

        TrendSnapshot {
            long_slope,
            rising_fast,
            rate,
            rate_exceeded,
        }
    }

    /// Long trend slope in NTU/min
    pub fn long_trend(&self, samples: &[Sample]) -> Option<f64> {
        if samples.len() < 2 {
            return None;
        }
        match self.config.trend_method {
            TrendMethod::Regression => LinearFit::fit(&to_points(samples)).map(|f| f.slope),
            TrendMethod::Endpoint => {
                let (first, last) = (samples.first()?, samples.last()?);
                let minutes = minutes_since(first.observed_at, last.observed_at);
                Some((last.turbidity_ntu - first.turbidity_ntu) / minutes.max(DENOMINATOR_EPSILON))
            }
        }
    }

    /// Regression slope and net change over the rate window
    pub fn rate_of_change(&self, samples: &[Sample]) -> Option<RateOfChange> {
        let points = to_points(samples);
        let fit = LinearFit::fit(&points)?;
        let (first, last) = (points.first()?, points.last()?);
        Some(RateOfChange {
            slope: fit.slope,
            delta: last.1 - first.1,
            duration_min: last.0 - first.0,
            points: points.len(),
        })
    }

    pub fn rate_exceeds(&self, rate: &RateOfChange) -> bool {
        rate.points >= self.config.rate_min_points
            && rate.slope >= self.config.rate_threshold_per_min
            && rate.delta >= self.config.rate_min_delta
    }

    /// Rolling-regression smoothing, one fitted value per input sample
    pub fn smoothed_curve(&self, samples: &[Sample]) -> Vec<CurvePoint> {
        let points = to_points(samples);
        let roll_min = (self.config.rolling_window_secs as f64 / 60.0).max(0.1);

        let mut curve: Vec<CurvePoint> = Vec::with_capacity(samples.len());
        let mut start = 0;
        for (i, (sample, &(t, y))) in samples.iter().zip(points.iter()).enumerate() {
            while points[start].0 < t - roll_min {
                start += 1;
            }
            let fitted = match LinearFit::fit(&points[start..=i]) {
                Some(fit) => fit.at(t),
                None => curve.last().map(|p| p.fitted).unwrap_or(y),
            };
            curve.push(CurvePoint {
                observed_at: sample.observed_at,
                raw: y,
                fitted,
            });
        }
        curve
    }

    /// Chart tail with the smoothed curve aligned to its newest points
    pub fn chart(&self, buffer: &RollingBuffer, now: DateTime<Utc>) -> Vec<ChartPoint> {
        let tail = buffer.tail(self.config.chart_points);
        let window = buffer.window(secs(self.config.curve_window_secs), now);
        let curve = self.smoothed_curve(&window);

        let overlap = curve.len().min(tail.len());
        let offset = tail.len() - overlap;
        let fitted = &curve[curve.len() - overlap..];

        tail.iter()
            .enumerate()
            .map(|(i, s)| ChartPoint {
                observed_at: s.observed_at,
                turbidity: s.turbidity_ntu,
                fitted: i.checked_sub(offset).map(|j| fitted[j].fitted),
            })
            .collect()
    }
}

fn secs(n: u64) -> Duration {
    Duration::seconds(n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn buffer_from(values: &[f64], step_secs: i64) -> RollingBuffer {
        let mut buffer = RollingBuffer::default();
        for (i, &v) in values.iter().enumerate() {
            buffer.append(Sample::new(t0() + Duration::seconds(i as i64 * step_secs), v, 3000.0));
        }
        buffer
    }

    fn last_time(buffer: &RollingBuffer) -> DateTime<Utc> {
        buffer.latest().map(|s| s.observed_at).unwrap()
    }

    #[test]
    fn test_trend_regression_vs_endpoint() {
        let buffer = buffer_from(&[5.0, 10.0, 20.0, 35.0, 50.0], 15);
        let now = last_time(&buffer);

        let ols = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, now);
        assert!((ols.long_slope.unwrap() - 46.0).abs() < 1e-9);
        assert!(ols.rising_fast);

        let endpoint = TrendAnalyzer::new(AnalysisConfig {
            trend_method: TrendMethod::Endpoint,
            ..AnalysisConfig::default()
        })
        .update(&buffer, now);
        assert!((endpoint.long_slope.unwrap() - 45.0).abs() < 1e-9);
        assert!(endpoint.rising_fast);
    }

    #[test]
    fn test_single_point_has_no_trend() {
        let buffer = buffer_from(&[40.0], 1);
        let snap = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, last_time(&buffer));
        assert_eq!(snap.long_slope, None);
        assert!(!snap.rising_fast);
        assert!(!snap.rate_exceeded);
    }

    #[test]
    fn test_rate_requires_min_points() {
        // slope 60 NTU/min, delta 20 but only two points
        let buffer = buffer_from(&[0.0, 20.0], 20);
        let snap = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, last_time(&buffer));
        assert_eq!(snap.rate.map(|r| r.points), Some(2));
        assert!(!snap.rate_exceeded);
    }

    #[test]
    fn test_rate_requires_min_delta() {
        // 3 points over 6 s: slope 80 NTU/min but only 8 NTU of change
        let buffer = buffer_from(&[1.0, 5.0, 9.0], 3);
        let snap = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, last_time(&buffer));
        let rate = snap.rate.unwrap();
        assert!(rate.slope >= 20.0);
        assert!((rate.delta - 8.0).abs() < 1e-9);
        assert!(!snap.rate_exceeded);
    }

    #[test]
    fn test_rate_fires_on_fast_rise() {
        let buffer = buffer_from(&[5.0, 10.0, 20.0, 35.0, 50.0], 10);
        let snap = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, last_time(&buffer));
        let rate = snap.rate.unwrap();
        assert_eq!(rate.points, 5);
        assert!((rate.delta - 45.0).abs() < 1e-9);
        assert!(snap.rate_exceeded);
    }

    #[test]
    fn test_rate_window_ignores_old_points() {
        // Old spike outside the 60 s window, flat readings inside it
        let mut buffer = buffer_from(&[0.0, 500.0], 1);
        for i in 0..5 {
            buffer.append(Sample::new(t0() + Duration::seconds(120 + i * 10), 3.0, 3000.0));
        }
        let snap = TrendAnalyzer::new(AnalysisConfig::default()).update(&buffer, last_time(&buffer));
        assert_eq!(snap.rate.map(|r| r.points), Some(5));
        assert!(!snap.rate_exceeded);
        assert!(!snap.rising_fast);
    }

    #[test]
    fn test_smoothed_curve_tracks_a_line() {
        let values: Vec<f64> = (0..20).map(|i| 2.0 * i as f64).collect();
        let buffer = buffer_from(&values, 6);
        let analyzer = TrendAnalyzer::new(AnalysisConfig::default());
        let curve = analyzer.smoothed_curve(&buffer.snapshot());

        assert_eq!(curve.len(), 20);
        // first point carries the raw value
        assert_eq!(curve[0].fitted, 0.0);
        for p in &curve {
            assert!((p.fitted - p.raw).abs() < 1e-6);
        }
    }

    #[test]
    fn test_smoothed_curve_carries_previous_fit_on_gap() {
        // A 5 minute gap leaves the third point alone in its sub-window
        let mut buffer = buffer_from(&[1.0, 3.0], 30);
        buffer.append(Sample::new(t0() + Duration::seconds(330), 90.0, 3000.0));
        let curve = TrendAnalyzer::new(AnalysisConfig::default()).smoothed_curve(&buffer.snapshot());

        assert_eq!(curve[0].fitted, 1.0);
        assert!((curve[1].fitted - 3.0).abs() < 1e-9);
        assert!((curve[2].fitted - curve[1].fitted).abs() < 1e-12);
    }

    #[test]
    fn test_chart_aligns_with_tail() {
        let values: Vec<f64> = (0..80).map(|i| i as f64).collect();
        let buffer = buffer_from(&values, 1);
        let analyzer = TrendAnalyzer::new(AnalysisConfig::default());
        let chart = analyzer.chart(&buffer, last_time(&buffer));

        assert_eq!(chart.len(), 50);
        assert_eq!(chart[0].turbidity, 30.0);
        assert!(chart.iter().all(|p| p.fitted.is_some()));
        assert!((chart[49].fitted.unwrap() - 79.0).abs() < 1e-6);
    }

    #[test]
    fn test_chart_without_curve_coverage() {
        // Only the newest sample lies inside a 10 s curve window
        let buffer = buffer_from(&[1.0, 2.0, 3.0], 60);
        let analyzer = TrendAnalyzer::new(AnalysisConfig {
            curve_window_secs: 10,
            ..AnalysisConfig::default()
        });
        let chart = analyzer.chart(&buffer, last_time(&buffer));
        assert_eq!(chart.len(), 3);
        assert_eq!(chart[0].fitted, None);
        assert_eq!(chart[1].fitted, None);
        assert_eq!(chart[2].fitted, Some(3.0));
    }
}
