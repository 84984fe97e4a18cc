//! Technical indicator math: SMA, EMA, Wilder RSI, MACD and the combined
//! buy/sell/neutral interpretation.
//!
//! All functions take prices oldest first. A series shorter than an
//! indicator's period produces no value for that indicator.

use crate::config::IndicatorConfig;
use crate::db::sqlite::models::{IndicatorParams, IndicatorValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiCondition {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaValue {
    pub period: usize,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiValue {
    pub period: usize,
    pub value: f64,
    pub condition: RsiCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub fast: usize,
    pub slow: usize,
    pub signal_period: usize,
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
    /// Set once the signal line has two observations
    pub crossover: Option<Signal>,
}

/// Current value of every indicator that had enough history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma: Vec<SmaValue>,
    pub rsi: Option<RsiValue>,
    pub macd: Option<MacdValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub signal: Signal,
    /// Winning votes over total votes, 0 when nothing voted
    pub strength: f64,
    pub buy_votes: usize,
    pub sell_votes: usize,
    pub neutral_votes: usize,
}

/// Trailing simple moving average; one value per full window
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for value in &values[period..] {
        let prev = out[out.len() - 1];
        out.push(value * k + prev * (1.0 - k));
    }
    out
}

/// Relative strength index with Wilder smoothing; needs `period + 1` prices
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: &f64| c.max(0.0);
    let loss = |c: &f64| (-c).max(0.0);

    let mut avg_gain = changes[..period].iter().map(gain).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(loss).sum::<f64>() / period as f64;

    let p = period as f64;
    for change in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + gain(change)) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss(change)) / p;
    }

    if avg_loss == 0.0 {
        // Flat series has no momentum either way
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram, each aligned to its own tail
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdSeries> {
    if fast == 0 || fast >= slow || values.len() < slow {
        return None;
    }
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let offset = slow - fast;

    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();
    let signal_line = ema(&line, signal);
    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(j, s)| line[j + signal - 1] - s)
        .collect();

    Some(MacdSeries {
        macd: line,
        signal: signal_line,
        histogram,
    })
}

/// Direction of a MACD/signal cross between the last two observations
pub fn crossover(histogram: &[f64]) -> Option<Signal> {
    if histogram.len() < 2 {
        return None;
    }
    let prev = histogram[histogram.len() - 2];
    let cur = histogram[histogram.len() - 1];
    Some(if prev <= 0.0 && cur > 0.0 {
        Signal::Buy
    } else if prev >= 0.0 && cur < 0.0 {
        Signal::Sell
    } else {
        Signal::Neutral
    })
}

/// Compute every configured indicator over a price series
pub fn compute(prices: &[f64], config: &IndicatorConfig) -> IndicatorSet {
    let sma = config
        .sma_periods
        .iter()
        .filter_map(|&period| {
            sma(prices, period).last().map(|&current| SmaValue { period, current })
        })
        .collect();

    let rsi = rsi(prices, config.rsi_period).map(|value| RsiValue {
        period: config.rsi_period,
        value,
        condition: if value > config.rsi_overbought {
            RsiCondition::Overbought
        } else if value < config.rsi_oversold {
            RsiCondition::Oversold
        } else {
            RsiCondition::Neutral
        },
    });

    let macd = macd(prices, config.macd_fast, config.macd_slow, config.macd_signal).and_then(|series| {
        Some(MacdValue {
            fast: config.macd_fast,
            slow: config.macd_slow,
            signal_period: config.macd_signal,
            macd: *series.macd.last()?,
            signal: series.signal.last().copied(),
            histogram: series.histogram.last().copied(),
            crossover: crossover(&series.histogram),
        })
    });

    IndicatorSet { sma, rsi, macd }
}

/// Majority vote of SMA trend, RSI condition and MACD crossover
pub fn interpret(set: &IndicatorSet, config: &IndicatorConfig) -> Interpretation {
    let mut votes: Vec<Signal> = Vec::new();

    let shortest = config.sma_periods.iter().min();
    let longest = config.sma_periods.iter().max();
    if let (Some(&short), Some(&long)) = (shortest, longest) {
        let current = |period: usize| set.sma.iter().find(|s| s.period == period).map(|s| s.current);
        if short != long {
            if let (Some(s), Some(l)) = (current(short), current(long)) {
                votes.push(if s > l {
                    Signal::Buy
                } else if s < l {
                    Signal::Sell
                } else {
                    Signal::Neutral
                });
            }
        }
    }

    if let Some(rsi) = &set.rsi {
        votes.push(match rsi.condition {
            RsiCondition::Oversold => Signal::Buy,
            RsiCondition::Overbought => Signal::Sell,
            RsiCondition::Neutral => Signal::Neutral,
        });
    }

    if let Some(cross) = set.macd.as_ref().and_then(|m| m.crossover) {
        votes.push(cross);
    }

    let count = |signal: Signal| votes.iter().filter(|v| **v == signal).count();
    let (buy, sell, neutral) = (count(Signal::Buy), count(Signal::Sell), count(Signal::Neutral));
    let total = votes.len();

    let signal = if buy > sell && buy > neutral {
        Signal::Buy
    } else if sell > buy && sell > neutral {
        Signal::Sell
    } else {
        Signal::Neutral
    };
    let winning = match signal {
        Signal::Buy => buy,
        Signal::Sell => sell,
        Signal::Neutral => neutral,
    };

    Interpretation {
        signal,
        strength: if total == 0 { 0.0 } else { winning as f64 / total as f64 },
        buy_votes: buy,
        sell_votes: sell,
        neutral_votes: neutral,
    }
}

impl IndicatorSet {
    /// Rows to persist for this calculation
    pub fn to_values(&self, asset_id: &str, timestamp: DateTime<Utc>) -> Vec<IndicatorValue> {
        let row = |value: f64, params: IndicatorParams| IndicatorValue {
            asset_id: asset_id.to_string(),
            value,
            params,
            timestamp,
        };

        let mut rows: Vec<IndicatorValue> = self
            .sma
            .iter()
            .map(|s| row(s.current, IndicatorParams::Sma { period: s.period }))
            .collect();

        if let Some(rsi) = &self.rsi {
            rows.push(row(rsi.value, IndicatorParams::Rsi { period: rsi.period }));
        }

        if let Some(m) = &self.macd {
            let (fast, slow, signal) = (m.fast, m.slow, m.signal_period);
            rows.push(row(m.macd, IndicatorParams::Macd { fast, slow, signal }));
            if let Some(value) = m.signal {
                rows.push(row(value, IndicatorParams::MacdSignal { fast, slow, signal }));
            }
            if let Some(value) = m.histogram {
                rows.push(row(value, IndicatorParams::MacdHistogram { fast, slow, signal }));
            }
        }

        rows
    }

    pub fn is_empty(&self) -> bool {
        self.sma.is_empty() && self.rsi.is_none() && self.macd.is_none()
    }
}
