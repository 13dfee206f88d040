//! Maps raw per-domain metrics onto the [-100, +100] sub-score scale.
//!
//! Each function returns an absent `SubScore` rather than a zero when its
//! inputs are missing, so the composite can renormalize over what is known.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::composite::{Confidence, Domain, SubScore, SCORE_MAX, SCORE_MIN};
use crate::domain::fundamental::FScore;

/// One symbol's raw inputs at one observation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub symbol: String,
    pub observed_at: NaiveDateTime,
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    /// Position of the close inside the Bollinger band, 0 at the lower band.
    pub bb_position: Option<f64>,
    /// Close divided by the 50-day simple moving average.
    pub price_vs_sma50: Option<f64>,
    /// Sentiment polarity in [-1, 1].
    pub sentiment: Option<f64>,
    pub sentiment_samples: Option<u32>,
    pub volume_ratio: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub news_positive: Option<u32>,
    pub news_negative: Option<u32>,
    pub fund_flow_net: Option<f64>,
    pub fund_flow_gross: Option<f64>,
}

fn clamp_score(v: f64) -> f64 {
    v.clamp(SCORE_MIN, SCORE_MAX)
}

fn confidence_by_samples(n: u32) -> Confidence {
    match n {
        n if n >= 10 => Confidence::High,
        n if n >= 3 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

pub fn technical(obs: &Observation) -> SubScore {
    let mut score = 0.0;
    let mut inputs = 0;

    if let Some(rsi) = obs.rsi {
        inputs += 1;
        if rsi < 30.0 {
            score += 30.0 * (30.0 - rsi) / 30.0;
        } else if rsi > 70.0 {
            score -= 30.0 * (rsi - 70.0) / 30.0;
        }
    }
    if let Some(hist) = obs.macd_histogram {
        inputs += 1;
        score += (hist * 100.0).clamp(-25.0, 25.0);
    }
    if let Some(pos) = obs.bb_position {
        inputs += 1;
        score -= (pos - 0.5) * 40.0;
    }
    if let Some(ratio) = obs.price_vs_sma50 {
        inputs += 1;
        score += ((ratio - 1.0) * 100.0 * 5.0).clamp(-25.0, 25.0);
    }

    let confidence = match inputs {
        0 => return SubScore::absent(Domain::Technical),
        4 => Confidence::High,
        2 | 3 => Confidence::Medium,
        _ => Confidence::Low,
    };
    SubScore::present(Domain::Technical, clamp_score(score), confidence)
}

pub fn sentiment(obs: &Observation) -> SubScore {
    match obs.sentiment {
        Some(polarity) => SubScore::present(
            Domain::Sentiment,
            clamp_score(polarity * 100.0),
            confidence_by_samples(obs.sentiment_samples.unwrap_or(0)),
        ),
        None => SubScore::absent(Domain::Sentiment),
    }
}

pub fn fundamental(fscore: Option<&FScore>) -> SubScore {
    match fscore {
        Some(f) => SubScore::present(
            Domain::Fundamental,
            clamp_score((f.normalized() - 5.0) * 25.0),
            f.confidence(),
        ),
        None => SubScore::absent(Domain::Fundamental),
    }
}

pub fn volume(obs: &Observation) -> SubScore {
    let (Some(ratio), Some(change)) = (obs.volume_ratio, obs.price_change_pct) else {
        return SubScore::absent(Domain::Volume);
    };
    let amplifier = if ratio > 1.5 { ratio.min(4.0) / 2.0 } else { 0.5 };
    SubScore::present(
        Domain::Volume,
        clamp_score(change * amplifier * 10.0),
        Confidence::Medium,
    )
}

pub fn news(obs: &Observation) -> SubScore {
    let positive = obs.news_positive.unwrap_or(0);
    let negative = obs.news_negative.unwrap_or(0);
    let articles = positive.saturating_add(negative);
    if articles == 0 {
        return SubScore::absent(Domain::News);
    }
    let (positive, negative) = (f64::from(positive), f64::from(negative));
    let value = (positive - negative) / (positive + negative) * 100.0;
    SubScore::present(Domain::News, clamp_score(value), confidence_by_samples(articles))
}

pub fn fund_flow(obs: &Observation) -> SubScore {
    match (obs.fund_flow_net, obs.fund_flow_gross) {
        (Some(net), Some(gross)) if gross > 0.0 => SubScore::present(
            Domain::FundFlow,
            clamp_score(net / gross * 100.0),
            Confidence::Medium,
        ),
        _ => SubScore::absent(Domain::FundFlow),
    }
}

/// All six sub-scores for one observation, stamped with its timestamp.
pub fn normalize(obs: &Observation, fscore: Option<&FScore>) -> Vec<SubScore> {
    [
        technical(obs),
        sentiment(obs),
        fundamental(fscore),
        volume(obs),
        news(obs),
        fund_flow(obs),
    ]
    .into_iter()
    .map(|s| {
        if s.is_present() {
            s.observed(obs.observed_at)
        } else {
            s
        }
    })
    .collect()
}
