//! Comment polarity scoring and aggregation.
//!
//! A `PolarityScorer` maps text to a compound score in `[-1, 1]`. Scores above
//! `AGREE_THRESHOLD` count as agreement, below `DISAGREE_THRESHOLD` as
//! disagreement, anything else as neutral.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};

pub const AGREE_THRESHOLD: f64 = 0.1;
pub const DISAGREE_THRESHOLD: f64 = -0.1;

pub trait PolarityScorer: Send + Sync {
    /// Compound polarity in `[-1, 1]`.
    fn compound(&self, text: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Agree,
    Disagree,
    Neutral,
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Agree => "Agree",
            Sentiment::Disagree => "Disagree",
            Sentiment::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify(score: f64) -> Sentiment {
    if score > AGREE_THRESHOLD {
        Sentiment::Agree
    } else if score < DISAGREE_THRESHOLD {
        Sentiment::Disagree
    } else {
        Sentiment::Neutral
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentimentSummary {
    pub agree: usize,
    pub disagree: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Percentages {
    pub agree: f64,
    pub disagree: f64,
    pub neutral: f64,
}

impl SentimentSummary {
    pub fn from_scores(scores: impl IntoIterator<Item = f64>) -> Self {
        scores.into_iter().map(classify).fold(Self::default(), |mut acc, s| {
            match s {
                Sentiment::Agree => acc.agree += 1,
                Sentiment::Disagree => acc.disagree += 1,
                Sentiment::Neutral => acc.neutral += 1,
            }
            acc
        })
    }

    pub fn aggregate<'a, S>(scorer: &S, texts: impl IntoIterator<Item = &'a str>) -> Self
    where
        S: PolarityScorer + ?Sized,
    {
        Self::from_scores(texts.into_iter().map(|t| scorer.compound(t)))
    }

    pub fn total(&self) -> usize {
        self.agree + self.disagree + self.neutral
    }

    pub fn count(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Agree => self.agree,
            Sentiment::Disagree => self.disagree,
            Sentiment::Neutral => self.neutral,
        }
    }

    /// Share of each class in percent. An empty summary is 0% everywhere.
    pub fn percentages(&self) -> Percentages {
        let total = self.total();
        if total == 0 {
            return Percentages::default();
        }
        let pct = |n: usize| n as f64 * 100.0 / total as f64;
        Percentages {
            agree: pct(self.agree),
            disagree: pct(self.disagree),
            neutral: pct(self.neutral),
        }
    }
}

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Comment counts per calendar month of publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyDistribution {
    counts: [usize; 12],
}

impl MonthlyDistribution {
    pub fn from_dates(dates: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let mut counts = [0usize; 12];
        for d in dates {
            counts[d.month0() as usize] += 1;
        }
        Self { counts }
    }

    /// Count for `month` in `1..=12`.
    pub fn get(&self, month: u32) -> usize {
        month
            .checked_sub(1)
            .and_then(|m| self.counts.get(m as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        MONTH_LABELS.iter().copied().zip(self.counts.iter().copied())
    }

    pub fn peak(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Scorer backed by the VADER lexicon and rule set.
pub struct VaderScorer {
    analyzer: vader_sentiment::SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: vader_sentiment::SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for VaderScorer {
    fn compound(&self, text: &str) -> f64 {
        self.analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
    }
}

pub fn default_scorer() -> Box<dyn PolarityScorer> {
    Box::new(VaderScorer::new())
}
