//! Similarity measures derived from a joint histogram.
//!
//! Every measure is a pure function of the normalized histogram
//! `p(i, j) = H(i, j) / sum(H)`, where `i` indexes "from" labels and `j`
//! indexes "to" labels. Bin indices are used as the values of the two
//! random variables. Degenerate histograms (no mass, no spread) score 0.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;
use crate::histogram::JointHistogram;

/// Available similarity measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    /// Squared correlation coefficient of the bin indices.
    Cc,
    /// Correlation ratio (eta squared) of the "to" label given the "from" label.
    Cr,
    /// L1 correlation ratio, based on mean absolute deviations.
    Crl1,
    /// Mutual information (nats).
    Mi,
    /// Normalized mutual information, `(H(i) + H(j)) / H(i, j)`.
    Nmi,
}

/// Log-likelihood reinterpretation of a similarity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renormalization {
    /// Maximum likelihood: transform the raw similarity value.
    Ml,
    /// Normalized maximum likelihood: derive the likelihood from the residual
    /// dispersion ratio of the histogram, independent of the bin scale.
    Nml,
}

/// Generative model a measure is the likelihood of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Gaussian,
    Laplace,
    Information,
}

impl Family {
    /// Log-likelihood per sample for a residual dispersion ratio.
    fn log_likelihood(self, residual: f64) -> Option<f64> {
        let residual = residual.max(f64::MIN_POSITIVE);
        match self {
            Family::Gaussian => Some(-0.5 * residual.ln()),
            Family::Laplace => Some(-residual.ln()),
            Family::Information => None,
        }
    }
}

struct Measure {
    kind: SimilarityKind,
    name: &'static str,
    family: Family,
    compute: fn(&Array2<f64>) -> f64,
    residual: Option<fn(&Array2<f64>) -> Option<f64>>,
}

static MEASURES: [Measure; 5] = [
    Measure {
        kind: SimilarityKind::Cc,
        name: "cc",
        family: Family::Gaussian,
        compute: correlation_coefficient,
        residual: Some(cc_residual),
    },
    Measure {
        kind: SimilarityKind::Cr,
        name: "cr",
        family: Family::Gaussian,
        compute: correlation_ratio,
        residual: Some(cr_residual),
    },
    Measure {
        kind: SimilarityKind::Crl1,
        name: "crl1",
        family: Family::Laplace,
        compute: correlation_ratio_l1,
        residual: Some(crl1_residual),
    },
    Measure {
        kind: SimilarityKind::Mi,
        name: "mi",
        family: Family::Information,
        compute: mutual_information,
        residual: None,
    },
    Measure {
        kind: SimilarityKind::Nmi,
        name: "nmi",
        family: Family::Information,
        compute: normalized_mutual_information,
        residual: None,
    },
];

impl SimilarityKind {
    /// Every measure, in table order.
    pub const ALL: [SimilarityKind; 5] = [
        SimilarityKind::Cc,
        SimilarityKind::Cr,
        SimilarityKind::Crl1,
        SimilarityKind::Mi,
        SimilarityKind::Nmi,
    ];

    fn measure(self) -> &'static Measure {
        let index = match self {
            SimilarityKind::Cc => 0,
            SimilarityKind::Cr => 1,
            SimilarityKind::Crl1 => 2,
            SimilarityKind::Mi => 3,
            SimilarityKind::Nmi => 4,
        };
        &MEASURES[index]
    }

    /// Short name (`cc`, `cr`, `crl1`, `mi`, `nmi`).
    pub fn name(self) -> &'static str {
        self.measure().name
    }
}

impl fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimilarityKind {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MEASURES
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(s))
            .map(|m| m.kind)
            .ok_or_else(|| {
                RegistrationError::invalid_configuration(format!(
                    "Unknown similarity measure '{}', expected one of cc, cr, crl1, mi, nmi",
                    s
                ))
            })
    }
}

impl fmt::Display for Renormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renormalization::Ml => f.write_str("ml"),
            Renormalization::Nml => f.write_str("nml"),
        }
    }
}

impl FromStr for Renormalization {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ml" => Ok(Renormalization::Ml),
            "nml" => Ok(Renormalization::Nml),
            _ => Err(RegistrationError::invalid_configuration(format!(
                "Unknown renormalization '{}', expected ml or nml",
                s
            ))),
        }
    }
}

/// Raw similarity of a joint histogram.
pub fn compute(hist: &JointHistogram, kind: SimilarityKind) -> f64 {
    match normalize(hist.counts()) {
        Some(p) => (kind.measure().compute)(&p),
        None => 0.0,
    }
}

/// Reinterpret a raw similarity value as a log-likelihood.
///
/// `-0.5 ln(1 - v)` for `cc` and `cr`, `-ln(1 - v)` for `crl1`, identity for
/// the information measures. This is the value-level form of
/// [`Renormalization::Ml`]; [`Renormalization::Nml`] needs the histogram and
/// is only available through [`evaluate`].
pub fn renormalize(value: f64, kind: SimilarityKind) -> f64 {
    kind.measure()
        .family
        .log_likelihood(1.0 - value)
        .unwrap_or(value)
}

/// Similarity of a histogram, optionally renormalized.
pub fn evaluate(hist: &JointHistogram, kind: SimilarityKind, mode: Option<Renormalization>) -> f64 {
    match mode {
        None => compute(hist, kind),
        Some(Renormalization::Ml) => renormalize(compute(hist, kind), kind),
        Some(Renormalization::Nml) => normalized_likelihood(hist, kind),
    }
}

fn normalized_likelihood(hist: &JointHistogram, kind: SimilarityKind) -> f64 {
    let measure = kind.measure();
    let Some(p) = normalize(hist.counts()) else {
        return 0.0;
    };
    match measure.residual {
        Some(residual) => residual(&p)
            .and_then(|r| measure.family.log_likelihood(r))
            .unwrap_or(0.0),
        None => (measure.compute)(&p),
    }
}

fn normalize(counts: &Array2<f64>) -> Option<Array2<f64>> {
    let total = counts.sum();
    (total > 0.0 && total.is_finite()).then(|| counts / total)
}

fn mean(weights: ArrayView1<f64>) -> f64 {
    weights
        .iter()
        .enumerate()
        .map(|(k, &w)| w * k as f64)
        .sum()
}

fn variance(weights: ArrayView1<f64>, mean: f64) -> f64 {
    weights
        .iter()
        .enumerate()
        .map(|(k, &w)| w * (k as f64 - mean).powi(2))
        .sum()
}

/// Lowest index at which the cumulative weight reaches half the total.
fn weighted_median(weights: ArrayView1<f64>) -> f64 {
    let half = 0.5 * weights.sum();
    let mut cumulative = 0.0;
    for (k, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative >= half {
            return k as f64;
        }
    }
    weights.len().saturating_sub(1) as f64
}

fn mean_absolute_deviation(weights: ArrayView1<f64>, center: f64) -> f64 {
    weights
        .iter()
        .enumerate()
        .map(|(k, &w)| w * (k as f64 - center).abs())
        .sum()
}

fn entropy<'a>(probabilities: impl Iterator<Item = &'a f64>) -> f64 {
    -probabilities
        .filter(|&&v| v > 0.0)
        .map(|&v| v * v.ln())
        .sum::<f64>()
}

fn cc_residual(p: &Array2<f64>) -> Option<f64> {
    let pi: Array1<f64> = p.sum_axis(Axis(1));
    let pj: Array1<f64> = p.sum_axis(Axis(0));
    let (mi, mj) = (mean(pi.view()), mean(pj.view()));
    let (vi, vj) = (variance(pi.view(), mi), variance(pj.view(), mj));
    if vi <= 0.0 || vj <= 0.0 {
        return None;
    }

    let cov: f64 = p
        .indexed_iter()
        .map(|((i, j), &w)| w * (i as f64 - mi) * (j as f64 - mj))
        .sum();
    Some((1.0 - cov * cov / (vi * vj)).clamp(0.0, 1.0))
}

fn cr_residual(p: &Array2<f64>) -> Option<f64> {
    let pj = p.sum_axis(Axis(0));
    let total = variance(pj.view(), mean(pj.view()));
    if total <= 0.0 {
        return None;
    }

    let within: f64 = p
        .axis_iter(Axis(0))
        .filter(|row| row.sum() > 0.0)
        .map(|row| {
            let mass = row.sum();
            let conditional = mean(row) / mass;
            variance(row, conditional)
        })
        .sum();
    Some((within / total).clamp(0.0, 1.0))
}

fn crl1_residual(p: &Array2<f64>) -> Option<f64> {
    let pj = p.sum_axis(Axis(0));
    let total = mean_absolute_deviation(pj.view(), weighted_median(pj.view()));
    if total <= 0.0 {
        return None;
    }

    let within: f64 = p
        .axis_iter(Axis(0))
        .filter(|row| row.sum() > 0.0)
        .map(|row| mean_absolute_deviation(row, weighted_median(row)))
        .sum();
    Some((within / total).clamp(0.0, 1.0))
}

/// Squared Pearson correlation between the "from" and "to" bin indices.
pub fn correlation_coefficient(p: &Array2<f64>) -> f64 {
    cc_residual(p).map_or(0.0, |r| 1.0 - r)
}

/// `1 - E[Var(j | i)] / Var(j)`.
pub fn correlation_ratio(p: &Array2<f64>) -> f64 {
    cr_residual(p).map_or(0.0, |r| 1.0 - r)
}

/// `1 - E[MAD(j | i)] / MAD(j)`, deviations taken from the weighted medians.
pub fn correlation_ratio_l1(p: &Array2<f64>) -> f64 {
    crl1_residual(p).map_or(0.0, |r| 1.0 - r)
}

/// `sum p(i, j) ln(p(i, j) / (p(i) p(j)))`.
pub fn mutual_information(p: &Array2<f64>) -> f64 {
    let pi = p.sum_axis(Axis(1));
    let pj = p.sum_axis(Axis(0));
    let mi: f64 = p
        .indexed_iter()
        .filter(|(_, w)| **w > 0.0)
        .map(|((i, j), &w)| w * (w / (pi[i] * pj[j])).ln())
        .sum();
    mi.max(0.0)
}

/// `(H(i) + H(j)) / H(i, j)`: 1 for independent labels, 2 for identical ones.
pub fn normalized_mutual_information(p: &Array2<f64>) -> f64 {
    let joint = entropy(p.iter());
    if joint <= 0.0 {
        return 0.0;
    }
    let hi = entropy(p.sum_axis(Axis(1)).iter());
    let hj = entropy(p.sum_axis(Axis(0)).iter());
    (hi + hj) / joint
}
