//! Pluggable significance tests for term enrichment.
//!
//! A test only turns a `TermObservation` into a p-value; the aggregation shape does not
//! depend on which test is used. P-values of one column are adjusted with the
//! Benjamini-Hochberg procedure.

use serde::{Deserialize, Serialize};

/// Counts describing one term in one scope.
///
/// The population consists of all annotated model nodes; `successes` of them carry the
/// term. The sample is the set of annotated nodes of the scope, of which `hits` carry
/// the term.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TermObservation {
    pub population: usize,
    pub successes: usize,
    pub sample: usize,
    pub hits: usize,
}

pub trait SignificanceTest: Send + Sync {
    fn name(&self) -> &'static str;

    /// P-value of the observation, or `None` if the test does not compute p-values.
    fn p_value(&self, observation: &TermObservation) -> Option<f64>;
}

/// Terms are scored only by their frequency.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrequencyOnly;

/// Upper tail of the hypergeometric distribution (over-representation).
#[derive(Clone, Copy, Debug, Default)]
pub struct Hypergeometric;

/// Configuration-level choice of a `SignificanceTest`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceKind {
    #[default]
    FrequencyOnly,
    Hypergeometric,
}

impl SignificanceKind {
    pub fn build(&self) -> Box<dyn SignificanceTest> {
        match self {
            SignificanceKind::FrequencyOnly => Box::new(FrequencyOnly),
            SignificanceKind::Hypergeometric => Box::new(Hypergeometric),
        }
    }
}

impl SignificanceTest for FrequencyOnly {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn p_value(&self, _observation: &TermObservation) -> Option<f64> {
        None
    }
}

impl SignificanceTest for Hypergeometric {
    fn name(&self) -> &'static str {
        "hypergeometric"
    }

    fn p_value(&self, observation: &TermObservation) -> Option<f64> {
        Some(hypergeometric_upper_tail(
            observation.population,
            observation.successes,
            observation.sample,
            observation.hits,
        ))
    }
}

/// `P(X >= hits)` for `X ~ Hypergeometric(population, successes, sample)`.
pub fn hypergeometric_upper_tail(
    population: usize,
    successes: usize,
    sample: usize,
    hits: usize,
) -> f64 {
    let successes = successes.min(population);
    let sample = sample.min(population);
    if hits == 0 {
        return 1.0;
    }
    let high = successes.min(sample);
    let low = hits.max(sample.saturating_sub(population - successes));
    if low > high {
        return 0.0;
    }
    let ln_factorial = ln_factorials(population);
    let ln_choose = |n: usize, k: usize| ln_factorial[n] - ln_factorial[k] - ln_factorial[n - k];
    let ln_total = ln_choose(population, sample);
    let tail: f64 = (low..=high)
        .map(|x| {
            (ln_choose(successes, x) + ln_choose(population - successes, sample - x) - ln_total)
                .exp()
        })
        .sum();
    tail.min(1.0)
}

fn ln_factorials(n: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(n + 1);
    result.push(0.0);
    for i in 1..=n {
        result.push(result[i - 1] + (i as f64).ln());
    }
    result
}

/// Benjamini-Hochberg adjusted p-values, in the order of the input.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|a, b| p_values[*a].total_cmp(&p_values[*b]));
    let mut adjusted = vec![0.0; m];
    let mut running_min = 1.0f64;
    for (rank, index) in order.iter().enumerate().rev() {
        let value = p_values[*index] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(value);
        adjusted[*index] = running_min;
    }
    adjusted
}
