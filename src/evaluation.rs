//! Validation metrics for binary classifiers

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Tied scores receive their average rank. Returns `None` unless both
/// classes are present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; ties share the mean of their positions
        let average_rank = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = average_rank;
        }
        start = end;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();
    let positives = positives as f64;
    let negatives = negatives as f64;
    Some((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

/// Fraction of rows whose thresholded score matches the label
pub fn accuracy(labels: &[u8], scores: &[f64], threshold: f64) -> Option<f64> {
    if labels.is_empty() || labels.len() != scores.len() {
        return None;
    }
    let correct = labels
        .iter()
        .zip(scores)
        .filter(|&(&l, &s)| u8::from(s >= threshold) == l)
        .count();
    Some(correct as f64 / labels.len() as f64)
}
