//! Audit scoring and consensus. Pure functions; the auditor in the registry
//! crate does the I/O and calls into these.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::errors::{ProofmarkError, ProofmarkResult};
use crate::model::{AuditResult, AuditSource, AuditSummary, CrossMirrorValidation, MirrorDiscrepancy};

/// What one mirror returned for a proof. `None` when unreachable or missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorObservation {
    pub mirror: String,
    pub observed_hash: Option<String>,
}

impl MirrorObservation {
    pub fn new(mirror: impl Into<String>, observed_hash: Option<String>) -> Self {
        Self {
            mirror: mirror.into(),
            observed_hash,
        }
    }
}

/// Majority vote over the primary recovery and every mirror.
///
/// Ties resolve to `original_hash`. A mirror that disagrees with the
/// consensus, or had nothing to report, is a discrepancy.
pub fn mirror_consensus(
    proof_id: i64,
    original_hash: &str,
    primary_hash: Option<&str>,
    observations: &[MirrorObservation],
) -> CrossMirrorValidation {
    let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
    for h in primary_hash
        .into_iter()
        .chain(observations.iter().filter_map(|o| o.observed_hash.as_deref()))
    {
        *votes.entry(h).or_default() += 1;
    }

    let consensus_hash = votes.values().max().map(|&top| {
        let mut leaders = votes.iter().filter(|(_, n)| **n == top).map(|(h, _)| *h);
        match (leaders.next(), leaders.next()) {
            (Some(only), None) => only.to_string(),
            _ => original_hash.to_string(),
        }
    });

    let discrepancies: Vec<MirrorDiscrepancy> = observations
        .iter()
        .filter(|o| o.observed_hash.is_none() || o.observed_hash != consensus_hash)
        .map(|o| MirrorDiscrepancy {
            mirror: o.mirror.clone(),
            observed_hash: o.observed_hash.clone(),
        })
        .collect();

    CrossMirrorValidation {
        proof_id,
        consistent: discrepancies.is_empty() && consensus_hash.is_some(),
        consensus_hash,
        discrepancies,
    }
}

/// Share of the checks run on one sample that passed, 0..=100.
pub fn result_score(hash_match: bool, signature_valid: bool, mirror_consistent: Option<bool>) -> u8 {
    let checks = [Some(hash_match), Some(signature_valid), mirror_consistent];
    let run = checks.iter().flatten().count();
    let passed = checks.iter().flatten().filter(|ok| **ok).count();
    ((passed * 100 + run / 2) / run) as u8
}

/// 100 × successes / total, rounded to two decimals. 0 for an empty run.
pub fn integrity_score(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (successful as f64 * 10_000.0 / total as f64).round() / 100.0
}

/// Stops a run once failures exceed `max_errors`.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    max_errors: usize,
    seen: usize,
}

impl ErrorBudget {
    pub fn new(max_errors: usize) -> Self {
        Self { max_errors, seen: 0 }
    }

    /// Record one result. Returns true once the budget is exhausted.
    pub fn record(&mut self, result: &AuditResult) -> bool {
        if !result.recovered() {
            self.seen += 1;
        }
        self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        self.seen > self.max_errors
    }

    pub fn errors(&self) -> usize {
        self.seen
    }
}

/// Collapse the per-source checks of one sample into its single result.
///
/// The sample passes only if every source passed. `recovered_hash` and
/// `source` come from the object-store check when one ran. Errors are
/// prefixed with their source once more than one source was checked.
pub fn fold_sample(mut checks: Vec<AuditResult>, mirror_consistent: Option<bool>) -> Option<AuditResult> {
    let lead = checks
        .iter()
        .position(|c| c.source == AuditSource::ObjectStore)
        .or((!checks.is_empty()).then_some(0))?;
    let hash_match = checks.iter().all(|c| c.hash_match);
    let signature_valid = checks.iter().all(|c| c.signature_valid);
    let recovery_time_ms = checks.iter().map(|c| c.recovery_time_ms).sum();
    let tagged = checks.len() > 1;
    let errors: Vec<String> = checks
        .iter()
        .filter_map(|c| {
            c.error
                .as_ref()
                .map(|e| if tagged { format!("{}: {e}", c.source) } else { e.clone() })
        })
        .collect();

    let lead = checks.swap_remove(lead);
    Some(AuditResult {
        proof_id: lead.proof_id,
        original_hash: lead.original_hash,
        recovered_hash: lead.recovered_hash,
        hash_match,
        signature_valid,
        source: lead.source,
        recovery_time_ms,
        integrity_score: result_score(hash_match, signature_valid, mirror_consistent),
        mirror_consistent,
        error: (!errors.is_empty()).then(|| errors.join("; ")),
    })
}

/// Pick up to `n` ids. Reproducible runs take the lowest ids in ascending
/// order; otherwise a uniform sample without replacement.
pub fn sample_ids<R: Rng + ?Sized>(mut ids: Vec<i64>, n: usize, reproducible: bool, rng: &mut R) -> Vec<i64> {
    if reproducible {
        ids.sort_unstable();
        ids.dedup();
        ids.truncate(n);
        return ids;
    }
    ids.sort_unstable();
    ids.dedup();
    ids.choose_multiple(rng, n).copied().collect()
}

/// Derive the summary from the detailed results.
pub fn summarize(
    run_id: Uuid,
    started_at: String,
    finished_at: String,
    results: &[AuditResult],
    halted_early: bool,
) -> AuditSummary {
    let total = results.len() as u64;
    let ok = results.iter().filter(|r| r.recovered()).count() as u64;
    let inconsistent = results
        .iter()
        .filter(|r| r.mirror_consistent == Some(false))
        .count() as u64;

    AuditSummary {
        run_id,
        started_at,
        finished_at,
        total_audited: total,
        successful_recoveries: ok,
        failed_recoveries: total - ok,
        mirror_inconsistencies: inconsistent,
        integrity_score: integrity_score(ok, total),
        halted_early,
    }
}

/// Summary counts must equal what the detailed results say.
pub fn check_summary(summary: &AuditSummary, results: &[AuditResult]) -> ProofmarkResult<()> {
    let expected = summarize(
        summary.run_id,
        summary.started_at.clone(),
        summary.finished_at.clone(),
        results,
        summary.halted_early,
    );

    let pairs = [
        ("total_audited", summary.total_audited, expected.total_audited),
        (
            "successful_recoveries",
            summary.successful_recoveries,
            expected.successful_recoveries,
        ),
        ("failed_recoveries", summary.failed_recoveries, expected.failed_recoveries),
        (
            "mirror_inconsistencies",
            summary.mirror_inconsistencies,
            expected.mirror_inconsistencies,
        ),
    ];
    for (name, got, want) in pairs {
        if got != want {
            return Err(ProofmarkError::invariant(format!(
                "audit {}: {name} is {got} but results say {want}",
                summary.run_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const H: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";
    const X: &str = "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d";

    fn result(id: i64, hash_match: bool, sig: bool, mirror: Option<bool>) -> AuditResult {
        AuditResult {
            proof_id: id,
            original_hash: H.into(),
            recovered_hash: Some(H.into()),
            hash_match,
            signature_valid: sig,
            source: AuditSource::Database,
            recovery_time_ms: 1,
            integrity_score: result_score(hash_match, sig, mirror),
            mirror_consistent: mirror,
            error: None,
        }
    }

    #[test]
    fn one_dissenting_mirror() {
        let v = mirror_consensus(
            5,
            H,
            Some(H),
            &[
                MirrorObservation::new("eu", Some(H.into())),
                MirrorObservation::new("us", Some(X.into())),
            ],
        );
        assert!(!v.consistent);
        assert_eq!(v.consensus_hash.as_deref(), Some(H));
        assert_eq!(v.discrepancies.len(), 1);
        assert_eq!(v.discrepancies[0].mirror, "us");
        assert_eq!(v.discrepancies[0].observed_hash.as_deref(), Some(X));
    }

    #[test]
    fn agreeing_mirrors_are_consistent() {
        let v = mirror_consensus(1, H, Some(H), &[MirrorObservation::new("eu", Some(H.into()))]);
        assert!(v.consistent);
        assert!(v.discrepancies.is_empty());
    }

    #[test]
    fn tie_goes_to_original_and_unreachable_is_discrepancy() {
        let v = mirror_consensus(
            1,
            H,
            Some(X),
            &[
                MirrorObservation::new("eu", Some(H.into())),
                MirrorObservation::new("ap", None),
            ],
        );
        assert_eq!(v.consensus_hash.as_deref(), Some(H));
        let names: Vec<&str> = v.discrepancies.iter().map(|d| d.mirror.as_str()).collect();
        assert_eq!(names, vec!["ap"]);
    }

    #[test]
    fn per_result_score() {
        assert_eq!(result_score(true, true, None), 100);
        assert_eq!(result_score(true, false, None), 50);
        assert_eq!(result_score(true, true, Some(false)), 67);
        assert_eq!(result_score(false, false, Some(false)), 0);
    }

    #[test]
    fn summary_matches_results() {
        let results = vec![
            result(1, true, true, Some(true)),
            result(2, true, false, None),
            result(3, true, true, Some(false)),
        ];
        let s = summarize(Uuid::nil(), "a".into(), "b".into(), &results, false);
        assert_eq!(s.total_audited, 3);
        assert_eq!(s.successful_recoveries, 1);
        assert_eq!(s.failed_recoveries, 2);
        assert_eq!(s.mirror_inconsistencies, 1);
        assert_eq!(s.integrity_score, 33.33);
        check_summary(&s, &results).unwrap();

        let mut bad = s.clone();
        bad.successful_recoveries = 2;
        assert_matches!(check_summary(&bad, &results), Err(ProofmarkError::Invariant(_)));
    }

    #[test]
    fn sample_fails_when_any_source_fails() {
        let db = result(4, true, true, None);
        let mut os = result(4, false, false, None);
        os.source = AuditSource::ObjectStore;
        os.recovered_hash = None;
        os.error = Some("Proof not published".into());

        let r = fold_sample(vec![db.clone(), os], None).unwrap();
        assert_eq!(r.source, AuditSource::ObjectStore);
        assert_eq!(r.recovered_hash, None);
        assert!(!r.recovered());
        assert_eq!(r.integrity_score, 0);
        assert_eq!(r.recovery_time_ms, 2);
        assert_eq!(r.error.as_deref(), Some("object-store: Proof not published"));

        let alone = fold_sample(vec![db], Some(true)).unwrap();
        assert!(alone.recovered());
        assert_eq!(alone.mirror_consistent, Some(true));
        assert_eq!(alone.error, None);

        assert_eq!(fold_sample(Vec::new(), None), None);
    }

    #[test]
    fn empty_run_scores_zero() {
        assert_eq!(integrity_score(0, 0), 0.0);
        assert_eq!(integrity_score(2, 2), 100.0);
    }

    #[test]
    fn budget_trips_after_max_errors() {
        let mut b = ErrorBudget::new(1);
        assert!(!b.record(&result(1, false, true, None)));
        assert!(!b.record(&result(2, true, true, None)));
        assert!(b.record(&result(3, true, false, None)));
        assert_eq!(b.errors(), 2);
    }

    #[test]
    fn sampling() {
        let ids = vec![9, 3, 7, 1, 5];
        assert_eq!(sample_ids(ids.clone(), 3, true, &mut StdRng::seed_from_u64(0)), vec![1, 3, 5]);

        let mut rng = StdRng::seed_from_u64(42);
        let mut picked = sample_ids(ids.clone(), 4, false, &mut rng);
        assert_eq!(picked.len(), 4);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 4);

        assert_eq!(sample_ids(ids, 50, false, &mut rng).len(), 5);
    }
}
