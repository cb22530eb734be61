use anyhow::{anyhow, Result};
use proofmark_core::model::{AuditResult, AuditSource, AuditSummary, CrossMirrorValidation};
use proofmark_registry::{RecoveryAuditor, Settings};
use serde::Serialize;

use crate::output;

pub struct AuditArgs {
    pub sample: Option<usize>,
    pub reproducible: bool,
    pub max_errors: Option<usize>,
    pub concurrency: Option<usize>,
    pub sources: Option<String>,
    pub no_mirrors: bool,
}

#[derive(Debug, Serialize)]
pub struct AuditOut {
    pub summary: AuditSummary,
    pub failures: Vec<AuditResult>,
    pub mirror_discrepancies: Vec<CrossMirrorValidation>,
}

pub async fn run(args: AuditArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let ctx = settings.context()?;
    let mut cfg = ctx.config().audit.clone();
    if let Some(n) = args.sample {
        cfg.sample_size = n;
    }
    if let Some(n) = args.max_errors {
        cfg.max_errors = n;
    }
    if let Some(n) = args.concurrency {
        if n == 0 {
            return Err(anyhow!("--concurrency must be at least 1"));
        }
        cfg.concurrency = n;
    }
    if let Some(list) = args.sources.as_deref() {
        cfg.sources = parse_sources(list)?;
    }
    cfg.reproducible |= args.reproducible;
    cfg.cross_mirror &= !args.no_mirrors;

    let mirrors = if cfg.cross_mirror { settings.open_mirrors() } else { Vec::new() };
    let auditor = RecoveryAuditor::new(ctx, settings.open_repository()?, settings.open_registry().await?, mirrors);

    let pb = output::spinner("auditing");
    let report = auditor.run(&cfg).await;
    pb.finish_and_clear();
    let report = report?;

    let s = &report.summary;
    let healthy = s.failed_recoveries == 0;
    output::status(
        healthy,
        &format!("integrity {:.2}%", s.integrity_score),
        &format!(
            "{} audited, {} recovered, {} failed, {} mirror inconsistencies{}",
            s.total_audited,
            s.successful_recoveries,
            s.failed_recoveries,
            s.mirror_inconsistencies,
            if s.halted_early { " (halted early)" } else { "" }
        ),
    )?;
    output::print(&AuditOut {
        summary: report.summary.clone(),
        failures: report.results.into_iter().filter(|r| !r.recovered()).collect(),
        mirror_discrepancies: report.mirrors.into_iter().filter(|m| !m.consistent).collect(),
    })?;
    Ok(())
}

fn parse_sources(list: &str) -> Result<Vec<AuditSource>> {
    let sources = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| AuditSource::parse(s).map_err(|e| anyhow!("{e}")))
        .collect::<Result<Vec<_>>>()?;
    if sources.is_empty() {
        return Err(anyhow!("--sources needs at least one of: database, object-store"));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_parsed() {
        assert_eq!(
            parse_sources("database, object-store").unwrap(),
            vec![AuditSource::Database, AuditSource::ObjectStore]
        );
        assert!(parse_sources("tape").is_err());
        assert!(parse_sources(" , ").is_err());
    }
}
