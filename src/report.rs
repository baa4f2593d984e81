use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AgeBucket, GenderBreakdown, Kpis, RecentScreening, RiskFactors};

/// Everything the Markdown report draws on, fetched up front.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub kpis: Kpis,
    pub ages: Vec<AgeBucket>,
    pub genders: Vec<GenderBreakdown>,
    pub risk_factors: RiskFactors,
    pub recent: Vec<RecentScreening>,
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();
    let kpis = &data.kpis;

    let _ = writeln!(output, "# Screening Dashboard Report");
    let _ = writeln!(
        output,
        "Generated {}",
        data.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if kpis.total_screenings == 0 {
        let _ = writeln!(output, "No screenings recorded yet.");
        return output;
    }

    let _ = writeln!(output, "- Screenings: {}", kpis.total_screenings);
    let _ = writeln!(
        output,
        "- Positive: {} ({}), negative: {}",
        kpis.positive_cases,
        percent(kpis.positive_rate),
        kpis.negative_cases
    );
    let _ = writeln!(output, "- Average age: {:.1}", kpis.avg_age);
    let _ = writeln!(output, "- Average probability: {:.3}", kpis.avg_confidence);
    let _ = writeln!(output, "- Last 7 days: {}", kpis.recent_screenings_7d);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Age Mix");

    for bucket in data.ages.iter().filter(|bucket| bucket.total > 0) {
        let _ = writeln!(
            output,
            "- {}: {} screenings, {} positive ({})",
            bucket.range,
            bucket.total,
            bucket.positive,
            percent(bucket.positive_rate)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Gender Mix");

    if data.genders.is_empty() {
        let _ = writeln!(output, "No scored screenings.");
    } else {
        for breakdown in data.genders.iter() {
            let _ = writeln!(
                output,
                "- {}: {} screenings, {} positive ({})",
                breakdown.gender,
                breakdown.total,
                breakdown.positive,
                percent(breakdown.positive_rate)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Factors");

    for factor in data
        .risk_factors
        .jundice
        .iter()
        .chain(data.risk_factors.family_history.iter())
    {
        let _ = writeln!(
            output,
            "- {} = {}: {} screenings, {} positive ({})",
            factor.factor,
            factor.value,
            factor.total,
            factor.positive,
            percent(factor.positive_rate)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Screenings");

    for screening in data.recent.iter().take(5) {
        let _ = writeln!(
            output,
            "- {} age {} ({}): {}",
            screening.created_at.format("%Y-%m-%d"),
            screening.age,
            screening.gender,
            screening.prediction.as_deref().unwrap_or("not scored")
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::bucket_ages;
    use crate::models::RiskFactorBreakdown;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn kpis(total: i64, positive: i64) -> Kpis {
        Kpis {
            total_screenings: total,
            total_results: total,
            positive_cases: positive,
            negative_cases: total - positive,
            positive_rate: if total > 0 { positive as f64 / total as f64 } else { 0.0 },
            avg_age: 11.5,
            recent_screenings_7d: total,
            avg_confidence: 0.734,
        }
    }

    fn data(total: i64, positive: i64) -> ReportData {
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 2, 9, 30, 0).unwrap();
        ReportData {
            generated_at,
            kpis: kpis(total, positive),
            ages: bucket_ages(&[(5, Some(1)), (18, Some(0))]),
            genders: vec![GenderBreakdown {
                gender: "Male".into(),
                total: 2,
                positive: 1,
                negative: 1,
                positive_rate: 0.5,
            }],
            risk_factors: RiskFactors {
                jundice: vec![RiskFactorBreakdown {
                    factor: "Jaundice".into(),
                    value: "Yes".into(),
                    total: 1,
                    positive: 1,
                    positive_rate: 1.0,
                }],
                family_history: Vec::new(),
            },
            recent: vec![RecentScreening {
                id: Uuid::new_v4(),
                age: 5,
                gender: "m".into(),
                created_at: generated_at,
                prediction: Some("ASD".into()),
            }],
        }
    }

    #[test]
    fn empty_dashboard_short_circuits() {
        let report = build_report(&data(0, 0));
        assert!(report.contains("No screenings recorded yet."));
        assert!(!report.contains("## Age Mix"));
    }

    #[test]
    fn report_lists_sections() {
        let report = build_report(&data(2, 1));
        assert!(report.starts_with("# Screening Dashboard Report"));
        assert!(report.contains("Generated 2026-02-02 09:30 UTC"));
        assert!(report.contains("- Positive: 1 (50.0%), negative: 1"));
        assert!(report.contains("- 0-5: 1 screenings, 1 positive (100.0%)"));
        assert!(!report.contains("- 6-12"));
        assert!(report.contains("- Male: 2 screenings"));
        assert!(report.contains("- Jaundice = Yes: 1 screenings"));
        assert!(report.contains("- 2026-02-02 age 5 (m): ASD"));
    }
}
