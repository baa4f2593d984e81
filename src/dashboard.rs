//! Aggregate statistics behind the dashboard endpoints and the report.
//!
//! Grouped counts run in SQL. Range bucketing and per-question averages are
//! plain functions over fetched rows so they can be tested without Postgres.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};

use crate::models::{
    AgeBucket, ConfidenceBucket, GenderBreakdown, Kpis, QuestionScore, RiskFactorBreakdown,
    RiskFactors, Statistics, TimelinePoint,
};

/// Inclusive age ranges.
pub const AGE_RANGES: [(&str, i32, i32); 7] = [
    ("0-5", 0, 5),
    ("6-12", 6, 12),
    ("13-17", 13, 17),
    ("18-25", 18, 25),
    ("26-35", 26, 35),
    ("36-50", 36, 50),
    ("51+", 51, 150),
];

/// Half-open probability ranges `[min, max)`.
pub const CONFIDENCE_RANGES: [(&str, f64, f64); 5] = [
    ("Very Low", 0.0, 0.5),
    ("Low", 0.5, 0.7),
    ("Medium", 0.7, 0.85),
    ("High", 0.85, 0.95),
    ("Very High", 0.95, 1.0),
];

pub const DEFAULT_TIMELINE_DAYS: i64 = 30;

pub fn positive_rate(positive: i64, total: i64) -> f64 {
    if total > 0 {
        positive as f64 / total as f64
    } else {
        0.0
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn gender_label(stored: &str) -> &'static str {
    if stored == "m" {
        "Male"
    } else {
        "Female"
    }
}

pub fn yes_no_label(stored: &str) -> &'static str {
    if stored == "yes" {
        "Yes"
    } else {
        "No"
    }
}

/// Buckets `(age, predicted_class)` rows; screenings without a result count only toward totals.
pub fn bucket_ages(rows: &[(i32, Option<i16>)]) -> Vec<AgeBucket> {
    AGE_RANGES
        .iter()
        .map(|&(label, min_age, max_age)| {
            let in_range = rows
                .iter()
                .filter(|(age, _)| (min_age..=max_age).contains(age));
            let (total, positive) = in_range.fold((0i64, 0i64), |(total, positive), (_, class)| {
                (total + 1, positive + i64::from(*class == Some(1)))
            });
            AgeBucket {
                range: label.to_string(),
                total,
                positive,
                negative: total - positive,
                positive_rate: positive_rate(positive, total),
            }
        })
        .collect()
}

pub fn bucket_confidence(rows: &[(f64, i16)]) -> Vec<ConfidenceBucket> {
    CONFIDENCE_RANGES
        .iter()
        .map(|&(label, min, max)| {
            let mut count = 0i64;
            let mut positive = 0i64;
            for &(probability, class) in rows {
                if min <= probability && probability < max {
                    count += 1;
                    if class == 1 {
                        positive += 1;
                    }
                }
            }
            ConfidenceBucket {
                range: label.to_string(),
                count,
                positive,
                negative: count - positive,
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Per-question average score among positive results, negative results and all rows.
pub fn analyze_scores(rows: &[([i16; 10], i16)]) -> Vec<QuestionScore> {
    (0..10)
        .map(|question| {
            let mut positive = Vec::new();
            let mut negative = Vec::new();
            for (scores, class) in rows {
                let score = f64::from(scores[question]);
                if *class == 1 {
                    positive.push(score);
                } else {
                    negative.push(score);
                }
            }
            let all: Vec<f64> = rows.iter().map(|(scores, _)| f64::from(scores[question])).collect();

            QuestionScore {
                question: format!("A{}", question + 1),
                positive_avg: mean(&positive),
                negative_avg: mean(&negative),
                total_avg: mean(&all),
            }
        })
        .collect()
}

pub async fn statistics(pool: &PgPool) -> anyhow::Result<Statistics> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM tea_screening.screenings) AS total_screenings,
            COUNT(*) FILTER (WHERE predicted_class = 1) AS positive,
            COUNT(*) FILTER (WHERE predicted_class = 0) AS negative
        FROM tea_screening.results
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total_screenings: i64 = row.get("total_screenings");
    let positive_cases: i64 = row.get("positive");

    Ok(Statistics {
        total_screenings,
        positive_cases,
        negative_cases: row.get("negative"),
        positive_rate: positive_rate(positive_cases, total_screenings),
    })
}

pub async fn kpis(pool: &PgPool) -> anyhow::Result<Kpis> {
    let seven_days_ago = Utc::now() - Duration::days(7);
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM tea_screening.screenings) AS total_screenings,
            (SELECT COUNT(*) FROM tea_screening.results) AS total_results,
            (SELECT COUNT(*) FROM tea_screening.results WHERE predicted_class = 1) AS positive,
            (SELECT COUNT(*) FROM tea_screening.results WHERE predicted_class = 0) AS negative,
            (SELECT COALESCE(AVG(age)::float8, 0) FROM tea_screening.screenings) AS avg_age,
            (SELECT COUNT(*) FROM tea_screening.screenings WHERE created_at >= $1) AS recent,
            (SELECT COALESCE(AVG(probability), 0) FROM tea_screening.results) AS avg_probability
        "#,
    )
    .bind(seven_days_ago)
    .fetch_one(pool)
    .await?;

    let total_screenings: i64 = row.get("total_screenings");
    let positive_cases: i64 = row.get("positive");

    Ok(Kpis {
        total_screenings,
        total_results: row.get("total_results"),
        positive_cases,
        negative_cases: row.get("negative"),
        positive_rate: positive_rate(positive_cases, total_screenings),
        avg_age: round_to(row.get("avg_age"), 1),
        recent_screenings_7d: row.get("recent"),
        avg_confidence: round_to(row.get("avg_probability"), 3),
    })
}

pub async fn age_distribution(pool: &PgPool) -> anyhow::Result<Vec<AgeBucket>> {
    let rows = sqlx::query(
        r#"
        SELECT s.age, r.predicted_class
        FROM tea_screening.screenings s
        LEFT JOIN tea_screening.results r ON r.screening_id = s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let pairs: Vec<(i32, Option<i16>)> = rows
        .iter()
        .map(|row| (row.get("age"), row.get("predicted_class")))
        .collect();

    Ok(bucket_ages(&pairs))
}

pub async fn gender_distribution(pool: &PgPool) -> anyhow::Result<Vec<GenderBreakdown>> {
    let rows = sqlx::query(
        r#"
        SELECT s.gender,
               COUNT(*) AS total,
               COUNT(*) FILTER (WHERE r.predicted_class = 1) AS positive
        FROM tea_screening.screenings s
        JOIN tea_screening.results r ON r.screening_id = s.id
        GROUP BY s.gender
        ORDER BY s.gender
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut breakdown = Vec::new();

    for row in rows {
        let gender: String = row.get("gender");
        let total: i64 = row.get("total");
        let positive: i64 = row.get("positive");
        breakdown.push(GenderBreakdown {
            gender: gender_label(&gender).to_string(),
            total,
            positive,
            negative: total - positive,
            positive_rate: positive_rate(positive, total),
        });
    }

    Ok(breakdown)
}

pub async fn confidence_distribution(pool: &PgPool) -> anyhow::Result<Vec<ConfidenceBucket>> {
    let rows = sqlx::query("SELECT probability, predicted_class FROM tea_screening.results")
        .fetch_all(pool)
        .await?;

    let pairs: Vec<(f64, i16)> = rows
        .iter()
        .map(|row| (row.get("probability"), row.get("predicted_class")))
        .collect();

    Ok(bucket_confidence(&pairs))
}

/// First instant of a `days`-long window ending at `now`. Windows reaching past
/// the Unix epoch start at the epoch.
pub fn timeline_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .map_or(DateTime::UNIX_EPOCH, |start| start.max(DateTime::UNIX_EPOCH))
}

pub async fn timeline(pool: &PgPool, days: i64) -> anyhow::Result<Vec<TimelinePoint>> {
    let start = timeline_start(Utc::now(), days);
    let rows = sqlx::query(
        r#"
        SELECT s.created_at::date AS day,
               COUNT(*) AS total,
               COUNT(*) FILTER (WHERE r.predicted_class = 1) AS positive
        FROM tea_screening.screenings s
        JOIN tea_screening.results r ON r.screening_id = s.id
        WHERE s.created_at >= $1
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(start)
    .fetch_all(pool)
    .await?;

    let mut points = Vec::new();

    for row in rows {
        let total: i64 = row.get("total");
        let positive: i64 = row.get("positive");
        points.push(TimelinePoint {
            date: row.get("day"),
            total,
            positive,
            negative: total - positive,
        });
    }

    Ok(points)
}

#[derive(Debug, Clone, Copy)]
enum RiskFactor {
    Jaundice,
    FamilyHistory,
}

impl RiskFactor {
    fn column(self) -> &'static str {
        match self {
            Self::Jaundice => "jundice",
            Self::FamilyHistory => "autism",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Jaundice => "Jaundice",
            Self::FamilyHistory => "Family history",
        }
    }
}

async fn factor_breakdown(
    pool: &PgPool,
    factor: RiskFactor,
) -> anyhow::Result<Vec<RiskFactorBreakdown>> {
    let query = format!(
        "SELECT s.{column} AS value, \
         COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE r.predicted_class = 1) AS positive \
         FROM tea_screening.screenings s \
         JOIN tea_screening.results r ON r.screening_id = s.id \
         GROUP BY s.{column} \
         ORDER BY s.{column}",
        column = factor.column()
    );

    let rows = sqlx::query(&query).fetch_all(pool).await?;
    let mut breakdown = Vec::new();

    for row in rows {
        let value: String = row.get("value");
        let total: i64 = row.get("total");
        let positive: i64 = row.get("positive");
        breakdown.push(RiskFactorBreakdown {
            factor: factor.label().to_string(),
            value: yes_no_label(&value).to_string(),
            total,
            positive,
            positive_rate: positive_rate(positive, total),
        });
    }

    Ok(breakdown)
}

pub async fn risk_factors(pool: &PgPool) -> anyhow::Result<RiskFactors> {
    Ok(RiskFactors {
        jundice: factor_breakdown(pool, RiskFactor::Jaundice).await?,
        family_history: factor_breakdown(pool, RiskFactor::FamilyHistory).await?,
    })
}

pub async fn score_analysis(pool: &PgPool) -> anyhow::Result<Vec<QuestionScore>> {
    let rows = sqlx::query(
        r#"
        SELECT s.a1_score, s.a2_score, s.a3_score, s.a4_score, s.a5_score,
               s.a6_score, s.a7_score, s.a8_score, s.a9_score, s.a10_score,
               r.predicted_class
        FROM tea_screening.screenings s
        JOIN tea_screening.results r ON r.screening_id = s.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut samples = Vec::with_capacity(rows.len());

    for row in rows {
        let mut scores = [0i16; 10];
        for (index, score) in scores.iter_mut().enumerate() {
            *score = row.get(format!("a{}_score", index + 1).as_str());
        }
        samples.push((scores, row.get("predicted_class")));
    }

    Ok(analyze_scores(&samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_bucket_edges_are_inclusive() {
        let rows = vec![(5, Some(1)), (6, Some(0)), (51, Some(1)), (100, None)];
        let buckets = bucket_ages(&rows);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].range, "0-5");
        assert_eq!(buckets[0].total, 1);
        assert_eq!(buckets[0].positive, 1);
        assert_eq!(buckets[1].total, 1);
        assert_eq!(buckets[1].negative, 1);
        assert_eq!(buckets[6].range, "51+");
        assert_eq!(buckets[6].total, 2);
        assert_eq!(buckets[6].positive, 1);
        assert!((buckets[6].positive_rate - 0.5).abs() < 1e-12);
        assert_eq!(buckets[3].total, 0);
        assert_eq!(buckets[3].positive_rate, 0.0);
    }

    #[test]
    fn confidence_ranges_are_half_open() {
        let rows = vec![(0.5, 1), (0.49, 0), (0.95, 1), (0.9, 1), (1.0, 1)];
        let buckets = bucket_confidence(&rows);

        let counts: Vec<i64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 0, 1, 1]);
        assert_eq!(buckets[0].negative, 1);
        assert_eq!(buckets[1].positive, 1);
        // 1.0 sits at the open upper edge of the last range.
        assert_eq!(counts.iter().sum::<i64>(), 4);
    }

    #[test]
    fn score_averages_split_by_class() {
        let mut positive = [1i16; 10];
        positive[9] = 0;
        let negative = [0i16; 10];
        let rows = vec![(positive, 1), (negative, 0), (negative, 0), ([1i16; 10], 1)];

        let analysis = analyze_scores(&rows);
        assert_eq!(analysis.len(), 10);
        assert_eq!(analysis[0].question, "A1");
        assert_eq!(analysis[0].positive_avg, 1.0);
        assert_eq!(analysis[0].negative_avg, 0.0);
        assert_eq!(analysis[0].total_avg, 0.5);
        assert_eq!(analysis[9].question, "A10");
        assert_eq!(analysis[9].positive_avg, 0.5);
        assert_eq!(analysis[9].total_avg, 0.25);
    }

    #[test]
    fn score_analysis_of_nothing_is_zero() {
        let analysis = analyze_scores(&[]);
        assert!(analysis.iter().all(|q| q.total_avg == 0.0 && q.positive_avg == 0.0));
    }

    #[test]
    fn rates_and_rounding() {
        assert_eq!(positive_rate(0, 0), 0.0);
        assert_eq!(positive_rate(1, 4), 0.25);
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(0.87654, 3), 0.877);
    }

    #[test]
    fn timeline_window_clamps_huge_spans() {
        let now = Utc::now();
        assert_eq!(timeline_start(now, 30), now - Duration::days(30));
        assert_eq!(timeline_start(now, -5), now);
        assert_eq!(timeline_start(now, 100_000_000), DateTime::UNIX_EPOCH);
        assert_eq!(timeline_start(now, i64::MAX), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn stored_values_get_display_labels() {
        assert_eq!(gender_label("m"), "Male");
        assert_eq!(gender_label("f"), "Female");
        assert_eq!(yes_no_label("yes"), "Yes");
        assert_eq!(yes_no_label("no"), "No");
    }
}
