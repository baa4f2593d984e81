use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    PredictionResult, QuestionnaireRecord, RecentScreening, StoredPrediction, ITEM_COLUMNS,
};
use crate::screener::Screener;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn ping(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn storable_scores(record: &QuestionnaireRecord) -> anyhow::Result<[i16; 10]> {
    let mut scores = [0i16; 10];
    for ((slot, column), score) in scores
        .iter_mut()
        .zip(ITEM_COLUMNS)
        .zip(record.item_scores())
    {
        *slot = i16::try_from(score)
            .with_context(|| format!("{column} value {score} does not fit the score column"))?;
    }
    Ok(scores)
}

/// Stores a screening and its result in one transaction.
///
/// Returns `None` when `source_key` is already present, in which case nothing is written.
pub async fn save_screening(
    pool: &PgPool,
    record: &QuestionnaireRecord,
    result: &PredictionResult,
    source_key: Option<&str>,
) -> anyhow::Result<Option<StoredPrediction>> {
    let scores = storable_scores(record)?;

    let mut tx = pool.begin().await?;

    let screening_id: Option<Uuid> = sqlx::query(
        r#"
        INSERT INTO tea_screening.screenings
        (id, a1_score, a2_score, a3_score, a4_score, a5_score, a6_score, a7_score,
         a8_score, a9_score, a10_score, age, gender, jundice, autism, used_app_before, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        ON CONFLICT (source_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(scores[0])
    .bind(scores[1])
    .bind(scores[2])
    .bind(scores[3])
    .bind(scores[4])
    .bind(scores[5])
    .bind(scores[6])
    .bind(scores[7])
    .bind(scores[8])
    .bind(scores[9])
    .bind(record.age)
    .bind(record.gender.to_lowercase())
    .bind(&record.jundice)
    .bind(&record.autism)
    .bind(&record.used_app_before)
    .bind(source_key)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("id"));

    let Some(screening_id) = screening_id else {
        tx.rollback().await?;
        return Ok(None);
    };

    let result_id = Uuid::new_v4();
    let created_at: DateTime<Utc> = sqlx::query(
        r#"
        INSERT INTO tea_screening.results
        (id, screening_id, predicted_class, prediction, probability,
         confidence_tier, recommendation, model_version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING created_at
        "#,
    )
    .bind(result_id)
    .bind(screening_id)
    .bind(i16::from(result.predicted_class))
    .bind(result.label())
    .bind(result.probability)
    .bind(result.confidence_tier.to_string())
    .bind(result.recommendation.text())
    .bind(&result.model_identifier)
    .fetch_one(&mut *tx)
    .await?
    .get("created_at");

    tx.commit().await?;

    Ok(Some(StoredPrediction {
        result_id,
        screening_id,
        created_at,
    }))
}

pub async fn recent_screenings(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<RecentScreening>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.age, s.gender, s.created_at, r.prediction
        FROM tea_screening.screenings s
        LEFT JOIN tea_screening.results r ON r.screening_id = s.id
        ORDER BY s.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    let mut screenings = Vec::new();

    for row in rows {
        screenings.push(RecentScreening {
            id: row.get("id"),
            age: row.get("age"),
            gender: row.get("gender"),
            created_at: row.get("created_at"),
            prediction: row.get("prediction"),
        });
    }

    Ok(screenings)
}

fn questionnaire(
    scores: [i32; 10],
    age: i32,
    gender: &str,
    jundice: &str,
    autism: &str,
    used_app_before: &str,
) -> QuestionnaireRecord {
    QuestionnaireRecord {
        a1_score: scores[0],
        a2_score: scores[1],
        a3_score: scores[2],
        a4_score: scores[3],
        a5_score: scores[4],
        a6_score: scores[5],
        a7_score: scores[6],
        a8_score: scores[7],
        a9_score: scores[8],
        a10_score: scores[9],
        age,
        gender: gender.to_string(),
        jundice: jundice.to_string(),
        autism: autism.to_string(),
        used_app_before: used_app_before.to_string(),
    }
}

fn seed_records() -> Vec<(&'static str, QuestionnaireRecord)> {
    vec![
        (
            "seed-001",
            questionnaire([1, 1, 1, 1, 1, 1, 1, 1, 1, 1], 5, "m", "yes", "no", "no"),
        ),
        (
            "seed-002",
            questionnaire([0, 0, 1, 0, 0, 0, 0, 1, 0, 0], 9, "f", "no", "no", "no"),
        ),
        (
            "seed-003",
            questionnaire([1, 0, 1, 1, 0, 1, 0, 1, 1, 0], 14, "m", "no", "yes", "yes"),
        ),
        (
            "seed-004",
            questionnaire([0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 32, "f", "no", "no", "yes"),
        ),
        (
            "seed-005",
            questionnaire([1, 1, 0, 1, 1, 1, 1, 0, 1, 1], 57, "f", "yes", "yes", "no"),
        ),
    ]
}

/// Inserts a handful of fixture questionnaires, scored through the pipeline.
pub async fn seed(pool: &PgPool, screener: &Screener) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for (source_key, record) in seed_records() {
        let result = screener
            .screen(&record)
            .with_context(|| format!("failed to score seed record {source_key}"))?;
        if save_screening(pool, &record, &result, Some(source_key))
            .await?
            .is_some()
        {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "A1_Score")]
    a1_score: i32,
    #[serde(rename = "A2_Score")]
    a2_score: i32,
    #[serde(rename = "A3_Score")]
    a3_score: i32,
    #[serde(rename = "A4_Score")]
    a4_score: i32,
    #[serde(rename = "A5_Score")]
    a5_score: i32,
    #[serde(rename = "A6_Score")]
    a6_score: i32,
    #[serde(rename = "A7_Score")]
    a7_score: i32,
    #[serde(rename = "A8_Score")]
    a8_score: i32,
    #[serde(rename = "A9_Score")]
    a9_score: i32,
    #[serde(rename = "A10_Score")]
    a10_score: i32,
    age: i32,
    gender: String,
    #[serde(alias = "jaundice")]
    jundice: String,
    #[serde(alias = "austim")]
    autism: String,
    used_app_before: String,
    source_key: Option<String>,
}

impl CsvRow {
    fn into_parts(self) -> (QuestionnaireRecord, Option<String>) {
        let record = QuestionnaireRecord {
            a1_score: self.a1_score,
            a2_score: self.a2_score,
            a3_score: self.a3_score,
            a4_score: self.a4_score,
            a5_score: self.a5_score,
            a6_score: self.a6_score,
            a7_score: self.a7_score,
            a8_score: self.a8_score,
            a9_score: self.a9_score,
            a10_score: self.a10_score,
            age: self.age,
            gender: self.gender,
            jundice: self.jundice,
            autism: self.autism,
            used_app_before: self.used_app_before,
        };
        (record, self.source_key.filter(|key| !key.is_empty()))
    }
}

fn read_csv_records<R: std::io::Read>(
    reader: R,
) -> anyhow::Result<Vec<(QuestionnaireRecord, Option<String>)>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", index + 1))?;
        let (record, source_key) = row.into_parts();
        if let Err(problems) = record.validate() {
            anyhow::bail!("invalid CSV row {}: {}", index + 1, problems.join("; "));
        }
        records.push((record, source_key));
    }

    Ok(records)
}

/// Scores and stores every row of a questionnaire CSV. Rows whose `source_key`
/// was imported before are skipped.
pub async fn import_csv(
    pool: &PgPool,
    screener: &Screener,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("cannot open {}", csv_path.display()))?;
    let records = read_csv_records(file)?;
    let mut inserted = 0usize;

    for (index, (record, source_key)) in records.into_iter().enumerate() {
        let result = screener
            .screen(&record)
            .with_context(|| format!("failed to score CSV row {}", index + 1))?;

        let source_key = source_key.unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if save_screening(pool, &record, &result, Some(&source_key))
            .await?
            .is_some()
        {
            inserted += 1;
        } else {
            tracing::debug!(source_key = %source_key, "skipping previously imported row");
        }
    }

    Ok(inserted)
}
