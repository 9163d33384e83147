use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::ContextChunk;

/// Fetches the `top_k` best-ranked chunks for `query` from the index.
///
/// Ranking is FTS5's own BM25 `rank`. Returns an empty list when the query
/// contains no searchable terms.
pub async fn retrieve_context(
    pool: &SqlitePool,
    query: &str,
    top_k: i64,
) -> Result<Vec<ContextChunk>> {
    let Some(match_expr) = fts_query(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT chunks_fts.document_id AS document_id,
               chunks_fts.text AS text,
               rank,
               d.title AS title
        FROM chunks_fts
        LEFT JOIN documents d ON d.id = chunks_fts.document_id
        WHERE chunks_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(&match_expr)
    .bind(top_k)
    .fetch_all(pool)
    .await?;

    let chunks = rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            ContextChunk {
                document_id: row.get("document_id"),
                title: row.get("title"),
                score: -rank, // negate so higher = better
                text: row.get("text"),
            }
        })
        .collect();

    Ok(chunks)
}

/// Turns free user text into an FTS5 match expression.
///
/// Each alphanumeric run becomes a quoted term and terms are OR-ed, so
/// punctuation and FTS5 operators typed by users cannot produce syntax
/// errors.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
