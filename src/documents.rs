use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::player::{PlayerId, PlayerRecord};

/// Player document as exported from the web app's store. Only `id`, `name`,
/// `team` and `age` take part in duplicate detection; photo, sentiment, stats
/// and predictions are carried through the import as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDocument {
    pub record: PlayerRecord,
    pub photo: Option<String>,
    pub sentiment_score: Option<f64>,
    pub stats: Option<Value>,
    pub predictions: Option<Value>,
}

pub fn parse_player_documents_json(raw: &str) -> Result<Vec<PlayerDocument>> {
    let value = serde_json::from_str::<Value>(raw.trim()).context("invalid players json")?;
    let items = match &value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("players")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .ok_or_else(|| anyhow!("expected an array of players or {{\"players\": [...]}}"))?,
        _ => return Err(anyhow!("expected an array of players")),
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let doc = parse_player_document(item)
            .with_context(|| format!("player document #{idx}"))?;
        out.push(doc);
    }
    Ok(out)
}

fn parse_player_document(v: &Value) -> Result<PlayerDocument> {
    let id = v
        .get("_id")
        .or_else(|| v.get("id"))
        .and_then(as_id_any)
        .ok_or_else(|| anyhow!("missing _id/id"))?;
    let name = v.get("name").and_then(|x| x.as_str()).map(|s| s.to_string());
    let team = v
        .get("team")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();
    let age = v.get("age").and_then(as_i64_any);
    let photo = v.get("photo").and_then(|x| x.as_str()).map(|s| s.to_string());
    let sentiment_score = v.get("sentimentScore").and_then(|x| x.as_f64());
    let stats = v.get("stats").filter(|x| !x.is_null()).cloned();
    let predictions = v.get("predictions").filter(|x| !x.is_null()).cloned();

    Ok(PlayerDocument {
        record: PlayerRecord {
            id: PlayerId::new(id),
            name,
            team,
            age,
        },
        photo,
        sentiment_score,
        stats,
        predictions,
    })
}

// Accepts plain strings, numbers and extended-JSON `{"$oid": "..."}`.
fn as_id_any(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(as_id_any),
        _ => None,
    }
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return Some(f.trunc() as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}
