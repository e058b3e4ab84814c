//! Raw vs optimized comparison: size savings, which optimizations fired, and
//! Markdown / side-by-side HTML reports.

use crate::endpoints::Params;
use crate::optimizer::{is_portuguese_key, is_truthy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Numbers describing what the optimizer changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub size_raw_bytes: u64,
    pub size_optimized_bytes: u64,
    /// Negative when the optimized document is larger.
    pub size_saved_bytes: i64,
    pub size_saved_percent: f64,
    pub data_count_raw: u64,
    pub data_count_optimized: u64,
    pub full_conversation_entries_raw: u64,
    pub full_conversation_entries_optimized: u64,
    pub items_with_ai_agent_removed: i64,
    pub meta_agent_at_root: bool,
    pub empty_agent_id_removed: i64,
    pub sender_entries_normalized: u64,
    pub data_collect_pt_keys_consolidated: u64,
    /// One line per optimization that fired.
    pub summary: Vec<String>,
}

/// Where and when a report was produced.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub endpoint_key: String,
    pub params: Params,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedComparison {
    pub markdown: String,
    pub html: String,
}

/// Pretty JSON with two-space indentation, the form sizes are measured on.
pub fn canonical_json(doc: &Value) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_default()
}

fn records(doc: &Value) -> &[Value] {
    doc.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn conversation(record: &Value) -> &[Value] {
    record
        .get("Full Conversation")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn count_where(items: &[Value], pred: impl Fn(&Map<String, Value>) -> bool) -> i64 {
    items
        .iter()
        .filter_map(Value::as_object)
        .filter(|r| pred(*r))
        .count() as i64
}

fn has_ai_agent(record: &Map<String, Value>) -> bool {
    record.get("aiAgent").is_some_and(is_truthy)
}

fn has_empty_agent_id(record: &Map<String, Value>) -> bool {
    record
        .get("agentId")
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty)
}

/// Compares a raw document with its optimized form.
pub fn compare(raw: &Value, optimized: &Value) -> ComparisonMetrics {
    let size_raw = canonical_json(raw).len() as u64;
    let size_opt = canonical_json(optimized).len() as u64;
    let saved = size_raw as i64 - size_opt as i64;
    let saved_percent = if size_raw == 0 {
        0.0
    } else {
        ((saved as f64 / size_raw as f64 * 100.0) * 100.0).round() / 100.0
    };

    let data_raw = records(raw);
    let data_opt = records(optimized);
    let fc_raw: usize = data_raw.iter().map(|r| conversation(r).len()).sum();
    let fc_opt: usize = data_opt.iter().map(|r| conversation(r).len()).sum();

    let ai_agent_removed = count_where(data_raw, has_ai_agent) - count_where(data_opt, has_ai_agent);
    let empty_agent_id_removed =
        count_where(data_raw, has_empty_agent_id) - count_where(data_opt, has_empty_agent_id);
    let meta_agent = optimized
        .get("meta")
        .and_then(|m| m.get("agent"))
        .is_some_and(is_truthy);

    let mut sender_normalized = 0u64;
    let mut pt_consolidated = 0u64;
    for (r, o) in data_raw.iter().zip(data_opt) {
        let (Some(r), Some(o)) = (r.as_object(), o.as_object()) else {
            continue;
        };

        let raw_fc = r
            .get("Full Conversation")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let opt_fc = o
            .get("Full Conversation")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for (re, oe) in raw_fc.iter().zip(opt_fc) {
            let (Some(rs), Some(os)) = (re.get("sender"), oe.get("sender")) else {
                continue;
            };
            if os.is_string() && (rs.is_array() || rs.is_object() || rs != os) {
                sender_normalized += 1;
            }
        }

        let empty = Map::new();
        let raw_dc = r.get("dataCollectFromUser").and_then(Value::as_object).unwrap_or(&empty);
        let opt_dc = o.get("dataCollectFromUser").and_then(Value::as_object).unwrap_or(&empty);
        let pt_here = raw_dc.keys().filter(|k| is_portuguese_key(k)).count() as u64;
        if pt_here > 0 || raw_dc.len() != opt_dc.len() {
            pt_consolidated += pt_here;
        }
    }

    let mut summary = Vec::new();
    if ai_agent_removed > 0 {
        summary.push("aiAgent removed from each record and lifted to meta.agent".to_string());
    }
    if empty_agent_id_removed > 0 {
        summary.push("empty agentId removed from records".to_string());
    }
    if meta_agent {
        summary.push("meta.agent added at the root (single agent)".to_string());
    }
    if sender_normalized > 0 {
        summary.push("Full Conversation sender: object/array -> 'agent' or 'user'".to_string());
    }
    if pt_consolidated > 0 {
        summary.push("dataCollectFromUser: Portuguese keys consolidated to English".to_string());
    }

    ComparisonMetrics {
        size_raw_bytes: size_raw,
        size_optimized_bytes: size_opt,
        size_saved_bytes: saved,
        size_saved_percent: saved_percent,
        data_count_raw: data_raw.len() as u64,
        data_count_optimized: data_opt.len() as u64,
        full_conversation_entries_raw: fc_raw as u64,
        full_conversation_entries_optimized: fc_opt as u64,
        items_with_ai_agent_removed: ai_agent_removed,
        meta_agent_at_root: meta_agent,
        empty_agent_id_removed,
        sender_entries_normalized: sender_normalized,
        data_collect_pt_keys_consolidated: pt_consolidated,
        summary,
    }
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn params_line(params: &Params, sep: &str, quote: bool) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| {
            if quote {
                format!("`{}={}`", k, v)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join(sep)
}

fn kb(bytes: f64) -> String {
    format!("{:.2} KB", bytes / 1024.0)
}

pub fn render_markdown(metrics: &ComparisonMetrics, ctx: &ReportContext) -> String {
    let mut lines = vec![
        format!("# Comparison: Original vs Optimized (`{}`)", ctx.endpoint_key),
        String::new(),
        format!(
            "**Generated at:** {} UTC",
            ctx.generated_at.format("%Y-%m-%d %H:%M:%S")
        ),
        String::new(),
    ];
    let params = params_line(&ctx.params, ", ", true);
    if !params.is_empty() {
        lines.push(format!("**Parameters:** {}", params));
        lines.push(String::new());
    }

    lines.extend([
        "## Size".to_string(),
        String::new(),
        format!(
            "- **Original (upstream):** {} bytes ({})",
            metrics.size_raw_bytes,
            kb(metrics.size_raw_bytes as f64)
        ),
        format!(
            "- **Optimized:** {} bytes ({})",
            metrics.size_optimized_bytes,
            kb(metrics.size_optimized_bytes as f64)
        ),
        format!(
            "- **Saved:** {} bytes ({}% smaller)",
            metrics.size_saved_bytes, metrics.size_saved_percent
        ),
        String::new(),
        "## Structure".to_string(),
        String::new(),
        format!(
            "- Records in `data`: {} (original) → {} (optimized)",
            metrics.data_count_raw, metrics.data_count_optimized
        ),
        format!(
            "- \"Full Conversation\" entries: {} → {}",
            metrics.full_conversation_entries_raw, metrics.full_conversation_entries_optimized
        ),
        String::new(),
        "## Applied changes".to_string(),
        String::new(),
    ]);

    let mut fired = false;
    if metrics.items_with_ai_agent_removed > 0 {
        fired = true;
        lines.push(format!(
            "- **aiAgent:** removed from {} records; first agent lifted to `meta.agent`.",
            metrics.items_with_ai_agent_removed
        ));
    }
    if metrics.empty_agent_id_removed > 0 {
        fired = true;
        lines.push(format!(
            "- **empty agentId:** removed from {} records.",
            metrics.empty_agent_id_removed
        ));
    }
    if metrics.sender_entries_normalized > 0 {
        fired = true;
        lines.push(format!(
            "- **sender:** {} entries normalized to \"agent\" or \"user\".",
            metrics.sender_entries_normalized
        ));
    }
    if metrics.data_collect_pt_keys_consolidated > 0 {
        fired = true;
        lines.push(format!(
            "- **dataCollectFromUser:** {} Portuguese keys consolidated to English.",
            metrics.data_collect_pt_keys_consolidated
        ));
    }
    if !fired {
        lines.push("- No optimization changed this document.".to_string());
    }

    lines.extend([String::new(), "## Verdict".to_string(), String::new()]);
    if metrics.size_saved_percent > 0.0 {
        lines.push(format!(
            "The payload is **{}% smaller**, with the agent stored once in `meta.agent` instead of on every record and a simpler `sender` format.",
            metrics.size_saved_percent
        ));
    } else {
        lines.push(
            "The byte savings are negligible, but the structure is normalized (sender, dataCollectFromUser, meta.agent).".to_string(),
        );
    }
    lines.push(String::new());
    lines.join("\n")
}

pub fn render_html(
    raw: &Value,
    optimized: &Value,
    metrics: &ComparisonMetrics,
    ctx: &ReportContext,
) -> String {
    let raw_escaped = html_escape(&canonical_json(raw));
    let opt_escaped = html_escape(&canonical_json(optimized));
    let params = params_line(&ctx.params, ", ", false);
    let params = if params.is_empty() { "-".to_string() } else { params };
    let summary_line = if metrics.size_saved_bytes > 0 {
        format!(
            "Saved: {} ({}% smaller)",
            kb(metrics.size_saved_bytes as f64),
            metrics.size_saved_percent
        )
    } else {
        "Structure simplified (see the .md report).".to_string()
    };
    let applied: String = metrics
        .summary
        .iter()
        .map(|line| format!("<li>{}</li>", html_escape(line)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Comparison: {endpoint}</title>
  <style>
    * {{ box-sizing: border-box; }}
    body {{ font-family: system-ui, sans-serif; margin: 0; padding: 1rem; background: #f5f5f5; }}
    h1 {{ font-size: 1.25rem; margin: 0 0 0.5rem 0; }}
    .meta {{ font-size: 0.875rem; color: #555; margin-bottom: 1rem; }}
    .summary {{ font-size: 0.9rem; margin-bottom: 1rem; padding: 0.5rem; background: #e8f5e9; border-radius: 4px; }}
    .columns {{ display: flex; gap: 0; min-height: 80vh; }}
    .col {{ flex: 1; display: flex; flex-direction: column; border: 1px solid #ccc; background: #fff; }}
    .col:first-child {{ border-right: none; }}
    .col h2 {{ margin: 0; padding: 0.5rem 1rem; font-size: 1rem; background: #eee; border-bottom: 1px solid #ccc; }}
    .col pre {{ flex: 1; margin: 0; padding: 1rem; overflow: auto; font-family: ui-monospace, monospace; font-size: 12px; line-height: 1.4; white-space: pre-wrap; word-break: break-all; background: #fafafa; }}
  </style>
</head>
<body>
  <h1>Comparison: Original (upstream) | Optimized</h1>
  <div class="meta">Endpoint: {endpoint} | Parameters: {params} | Generated at {generated} UTC</div>
  <div class="summary">{summary}<ul>{applied}</ul></div>
  <div class="columns">
    <div class="col">
      <h2>Original (upstream)</h2>
      <pre>{raw}</pre>
    </div>
    <div class="col">
      <h2>Optimized</h2>
      <pre>{optimized}</pre>
    </div>
  </div>
</body>
</html>"#,
        endpoint = html_escape(&ctx.endpoint_key),
        params = html_escape(&params),
        generated = ctx.generated_at.format("%Y-%m-%d %H:%M"),
        summary = html_escape(&summary_line),
        applied = applied,
        raw = raw_escaped,
        optimized = opt_escaped,
    )
}

/// Renders both report formats.
pub fn render(
    raw: &Value,
    optimized: &Value,
    metrics: &ComparisonMetrics,
    ctx: &ReportContext,
) -> RenderedComparison {
    RenderedComparison {
        markdown: render_markdown(metrics, ctx),
        html: render_html(raw, optimized, metrics, ctx),
    }
}
