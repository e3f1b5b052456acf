use crate::models::{Cell, Frame, Series};
use crate::services::eda_summary::{numeric_columns, pearson};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use minijinja::Environment;
use polars::prelude::DataType;
use serde::Serialize;
use std::fs;

pub const FILE_PREFIX: &str = "profile_";
pub const DEFAULT_TITLE: &str = "EDA Profile";
const TOP_VALUES: usize = 5;

const PROFILE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
body { font-family: sans-serif; margin: 2rem; }
table { border-collapse: collapse; margin-bottom: 1.5rem; }
th, td { border: 1px solid #ccc; padding: 0.3rem 0.6rem; text-align: right; }
th:first-child, td:first-child { text-align: left; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<p>{{ n_rows }} rows, {{ n_cols }} columns, generated {{ generated_at }}
{% if minimal %} (minimal){% endif %}</p>
<h2>Variables</h2>
<table>
<tr>
<th>column</th><th>type</th><th>count</th><th>missing</th><th>unique</th>
<th>min</th><th>mean</th><th>std</th><th>max</th><th>top values</th>
</tr>
{% for col in columns %}
<tr>
<td>{{ col.name }}</td><td>{{ col.kind }}</td><td>{{ col.count }}</td>
<td>{{ col.missing }}</td><td>{{ col.unique }}</td>
{% if col.stats %}
<td>{{ col.stats.min | round(4) }}</td><td>{{ col.stats.mean | round(4) }}</td>
<td>{{ col.stats.std | round(4) }}</td><td>{{ col.stats.max | round(4) }}</td>
{% else %}<td></td><td></td><td></td><td></td>{% endif %}
<td>{% for top in col.top_values %}{{ top.value }} ({{ top.count }})
{%- if not loop.last %}, {% endif %}{% endfor %}</td>
</tr>
{% endfor %}
</table>
{% if not minimal %}
<h2>Correlations</h2>
{% if correlations.names %}
<table>
<tr><th></th>{% for name in correlations.names %}<th>{{ name }}</th>{% endfor %}</tr>
{% for row in correlations.rows %}
<tr><td>{{ row.name }}</td>{% for v in row.values %}
<td>{% if v is none %}-{% else %}{{ v | round(3) }}{% endif %}</td>
{% endfor %}</tr>
{% endfor %}
</table>
{% else %}
<p>No numeric columns.</p>
{% endif %}
<h2>Duplicate rows</h2>
<p>{{ duplicates }}</p>
{% endif %}
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct NumericStats {
    min: f64,
    mean: f64,
    std: f64,
    max: f64,
}

#[derive(Debug, Serialize)]
struct TopValue {
    value: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ColumnProfile {
    name: String,
    kind: &'static str,
    count: usize,
    missing: usize,
    unique: usize,
    stats: Option<NumericStats>,
    top_values: Vec<TopValue>,
}

#[derive(Debug, Serialize)]
struct CorrelationRow {
    name: String,
    values: Vec<Option<f64>>,
}

#[derive(Debug, Default, Serialize)]
struct Correlations {
    names: Vec<String>,
    rows: Vec<CorrelationRow>,
}

#[derive(Debug, Serialize)]
struct ProfileContext {
    title: String,
    generated_at: String,
    minimal: bool,
    n_rows: usize,
    n_cols: usize,
    columns: Vec<ColumnProfile>,
    correlations: Correlations,
    duplicates: usize,
}

fn column_kind(series: &Series) -> &'static str {
    let dtype = series.as_polars().dtype();
    if series.null_count() == series.len() {
        "empty"
    } else if dtype.is_integer() || dtype.is_float() {
        "numeric"
    } else if *dtype == DataType::Boolean {
        "boolean"
    } else {
        "categorical"
    }
}

fn numeric_stats(values: &[Cell]) -> Option<NumericStats> {
    let xs: Vec<f64> = values
        .iter()
        .filter(|c| c.is_numeric() && !c.is_null())
        .filter_map(Cell::as_f64)
        .collect();
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = if xs.len() > 1 {
        xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    Some(NumericStats {
        min: xs.iter().copied().fold(f64::INFINITY, f64::min),
        mean,
        std: var.sqrt(),
        max: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Self-contained HTML data profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdaProfiler;

impl EdaProfiler {
    /// Render the profile of `frame` into `out_dir/profile_<ts>.html`.
    ///
    /// `minimal` skips the correlation matrix and duplicate section.
    pub fn generate_profile(
        frame: &Frame,
        out_dir: &Utf8Path,
        minimal: bool,
        title: &str,
    ) -> Result<Utf8PathBuf> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create EDA directory: {}", out_dir))?;

        let columns = frame
            .columns()
            .map(|series| -> Result<ColumnProfile> {
                let kind = column_kind(&series);
                let stats = if kind == "numeric" {
                    numeric_stats(&series.cells()?)
                } else {
                    None
                };
                let top_values = series
                    .value_counts(false)?
                    .into_iter()
                    .take(TOP_VALUES)
                    .map(|(value, count)| TopValue {
                        value: value.to_string(),
                        count: count as usize,
                    })
                    .collect();
                Ok(ColumnProfile {
                    name: series.name().to_string(),
                    kind,
                    count: series.len() - series.null_count(),
                    missing: series.null_count(),
                    unique: series.nunique(),
                    stats,
                    top_values,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let correlations = if minimal {
            Correlations::default()
        } else {
            let numeric = numeric_columns(frame);
            let names: Vec<String> = numeric.keys().cloned().collect();
            let rows = numeric
                .iter()
                .map(|(name, a)| CorrelationRow {
                    name: name.clone(),
                    values: numeric
                        .values()
                        .map(|b| Some(pearson(a, b)).filter(|r| r.is_finite()))
                        .collect(),
                })
                .collect();
            Correlations { names, rows }
        };

        let context = ProfileContext {
            title: title.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            minimal,
            n_rows: frame.n_rows(),
            n_cols: frame.n_cols(),
            columns,
            correlations,
            duplicates: if minimal {
                0
            } else {
                frame.duplicated_count()?
            },
        };

        let mut env = Environment::new();
        env.add_template("profile.html", PROFILE_TEMPLATE)
            .context("Invalid profile template")?;
        let html = env
            .get_template("profile.html")
            .and_then(|t| t.render(&context))
            .context("Failed to render profile")?;

        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = out_dir.join(format!("{}{}.html", FILE_PREFIX, ts));
        fs::write(&path, html).with_context(|| format!("Failed to write {}", path))?;
        Ok(path)
    }
}
