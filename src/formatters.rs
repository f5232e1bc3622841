//! Output rendering for fused module records.
//!
//! Formatters consume the read-only record sequence and warnings; they
//! never reach back into the engine. The table and HTML views surface
//! warnings for humans, JSON embeds them structurally, CSV suppresses them.

use crate::models::{ModuleRecord, SourceWarning};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    /// Self-contained styled report, one page per run.
    Html,
}

/// Render records in the requested format.
pub fn render(
    records: &[ModuleRecord],
    warnings: &[SourceWarning],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Table => render_table(records, warnings),
        OutputFormat::Json => render_json(records, warnings),
        OutputFormat::Csv => render_csv(records),
        OutputFormat::Html => render_html(records, warnings),
    }
}

/// Bytes as a human-readable quantity: 1024 steps, one decimal.
pub fn format_size(size_bytes: u64) -> String {
    let mut value = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

fn render_json(records: &[ModuleRecord], warnings: &[SourceWarning]) -> String {
    let payload = serde_json::json!({
        "modules": records,
        "warnings": warnings,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string())
}

fn render_csv(records: &[ModuleRecord]) -> String {
    let mut out = String::from("name,status,size,ref_count,dependencies,description,signed\n");
    for record in records {
        let fields = [
            record.name.clone(),
            record.status.to_string(),
            record.size.map(|s| s.to_string()).unwrap_or_default(),
            record.ref_count.map(|r| r.to_string()).unwrap_or_default(),
            record.dependencies.join(","),
            record.description.clone().unwrap_or_default(),
            record.signed.to_string(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Escape text destined for HTML element content or attribute values.
fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const HTML_STYLE: &str = "\
body { font-family: sans-serif; margin: 0; padding: 20px; background: #f8fafc; color: #1e293b; }
.container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 8px; overflow: hidden; }
.header { background: #1e40af; color: white; padding: 30px; text-align: center; }
.header h1 { margin: 0; font-weight: 300; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 20px; padding: 30px; background: #f1f5f9; }
.stat-card { background: white; padding: 20px; border-radius: 8px; text-align: center; }
.stat-number { font-size: 2em; font-weight: bold; color: #1e40af; }
.stat-label { color: #64748b; font-size: 0.9em; text-transform: uppercase; }
.content { padding: 30px; }
.module-table { width: 100%; border-collapse: collapse; margin-top: 20px; }
.module-table th { background: #1e40af; color: white; padding: 10px; text-align: left; }
.module-table td { padding: 10px; border-bottom: 1px solid #e2e8f0; }
.module-table tr:nth-child(even) { background: #f8fafc; }
.status-live { color: #059669; font-weight: bold; }
.status-dead { color: #dc2626; font-weight: bold; }
.status-unloading { color: #d97706; font-weight: bold; }
.notice-warning { background: #fff7ed; border: 1px solid #fed7aa; color: #9a3412; padding: 12px 16px; border-radius: 6px; margin-bottom: 20px; }
";

fn render_html(records: &[ModuleRecord], warnings: &[SourceWarning]) -> String {
    let loaded = records.iter().filter(|r| r.status.is_loaded()).count();
    let builtin = records
        .iter()
        .filter(|r| r.status == crate::models::ModuleStatus::Builtin)
        .count();
    let total_size: u64 = records.iter().filter_map(|r| r.size).sum();

    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"UTF-8\">");
    let _ = writeln!(out, "<title>Kernel Modules Report</title>");
    let _ = writeln!(out, "<style>\n{}</style>", HTML_STYLE);
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");
    let _ = writeln!(out, "<div class=\"container\">");
    let _ = writeln!(
        out,
        "<div class=\"header\"><h1>Kernel Modules Report</h1></div>"
    );

    let _ = writeln!(out, "<div class=\"stats\">");
    let stat = |out: &mut String, number: String, label: &str| {
        let _ = writeln!(
            out,
            "<div class=\"stat-card\"><div class=\"stat-number\">{}</div><div class=\"stat-label\">{}</div></div>",
            number, label
        );
    };
    stat(&mut out, records.len().to_string(), "Total Modules");
    stat(&mut out, loaded.to_string(), "Loaded");
    stat(&mut out, builtin.to_string(), "Builtin");
    stat(&mut out, format_size(total_size), "Total Size");
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"content\">");
    for warning in warnings {
        let _ = writeln!(
            out,
            "<div class=\"notice-warning\">{}</div>",
            html_escape(&warning.to_string())
        );
    }

    let _ = writeln!(out, "<table class=\"module-table\">");
    let _ = writeln!(
        out,
        "<thead><tr><th>Name</th><th>Status</th><th>Size</th><th>Refs</th>\
         <th>Dependencies</th><th>Address</th><th>Signed</th><th>Description</th></tr></thead>"
    );
    let _ = writeln!(out, "<tbody>");
    for record in records {
        let status_class = format!("status-{}", record.status.as_str().to_lowercase());
        let size = record.size.map(format_size).unwrap_or_default();
        let refs = record.ref_count.map(|r| r.to_string()).unwrap_or_default();
        let deps = html_escape(&record.dependencies.join(", "));
        let address = record
            .address
            .as_deref()
            .map(|a| format!("<code>{}</code>", html_escape(a)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "<tr><td><strong>{}</strong></td><td><span class=\"{}\">{}</span></td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(&record.name),
            status_class,
            record.status,
            size,
            refs,
            deps,
            address,
            record.signed,
            html_escape(record.description.as_deref().unwrap_or("")),
        );
    }
    let _ = writeln!(out, "</tbody>");
    let _ = writeln!(out, "</table>");
    let _ = writeln!(out, "</div>");
    let _ = writeln!(out, "</div>");
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

fn render_table(records: &[ModuleRecord], warnings: &[SourceWarning]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Kernel Modules ({} total)", records.len());
    let _ = writeln!(
        out,
        "{:<28} {:<10} {:>10} {:>5}  {:<8} {}",
        "NAME", "STATUS", "SIZE", "REFS", "SIGNED", "DESCRIPTION"
    );
    for record in records {
        let size = record
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let refs = record
            .ref_count
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<28} {:<10} {:>10} {:>5}  {:<8} {}",
            record.name,
            record.status,
            size,
            refs,
            record.signed,
            record.description.as_deref().unwrap_or("-"),
        );
    }
    if !warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings ({}):", warnings.len());
        for warning in warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModuleStatus, SignatureState, WarningKind};

    fn sample() -> Vec<ModuleRecord> {
        let mut live = ModuleRecord::new("ahci", ModuleStatus::Live);
        live.size = Some(45056);
        live.ref_count = Some(2);
        live.dependencies = vec!["libahci".to_string(), "libata".to_string()];
        live.signed = SignatureState::Signed;

        let mut builtin = ModuleRecord::new("ext4", ModuleStatus::Builtin);
        builtin.description = Some("Fourth extended filesystem".to_string());

        vec![live, builtin]
    }

    #[test]
    fn test_json_output_shape() {
        let rendered = render(&sample(), &[], OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["modules"].as_array().unwrap().len(), 2);
        assert_eq!(value["modules"][0]["name"], "ahci");
        assert_eq!(value["modules"][0]["signed"], "Signed");
        assert!(value["modules"][1]["size"].is_null());
        assert_eq!(value["warnings"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_json_includes_warnings() {
        let warnings = vec![SourceWarning::new(
            WarningKind::SourceUnavailable,
            "builtin manifest unavailable",
        )];
        let rendered = render(&sample(), &warnings, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["warnings"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_escapes_dependency_commas() {
        let rendered = render(&sample(), &[], OutputFormat::Csv);
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,status,size,ref_count,dependencies,description,signed"
        );
        let ahci = lines.next().unwrap();
        assert!(ahci.contains("\"libahci,libata\""));
        let ext4 = lines.next().unwrap();
        assert!(ext4.starts_with("ext4,Builtin,,,"));
    }

    #[test]
    fn test_table_shows_absent_values_as_dash() {
        let rendered = render(&sample(), &[], OutputFormat::Table);
        assert!(rendered.starts_with("Kernel Modules (2 total)"));
        let ext4_line = rendered.lines().find(|l| l.starts_with("ext4")).unwrap();
        assert!(ext4_line.contains(" - "));
        assert!(ext4_line.contains("Fourth extended filesystem"));
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(45056), "44.0 KB");
        assert_eq!(format_size(4 * 1024 * 1024), "4.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_html_report_contains_records_and_stats() {
        let rendered = render(&sample(), &[], OutputFormat::Html);
        assert!(rendered.starts_with("<!DOCTYPE html>"));
        assert!(rendered.ends_with("</html>\n"));
        assert!(rendered.contains("<strong>ahci</strong>"));
        assert!(rendered.contains("status-live"));
        assert!(rendered.contains("44.0 KB"));
        assert!(rendered.contains("Fourth extended filesystem"));
        // Stat cards: 2 total, 1 loaded, 1 builtin.
        assert!(rendered.contains("Total Modules"));
        assert!(rendered.contains("Builtin"));
    }

    #[test]
    fn test_html_escapes_markup_in_fields() {
        let mut record = ModuleRecord::new("evil", ModuleStatus::Unloaded);
        record.description = Some("<script>alert(\"x\")</script> & more".to_string());
        let rendered = render(&[record], &[], OutputFormat::Html);
        assert!(!rendered.contains("<script>alert"));
        assert!(rendered.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; more"));
    }

    #[test]
    fn test_html_surfaces_warnings() {
        let warnings = vec![SourceWarning::new(
            WarningKind::SourceUnavailable,
            "builtin manifest unavailable",
        )];
        let rendered = render(&sample(), &warnings, OutputFormat::Html);
        assert!(rendered.contains("notice-warning"));
        assert!(rendered.contains("builtin manifest unavailable"));
    }

    #[test]
    fn test_table_surfaces_warnings() {
        let warnings = vec![SourceWarning::new(
            WarningKind::MalformedLine,
            "live table line 3: expected 6 fields, found 2",
        )];
        let rendered = render(&sample(), &warnings, OutputFormat::Table);
        assert!(rendered.contains("Warnings (1):"));
        assert!(rendered.contains("expected 6 fields"));
    }
}
