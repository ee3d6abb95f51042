//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use crate::metrics::TestResults;

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(results: &TestResults) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.scenario_name)]);

        table.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        table.add_row(vec!["Virtual Users:", &results.virtual_users.to_string()]);
        table.add_row(vec!["Iterations:", &results.iterations.to_string()]);
        table.add_row(vec!["Total Requests:", &results.total_requests.to_string()]);
        table.add_row(vec!["Success Rate:", &format!("{:.1}%", results.success_rate())]);
        table.add_row(vec![
            "Transport Errors:",
            &results.transport_errors.to_string(),
        ]);
        table.add_row(vec![
            "Requests/sec:",
            &format!("{:.1}", results.requests_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        if !results.status_codes.is_empty() {
            table.add_row(vec!["", ""]);
            let codes = results
                .status_codes
                .iter()
                .map(|(code, count)| format!("{}: {}", code, count))
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec!["Status Codes:", &codes]);
        }

        table.add_row(vec![
            "Throughput:",
            &format!("{:.1} KB/s", results.bytes_per_second / 1_000.0),
        ]);

        let mut output = table.to_string();

        if !results.endpoints.is_empty() {
            let mut breakdown = Table::new();
            breakdown
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Endpoint", "Requests", "Failed", "p50 ms", "p95 ms", "p99 ms"]);

            for e in &results.endpoints {
                breakdown.add_row(vec![
                    e.endpoint.clone(),
                    e.requests.to_string(),
                    e.failed.to_string(),
                    format!("{:.1}", e.latency_p50),
                    format!("{:.1}", e.latency_p95),
                    format!("{:.1}", e.latency_p99),
                ]);
            }

            output.push('\n');
            output.push_str(&breakdown.to_string());
        }

        output
    }

    /// Format results as JSON.
    pub fn format_json(results: &TestResults) -> serde_json::Result<String> {
        serde_json::to_string_pretty(results)
    }

    /// Format results as CSV row.
    ///
    /// Fields are quoted as needed, so scenario names may contain commas.
    pub fn format_csv(results: &TestResults) -> csv::Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record([
            results.timestamp.clone(),
            results.scenario_name.clone(),
            format!("{:.3}", results.duration_secs),
            results.virtual_users.to_string(),
            results.iterations.to_string(),
            results.total_requests.to_string(),
            results.failed_requests.to_string(),
            format!("{:.1}", results.requests_per_second),
            format!("{:.1}", results.latency_p50),
            format!("{:.1}", results.latency_p90),
            format!("{:.1}", results.latency_p99),
        ])?;

        let bytes = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,scenario,duration,vus,iterations,requests,failed,rps,p50,p90,p99"
    }
}
