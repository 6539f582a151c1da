//! CSV export of the usage log.

use chrono::SecondsFormat;

use super::record::UsageRecord;

pub const CSV_HEADER: &str =
    "Timestamp,Service,Agent,Topic,ThinkingMode,Success,ResponseTime,ErrorMessage";

/// Render records as CSV, one row per record after the header.
///
/// Free-text columns (agent, topic, error message) are always quoted.
pub fn to_csv(records: &[UsageRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for record in records {
        lines.push(format!(
            "{},{},{},{},{},{},{},{}",
            record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            record.service.as_str(),
            quote(&record.agent),
            quote(&record.topic),
            record.thinking_mode.as_str(),
            record.success,
            record.response_time_ms,
            quote(record.error_message.as_deref().unwrap_or("")),
        ));
    }

    lines.join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::record::{ThinkingMode, UsageAttempt};
    use crate::usage::service::PremiumService;
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<UsageRecord> {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        vec![
            UsageAttempt::succeeded(
                PremiumService::ClaudePro,
                "CEO",
                "Expand into Europe, Asia, or both?",
                ThinkingMode::Deep,
                1200,
            )
            .into_record(ts),
            UsageAttempt::succeeded(
                PremiumService::ChatGptPlus,
                "CFO",
                "Cut costs",
                ThinkingMode::Quick,
                300,
            )
            .into_record(ts),
            UsageAttempt::failed(
                PremiumService::GeminiAdvanced,
                "Devil's Advocate",
                "Say \"no\" to the merger",
                ThinkingMode::Balanced,
                50,
                "429, slow down",
            )
            .into_record(ts),
        ]
    }

    #[test]
    fn test_three_records_four_lines() {
        let csv = to_csv(&sample());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "2024-05-01T09:00:00.000Z,claude_pro,\"CEO\",\"Expand into Europe, Asia, or both?\",deep,true,1200,\"\""
        );
    }

    #[test]
    fn test_embedded_quotes_doubled() {
        let csv = to_csv(&sample());
        let last = csv.lines().last().unwrap();
        assert!(last.contains("\"Say \"\"no\"\" to the merger\""));
        assert!(last.ends_with(",false,50,\"429, slow down\""));
    }

    #[test]
    fn test_empty_log_is_header_only() {
        assert_eq!(to_csv(&[]), CSV_HEADER);
    }
}
