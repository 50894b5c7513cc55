use serde::Serialize;

use fte_protocol::messages::Severity;

/// Event counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityStats {
    pub total_events: usize,
    pub info_count: usize,
    pub warn_count: usize,
    pub error_count: usize,
}

impl SeverityStats {
    /// Counts `severities` by kind.
    pub fn tally<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .fold(Self::default(), |mut stats, severity| {
                stats.total_events += 1;
                match severity {
                    Severity::Info => stats.info_count += 1,
                    Severity::Warn => stats.warn_count += 1,
                    Severity::Error => stats.error_count += 1,
                }
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_severity() {
        let stats = SeverityStats::tally([
            Severity::Info,
            Severity::Error,
            Severity::Info,
            Severity::Warn,
        ]);
        assert_eq!(
            stats,
            SeverityStats {
                total_events: 4,
                info_count: 2,
                warn_count: 1,
                error_count: 1,
            }
        );
    }

    #[test]
    fn empty_tally_is_zero() {
        assert_eq!(SeverityStats::tally([]), SeverityStats::default());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(SeverityStats::tally([Severity::Warn])).unwrap();
        assert_eq!(json["totalEvents"], 1);
        assert_eq!(json["warnCount"], 1);
    }
}
