//! Final summary printed after a graceful run

use htstress_core::rate::throughput;

use std::fmt;

use crate::engine::RunOutcome;

/// `Display` adapter rendering a `RunOutcome` as the end-of-run report.
///
/// Percentages are integer shares of completed requests; rates use the
/// ceiling in force at the end of the run. Transfer bytes cover counted
/// requests only.
pub struct Report<'a>(pub &'a RunOutcome);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.0;
        let s = &out.snapshot;
        writeln!(f)?;
        writeln!(f, "requests:      {}", s.completed)?;
        writeln!(f, "good requests: {} [{}%]", s.good, s.percent(s.good))?;
        writeln!(f, "bad requests:  {} [{}%]", s.bad, s.percent(s.bad))?;
        writeln!(f, "socket errors: {} [{}%]", s.socket_errors, s.percent(s.socket_errors))?;
        writeln!(
            f,
            "transfer:      {} bytes in, {} bytes out",
            s.bytes_received, s.bytes_sent
        )?;
        writeln!(f, "seconds:       {:.3}", out.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "requests/sec:  {:.3}",
            throughput(out.limit, s.completed, out.elapsed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htstress_core::StatsSnapshot;
    use std::time::Duration;

    #[test]
    fn test_report_layout() {
        let out = RunOutcome {
            snapshot: StatsSnapshot {
                completed: 200,
                good: 150,
                bad: 50,
                socket_errors: 3,
                bytes_sent: 8000,
                bytes_received: 12000,
            },
            elapsed: Duration::from_millis(2500),
            limit: Some(200),
            aborted: false,
        };
        let text = Report(&out).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "",
                "requests:      200",
                "good requests: 150 [75%]",
                "bad requests:  50 [25%]",
                "socket errors: 3 [1%]",
                "transfer:      12000 bytes in, 8000 bytes out",
                "seconds:       2.500",
                "requests/sec:  80.000",
            ]
        );
    }

    #[test]
    fn test_report_with_nothing_completed() {
        let out = RunOutcome {
            snapshot: StatsSnapshot { socket_errors: 7, ..Default::default() },
            elapsed: Duration::from_secs(1),
            limit: Some(0),
            aborted: false,
        };
        let text = Report(&out).to_string();
        assert!(text.contains("good requests: 0 [0%]"));
        assert!(text.contains("socket errors: 7 [0%]"));
        assert!(text.contains("requests/sec:  0.000"));
    }
}
