use codegraph_core::ProgressSnapshot;
use tracing::info;

/// Renders a [`ProgressSnapshot`] the way §4.7 describes: aggregate counts, a completion
/// rate, and an ETA. The throttling itself lives in `codegraph_core::ProgressReporter`;
/// this is just the text the sink prints.
pub fn render_line(snapshot: &ProgressSnapshot) -> String {
    let eta = match snapshot.eta_secs {
        Some(secs) if secs.is_finite() => format!("{secs:.0}s"),
        _ => "unknown".to_string(),
    };
    format!(
        "queued={} analyzing={} completed={} failed={} rate={:.2}/s eta={}",
        snapshot.queued, snapshot.analyzing, snapshot.completed, snapshot.failed, snapshot.completion_rate, eta
    )
}

pub fn log_progress(snapshot: &ProgressSnapshot) {
    info!("{}", render_line(snapshot));
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::ProgressSnapshot;

    #[test]
    fn renders_unknown_eta_when_rate_is_zero() {
        let snapshot = ProgressSnapshot {
            queued: 1,
            analyzing: 0,
            completed: 0,
            failed: 0,
            elapsed_secs: 1.0,
            completion_rate: 0.0,
            eta_secs: None,
        };
        assert!(render_line(&snapshot).contains("eta=unknown"));
    }

    #[test]
    fn renders_eta_in_seconds_when_known() {
        let snapshot = ProgressSnapshot {
            queued: 0,
            analyzing: 0,
            completed: 10,
            failed: 0,
            elapsed_secs: 5.0,
            completion_rate: 2.0,
            eta_secs: Some(3.0),
        };
        assert!(render_line(&snapshot).contains("eta=3s"));
    }
}
