use serde::Serialize;

use crate::error::RolloutError;
use crate::rollout::Rollout;

const INDENTATION: &str = "  ";

pub fn success(step: &str) {
    println!("[ok] {}", step);
}

/// Reports a failed workflow on stderr, listing cluster candidates when the
/// operator has to choose one.
pub fn failure(step: &str, err: &RolloutError) {
    eprint!("{}", render_failure(step, err));
}

/// A stability timeout is not a failed mutation: the request was accepted
/// and is reported as such.
fn render_failure(step: &str, err: &RolloutError) -> String {
    let mut report = match err {
        RolloutError::Timeout { rollout, .. } => format!("[accepted] {} {} (stability not confirmed)\n", step, rollout),
        _ => format!("[failed] {}\n", step),
    };
    report.push_str(&format!("{}{}\n", INDENTATION, err));
    for cluster in err.candidates() {
        report.push_str(&format!("{}  - {}\n", INDENTATION, cluster));
    }
    report
}

pub fn rollout_summary(rollout: &Rollout) -> String {
    let stability = if rollout.stable { "stable" } else { "not waited for" };
    format!("{} ({})", rollout, stability)
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", render_table(headers, &rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let format_row = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut table = format_row(headers.to_vec());
    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    table.push_str(&format!("{}\n", sep.join("  ")));
    for row in rows {
        table.push_str(&format_row(row.iter().map(String::as_str).collect()));
    }
    table
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            vec!["api".to_owned(), "orders".to_owned(), "2".to_owned()],
            vec!["batch".to_owned(), "billing-worker".to_owned(), "10".to_owned()],
        ];
        let table = render_table(&["Cluster", "Name", "Desired"], &rows);
        assert_eq!(
            table,
            "Cluster  Name            Desired\n\
             -------  --------------  -------\n\
             api      orders          2\n\
             batch    billing-worker  10\n"
        );
    }

    #[test]
    fn test_timeout_reported_as_accepted() {
        let err = RolloutError::Timeout {
            rollout: Rollout {
                cluster: "api".to_owned(),
                service: "orders".to_owned(),
                task_definition: "orders:4".to_owned(),
                desired_count: 2,
                stable: false,
            },
            waited: Duration::from_secs(300),
        };
        assert_eq!(
            render_failure("updating service", &err),
            "[accepted] updating service api/orders running orders:4 with desired count 2 (stability not confirmed)\n  \
             api/orders running orders:4 with desired count 2: request accepted, stability not confirmed within 300s\n"
        );
    }

    #[test]
    fn test_ambiguous_cluster_lists_candidates() {
        let err = RolloutError::AmbiguousCluster {
            service: "orders".to_owned(),
            clusters: vec!["blue".to_owned(), "green".to_owned()],
        };
        assert_eq!(
            render_failure("updating service", &err),
            "[failed] updating service\n  \
             more than one cluster hosts service [orders], you must explicitly specify --cluster\n    \
             - blue\n    \
             - green\n"
        );
    }

    #[test]
    fn test_rollout_summary() {
        let rollout = Rollout {
            cluster: "api".to_owned(),
            service: "orders".to_owned(),
            task_definition: "orders:4".to_owned(),
            desired_count: 2,
            stable: true,
        };
        assert_eq!(
            rollout_summary(&rollout),
            "api/orders running orders:4 with desired count 2 (stable)"
        );
    }
}
