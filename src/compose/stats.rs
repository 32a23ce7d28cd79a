//! Container resource usage as reported by `docker stats`

use crate::error::{Result, StevedoreError};
use serde::Deserialize;

/// One row of `docker stats --no-stream --format '{{json .}}'`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceUsage {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc", default)]
    pub cpu: String,
    #[serde(rename = "MemUsage", default)]
    pub memory: String,
    #[serde(rename = "MemPerc", default)]
    pub memory_percent: String,
    #[serde(rename = "NetIO", default)]
    pub net_io: String,
}

/// Parse JSON-lines stats output, skipping blank lines
pub fn parse_stats(output: &str) -> Result<Vec<ResourceUsage>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<ResourceUsage>(line).map_err(StevedoreError::from))
        .collect()
}

/// Render rows as a fixed-width table
pub fn render_table(rows: &[ResourceUsage]) -> String {
    let mut table = format!(
        "{:<30} {:<10} {:<24} {:<8} {:<20}\n",
        "NAME", "CPU %", "MEM USAGE / LIMIT", "MEM %", "NET I/O"
    );

    for row in rows {
        table.push_str(&format!(
            "{:<30} {:<10} {:<24} {:<8} {:<20}\n",
            row.name, row.cpu, row.memory, row.memory_percent, row.net_io
        ));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS: &str = r#"
{"BlockIO":"0B / 0B","CPUPerc":"0.03%","Container":"1a2b","ID":"1a2b","MemPerc":"0.41%","MemUsage":"32.1MiB / 7.6GiB","Name":"shop-web-1","NetIO":"1.2kB / 0B","PIDs":"5"}
{"CPUPerc":"1.50%","MemPerc":"2.00%","MemUsage":"150MiB / 7.6GiB","Name":"shop-db-1","NetIO":"3kB / 2kB"}
"#;

    #[test]
    fn test_parse_stats_lines() {
        let rows = parse_stats(STATS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "shop-web-1");
        assert_eq!(rows[0].cpu, "0.03%");
        assert_eq!(rows[1].memory, "150MiB / 7.6GiB");
    }

    #[test]
    fn test_parse_stats_rejects_garbage() {
        assert!(parse_stats("not json").is_err());
    }

    #[test]
    fn test_render_table() {
        let rows = parse_stats(STATS).unwrap();
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].starts_with("shop-db-1"));
    }
}
