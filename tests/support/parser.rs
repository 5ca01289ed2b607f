//! Reads structured data back out of the CLI's human readable output.

use regex::Regex;
use std::collections::HashMap;

const MESSAGE_PREFIXES: [&str; 3] = ["I: ", "W: ", "E: "];

/// The reporter messages of an output, one per line, prefixes kept
pub fn tip(output: &str) -> String {
    output
        .lines()
        .filter(|l| MESSAGE_PREFIXES.iter().any(|p| l.starts_with(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn extract_oidc_provider_arn(output: &str) -> Option<String> {
    let re = Regex::new(r"arn:aws[\w-]*:iam::\d{12}:oidc-provider/[^'\s]+").unwrap();
    re.find(output).map(|m| m.as_str().to_string())
}

/// Last path segment of a provider ARN: the config ID for managed issuers,
/// the bucket host for unmanaged ones.
pub fn oidc_provider_id_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or_default()
}

/// Parses a blank styled table. Columns are located by where each header
/// starts, so empty cells come back as empty strings.
pub fn parse_table(output: &str) -> Vec<HashMap<String, String>> {
    let mut lines = output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| !MESSAGE_PREFIXES.iter().any(|p| l.starts_with(p)));
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let column = Regex::new(r"\S+(?: \S+)*").unwrap();
    let columns: Vec<(usize, String)> = column
        .find_iter(header)
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect();

    lines
        .map(|line| {
            columns
                .iter()
                .enumerate()
                .map(|(i, (start, name))| {
                    let end = columns
                        .get(i + 1)
                        .map(|(next, _)| *next)
                        .unwrap_or(line.len())
                        .min(line.len());
                    let begin = (*start).min(end);
                    let value = line.get(begin..end).unwrap_or_default();
                    (name.clone(), value.trim().to_string())
                })
                .collect()
        })
        .collect()
}
