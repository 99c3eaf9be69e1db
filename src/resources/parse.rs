use serde::de::DeserializeOwned;

/// Parse tool output that holds one JSON object per line.
///
/// Blank lines are ignored. The remaining lines are wrapped in brackets and
/// joined with commas so the whole listing parses as one array. When that
/// fails, lines are parsed one at a time and malformed ones are skipped with a
/// warning naming the line, so a single garbled line never hides the rest of
/// the listing.
pub fn parse_json_lines<T: DeserializeOwned>(output: &str) -> Vec<T> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let array = format!("[{}]", lines.join(","));
    match serde_json::from_str::<Vec<T>>(&array) {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!("output is not clean line-delimited JSON ({e}), parsing line by line");
            parse_line_by_line(output)
        }
    }
}

fn parse_line_by_line<T: DeserializeOwned>(output: &str) -> Vec<T> {
    output
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(line = index + 1, "skipping malformed output line: {e}");
                    None
                }
            }
        })
        .collect()
}
