//! Query-relevant file fragment extraction.
//!
//! When the agent needs file context for a query, injecting the whole file
//! wastes budget. This module scores each line by query-term occurrences,
//! merges adjacent matching lines into bounded windows, and returns the
//! top-ranked windows as line-ranged excerpts. When nothing matches, the
//! file prefix is returned so callers always get something to anchor on.

use serde::{Deserialize, Serialize};

/// A bounded, line-ranged excerpt of a file judged relevant to a query.
///
/// Line numbers are 1-based and inclusive. Produced fresh per extraction
/// call, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFragment {
    /// Path of the source file (caller-supplied, not read from disk here).
    pub path: String,
    /// Verbatim text of lines `start_line..=end_line`.
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Aggregate query-term occurrence count across the window.
    pub relevance_score: f64,
}

/// A contiguous window of matching lines, before ranking.
struct Window {
    start: usize, // 0-based inclusive
    end: usize,   // 0-based inclusive
    score: f64,
}

/// Extract up to `max_fragments` relevant excerpts of `file_text` for `query`.
///
/// Each line is scored by the number of case-insensitive occurrences of each
/// query term; adjacent scoring lines merge into contiguous windows capped at
/// `max_lines_per_fragment` lines. Windows rank by aggregate score
/// descending, ties broken by ascending start line.
///
/// Fallback: when no line matches any term, returns exactly one fragment
/// covering the first `max_lines_per_fragment` lines with a zero score.
/// An empty file or `max_fragments == 0` yields an empty list.
pub fn extract_file_fragments(
    file_text: &str,
    file_path: &str,
    query: &str,
    max_fragments: usize,
    max_lines_per_fragment: usize,
) -> Vec<FileFragment> {
    if file_text.is_empty() || max_fragments == 0 || max_lines_per_fragment == 0 {
        return Vec::new();
    }

    let lines: Vec<&str> = file_text.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let line_scores: Vec<f64> = lines
        .iter()
        .map(|line| {
            let lower = line.to_lowercase();
            terms
                .iter()
                .map(|t| lower.matches(t.as_str()).count() as f64)
                .sum()
        })
        .collect();

    let mut windows = merge_windows(&line_scores, max_lines_per_fragment);

    if windows.is_empty() {
        // No query term found anywhere: fall back to the file prefix.
        let end = lines.len().min(max_lines_per_fragment) - 1;
        return vec![make_fragment(&lines, file_path, 0, end, 0.0)];
    }

    windows.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.start.cmp(&b.start))
    });

    windows
        .into_iter()
        .take(max_fragments)
        .map(|w| make_fragment(&lines, file_path, w.start, w.end, w.score))
        .collect()
}

/// Merge adjacent scoring lines into contiguous windows capped at `max_lines`.
fn merge_windows(line_scores: &[f64], max_lines: usize) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut current: Option<Window> = None;

    for (i, &score) in line_scores.iter().enumerate() {
        if score > 0.0 {
            match current.as_mut() {
                Some(w) if i - w.start < max_lines => {
                    w.end = i;
                    w.score += score;
                }
                _ => {
                    // Either no open window or the cap is reached: start anew.
                    if let Some(w) = current.take() {
                        windows.push(w);
                    }
                    current = Some(Window {
                        start: i,
                        end: i,
                        score,
                    });
                }
            }
        } else if let Some(w) = current.take() {
            windows.push(w);
        }
    }
    if let Some(w) = current.take() {
        windows.push(w);
    }

    windows
}

fn make_fragment(
    lines: &[&str],
    path: &str,
    start: usize,
    end: usize,
    score: f64,
) -> FileFragment {
    FileFragment {
        path: path.to_string(),
        content: lines[start..=end].join("\n"),
        start_line: start + 1,
        end_line: end + 1,
        relevance_score: score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
fn main() {
    let config = load_config();
    run(config);
}

fn load_config() -> Config {
    Config::default()
}

fn run(config: Config) {
    println!(\"running\");
}";

    #[test]
    fn matching_lines_are_extracted() {
        let frags = extract_file_fragments(SAMPLE, "src/main.rs", "config", 5, 4);
        assert!(!frags.is_empty());
        assert!(frags[0].content.to_lowercase().contains("config"));
        assert!(frags[0].relevance_score > 0.0);
    }

    #[test]
    fn fragments_ranked_by_score_descending() {
        let frags = extract_file_fragments(SAMPLE, "f.rs", "config", 5, 2);
        for pair in frags.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }

    #[test]
    fn tie_break_by_ascending_start_line() {
        let text = "alpha\n\nalpha\n";
        let frags = extract_file_fragments(text, "f.txt", "alpha", 5, 3);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].relevance_score, frags[1].relevance_score);
        assert!(frags[0].start_line < frags[1].start_line);
    }

    #[test]
    fn line_numbers_are_one_based_inclusive() {
        let text = "first\nsecond match\nthird";
        let frags = extract_file_fragments(text, "f.txt", "match", 5, 3);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].start_line, 2);
        assert_eq!(frags[0].end_line, 2);
        assert_eq!(frags[0].content, "second match");
    }

    #[test]
    fn adjacent_matches_merge_into_one_window() {
        let text = "match one\nmatch two\nmatch three\nno hit";
        let frags = extract_file_fragments(text, "f.txt", "match", 5, 10);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].start_line, 1);
        assert_eq!(frags[0].end_line, 3);
        assert_eq!(frags[0].relevance_score, 3.0);
    }

    #[test]
    fn windows_capped_at_max_lines() {
        let text = "hit\nhit\nhit\nhit\nhit";
        let frags = extract_file_fragments(text, "f.txt", "hit", 5, 2);
        assert!(frags.iter().all(|f| f.end_line - f.start_line + 1 <= 2));
        // 5 matching lines with cap 2 -> three windows.
        assert_eq!(frags.len(), 3);
    }

    #[test]
    fn no_match_falls_back_to_file_prefix() {
        let frags = extract_file_fragments(SAMPLE, "f.rs", "zebra quux", 3, 4);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].start_line, 1);
        assert_eq!(frags[0].end_line, 4);
        assert_eq!(frags[0].relevance_score, 0.0);
        assert!(frags[0].content.starts_with("fn main()"));
    }

    #[test]
    fn empty_file_yields_no_fragments() {
        assert!(extract_file_fragments("", "f.txt", "x", 5, 4).is_empty());
    }

    #[test]
    fn zero_max_fragments_yields_empty() {
        assert!(extract_file_fragments(SAMPLE, "f.rs", "config", 0, 4).is_empty());
    }

    #[test]
    fn max_fragments_limits_output() {
        let text = "a\n\na\n\na\n\na\n";
        let frags = extract_file_fragments(text, "f.txt", "a", 2, 1);
        assert_eq!(frags.len(), 2);
    }

    #[test]
    fn multiple_occurrences_in_one_line_count_each() {
        let text = "config config config\nconfig";
        let frags = extract_file_fragments(text, "f.txt", "config", 5, 1);
        assert_eq!(frags[0].relevance_score, 3.0);
        assert_eq!(frags[0].start_line, 1);
    }

    #[test]
    fn case_insensitive_matching() {
        let text = "CONFIG here";
        let frags = extract_file_fragments(text, "f.txt", "config", 5, 2);
        assert_eq!(frags[0].relevance_score, 1.0);
    }
}
