//! Rendering of search results as IRC lines.

use crate::paste::{self, PasteOptions, PasteRegistry};
use crate::query::LookupResults;

use itertools::Itertools;
use std::collections::BTreeSet;
use std::time::Duration;

/// Longest line, in characters, sent in a single message
pub const MAX_LINE_LENGTH: usize = 420;

/// Result listings longer than this many lines are pasted instead
pub const PASTE_THRESHOLD: usize = 5;

const GREEN: &str = "\x0303";
const RESET: &str = "\x0f";

/// Split `content` into pieces of at most `length` characters, breaking at spaces
/// where possible
pub fn chunk_str(content: &str, length: usize) -> Vec<String> {
    let length = length.max(1);
    let mut chunks = Vec::new();
    let mut rest = content.trim();

    while !rest.is_empty() {
        // One extra character, so that a chunk of exactly `length` can end at a space
        let window: String = rest
            .chars()
            .chain(std::iter::once(' '))
            .take(length + 1)
            .collect();

        let chunk = match window.rfind(' ') {
            Some(split) if split > 0 => window[..split].to_owned(),
            _ => window.chars().take(length).collect(),
        };

        rest = rest[chunk.len()..].trim_start();
        chunks.push(chunk);
    }

    chunks
}

fn group_thousands(count: usize) -> String {
    let digits = count.to_string();
    let first = digits.len() % 3;

    digits
        .char_indices()
        .fold(String::new(), |mut out, (i, c)| {
            if i != 0 && (i + 3 - first) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
            out
        })
}

/// `1 nick`, `2 nicks`, `1,024 addresses`
pub fn pluralize(count: usize, thing: &str) -> String {
    let suffix = match (count, thing) {
        (1, _) => "",
        (_, t) if t.ends_with('s') || t.ends_with('x') || t.ends_with("sh") || t.ends_with("ch") => {
            "es"
        }
        _ => "s",
    };
    format!("{} {}{}", group_thousands(count), thing, suffix)
}

/// `a`, `a and b`, `a, b and c`
pub fn text_list<S: AsRef<str>>(items: &[S], last_word: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_owned(),
        [init @ .., last] => format!(
            "{} {} {}",
            init.iter().map(AsRef::as_ref).join(", "),
            last_word,
            last.as_ref()
        ),
    }
}

/// A coloured `name: a, b, c` listing, split to fit on IRC lines
pub fn format_list(name: &str, items: &BTreeSet<String>) -> Vec<String> {
    chunk_str(
        &format!("{GREEN}{name}{RESET}: {}", items.iter().join(", ")),
        MAX_LINE_LENGTH,
    )
}

/// The sections of a result set that `admin` is allowed to see, as (short name,
/// long name, values)
fn visible_sections(
    results: &LookupResults,
    admin: bool,
) -> Vec<(&'static str, &'static str, &BTreeSet<String>)> {
    let mut sections = vec![
        ("nicks", "Nicks", &results.nicks),
        ("masks", "Masks", &results.masks),
    ];
    if admin {
        sections.push(("hosts", "Hosts", &results.hosts));
        sections.push(("addrs", "Addresses", &results.addrs));
    }
    sections
}

/// Channel lines listing the results
pub fn result_lines(results: &LookupResults, admin: bool) -> Vec<String> {
    visible_sections(results, admin)
        .into_iter()
        .filter(|(_, _, values)| !values.is_empty())
        .flat_map(|(name, _, values)| format_list(name, values))
        .collect()
}

/// The results as a plain text document, for pasting
pub fn paste_text(results: &LookupResults, admin: bool) -> String {
    let mut lines = Vec::new();

    for (_, title, values) in visible_sections(results, admin) {
        if values.is_empty() {
            continue;
        }
        lines.push(format!("{title}:"));
        lines.extend(values.iter().map(|v| format!("  - '{v}'")));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// `None.`, or a summary of how much was found
pub fn count_line(results: &LookupResults, admin: bool, elapsed: Duration) -> String {
    let mut counts = vec![(results.nicks.len(), "nick"), (results.masks.len(), "mask")];
    if admin {
        counts.push((results.hosts.len(), "host"));
        counts.push((results.addrs.len(), "address"));
    }

    if counts.iter().all(|(count, _)| *count == 0) {
        return "None.".to_owned();
    }

    let parts: Vec<_> = counts
        .into_iter()
        .map(|(count, thing)| pluralize(count, thing))
        .collect();

    format!(
        "Done. Found {} in {:.3} seconds",
        text_list(&parts, "and"),
        elapsed.as_secs_f64()
    )
}

/// Paste the full results and describe where they went
pub async fn paste_line(
    pastebins: &PasteRegistry,
    preferred: Option<&str>,
    text: &str,
) -> String {
    let options = PasteOptions::new();

    match paste::paste(pastebins, preferred, text, &options).await {
        Ok(url) => format!(
            "Paste: {url} Password: {} (paste expires in 1 hour)",
            options.password
        ),
        Err(error) => format!("Paste failed. ({error})"),
    }
}

/// Every line of the reply to a search: a header, the results (or a paste link when
/// there are too many), and a count
pub async fn report(
    query: &str,
    results: &LookupResults,
    admin: bool,
    elapsed: Duration,
    pastebins: &PasteRegistry,
    preferred: Option<&str>,
) -> Vec<String> {
    let mut out = vec![format!("Results for '{query}':")];

    let lines = result_lines(results, admin);
    if lines.len() > PASTE_THRESHOLD {
        out.push(paste_line(pastebins, preferred, &paste_text(results, admin)).await);
    } else {
        out.extend(lines);
    }

    out.push(count_line(results, admin, elapsed));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paste::tests::FakePastebin;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chunks_break_at_spaces() {
        assert_eq!(chunk_str("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(chunk_str("aaa bbb ccc", 9), vec!["aaa bbb", "ccc"]);
        assert_eq!(chunk_str("aaa bbb ccc", 5), vec!["aaa", "bbb", "ccc"]);
        assert_eq!(chunk_str("short", 420), vec!["short"]);
        assert!(chunk_str("   ", 10).is_empty());
    }

    #[test]
    fn long_words_are_split() {
        assert_eq!(chunk_str("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn chunks_respect_length_limit() {
        let words = (0..200).map(|i| format!("nick{i}")).join(", ");
        for chunk in chunk_str(&words, MAX_LINE_LENGTH) {
            assert!(chunk.chars().count() <= MAX_LINE_LENGTH);
        }
    }

    #[test]
    fn plurals() {
        assert_eq!(pluralize(1, "nick"), "1 nick");
        assert_eq!(pluralize(0, "nick"), "0 nicks");
        assert_eq!(pluralize(2, "address"), "2 addresses");
        assert_eq!(pluralize(1234567, "host"), "1,234,567 hosts");
        assert_eq!(pluralize(999, "mask"), "999 masks");
    }

    #[test]
    fn text_lists() {
        assert_eq!(text_list::<&str>(&[], "and"), "");
        assert_eq!(text_list(&["a"], "and"), "a");
        assert_eq!(text_list(&["a", "b"], "and"), "a and b");
        assert_eq!(text_list(&["a", "b", "c"], "or"), "a, b or c");
    }

    #[test]
    fn list_lines_are_coloured() {
        assert_eq!(
            format_list("nicks", &set(&["Bob", "Alice"])),
            vec!["\x0303nicks\x0f: Alice, Bob"]
        );
    }

    #[test]
    fn hosts_hidden_outside_admin_channels() {
        let results = LookupResults {
            nicks: set(&["Alice"]),
            masks: set(&["user/alice"]),
            hosts: set(&["h1"]),
            addrs: set(&["1.2.3.4"]),
        };

        assert_eq!(result_lines(&results, false).len(), 2);
        assert_eq!(result_lines(&results, true).len(), 4);

        let elapsed = Duration::from_millis(3);
        assert_eq!(
            count_line(&results, false, elapsed),
            "Done. Found 1 nick and 1 mask in 0.003 seconds"
        );
        assert_eq!(
            count_line(&results, true, elapsed),
            "Done. Found 1 nick, 1 mask, 1 host and 1 address in 0.003 seconds"
        );
    }

    #[test]
    fn empty_results() {
        let results = LookupResults {
            hosts: set(&["h1"]),
            ..Default::default()
        };
        assert_eq!(count_line(&results, false, Duration::ZERO), "None.");
    }

    #[test]
    fn paste_document() {
        let results = LookupResults {
            nicks: set(&["Alice", "Bob"]),
            masks: set(&["m1"]),
            ..Default::default()
        };

        assert_eq!(
            paste_text(&results, true),
            "Nicks:\n  - 'Alice'\n  - 'Bob'\n\nMasks:\n  - 'm1'\n"
        );
    }

    #[tokio::test]
    async fn small_results_are_listed() {
        let results = LookupResults {
            nicks: set(&["Alice"]),
            ..Default::default()
        };

        let lines = report(
            "alice",
            &results,
            false,
            Duration::from_millis(1),
            &PasteRegistry::new(),
            None,
        )
        .await;

        assert_eq!(
            lines,
            vec![
                "Results for 'alice':".to_owned(),
                "\x0303nicks\x0f: Alice".to_owned(),
                "Done. Found 1 nick and 0 masks in 0.001 seconds".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn large_results_are_pasted() {
        // Enough nicks to need more than five lines
        let nicks = (0..300).map(|i| format!("somewhat_long_nick_{i}")).collect();
        let results = LookupResults {
            nicks,
            ..Default::default()
        };
        assert!(result_lines(&results, false).len() > PASTE_THRESHOLD);

        let (bin, pasted) = FakePastebin::working("https://paste.example/abc");
        let mut pastebins = PasteRegistry::new();
        pastebins.register("fake", Box::new(bin)).unwrap();

        let lines = report("x", &results, false, Duration::ZERO, &pastebins, None).await;

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Paste: https://paste.example/abc Password: "));
        assert!(lines[1].ends_with(" (paste expires in 1 hour)"));
        assert!(pasted.lock()[0].starts_with("Nicks:\n  - 'somewhat_long_nick_0'"));
    }

    #[tokio::test]
    async fn paste_failure_is_reported() {
        let nicks = (0..300).map(|i| format!("somewhat_long_nick_{i}")).collect();
        let results = LookupResults {
            nicks,
            ..Default::default()
        };

        let lines = report("x", &results, false, Duration::ZERO, &PasteRegistry::new(), None).await;
        assert_eq!(lines[1], "Paste failed. (Unable to paste data)");
    }
}
