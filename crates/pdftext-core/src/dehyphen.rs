//! Line-wrap dehyphenation.
//!
//! Lines are processed in order with one line of lookahead:
//!
//! - blank lines are dropped;
//! - a line not ending in `-` is emitted as a segment;
//! - a line ending in `-` waits for the next non-blank line. If that line
//!   starts with a lowercase letter the hyphen is a wrap break and is
//!   removed (`"engi-"` + `"neering"` → `"engineering"`), otherwise the two
//!   are concatenated with the hyphen kept (`"well-"` + `"Known"` →
//!   `"well-Known"`). The joined text is examined again, so it may itself
//!   wait for a further line;
//! - a pending line at end of input is emitted with its hyphen.
//!
//! Segments are joined with the configured [`JoinSeparator`]; whitespace runs
//! inside a segment collapse to one space.

use tokio_util::sync::CancellationToken;

use crate::pipe::PipeReader;
use crate::{ExtractError, JoinSeparator};

/// Options controlling [`Dehyphenator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DehyphenOptions {
    /// When false, a trailing hyphen never joins lines.
    pub join_hyphenated: bool,
    pub separator: JoinSeparator,
}

impl Default for DehyphenOptions {
    fn default() -> Self {
        Self {
            join_hyphenated: true,
            separator: JoinSeparator::Space,
        }
    }
}

/// Incremental dehyphenation state machine.
///
/// Feed lines with [`push_line`](Self::push_line) and collect the result
/// with [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct Dehyphenator {
    options: DehyphenOptions,
    /// Hyphen-terminated text waiting for its continuation line.
    pending: Option<String>,
    output: String,
    segments: usize,
}

impl Dehyphenator {
    pub fn new(options: DehyphenOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let current = match self.pending.take() {
            None => line.to_string(),
            Some(mut candidate) => {
                if line.chars().next().is_some_and(char::is_lowercase) {
                    candidate.pop();
                }
                candidate.push_str(line);
                candidate
            }
        };

        if self.options.join_hyphenated && current.ends_with('-') {
            self.pending = Some(current);
        } else {
            self.emit(&current);
        }
    }

    /// Number of segments emitted so far.
    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn finish(mut self) -> String {
        if let Some(candidate) = self.pending.take() {
            self.emit(&candidate);
        }
        self.output
    }

    fn emit(&mut self, segment: &str) {
        let mut words = segment.split_whitespace();
        let Some(first) = words.next() else {
            return;
        };
        if self.segments > 0 {
            self.output.push(self.options.separator.as_char());
        }
        self.output.push_str(first);
        for word in words {
            self.output.push(' ');
            self.output.push_str(word);
        }
        self.segments += 1;
    }
}

/// Dehyphenate an in-memory sequence of lines.
pub fn dehyphenate<I, S>(lines: I, options: DehyphenOptions) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut dehyphenator = Dehyphenator::new(options);
    for line in lines {
        dehyphenator.push_line(line.as_ref());
    }
    dehyphenator.finish()
}

/// Dehyphenate lines as they arrive through `reader`.
///
/// Runs until the writer closes the pipe. A failure sentinel from the
/// producer, or cancellation, aborts with an error and drops the reader so
/// the producer stops too.
pub async fn dehyphenate_pipe(
    mut reader: PipeReader,
    options: DehyphenOptions,
    cancel: &CancellationToken,
) -> Result<String, ExtractError> {
    let mut dehyphenator = Dehyphenator::new(options);
    let mut lines = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            next = reader.next_line() => next,
        };
        match next {
            Some(Ok(line)) => {
                lines += 1;
                dehyphenator.push_line(&line);
            }
            Some(Err(error)) => return Err(error),
            None => break,
        }
    }

    let segments = dehyphenator.segments();
    let text = dehyphenator.finish();
    tracing::info!(lines, segments, length = text.len(), "text extracted");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> String {
        dehyphenate(lines, DehyphenOptions::default())
    }

    #[test]
    fn lowercase_continuation_joins_word() {
        assert_eq!(run(&["systems engi-", "neering"]), "systems engineering");
    }

    #[test]
    fn uppercase_continuation_keeps_hyphen() {
        assert_eq!(run(&["well-", "Known"]), "well-Known");
    }

    #[test]
    fn digit_and_punctuation_continuation_keep_hyphen() {
        assert_eq!(run(&["pages 10-", "20 cover it"]), "pages 10-20 cover it");
        assert_eq!(run(&["list -", "(a) first"]), "list -(a) first");
    }

    #[test]
    fn trailing_hyphen_at_end_of_input_is_kept() {
        assert_eq!(run(&["first line", "dangling-"]), "first line dangling-");
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(
            run(&["", "  alpha  ", "\t", "beta", "   "]),
            "alpha beta"
        );
    }

    #[test]
    fn blank_lookahead_is_skipped() {
        assert_eq!(run(&["Bundes-", "", "   ", "tag tagt"]), "Bundestag tagt");
        assert_eq!(run(&["end-", "", ""]), "end-");
    }

    #[test]
    fn joined_text_is_examined_again() {
        assert_eq!(
            run(&["Donau-", "dampf-", "schiff fährt"]),
            "Donaudampfschiff fährt"
        );
        assert_eq!(run(&["re-", "Re-", "run"]), "re-Rerun");
    }

    #[test]
    fn unicode_lowercase_counts() {
        assert_eq!(run(&["Verfahrens-", "änderung"]), "Verfahrensänderung");
        assert_eq!(run(&["Ver-", "Änderung"]), "Ver-Änderung");
    }

    #[test]
    fn joined_lines_continue_with_the_rest_of_the_line() {
        assert_eq!(
            run(&["the hyphen-", "ation problem is", "solved"]),
            "the hyphenation problem is solved"
        );
    }

    #[test]
    fn inner_whitespace_collapses() {
        assert_eq!(run(&["a    b\t\tc", "d"]), "a b c d");
    }

    #[test]
    fn text_without_hyphens_is_words_joined_by_spaces() {
        let lines = ["The quick", "", "brown fox", "jumps  over", "", "the dog"];
        let out = run(&lines);
        let words: Vec<&str> = lines.iter().flat_map(|l| l.split_whitespace()).collect();
        assert_eq!(out, words.join(" "));
    }

    #[test]
    fn output_never_contains_blank_lines() {
        let options = DehyphenOptions {
            separator: JoinSeparator::Newline,
            ..DehyphenOptions::default()
        };
        let out = dehyphenate(["one", "", "  ", "two-", "", "three", "four"], options);
        assert_eq!(out, "one\ntwothree\nfour");
        assert!(out.lines().all(|l| !l.trim().is_empty()));
    }

    #[test]
    fn newline_separator_joins_wrapped_words() {
        let options = DehyphenOptions {
            separator: JoinSeparator::Newline,
            ..DehyphenOptions::default()
        };
        assert_eq!(
            dehyphenate(["engi-", "neering works", "fine"], options),
            "engineering works\nfine"
        );
    }

    #[test]
    fn disabled_joining_emits_lines_verbatim() {
        let options = DehyphenOptions {
            join_hyphenated: false,
            ..DehyphenOptions::default()
        };
        assert_eq!(
            dehyphenate(["systems engi-", "neering"], options),
            "systems engi- neering"
        );
    }

    #[test]
    fn lone_hyphen_line() {
        assert_eq!(run(&["-", "word"]), "word");
        assert_eq!(run(&["-", "Word"]), "-Word");
    }

    #[test]
    fn empty_input() {
        assert_eq!(run(&[]), "");
        assert_eq!(run(&["", "  "]), "");
    }

    #[tokio::test]
    async fn pipe_consumer_matches_in_memory_result() {
        let input = vec!["Die Bundes-", "", "regierung hat", "well-", "Known"];
        let expected = dehyphenate(&input, DehyphenOptions::default());

        let (writer, reader) = crate::pipe::pipe(1);
        let lines: Vec<String> = input.iter().map(|s| s.to_string()).collect();
        let producer = tokio::task::spawn_blocking(move || {
            for line in lines {
                writer.write_line(line).unwrap();
            }
            writer.close();
        });

        let cancel = CancellationToken::new();
        let text = dehyphenate_pipe(reader, DehyphenOptions::default(), &cancel)
            .await
            .unwrap();
        producer.await.unwrap();
        assert_eq!(text, expected);
        assert_eq!(text, "Die Bundesregierung hat well-Known");
    }

    #[tokio::test]
    async fn pipe_consumer_observes_cancellation() {
        let (writer, reader) = crate::pipe::pipe(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dehyphenate_pipe(reader, DehyphenOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
        drop(writer);
    }
}
