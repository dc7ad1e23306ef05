use crate::charsets::CharsetEncoder;
use crate::Result;
use data_encoding::BASE64;
use std::collections::HashMap;

/// Content bytes allowed per header line, excluding the CRLF and the
/// continuation indent.
const LINE_BUDGET: usize = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarClass {
    /// TAB or SPACE: a candidate fold point.
    Lws,
    /// Visible ASCII.
    Vis,
    /// Needs an encoded word.
    Oth,
}

fn classify(c: char) -> ScalarClass {
    match c {
        '\t' | ' ' => ScalarClass::Lws,
        '\x21'..='\x7e' => ScalarClass::Vis,
        _ => ScalarClass::Oth,
    }
}

fn is_all_lws(chars: &[char]) -> bool {
    chars.iter().all(|&c| classify(c) == ScalarClass::Lws)
}

/// Runs of a header value that stay literal vs. runs that become
/// RFC 2047 encoded words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ValueToken {
    Raw(Vec<char>),
    Encoded(Vec<char>),
}

/// Partition a header value into raw and encoded runs.
///
/// Whitespace adjacent to encoded runs is pulled inside them so that a
/// decoder cannot conjure or drop spaces; whitespace between two raw
/// runs stays raw and is where folding happens.
pub(crate) fn tokenize(value: &str) -> Vec<ValueToken> {
    use ValueToken::*;

    let mut tokens: Vec<ValueToken> = vec![];

    for c in value.chars() {
        let class = classify(c);
        if tokens.is_empty() {
            tokens.push(match class {
                ScalarClass::Oth => Encoded(vec![c]),
                _ => Raw(vec![c]),
            });
            continue;
        }
        let last_is_encoded = matches!(tokens.last(), Some(Encoded(_)));

        match class {
            ScalarClass::Vis => push_last(&mut tokens, c),
            ScalarClass::Lws if last_is_encoded => tokens.push(Raw(vec![c])),
            ScalarClass::Lws => push_last(&mut tokens, c),
            ScalarClass::Oth if last_is_encoded => push_last(&mut tokens, c),
            ScalarClass::Oth => {
                let raw_is_first = tokens.len() == 1;
                let prev_is_encoded =
                    tokens.len() >= 2 && matches!(tokens[tokens.len() - 2], Encoded(_));
                let raw = match tokens.pop() {
                    Some(Raw(xs)) => xs,
                    _ => unreachable!(),
                };

                if is_all_lws(&raw) && prev_is_encoded {
                    // the gap must be encoded along with the scalar
                    match tokens.last_mut() {
                        Some(Encoded(enc)) => {
                            enc.extend(raw);
                            enc.push(c);
                        }
                        _ => unreachable!(),
                    }
                } else if raw_is_first
                    && raw.iter().any(|&x| classify(x) == ScalarClass::Lws)
                {
                    // keep the leading words literal; encode from the
                    // last gap onwards
                    let pos = raw
                        .iter()
                        .rposition(|&x| classify(x) == ScalarClass::Lws)
                        .unwrap_or(0);
                    let mut suffix: Vec<char> = raw[pos + 1..].to_vec();
                    suffix.push(c);
                    tokens.push(Raw(raw[..=pos].to_vec()));
                    tokens.push(Encoded(suffix));
                } else if matches!(raw.last().map(|&x| classify(x)), Some(ScalarClass::Lws)) {
                    tokens.push(Raw(raw));
                    tokens.push(Encoded(vec![c]));
                } else {
                    let mut subsumed = raw;
                    subsumed.push(c);
                    tokens.push(Encoded(subsumed));
                }
            }
        }
    }

    finalize(tokens)
}

fn push_last(tokens: &mut [ValueToken], c: char) {
    match tokens.last_mut() {
        Some(ValueToken::Raw(xs)) | Some(ValueToken::Encoded(xs)) => xs.push(c),
        None => unreachable!(),
    }
}

fn finalize(tokens: Vec<ValueToken>) -> Vec<ValueToken> {
    use ValueToken::*;

    let mut merged: Vec<ValueToken> = vec![];
    for token in tokens {
        let same_kind = matches!(
            (merged.last(), &token),
            (Some(Raw(_)), Raw(_)) | (Some(Encoded(_)), Encoded(_))
        );
        if same_kind {
            let (Raw(extra) | Encoded(extra)) = token;
            match merged.last_mut() {
                Some(Raw(xs)) | Some(Encoded(xs)) => xs.extend(extra),
                None => unreachable!(),
            }
        } else {
            merged.push(token);
        }
    }

    // Trailing whitespace after an encoded word would be ambiguous to a
    // decoder; encode it too.
    if merged.len() >= 2 {
        let fold_tail = matches!(merged.last(), Some(Raw(xs)) if is_all_lws(xs))
            && matches!(merged[merged.len() - 2], Encoded(_));
        if fold_tail {
            let tail = match merged.pop() {
                Some(Raw(xs)) => xs,
                _ => unreachable!(),
            };
            match merged.last_mut() {
                Some(Encoded(enc)) => enc.extend(tail),
                _ => unreachable!(),
            }
        }
    }

    merged
}

/// Fold a header value into RFC 5322 lines of at most 75 content bytes,
/// encoding the runs that need it as `=?charset?B?...?=` words.
///
/// `first_line_used` is the number of bytes already occupied on the
/// first line (the header name plus `": "`). Continuation lines are
/// joined with `CRLF SP`; the indent space is not counted against the
/// budget.
pub fn encode_header_value(
    first_line_used: usize,
    value: &str,
    charset: &CharsetEncoder,
) -> Result<String> {
    let mut writer = ValueWriter::new(first_line_used, charset);
    for token in tokenize(value) {
        match token {
            ValueToken::Raw(xs) => writer.emit_raw(&xs),
            ValueToken::Encoded(xs) => writer.emit_encoded(&xs)?,
        }
    }
    Ok(writer.finish())
}

struct ValueWriter<'a> {
    charset: &'a CharsetEncoder,
    word_name: String,
    lines: Vec<String>,
    current: String,
    first_line_used: usize,
}

impl<'a> ValueWriter<'a> {
    fn new(first_line_used: usize, charset: &'a CharsetEncoder) -> Self {
        Self {
            charset,
            word_name: charset.name().to_ascii_uppercase(),
            lines: vec![],
            current: String::new(),
            first_line_used,
        }
    }

    fn line_base(&self) -> usize {
        if self.lines.is_empty() {
            self.first_line_used
        } else {
            0
        }
    }

    fn remaining(&self) -> usize {
        LINE_BUDGET.saturating_sub(self.line_base() + self.current.len())
    }

    fn fold(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn emit_raw(&mut self, xs: &[char]) {
        let mut idx = 0;
        while idx < xs.len() {
            let rem = self.remaining();
            if rem == 0 {
                self.fold();
                continue;
            }
            let take = rem.min(xs.len() - idx);
            self.current.extend(&xs[idx..idx + take]);
            idx += take;
        }
    }

    fn emit_encoded(&mut self, xs: &[char]) -> Result<()> {
        // "=?" + name + "?B?" + payload + "?="
        let overhead = 7 + self.word_name.len();
        let mut cache: HashMap<(usize, usize), usize> = HashMap::new();
        let mut idx = 0;

        while idx < xs.len() {
            let rem = self.remaining();
            if rem <= overhead + 3 {
                self.fold();
                continue;
            }
            // room for payload, in pre-encoded bytes
            let budget = (rem - overhead) / 4 * 3;

            let take = self.longest_prefix(xs, idx, budget, &mut cache)?;
            let take = if take > 0 {
                take
            } else if self.current.is_empty() && self.line_base() == 0 {
                // a single scalar that overflows a whole fresh line can
                // only happen with a pathological charset name; emit it
                // rather than loop
                1
            } else {
                self.fold();
                continue;
            };

            let chunk: String = xs[idx..idx + take].iter().collect();
            let bytes = self.charset.encode(&chunk)?;
            self.current.push_str("=?");
            self.current.push_str(&self.word_name);
            self.current.push_str("?B?");
            self.current.push_str(&BASE64.encode(&bytes));
            self.current.push_str("?=");
            idx += take;
        }
        Ok(())
    }

    /// Largest scalar prefix of `xs[idx..]` whose encoded length fits
    /// the byte budget, by binary search. Encoded lengths are cached
    /// because stateful encodings (ISO-2022-JP) must be re-measured
    /// from the chunk start.
    fn longest_prefix(
        &self,
        xs: &[char],
        idx: usize,
        budget: usize,
        cache: &mut HashMap<(usize, usize), usize>,
    ) -> Result<usize> {
        let n = xs.len() - idx;
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let len = match cache.get(&(idx, mid)) {
                Some(&len) => len,
                None => {
                    let prefix: String = xs[idx..idx + mid].iter().collect();
                    let len = self.charset.encoded_len(&prefix)?;
                    cache.insert((idx, mid), len);
                    len
                }
            };
            if len <= budget {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Ok(lo)
    }

    fn finish(mut self) -> String {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.fold();
        }
        self.lines.join("\r\n ")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ValueToken::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn tokenize_ascii_stays_raw() {
        assert_eq!(
            tokenize("plain ascii value"),
            vec![Raw(chars("plain ascii value"))]
        );
    }

    #[test]
    fn tokenize_splits_first_raw_at_last_gap() {
        assert_eq!(
            tokenize("Hej Andr\u{e9}"),
            vec![Raw(chars("Hej ")), Encoded(chars("Andr\u{e9}"))]
        );
    }

    #[test]
    fn tokenize_encodes_gaps_between_encoded_runs() {
        assert_eq!(
            tokenize("\u{3042} \u{3042}"),
            vec![Encoded(chars("\u{3042} \u{3042}"))]
        );
    }

    #[test]
    fn tokenize_trailing_whitespace_joins_encoded() {
        assert_eq!(
            tokenize("\u{3042} "),
            vec![Encoded(chars("\u{3042} "))]
        );
    }

    #[test]
    fn tokenize_visible_ascii_extends_encoded_run() {
        assert_eq!(
            tokenize("caf\u{e9}s rock"),
            vec![Encoded(chars("caf\u{e9}s")), Raw(chars(" rock"))]
        );
    }

    #[test]
    fn tokenize_whitespace_after_encoded_starts_new_raw() {
        assert_eq!(
            tokenize("\u{3042} tail"),
            vec![Encoded(chars("\u{3042}")), Raw(chars(" tail"))]
        );
    }

    #[test]
    fn tokenize_is_deterministic() {
        let input = "My First Mail Message. - \u{79c1}\u{306e} mixed - tail ";
        let first = tokenize(input);
        for _ in 0..8 {
            assert_eq!(tokenize(input), first);
        }
    }

    #[test]
    fn plain_value_passes_through() {
        let cs = CharsetEncoder::utf8();
        assert_eq!(
            encode_header_value(9, "hello there", &cs).unwrap(),
            "hello there"
        );
    }

    #[test]
    fn single_encoded_word() {
        let cs = CharsetEncoder::utf8();
        assert_eq!(
            encode_header_value(9, "Hej Andr\u{e9}", &cs).unwrap(),
            "Hej =?UTF-8?B?QW5kcsOp?="
        );
    }

    #[test]
    fn long_ascii_folds_at_budget() {
        let cs = CharsetEncoder::utf8();
        let value = "a".repeat(100);
        let encoded = encode_header_value(9, &value, &cs).unwrap();
        let lines: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 66);
        assert_eq!(lines[1].len(), 34);
    }

    #[test]
    fn folded_lines_stay_within_budget() {
        let cs = CharsetEncoder::utf8();
        let value = "mixed \u{3053}\u{3093}\u{306b}\u{3061}\u{306f} text ".repeat(6);
        let encoded = encode_header_value(9, &value, &cs).unwrap();
        for (i, line) in encoded.split("\r\n ").enumerate() {
            let used = if i == 0 { 9 } else { 0 };
            assert!(
                used + line.len() <= 75,
                "line {i} is {} bytes: {line:?}",
                line.len()
            );
            assert!(line.bytes().all(|b| b <= 0x7e));
        }
    }

    #[test]
    fn iso_2022_jp_subject_folds_into_two_words() {
        let cs = CharsetEncoder::iso_2022_jp();
        let value = "My First Mail Message. - \
                     \u{79c1}\u{306e}\u{521d}\u{3081}\u{3066}\u{306e}\
                     \u{30e1}\u{30fc}\u{30eb}\u{30e1}\u{30c3}\u{30bb}\u{30fc}\u{30b8} -";
        let encoded = encode_header_value("Subject: ".len(), value, &cs).unwrap();
        let lines: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("My First Mail Message. - =?ISO-2022-JP?B?"));
        assert!(lines[0].ends_with("?="));
        assert!(lines[1].starts_with("=?ISO-2022-JP?B?"));
        assert!(lines[1].ends_with("?= -"));
        assert!(lines[0].len() + "Subject: ".len() <= 75);
        assert!(lines[1].len() <= 75);

        // both words must decode back to the original scalars
        let mut decoded = String::new();
        for (i, line) in lines.iter().enumerate() {
            let body = line
                .trim_start_matches("My First Mail Message. - ")
                .trim_end_matches(" -");
            let payload = body
                .trim_start_matches("=?ISO-2022-JP?B?")
                .trim_end_matches("?=");
            let bytes = BASE64.decode(payload.as_bytes()).unwrap();
            let (text, _, malformed) = encoding_rs::ISO_2022_JP.decode(&bytes);
            assert!(!malformed, "line {i} payload failed to decode");
            decoded.push_str(&text);
        }
        assert_eq!(
            decoded,
            "\u{79c1}\u{306e}\u{521d}\u{3081}\u{3066}\u{306e}\
             \u{30e1}\u{30fc}\u{30eb}\u{30e1}\u{30c3}\u{30bb}\u{30fc}\u{30b8}"
        );
    }

    #[test]
    fn unencodable_scalar_is_fatal() {
        let cs = CharsetEncoder::iso_2022_jp();
        assert!(matches!(
            encode_header_value(0, "rocket \u{1f680}", &cs),
            Err(crate::MailBuildError::DataConversionFailure { .. })
        ));
    }
}
