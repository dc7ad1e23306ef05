use crate::charsets::CharsetEncoder;
use crate::Result;

/// Content budget for a parameter segment line: 75 bytes minus the `;`
/// that joins it to its neighbor. The continuation indent is not
/// counted, as with header folding.
const SEGMENT_BUDGET: usize = 74;

/// RFC 2045 token scalars; values made only of these can appear bare.
fn is_token_scalar(c: char) -> bool {
    matches!(c, '\x21'..='\x7e')
        && !matches!(
            c,
            '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?'
                | '='
        )
}

/// RFC 2231 attribute-char complement: everything outside the reserve
/// set becomes `%HH` with upper-case hex.
fn is_pct_literal(b: u8) -> bool {
    matches!(b,
        b'$' | b'-' | b'.' | b'@' | b'_' | b'~'
        | b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z')
}

fn pct_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .map(|&b| if is_pct_literal(b) { 1 } else { 3 })
        .sum()
}

fn pct_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if is_pct_literal(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn quote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Encode one `name=value` parameter into header segments.
///
/// Returns one segment for the short and quoted forms, several
/// `name*N*=` continuation segments otherwise. Each segment fits a
/// 75-byte header line once its joining `;` is counted; the caller owns
/// placement and folding.
pub fn encode_parameter(
    name: &str,
    value: &str,
    charset: &CharsetEncoder,
    lang: Option<&str>,
) -> Result<Vec<String>> {
    if !value.is_empty()
        && value.chars().all(is_token_scalar)
        && name.len() + 1 + value.len() < 75
    {
        return Ok(vec![format!("{name}={value}")]);
    }

    if value.chars().all(|c| matches!(c, '\x20'..='\x7e')) {
        let quoted = quote_value(value);
        if name.len() + 1 + quoted.len() < 75 {
            return Ok(vec![format!("{name}={quoted}")]);
        }
    }

    continuation_segments(name, value, charset, lang)
}

fn continuation_segments(
    name: &str,
    value: &str,
    charset: &CharsetEncoder,
    lang: Option<&str>,
) -> Result<Vec<String>> {
    let cs_name = charset.name().to_ascii_lowercase();
    // %-encoding is only defined for extended (starred) segments;
    // us-ascii values continue in quoted form instead
    let starred = !charset.is_ascii();
    let star = if starred { "*" } else { "" };

    let chars: Vec<char> = value.chars().collect();
    let mut segments = vec![];
    let mut idx = 0;
    let mut n = 0usize;

    while idx < chars.len() || segments.is_empty() {
        let head = format!("{name}*{n}{star}=");
        let tag = if n == 0 && starred {
            format!("{cs_name}'{}'", lang.unwrap_or(""))
        } else {
            String::new()
        };
        let fixed = head.len() + tag.len() + if starred { 0 } else { 2 };
        let budget = SEGMENT_BUDGET.saturating_sub(fixed);

        let remaining = &chars[idx..];
        let take = longest_prefix(remaining.len(), budget, |k| {
            let chunk: String = remaining[..k].iter().collect();
            if starred {
                Ok(pct_len(&charset.encode(&chunk)?))
            } else {
                Ok(chunk
                    .chars()
                    .map(|c| if c == '"' || c == '\\' { 2 } else { 1 })
                    .sum())
            }
        })?
        // a name so long that nothing fits would stall the loop
        .max(1)
        .min(remaining.len().max(1));

        let chunk: String = remaining.iter().take(take).collect();
        let body = if starred {
            pct_encode(&charset.encode(&chunk)?)
        } else {
            quote_value(&chunk)
        };
        segments.push(format!("{head}{tag}{body}"));
        idx += take;
        n += 1;
    }

    Ok(segments)
}

/// Largest `k <= n` with `measure(k) <= budget`; measure is monotonic
/// in k.
fn longest_prefix<F>(n: usize, budget: usize, mut measure: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<usize>,
{
    let mut lo = 0usize;
    let mut hi = n;
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if measure(mid)? <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

/// Attach already-encoded parameter segments to a header value,
/// folding with `CRLF SP` so no line exceeds the 75-byte budget.
pub(crate) fn render_with_parameters(
    first_line_used: usize,
    base: &str,
    params: Vec<Vec<String>>,
) -> String {
    let mut lines: Vec<String> = vec![];
    let mut current = base.to_string();

    for segments in params {
        for segment in segments {
            current.push(';');
            let used = if lines.is_empty() { first_line_used } else { 0 };
            if used + current.len() + 1 + segment.len() <= 75 {
                current.push(' ');
                current.push_str(&segment);
            } else {
                lines.push(std::mem::take(&mut current));
                current = segment;
            }
        }
    }
    lines.push(current);
    lines.join("\r\n ")
}
