fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub record: &'a str,
    pub account: &'a str,
    pub reason: &'a str,
}

pub fn format_line(event: &WarnEvent<'_>) -> String {
    format!(
        "NODESITE_WARN code={} stage={} record={} account={} reason={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.record),
        sanitize_value(event.account),
        sanitize_value(event.reason),
    )
}

/// One grep-friendly line on stderr for a condition that does not stop the run.
pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", format_line(&event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn line_carries_every_field() {
        let line = format_line(&WarnEvent {
            code: "OWNER_MISMATCH",
            stage: "metadata",
            record: "site",
            account: "alice",
            reason: "owned by bob",
        });
        assert_eq!(
            line,
            "NODESITE_WARN code=OWNER_MISMATCH stage=metadata record=site account=alice reason=owned_by_bob"
        );
    }
}
