use regex::Regex;
use std::sync::OnceLock;

/// Remove HTML tags (`<...>`) and entity references (`&...;`) from free text.
///
/// Everything else is kept as is, whitespace included. Broken markup such as
/// an unclosed `<b` is left in place rather than rejected.
pub fn clean(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"<[^>]*>|&[^;]*;").unwrap());
    re.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(
            clean("<p>Build <strong>fast</strong> services</p>"),
            "Build fast services"
        );
        assert_eq!(clean("<ul><li>Rust</li><li>SQL</li></ul>"), "RustSQL");
    }

    #[test]
    fn strips_entities() {
        assert_eq!(clean("Tom &amp; Jerry&nbsp;Ltd"), "Tom  JerryLtd");
        assert_eq!(clean("&quot;quoted&quot; &#171;text&#187;"), "quoted text");
    }

    #[test]
    fn plain_text_untouched() {
        let text = "Salary 100 > 50, a < b; no markup here";
        assert_eq!(clean(text), text);
        assert_eq!(clean("line one\nline two\t"), "line one\nline two\t");
    }

    #[test]
    fn malformed_markup_is_partially_removed() {
        assert_eq!(clean("open <b never closed"), "open <b never closed");
        assert_eq!(clean("<<b>>"), ">");
        assert_eq!(clean("a & b"), "a & b");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "<p>Hello&nbsp;<b>world</b></p>",
            "<<b>>",
            "&<a>;x",
            "a<b&c;d",
            "&x<y>z",
            "",
            "no markup",
        ];
        for s in samples {
            let once = clean(s);
            assert_eq!(clean(&once), once, "input: {:?}", s);
        }
    }
}
