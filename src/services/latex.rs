//! # AI 출력 후처리
//!
//! 모델 응답에서 점수 마커와 코드 펜스를 걷어내고,
//! 본문에 남은 LaTeX 특수문자(`&`, `%`, `_`, `#`)를 이스케이프합니다.
//!
//! 이스케이프는 파서가 아니라 최선의 노력(best-effort) 수준의 스캐너입니다.
//! 다음은 건드리지 않습니다:
//! - `\begin{document}` 이전의 프리앰블
//! - 이미 이스케이프된 문자 (`\&`, `\%` …)
//! - 수식 (`$…$`, `$$…$$`, `\(…\)`, `\[…\]`, equation/align 등 수식 환경)
//! - 정렬 환경(tabular, align …) 안의 `&`
//! - 주석 `%` (줄 맨 앞, `}` 바로 뒤, 앞뒤가 공백인 경우), `#1` 같은 매크로 인자
//! - `\url{}`, `\href{}` 첫 인자, `\label{}` 등 그대로 써야 하는 인자
//!
//! `\verb|…|`나 verbatim 환경은 인식하지 않습니다.

pub const SCORE_MARKER: &str = "MATCH_SCORE:";

const FENCE: &str = "```";
const BODY_START: &str = "\\begin{document}";

const VERBATIM_ARGUMENT_COMMANDS: &[&str] = &[
    "url",
    "href",
    "label",
    "ref",
    "eqref",
    "pageref",
    "cite",
    "includegraphics",
    "input",
    "include",
    "usepackage",
    "hypersetup",
    "textcolor",
    "color",
];

const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "equation*",
    "align",
    "align*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "displaymath",
    "math",
    "eqnarray",
    "eqnarray*",
];

const ALIGNMENT_ENVIRONMENTS: &[&str] = &[
    "tabular",
    "tabular*",
    "tabularx",
    "tabulary",
    "longtable",
    "array",
    "matrix",
    "pmatrix",
    "bmatrix",
    "cases",
];

/// 맨 앞의 `MATCH_SCORE: NN%` 줄을 분리합니다.
///
/// 마커 줄이 없으면 `None`. 마커는 있지만 값이 0~100 정수가 아니면
/// 점수만 `None`이고 마커 줄은 여전히 제거됩니다.
pub fn split_score_marker(text: &str) -> Option<(Option<u8>, &str)> {
    let rest = text.trim_start().strip_prefix(SCORE_MARKER)?;
    let (line, remainder) = match rest.find('\n') {
        Some(nl) => (&rest[..nl], &rest[nl + 1..]),
        None => (rest, ""),
    };

    let value = line.trim().trim_end_matches('%').trim_end();
    let score = value.parse::<u8>().ok().filter(|s| *s <= 100);

    Some((score, remainder.trim_start()))
}

/// 코드 펜스(```latex … ``` 또는 ``` … ```)를 벗겨냅니다.
///
/// 펜스가 여러 개면 첫 번째 쌍 사이의 내용만 사용합니다.
/// 닫는 펜스가 없으면 여는 펜스 이후 전부를 사용합니다.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text.trim();
    };

    let after = &text[open + FENCE.len()..];
    // 여는 펜스 줄의 언어 태그("latex", "tex")는 버림
    let after = match after.find('\n') {
        Some(nl) if is_language_tag(&after[..nl]) => &after[nl + 1..],
        _ => after,
    };

    match after.find(FENCE) {
        Some(close) => after[..close].trim(),
        None => after.trim(),
    }
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '_')
}

/// 본문의 이스케이프되지 않은 `&`, `%`, `_`, `#`에 역슬래시를 붙입니다.
///
/// 이미 처리된 결과에 다시 적용해도 바뀌지 않습니다.
pub fn escape_specials(source: &str) -> String {
    let (preamble, body) = match source.find(BODY_START) {
        Some(i) => source.split_at(i + BODY_START.len()),
        None => ("", source),
    };

    let mut out = String::with_capacity(source.len() + 16);
    out.push_str(preamble);
    Scanner::new(body).run(&mut out);
    out
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    dollar_math: bool,
    delimited_math: bool,
    math_env_depth: usize,
    align_depth: usize,
    at_line_start: bool,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            dollar_math: false,
            delimited_math: false,
            math_env_depth: 0,
            align_depth: 0,
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn in_math(&self) -> bool {
        self.dollar_math || self.delimited_math || self.math_env_depth > 0
    }

    fn run(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.control_sequence(out),
                '$' => {
                    self.pos += 1;
                    out.push('$');
                    if self.peek() == Some('$') {
                        self.pos += 1;
                        out.push('$');
                    }
                    self.dollar_math = !self.dollar_math;
                    self.at_line_start = false;
                }
                '%' if self.starts_comment(out) => self.copy_line(out),
                '&' | '%' | '_' | '#' => {
                    self.pos += 1;
                    if self.needs_escape(c) {
                        out.push('\\');
                    }
                    out.push(c);
                    self.at_line_start = false;
                }
                '\n' => {
                    self.pos += 1;
                    out.push(c);
                    self.at_line_start = true;
                }
                c if c.is_whitespace() => {
                    self.pos += 1;
                    out.push(c);
                }
                _ => {
                    self.pos += 1;
                    out.push(c);
                    self.at_line_start = false;
                }
            }
        }
    }

    /// 줄 맨 앞, `}` 바로 뒤(`}% ...`), 공백 뒤에 공백이 이어지는 `%`(` % ...`)는 주석입니다.
    /// 문장 속 `40%`나 `40% growth`는 퍼센트 기호로 봅니다.
    fn starts_comment(&self, out: &str) -> bool {
        if self.in_math() {
            return false;
        }
        if self.at_line_start {
            return true;
        }
        let mut before = out.chars().rev();
        match before.next() {
            Some('}') => before.next() != Some('\\'),
            Some(c) if c == ' ' || c == '\t' => {
                let after = self.chars.get(self.pos + 1).copied();
                after.map_or(true, char::is_whitespace)
            }
            _ => false,
        }
    }

    /// `pos`는 이미 특수문자 다음을 가리킵니다.
    fn needs_escape(&self, c: char) -> bool {
        if self.in_math() {
            return false;
        }
        match c {
            '&' => self.align_depth == 0,
            '#' => !self.peek().is_some_and(|n| n.is_ascii_digit()),
            _ => true,
        }
    }

    fn control_sequence(&mut self, out: &mut String) {
        self.pos += 1;
        out.push('\\');
        self.at_line_start = false;

        let Some(next) = self.peek() else {
            return;
        };

        if !next.is_ascii_alphabetic() {
            // 제어 기호: \&, \%, \\, \(, \[ …
            self.pos += 1;
            out.push(next);
            match next {
                '(' | '[' => self.delimited_math = true,
                ')' | ']' => self.delimited_math = false,
                _ => {}
            }
            return;
        }

        let mut name = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_alphabetic) {
            self.pos += 1;
            name.push(c);
        }
        out.push_str(&name);

        match name.as_str() {
            "begin" | "end" => {
                if self.peek() == Some('{') {
                    let env = self.copy_balanced(out, '{', '}');
                    self.track_environment(name == "begin", env.trim());
                }
            }
            n if VERBATIM_ARGUMENT_COMMANDS.contains(&n) => self.copy_verbatim_argument(out),
            _ => {}
        }
    }

    fn track_environment(&mut self, begin: bool, env: &str) {
        let adjust = |depth: &mut usize| {
            if begin {
                *depth += 1;
            } else {
                *depth = depth.saturating_sub(1);
            }
        };
        if MATH_ENVIRONMENTS.contains(&env) {
            adjust(&mut self.math_env_depth);
        }
        if ALIGNMENT_ENVIRONMENTS.contains(&env) {
            adjust(&mut self.align_depth);
        }
    }

    /// 선택 인자 `[…]`들과 첫 번째 `{…}` 인자를 그대로 복사합니다.
    fn copy_verbatim_argument(&mut self, out: &mut String) {
        while self.peek() == Some('[') {
            self.copy_balanced(out, '[', ']');
        }
        if self.peek() == Some('{') {
            self.copy_balanced(out, '{', '}');
        }
    }

    /// 여는 괄호부터 짝이 맞는 닫는 괄호까지 복사하고 안쪽 내용을 돌려줍니다.
    fn copy_balanced(&mut self, out: &mut String, open: char, close: char) -> String {
        let mut depth = 0usize;
        let mut inner = String::new();

        while let Some(c) = self.peek() {
            self.pos += 1;
            out.push(c);

            if c == '\\' {
                if let Some(escaped) = self.peek() {
                    self.pos += 1;
                    out.push(escaped);
                    inner.push(c);
                    inner.push(escaped);
                }
                continue;
            }

            if c == open {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            } else if c == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            inner.push(c);
        }

        self.at_line_start = false;
        inner
    }

    fn copy_line(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            out.push(c);
            if c == '\n' {
                break;
            }
        }
        self.at_line_start = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_marker_is_split_off() {
        let (score, rest) = split_score_marker("MATCH_SCORE: 82%\n\n\\documentclass{article}").unwrap();
        assert_eq!(score, Some(82));
        assert_eq!(rest, "\\documentclass{article}");
    }

    #[test]
    fn out_of_range_score_is_dropped_but_marker_removed() {
        let (score, rest) = split_score_marker("MATCH_SCORE: 140%\n\nbody").unwrap();
        assert_eq!(score, None);
        assert_eq!(rest, "body");

        let (score, _) = split_score_marker("MATCH_SCORE: high\nbody").unwrap();
        assert_eq!(score, None);
    }

    #[test]
    fn text_without_marker_has_no_split() {
        assert!(split_score_marker("\\documentclass{article}").is_none());
    }

    #[test]
    fn fences_with_and_without_language_tag() {
        assert_eq!(strip_code_fences("```latex\n\\section{A}\n```"), "\\section{A}");
        assert_eq!(strip_code_fences("```\n\\section{A}\n```"), "\\section{A}");
        assert_eq!(strip_code_fences("\\section{A}"), "\\section{A}");
    }

    #[test]
    fn only_the_first_fenced_block_is_kept() {
        let text = "Here you go:\n```latex\nfirst\n```\nand also\n```\nsecond\n```";
        assert_eq!(strip_code_fences(text), "first");
    }

    #[test]
    fn unterminated_fence_keeps_the_rest() {
        assert_eq!(strip_code_fences("```tex\n\\section{A}\n"), "\\section{A}");
    }

    #[test]
    fn plain_text_specials_are_escaped() {
        assert_eq!(escape_specials("Research & Development"), "Research \\& Development");
        assert_eq!(escape_specials("Grew revenue 40% in Q3"), "Grew revenue 40\\% in Q3");
        assert_eq!(escape_specials("snake_case and C#"), "snake\\_case and C\\#");
    }

    #[test]
    fn escaping_twice_changes_nothing() {
        let once = escape_specials("R&D, 40% growth, my_var, C# \\& done");
        assert_eq!(once, "R\\&D, 40\\% growth, my\\_var, C\\# \\& done");
        assert_eq!(escape_specials(&once), once);
    }

    #[test]
    fn math_is_left_alone() {
        let text = "$O(n_1)$ and \\(a_b\\) and \\[x_i\\] and $$y_j$$";
        assert_eq!(escape_specials(text), text);

        let env = "\\begin{equation}\na_1 & b\n\\end{equation}";
        assert_eq!(escape_specials(env), env);
    }

    #[test]
    fn comments_and_tabulars_are_left_alone() {
        assert_eq!(
            escape_specials("% note & more\nText & more"),
            "% note & more\nText \\& more"
        );

        let table = "\\begin{tabular}{ll}\nA & B \\\\\n\\end{tabular}\nQ&A";
        assert_eq!(
            escape_specials(table),
            "\\begin{tabular}{ll}\nA & B \\\\\n\\end{tabular}\nQ\\&A"
        );
    }

    #[test]
    fn trailing_comments_are_left_alone() {
        assert_eq!(
            escape_specials("\\resumeItem{Led team}% spacing & more\nText & more"),
            "\\resumeItem{Led team}% spacing & more\nText \\& more"
        );
        assert_eq!(
            escape_specials("\\item Shipped it % note: numbers\nDone"),
            "\\item Shipped it % note: numbers\nDone"
        );
        // 퍼센트 기호와 이스케이프된 중괄호 뒤는 주석이 아님
        assert_eq!(
            escape_specials("Grew 40% in Q3, 25%\nSet \\{a\\}%b"),
            "Grew 40\\% in Q3, 25\\%\nSet \\{a\\}\\%b"
        );
        assert_eq!(escape_specials("$x}%y$"), "$x}%y$");
    }

    #[test]
    fn verbatim_arguments_are_left_alone() {
        assert_eq!(
            escape_specials("\\href{https://x.com/a_b#frag}{My_Site}"),
            "\\href{https://x.com/a_b#frag}{My\\_Site}"
        );
        assert_eq!(escape_specials("\\label{sec:work_history}"), "\\label{sec:work_history}");
    }

    #[test]
    fn preamble_and_macro_parameters_are_left_alone() {
        let doc = "\\newcommand{\\myuline}[1]{\\underline{#1}}\n\\begin{document}\nR&D #1\n\\end{document}";
        assert_eq!(
            escape_specials(doc),
            "\\newcommand{\\myuline}[1]{\\underline{#1}}\n\\begin{document}\nR\\&D #1\n\\end{document}"
        );
    }
}
