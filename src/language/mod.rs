//! Heuristic source language detection.
//!
//! Snippets submitted without an explicit language are scored against two
//! weighted rule sets, one for JavaScript and one for Python. Every rule whose
//! pattern appears anywhere in the comment-stripped source contributes its
//! points once; the language with the strictly higher total wins and a tie
//! yields [`DetectedLanguage::Unknown`].
//!
//! The classifier is a best-effort scorer rather than a parser. Callers that
//! know the language should pass it explicitly.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Outcome of [`detect_language`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DetectedLanguage {
    /// The JavaScript rules scored higher.
    JavaScript,
    /// The Python rules scored higher.
    Python,
    /// The source was empty after cleaning or both scores were equal.
    Unknown,
}

impl DetectedLanguage {
    /// Returns the lowercase tag used by the run API (`javascript`,
    /// `python` or `unknown`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` when a concrete language was recognised.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DetectedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Rule {
    pattern: Regex,
    points: u32,
}

const JAVASCRIPT_RULES: &[(&str, u32)] = &[
    (r"undefined", 2),
    (r"console\.log( )*\(", 2),
    (r"(var|const|let)( )+\w+( )*=?", 2),
    (r#"(('|").+('|")( )*|\w+):( )*[{\[]"#, 2),
    (r"===", 1),
    (r"!==", 1),
    (r"function\*?(( )+[\$\w]+( )*\(.*\)|( )*\(.*\))", 1),
    (r"null", 1),
    (r"\(.*\)( )*=>( )*.+", 1),
    (r"(else )?if( )+\(.+\)", 1),
    (r"async( )+function", 2),
    (r"module\.exports( )*=", 2),
];

const PYTHON_RULES: &[(&str, u32)] = &[
    (r"def( )+\w+\(.*\)( )*:", 2),
    (r"from [\w\.]+ import (\w+|\*)", 2),
    (r"class( )*\w+(\(( )*\w+( )*\))?( )*:", 2),
    (r"if( )+(.+)( )*:", 2),
    (r"elif( )+(.+)( )*:", 2),
    (r"else:", 2),
    (r"for (\w+|\(?\w+,( )*\w+\)?) in (.+):", 2),
    // The right-hand side must end the line, so `x = 1;` does not count.
    (r"\w+( )*=( )*\w+(\n|$)", 1),
    (r"import( )+\w+", 1),
    (r"print((( )*\(.+\))|( )+.+)", 1),
];

#[expect(
    clippy::expect_used,
    reason = "rule patterns are constants exercised by the unit tests"
)]
fn compile(rules: &[(&str, u32)]) -> Vec<Rule> {
    rules
        .iter()
        .map(|&(pattern, points)| Rule {
            pattern: Regex::new(pattern).expect("language rule pattern should compile"),
            points,
        })
        .collect()
}

static JAVASCRIPT: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(JAVASCRIPT_RULES));
static PYTHON: LazyLock<Vec<Rule>> = LazyLock::new(|| compile(PYTHON_RULES));

#[expect(
    clippy::expect_used,
    reason = "comment patterns are constants exercised by the unit tests"
)]
static JS_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*[\s\S]*?\*/|//.*").expect("comment pattern should compile")
});

#[expect(
    clippy::expect_used,
    reason = "comment patterns are constants exercised by the unit tests"
)]
static PYTHON_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#.*").expect("comment pattern should compile"));

/// Guesses whether `code` is JavaScript or Python.
///
/// # Examples
///
/// ```
/// use yepcode_run::language::{DetectedLanguage, detect_language};
///
/// let code = "async function main() {}\nmodule.exports = { main };";
/// assert_eq!(detect_language(code), DetectedLanguage::JavaScript);
/// assert_eq!(detect_language("   "), DetectedLanguage::Unknown);
/// ```
#[must_use]
pub fn detect_language(code: &str) -> DetectedLanguage {
    let cleaned = clean_code(code);
    if cleaned.is_empty() {
        return DetectedLanguage::Unknown;
    }

    let javascript = score(&cleaned, &JAVASCRIPT);
    let python = score(&cleaned, &PYTHON);

    match javascript.cmp(&python) {
        std::cmp::Ordering::Greater => DetectedLanguage::JavaScript,
        std::cmp::Ordering::Less => DetectedLanguage::Python,
        std::cmp::Ordering::Equal => DetectedLanguage::Unknown,
    }
}

/// Strips JavaScript and Python comments plus surrounding whitespace.
fn clean_code(code: &str) -> String {
    let without_js = JS_COMMENTS.replace_all(code, "");
    let without_python = PYTHON_COMMENTS.replace_all(&without_js, "");
    without_python.trim().to_owned()
}

fn score(code: &str, rules: &[Rule]) -> u32 {
    rules
        .iter()
        .filter(|rule| rule.pattern.is_match(code))
        .map(|rule| rule.points)
        .sum()
}
