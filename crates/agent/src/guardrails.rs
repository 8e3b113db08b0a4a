//! Admission policy for model-generated SQL.
//!
//! The SQL agent writes statements that run against a live store, so every
//! statement is screened before it reaches the executor. Only a single
//! statement is admitted, its leading keyword must be on the allow-list, and a
//! handful of keywords are rejected wherever they appear outside literals.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow { kind: StatementKind },
    Deny { reason_code: &'static str, user_message: String },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SqlStatementPolicy {
    pub allow_writes: bool,
}

const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "TABLE"];
const WRITE_KEYWORDS: &[&str] = &["INSERT", "UPDATE"];
const FORBIDDEN_WORDS: &[&str] = &[
    "ALTER", "CALL", "CLUSTER", "COPY", "CREATE", "DELETE", "DROP", "GRANT", "REINDEX",
    "REVOKE", "TRUNCATE", "VACUUM",
];

impl SqlStatementPolicy {
    pub fn new(allow_writes: bool) -> Self {
        Self { allow_writes }
    }

    pub fn evaluate(&self, sql: &str) -> GuardrailDecision {
        let Some(statements) = scan_statements(sql) else {
            return deny(
                "unterminated_literal",
                "The SQL statement has an unterminated string, identifier or comment.",
            );
        };

        let words = match statements.as_slice() {
            [] => {
                return deny("empty_statement", "No SQL statement was provided.");
            }
            [single] => single,
            _ => {
                return deny(
                    "multiple_statements",
                    "Only a single SQL statement can be run per request.",
                );
            }
        };

        if let Some(word) = words.iter().find(|word| FORBIDDEN_WORDS.contains(&word.as_str())) {
            return deny(
                "forbidden_keyword",
                format!("Statements using `{word}` are not permitted."),
            );
        }
        // `SELECT ... INTO` creates a table.
        if creates_table(words) {
            return deny("forbidden_keyword", "Statements using `INTO` are not permitted.");
        }

        let leading = words[0].as_str();
        let kind = if READ_KEYWORDS.contains(&leading) {
            StatementKind::Read
        } else if WRITE_KEYWORDS.contains(&leading) {
            StatementKind::Write
        } else {
            return deny(
                "statement_not_allowed",
                format!("`{leading}` statements are not permitted."),
            );
        };

        let writes = kind == StatementKind::Write || modifies_rows(words);
        if writes && !self.allow_writes {
            return deny("writes_disabled", "Schedule changes cannot be made from chat.");
        }

        GuardrailDecision::Allow { kind }
    }
}

fn deny(reason_code: &'static str, user_message: impl Into<String>) -> GuardrailDecision {
    GuardrailDecision::Deny { reason_code, user_message: user_message.into() }
}

fn previous(words: &[String], index: usize) -> Option<&str> {
    index.checked_sub(1).map(|prev| words[prev].as_str())
}

/// `INSERT`, `MERGE` or `UPDATE` anywhere in the statement, except the
/// `UPDATE` of a locking clause (`FOR UPDATE`, `FOR NO KEY UPDATE`).
fn modifies_rows(words: &[String]) -> bool {
    words.iter().enumerate().any(|(index, word)| match word.as_str() {
        "INSERT" | "MERGE" => true,
        "UPDATE" => !matches!(previous(words, index), Some("FOR" | "KEY")),
        _ => false,
    })
}

fn creates_table(words: &[String]) -> bool {
    words.iter().enumerate().any(|(index, word)| {
        word == "INTO" && !matches!(previous(words, index), Some("INSERT" | "MERGE"))
    })
}

/// Splits on top-level semicolons and returns the upper-cased words of each
/// non-empty statement. Quoted text, dollar-quoted bodies and comments
/// contribute no words. Returns `None` when a literal or comment never closes.
fn scan_statements(sql: &str) -> Option<Vec<Vec<String>>> {
    let chars = sql.chars().collect::<Vec<_>>();
    let mut statements = vec![Vec::new()];
    let mut word = String::new();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        let next = chars.get(index + 1).copied();

        match current {
            '\'' if word.eq_ignore_ascii_case("E") => {
                word.clear();
                index = skip_quoted(&chars, index, current, true)?;
                continue;
            }
            '\'' | '"' => {
                flush_word(&mut word, &mut statements);
                index = skip_quoted(&chars, index, current, false)?;
                continue;
            }
            '$' if word.is_empty() => {
                if let Some(end) = skip_dollar_quoted(&chars, index) {
                    index = end?;
                    continue;
                }
            }
            '-' if next == Some('-') => {
                flush_word(&mut word, &mut statements);
                while index < chars.len() && chars[index] != '\n' {
                    index += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                flush_word(&mut word, &mut statements);
                index = skip_block_comment(&chars, index)?;
                continue;
            }
            ';' => {
                flush_word(&mut word, &mut statements);
                statements.push(Vec::new());
            }
            ch if ch.is_alphanumeric() || ch == '_' || (ch == '$' && !word.is_empty()) => {
                word.push(ch)
            }
            _ => flush_word(&mut word, &mut statements),
        }

        index += 1;
    }

    flush_word(&mut word, &mut statements);
    statements.retain(|words| !words.is_empty());
    Some(statements)
}

fn flush_word(word: &mut String, statements: &mut [Vec<String>]) {
    if word.is_empty() {
        return;
    }
    if let Some(current) = statements.last_mut() {
        current.push(word.to_ascii_uppercase());
    }
    word.clear();
}

/// Returns the index just past the closing quote. A doubled quote is an escape,
/// and so is a backslash inside an `E'...'` string.
fn skip_quoted(
    chars: &[char],
    start: usize,
    quote: char,
    backslash_escapes: bool,
) -> Option<usize> {
    let mut index = start + 1;
    while index < chars.len() {
        let current = chars[index];
        if backslash_escapes && current == '\\' {
            index += 2;
            continue;
        }
        if current == quote {
            if chars.get(index + 1) == Some(&quote) {
                index += 2;
                continue;
            }
            return Some(index + 1);
        }
        index += 1;
    }
    None
}

/// Nested block comments are legal in PostgreSQL.
fn skip_block_comment(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut index = start;
    while index + 1 < chars.len() {
        match (chars[index], chars[index + 1]) {
            ('/', '*') => {
                depth += 1;
                index += 2;
            }
            ('*', '/') => {
                depth -= 1;
                index += 2;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => index += 1,
        }
    }
    None
}

/// `None` when `start` does not open a `$tag$` quote (e.g. a `$1` parameter);
/// otherwise the index past the matching closing tag, or `Some(None)` when the
/// body never closes.
fn skip_dollar_quoted(chars: &[char], start: usize) -> Option<Option<usize>> {
    let mut index = start + 1;
    while index < chars.len() && chars[index] != '$' {
        let ch = chars[index];
        let valid = ch == '_' || ch.is_alphabetic() || (index > start + 1 && ch.is_alphanumeric());
        if !valid {
            return None;
        }
        index += 1;
    }
    if index >= chars.len() {
        return None;
    }

    let tag = &chars[start..=index];
    let body_start = index + 1;
    let closing = (body_start..chars.len())
        .find(|&position| chars[position..].starts_with(tag))
        .map(|position| position + tag.len());
    Some(closing)
}
