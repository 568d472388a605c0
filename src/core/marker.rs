//! Environment marker evaluation.
//!
//! Evaluates the condition after `;` in a requirement against a
//! [`TargetEnvironment`]. Requirements are read for a plain install, so no
//! extras are selected and `extra == "..."` clauses never hold.

use std::cmp::Ordering;

use thiserror::Error;

use crate::core::environment::TargetEnvironment;

/// Error evaluating a marker expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("unexpected end of marker expression")]
    UnexpectedEnd,

    #[error("unexpected token `{0}` in marker expression")]
    UnexpectedToken(String),

    #[error("unterminated string in marker expression")]
    UnterminatedString,

    #[error("unknown marker variable `{0}`")]
    UnknownVariable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Str(String),
    Ident(String),
    Op(String),
    And,
    Or,
    In,
    Not,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Str(s) => format!("'{}'", s),
            Token::Ident(s) | Token::Op(s) => s.clone(),
            Token::And => "and".to_string(),
            Token::Or => "or".to_string(),
            Token::In => "in".to_string(),
            Token::Not => "not".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, MarkerError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or(MarkerError::UnterminatedString)?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '=' | '!' | '<' | '>' | '~' => {
                let start = i;
                while i < chars.len() && matches!(chars[i], '=' | '!' | '<' | '>' | '~') {
                    i += 1;
                }
                let op: String = chars[start..i].iter().collect();
                match op.as_str() {
                    "==" | "!=" | "<" | "<=" | ">" | ">=" | "~=" | "===" => {
                        tokens.push(Token::Op(op))
                    }
                    _ => return Err(MarkerError::UnexpectedToken(op)),
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "in" => Token::In,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(MarkerError::UnexpectedToken(other.to_string())),
        }
    }

    Ok(tokens)
}

/// Recursive-descent evaluator over the token stream.
struct Evaluator<'a> {
    tokens: Vec<Token>,
    pos: usize,
    env: &'a TargetEnvironment,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, MarkerError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(MarkerError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expr(&mut self) -> Result<bool, MarkerError> {
        let mut value = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            // Both sides are evaluated so syntax errors surface either way.
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, MarkerError> {
        let mut value = self.atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.atom()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn atom(&mut self) -> Result<bool, MarkerError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let value = self.expr()?;
            match self.next()? {
                Token::RParen => return Ok(value),
                other => return Err(MarkerError::UnexpectedToken(other.describe())),
            }
        }

        let (lhs, lhs_is_extra) = self.operand()?;
        let op = match self.next()? {
            Token::Op(op) => op,
            Token::In => "in".to_string(),
            Token::Not => match self.next()? {
                Token::In => "not in".to_string(),
                other => return Err(MarkerError::UnexpectedToken(other.describe())),
            },
            other => return Err(MarkerError::UnexpectedToken(other.describe())),
        };
        let (rhs, rhs_is_extra) = self.operand()?;

        if lhs_is_extra || rhs_is_extra {
            // No extras are selected: only inequality can hold.
            return Ok(op == "!=" || op == "not in");
        }

        Ok(compare(&lhs, &op, &rhs))
    }

    /// Returns the operand value and whether it named the `extra` variable.
    fn operand(&mut self) -> Result<(String, bool), MarkerError> {
        match self.next()? {
            Token::Str(s) => Ok((s, false)),
            Token::Ident(name) if name == "extra" => Ok((String::new(), true)),
            Token::Ident(name) => self
                .env
                .get(&name)
                .map(|v| (v.to_string(), false))
                .ok_or(MarkerError::UnknownVariable(name)),
            other => Err(MarkerError::UnexpectedToken(other.describe())),
        }
    }
}

/// Evaluate a marker expression against the target environment.
pub fn evaluate(marker: &str, env: &TargetEnvironment) -> Result<bool, MarkerError> {
    let mut evaluator = Evaluator {
        tokens: tokenize(marker)?,
        pos: 0,
        env,
    };
    let value = evaluator.expr()?;
    match evaluator.peek() {
        None => Ok(value),
        Some(token) => Err(MarkerError::UnexpectedToken(token.describe())),
    }
}

fn compare(lhs: &str, op: &str, rhs: &str) -> bool {
    match op {
        "in" => rhs.contains(lhs),
        "not in" => !rhs.contains(lhs),
        "===" => lhs == rhs,
        _ => match (parse_release(lhs), rhs.strip_suffix(".*")) {
            (Some(left), Some(prefix)) if op == "==" || op == "!=" => {
                let matched = parse_release(prefix)
                    .map(|p| left.len() >= p.len() && left[..p.len()] == p[..])
                    .unwrap_or(false);
                matched == (op == "==")
            }
            (Some(left), _) => match parse_release(rhs) {
                Some(right) => compare_versions(&left, op, &right),
                None => compare_strings(lhs, op, rhs),
            },
            (None, _) => compare_strings(lhs, op, rhs),
        },
    }
}

fn compare_strings(lhs: &str, op: &str, rhs: &str) -> bool {
    match op {
        "==" => lhs == rhs,
        "!=" => lhs != rhs,
        _ => false,
    }
}

fn compare_versions(lhs: &[u64], op: &str, rhs: &[u64]) -> bool {
    let ord = cmp_release(lhs, rhs);
    match op {
        "==" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        ">=" => ord != Ordering::Less,
        "~=" => {
            if rhs.len() < 2 {
                return false;
            }
            let prefix = &rhs[..rhs.len() - 1];
            ord != Ordering::Less && lhs.len() >= prefix.len() && &lhs[..prefix.len()] == prefix
        }
        _ => false,
    }
}

fn cmp_release(lhs: &[u64], rhs: &[u64]) -> Ordering {
    let len = lhs.len().max(rhs.len());
    for i in 0..len {
        let a = lhs.get(i).copied().unwrap_or(0);
        let b = rhs.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Parse the numeric release segment of a version (`3.11.4rc1` -> `[3, 11, 4]`).
fn parse_release(version: &str) -> Option<Vec<u64>> {
    let mut parts = Vec::new();
    for segment in version.trim().split('.') {
        let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        parts.push(digits.parse().ok()?);
        if digits.len() != segment.len() {
            break;
        }
    }
    (!parts.is_empty()).then_some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> TargetEnvironment {
        let mut env = TargetEnvironment::host();
        env.set("sys_platform", "linux");
        env.set("platform_system", "Linux");
        env.set("python_version", "3.11");
        env.set("python_full_version", "3.11.4");
        env
    }

    #[test]
    fn test_simple_equality() {
        let env = linux();
        assert!(evaluate("sys_platform == 'linux'", &env).unwrap());
        assert!(!evaluate("sys_platform == \"win32\"", &env).unwrap());
        assert!(evaluate("sys_platform != 'win32'", &env).unwrap());
    }

    #[test]
    fn test_version_comparison() {
        let env = linux();
        assert!(evaluate("python_version >= '3.8'", &env).unwrap());
        assert!(!evaluate("python_version < '3.10'", &env).unwrap());
        assert!(evaluate("python_full_version ~= '3.11.0'", &env).unwrap());
        assert!(evaluate("python_version == '3.*'", &env).unwrap());
        assert!(!evaluate("python_version != '3.11.*'", &env).unwrap());
    }

    #[test]
    fn test_boolean_operators() {
        let env = linux();
        assert!(evaluate(
            "(sys_platform == 'win32' or sys_platform == 'linux') and python_version > '3'",
            &env
        )
        .unwrap());
        assert!(!evaluate("sys_platform == 'darwin' and python_version > '3'", &env).unwrap());
    }

    #[test]
    fn test_extra_never_selected() {
        let env = linux();
        assert!(!evaluate("extra == 'socks'", &env).unwrap());
        assert!(evaluate("extra != 'socks'", &env).unwrap());
        assert!(!evaluate("python_version >= '3' and extra == \"test\"", &env).unwrap());
    }

    #[test]
    fn test_membership() {
        let env = linux();
        assert!(evaluate("'linux' in sys_platform", &env).unwrap());
        assert!(evaluate("sys_platform not in 'win32 cygwin'", &env).unwrap());
    }

    #[test]
    fn test_errors() {
        let env = linux();
        assert_eq!(
            evaluate("bogus_var == '1'", &env),
            Err(MarkerError::UnknownVariable("bogus_var".to_string()))
        );
        assert_eq!(
            evaluate("sys_platform == 'linux", &env),
            Err(MarkerError::UnterminatedString)
        );
        assert_eq!(evaluate("sys_platform ==", &env), Err(MarkerError::UnexpectedEnd));
        assert!(evaluate("sys_platform == 'linux' 'x'", &env).is_err());
    }
}
