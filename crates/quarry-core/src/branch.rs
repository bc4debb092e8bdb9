//! Branch inclusion/exclusion rules.

use serde::{Deserialize, Serialize};

/// Branch restrictions declared in a build configuration.
///
/// A branch is admitted when it matches no exclude pattern and either the
/// include list is empty or one of its patterns matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl BranchFilter {
    /// A filter that admits every branch.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, branch: &str) -> bool {
        if self.exclude.iter().any(|p| glob_match(p, branch)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| glob_match(p, branch))
    }
}

/// Match `text` against a branch pattern.
///
/// `*` matches any run of characters except `/`, `**` also crosses `/`,
/// `?` matches one character other than `/`, and `[...]` is a character
/// class (`[!...]` negates, `a-z` ranges allowed).
///
/// Runs in `O(pattern * text)` time whatever the number of stars.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();
    let (p, t) = (tokens.len(), text.len());

    // matched[i][j]: tokens[i..] matches text[j..]. Filled back to front.
    let mut matched = vec![vec![false; t + 1]; p + 1];
    matched[p][t] = true;

    for i in (0..p).rev() {
        for j in (0..=t).rev() {
            matched[i][j] = match &tokens[i] {
                Token::Star { crosses } => {
                    matched[i + 1][j]
                        || (j < t && (*crosses || text[j] != '/') && matched[i][j + 1])
                }
                token => j < t && token.accepts(text[j]) && matched[i + 1][j + 1],
            };
        }
    }

    matched[0][0]
}

#[derive(Debug)]
enum Token {
    Literal(char),
    /// `?`
    Any,
    Star {
        crosses: bool,
    },
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
}

impl Token {
    /// Whether a single-character token accepts `c`.
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::Any => c != '/',
            Token::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi) != *negated
            }
            Token::Star { .. } => false,
        }
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                let crosses = chars.get(i + 1) == Some(&'*');
                tokens.push(Token::Star { crosses });
                i += if crosses { 2 } else { 1 };
            }
            '?' => {
                tokens.push(Token::Any);
                i += 1;
            }
            '[' => match parse_class(&chars[i + 1..]) {
                Some((token, consumed)) => {
                    tokens.push(token);
                    i += 1 + consumed;
                }
                // Unterminated class: treat '[' literally.
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }

    tokens
}

/// Parse the body of a `[...]` class. Returns the token and how many
/// pattern chars it used (including the closing `]`).
fn parse_class(class: &[char]) -> Option<(Token, usize)> {
    let (negated, start) = match class.first() {
        Some('!') | Some('^') => (true, 1),
        _ => (false, 0),
    };
    let mut ranges = Vec::new();
    let mut i = start;
    while i < class.len() {
        if class[i] == ']' && i > start {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        if i + 2 < class.len() && class[i + 1] == '-' && class[i + 2] != ']' {
            ranges.push((class[i], class[i + 2]));
            i += 3;
        } else {
            ranges.push((class[i], class[i]));
            i += 1;
        }
    }
    None
}
