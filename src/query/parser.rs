use crate::error::EngineError;
use std::fmt;

/// The parse tree for a boolean query. Leaves carry the raw pre-analysis
/// string; phrase leaves carry the interior of the quotes verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Term(String),
    Phrase(String),
    Not(Box<QueryNode>),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term(term) => write!(f, "{term}"),
            QueryNode::Phrase(phrase) => write!(f, "\"{phrase}\""),
            QueryNode::Not(child) => write!(f, "NOT {child}"),
            QueryNode::And(left, right) => write!(f, "({left} AND {right})"),
            QueryNode::Or(left, right) => write!(f, "({left} OR {right})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Phrase(String),
    Word(String),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::And => "'AND'".to_string(),
            TokenKind::Or => "'OR'".to_string(),
            TokenKind::Not => "'NOT'".to_string(),
            TokenKind::Phrase(p) => format!("phrase \"{p}\""),
            TokenKind::Word(w) => format!("'{w}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

/// Tokenize the query into operators, parentheses, phrases, and words,
/// keeping the character offset of each token for error reporting. Operator
/// keywords are case-sensitive uppercase; lowercase `and` is a search term.
fn tokenize(input: &str) -> Result<Vec<Token>, EngineError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    position,
                });
                chars.next();
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    position,
                });
                chars.next();
            }
            '"' => {
                chars.next(); // consume the opening quote
                let mut phrase = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    phrase.push(c);
                }
                if !closed {
                    return Err(EngineError::parse(position, "unterminated phrase"));
                }
                tokens.push(Token {
                    kind: TokenKind::Phrase(phrase),
                    position,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let kind = match word.as_str() {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    _ => TokenKind::Word(word),
                };
                tokens.push(Token { kind, position });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek()?.clone();
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            return true;
        }
        false
    }

    // Or := And ( "OR" And )*    left-associative
    fn parse_or(&mut self) -> Result<QueryNode, EngineError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = QueryNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // And := Not ( "AND" Not )*    left-associative
    fn parse_and(&mut self) -> Result<QueryNode, EngineError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = QueryNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // Not := "NOT" Not | Primary    right-associative
    fn parse_not(&mut self) -> Result<QueryNode, EngineError> {
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(QueryNode::Not(Box::new(operand)));
        }
        self.parse_primary()
    }

    // Primary := "(" Or ")" | Phrase | Term
    fn parse_primary(&mut self) -> Result<QueryNode, EngineError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::LParen,
                position,
            }) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(node),
                    Some(token) => Err(EngineError::parse(
                        token.position,
                        format!("expected ')', found {}", token.kind.describe()),
                    )),
                    None => Err(EngineError::parse(position, "unmatched '('")),
                }
            }
            Some(Token {
                kind: TokenKind::Phrase(phrase),
                ..
            }) => Ok(QueryNode::Phrase(phrase)),
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => Ok(QueryNode::Term(word)),
            Some(token) => Err(EngineError::parse(
                token.position,
                format!("unexpected {}", token.kind.describe()),
            )),
            None => Err(EngineError::parse(self.end, "unexpected end of query")),
        }
    }
}

/// Parse a boolean query into its operator tree. Malformed input fails with
/// a `ParseError` carrying the offending character position; no partial tree
/// is returned.
pub fn parse_query(input: &str) -> Result<QueryNode, EngineError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EngineError::parse(0, "empty query"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let node = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        return Err(EngineError::parse(
            token.position,
            format!("unexpected trailing {}", token.kind.describe()),
        ));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    include!("parser_tests.rs");
}
