use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keywords, identifiers, `*`, numbers and other bare words
    Query,
    /// `=`, `!=`, `<>`, `<`, `<=`, `>`, `>=` (and any other run of operator chars)
    Operator,
    /// Single-quoted literal with the quotes stripped
    Text,
    Comment,
    BlockStart,
    BlockEnd,
    ArrayDelimiter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
}

impl Token {
    pub fn new(kind: TokenKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn query(content: impl Into<String>) -> Self {
        Self::new(TokenKind::Query, content)
    }

    pub fn operator(content: impl Into<String>) -> Self {
        Self::new(TokenKind::Operator, content)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(TokenKind::Text, content)
    }

    /// True for a `Query` token matching `keyword` case-insensitively.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Query && self.content.eq_ignore_ascii_case(keyword)
    }
}

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '=' | '!' | '<' | '>')
}

pub struct SqlLexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl SqlLexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_comment_start(&self) -> bool {
        matches!(
            (self.current_char, self.peek()),
            (Some('-'), Some('-')) | (Some('/'), Some('*'))
        )
    }

    fn read_line_comment(&mut self) -> Token {
        self.advance(); // skip -
        self.advance(); // skip -
        let mut body = String::new();
        while let Some(ch) = self.current_char {
            if ch == '\n' {
                self.advance();
                break;
            }
            body.push(ch);
            self.advance();
        }
        Token::new(TokenKind::Comment, body.trim())
    }

    fn read_block_comment(&mut self) -> Token {
        self.advance(); // skip /
        self.advance(); // skip *
        let mut body = String::new();
        while let Some(ch) = self.current_char {
            if ch == '*' && self.peek() == Some('/') {
                self.advance();
                self.advance();
                break;
            }
            body.push(ch);
            self.advance();
        }
        Token::new(TokenKind::Comment, body.trim())
    }

    fn read_text(&mut self) -> DbResult<Token> {
        let start = self.position;
        self.advance(); // skip opening quote

        let mut text = String::new();
        while let Some(ch) = self.current_char {
            if ch == '\'' {
                if self.peek() == Some('\'') {
                    text.push('\'');
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(Token::text(text));
                }
            } else {
                text.push(ch);
                self.advance();
            }
        }

        Err(DbError::UnterminatedText(format!(
            "text literal starting at position {} is never closed",
            start
        )))
    }

    fn read_operator(&mut self) -> Token {
        let mut op = String::new();
        while let Some(ch) = self.current_char {
            if is_operator_char(ch) {
                op.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::operator(op)
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_whitespace()
                || is_operator_char(ch)
                || matches!(ch, '\'' | '(' | ')' | ',')
                || self.at_comment_start()
            {
                break;
            }
            word.push(ch);
            self.advance();
        }
        Token::query(word)
    }

    /// Returns the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> DbResult<Option<Token>> {
        self.skip_whitespace();

        let token = match self.current_char {
            None => return Ok(None),
            Some('-') if self.peek() == Some('-') => self.read_line_comment(),
            Some('/') if self.peek() == Some('*') => self.read_block_comment(),
            Some('\'') => self.read_text()?,
            Some('(') => {
                self.advance();
                Token::new(TokenKind::BlockStart, "(")
            }
            Some(')') => {
                self.advance();
                Token::new(TokenKind::BlockEnd, ")")
            }
            Some(',') => {
                self.advance();
                Token::new(TokenKind::ArrayDelimiter, ",")
            }
            Some(ch) if is_operator_char(ch) => self.read_operator(),
            Some(_) => self.read_word(),
        };

        Ok(Some(token))
    }

    pub fn tokenize(&mut self) -> DbResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Tokenizes `input` into a flat token sequence.
pub fn tokenize(input: &str) -> DbResult<Vec<Token>> {
    SqlLexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        tokenize(input).unwrap()
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            lex("select * from table"),
            vec![
                Token::query("select"),
                Token::query("*"),
                Token::query("from"),
                Token::query("table"),
            ]
        );
    }

    #[test]
    fn test_escaped_quotes() {
        let tokens = lex("select * from t where a = 'a string with ''string'' content'");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Text);
        assert_eq!(last.content, "a string with 'string' content");
    }

    #[test]
    fn test_empty_text() {
        let tokens = lex("''");
        assert_eq!(tokens, vec![Token::text("")]);
    }

    #[test]
    fn test_operators() {
        for op in ["=", "!=", "<>", "<", "<=", ">", ">="] {
            assert_eq!(lex(op), vec![Token::operator(op)]);
        }
    }

    #[test]
    fn test_operator_splits_words() {
        assert_eq!(
            lex("age>=18"),
            vec![
                Token::query("age"),
                Token::operator(">="),
                Token::query("18"),
            ]
        );
    }

    #[test]
    fn test_blocks_and_delimiters() {
        let kinds: Vec<TokenKind> = lex("('A',b)").into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::BlockStart,
                TokenKind::Text,
                TokenKind::ArrayDelimiter,
                TokenKind::Query,
                TokenKind::BlockEnd,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens = lex("select -- pick everything\n* /* all\nrows */ from t");
        assert_eq!(
            tokens,
            vec![
                Token::query("select"),
                Token::new(TokenKind::Comment, "pick everything"),
                Token::query("*"),
                Token::new(TokenKind::Comment, "all\nrows"),
                Token::query("from"),
                Token::query("t"),
            ]
        );
    }

    #[test]
    fn test_negative_number_is_not_a_comment() {
        assert_eq!(
            lex("x = -5"),
            vec![Token::query("x"), Token::operator("="), Token::query("-5")]
        );
    }

    #[test]
    fn test_dotted_identifier() {
        assert_eq!(lex("t.name"), vec![Token::query("t.name")]);
    }

    #[test]
    fn test_multiline() {
        let tokens = lex("select *\n  from t\n  where a = 1");
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn test_unterminated_text() {
        let err = tokenize("select * from t where a = 'open").unwrap_err();
        assert!(matches!(err, DbError::UnterminatedText(_)));
    }

    #[test]
    fn test_is_keyword() {
        assert!(Token::query("SELECT").is_keyword("select"));
        assert!(!Token::text("select").is_keyword("select"));
    }
}
