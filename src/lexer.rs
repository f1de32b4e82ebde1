use crate::token::{Number, Token, TokenKind};
use logos::Logos;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LexError {
    #[error("Erreur lexicale: caractère inconnu '{ch}' à la ligne {line}, colonne {column}")]
    UnknownChar { ch: char, line: usize, column: usize },
    #[error("Erreur lexicale: chaîne non terminée à la ligne {line}")]
    UnterminatedString { line: usize },
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
enum RawToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    // Les identifiants acceptent les lettres accentuées (U+00C0..U+017F)
    #[regex(r"[A-Za-zÀ-ſ_][A-Za-zÀ-ſ0-9_]*")]
    Ident,
    #[regex(r"[0-9]+(\.[0-9]*)?")]
    Number,
    #[regex(r#""[^"\n]*""#)]
    #[regex(r"'[^'\n]*'")]
    Str,

    #[regex(r"\n")]
    Newline,
    #[regex(r"#[^\n]*")]
    HashComment,
    #[regex(r"//[^\n]*")]
    SlashComment,
}

/// Analyseur lexical à passe unique. Une instance par texte source.
pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn tokenize(&self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut line = 1usize;
        let mut col = 1usize;
        let mut lex = RawToken::lexer(self.src);
        let mut last_end = 0usize;
        while let Some(res) = lex.next() {
            let span = lex.span();
            advance_over(&self.src[last_end..span.start], &mut line, &mut col);
            let slice = &self.src[span.start..span.end];
            let tok_line = line;
            let tok_col = col;
            match res {
                Ok(RawToken::Newline)
                | Ok(RawToken::HashComment)
                | Ok(RawToken::SlashComment) => {}
                Ok(raw) => {
                    let kind = classify(raw, slice);
                    tokens.push(Token::new(kind, slice, tok_line, tok_col));
                }
                Err(()) => {
                    let ch = slice.chars().next().unwrap_or('\0');
                    if ch == '"' || ch == '\'' {
                        return Err(LexError::UnterminatedString { line: tok_line });
                    }
                    return Err(LexError::UnknownChar {
                        ch,
                        line: tok_line,
                        column: tok_col,
                    });
                }
            }
            advance_over(slice, &mut line, &mut col);
            last_end = span.end;
        }
        tokens.push(Token::new(TokenKind::EndOfFile, "", line, col));
        Ok(tokens)
    }
}

fn advance_over(text: &str, line: &mut usize, col: &mut usize) {
    for ch in text.chars() {
        if ch == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
    }
}

fn classify(raw: RawToken, slice: &str) -> TokenKind {
    match raw {
        RawToken::LParen => TokenKind::LeftParen,
        RawToken::RParen => TokenKind::RightParen,
        RawToken::LBrace => TokenKind::LeftBrace,
        RawToken::RBrace => TokenKind::RightBrace,
        RawToken::LBracket => TokenKind::LeftBracket,
        RawToken::RBracket => TokenKind::RightBracket,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Dot => TokenKind::Dot,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Semicolon => TokenKind::Semicolon,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Assign => TokenKind::Assign,
        RawToken::Lt => TokenKind::Less,
        RawToken::Gt => TokenKind::Greater,
        RawToken::EqEq => TokenKind::EqualEqual,
        RawToken::Ne => TokenKind::BangEqual,
        RawToken::Le => TokenKind::LessEqual,
        RawToken::Ge => TokenKind::GreaterEqual,
        RawToken::PlusEq => TokenKind::PlusAssign,
        RawToken::MinusEq => TokenKind::MinusAssign,
        RawToken::StarEq => TokenKind::StarAssign,
        RawToken::SlashEq => TokenKind::SlashAssign,
        RawToken::PercentEq => TokenKind::PercentAssign,
        RawToken::Number => TokenKind::Number(parse_number(slice)),
        RawToken::Str => TokenKind::Str(slice[1..slice.len() - 1].to_string()),
        RawToken::Ident => keyword_or_identifier(slice),
        RawToken::Newline | RawToken::HashComment | RawToken::SlashComment => unreachable!(),
    }
}

fn parse_number(slice: &str) -> Number {
    if slice.contains('.') {
        Number::Float(slice.parse().unwrap_or(0.0))
    } else {
        match slice.parse::<i64>() {
            Ok(n) => Number::Int(n),
            Err(_) => Number::Float(slice.parse().unwrap_or(0.0)),
        }
    }
}

fn keyword_or_identifier(slice: &str) -> TokenKind {
    match slice {
        "soit" => TokenKind::Soit,
        "si" => TokenKind::Si,
        "sinon" => TokenKind::Sinon,
        "pour" => TokenKind::Pour,
        "dans" => TokenKind::Dans,
        "tant_que" => TokenKind::TantQue,
        "fonction" => TokenKind::Fonction,
        "retourner" => TokenKind::Retourner,
        "vrai" => TokenKind::Vrai,
        "faux" => TokenKind::Faux,
        "nul" => TokenKind::Nul,
        "et" => TokenKind::Et,
        "ou" => TokenKind::Ou,
        _ => TokenKind::Identifier(slice.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_declaration_and_skip_comments() {
        let got = kinds("soit x = 1 + 2; # commentaire\n// autre\nsoit y = 3");
        let want = vec![
            TokenKind::Soit,
            TokenKind::Identifier("x".into()),
            TokenKind::Assign,
            TokenKind::Number(Number::Int(1)),
            TokenKind::Plus,
            TokenKind::Number(Number::Int(2)),
            TokenKind::Semicolon,
            TokenKind::Soit,
            TokenKind::Identifier("y".into()),
            TokenKind::Assign,
            TokenKind::Number(Number::Int(3)),
            TokenKind::EndOfFile,
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn lex_compound_operators_before_single() {
        let got = kinds("x += 1 x -= 1 x *= 2 x /= 2 x %= 2 x == 1 x != 1 x <= 1 x >= 1");
        assert!(got.contains(&TokenKind::PlusAssign));
        assert!(got.contains(&TokenKind::MinusAssign));
        assert!(got.contains(&TokenKind::StarAssign));
        assert!(got.contains(&TokenKind::SlashAssign));
        assert!(got.contains(&TokenKind::PercentAssign));
        assert!(got.contains(&TokenKind::EqualEqual));
        assert!(got.contains(&TokenKind::BangEqual));
        assert!(got.contains(&TokenKind::LessEqual));
        assert!(got.contains(&TokenKind::GreaterEqual));
        assert!(!got.contains(&TokenKind::Assign));
    }

    #[test]
    fn lex_numbers_int_and_float() {
        assert_eq!(
            kinds("42 3.14"),
            vec![
                TokenKind::Number(Number::Int(42)),
                TokenKind::Number(Number::Float(3.14)),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn lex_accented_identifier() {
        assert_eq!(
            kinds("soit prénom_élève = 'Léa'"),
            vec![
                TokenKind::Soit,
                TokenKind::Identifier("prénom_élève".into()),
                TokenKind::Assign,
                TokenKind::Str("Léa".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn lex_both_quote_styles() {
        assert_eq!(
            kinds(r#""double" 'simple'"#),
            vec![
                TokenKind::Str("double".into()),
                TokenKind::Str("simple".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn lex_unterminated_string_is_an_error() {
        let err = Lexer::new("soit s = \"abc\nsoit t = 1").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
        let err = Lexer::new("'jamais fermée").tokenize().unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
    }

    #[test]
    fn lex_unknown_char_reports_position() {
        let err = Lexer::new("soit x = 1\n  @").tokenize().unwrap_err();
        assert_eq!(
            err,
            LexError::UnknownChar {
                ch: '@',
                line: 2,
                column: 3
            }
        );
    }

    #[test]
    fn lex_tracks_lines_and_columns() {
        let toks = Lexer::new("soit x = 1\nx = 2").tokenize().expect("lex");
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (1, 6));
        assert_eq!((toks[4].line, toks[4].column), (2, 1));
    }
}
