use serde::{Deserialize, Serialize};

/// Valeur numérique portée par un token `Number`. La présence d'un point
/// dans le lexème sélectionne la variante flottante.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Ponctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Opérateurs à un caractère
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Less,
    Greater,

    // Opérateurs à deux caractères
    EqualEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    // Littéraux
    Identifier(String),
    Number(Number),
    Str(String),

    // Mots-clés
    Soit,
    Si,
    Sinon,
    Pour,
    Dans,
    TantQue,
    Fonction,
    Retourner,
    Vrai,
    Faux,
    Nul,
    Et,
    Ou,

    EndOfFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}
