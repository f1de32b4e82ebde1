use crate::ast::*;
use crate::token::{Number, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Erreur de syntaxe: fin de fichier inattendue")]
    Eof,
    #[error("Erreur de syntaxe: symbole inattendu '{found}' à la ligne {line}, colonne {column}")]
    Unexpected {
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Erreur de syntaxe: attendu {expected}, trouvé '{found}' à la ligne {line}, colonne {column}")]
    Expected {
        expected: &'static str,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Erreur de syntaxe: littéral non constant à la ligne {line}, colonne {column}")]
    NonConstantLiteral { line: usize, column: usize },
    #[error("Erreur de syntaxe: cible d'assignation invalide à la ligne {line}, colonne {column}")]
    InvalidAssignTarget { line: usize, column: usize },
}

/// Analyseur syntaxique par descente récursive sur la séquence de tokens.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.statement()?);
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::Soit => self.var_decl(),
            TokenKind::Fonction => self.function_decl(),
            TokenKind::Retourner => self.return_stmt(),
            TokenKind::Si => self.if_stmt(),
            TokenKind::TantQue => self.while_stmt(),
            TokenKind::Pour => self.for_stmt(),
            _ => self.expression_or_assignment(),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // soit
        let name = self.consume_ident("un nom de variable")?;
        let init = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.expression()?)
        } else {
            None
        };
        self.optional(&TokenKind::Semicolon);
        Ok(Stmt::VarDecl { name, init })
    }

    fn function_decl(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // fonction
        let name = self.consume_ident("un nom de fonction")?;
        self.consume(&TokenKind::LeftParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            params.push(self.consume_ident("un nom de paramètre")?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                params.push(self.consume_ident("un nom de paramètre")?);
            }
        }
        self.consume(&TokenKind::RightParen, "')'")?;
        let body = self.block()?;
        Ok(Stmt::FunctionDecl { name, params, body })
    }

    fn return_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // retourner
        let value = if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RightBrace) {
            None
        } else {
            Some(self.expression()?)
        };
        self.optional(&TokenKind::Semicolon);
        Ok(Stmt::Return(value))
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // si
        self.consume(&TokenKind::LeftParen, "'('")?;
        let cond = self.expression()?;
        self.consume(&TokenKind::RightParen, "')'")?;
        let then_block = self.block()?;
        let else_block = if self.check(&TokenKind::Sinon) {
            self.advance();
            Some(self.block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // tant_que
        self.consume(&TokenKind::LeftParen, "'('")?;
        let cond = self.expression()?;
        self.consume(&TokenKind::RightParen, "')'")?;
        let body = self.block()?;
        Ok(Stmt::While { cond, body })
    }

    /// `pour (init; cond; incr) { }` ou `pour nom dans expr { }`, selon le
    /// token qui suit `pour`.
    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // pour
        match self.peek_kind() {
            TokenKind::LeftParen => {
                self.advance();
                // le terminateur optionnel de l'instruction d'initialisation
                // tient lieu de premier ';'
                let init = Box::new(self.statement()?);
                let cond = self.expression()?;
                self.consume(&TokenKind::Semicolon, "';'")?;
                let incr = Box::new(self.statement()?);
                self.consume(&TokenKind::RightParen, "')'")?;
                let body = self.block()?;
                Ok(Stmt::ForClassic {
                    init,
                    cond,
                    incr,
                    body,
                })
            }
            TokenKind::Identifier(_) => {
                let var = self.consume_ident("la variable de boucle")?;
                self.consume(&TokenKind::Dans, "'dans'")?;
                let iterable = self.expression()?;
                let body = self.block()?;
                Ok(Stmt::ForIn {
                    var,
                    iterable,
                    body,
                })
            }
            _ => Err(self.error_expected("'(' ou une variable de boucle")),
        }
    }

    /// Analyse une expression complète puis regarde le token suivant: `=`
    /// produit une assignation, un opérateur composé une assignation
    /// composée, sinon l'expression devient une instruction.
    fn expression_or_assignment(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        let stmt = match self.peek_kind() {
            TokenKind::Assign => {
                self.advance();
                let target = self.check_assign_target(expr)?;
                let value = self.expression()?;
                Stmt::Assign { target, value }
            }
            TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::PercentAssign => {
                let op = match self.peek_kind() {
                    TokenKind::PlusAssign => BinOp::Add,
                    TokenKind::MinusAssign => BinOp::Sub,
                    TokenKind::StarAssign => BinOp::Mul,
                    TokenKind::SlashAssign => BinOp::Div,
                    TokenKind::PercentAssign => BinOp::Mod,
                    _ => unreachable!(),
                };
                self.advance();
                let target = self.check_assign_target(expr)?;
                let value = self.expression()?;
                Stmt::CompoundAssign { target, op, value }
            }
            _ => Stmt::Expr(expr),
        };
        self.optional(&TokenKind::Semicolon);
        Ok(stmt)
    }

    fn check_assign_target(&self, expr: Expr) -> Result<Expr, ParseError> {
        match expr {
            Expr::Identifier(_) | Expr::Index { .. } | Expr::Key { .. } => Ok(expr),
            _ => {
                let t = self.previous_or_peek();
                Err(ParseError::InvalidAssignTarget {
                    line: t.0,
                    column: t.1,
                })
            }
        }
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        self.consume(&TokenKind::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.consume(&TokenKind::RightBrace, "'}'")?;
        Ok(Block { statements })
    }

    // Expressions, de la précédence la plus faible à la plus forte.

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and_expr()?;
        while self.check(&TokenKind::Ou) {
            self.advance();
            let right = self.and_expr()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinOp::Or,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.check(&TokenKind::Et) {
            self.advance();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinOp::And,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqualEqual => BinOp::Eq,
                TokenKind::BangEqual => BinOp::Ne,
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEqual => BinOp::Le,
                TokenKind::Greater => BinOp::Gt,
                TokenKind::GreaterEqual => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Minus) {
            self.advance();
            // récursif à droite, pour --x
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    /// Appels et accès `[...]` en boucle sur l'expression primaire. Un indice
    /// qui est une chaîne littérale produit un accès par clé, tout autre
    /// indice un accès par index.
    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.check(&TokenKind::LeftParen) {
                let callee = match expr {
                    Expr::Identifier(name) => name,
                    _ => return Err(self.error_expected("un nom de fonction avant '('")),
                };
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RightParen) {
                    args.push(self.expression()?);
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        args.push(self.expression()?);
                    }
                }
                self.consume(&TokenKind::RightParen, "')'")?;
                expr = Expr::Call { callee, args };
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let inner = self.expression()?;
                self.consume(&TokenKind::RightBracket, "']'")?;
                expr = if matches!(inner, Expr::Literal(Literal::Str(_))) {
                    Expr::Key {
                        base: Box::new(expr),
                        key: Box::new(inner),
                    }
                } else {
                    Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(inner),
                    }
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().cloned().ok_or(ParseError::Eof)?;
        match token.kind {
            TokenKind::Number(Number::Int(n)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            TokenKind::Number(Number::Float(x)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(x)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Vrai => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::Faux => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Nul => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier(name))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.list_literal(),
            TokenKind::LeftBrace => self.map_literal(),
            _ => Err(self.error_unexpected()),
        }
    }

    /// Les éléments d'un littéral de liste sont repliés en valeurs littérales
    /// dès l'analyse; une expression non constante est une erreur.
    fn list_literal(&mut self) -> Result<Expr, ParseError> {
        self.advance(); // '['
        let mut items = Vec::new();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                let expr = self.expression()?;
                items.push(self.fold_literal(expr)?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.consume(&TokenKind::RightBracket, "']'")?;
        Ok(Expr::Literal(Literal::List(items)))
    }

    fn map_literal(&mut self) -> Result<Expr, ParseError> {
        self.advance(); // '{'
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key_expr = self.expression()?;
                let key = self.fold_literal(key_expr)?;
                match key {
                    Literal::Str(_) | Literal::Int(_) | Literal::Bool(_) => {}
                    _ => return Err(self.error_non_constant()),
                }
                self.consume(&TokenKind::Colon, "':'")?;
                let value_expr = self.expression()?;
                let value = self.fold_literal(value_expr)?;
                entries.push((key, value));
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.consume(&TokenKind::RightBrace, "'}'")?;
        Ok(Expr::Literal(Literal::Map(entries)))
    }

    fn fold_literal(&self, expr: Expr) -> Result<Literal, ParseError> {
        match expr {
            Expr::Literal(lit) => Ok(lit),
            Expr::Unary {
                op: UnOp::Neg,
                operand,
            } => match self.fold_literal(*operand)? {
                Literal::Int(n) => Ok(Literal::Int(-n)),
                Literal::Float(x) => Ok(Literal::Float(-x)),
                _ => Err(self.error_non_constant()),
            },
            _ => Err(self.error_non_constant()),
        }
    }

    // Utilitaires

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::EndOfFile)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> &TokenKind {
        self.peek().map(|t| &t.kind).unwrap_or(&TokenKind::EndOfFile)
    }

    fn advance(&mut self) -> Option<&Token> {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        self.tokens.get(self.pos - 1)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        kind_eq(self.peek_kind(), kind)
    }

    fn optional(&mut self, kind: &TokenKind) {
        if self.check(kind) {
            self.advance();
        }
    }

    fn consume(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            return Ok(());
        }
        Err(self.error_expected(expected))
    }

    fn consume_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        if let TokenKind::Identifier(name) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        Err(self.error_expected(expected))
    }

    fn previous_or_peek(&self) -> (usize, usize) {
        let t = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .or_else(|| self.peek());
        t.map(|t| (t.line, t.column)).unwrap_or((0, 0))
    }

    fn error_unexpected(&self) -> ParseError {
        match self.peek() {
            Some(t) if !matches!(t.kind, TokenKind::EndOfFile) => ParseError::Unexpected {
                found: t.text.clone(),
                line: t.line,
                column: t.column,
            },
            _ => ParseError::Eof,
        }
    }

    fn error_expected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(t) if !matches!(t.kind, TokenKind::EndOfFile) => ParseError::Expected {
                expected,
                found: t.text.clone(),
                line: t.line,
                column: t.column,
            },
            _ => ParseError::Eof,
        }
    }

    fn error_non_constant(&self) -> ParseError {
        let (line, column) = self.previous_or_peek();
        ParseError::NonConstantLiteral { line, column }
    }
}

/// Deux kinds sont équivalents s'ils ont le même discriminant; les variantes
/// porteuses (identifiant, nombre, chaîne) se reconnaissent entre elles quel
/// que soit leur contenu.
fn kind_eq(a: &TokenKind, b: &TokenKind) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
