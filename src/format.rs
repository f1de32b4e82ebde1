use crate::ast::*;
use crate::value::format_float;

/// Réimprime un programme sous forme source. La sortie se ré-analyse en un
/// arbre équivalent, ce qui sert aussi de trace lisible dans le REPL.
pub fn format_program(p: &Program) -> String {
    let mut out = String::new();
    for (i, s) in p.statements.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        fmt_stmt(s, 0, &mut out);
    }
    out
}

fn indent(n: usize, out: &mut String) {
    for _ in 0..n {
        out.push_str("    ");
    }
}

fn fmt_stmt(s: &Stmt, ind: usize, out: &mut String) {
    indent(ind, out);
    match s {
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            out.push_str("si (");
            fmt_expr(cond, 0, out);
            out.push_str(") ");
            fmt_block(then_block, ind, out);
            if let Some(b) = else_block {
                out.push_str(" sinon ");
                fmt_block(b, ind, out);
            }
        }
        Stmt::While { cond, body } => {
            out.push_str("tant_que (");
            fmt_expr(cond, 0, out);
            out.push_str(") ");
            fmt_block(body, ind, out);
        }
        Stmt::ForClassic {
            init,
            cond,
            incr,
            body,
        } => {
            out.push_str("pour (");
            fmt_stmt_inline(init, out);
            out.push_str("; ");
            fmt_expr(cond, 0, out);
            out.push_str("; ");
            fmt_stmt_inline(incr, out);
            out.push_str(") ");
            fmt_block(body, ind, out);
        }
        Stmt::ForIn {
            var,
            iterable,
            body,
        } => {
            out.push_str("pour ");
            out.push_str(var);
            out.push_str(" dans ");
            fmt_expr(iterable, 0, out);
            out.push(' ');
            fmt_block(body, ind, out);
        }
        Stmt::FunctionDecl { name, params, body } => {
            out.push_str("fonction ");
            out.push_str(name);
            out.push('(');
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(p);
            }
            out.push_str(") ");
            fmt_block(body, ind, out);
        }
        other => fmt_stmt_inline(other, out),
    }
}

/// Formes d'instruction tenant sur une ligne, utilisées aussi dans l'en-tête
/// d'une boucle `pour` classique.
fn fmt_stmt_inline(s: &Stmt, out: &mut String) {
    match s {
        Stmt::VarDecl { name, init } => {
            out.push_str("soit ");
            out.push_str(name);
            if let Some(e) = init {
                out.push_str(" = ");
                fmt_expr(e, 0, out);
            }
        }
        Stmt::Assign { target, value } => {
            fmt_expr(target, 0, out);
            out.push_str(" = ");
            fmt_expr(value, 0, out);
        }
        Stmt::CompoundAssign { target, op, value } => {
            fmt_expr(target, 0, out);
            out.push(' ');
            out.push_str(op_text(*op));
            out.push_str("= ");
            fmt_expr(value, 0, out);
        }
        Stmt::Return(value) => {
            out.push_str("retourner");
            if let Some(e) = value {
                out.push(' ');
                fmt_expr(e, 0, out);
            }
        }
        Stmt::Expr(e) => fmt_expr(e, 0, out),
        nested => fmt_stmt(nested, 0, out),
    }
}

fn fmt_block(b: &Block, ind: usize, out: &mut String) {
    out.push_str("{\n");
    for s in &b.statements {
        fmt_stmt(s, ind + 1, out);
        out.push('\n');
    }
    indent(ind, out);
    out.push('}');
}

fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 5,
    }
}

/// `min_prec` est la précédence exigée par le contexte: une expression moins
/// liante est mise entre parenthèses pour préserver l'arbre au ré-analysage.
fn fmt_expr(e: &Expr, min_prec: u8, out: &mut String) {
    match e {
        Expr::Literal(lit) => fmt_literal(lit, out),
        Expr::Identifier(name) => out.push_str(name),
        Expr::Binary { left, op, right } => {
            let prec = precedence(*op);
            let parens = prec < min_prec;
            if parens {
                out.push('(');
            }
            fmt_expr(left, prec, out);
            out.push(' ');
            out.push_str(binop_text(*op));
            out.push(' ');
            // opérande droit au cran supérieur: l'associativité est à gauche
            fmt_expr(right, prec + 1, out);
            if parens {
                out.push(')');
            }
        }
        Expr::Unary { op: UnOp::Neg, operand } => {
            out.push('-');
            fmt_expr(operand, 6, out);
        }
        Expr::Call { callee, args } => {
            out.push_str(callee);
            out.push('(');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_expr(a, 0, out);
            }
            out.push(')');
        }
        Expr::Index { base, index } => {
            fmt_expr(base, 7, out);
            out.push('[');
            fmt_expr(index, 0, out);
            out.push(']');
        }
        Expr::Key { base, key } => {
            fmt_expr(base, 7, out);
            out.push('[');
            fmt_expr(key, 0, out);
            out.push(']');
        }
    }
}

fn fmt_literal(lit: &Literal, out: &mut String) {
    match lit {
        Literal::Null => out.push_str("nul"),
        Literal::Bool(true) => out.push_str("vrai"),
        Literal::Bool(false) => out.push_str("faux"),
        Literal::Int(n) => out.push_str(&n.to_string()),
        Literal::Float(x) => out.push_str(&format_float(*x)),
        Literal::Str(s) => {
            // pas d'échappement dans le langage: on choisit le guillemet libre
            if s.contains('"') {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            } else {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
        }
        Literal::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_literal(item, out);
            }
            out.push(']');
        }
        Literal::Map(entries) => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_literal(k, out);
                out.push_str(": ");
                fmt_literal(v, out);
            }
            out.push('}');
        }
    }
}

fn binop_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "et",
        BinOp::Or => "ou",
    }
}

fn op_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        _ => "",
    }
}
