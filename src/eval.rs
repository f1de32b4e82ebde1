use std::collections::BTreeMap;

use crate::ast::*;
use crate::env::{Scope, ScopeStack};
use crate::host::Host;
use crate::value::{FiaMap, FunctionRef, MapKey, Value};
use crate::{ai, ml, stdlib};

use thiserror::Error;

/// Nombre maximal d'itérations exécutées par construction de boucle. Garde-fou
/// volontaire du langage, pas une limite à lever.
pub const MAX_LOOP_ITERATIONS: usize = 50;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Erreur d'exécution: {0}")]
    Msg(String),
}

/// Transfert de contrôle interne de l'évaluateur. `Return` est capté à la
/// frontière d'appel de fonction, `Halt` à la frontière du programme; ni l'un
/// ni l'autre n'est une erreur.
#[derive(Debug)]
pub enum Signal {
    Error(RuntimeError),
    Return(Value),
    Halt,
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Error(e)
    }
}

pub(crate) fn rte(msg: impl Into<String>) -> Signal {
    Signal::Error(RuntimeError::Msg(msg.into()))
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: Block,
}

pub type Builtins = BTreeMap<String, stdlib::NativeFn>;

/// Interprète par parcours d'arbre. Détient la pile de portées, le registre
/// des fonctions natives et celui des fonctions utilisateur.
pub struct Interpreter {
    scopes: ScopeStack,
    builtins: Builtins,
    functions: BTreeMap<String, FunctionDef>,
    host: Host,
}

impl Interpreter {
    pub fn new(host: Host) -> Self {
        let mut builtins = stdlib::install();
        ai::install(&mut builtins, ai::AiConfig::from_env());
        ml::install(&mut builtins);
        Self {
            scopes: ScopeStack::new(),
            builtins,
            functions: BTreeMap::new(),
            host,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Variables de la portée globale, pour l'affichage interactif.
    pub fn global_bindings(&self) -> Vec<(String, Value)> {
        self.scopes
            .global()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    /// Réinitialise variables et fonctions utilisateur; les natives restent.
    pub fn reset(&mut self) {
        self.scopes.reset();
        self.functions.clear();
    }

    /// Exécute un programme et rend la valeur de sa dernière instruction
    /// expression, s'il y en a une. Le signal d'arrêt (`arreter()`) termine
    /// proprement avec `None`.
    pub fn execute(&mut self, program: &Program) -> Result<Option<Value>, RuntimeError> {
        let mut last = None;
        for stmt in &program.statements {
            match self.exec_stmt(stmt) {
                Ok(v) => last = v,
                Err(Signal::Halt) => return Ok(None),
                Err(Signal::Return(_)) => {
                    return Err(RuntimeError::Msg(
                        "'retourner' utilisé en dehors d'une fonction".into(),
                    ))
                }
                Err(Signal::Error(e)) => return Err(e),
            }
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Option<Value>, Signal> {
        match stmt {
            Stmt::VarDecl { name, init } => {
                let value = match init {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Null,
                };
                self.scopes.define(name.clone(), value);
                Ok(None)
            }
            Stmt::Assign { target, value } => {
                let v = self.eval_expr(value)?;
                self.assign_target(target, v)?;
                Ok(None)
            }
            Stmt::CompoundAssign { target, op, value } => {
                self.compound_assign(target, *op, value)?;
                Ok(None)
            }
            Stmt::FunctionDecl { name, params, body } => {
                // une redéfinition écrase silencieusement la précédente
                self.functions.insert(
                    name.clone(),
                    FunctionDef {
                        params: params.clone(),
                        body: body.clone(),
                    },
                );
                Ok(None)
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Null,
                };
                Err(Signal::Return(v))
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_expr(cond)?.truthy() {
                    self.exec_block(then_block)?;
                } else if let Some(b) = else_block {
                    self.exec_block(b)?;
                }
                Ok(None)
            }
            Stmt::While { cond, body } => {
                let mut count = 0usize;
                loop {
                    if !self.eval_expr(cond)?.truthy() {
                        break;
                    }
                    if count == MAX_LOOP_ITERATIONS {
                        self.host
                            .print_line("Sécurité: boucle arrêtée après 50 itérations");
                        break;
                    }
                    self.exec_block(body)?;
                    count += 1;
                }
                Ok(None)
            }
            Stmt::ForClassic {
                init,
                cond,
                incr,
                body,
            } => {
                self.exec_stmt(init)?;
                let mut count = 0usize;
                loop {
                    if !self.eval_expr(cond)?.truthy() {
                        break;
                    }
                    if count == MAX_LOOP_ITERATIONS {
                        self.host
                            .print_line("Sécurité: boucle arrêtée après 50 itérations");
                        break;
                    }
                    self.exec_block(body)?;
                    self.exec_stmt(incr)?;
                    count += 1;
                }
                Ok(None)
            }
            Stmt::ForIn {
                var,
                iterable,
                body,
            } => self.exec_for_in(var, iterable, body),
            Stmt::Expr(e) => Ok(Some(self.eval_expr(e)?)),
        }
    }

    fn exec_for_in(&mut self, var: &str, iterable: &Expr, body: &Block) -> Result<Option<Value>, Signal> {
        let value = self.eval_expr(iterable)?;
        let items: Vec<Value> = match &value {
            Value::List(l) => l.borrow().clone(),
            Value::Map(m) => m.borrow().keys().map(key_to_value).collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            other => {
                return Err(rte(format!(
                    "l'objet à droite de 'dans' doit être itérable (liste, dictionnaire ou chaîne), pas {}",
                    other.type_name()
                )))
            }
        };
        // la variable de boucle vit dans une portée propre, retirée sans
        // fusion en sortie
        self.scopes.push_scope();
        let mut result = Ok(None);
        for (i, item) in items.into_iter().enumerate() {
            if i == MAX_LOOP_ITERATIONS {
                self.host
                    .print_line("Sécurité: boucle pour...dans arrêtée après 50 itérations");
                break;
            }
            self.scopes.define(var.to_string(), item);
            if let Err(sig) = self.exec_block(body) {
                result = Err(sig);
                break;
            }
        }
        self.scopes.pop_discard();
        result
    }

    /// Exécute un bloc dans une portée poussée pour sa durée, fusionnée dans
    /// la parente quoi qu'il arrive, y compris sur erreur ou `retourner`.
    fn exec_block(&mut self, block: &Block) -> Result<Option<Value>, Signal> {
        self.scopes.push_scope();
        let result = self.exec_statements(&block.statements);
        self.scopes.pop_merge();
        result
    }

    fn exec_statements(&mut self, stmts: &[Stmt]) -> Result<Option<Value>, Signal> {
        let mut last = None;
        for s in stmts {
            last = self.exec_stmt(s)?;
        }
        Ok(last)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, Signal> {
        match expr {
            Expr::Literal(lit) => Ok(self.literal_value(lit)?),
            Expr::Identifier(name) => self.eval_identifier(name),
            Expr::Binary { left, op, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.binary_op(*op, l, r)
            }
            Expr::Unary { op, operand } => {
                let v = self.eval_expr(operand)?;
                match op {
                    UnOp::Neg => match coerce_number(v) {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(rte(format!(
                            "l'opérateur unaire '-' attend un nombre, pas {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_expr(a)?);
                }
                self.call_function(callee, values)
            }
            Expr::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?;
                self.index_read(&base, &index)
            }
            Expr::Key { base, key } => {
                let base = self.eval_expr(base)?;
                let key = self.eval_expr(key)?;
                self.key_read(&base, &key)
            }
        }
    }

    /// Un littéral de conteneur produit une poignée fraîche à chaque
    /// évaluation.
    fn literal_value(&self, lit: &Literal) -> Result<Value, Signal> {
        Ok(match lit {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.literal_value(item)?);
                }
                Value::new_list(out)
            }
            Literal::Map(entries) => {
                let mut map = FiaMap::new();
                for (k, v) in entries {
                    let key = match self.literal_value(k)? {
                        Value::Str(s) => MapKey::Str(s),
                        Value::Int(n) => MapKey::Int(n),
                        Value::Bool(b) => MapKey::Bool(b),
                        other => {
                            return Err(rte(format!(
                                "clé de dictionnaire invalide: {}",
                                other.type_name()
                            )))
                        }
                    };
                    map.insert(key, self.literal_value(v)?);
                }
                Value::new_map(map)
            }
        })
    }

    /// Un nom de fonction (native ou utilisateur) prime sur une variable du
    /// même nom.
    fn eval_identifier(&mut self, name: &str) -> Result<Value, Signal> {
        if self.builtins.contains_key(name) {
            return Ok(Value::Function(FunctionRef::Builtin(name.to_string())));
        }
        if self.functions.contains_key(name) {
            return Ok(Value::Function(FunctionRef::User(name.to_string())));
        }
        self.scopes
            .get(name)
            .ok_or_else(|| rte(format!("Variable '{name}' non définie")))
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Signal> {
        if let Some(native) = self.builtins.get(name) {
            let native = native.clone();
            return native(args, &self.host);
        }
        let def = match self.functions.get(name) {
            Some(d) => d.clone(),
            None => return Err(rte(format!("fonction '{name}' non définie"))),
        };
        if args.len() != def.params.len() {
            return Err(rte(format!(
                "la fonction '{}' attend {} arguments, {} fournis",
                name,
                def.params.len(),
                args.len()
            )));
        }
        let mut locals = Scope::new();
        for (param, arg) in def.params.iter().zip(args) {
            locals.insert(param.clone(), arg);
        }
        let saved = self.scopes.enter_function(locals);
        let result = self.exec_block(&def.body);
        self.scopes.exit_function(saved);
        match result {
            // tomber au bout du corps sans 'retourner' rend nul
            Ok(_) => Ok(Value::Null),
            Err(Signal::Return(v)) => Ok(v),
            Err(other) => Err(other),
        }
    }

    fn index_read(&self, base: &Value, index: &Value) -> Result<Value, Signal> {
        let list = match base {
            Value::List(l) => l,
            other => {
                return Err(rte(format!(
                    "l'opérande gauche de l'accès par index doit être une liste, pas {}",
                    other.type_name()
                )))
            }
        };
        let i = index_position(index, list.borrow().len())?;
        Ok(list.borrow()[i].clone())
    }

    fn key_read(&self, base: &Value, key: &Value) -> Result<Value, Signal> {
        let map = match base {
            Value::Map(m) => m,
            other => {
                return Err(rte(format!(
                    "l'opérande gauche de l'accès par clé doit être un dictionnaire, pas {}",
                    other.type_name()
                )))
            }
        };
        let k = value_to_key(key)?;
        let map = map.borrow();
        map.get(&k)
            .cloned()
            .ok_or_else(|| rte(format!("Clé '{k}' non trouvée dans le dictionnaire")))
    }

    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<(), Signal> {
        match target {
            Expr::Identifier(name) => {
                if !self.scopes.contains(name) {
                    return Err(rte(format!(
                        "variable '{name}' non déclarée avant assignation"
                    )));
                }
                self.scopes.assign(name, value);
                Ok(())
            }
            Expr::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?;
                let list = match base {
                    Value::List(l) => l,
                    other => {
                        return Err(rte(format!(
                            "l'opérande gauche de l'assignation par index doit être une liste, pas {}",
                            other.type_name()
                        )))
                    }
                };
                let i = index_position(&index, list.borrow().len())?;
                list.borrow_mut()[i] = value;
                Ok(())
            }
            Expr::Key { base, key } => {
                let base = self.eval_expr(base)?;
                let key = self.eval_expr(key)?;
                let map = match base {
                    Value::Map(m) => m,
                    other => {
                        return Err(rte(format!(
                            "l'opérande gauche de l'assignation par clé doit être un dictionnaire, pas {}",
                            other.type_name()
                        )))
                    }
                };
                let k = value_to_key(&key)?;
                map.borrow_mut().insert(k, value);
                Ok(())
            }
            _ => Err(rte("cible d'assignation invalide")),
        }
    }

    fn compound_assign(&mut self, target: &Expr, op: BinOp, value: &Expr) -> Result<(), Signal> {
        match target {
            Expr::Identifier(name) => {
                if !self.scopes.contains(name) {
                    return Err(rte(format!(
                        "variable '{name}' non déclarée avant assignation composée"
                    )));
                }
                let old = self.scopes.get(name).expect("liaison vérifiée");
                let new = self.eval_expr(value)?;
                let result = apply_compound(op, old, new)?;
                self.scopes.assign(name, result);
                Ok(())
            }
            Expr::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?;
                let list = match base {
                    Value::List(l) => l,
                    other => {
                        return Err(rte(format!(
                            "l'opérande gauche de l'assignation composée par index doit être une liste, pas {}",
                            other.type_name()
                        )))
                    }
                };
                let i = index_position(&index, list.borrow().len())?;
                let old = list.borrow()[i].clone();
                let new = self.eval_expr(value)?;
                let result = apply_compound(op, old, new)?;
                list.borrow_mut()[i] = result;
                Ok(())
            }
            Expr::Key { base, key } => {
                let base = self.eval_expr(base)?;
                let key = self.eval_expr(key)?;
                let map = match base {
                    Value::Map(m) => m,
                    other => {
                        return Err(rte(format!(
                            "l'opérande gauche de l'assignation composée par clé doit être un dictionnaire, pas {}",
                            other.type_name()
                        )))
                    }
                };
                let k = value_to_key(&key)?;
                let old = map
                    .borrow()
                    .get(&k)
                    .cloned()
                    .ok_or_else(|| rte(format!("Clé '{k}' non trouvée dans le dictionnaire")))?;
                let new = self.eval_expr(value)?;
                let result = apply_compound(op, old, new)?;
                map.borrow_mut().insert(k, result);
                Ok(())
            }
            _ => Err(rte("cible d'assignation composée invalide")),
        }
    }

    fn binary_op(&mut self, op: BinOp, l: Value, r: Value) -> Result<Value, Signal> {
        match op {
            BinOp::Add => add_values(l, r),
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                arith(op, coerce_number(l), coerce_number(r))
            }
            BinOp::Eq => Ok(Value::Bool(coerce_number(l).deep_eq(&coerce_number(r)))),
            BinOp::Ne => Ok(Value::Bool(!coerce_number(l).deep_eq(&coerce_number(r)))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                compare(op, coerce_number(l), coerce_number(r))
            }
            // pas de court-circuit: les deux côtés sont déjà évalués, et la
            // valeur rendue est l'opérande brut
            BinOp::And => Ok(if !l.truthy() { l } else { r }),
            BinOp::Or => Ok(if l.truthy() { l } else { r }),
        }
    }
}

fn key_to_value(key: &MapKey) -> Value {
    match key {
        MapKey::Str(s) => Value::Str(s.clone()),
        MapKey::Int(n) => Value::Int(*n),
        MapKey::Bool(b) => Value::Bool(*b),
    }
}

pub(crate) fn value_to_key(value: &Value) -> Result<MapKey, Signal> {
    match value {
        Value::Str(s) => Ok(MapKey::Str(s.clone())),
        Value::Int(n) => Ok(MapKey::Int(*n)),
        Value::Bool(b) => Ok(MapKey::Bool(*b)),
        other => Err(rte(format!(
            "clé de dictionnaire invalide: {}",
            other.type_name()
        ))),
    }
}

fn index_position(index: &Value, len: usize) -> Result<usize, Signal> {
    let i = match index {
        Value::Int(n) => *n,
        other => {
            return Err(rte(format!(
                "l'index doit être un entier, pas {}",
                other.type_name()
            )))
        }
    };
    if i < 0 || i as usize >= len {
        return Err(rte("Index de liste hors limites"));
    }
    Ok(i as usize)
}

/// Une chaîne composée uniquement de chiffres, de '.' et de '-' est convertie
/// en nombre avant une opération arithmétique.
pub(crate) fn coerce_number(value: Value) -> Value {
    if let Value::Str(s) = &value {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
            if s.contains('.') {
                if let Ok(x) = s.parse::<f64>() {
                    return Value::Float(x);
                }
            } else if let Ok(n) = s.parse::<i64>() {
                return Value::Int(n);
            }
        }
    }
    value
}

/// `+` concatène dès qu'un des deux côtés est une chaîne, sinon additionne
/// après coercition numérique.
fn add_values(l: Value, r: Value) -> Result<Value, Signal> {
    if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
        return Ok(Value::Str(format!(
            "{}{}",
            l.to_display_string(),
            r.to_display_string()
        )));
    }
    arith(BinOp::Add, coerce_number(l), coerce_number(r))
}

fn arith(op: BinOp, l: Value, r: Value) -> Result<Value, Signal> {
    let (a, b) = match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => {
            return int_arith(op, *a, *b);
        }
        (Value::Int(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Float(a), Value::Int(b)) => (*a, *b as f64),
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        _ => {
            return Err(rte(format!(
                "opérandes numériques requis pour '{}', trouvés {} et {}",
                op_symbol(op),
                l.type_name(),
                r.type_name()
            )))
        }
    };
    float_arith(op, a, b)
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, Signal> {
    match op {
        BinOp::Add => Ok(a
            .checked_add(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 + b as f64))),
        BinOp::Sub => Ok(a
            .checked_sub(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 - b as f64))),
        BinOp::Mul => Ok(a
            .checked_mul(b)
            .map(Value::Int)
            .unwrap_or(Value::Float(a as f64 * b as f64))),
        BinOp::Div => {
            if b == 0 {
                return Err(rte("Division par zéro"));
            }
            // la division rend toujours un flottant
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(rte("Division par zéro"));
            }
            // modulo au signe du diviseur
            Ok(Value::Int(((a % b) + b) % b))
        }
        _ => unreachable!("opérateur non arithmétique"),
    }
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<Value, Signal> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                return Err(rte("Division par zéro"));
            }
            Ok(Value::Float(a / b))
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(rte("Division par zéro"));
            }
            Ok(Value::Float((a % b + b) % b))
        }
        _ => unreachable!("opérateur non arithmétique"),
    }
}

fn compare(op: BinOp, l: Value, r: Value) -> Result<Value, Signal> {
    let ordering = match (&l, &r) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        _ => None,
    };
    let Some(ord) = ordering else {
        return Err(rte(format!(
            "comparaison impossible entre {} et {}",
            l.type_name(),
            r.type_name()
        )));
    };
    let result = match op {
        BinOp::Lt => ord.is_lt(),
        BinOp::Le => ord.is_le(),
        BinOp::Gt => ord.is_gt(),
        BinOp::Ge => ord.is_ge(),
        _ => unreachable!("opérateur non relationnel"),
    };
    Ok(Value::Bool(result))
}

/// Règles des assignations composées: `+=` concatène si l'un des opérandes
/// est une chaîne, les autres opérateurs exigent des nombres.
pub(crate) fn apply_compound(op: BinOp, old: Value, new: Value) -> Result<Value, Signal> {
    match op {
        BinOp::Add => add_values(old, new),
        BinOp::Div | BinOp::Mod => {
            let old = coerce_number(old);
            let new = coerce_number(new);
            if matches!(new, Value::Int(0)) || matches!(new, Value::Float(x) if x == 0.0) {
                return Err(rte("Division par zéro dans assignation composée"));
            }
            arith(op, old, new)
        }
        BinOp::Sub | BinOp::Mul => arith(op, coerce_number(old), coerce_number(new)),
        _ => Err(rte("opérateur d'assignation composée inconnu")),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
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
