use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<FiaMap>>;

/// Valeur dynamique du langage. Les listes et dictionnaires sont partagés par
/// référence: cloner la valeur clone la poignée, pas le contenu.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Map(MapRef),
    Function(FunctionRef),
}

/// Référence de fonction, résolue par nom au moment de l'appel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRef {
    Builtin(String),
    User(String),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::Builtin(n) | FunctionRef::User(n) => n,
        }
    }
}

/// Clé de dictionnaire: chaîne ou scalaire (entier, booléen).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Display for MapKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MapKey::Str(s) => write!(f, "{s}"),
            MapKey::Int(n) => write!(f, "{n}"),
            MapKey::Bool(b) => write!(f, "{}", if *b { "vrai" } else { "faux" }),
        }
    }
}

impl MapKey {
    /// Forme affichée dans un littéral de dictionnaire (chaînes entre guillemets).
    fn quoted(&self) -> String {
        match self {
            MapKey::Str(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

/// Dictionnaire mutable conservant l'ordre d'insertion des clés.
#[derive(Debug, Clone, Default)]
pub struct FiaMap {
    entries: Vec<(MapKey, Value)>,
}

impl FiaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Remplace la valeur en place si la clé existe (la position est
    /// conservée), sinon ajoute l'entrée en fin.
    pub fn insert(&mut self, key: MapKey, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MapKey, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_map(map: FiaMap) -> Value {
        Value::Map(Rc::new(RefCell::new(map)))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
            Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "nul",
            Value::Bool(_) => "booléen",
            Value::Int(_) => "entier",
            Value::Float(_) => "flottant",
            Value::Str(_) => "chaîne",
            Value::List(_) => "liste",
            Value::Map(_) => "dictionnaire",
            Value::Function(_) => "fonction",
        }
    }

    /// Texte brut de la valeur: les chaînes sans guillemets, le reste comme
    /// `Display`. C'est la forme utilisée par `imprimer`, `chaine` et la
    /// concaténation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Égalité structurelle, sans coercition numérique des chaînes.
    /// Les entiers et flottants de même valeur sont égaux.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.deep_eq(w)).unwrap_or(false))
            }
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "nul"),
            Value::Bool(b) => write!(f, "{}", if *b { "vrai" } else { "faux" }),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::List(l) => {
                let parts: Vec<String> = l.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.quoted(), v))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Function(r) => write!(f, "<fonction {}>", r.name()),
        }
    }
}

/// Un flottant de valeur entière garde une décimale pour rester distinct de
/// l'entier à l'affichage.
pub(crate) fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_handles_alias() {
        let a = Value::new_list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(l) = &a {
            l.borrow_mut().push(Value::Int(2));
        }
        if let Value::List(l) = &b {
            assert_eq!(l.borrow().len(), 2);
        } else {
            panic!("poignée attendue");
        }
    }

    #[test]
    fn map_preserves_insertion_order() {
        let mut m = FiaMap::new();
        m.insert(MapKey::Str("b".into()), Value::Int(1));
        m.insert(MapKey::Str("a".into()), Value::Int(2));
        m.insert(MapKey::Str("b".into()), Value::Int(3));
        let keys: Vec<String> = m.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(matches!(m.get(&MapKey::Str("b".into())), Some(Value::Int(3))));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Str("a".into()).to_string(), "\"a\"");
        assert_eq!(Value::Str("a".into()).to_display_string(), "a");
        assert_eq!(Value::Bool(true).to_string(), "vrai");
        assert_eq!(Value::Null.to_string(), "nul");
        let l = Value::new_list(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(l.to_string(), "[1, \"x\"]");
    }

    #[test]
    fn loose_numeric_equality() {
        assert!(Value::Int(1).deep_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).deep_eq(&Value::Str("1".into())));
    }
}
