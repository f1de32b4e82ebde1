use std::rc::Rc;

use rand::Rng;

use crate::eval::{rte, value_to_key, Builtins, Signal};
use crate::host::Host;
use crate::value::{FiaMap, MapKey, Value};

pub type NativeFn = Rc<dyn Fn(Vec<Value>, &Host) -> Result<Value, Signal>>;

/// Construit le registre des fonctions natives de base. Les modules IA et ML
/// y ajoutent ensuite leurs propres entrées.
pub fn install() -> Builtins {
    let mut reg = Builtins::new();

    define(&mut reg, "imprimer", |args, host| {
        let parts: Vec<String> = args.iter().map(|v| v.to_display_string()).collect();
        host.print_line(&parts.join(" "));
        Ok(Value::Null)
    });

    define(&mut reg, "longueur", |args, _| {
        arity("longueur", &args, 1, 1)?;
        let n = match &args[0] {
            Value::Str(s) => s.chars().count(),
            Value::List(l) => l.borrow().len(),
            Value::Map(m) => m.borrow().len(),
            _ => return Err(rte("'longueur' attend une liste, chaîne ou dictionnaire")),
        };
        Ok(Value::Int(n as i64))
    });

    define(&mut reg, "arrondir", |args, _| {
        arity("arrondir", &args, 1, 2)?;
        let n = as_number("arrondir", &args[0])?;
        let decimals = match args.get(1) {
            Some(v) => as_int("arrondir", v)?,
            None => 0,
        };
        let factor = 10f64.powi(decimals as i32);
        Ok(Value::Float((n * factor).round() / factor))
    });

    define(&mut reg, "aleatoire", |args, _| {
        arity("aleatoire", &args, 0, 0)?;
        Ok(Value::Float(rand::thread_rng().gen::<f64>()))
    });

    define(&mut reg, "racine", |args, _| {
        arity("racine", &args, 1, 1)?;
        let n = as_number("racine", &args[0])?;
        if n < 0.0 {
            return Err(rte("'racine' attend un nombre positif"));
        }
        Ok(Value::Float(n.sqrt()))
    });

    define(&mut reg, "puissance", |args, _| {
        arity("puissance", &args, 2, 2)?;
        let base = as_number("puissance", &args[0])?;
        let exp = as_number("puissance", &args[1])?;
        Ok(Value::Float(base.powf(exp)))
    });

    define(&mut reg, "entier", |args, _| {
        arity("entier", &args, 1, 1)?;
        match &args[0] {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => Ok(Value::Int(*x as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| rte("'entier' ne peut pas convertir cette valeur")),
            _ => Err(rte("'entier' ne peut pas convertir cette valeur")),
        }
    });

    define(&mut reg, "chaine", |args, _| {
        arity("chaine", &args, 1, 1)?;
        Ok(Value::Str(args[0].to_display_string()))
    });

    // Dictionnaires

    define(&mut reg, "cles", |args, _| {
        arity("cles", &args, 1, 1)?;
        let m = as_map("cles", &args[0])?;
        let keys = m
            .borrow()
            .keys()
            .map(|k| match k {
                MapKey::Str(s) => Value::Str(s.clone()),
                MapKey::Int(n) => Value::Int(*n),
                MapKey::Bool(b) => Value::Bool(*b),
            })
            .collect();
        Ok(Value::new_list(keys))
    });

    define(&mut reg, "valeurs", |args, _| {
        arity("valeurs", &args, 1, 1)?;
        let m = as_map("valeurs", &args[0])?;
        let values = m.borrow().values().cloned().collect();
        Ok(Value::new_list(values))
    });

    define(&mut reg, "contient_cle", |args, _| {
        arity("contient_cle", &args, 2, 2)?;
        let m = as_map("contient_cle", &args[0])?;
        let key = value_to_key(&args[1])?;
        Ok(Value::Bool(m.borrow().contains_key(&key)))
    });

    define(&mut reg, "supprimer_cle", |args, _| {
        arity("supprimer_cle", &args, 2, 2)?;
        let m = as_map("supprimer_cle", &args[0])?;
        let key = value_to_key(&args[1])?;
        m.borrow_mut().remove(&key);
        Ok(args[0].clone())
    });

    define(&mut reg, "fusionner", |args, _| {
        arity("fusionner", &args, 2, 2)?;
        let a = as_map("fusionner", &args[0])?;
        let b = as_map("fusionner", &args[1])?;
        let mut merged = FiaMap::new();
        for (k, v) in a.borrow().iter() {
            merged.insert(k.clone(), v.clone());
        }
        for (k, v) in b.borrow().iter() {
            merged.insert(k.clone(), v.clone());
        }
        Ok(Value::new_map(merged))
    });

    define(&mut reg, "vider", |args, _| {
        arity("vider", &args, 1, 1)?;
        let m = as_map("vider", &args[0])?;
        m.borrow_mut().clear();
        Ok(args[0].clone())
    });

    // Listes

    define(&mut reg, "ajouter", |args, _| {
        arity("ajouter", &args, 2, 2)?;
        let l = as_list("ajouter", &args[0])?;
        l.borrow_mut().push(args[1].clone());
        Ok(args[0].clone())
    });

    define(&mut reg, "retirer", |args, _| {
        arity("retirer", &args, 2, 2)?;
        let l = as_list("retirer", &args[0])?;
        let i = match &args[1] {
            Value::Int(n) => *n,
            _ => return Err(rte("index invalide dans 'retirer'")),
        };
        let len = l.borrow().len();
        if i < 0 || i as usize >= len {
            return Err(rte("index invalide dans 'retirer'"));
        }
        l.borrow_mut().remove(i as usize);
        Ok(args[0].clone())
    });

    define(&mut reg, "trier", |args, _| {
        arity("trier", &args, 1, 1)?;
        let l = as_list("trier", &args[0])?;
        {
            let items = l.borrow();
            let numeric = items
                .iter()
                .all(|v| matches!(v, Value::Int(_) | Value::Float(_)));
            let textual = items.iter().all(|v| matches!(v, Value::Str(_)));
            if !numeric && !textual {
                return Err(rte("la liste ne peut pas être triée"));
            }
        }
        l.borrow_mut().sort_by(|a, b| match (a, b) {
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => number_of(a)
                .partial_cmp(&number_of(b))
                .unwrap_or(std::cmp::Ordering::Equal),
        });
        Ok(args[0].clone())
    });

    define(&mut reg, "inverser", |args, _| {
        arity("inverser", &args, 1, 1)?;
        let l = as_list("inverser", &args[0])?;
        l.borrow_mut().reverse();
        Ok(args[0].clone())
    });

    define(&mut reg, "copier", |args, _| {
        arity("copier", &args, 1, 1)?;
        let l = as_list("copier", &args[0])?;
        let copy = l.borrow().clone();
        Ok(Value::new_list(copy))
    });

    define(&mut reg, "contient", |args, _| {
        arity("contient", &args, 2, 2)?;
        let l = as_list("contient", &args[0])?;
        let found = l.borrow().iter().any(|v| v.deep_eq(&args[1]));
        Ok(Value::Bool(found))
    });

    define(&mut reg, "index_de", |args, _| {
        arity("index_de", &args, 2, 2)?;
        let l = as_list("index_de", &args[0])?;
        let pos = l.borrow().iter().position(|v| v.deep_eq(&args[1]));
        Ok(Value::Int(pos.map(|p| p as i64).unwrap_or(-1)))
    });

    define(&mut reg, "compter", |args, _| {
        arity("compter", &args, 2, 2)?;
        let l = as_list("compter", &args[0])?;
        let n = l.borrow().iter().filter(|v| v.deep_eq(&args[1])).count();
        Ok(Value::Int(n as i64))
    });

    // Chaînes

    define(&mut reg, "majuscule", |args, _| {
        arity("majuscule", &args, 1, 1)?;
        let s = as_str("majuscule", &args[0])?;
        Ok(Value::Str(s.to_uppercase()))
    });

    define(&mut reg, "minuscule", |args, _| {
        arity("minuscule", &args, 1, 1)?;
        let s = as_str("minuscule", &args[0])?;
        Ok(Value::Str(s.to_lowercase()))
    });

    define(&mut reg, "remplacer", |args, _| {
        arity("remplacer", &args, 3, 3)?;
        let s = as_str("remplacer", &args[0])?;
        let from = args[1].to_display_string();
        let to = args[2].to_display_string();
        Ok(Value::Str(s.replace(&from, &to)))
    });

    define(&mut reg, "diviser", |args, _| {
        arity("diviser", &args, 2, 2)?;
        let s = as_str("diviser", &args[0])?;
        let sep = args[1].to_display_string();
        if sep.is_empty() {
            return Err(rte("'diviser' attend un séparateur non vide"));
        }
        let parts = s
            .split(sep.as_str())
            .map(|p| Value::Str(p.to_string()))
            .collect();
        Ok(Value::new_list(parts))
    });

    define(&mut reg, "joindre", |args, _| {
        arity("joindre", &args, 2, 2)?;
        let l = as_list("joindre", &args[0])?;
        let sep = args[1].to_display_string();
        let parts: Vec<String> = l.borrow().iter().map(|v| v.to_display_string()).collect();
        Ok(Value::Str(parts.join(&sep)))
    });

    // Entrées/sorties et arrêt

    define(&mut reg, "lire", |args, host| {
        arity("lire", &args, 0, 0)?;
        host.read_line()
            .map(Value::Str)
            .map_err(|e| rte(format!("'lire' a échoué: {e}")))
    });

    define(&mut reg, "arreter", |args, _| {
        arity("arreter", &args, 0, 0)?;
        Err(Signal::Halt)
    });

    reg
}

pub(crate) fn define(
    reg: &mut Builtins,
    name: &str,
    f: impl Fn(Vec<Value>, &Host) -> Result<Value, Signal> + 'static,
) {
    reg.insert(name.to_string(), Rc::new(f));
}

/// Vérifie le nombre d'arguments d'une fonction native.
pub(crate) fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Signal> {
    if args.len() < min || args.len() > max {
        let attendu = if min == max {
            format!("{min}")
        } else {
            format!("{min} à {max}")
        };
        return Err(rte(format!(
            "la fonction '{}' attend {} arguments, {} fournis",
            name,
            attendu,
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn as_number(name: &str, v: &Value) -> Result<f64, Signal> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(x) => Ok(*x),
        _ => Err(rte(format!("'{name}' attend un nombre"))),
    }
}

pub(crate) fn as_int(name: &str, v: &Value) -> Result<i64, Signal> {
    match v {
        Value::Int(n) => Ok(*n),
        _ => Err(rte(format!("'{name}' attend un entier"))),
    }
}

pub(crate) fn as_str<'a>(name: &str, v: &'a Value) -> Result<&'a str, Signal> {
    match v {
        Value::Str(s) => Ok(s),
        _ => Err(rte(format!("'{name}' attend une chaîne"))),
    }
}

pub(crate) fn as_list<'a>(name: &str, v: &'a Value) -> Result<&'a crate::value::ListRef, Signal> {
    match v {
        Value::List(l) => Ok(l),
        _ => Err(rte(format!("'{name}' attend une liste"))),
    }
}

pub(crate) fn as_map<'a>(name: &str, v: &'a Value) -> Result<&'a crate::value::MapRef, Signal> {
    match v {
        Value::Map(m) => Ok(m),
        _ => Err(rte(format!("'{name}' attend un dictionnaire"))),
    }
}

fn number_of(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => 0.0,
    }
}
