use std::collections::BTreeMap;

use crate::value::Value;

pub type Scope = BTreeMap<String, Value>;

/// Pile ordonnée de portées, la plus interne en dernier. La recherche part de
/// la portée interne; une portée de bloc est fusionnée dans sa parente en
/// sortie, si bien que les variables déclarées dans un bloc lui survivent.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Retire la portée interne et déverse ses liaisons dans la parente.
    pub fn pop_merge(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(top) = self.scopes.pop() {
                if let Some(parent) = self.scopes.last_mut() {
                    parent.extend(top);
                }
            }
        }
    }

    /// Retire la portée interne sans fusion (portée de boucle `pour...dans`).
    pub fn pop_discard(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Déclare dans la portée interne, en écrasant une liaison du même nom.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Réassigne la liaison existante la plus interne. Renvoie `false` si le
    /// nom n'est déclaré à aucun niveau.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_string(), value);
                return true;
            }
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains_key(name))
    }

    /// Entre dans un cadre d'appel: la pile devient `[globale, locale]`. La
    /// pile précédente est rendue pour être restituée à `exit_function`.
    pub fn enter_function(&mut self, locals: Scope) -> Vec<Scope> {
        let global = self.scopes.first().cloned().unwrap_or_default();
        std::mem::replace(&mut self.scopes, vec![global, locals])
    }

    /// Restaure la pile sauvegardée en conservant la portée globale telle que
    /// l'appel l'a laissée.
    pub fn exit_function(&mut self, mut saved: Vec<Scope>) {
        if let Some(global) = self.scopes.drain(..).next() {
            if let Some(slot) = saved.first_mut() {
                *slot = global;
            }
        }
        self.scopes = saved;
    }

    pub fn global(&self) -> &Scope {
        self.scopes.first().expect("portée globale")
    }

    pub fn reset(&mut self) {
        self.scopes = vec![Scope::new()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_innermost_first() {
        let mut s = ScopeStack::new();
        s.define("x", Value::Int(1));
        s.push_scope();
        s.define("x", Value::Int(2));
        assert!(matches!(s.get("x"), Some(Value::Int(2))));
        s.pop_merge();
        // fusion: la liaison interne écrase la liaison parente
        assert!(matches!(s.get("x"), Some(Value::Int(2))));
    }

    #[test]
    fn block_bindings_survive_merge() {
        let mut s = ScopeStack::new();
        s.push_scope();
        s.define("y", Value::Int(7));
        s.pop_merge();
        assert!(matches!(s.get("y"), Some(Value::Int(7))));
    }

    #[test]
    fn discard_drops_loop_variable() {
        let mut s = ScopeStack::new();
        s.push_scope();
        s.define("n", Value::Int(0));
        s.pop_discard();
        assert!(s.get("n").is_none());
    }

    #[test]
    fn function_frame_hides_call_site_scopes() {
        let mut s = ScopeStack::new();
        s.define("g", Value::Int(1));
        s.push_scope();
        s.define("local", Value::Int(2));
        let saved = s.enter_function(Scope::new());
        assert!(s.get("g").is_some());
        assert!(s.get("local").is_none());
        s.define("g2", Value::Int(3));
        s.exit_function(saved);
        assert!(s.get("local").is_some());
    }
}
