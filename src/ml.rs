use rand::Rng;

use crate::eval::{rte, Builtins, Signal};
use crate::stdlib::{arity, as_int, as_map, as_str, define};
use crate::value::{FiaMap, MapKey, Value};

// Simulation d'apprentissage automatique: les descripteurs de modèles sont
// des dictionnaires ordinaires et les métriques des tirages aléatoires.
// Aucune garantie de justesse numérique.

/// Installe les fonctions du module d'apprentissage simulé.
pub fn install(reg: &mut Builtins) {
    define(reg, "reseau_neuronal", |args, host| {
        arity("reseau_neuronal", &args, 1, 2)?;
        let layers = match &args[0] {
            Value::List(_) => args[0].clone(),
            _ => return Err(rte("'reseau_neuronal' attend une liste de couches")),
        };
        let activation = match args.get(1) {
            Some(v) => as_str("reseau_neuronal", v)?.to_string(),
            None => "relu".to_string(),
        };
        host.print_line(&format!(
            "Création d'un réseau neuronal: couches {}, activation {}",
            layers.to_display_string(),
            activation
        ));
        let mut model = FiaMap::new();
        model.insert(
            MapKey::Str("type".into()),
            Value::Str("reseau_neuronal".into()),
        );
        model.insert(MapKey::Str("couches".into()), layers);
        model.insert(MapKey::Str("activation".into()), Value::Str(activation));
        model.insert(MapKey::Str("entraine".into()), Value::Bool(false));
        model.insert(MapKey::Str("precision".into()), Value::Float(0.0));
        Ok(Value::new_map(model))
    });

    define(reg, "apprentissage", |args, host| {
        arity("apprentissage", &args, 2, 3)?;
        let model = as_map("apprentissage", &args[0])?;
        let epochs = match args.get(2) {
            Some(v) => as_int("apprentissage", v)?,
            None => 10,
        };
        if epochs <= 0 {
            return Err(rte("'apprentissage' attend un nombre d'époques positif"));
        }
        let precision = 0.70 + rand::thread_rng().gen::<f64>() * 0.29;
        {
            let mut m = model.borrow_mut();
            m.insert(MapKey::Str("entraine".into()), Value::Bool(true));
            m.insert(MapKey::Str("precision".into()), Value::Float(precision));
        }
        host.print_line(&format!(
            "Entraînement du modèle sur {epochs} époques: précision {precision:.3}"
        ));
        Ok(args[0].clone())
    });

    define(reg, "predire", |args, _| {
        arity("predire", &args, 2, 2)?;
        let model = as_map("predire", &args[0])?;
        require_trained("predire", model)?;
        Ok(Value::Float(rand::thread_rng().gen::<f64>()))
    });

    define(reg, "evaluer", |args, _| {
        arity("evaluer", &args, 2, 2)?;
        let model = as_map("evaluer", &args[0])?;
        require_trained("evaluer", model)?;
        let precision = model
            .borrow()
            .get(&MapKey::Str("precision".into()))
            .cloned()
            .unwrap_or(Value::Float(0.0));
        let mut metrics = FiaMap::new();
        metrics.insert(MapKey::Str("precision".into()), precision);
        metrics.insert(
            MapKey::Str("perte".into()),
            Value::Float(rand::thread_rng().gen::<f64>() * 0.5),
        );
        Ok(Value::new_map(metrics))
    });

    define(reg, "charger_jeu_de_donnees", |args, host| {
        arity("charger_jeu_de_donnees", &args, 1, 1)?;
        let path = as_str("charger_jeu_de_donnees", &args[0])?.to_string();
        host.print_line(&format!("Chargement des données depuis {path}"));
        let mut data = FiaMap::new();
        data.insert(MapKey::Str("chemin".into()), Value::Str(path));
        data.insert(MapKey::Str("donnees".into()), Value::new_list(Vec::new()));
        Ok(Value::new_map(data))
    });
}

fn require_trained(name: &str, model: &crate::value::MapRef) -> Result<(), Signal> {
    let trained = matches!(
        model.borrow().get(&MapKey::Str("entraine".into())),
        Some(Value::Bool(true))
    );
    if !trained {
        return Err(rte(format!("'{name}': le modèle n'est pas entraîné")));
    }
    Ok(())
}
