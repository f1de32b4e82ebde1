use std::rc::Rc;

use crate::eval::{rte, Builtins, Signal};
use crate::stdlib::{arity, as_number, as_str, define};
use crate::value::{FiaMap, MapKey, Value};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 1000;

const OPENAI_MODELS: &[&str] = &[
    "gpt-5",
    "gpt-5-mini",
    "gpt-5-nano",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-3.5-turbo",
    "gpt-4-turbo",
];

const DEEPSEEK_MODELS: &[&str] = &["deepseek-chat", "deepseek-coder", "deepseek-v3"];

/// Requête transmise au transport réseau.
#[derive(Debug, Clone)]
pub struct AiRequest {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: i64,
}

/// Transport des appels IA. Le cœur de l'interprète ne fait pas de réseau:
/// l'application hôte branche ici son client, et toute défaillance remonte en
/// erreur d'exécution ordinaire.
pub trait AiBackend {
    fn complete(&self, request: &AiRequest) -> Result<String, String>;
}

/// Configuration des plateformes, lue dans l'environnement.
#[derive(Debug, Clone)]
pub struct AiConfig {
    openai_key: Option<String>,
    deepseek_key: Option<String>,
    pub deepseek_base_url: String,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            openai_key: std::env::var("OPENAI_API_KEY").ok(),
            deepseek_key: std::env::var("DEEPSEEK_API_KEY").ok(),
            deepseek_base_url: std::env::var("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string()),
        }
    }

    pub fn with_keys(openai: Option<String>, deepseek: Option<String>) -> Self {
        Self {
            openai_key: openai,
            deepseek_key: deepseek,
            deepseek_base_url: "https://api.deepseek.com/v1".to_string(),
        }
    }

    pub fn is_openai_configured(&self) -> bool {
        configured(&self.openai_key, "votre_cle_openai_ici")
    }

    pub fn is_deepseek_configured(&self) -> bool {
        configured(&self.deepseek_key, "votre_cle_deepseek_ici")
    }

    pub fn available_providers(&self) -> Vec<&'static str> {
        let mut providers = Vec::new();
        if self.is_openai_configured() {
            providers.push("openai");
        }
        if self.is_deepseek_configured() {
            providers.push("deepseek");
        }
        providers
    }

    pub fn models(&self, provider: &str) -> Result<&'static [&'static str], String> {
        match provider.to_lowercase().as_str() {
            "openai" => Ok(OPENAI_MODELS),
            "deepseek" => Ok(DEEPSEEK_MODELS),
            other => Err(format!("Plateforme inconnue: {other}")),
        }
    }

    fn check_provider(&self, provider: &str) -> Result<(), Signal> {
        match provider.to_lowercase().as_str() {
            "openai" => {
                if !self.is_openai_configured() {
                    return Err(rte("OpenAI non configuré. Vérifiez votre clé API"));
                }
                Ok(())
            }
            "deepseek" => {
                if !self.is_deepseek_configured() {
                    return Err(rte("DeepSeek non configuré. Vérifiez votre clé API"));
                }
                Ok(())
            }
            other => Err(rte(format!("Plateforme IA non supportée: {other}"))),
        }
    }
}

fn configured(key: &Option<String>, placeholder: &str) -> bool {
    key.as_deref()
        .map(|k| !k.is_empty() && k != placeholder)
        .unwrap_or(false)
}

/// Installe les quatre fonctions de passage vers l'IA, plus la génération de
/// réponse conversationnelle.
pub fn install(reg: &mut Builtins, config: AiConfig) {
    let config = Rc::new(config);

    let cfg = config.clone();
    define(reg, "appeler_ia", move |args, host| {
        arity("appeler_ia", &args, 3, 5)?;
        let provider = as_str("appeler_ia", &args[0])?.to_string();
        let model = as_str("appeler_ia", &args[1])?.to_string();
        let prompt = as_str("appeler_ia", &args[2])?.to_string();
        let temperature = match args.get(3) {
            Some(v) => as_number("appeler_ia", v)?,
            None => DEFAULT_TEMPERATURE,
        };
        let max_tokens = match args.get(4) {
            Some(v) => as_number("appeler_ia", v)? as i64,
            None => DEFAULT_MAX_TOKENS,
        };
        cfg.check_provider(&provider)?;
        let request = AiRequest {
            provider,
            model,
            prompt,
            temperature,
            max_tokens,
        };
        dispatch(host, &request)
    });

    let cfg = config.clone();
    define(reg, "generer_reponse_bot", move |args, host| {
        arity("generer_reponse_bot", &args, 3, 4)?;
        let provider = as_str("generer_reponse_bot", &args[0])?.to_string();
        let model = as_str("generer_reponse_bot", &args[1])?.to_string();
        let message = as_str("generer_reponse_bot", &args[2])?;
        let contexte = match args.get(3) {
            Some(v) => as_str("generer_reponse_bot", v)?,
            None => "",
        };
        cfg.check_provider(&provider)?;
        let prompt = format!(
            "Tu es un assistant conversationnel intelligent.\n{contexte}\n\n\
             Réponds de manière naturelle, amicale et utile au message suivant:\n\
             \"{message}\"\n\nRéponse:"
        );
        let request = AiRequest {
            provider,
            model,
            prompt,
            temperature: 0.8,
            max_tokens: 200,
        };
        dispatch(host, &request)
    });

    let cfg = config.clone();
    define(reg, "lister_plateformes_ia", move |args, _| {
        arity("lister_plateformes_ia", &args, 0, 0)?;
        let providers = cfg
            .available_providers()
            .into_iter()
            .map(|p| Value::Str(p.to_string()))
            .collect();
        Ok(Value::new_list(providers))
    });

    let cfg = config.clone();
    define(reg, "lister_modeles_ia", move |args, _| {
        arity("lister_modeles_ia", &args, 1, 1)?;
        let provider = as_str("lister_modeles_ia", &args[0])?;
        let models = cfg.models(provider).map_err(rte)?;
        Ok(Value::new_list(
            models.iter().map(|m| Value::Str(m.to_string())).collect(),
        ))
    });

    let cfg = config;
    define(reg, "verifier_config_ia", move |args, _| {
        arity("verifier_config_ia", &args, 0, 0)?;
        let mut status = FiaMap::new();
        status.insert(
            MapKey::Str("openai".into()),
            Value::Bool(cfg.is_openai_configured()),
        );
        status.insert(
            MapKey::Str("deepseek".into()),
            Value::Bool(cfg.is_deepseek_configured()),
        );
        Ok(Value::new_map(status))
    });
}

fn dispatch(host: &crate::host::Host, request: &AiRequest) -> Result<Value, Signal> {
    let backend = host
        .ai_backend()
        .ok_or_else(|| rte("Erreur lors de l'appel IA: aucun transport réseau n'est branché"))?;
    backend
        .complete(request)
        .map(Value::Str)
        .map_err(|e| rte(format!("Erreur lors de l'appel IA: {e}")))
}
