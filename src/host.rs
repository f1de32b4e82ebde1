use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::ai::AiBackend;

/// Environnement d'accueil de l'interprète: là où partent les sorties et
/// d'où viennent les lectures. Par défaut, l'entrée/sortie standard; un hôte
/// capturant redirige tout vers un tampon, ce que le point d'entrée HTTP
/// exploite pour rendre la sortie du programme.
#[derive(Clone, Default)]
pub struct Host {
    capture: Option<Rc<RefCell<String>>>,
    ai: Option<Rc<dyn AiBackend>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hôte qui accumule les sorties au lieu de les écrire sur stdout.
    pub fn capturing() -> Self {
        Self {
            capture: Some(Rc::new(RefCell::new(String::new()))),
            ai: None,
        }
    }

    /// Branche le transport réseau des fonctions IA.
    pub fn with_ai_backend(mut self, backend: Rc<dyn AiBackend>) -> Self {
        self.ai = Some(backend);
        self
    }

    pub fn ai_backend(&self) -> Option<&Rc<dyn AiBackend>> {
        self.ai.as_ref()
    }

    pub fn print_line(&self, text: &str) {
        match &self.capture {
            Some(buf) => {
                let mut buf = buf.borrow_mut();
                buf.push_str(text);
                buf.push('\n');
            }
            None => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                let _ = writeln!(out, "{text}");
            }
        }
    }

    /// Lit une ligne bloquante sur l'entrée standard, sans le saut de ligne.
    /// Fin de fichier rend la chaîne vide.
    pub fn read_line(&self) -> std::io::Result<String> {
        let stdin = std::io::stdin();
        let mut line = String::new();
        let n = stdin.lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(String::new());
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Vide et rend le tampon de capture. Chaîne vide pour un hôte standard.
    pub fn take_output(&self) -> String {
        match &self.capture {
            Some(buf) => std::mem::take(&mut *buf.borrow_mut()),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_host_buffers_lines() {
        let host = Host::capturing();
        host.print_line("un");
        host.print_line("deux");
        assert_eq!(host.take_output(), "un\ndeux\n");
        assert_eq!(host.take_output(), "");
    }
}
