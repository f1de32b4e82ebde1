use fia::format::format_program;
use fia::lexer::Lexer;
use fia::parser::Parser;
use fia::{FiaError, Host, Interpreter};
use std::{fs, path::PathBuf};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut repl = false;
    let mut serve: Option<String> = None;
    let mut file: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-r" | "--repl" => repl = true,
            "-s" | "--serve" => {
                serve = Some(args.next().unwrap_or_else(|| "127.0.0.1:5000".to_string()));
            }
            path => {
                file = Some(PathBuf::from(path));
            }
        }
    }

    if let Some(addr) = serve {
        let runtime = tokio::runtime::Runtime::new().expect("démarrage du runtime");
        if let Err(e) = runtime.block_on(fia::server::serve(&addr)) {
            eprintln!("Erreur serveur: {e}");
            std::process::exit(1);
        }
        return;
    }

    let mut interp = Interpreter::new(Host::new());

    if let Some(ref path) = file {
        if !path.exists() {
            eprintln!("Erreur: le fichier '{}' n'existe pas.", path.display());
            std::process::exit(66);
        }
        let src = fs::read_to_string(path).expect("lecture du fichier");
        run_source(&src, &mut interp);
    }

    if repl || file.is_none() {
        run_repl(&mut interp);
    }
}

fn run_source(src: &str, interp: &mut Interpreter) {
    match parse(src) {
        Ok(program) => {
            if let Err(e) = interp.execute(&program) {
                eprintln!("{e}");
                std::process::exit(70);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(65);
        }
    }
}

fn parse(src: &str) -> Result<fia::ast::Program, FiaError> {
    let tokens = Lexer::new(src).tokenize()?;
    Ok(Parser::new(tokens).parse_program()?)
}

fn run_repl(interp: &mut Interpreter) {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new().expect("initialisation du REPL");
    println!("F-IA v0.2 — REPL interactif. Ctrl-D pour sortir.");
    println!("Commandes spéciales: .aide, .variables, .reset, .quitter");
    loop {
        match rl.readline("f-ia> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();
                if line.starts_with('.') {
                    if !special_command(line, interp) {
                        break;
                    }
                    continue;
                }
                run_line(line, interp);
            }
            Err(ReadlineError::Interrupted) => { /* Ctrl-C: nouvelle ligne */ }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Erreur REPL: {e}");
                break;
            }
        }
    }
    println!("Au revoir !");
}

/// Exécute une ligne en conservant l'état de l'interprète, avec les traces de
/// tokens et d'arbre syntaxique.
fn run_line(line: &str, interp: &mut Interpreter) {
    let tokens = match Lexer::new(line).tokenize() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
    println!("tokens: {kinds:?}");
    match Parser::new(tokens).parse_program() {
        Ok(program) => {
            println!("ast:\n{}", format_program(&program));
            match interp.execute(&program) {
                Ok(Some(v)) => println!("=> {v}"),
                Ok(None) => {}
                Err(e) => eprintln!("{e}"),
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}

/// Rend `false` quand la commande demande de quitter.
fn special_command(command: &str, interp: &mut Interpreter) -> bool {
    match command {
        ".aide" => {
            println!("Exemples F-IA:");
            println!("  soit liste = [1, 2, 3]");
            println!("  longueur(liste)");
            println!("  soit x = 10");
            println!("  x = x + 1");
            println!("  si (x > 5) {{ imprimer(\"grand\") }}");
            println!("  tant_que (x < 20) {{ x += 1 }}");
            println!("  pour nom dans [\"Alice\", \"Bob\"] {{ imprimer(nom) }}");
            println!("  fonction doubler(n) {{ retourner n * 2 }}");
            println!("  soit d = {{\"clé\": 1}}; imprimer(d[\"clé\"])");
        }
        ".variables" => {
            let bindings = interp.global_bindings();
            if bindings.is_empty() {
                println!("Aucune variable globale");
            } else {
                println!("Variables globales:");
                for (name, value) in bindings {
                    println!("  {name} = {value}");
                }
            }
            let functions = interp.function_names();
            if functions.is_empty() {
                println!("Aucune fonction définie");
            } else {
                println!("Fonctions définies:");
                for name in functions {
                    println!("  {name}");
                }
            }
        }
        ".reset" => {
            interp.reset();
            println!("Variables et fonctions réinitialisées");
        }
        ".quitter" => return false,
        other => println!("Commande spéciale inconnue: {other}"),
    }
    true
}

fn print_help() {
    println!("F-IA - langage de script francophone\n");
    println!("Usage: fia [options] [fichier.fia]\n");
    println!("Options:");
    println!("  -r, --repl          Lance le REPL interactif");
    println!("  -s, --serve [addr]  Expose POST /executer (défaut 127.0.0.1:5000)");
    println!("  -h, --help          Affiche cette aide");
}
