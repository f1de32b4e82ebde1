#[cfg(test)]
mod tests {
    use crate::eval::RuntimeError;
    use crate::format::format_program;
    use crate::lexer::Lexer;
    use crate::value::Value;
    use crate::{Host, Interpreter, Parser};
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> crate::ast::Program {
        let tokens = Lexer::new(src).tokenize().expect("lex");
        Parser::new(tokens).parse_program().expect("parse")
    }

    /// Exécute la source sur un hôte capturant et rend la valeur finale.
    fn run(src: &str) -> Option<Value> {
        let mut interp = Interpreter::new(Host::capturing());
        interp.execute(&parse(src)).expect("exécution")
    }

    /// Exécute et rend la sortie capturée.
    fn run_output(src: &str) -> String {
        let host = Host::capturing();
        let mut interp = Interpreter::new(host.clone());
        interp.execute(&parse(src)).expect("exécution");
        host.take_output()
    }

    fn run_err(src: &str) -> RuntimeError {
        let mut interp = Interpreter::new(Host::capturing());
        interp.execute(&parse(src)).expect_err("erreur attendue")
    }

    fn assert_int(v: Option<Value>, expected: i64) {
        match v {
            Some(Value::Int(n)) => assert_eq!(n, expected),
            other => panic!("entier {expected} attendu, trouvé {other:?}"),
        }
    }

    fn assert_float(v: Option<Value>, expected: f64) {
        match v {
            Some(Value::Float(x)) => assert!((x - expected).abs() < 1e-9, "{x} != {expected}"),
            other => panic!("flottant {expected} attendu, trouvé {other:?}"),
        }
    }

    #[test]
    fn arithmetic_matches_native_evaluation() {
        assert_int(run("(3 + 4 * 2 - 1) % 5"), (3 + 4 * 2 - 1) % 5);
        assert_int(run("2 * 3 + 4 * 5"), 2 * 3 + 4 * 5);
        assert_float(run("0.5 * 4 + 1"), 0.5 * 4.0 + 1.0);
        assert_float(run("7 / 2"), 7.0 / 2.0);
        assert_int(run("-5 + 2"), -3);
        assert_int(run("--5"), 5);
    }

    #[test]
    fn increment_twice_from_ten() {
        assert_int(run("soit x = 10\nx = x + 1\nx = x + 1\nx"), 12);
    }

    #[test]
    fn assignment_to_undeclared_name_fails() {
        let e = run_err("y = 1");
        assert!(e.to_string().contains("non déclarée avant assignation"));
        let e = run_err("inconnu");
        assert!(e.to_string().contains("Variable 'inconnu' non définie"));
    }

    #[test]
    fn list_access_is_bounds_checked() {
        let e = run_err("soit l = [1, 2, 3]\nl[5]");
        assert!(e.to_string().contains("hors limites"));
        let e = run_err("soit l = [1, 2, 3]\nl[\"0\"]");
        assert!(e.to_string().contains("dictionnaire"));
        assert_int(run("soit l = [1, 2, 3]\nl[1] = 9\nl[1]"), 9);
    }

    #[test]
    fn while_true_stops_at_fifty_iterations() {
        let src = "soit n = 0\ntant_que (vrai) { n += 1 }\nn";
        assert_int(run(src), 50);
        let out = run_output(src);
        assert!(out.contains("50 itérations"));
    }

    #[test]
    fn natural_loop_end_prints_no_notice() {
        let out = run_output("soit n = 0\ntant_que (n < 3) { n += 1 }");
        assert_eq!(out, "");
    }

    #[test]
    fn classic_for_sums_and_caps() {
        assert_int(
            run("soit somme = 0\npour (soit i = 0; i < 5; i += 1) { somme += i }\nsomme"),
            10,
        );
        let src = "soit n = 0\npour (soit i = 0; vrai; i += 1) { n += 1 }\nn";
        assert_int(run(src), 50);
    }

    #[test]
    fn for_in_iterates_in_order_and_scopes_its_variable() {
        let out = run_output("pour nom dans [\"Alice\", \"Bob\"] { imprimer(nom) }");
        assert_eq!(out, "Alice\nBob\n");
        let e = run_err("pour nom dans [\"Alice\", \"Bob\"] { imprimer(nom) }\nnom");
        assert!(e.to_string().contains("'nom' non définie"));
    }

    #[test]
    fn for_in_over_map_keys_and_string_chars() {
        let out = run_output("pour k dans {\"b\": 1, \"a\": 2} { imprimer(k) }");
        assert_eq!(out, "b\na\n");
        let out = run_output("pour c dans \"oui\" { imprimer(c) }");
        assert_eq!(out, "o\nu\ni\n");
        let e = run_err("pour x dans 12 { }");
        assert!(e.to_string().contains("itérable"));
    }

    #[test]
    fn user_function_call_and_arity() {
        assert_int(run("fonction doubler(n) { retourner n * 2 }\ndoubler(21)"), 42);
        let e = run_err("fonction doubler(n) { retourner n * 2 }\ndoubler(1, 2)");
        assert!(e
            .to_string()
            .contains("la fonction 'doubler' attend 1 arguments, 2 fournis"));
        let e = run_err("absente(1)");
        assert!(e.to_string().contains("fonction 'absente' non définie"));
    }

    #[test]
    fn falling_off_a_function_yields_null() {
        let v = run("fonction rien() { 1 + 1 }\nrien()");
        assert!(matches!(v, Some(Value::Null)));
    }

    #[test]
    fn functions_do_not_close_over_call_site_scopes() {
        assert_int(
            run("soit g = 1\nfonction f() { retourner g + 1 }\nf()"),
            2,
        );
        let e = run_err(
            "fonction f() { retourner w }\nfonction h(w) { retourner f() }\nh(9)",
        );
        assert!(e.to_string().contains("'w' non définie"));
    }

    #[test]
    fn function_redefinition_overwrites_silently() {
        assert_int(
            run("fonction f() { retourner 1 }\nfonction f() { retourner 2 }\nf()"),
            2,
        );
    }

    #[test]
    fn compound_assign_concatenates_strings_and_adds_numbers() {
        match run("soit s = \"5\"\ns += 3\ns") {
            Some(Value::Str(s)) => assert_eq!(s, "53"),
            other => panic!("chaîne attendue, trouvé {other:?}"),
        }
        assert_int(run("soit n = 5\nn += 3\nn"), 8);
        assert_float(run("soit n = 10\nn /= 4\nn"), 2.5);
        let e = run_err("soit n = 1\nn /= 0");
        assert!(e.to_string().contains("Division par zéro"));
    }

    #[test]
    fn digit_strings_coerce_in_arithmetic() {
        assert_int(run("\"5\" * \"4\""), 20);
        assert_int(run("soit n = \"5\"\nn -= 2\nn"), 3);
        match run("\"a\" + 1") {
            Some(Value::Str(s)) => assert_eq!(s, "a1"),
            other => panic!("chaîne attendue, trouvé {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(run_err("1 / 0").to_string().contains("Division par zéro"));
        assert!(run_err("1 % 0").to_string().contains("Division par zéro"));
    }

    #[test]
    fn logical_operators_return_raw_operands() {
        assert_int(run("1 et 2"), 2);
        assert_int(run("0 ou 3"), 3);
        assert!(matches!(run("faux et 1"), Some(Value::Bool(false))));
        assert!(matches!(run("\"5\" == 5"), Some(Value::Bool(true))));
    }

    #[test]
    fn block_scopes_merge_into_parent_on_exit() {
        assert_int(run("si (vrai) { soit y = 41 }\ny + 1"), 42);
    }

    #[test]
    fn lists_are_shared_by_reference() {
        assert_int(run("soit a = [1]\nsoit b = a\najouter(a, 2)\nlongueur(b)"), 2);
        assert_int(
            run("soit a = [1]\nsoit c = copier(a)\najouter(a, 9)\nlongueur(c)"),
            1,
        );
        let out = run_output(
            "fonction pousser(l) { ajouter(l, 4) }\nsoit a = [1, 2, 3]\npousser(a)\nimprimer(longueur(a))",
        );
        assert_eq!(out, "4\n");
    }

    #[test]
    fn map_builtins_preserve_insertion_order() {
        let out = run_output(
            "soit d = {\"b\": 1, \"a\": 2}\nd[\"c\"] = 3\nimprimer(joindre(cles(d), \",\"))",
        );
        assert_eq!(out, "b,a,c\n");
        assert!(matches!(
            run("contient_cle({\"x\": 1}, \"x\")"),
            Some(Value::Bool(true))
        ));
        assert_int(
            run("soit d = {\"x\": 1}\nsupprimer_cle(d, \"x\")\nlongueur(d)"),
            0,
        );
        assert_int(
            run("soit d = fusionner({\"a\": 1}, {\"b\": 2})\nlongueur(d)"),
            2,
        );
        assert_int(run("soit d = {\"a\": 1}\nvider(d)\nlongueur(d)"), 0);
        let e = run_err("soit d = {\"a\": 1}\nd[\"zz\"]");
        assert!(e.to_string().contains("Clé 'zz' non trouvée"));
        assert_int(run("soit d = {\"n\": 4}\nd[\"n\"] += 2\nd[\"n\"]"), 6);
    }

    #[test]
    fn list_builtins() {
        let out = run_output("soit l = [3, 1, 2]\ntrier(l)\nimprimer(joindre(l, \"\"))");
        assert_eq!(out, "123\n");
        let out = run_output("soit l = [1, 2, 3]\ninverser(l)\nimprimer(joindre(l, \"\"))");
        assert_eq!(out, "321\n");
        assert_int(run("soit l = [1, 2, 3]\nretirer(l, 1)\nl[1]"), 3);
        assert!(matches!(run("contient([1, 2], 2)"), Some(Value::Bool(true))));
        assert_int(run("index_de([\"a\", \"b\"], \"b\")"), 1);
        assert_int(run("index_de([\"a\"], \"z\")"), -1);
        assert_int(run("compter([1, 2, 1], 1)"), 2);
        let e = run_err("trier([1, \"a\"])");
        assert!(e.to_string().contains("triée"));
    }

    #[test]
    fn string_builtins_and_conversions() {
        let out = run_output("imprimer(majuscule(\"abc\"), minuscule(\"DEF\"))");
        assert_eq!(out, "ABC def\n");
        let out = run_output("imprimer(remplacer(\"bonjour\", \"on\", \"ON\"))");
        assert_eq!(out, "bONjour\n");
        assert_int(run("longueur(diviser(\"a,b,c\", \",\"))"), 3);
        assert_int(run("entier(\"42\")"), 42);
        assert_int(run("entier(3.9)"), 3);
        assert_int(run("entier(vrai)"), 1);
        let e = run_err("entier(\"1.5x\")");
        assert!(e.to_string().contains("'entier'"));
        match run("chaine(3.5)") {
            Some(Value::Str(s)) => assert_eq!(s, "3.5"),
            other => panic!("chaîne attendue, trouvé {other:?}"),
        }
        assert_float(run("racine(16)"), 4.0);
        assert_float(run("puissance(2, 10)"), 1024.0);
        assert_float(run("arrondir(2.567, 2)"), 2.57);
        assert_int(run("longueur(\"été\")"), 3);
    }

    #[test]
    fn aleatoire_stays_in_unit_interval() {
        for _ in 0..10 {
            match run("aleatoire()") {
                Some(Value::Float(x)) => assert!((0.0..1.0).contains(&x)),
                other => panic!("flottant attendu, trouvé {other:?}"),
            }
        }
    }

    #[test]
    fn arreter_halts_without_error() {
        let host = Host::capturing();
        let mut interp = Interpreter::new(host.clone());
        let result = interp
            .execute(&parse("imprimer(1)\narreter()\nimprimer(2)"))
            .expect("l'arrêt n'est pas une erreur");
        assert!(result.is_none());
        assert_eq!(host.take_output(), "1\n");
    }

    #[test]
    fn top_level_return_is_an_error() {
        let e = run_err("retourner 1");
        assert!(e.to_string().contains("en dehors d'une fonction"));
    }

    #[test]
    fn ml_stub_trains_and_predicts() {
        let src = r#"
        soit modele = reseau_neuronal([2, 5, 1], "relu")
        apprentissage(modele, charger_jeu_de_donnees("iris"), 5)
        modele["entraine"]
        "#;
        assert!(matches!(run(src), Some(Value::Bool(true))));
        let e = run_err("soit m = reseau_neuronal([1])\npredire(m, 0.5)");
        assert!(e.to_string().contains("pas entraîné"));
    }

    #[test]
    fn ai_builtins_enforce_their_contracts() {
        let e = run_err("lister_modeles_ia(\"mistral\")");
        assert!(e.to_string().contains("Plateforme inconnue"));
        let e = run_err("appeler_ia(\"grok\", \"m\", \"bonjour\")");
        assert!(e.to_string().contains("Plateforme IA non supportée"));
        // les deux clés de statut sont toujours présentes
        assert_int(run("longueur(verifier_config_ia())"), 2);
    }

    #[test]
    fn reevaluation_of_a_program_is_deterministic() {
        let src = "soit total = 0\npour n dans [1, 2, 3] { total += n * n }\nimprimer(total)";
        let program = parse(src);
        let first = {
            let host = Host::capturing();
            Interpreter::new(host.clone()).execute(&program).expect("run");
            host.take_output()
        };
        let second = {
            let host = Host::capturing();
            Interpreter::new(host.clone()).execute(&program).expect("run");
            host.take_output()
        };
        assert_eq!(first, "14\n");
        assert_eq!(first, second);
    }

    #[test]
    fn formatted_program_reparses_and_evaluates_identically() {
        let src = r#"
        soit x = 1 + 2 * 3
        soit l = [1, -2, "a"]
        soit d = {"n": 4}
        fonction incr(n) { retourner n + 1 }
        si (x > 5) { imprimer("grand", incr(x)) } sinon { imprimer("petit") }
        pour (soit i = 0; i < 3; i += 1) { imprimer(i, l[0], d["n"]) }
        tant_que (x > 0) { x -= 1 }
        imprimer(x ou "fini")
        "#;
        let program = parse(src);
        let printed = format_program(&program);
        let reparsed = parse(&printed);
        let out_a = {
            let host = Host::capturing();
            Interpreter::new(host.clone()).execute(&program).expect("run");
            host.take_output()
        };
        let out_b = {
            let host = Host::capturing();
            Interpreter::new(host.clone())
                .execute(&reparsed)
                .unwrap_or_else(|e| panic!("ré-analyse: {e}\n---\n{printed}"));
            host.take_output()
        };
        assert_eq!(out_a, out_b);
    }
}
