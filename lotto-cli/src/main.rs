mod display;
mod import;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::display::{
    display_check, display_draws, display_frequency, display_generation, display_import_summary,
    display_owner_summary, display_report, display_saved, display_summary,
};
use lotto_db::db::{count_draws, fetch_last_draws, insert_draw};
use lotto_db::models::{Combination, Draw, SessionId, BALL_MAX, BALL_MIN, PICK_COUNT};
use lotto_engine::config::AppConfig;
use lotto_engine::service::{
    new_guest_session, CheckRequest, DeleteRequest, GenerateRequest, LoginRequest, LottoService,
    SaveRequest, SignupRequest,
};
use lotto_engine::stats;

#[derive(Parser)]
#[command(name = "lotto", about = "Générateur de grilles Lotto 6/45")]
struct Cli {
    /// Fichier de configuration JSON (défaut : ./lotto.json s'il existe)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sortie JSON au lieu des tableaux
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer l'historique des tirages depuis un fichier JSON
    Import {
        /// Chemin vers l'historique
        #[arg(short, long, default_value = "data/lotto_history.json")]
        file: PathBuf,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Afficher les fréquences et le résumé chaud/froid
    Stats {
        /// Taille de l'ensemble chaud
        #[arg(long)]
        hot: Option<usize>,

        /// Taille de l'ensemble froid
        #[arg(long)]
        cold: Option<usize>,
    },

    /// Générer des grilles filtrées
    Generate {
        /// Nombre de grilles (1-100, sinon 5)
        #[arg(short, long)]
        count: Option<i64>,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Créer un compte
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Se connecter et obtenir un jeton
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Afficher le compte associé au jeton
    Me {
        #[command(flatten)]
        identity: Identity,
    },

    /// Sauvegarder une grille pour un tirage
    Save {
        /// Numéro du tirage visé
        #[arg(short, long)]
        draw: i64,

        /// Les 6 numéros
        #[arg(num_args = 6, required = true)]
        numbers: Vec<i64>,

        #[command(flatten)]
        identity: Identity,

        /// Session invitée (générée si absente)
        #[arg(long, env = "LOTTO_SESSION")]
        session: Option<String>,
    },

    /// Lister mes grilles
    My {
        #[command(flatten)]
        identity: Identity,
    },

    /// Supprimer des grilles
    Delete {
        /// Identifiants à supprimer
        ids: Vec<i64>,

        /// Tout supprimer
        #[arg(long)]
        all: bool,

        /// Restreindre `--all` à un tirage
        #[arg(short, long)]
        draw: Option<u32>,

        #[command(flatten)]
        identity: Identity,
    },

    /// Vérifier mes grilles contre un tirage
    Check {
        #[arg(short, long)]
        draw: u32,

        #[command(flatten)]
        identity: Identity,
    },

    /// Rapport de toutes les grilles d'un tirage
    Report {
        #[arg(short, long)]
        draw: u32,
    },

    /// Bilan de mes gains sur tous les tirages connus
    Summary {
        #[command(flatten)]
        identity: Identity,
    },

    /// Ajouter un tirage manuellement
    Add,
}

#[derive(clap::Args)]
struct Identity {
    /// Jeton obtenu via `lotto login`
    #[arg(long, env = "LOTTO_TOKEN")]
    token: Option<String>,
}

impl Identity {
    fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let service = LottoService::open(config)?;
    let json = cli.json;

    match cli.command {
        Command::Import { file } => {
            let result = import::import_archive(service.conn(), &file)?;
            display_import_summary(&result);
            Ok(())
        }
        Command::DbPath => {
            println!("{}", service.config().db_path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&service, last, json),
        Command::Stats { hot, cold } => cmd_stats(&service, hot, cold, json),
        Command::Generate { count, seed } => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            let request = GenerateRequest { num_combinations: count };
            let response = service.generate(&request, &mut rng)?;
            emit(json, &response, display_generation)
        }
        Command::Signup { username, email, password } => {
            let user = service.signup(&SignupRequest { username, email, password })?;
            emit(json, &user, |u| println!("Compte créé : {} (#{})", u.username, u.id))
        }
        Command::Login { email, password } => {
            let response = service.login(&LoginRequest { email, password })?;
            emit(json, &response, |r| {
                println!("Connecté en tant que {}.", r.user.username);
                println!("export LOTTO_TOKEN={}", r.token);
            })
        }
        Command::Me { identity } => {
            let user = service.me(identity.authorization().as_deref())?;
            emit(json, &user, |u| println!("{} <{}> (#{})", u.username, u.email, u.id))
        }
        Command::Save { draw, numbers, identity, session } => {
            let session = match session {
                Some(s) => SessionId(s),
                None => {
                    let s = new_guest_session(&mut rand::rng());
                    if identity.token.is_none() {
                        println!("Nouvelle session invitée : export LOTTO_SESSION={}", s);
                    }
                    s
                }
            };
            let request = SaveRequest { numbers, draw_number: draw };
            let response = service.save(identity.authorization().as_deref(), &session, &request)?;
            emit(json, &response, |r| println!("{} ({})", r.message, r.owner))
        }
        Command::My { identity } => {
            let response = service.my_combinations(identity.authorization().as_deref())?;
            emit(json, &response, |r| display_saved(&r.combinations))
        }
        Command::Delete { ids, all, draw, identity } => {
            let request = DeleteRequest {
                ids: if ids.is_empty() { None } else { Some(ids) },
                all: all.then_some(true),
                draw_number: draw,
            };
            let response = service.delete(identity.authorization().as_deref(), &request)?;
            emit(json, &response, |r| println!("{} grille(s) supprimée(s).", r.deleted_count))
        }
        Command::Check { draw, identity } => {
            let request = CheckRequest { draw_number: draw };
            let response = service.check_results(identity.authorization().as_deref(), &request)?;
            emit(json, &response, display_check)
        }
        Command::Report { draw } => {
            let report = service.draw_report(draw)?;
            emit(json, &report, display_report)
        }
        Command::Summary { identity } => {
            let summary = service.my_summary(identity.authorization().as_deref())?;
            emit(json, &summary, display_owner_summary)
        }
        Command::Add => cmd_add(&service),
    }
}

fn emit<T: Serialize>(json: bool, value: &T, display: impl FnOnce(&T)) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value).context("Échec de la sérialisation")?;
        println!("{}", out);
    } else {
        display(value);
    }
    Ok(())
}

fn cmd_list(service: &LottoService, last: u32, json: bool) -> Result<()> {
    let n = count_draws(service.conn())?;
    if n == 0 {
        println!("Base vide. Lancez d'abord : lotto import");
        return Ok(());
    }
    let draws = fetch_last_draws(service.conn(), last)?;
    emit(json, &draws, |d| display_draws(d))
}

fn cmd_stats(
    service: &LottoService,
    hot: Option<usize>,
    cold: Option<usize>,
    json: bool,
) -> Result<()> {
    let draws = service.draws()?;
    if draws.is_empty() {
        println!("Base vide. Lancez d'abord : lotto import");
        return Ok(());
    }

    let summary = service.statistics()?;
    if json {
        return emit(json, &summary, display_summary);
    }

    let config = service.config();
    let table = stats::compute_frequency(&draws);
    let classification = stats::classify(
        &table,
        hot.unwrap_or(config.generation_hot_size),
        cold.unwrap_or(config.generation_cold_size),
    );
    display_frequency(&table, &classification);
    println!();
    display_summary(&summary);
    Ok(())
}

fn cmd_add(service: &LottoService) -> Result<()> {
    println!("Ajout d'un tirage manuellement\n");

    let draw_number = prompt_number("Numéro du tirage (ex: 1118) : ")?;
    let raw_date = prompt("Date (AAAA-MM-JJ, vide si inconnue) : ")?;
    let draw_date = if raw_date.is_empty() { None } else { Some(raw_date) };

    let numbers = prompt_numbers()?;
    let draw = loop {
        let bonus = prompt_number(&format!("Complémentaire ({}-{}) : ", BALL_MIN, BALL_MAX))?;
        match Draw::new(draw_number, draw_date.clone(), numbers.numbers(), bonus) {
            Ok(draw) => break draw,
            Err(e) => println!("{}. Réessayez.", e),
        }
    };

    println!("\nTirage à insérer :");
    display_draws(std::slice::from_ref(&draw));

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() == "o" {
        let inserted = insert_draw(service.conn(), &draw)?;
        if inserted {
            println!("Tirage inséré avec succès.");
        } else {
            println!("Ce tirage existe déjà (doublon ignoré).");
        }
    } else {
        println!("Insertion annulée.");
    }

    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn prompt_number(msg: &str) -> Result<i64> {
    loop {
        match prompt(msg)?.parse::<i64>() {
            Ok(n) => return Ok(n),
            Err(_) => println!("Entrez un nombre entier. Réessayez."),
        }
    }
}

fn prompt_numbers() -> Result<Combination> {
    loop {
        let input = prompt(&format!(
            "{} numéros (séparés par des espaces, {}-{}) : ",
            PICK_COUNT, BALL_MIN, BALL_MAX
        ))?;
        let nums: Result<Vec<i64>, _> =
            input.split_whitespace().map(|s| s.parse::<i64>()).collect();
        match nums {
            Ok(v) => match Combination::new(&v) {
                Ok(combination) => return Ok(combination),
                Err(e) => println!("{}. Réessayez.", e),
            },
            Err(_) => println!("Entrez uniquement des nombres. Réessayez."),
        }
    }
}
