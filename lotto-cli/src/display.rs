use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use lotto_db::models::Draw;
use lotto_engine::prize::{Tier, TierCounts};
use lotto_engine::service::{CheckResponse, DrawReport, GenerateResponse, OwnerSummary, SavedView};
use lotto_engine::stats::{Classification, FrequencyTable, StatisticsSummary};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn tier_cell(tier: Option<Tier>) -> Cell {
    match tier {
        Some(Tier::First) | Some(Tier::Second) => Cell::new(tier_label(tier)).fg(Color::Green),
        Some(_) => Cell::new(tier_label(tier)).fg(Color::Yellow),
        None => Cell::new(tier_label(tier)),
    }
}

fn tier_label(tier: Option<Tier>) -> String {
    tier.map(|t| t.to_string()).unwrap_or_else(|| "—".to_string())
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Tirage", "Date", "Numéros", "Complémentaire"]);
    for draw in draws {
        table.add_row(vec![
            draw.draw_number.to_string(),
            draw.draw_date.clone().unwrap_or_else(|| "—".to_string()),
            draw.winning_numbers.to_string(),
            format!("{:2}", draw.bonus_number),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Enregistrements lus : {}", result.total_records);
    println!("  Insérés             : {}", result.inserted);
    println!("  Doublons ignorés    : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs             : {}", result.errors);
    }
}

pub fn display_frequency(table_data: &FrequencyTable, classification: &Classification) {
    println!("\n📊 Fréquences sur {} tirages\n", table_data.draw_count());

    let mut table = new_table(vec!["Numéro", "Fréquence", "Retard", "Tag"]);
    for stat in table_data.ranked() {
        let tag = if classification.is_hot(stat.number) {
            Cell::new("chaud").fg(Color::Red)
        } else if classification.is_cold(stat.number) {
            Cell::new("froid").fg(Color::Blue)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(format!("{:2}", stat.number)),
            Cell::new(stat.frequency),
            Cell::new(stat.gap),
            tag,
        ]);
    }
    println!("{table}");

    let never: Vec<u8> = table_data
        .stats()
        .iter()
        .filter(|s| s.frequency == 0)
        .map(|s| s.number)
        .collect();
    if !never.is_empty() {
        println!("Jamais sortis : {}", join_numbers(&never));
    }
}

pub fn display_summary(summary: &StatisticsSummary) {
    println!("Tirages analysés : {}", summary.total_draws);
    println!("Numéros chauds   : {}", join_numbers(&summary.core_numbers));
    println!("Dernier tirage   : {}", join_numbers(&summary.last_week_numbers));
    println!("Numéros froids   : {}", join_numbers(&summary.exclude_numbers));
}

pub fn display_generation(response: &GenerateResponse) {
    println!("\n🎲 Grilles générées\n");

    if response.combinations.is_empty() {
        println!("Aucune grille n'a passé les filtres.");
    } else {
        let mut table = new_table(vec!["#", "Numéros", "Somme", "Chauds"]);
        for (i, combination) in response.combinations.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                combination.numbers.to_string(),
                combination.sum.to_string(),
                combination.hot_count.to_string(),
            ]);
        }
        println!("{table}");
    }

    let stats = &response.statistics;
    println!(
        "{} candidats tirés, {} retenus, taux de filtrage {}",
        stats.total_generated, stats.after_filtering, stats.filter_rate
    );
}

pub fn display_saved(combinations: &[SavedView]) {
    if combinations.is_empty() {
        println!("Aucune grille sauvegardée.");
        return;
    }

    let mut table = new_table(vec!["Id", "Tirage", "Numéros", "Créée le"]);
    for saved in combinations {
        table.add_row(vec![
            saved.id.to_string(),
            saved.draw_number.to_string(),
            saved.numbers.to_string(),
            saved.created_at.clone(),
        ]);
    }
    println!("{table}");
}

fn display_tier_counts(counts: &TierCounts) {
    let mut table = new_table(vec!["Rang", "Condition", "Grilles"]);
    for (tier, count) in counts.iter() {
        table.add_row(vec![
            tier_cell(Some(tier)),
            Cell::new(tier.condition()),
            Cell::new(count),
        ]);
    }
    println!("{table}");
}

pub fn display_check(response: &CheckResponse) {
    println!(
        "\nTirage {} : {} + {:2}\n",
        response.draw_number, response.winning_numbers, response.bonus_number
    );

    if response.results.is_empty() {
        println!("Aucune grille pour ce tirage.");
        return;
    }

    let mut table = new_table(vec!["Id", "Numéros", "Trouvés", "Compl.", "Rang"]);
    for result in &response.results {
        table.add_row(vec![
            Cell::new(result.id),
            Cell::new(result.numbers),
            Cell::new(result.matched_count),
            Cell::new(if result.bonus_matched { "oui" } else { "" }),
            tier_cell(result.prize),
        ]);
    }
    println!("{table}");
    display_tier_counts(&response.prizes);
}

pub fn display_report(report: &DrawReport) {
    println!(
        "\nTirage {} : {} + {:2}",
        report.draw_number, report.winning_numbers, report.bonus_number
    );
    println!(
        "{} grilles ({} membres, {} invités)\n",
        report.total_combinations, report.member_combinations, report.guest_combinations
    );

    if !report.combinations.is_empty() {
        let mut table = new_table(vec!["Id", "Propriétaire", "Numéros", "Trouvés", "Rang"]);
        for row in &report.combinations {
            table.add_row(vec![
                Cell::new(row.id),
                Cell::new(&row.owner),
                Cell::new(row.numbers),
                Cell::new(row.matched_count),
                tier_cell(row.prize),
            ]);
        }
        println!("{table}");
    }
    display_tier_counts(&report.prizes);
}

pub fn display_owner_summary(summary: &OwnerSummary) {
    println!("Grilles sauvegardées : {}", summary.total_combinations);
    println!("Grilles vérifiables  : {}", summary.evaluated);
    println!("Grilles gagnantes    : {}", summary.wins.winners());
    display_tier_counts(&summary.wins);
}
