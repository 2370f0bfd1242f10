//! Record command handlers

use anyhow::Result;
use colored::*;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

use super::RecordCommands;
use crate::cli::context::{AppContext, index_to_row, read_image, row_to_index};
use crate::inventory::MatchTier;
use crate::inventory::session::{
    RecordUpdate, Registration, RegistrationKind, RegistrationOutcome, ScanOutcome, Suggestion,
    UNNAMED_EQUIPMENT, VerifyOutcome,
};
use crate::persistence::PersistenceError;

pub async fn handle_record_command(ctx: &mut AppContext, cmd: RecordCommands) -> Result<()> {
    ctx.require_workbook()?;

    match cmd {
        RecordCommands::Find { query } => {
            let result = ctx.session.find(&query)?;
            match result.primary() {
                Some(index) => {
                    println!("Match: {}", describe_tier(result.tier));
                    print_record(ctx, index).await?;
                    if result.has_duplicates() {
                        print_duplicates(&result.shadowed);
                    }
                }
                None if result.tier == MatchTier::Partial => {
                    println!("{} partial match(es) for '{}':", result.matches.len(), query.trim());
                    for &index in &result.matches {
                        let view = ctx.session.record_view(index)?;
                        println!(
                            "  row {:>4}  {}",
                            index_to_row(index),
                            view.serial.unwrap_or_default().cyan()
                        );
                    }
                }
                None => println!("{}", format!("No match for '{}'", query.trim()).yellow()),
            }
        }

        RecordCommands::Scan { code, register } => match ctx.session.scan(&code)? {
            ScanOutcome::Found {
                index,
                tier,
                duplicates,
            } => {
                println!("Match: {}", describe_tier(tier));
                print_record(ctx, index).await?;
                if !duplicates.is_empty() {
                    print_duplicates(&duplicates);
                }
            }
            ScanOutcome::NotFound {
                query,
                suggestions,
                more,
            } => {
                println!("{}", format!("'{}' is not in the sheet", query).yellow());
                print_suggestions(&suggestions, more);

                if register {
                    register_interactively(ctx, &query).await?;
                }
            }
        },

        RecordCommands::View { row } => {
            print_record(ctx, row_to_index(row)?).await?;
        }

        RecordCommands::Register {
            serial,
            location,
            observation,
            image,
        } => {
            let image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            let outcome = ctx
                .session
                .register(Registration {
                    serial,
                    location,
                    observation,
                    image,
                })
                .await?;
            print_registration(&outcome);
        }

        RecordCommands::Update {
            row,
            date,
            location,
            observations,
        } => {
            let index = row_to_index(row)?;
            ctx.session.update(
                index,
                RecordUpdate {
                    date,
                    location,
                    observations,
                },
            )?;
            ctx.save().await?;
            println!("{}", format!("Row {} updated", row).bright_green());
            print_record(ctx, index).await?;
        }

        RecordCommands::AddObservation => {
            let column = ctx.session.add_observation_slot()?;
            ctx.save().await?;
            println!("Added column {}", column.bright_green().bold());
        }

        RecordCommands::Verify { code } => match ctx.session.verify_scan(&code).await? {
            VerifyOutcome::Verified {
                index,
                column,
                at,
                persist_error,
            } => {
                println!(
                    "{} row {} ({} = {})",
                    "Verified".bright_green().bold(),
                    index_to_row(index),
                    column,
                    at.format("%d/%m/%Y %H:%M:%S")
                );
                warn_unsaved(persist_error.as_ref());
            }
            VerifyOutcome::NotFound { query, suggestions } => {
                println!("{}", format!("'{}' is not in the sheet", query).yellow());
                print_suggestions(&suggestions, 0);
            }
        },

        RecordCommands::Locations => {
            let locations = ctx.session.location_options()?;
            if locations.is_empty() {
                println!("{}", "No locations recorded".dimmed());
            }
            for location in locations {
                println!("{}", location);
            }
        }
    }

    Ok(())
}

/// Print a record with its observations and image references
pub async fn print_record(ctx: &AppContext, index: usize) -> Result<()> {
    let view = ctx.session.record_view(index)?;

    println!(
        "{} {}  {}",
        "Row".dimmed(),
        view.row_number().to_string().bold(),
        view.equipment_name.as_deref().unwrap_or(UNNAMED_EQUIPMENT).bold()
    );
    println!("  ID:           {}", view.id);
    if let Some(serial) = &view.serial {
        println!("  Serial:       {}", serial.cyan());
    }
    if let Some(location) = &view.location {
        println!("  Location:     {}", location);
    }
    if let Some(date) = &view.calibration_date {
        println!("  Calibration:  {}", date);
    }
    if let Some(verified) = view.verified.as_deref().filter(|v| !v.is_empty()) {
        println!("  Verified:     {}", verified.bright_green());
    }
    for (column, text) in &view.observations {
        if !text.trim().is_empty() {
            println!("  {}: {}", column, text);
        }
    }

    for image in ctx.session.image_refs(index).await? {
        let state = if image.stored {
            "stored".bright_green()
        } else {
            "not on this device".yellow()
        };
        println!("  {}: {} ({})", image.column, image.filename, state);
    }
    Ok(())
}

fn describe_tier(tier: MatchTier) -> ColoredString {
    match tier {
        MatchTier::ExactId => "exact ID".bright_green(),
        MatchTier::ExactSecondary => "exact serial".bright_green(),
        MatchTier::Partial => "partial".yellow(),
        MatchTier::None => "none".red(),
    }
}

fn print_duplicates(rows: &[usize]) {
    let rows: Vec<String> = rows.iter().map(|&i| index_to_row(i).to_string()).collect();
    println!(
        "{}",
        format!("Same identifier also on row(s) {}", rows.join(", ")).yellow()
    );
}

fn print_suggestions(suggestions: &[Suggestion], more: usize) {
    if suggestions.is_empty() {
        return;
    }
    println!("Did you mean:");
    for suggestion in suggestions {
        println!(
            "  row {:>4}  {}",
            index_to_row(suggestion.index),
            suggestion.serial.cyan()
        );
    }
    if more > 0 {
        println!("{}", format!("  ... and {} more", more).dimmed());
    }
}

fn print_registration(outcome: &RegistrationOutcome) {
    let verb = match outcome.kind {
        RegistrationKind::Created => "Registered",
        RegistrationKind::Updated => "Updated",
    };
    println!(
        "{} {} on row {}",
        verb.bright_green().bold(),
        outcome.serial.cyan(),
        index_to_row(outcome.index)
    );
    if let Some(image) = &outcome.image {
        println!("  Image: {}", image);
    }
    warn_unsaved(outcome.persist_error.as_ref());
}

fn warn_unsaved(error: Option<&PersistenceError>) {
    if let Some(e) = error {
        println!(
            "{}",
            format!("Changes kept in memory but not saved: {}", e).yellow()
        );
    }
}

/// Prompt for location and observation, then register `serial`
async fn register_interactively(ctx: &mut AppContext, serial: &str) -> Result<()> {
    let theme = ColorfulTheme::default();

    if !Confirm::with_theme(&theme)
        .with_prompt("Register this equipment?")
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    let serial: String = Input::with_theme(&theme)
        .with_prompt("Serial")
        .with_initial_text(serial)
        .interact_text()?;

    let mut locations = ctx.session.location_options()?;
    let location = if locations.is_empty() {
        Input::<String>::with_theme(&theme)
            .with_prompt("Location")
            .interact_text()?
    } else {
        locations.push("Other...".to_string());
        let choice = Select::with_theme(&theme)
            .with_prompt("Location")
            .items(&locations)
            .default(0)
            .interact()?;
        if choice == locations.len() - 1 {
            Input::<String>::with_theme(&theme)
                .with_prompt("Location")
                .interact_text()?
        } else {
            locations.swap_remove(choice)
        }
    };

    let observation: String = Input::with_theme(&theme)
        .with_prompt("Observation")
        .allow_empty(true)
        .interact_text()?;

    let outcome = ctx
        .session
        .register(Registration {
            serial,
            location,
            observation,
            image: None,
        })
        .await?;
    print_registration(&outcome);
    Ok(())
}
