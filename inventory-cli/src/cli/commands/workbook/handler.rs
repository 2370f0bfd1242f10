//! Workbook command handlers

use anyhow::{Context, Result};
use colored::*;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;

use super::WorkbookCommands;
use crate::cli::context::{AppContext, index_to_row};
use crate::inventory::session::UNNAMED_EQUIPMENT;
use crate::inventory::types::LogicalRole;
use crate::transfer::{read_workbook_excel, write_sheet_csv, write_workbook_excel};

pub async fn handle_workbook_command(ctx: &mut AppContext, cmd: WorkbookCommands) -> Result<()> {
    match cmd {
        WorkbookCommands::Import { file } => {
            if !file.exists() {
                anyhow::bail!("File does not exist: {}", file.display());
            }
            let document = read_workbook_excel(&file)?;
            let empty = document.sheets.is_empty();

            ctx.session.import(document);
            ctx.save().await?;

            println!(
                "Imported {}",
                file.display().to_string().bright_green()
            );
            if empty {
                println!("{}", "The file has no sheets; the workbook is empty".yellow());
                return Ok(());
            }
            print_sheets(ctx);
            print_roles(ctx)?;
        }

        WorkbookCommands::Export { output, csv } => {
            ctx.require_workbook()?;
            let document = ctx.session.store().export();

            if csv {
                let sheet_name = ctx.session.store().current_sheet_name()?;
                let path = output.unwrap_or_else(|| format!("{}.csv", sheet_name).into());
                let sheet = document
                    .sheet(&sheet_name)
                    .with_context(|| format!("Sheet '{}' missing from export", sheet_name))?;
                write_sheet_csv(sheet, &path)?;
                println!("Exported sheet '{}' to {}", sheet_name, path.display().to_string().bright_green());
            } else {
                let path = output.unwrap_or_else(|| ctx.config.export.file_name.clone().into());
                write_workbook_excel(&document, &path, &ctx.config.export.default_sheet_name)?;
                println!("Exported workbook to {}", path.display().to_string().bright_green());
            }
        }

        WorkbookCommands::Sheets => {
            ctx.require_workbook()?;
            print_sheets(ctx);
        }

        WorkbookCommands::UseSheet { name } => {
            ctx.require_workbook()?;
            ctx.session.store_mut().switch_sheet(&name)?;
            ctx.save().await?;
            println!("Current sheet: {}", name.bright_green().bold());
            print_roles(ctx)?;
        }

        WorkbookCommands::Show { filter, limit } => {
            ctx.require_workbook()?;
            let indices = ctx
                .session
                .filter_by_serial(filter.as_deref().unwrap_or_default())?;

            println!(
                "{:>5}  {:<8} {:<20} {:<28} {:<24} {}",
                "Fila".bold(),
                "ID".bold(),
                "Serie".bold(),
                "Equipo".bold(),
                "Ubicacion".bold(),
                "Calibracion".bold()
            );
            for &index in indices.iter().take(limit) {
                let view = ctx.session.record_view(index)?;
                println!(
                    "{:>5}  {:<8} {:<20} {:<28} {:<24} {}",
                    index_to_row(index),
                    view.id,
                    view.serial.unwrap_or_default().cyan(),
                    view.equipment_name.as_deref().unwrap_or(UNNAMED_EQUIPMENT),
                    view.location.unwrap_or_default(),
                    view.calibration_date.unwrap_or_default().dimmed()
                );
            }

            if indices.len() > limit {
                println!("{}", format!("... {} more", indices.len() - limit).dimmed());
            }
        }

        WorkbookCommands::Status => {
            println!(
                "Database: {}",
                ctx.config.storage.database_path.display().to_string().cyan()
            );
            match ctx.restored_at {
                Some(at) => println!("Last saved: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("{}", "No stored workbook".yellow()),
            }
            if let Some(e) = &ctx.restore_error {
                println!(
                    "{}",
                    format!("Stored workbook is unreadable ({}); import or clear to replace it", e)
                        .yellow()
                );
            }

            let workbook = ctx.session.store().workbook();
            if !workbook.is_empty() {
                println!(
                    "Sheets: {}, records: {}",
                    workbook.sheets().len(),
                    workbook.total_records()
                );
                if let Some(name) = workbook.current_sheet_name() {
                    println!("Current sheet: {}", name.bright_green());
                }
            }

            let images = ctx
                .session
                .store()
                .image_names()
                .await
                .context("Failed to list stored images")?;
            println!("Stored images: {}", images.len());
        }

        WorkbookCommands::Clear { yes } => {
            let confirmed = yes
                || Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Drop the stored workbook? Images are kept.")
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Cancelled");
                return Ok(());
            }

            ctx.session
                .store_mut()
                .clear()
                .await
                .context("Failed to clear the stored workbook")?;
            println!("{}", "Stored workbook cleared".bright_green());
        }
    }

    Ok(())
}

fn print_sheets(ctx: &AppContext) {
    let workbook = ctx.session.store().workbook();
    let current = workbook.current_sheet_name();
    for sheet in workbook.sheets() {
        let marker = if Some(sheet.name()) == current { "*" } else { " " };
        println!(
            "{} {} ({} records, {} columns)",
            marker.bright_green(),
            sheet.name().bold(),
            sheet.len(),
            sheet.headers().len()
        );
    }
}

/// Show which header each role resolved to on the current sheet
fn print_roles(ctx: &AppContext) -> Result<()> {
    let store = ctx.session.store();
    let sheet = store.current_sheet()?;
    let schema = store.schema().schema(sheet.headers());

    let single = [
        (LogicalRole::Id, &schema.id),
        (LogicalRole::Serial, &schema.serial),
        (LogicalRole::EquipmentName, &schema.equipment_name),
        (LogicalRole::Location, &schema.location),
        (LogicalRole::CalibrationDate, &schema.calibration_date),
        (LogicalRole::Verified, &schema.verified),
    ];
    for (role, column) in single {
        match column {
            Some(column) => println!("  {:<18} {}", role.as_str(), column.cyan()),
            None => println!("  {:<18} {}", role.as_str(), "-".dimmed()),
        }
    }
    println!("  {:<18} {}", LogicalRole::Observation.as_str(), schema.observations.join(", ").cyan());
    println!("  {:<18} {}", LogicalRole::Image.as_str(), schema.images.join(", ").cyan());

    if schema.serial.is_none() {
        println!(
            "{}",
            "No serial column found: lookups fall back to the first column and registration is disabled"
                .yellow()
        );
    }
    Ok(())
}
