//! Image command handlers

use anyhow::{Context, Result};
use colored::*;

use super::{ImageCommands, ImagesCommands};
use crate::cli::commands::record::{self, RecordCommands};
use crate::cli::context::{AppContext, read_image, row_to_index};
use crate::imaging::{self, recognize_serial};
use crate::persistence::backup;

pub async fn handle_image_command(ctx: &mut AppContext, cmd: ImageCommands) -> Result<()> {
    match cmd {
        ImageCommands::AttachImage { row, file } => {
            ctx.require_workbook()?;
            let index = row_to_index(row)?;
            let bytes = read_image(&file).await?;

            let attachment = ctx.session.attach_image(index, &bytes).await?;
            ctx.save().await?;

            println!(
                "Attached {} to row {} ({})",
                attachment.filename.bright_green(),
                row,
                attachment.column
            );
            if let Some(e) = attachment.persist_error {
                println!("{}", format!("Image kept in the sheet but not stored: {}", e).yellow());
            }
        }

        ImageCommands::Ocr { file, register } => {
            ctx.require_workbook()?;
            let recognizer = ctx.recognizer()?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read image: {}", file.display()))?;
            let image = imaging::decode(&bytes)
                .with_context(|| format!("Not a PNG or JPEG image: {}", file.display()))?;

            let recognition = recognize_serial(&recognizer, &image)
                .await
                .context("Text recognition failed")?;
            let Some(recognition) = recognition else {
                println!("{}", "No serial recognized; enter it by hand".yellow());
                return Ok(());
            };

            println!(
                "Recognized {} (confidence {:.2})",
                recognition.text.cyan().bold(),
                recognition.confidence
            );
            record::handle_record_command(
                ctx,
                RecordCommands::Scan {
                    code: recognition.text,
                    register,
                },
            )
            .await?;
        }

        ImageCommands::Images(ImagesCommands::Export { output }) => {
            let path = output.unwrap_or_else(|| {
                backup::default_backup_name(chrono::Local::now().date_naive()).into()
            });
            let count = backup::export_images(ctx.session.store().gateway().as_ref(), &path).await?;
            if count == 0 {
                println!("{}", "No images to export".yellow());
            } else {
                println!("Exported {} images to {}", count, path.display().to_string().bright_green());
            }
        }

        ImageCommands::Images(ImagesCommands::Import { file }) => {
            if !file.exists() {
                anyhow::bail!("File does not exist: {}", file.display());
            }
            let count = backup::import_images(ctx.session.store().gateway().as_ref(), &file).await?;
            println!("Imported {} images", count.to_string().bright_green());
        }

        ImageCommands::Images(ImagesCommands::List) => {
            let names = ctx
                .session
                .store()
                .image_names()
                .await
                .context("Failed to list stored images")?;
            if names.is_empty() {
                println!("{}", "No stored images".dimmed());
            }
            for name in names {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
