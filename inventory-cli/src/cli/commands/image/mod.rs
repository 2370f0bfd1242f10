//! Photo commands: attachments, text recognition and image backups

mod handler;

pub use handler::handle_image_command;

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum ImageCommands {
    /// Attach a photo to a row's first free image slot
    AttachImage {
        row: usize,
        file: PathBuf,
    },

    /// Read a serial number from a photo, then look it up
    Ocr {
        file: PathBuf,

        /// Offer to register the equipment when nothing matches
        #[arg(short, long)]
        register: bool,
    },

    /// Back up or restore stored images
    #[command(subcommand)]
    Images(ImagesCommands),
}

#[derive(Subcommand, Debug)]
pub enum ImagesCommands {
    /// Write every stored image into a zip archive
    Export {
        /// Archive path (defaults to backup_imagenes_<date>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load images from a zip archive
    Import {
        file: PathBuf,
    },

    /// List stored images
    List,
}
