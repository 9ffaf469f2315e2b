//! Swatchbook CLI - catalog reads and account management.
//!
//! # Usage
//!
//! ```bash
//! # List products
//! swatchbook products
//!
//! # Resolve an image field to a CDN URL
//! swatchbook resolve-image '{"asset": {"_ref": "image-abc-800x600-jpg"}}' --width 400
//!
//! # Subscribe, then register the same email
//! swatchbook subscribe a@example.com
//! swatchbook register a@example.com 'correct horse' --name A
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.
//! Configuration is read from the environment and `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swatchbook::Swatchbook;
use swatchbook::config::SwatchbookConfig;
use swatchbook::media::{DeviceVariant, ImageFormat};

mod commands;

#[derive(Parser)]
#[command(name = "swatchbook")]
#[command(author, version, about = "Swatchbook catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all products
    Products,
    /// Show one product by slug
    Product {
        /// Product slug
        slug: String,
    },
    /// List material groups
    Materials,
    /// Show site settings
    Settings,
    /// Resolve an image field (JSON) to URLs
    ResolveImage {
        /// Raw image field as JSON, or a plain URL string
        json: String,

        /// Output width in pixels
        #[arg(long, default_value_t = 1600)]
        width: u32,

        /// Output quality (1-100)
        #[arg(long, default_value_t = 85)]
        quality: u8,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Webp)]
        format: Format,

        /// Print only the URL for this device
        #[arg(long, value_enum)]
        variant: Option<Variant>,
    },
    /// Subscribe an email address
    Subscribe {
        email: String,
    },
    /// Register a member account
    Register {
        email: String,
        password: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Check a member's credentials
    Login {
        email: String,
        password: String,
    },
    /// Verify an email with its token
    Verify {
        token: String,
    },
    /// Change a member's password
    ChangePassword {
        email: String,
        current: String,
        new: String,
    },
    /// Deactivate an account
    Deactivate {
        email: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Webp,
    Jpg,
    Png,
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Webp => Self::Webp,
            Format::Jpg => Self::Jpg,
            Format::Png => Self::Png,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    Default,
    Mobile,
    Desktop,
}

impl From<Variant> for DeviceVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Default => Self::Default,
            Variant::Mobile => Self::Mobile,
            Variant::Desktop => Self::Desktop,
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays machine-readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "swatchbook=info,swatchbook_cli=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = SwatchbookConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");
    let app = Swatchbook::new(config)?;

    match cli.command {
        Commands::Products => commands::content::products(&app).await?,
        Commands::Product { slug } => commands::content::product(&app, &slug).await?,
        Commands::Materials => commands::content::materials(&app).await?,
        Commands::Settings => commands::content::settings(&app).await?,
        Commands::ResolveImage {
            json,
            width,
            quality,
            format,
            variant,
        } => commands::content::resolve_image(
            &app,
            &json,
            width,
            quality,
            format.into(),
            variant.map(Into::into),
        )?,
        Commands::Subscribe { email } => commands::accounts::subscribe(&app, &email).await?,
        Commands::Register {
            email,
            password,
            name,
        } => commands::accounts::register(&app, &email, &password, name.as_deref()).await?,
        Commands::Login { email, password } => {
            commands::accounts::login(&app, &email, &password).await?;
        }
        Commands::Verify { token } => commands::accounts::verify(&app, &token).await?,
        Commands::ChangePassword {
            email,
            current,
            new,
        } => commands::accounts::change_password(&app, &email, &current, &new).await?,
        Commands::Deactivate { email } => commands::accounts::deactivate(&app, &email).await?,
    }
    Ok(())
}
