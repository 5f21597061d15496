//! Organic Basket CLI - drive the cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! ob-cli show
//!
//! # Add two jars of honey
//! ob-cli add sku-1 --name "Raw Honey" --price 10.00 --quantity 2
//!
//! # Change quantities
//! ob-cli set sku-1 5
//! ob-cli inc sku-1
//! ob-cli dec sku-1
//!
//! # Order summary with a coupon
//! ob-cli checkout --coupon ORGANIC10
//!
//! # Place the order (signed-in users only)
//! ob-cli checkout --place --payment cod --full-name "Asha Rao" \
//!     --email asha@example.com --phone 9876543210 --address "12 Market Road" \
//!     --city Pune --state Maharashtra --pincode 411001
//!
//! # Start a new guest session
//! ob-cli session --reset
//! ```
//!
//! # Environment Variables
//!
//! - `CART_API_BASE_URL` - Base URL of the cart API (required)
//! - `CART_API_TOKEN` / `CART_USER_ID` - Run as a signed-in user
//! - `CART_STORAGE_PATH` - Local storage file (default `.organic-basket/storage.json`)
//! - `SENTRY_DSN` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use organic_basket_core::{Product, ProductId};
use organic_basket_storefront::checkout::{DEFAULT_COUNTRY, PaymentMethod, ShippingAddress};
use organic_basket_storefront::config::CartClientConfig;

mod commands;

use commands::{CommandError, Context};

#[derive(Parser)]
#[command(name = "ob-cli")]
#[command(author, version, about = "Organic Basket cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and show the cart
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: ProductId,

        /// Product name, used if the cart has to be updated offline
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Image reference
        #[arg(long, default_value = "")]
        image: String,

        /// Units in stock
        #[arg(long, default_value_t = 1)]
        stock: u32,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line (0 or less removes it)
    Set {
        /// Product ID
        product_id: ProductId,

        /// New quantity
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Add one to a line
    Inc {
        /// Product ID
        product_id: ProductId,
    },
    /// Take one from a line
    Dec {
        /// Product ID
        product_id: ProductId,
    },
    /// Remove a line
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
    /// Re-fetch the cart from the server
    Reload,
    /// Reload the cart and show the order summary, or place the order
    Checkout {
        /// Coupon code
        #[arg(short, long)]
        coupon: Option<String>,

        /// Submit the order and clear the cart once it is accepted
        #[arg(long)]
        place: bool,

        #[command(flatten)]
        order: OrderArgs,
    },
    /// Show the guest session ID
    Session {
        /// Forget the current guest session and start a new one
        #[arg(long)]
        reset: bool,
    },
}

/// Delivery and payment details for `checkout --place`.
#[derive(Args)]
struct OrderArgs {
    /// Payment method: card, upi, netbanking or cod
    #[arg(long, default_value = "card")]
    payment: PaymentMethod,

    /// Recipient name
    #[arg(long, default_value = "")]
    full_name: String,

    /// Contact email
    #[arg(long, default_value = "")]
    email: String,

    /// Contact phone (10 digits)
    #[arg(long, default_value = "")]
    phone: String,

    /// Street address
    #[arg(long, default_value = "")]
    address: String,

    /// City
    #[arg(long, default_value = "")]
    city: String,

    /// State
    #[arg(long, default_value = "")]
    state: String,

    /// Postal code (6 digits)
    #[arg(long, default_value = "")]
    pincode: String,

    /// Country
    #[arg(long, default_value = DEFAULT_COUNTRY)]
    country: String,
}

impl OrderArgs {
    fn shipping_address(self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            pincode: self.pincode,
            country: self.country,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to warn so cart output is not buried in logs
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "organic_basket_storefront=warn,ob_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);
    init_tracing();

    let result = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartClientConfig) -> Result<(), CommandError> {
    let ctx = Context::from_config(config)?;

    match cli.command {
        Commands::Show => commands::cart::show(&ctx).await,
        Commands::Add {
            product_id,
            name,
            price,
            image,
            stock,
            quantity,
        } => {
            let product = Product {
                id: product_id,
                name,
                unit_price: price,
                image_ref: image,
                stock_available: stock,
            };
            commands::cart::add(&ctx, &product, quantity).await;
        }
        Commands::Set {
            product_id,
            quantity,
        } => commands::cart::set(&ctx, &product_id, quantity).await,
        Commands::Inc { product_id } => commands::cart::increment(&ctx, &product_id).await,
        Commands::Dec { product_id } => commands::cart::decrement(&ctx, &product_id).await,
        Commands::Remove { product_id } => commands::cart::remove(&ctx, &product_id).await,
        Commands::Clear => commands::cart::clear(&ctx).await,
        Commands::Reload => commands::cart::reload(&ctx).await,
        Commands::Checkout {
            coupon,
            place: false,
            ..
        } => commands::cart::checkout(&ctx, coupon.as_deref()).await?,
        Commands::Checkout {
            coupon,
            place: true,
            order,
        } => {
            let payment = order.payment;
            let address = order.shipping_address();
            commands::cart::place_order(&ctx, coupon.as_deref(), &address, payment).await?;
        }
        Commands::Session { reset } => commands::session::show(&ctx, reset),
    }
    Ok(())
}
