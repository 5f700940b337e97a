use anyhow::Context;
use fooddala_app::summary::render_cart;
use fooddala_app::AppContext;
use fooddala_store::app_config::Config;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fooddala_app=debug,fooddala_order=debug,fooddala_store=debug,fooddala_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting Fooddala against {}", config.api.url);

    let ctx = AppContext::build(config).await?;

    if ctx.session.is_authenticated() {
        match ctx.session.refresh_user(&*ctx.client).await {
            Ok(Some(user)) => info!("Signed in as {} ({:?})", user.name, user.role),
            Ok(None) => info!("Stored session is no longer valid"),
            Err(e) => warn!("Could not refresh session, keeping it: {}", e),
        }
    }

    let location = ctx.location.current();
    if location.is_set() {
        info!("Delivering to {}", location.address);
    } else {
        info!("No delivery location set");
    }

    let cart = ctx.cart.snapshot();
    if cart.is_empty() {
        info!("Cart is empty");
    } else {
        let bill = ctx.checkout.start().bill();
        println!("{}", render_cart(&cart, &bill));
    }

    Ok(())
}
