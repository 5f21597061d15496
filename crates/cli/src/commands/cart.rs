//! Cart commands.
//!
//! Every command prints the resulting cart. Remote failures are not errors
//! here: the synchronizer falls back to the local cart and reports a notice.

use organic_basket_core::{CartSnapshot, Price, Product, ProductId, SyncState};
use organic_basket_storefront::checkout::{CheckoutError, PaymentMethod, ShippingAddress};
use organic_basket_storefront::{NoticeLevel, SyncOutcome};

use super::Context;

pub async fn show(ctx: &Context) {
    print_outcome(&ctx.sync.load().await);
}

pub async fn add(ctx: &Context, product: &Product, quantity: u32) {
    print_outcome(&ctx.sync.add_line(product, quantity).await);
}

pub async fn set(ctx: &Context, product_id: &ProductId, quantity: i64) {
    print_outcome(&ctx.sync.update_quantity(product_id, quantity).await);
}

pub async fn increment(ctx: &Context, product_id: &ProductId) {
    print_outcome(&ctx.sync.increment_quantity(product_id).await);
}

pub async fn decrement(ctx: &Context, product_id: &ProductId) {
    print_outcome(&ctx.sync.decrement_quantity(product_id).await);
}

pub async fn remove(ctx: &Context, product_id: &ProductId) {
    print_outcome(&ctx.sync.remove_line(product_id).await);
}

pub async fn clear(ctx: &Context) {
    print_outcome(&ctx.sync.clear().await);
}

pub async fn reload(ctx: &Context) {
    print_outcome(&ctx.sync.reload().await);
}

/// Reload the cart and print the order summary.
///
/// # Errors
///
/// Returns an error if the cart is empty, holds out-of-stock products, or the
/// coupon is unknown.
#[allow(clippy::print_stdout)]
pub async fn checkout(ctx: &Context, coupon: Option<&str>) -> Result<(), CheckoutError> {
    let (summary, outcome) = ctx.sync.prepare_checkout(coupon).await?;
    print_outcome(&outcome);
    println!();
    println!("{summary}");
    Ok(())
}

/// Place an order for the cart, then print the receipt and the emptied cart.
///
/// # Errors
///
/// Returns an error if the user is not signed in, the cart cannot be checked
/// out, the address is invalid, or the order is refused.
#[allow(clippy::print_stdout)]
pub async fn place_order(
    ctx: &Context,
    coupon: Option<&str>,
    address: &ShippingAddress,
    payment: PaymentMethod,
) -> Result<(), CheckoutError> {
    let placed = ctx
        .sync
        .place_order(&ctx.orders, coupon, address, payment)
        .await?;
    println!("Order #{} confirmed", placed.receipt.order_id);
    println!("{}", placed.summary);
    println!();
    print_outcome(&placed.cart);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_outcome(outcome: &SyncOutcome) {
    if let Some(notice) = &outcome.notice {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        println!("[{tag}] {notice}");
    }
    print_cart(&outcome.snapshot, outcome.state);
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &CartSnapshot, state: SyncState) {
    println!("Cart for {} ({state})", cart.owner);
    if cart.is_empty() {
        println!("  (empty)");
        return;
    }
    for line in &cart.lines {
        let stock = if line.stock_available == 0 {
            "  out of stock"
        } else {
            ""
        };
        println!(
            "  {:<12} {:<28} {:>3} x {:>9} = {:>10}{stock}",
            line.product_id.as_str(),
            line.name,
            line.quantity,
            Price::from_amount(line.unit_price).to_string(),
            Price::from_amount(line.line_total()).to_string(),
        );
    }
    println!(
        "  {} items, total {}",
        cart.line_count(),
        Price::from_amount(cart.total())
    );
}
