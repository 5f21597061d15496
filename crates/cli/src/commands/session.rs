//! Guest session commands.

use organic_basket_storefront::OwnerResolver;

use super::Context;

/// Print the cart owner, optionally starting a new guest session first.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context, reset: bool) {
    if reset {
        let previous = ctx.sessions.current();
        ctx.sessions.clear();
        if let Some(previous) = previous {
            println!("Forgot guest session {previous}");
        }
    }

    let session = ctx.sessions.get_or_create_session_id();
    println!("Guest session: {session}");
    if let Some(user) = ctx.auth.current_user() {
        println!("Signed in as:  {user}");
    }
    println!("Cart owner:    {}", ctx.auth.resolve());
}
