mod health_check;
mod send_email;
mod subscriptions;

pub use health_check::*;
pub use send_email::*;
pub use subscriptions::*;

#[derive(serde::Serialize)]
struct MessageResponse<'a> {
    message: &'a str,
}

fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
