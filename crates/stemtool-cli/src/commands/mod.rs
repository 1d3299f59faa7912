pub mod config;
pub mod doctor;
pub mod download;
pub mod separate;
pub mod transpose;

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use stemtool_core::Envelope;
use tracing::error;

/// Run an envelope-producing command, turning errors and panics into a
/// failure envelope so stdout always carries a well-formed result.
pub async fn guarded<F>(command: F) -> Envelope
where
    F: Future<Output = anyhow::Result<Envelope>>,
{
    match AssertUnwindSafe(command).catch_unwind().await {
        Ok(Ok(envelope)) => envelope,
        Ok(Err(e)) => {
            error!("{:#}", e);
            Envelope::failure(format!("{:#}", e))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Unexpected internal error: {}", message);
            Envelope::failure(format!("Unexpected error: {}", message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
