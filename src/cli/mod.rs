pub mod analyze;
pub mod doctor;
pub mod wait;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancel `token` when Ctrl-C is received. Abort the handle once the work is done.
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        }
    })
}
