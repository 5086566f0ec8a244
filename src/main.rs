use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match tubequeue_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be installed yet when configuration fails.
            eprintln!("tubequeue: {e} ({})", e.code());
            tracing::error!(code = %e.code(), error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}
