use anyhow::Result;
use log::error;
use speciminer::cli::ShellCommands;

#[tokio::main(flavor = "multi_thread", worker_threads = 3)]
async fn main() -> Result<()> {
    env_logger::init();
    match ShellCommands.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("fatal: {e}");
            std::process::exit(1);
        }
    }
}
