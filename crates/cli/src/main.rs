use std::sync::Arc;

use anyhow::Result;
use skritt_core::error::StepError;
use skritt_core::step::Step;
use skritt_core::{Config, Logging};
use tracing::error;

mod pipe;

use pipe::PipeStep;

fn main() -> Result<()> {
    let config = Config::load()?;
    let logging = Logging::init(&config.logging)?;

    let code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(Arc::clone(&logging)));

    logging.shutdown();
    std::process::exit(code)
}

async fn async_main(logging: Arc<Logging>) -> i32 {
    let mut step = PipeStep::new(logging, std::env::args().skip(1));
    match step.invoke().await {
        Ok(code) => code,
        Err(StepError::Arguments(e)) => {
            // Help and version requests print to stdout and exit 0
            let _ = e.print();
            e.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}
