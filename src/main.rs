use anyhow::Result;
use clap::Parser;

use clicktrail::config::{Cli, Command, StaticConfig, get_config, init_config_from};
use clicktrail::system::{init_logging, install_panic_hook};

const SAMPLE_CONFIG_PATH: &str = "config.example.toml";

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Command::GenerateConfig { path } = cli.command_or_default() {
        let path = path.as_deref().unwrap_or(SAMPLE_CONFIG_PATH);
        StaticConfig::default().save_to_file(path)?;
        println!("Sample configuration written to {}", path);
        return Ok(());
    }

    init_config_from(cli.config.as_deref());
    let config = get_config();

    // guard 需要活到进程结束，否则缓冲的日志会丢失
    let _log_guard = init_logging(&config.logging);
    install_panic_hook();

    clicktrail::runtime::modes::run_server().await
}
