//! # Login Profile 主程序
//!
//! 加载配置并启动 OAuth2 登录服务

use clap::Parser;
use std::path::PathBuf;

use login_profile::{
    Result,
    config::{ConfigManager, resolve_config_path},
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    server::LoginServer,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "login-profile", version, about = "OAuth2 login completion service")]
struct Args {
    /// 配置文件路径
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 默认日志级别（`RUST_LOG` 优先）
    #[arg(long)]
    log_level: Option<String>,

    /// 打印日志配置说明后退出
    #[arg(long)]
    logging_help: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.logging_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_logging(args.log_level.as_deref());

    let config_path = resolve_config_path(args.config);
    let config = ConfigManager::from_file(&config_path)?.into_config();

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        config_path = %config_path.display()
    );

    let server = LoginServer::new(config)?;
    if let Err(e) = server.serve().await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
