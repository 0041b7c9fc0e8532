use anyhow::{Context, Result};
use book_batch_fetcher::utils::logging;
use book_batch_fetcher::{Config, JobManager, JobState};
use std::fs;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load();
    logging::log_startup(&config);

    // 读取书单文件
    let raw_text = match fs::read_to_string(&config.book_list_file) {
        Ok(text) => text,
        Err(_) => {
            warn!("⚠️ 没有找到书单文件 {}，程序结束", config.book_list_file);
            warn!("💡 请在该文件中按 \"书名 by 作者\" 的格式每行填写一本书");
            return Ok(());
        }
    };

    // 初始化任务管理器并同步执行
    let manager = JobManager::with_http_catalog(config.clone())?;
    let job = manager.run_to_completion(&raw_text).await?;

    match job.state {
        JobState::Completed => {
            let report = job.report.as_ref().context("完成的任务必带报告")?;
            logging::print_final_stats(report, job.archive.as_ref().map(|h| h.path()));

            // 写出报告 JSON
            let report_json = serde_json::to_string_pretty(report)?;
            fs::write(&config.report_file, report_json)
                .with_context(|| format!("写入报告失败: {}", config.report_file))?;
            info!("📄 报告已保存至: {}", config.report_file);
        }
        _ => {
            error!(
                "❌ 任务未能完成: {}",
                job.error.as_deref().unwrap_or("未知原因")
            );
        }
    }

    Ok(())
}
