//! 流水线集成测试
//!
//! 用内存书目源替代真实 HTTP 协作方，覆盖完整的任务生命周期

use async_trait::async_trait;
use book_batch_fetcher::error::{CatalogError, DownloadError};
use book_batch_fetcher::{
    CatalogEntry, CatalogSource, Config, FailReason, FormatTag, ItemOutcome, JobManager, JobState,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ========== 内存书目源 ==========

/// 单本书在内存书目源中的配置
#[derive(Clone)]
struct MockBook {
    entry: CatalogEntry,
    payload: Vec<u8>,
    /// 前几次下载按 502 失败（模拟瞬时故障）
    fail_first: usize,
    /// true 时每次下载都按超时失败
    always_timeout: bool,
    /// 下载前人为延迟（毫秒，用于制造乱序完成）
    delay_ms: u64,
}

/// 内存书目源
struct MockCatalog {
    books: Vec<MockBook>,
    /// 搜索能力整体故障
    search_fails: bool,
    /// 标题包含这些片段的搜索单独故障
    fail_search_titles: Vec<String>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl MockCatalog {
    fn new(books: Vec<MockBook>) -> Self {
        Self {
            books,
            search_fails: false,
            fail_search_titles: Vec::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn unavailable() -> Self {
        Self {
            books: Vec::new(),
            search_fails: true,
            fail_search_titles: Vec::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// 某个条目实际被下载了几次
    fn attempts_for(&self, source_id: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(source_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    async fn search(&self, title: &str, _author: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        if self.search_fails
            || self
                .fail_search_titles
                .iter()
                .any(|t| title.contains(t.as_str()))
        {
            return Err(CatalogError::Unavailable {
                endpoint: "mock://search".to_string(),
                message: "连接被拒绝".to_string(),
            });
        }

        // 朴素的标题包含式检索，模拟源端排序
        let lowered = title.to_lowercase();
        Ok(self
            .books
            .iter()
            .filter(|b| {
                let candidate = b.entry.title.to_lowercase();
                candidate.contains(&lowered) || lowered.contains(&candidate)
            })
            .map(|b| b.entry.clone())
            .collect())
    }

    async fn download(&self, source_id: &str, _format: FormatTag) -> Result<Vec<u8>, DownloadError> {
        let book = self
            .books
            .iter()
            .find(|b| b.entry.source_id == source_id)
            .ok_or(DownloadError::NotFound)?;

        if book.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(book.delay_ms)).await;
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(source_id.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        if book.always_timeout {
            return Err(DownloadError::Timeout);
        }
        if attempt <= book.fail_first {
            return Err(DownloadError::HttpStatus { status: 502 });
        }

        Ok(book.payload.clone())
    }
}

// ========== 测试辅助 ==========

fn book(id: &str, title: &str, author: &str, formats: Vec<FormatTag>) -> MockBook {
    MockBook {
        entry: CatalogEntry {
            source_id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            formats,
        },
        payload: format!("content-of-{}", id).into_bytes(),
        fail_first: 0,
        always_timeout: false,
        delay_ms: 0,
    }
}

fn test_config(dir: &Path) -> Config {
    Config {
        archive_dir: dir.join("archives").display().to_string(),
        book_list_file: dir.join("books.txt").display().to_string(),
        report_file: dir.join("report.json").display().to_string(),
        warn_file: dir.join("warn.txt").display().to_string(),
        retry_base_delay_ms: 1,
        request_timeout_secs: 2,
        ..Config::default()
    }
}

fn manager_with(catalog: Arc<MockCatalog>, dir: &Path) -> JobManager {
    JobManager::new(test_config(dir), catalog)
}

/// 解出归档里的文件名列表
fn archive_entries(bytes: &[u8]) -> Vec<String> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().display().to_string())
        .collect()
}

/// 轮询任务直到终态
async fn wait_terminal(manager: &JobManager, job_id: book_batch_fetcher::JobId) -> book_batch_fetcher::Job {
    for _ in 0..200 {
        if let Some(job) = manager.status(job_id).await {
            if job.state.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("任务在限定时间内未到终态");
}

// ========== 场景测试 ==========

#[tokio::test]
async fn test_three_book_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![
        book(
            "g1",
            "The Great Gatsby",
            "F. Scott Fitzgerald",
            vec![FormatTag::Epub],
        ),
        book(
            "m1",
            "To Kill a Mockingbird",
            "Harper Lee",
            vec![FormatTag::Pdf],
        ),
    ]));
    let manager = manager_with(catalog, dir.path());

    let input = "The Great Gatsby by F. Scott Fitzgerald\n\
                 To Kill a Mockingbird by Harper Lee\n\
                 Nonexistent Book by Unknown Author";
    let job = manager.run_to_completion(input).await.unwrap();

    assert_eq!(job.state, JobState::Completed);
    let report = job.report.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);

    // 结果顺序与输入顺序一致
    assert_eq!(
        report.items[0],
        ItemOutcome::Success {
            title: "The Great Gatsby".to_string(),
            format: FormatTag::Epub,
        }
    );
    assert_eq!(
        report.items[1],
        ItemOutcome::Success {
            title: "To Kill a Mockingbird".to_string(),
            format: FormatTag::Pdf,
        }
    );
    assert_eq!(
        report.items[2],
        ItemOutcome::Failed {
            title: "Nonexistent Book".to_string(),
            reason: FailReason::NotFound,
        }
    );

    // 归档恰好包含两个成功的文件
    let bytes = manager.archive_bytes(job.id).await.unwrap();
    assert_eq!(
        archive_entries(&bytes),
        vec!["The Great Gatsby.epub", "To Kill a Mockingbird.pdf"]
    );
}

#[tokio::test]
async fn test_empty_input_fails_without_archive() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![]));
    let manager = manager_with(catalog, dir.path());

    let job = manager.run_to_completion("   \n\t\n  ").await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert!(job.report.is_none());
    assert!(job.archive.is_none());
    assert!(job.error.unwrap().contains("书单为空"));

    // 失败任务不开放归档提取
    assert!(manager.archive_bytes(job.id).await.is_err());
}

#[tokio::test]
async fn test_all_fetches_fail_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut timeout_book = book("t1", "Slow Book", "Author A", vec![FormatTag::Epub]);
    timeout_book.always_timeout = true;
    let mut broken_book = book("b1", "Broken Book", "Author B", vec![FormatTag::Pdf]);
    broken_book.fail_first = 99;

    let catalog = Arc::new(MockCatalog::new(vec![timeout_book, broken_book]));
    let manager = manager_with(catalog, dir.path());

    let job = manager
        .run_to_completion("Slow Book by Author A\nBroken Book by Author B")
        .await
        .unwrap();

    // 全部失败仍然是 Completed，归档照常产出（空归档）
    assert_eq!(job.state, JobState::Completed);
    let report = job.report.unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(
        report.items[0],
        ItemOutcome::Failed {
            title: "Slow Book".to_string(),
            reason: FailReason::Timeout,
        }
    );
    assert_eq!(
        report.items[1],
        ItemOutcome::Failed {
            title: "Broken Book".to_string(),
            reason: FailReason::FetchError,
        }
    );

    let bytes = manager.archive_bytes(job.id).await.unwrap();
    assert!(archive_entries(&bytes).is_empty());
}

#[tokio::test]
async fn test_transient_failures_retried_until_success() {
    let dir = tempfile::tempdir().unwrap();
    let mut flaky = book("f1", "Flaky Book", "Author C", vec![FormatTag::Epub]);
    flaky.fail_first = 2; // 前两次 502，第三次成功

    let catalog = Arc::new(MockCatalog::new(vec![flaky]));
    let manager = manager_with(catalog.clone(), dir.path());

    let job = manager
        .run_to_completion("Flaky Book by Author C")
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.report.unwrap().successful, 1);
    // 默认 3 次尝试刚好耗在 2 败 1 成上
    assert_eq!(catalog.attempts_for("f1"), 3);
}

#[tokio::test]
async fn test_download_disallowed_when_no_enabled_format() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![book(
        "m1",
        "Comic Book",
        "Author D",
        vec![FormatTag::Mobi],
    )]));

    let mut config = test_config(dir.path());
    // 只允许 EPUB / PDF，源端只有 MOBI
    config.enabled_formats = vec![FormatTag::Epub, FormatTag::Pdf];
    let manager = JobManager::new(config, catalog);

    let job = manager
        .run_to_completion("Comic Book by Author D")
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(
        job.report.unwrap().items[0],
        ItemOutcome::Failed {
            title: "Comic Book".to_string(),
            reason: FailReason::DownloadDisallowed,
        }
    );
}

#[tokio::test]
async fn test_title_only_request_matches_fuzzily() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![book(
        "b1",
        "Beowulf",
        "Unknown",
        vec![FormatTag::Epub],
    )]));
    let manager = manager_with(catalog, dir.path());

    // 没有 " by " 分隔符：作者为空，走模糊匹配
    let job = manager.run_to_completion("Beowulf").await.unwrap();

    assert_eq!(job.state, JobState::Completed);
    let report = job.report.unwrap();
    assert_eq!(report.successful, 1);
}

#[tokio::test]
async fn test_same_title_twice_gets_distinct_filenames() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![book(
        "d1",
        "Dune",
        "Frank Herbert",
        vec![FormatTag::Epub],
    )]));
    let manager = manager_with(catalog, dir.path());

    let job = manager
        .run_to_completion("Dune by Frank Herbert\nDune by Frank Herbert")
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    let report = job.report.unwrap();
    assert_eq!(report.successful, 2);

    let bytes = manager.archive_bytes(job.id).await.unwrap();
    assert_eq!(archive_entries(&bytes), vec!["Dune.epub", "Dune-2.epub"]);
}

#[tokio::test]
async fn test_report_order_is_deterministic_under_scrambled_completion() {
    let dir = tempfile::tempdir().unwrap();

    // 延迟刻意倒挂：先提交的最后完成
    let delays = [200u64, 5, 120, 1];
    let titles = ["Alpha", "Bravo", "Charlie", "Delta"];
    let build_books = || {
        titles
            .iter()
            .zip(delays)
            .enumerate()
            .map(|(i, (title, delay))| {
                let mut b = book(
                    &format!("id{}", i),
                    title,
                    "Author",
                    vec![FormatTag::Epub],
                );
                b.delay_ms = delay;
                b
            })
            .collect::<Vec<_>>()
    };
    let input = "Alpha by Author\nBravo by Author\nCharlie by Author\nDelta by Author";

    // 同样的输入跑两遍，报告顺序与归档命名都必须逐字相同
    let mut runs: Vec<(Vec<String>, Vec<String>)> = Vec::new();
    for _ in 0..2 {
        let catalog = Arc::new(MockCatalog::new(build_books()));
        let manager = manager_with(catalog, dir.path());
        let job = manager.run_to_completion(input).await.unwrap();

        assert_eq!(job.state, JobState::Completed);
        let report = job.report.unwrap();
        let item_titles: Vec<String> =
            report.items.iter().map(|o| o.title().to_string()).collect();
        assert_eq!(item_titles, titles);

        let entries = archive_entries(&manager.archive_bytes(job.id).await.unwrap());
        assert_eq!(
            entries,
            vec!["Alpha.epub", "Bravo.epub", "Charlie.epub", "Delta.epub"]
        );

        runs.push((item_titles, entries));
    }
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_catalog_unavailable_fails_whole_job() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::unavailable());
    let manager = manager_with(catalog, dir.path());

    let job = manager
        .run_to_completion("Alpha by Author\nBravo by Author")
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert!(job.archive.is_none());
    assert!(job.error.unwrap().contains("不可达"));
}

#[tokio::test]
async fn test_isolated_search_failure_stays_per_item() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = MockCatalog::new(vec![book(
        "a1",
        "Alpha",
        "Author",
        vec![FormatTag::Epub],
    )]);
    // 只有 Bravo 的搜索故障，Alpha 正常
    catalog.fail_search_titles = vec!["Bravo".to_string()];
    let manager = manager_with(Arc::new(catalog), dir.path());

    let job = manager
        .run_to_completion("Alpha by Author\nBravo by Author")
        .await
        .unwrap();

    // 单条搜索故障不拖垮任务
    assert_eq!(job.state, JobState::Completed);
    let report = job.report.unwrap();
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        report.items[1],
        ItemOutcome::Failed {
            title: "Bravo".to_string(),
            reason: FailReason::FetchError,
        }
    );
}

#[tokio::test]
async fn test_submit_and_poll_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![book(
        "a1",
        "Alpha",
        "Author",
        vec![FormatTag::Epub],
    )]));
    let manager = manager_with(catalog, dir.path());

    let job_id = manager.submit("Alpha by Author").await;
    let job = wait_terminal(&manager, job_id).await;

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.report.unwrap().successful, 1);

    // 归档提取两次得到完全相同的字节
    let first = manager.archive_bytes(job_id).await.unwrap();
    let second = manager.archive_bytes(job_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cancellation_fails_job_and_discards_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mut slow = book("s1", "Slow Book", "Author", vec![FormatTag::Epub]);
    slow.delay_ms = 10_000;
    let catalog = Arc::new(MockCatalog::new(vec![slow]));
    let manager = manager_with(catalog, dir.path());

    let job_id = manager.submit("Slow Book by Author").await;

    // 等任务进入 Running 再取消
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.cancel(job_id).await);

    let job = wait_terminal(&manager, job_id).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.archive.is_none());
    assert!(manager.archive_bytes(job_id).await.is_err());
}

#[tokio::test]
async fn test_report_json_matches_expected_shape() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(MockCatalog::new(vec![book(
        "g1",
        "The Great Gatsby",
        "F. Scott Fitzgerald",
        vec![FormatTag::Epub],
    )]));
    let manager = manager_with(catalog, dir.path());

    let job = manager
        .run_to_completion("The Great Gatsby by F. Scott Fitzgerald\nGhost by Nobody")
        .await
        .unwrap();

    let report = job.report.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["total"], 2);
    assert_eq!(json["successful"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["items"][0]["status"], "success");
    assert_eq!(json["items"][0]["format"], "EPUB");
    assert_eq!(json["items"][1]["status"], "failed");
    assert_eq!(json["items"][1]["reason"], "Not found");
}
