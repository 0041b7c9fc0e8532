//! 目录解析服务 - 业务能力层
//!
//! 负责把一条书目请求解析为书目源中的唯一匹配条目

use crate::clients::CatalogSource;
use crate::config::Config;
use crate::models::{BookRequest, CatalogEntry, CatalogMatch, MatchConfidence};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// 一次解析的结果
#[derive(Debug)]
pub enum ResolveOutcome {
    /// 找到匹配条目
    Matched(CatalogMatch),
    /// 书目源中没有满足匹配策略的条目（正常结果，不是系统错误）
    NotFound,
    /// 搜索能力本身故障（区别于 NotFound，计入整体不可达判定）
    Unavailable,
}

/// 目录解析服务
///
/// 职责：
/// - 调用书目源搜索能力
/// - 按"先精确后模糊"的策略挑选唯一匹配
/// - 只处理单条请求
pub struct CatalogResolver {
    catalog: Arc<dyn CatalogSource>,
    fuzzy_threshold: f64,
}

impl CatalogResolver {
    /// 创建新的目录解析服务
    pub fn new(catalog: Arc<dyn CatalogSource>, config: &Config) -> Self {
        Self {
            catalog,
            fuzzy_threshold: config.fuzzy_match_threshold,
        }
    }

    /// 解析单条书目请求
    pub async fn resolve(&self, request: &BookRequest, request_index: usize) -> ResolveOutcome {
        let entries = match self.catalog.search(&request.title, &request.author).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("搜索 \"{}\" 失败: {}", request.title, e);
                return ResolveOutcome::Unavailable;
            }
        };

        if entries.is_empty() {
            debug!("\"{}\" 无任何候选", request.title);
            return ResolveOutcome::NotFound;
        }

        // 第一层：标题与作者归一化后完全一致
        if request.has_author() {
            let want_title = normalize(&request.title);
            let want_author = normalize(&request.author);
            if let Some(entry) = entries
                .iter()
                .find(|e| normalize(&e.title) == want_title && normalize(&e.author) == want_author)
            {
                debug!("\"{}\" 精确命中: {}", request.title, entry.source_id);
                return ResolveOutcome::Matched(build_match(
                    request,
                    request_index,
                    entry,
                    MatchConfidence::Exact,
                ));
            }
        }

        // 第二层：接受源端排序最高、且标题相似度过阈值的候选
        let best = &entries[0];
        let score = similarity(&normalize(&request.title), &normalize(&best.title));
        if score >= self.fuzzy_threshold {
            debug!(
                "\"{}\" 模糊命中: {} (相似度 {:.2})",
                request.title, best.source_id, score
            );
            return ResolveOutcome::Matched(build_match(
                request,
                request_index,
                best,
                MatchConfidence::Fuzzy,
            ));
        }

        debug!(
            "\"{}\" 最高候选相似度 {:.2} 未过阈值 {:.2}",
            request.title, score, self.fuzzy_threshold
        );
        ResolveOutcome::NotFound
    }
}

fn build_match(
    request: &BookRequest,
    request_index: usize,
    entry: &CatalogEntry,
    confidence: MatchConfidence,
) -> CatalogMatch {
    CatalogMatch {
        request_index,
        title: request.title.clone(),
        source_id: entry.source_id.clone(),
        formats: entry.formats.clone(),
        confidence,
    }
}

/// 归一化：小写、去标点、压缩空白
pub fn normalize(text: &str) -> String {
    static PUNCT: OnceLock<Regex> = OnceLock::new();
    let punct =
        PUNCT.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("标点正则必然合法"));

    let lowered = text.to_lowercase();
    let stripped = punct.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 标题相似度：归一化后按词集合的 Jaccard 系数
pub fn similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("The Great Gatsby!"), "the great gatsby");
        assert_eq!(normalize("  F. Scott   Fitzgerald "), "f scott fitzgerald");
        assert_eq!(normalize("Don't Panic"), "don t panic");
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("the great gatsby", "the great gatsby"), 1.0);
        assert_eq!(similarity("dune", "solaris"), 0.0);
        assert_eq!(similarity("", "dune"), 0.0);

        // 部分重合落在 (0, 1) 区间
        let score = similarity("the great gatsby", "great gatsby annotated");
        assert!(score > 0.0 && score < 1.0);
    }
}
