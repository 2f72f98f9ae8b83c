//! Comment analysis session.
//!
//! `refresh` resolves the video id, runs the count read and the comment-page
//! read concurrently and folds whatever succeeded into the session state. A
//! failed read is reported as a notice and leaves its part of the state as it
//! was. In-flight counters are decremented by scope guards on every path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::comments::{video_id_from_url, Comment, CommentSource};
use crate::controller::Notice;
use crate::sentiment::{MonthlyDistribution, PolarityScorer, SentimentSummary};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisState {
    pub video_id: Option<String>,
    /// `commentCount` statistic of the whole video.
    pub comment_count: Option<u64>,
    /// The fetched page, newest first.
    pub comments: Vec<Comment>,
    pub summary: SentimentSummary,
    pub monthly: MonthlyDistribution,
}

pub struct AnalysisSession {
    source: Arc<dyn CommentSource>,
    scorer: Box<dyn PolarityScorer>,
    page_size: u32,
    state: Mutex<AnalysisState>,
    /// Count reads still running.
    loading_count: AtomicUsize,
    /// Comment-page reads still running.
    loading_comments: AtomicUsize,
}

impl AnalysisSession {
    pub fn new(source: Arc<dyn CommentSource>, scorer: Box<dyn PolarityScorer>, page_size: u32) -> Self {
        Self {
            source,
            scorer,
            page_size,
            state: Mutex::new(AnalysisState::default()),
            loading_count: AtomicUsize::new(0),
            loading_comments: AtomicUsize::new(0),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading_count.load(Ordering::SeqCst) > 0 || self.loading_comments.load(Ordering::SeqCst) > 0
    }

    pub async fn snapshot(&self) -> AnalysisState {
        self.state.lock().await.clone()
    }

    /// Fetch and analyze `input` (URL or bare id). Returns one notice per failure.
    pub async fn refresh(&self, input: &str) -> Vec<Notice> {
        let video_id = match video_id_from_url(input) {
            Ok(id) => id,
            Err(e) => {
                warn!(error=%e, "Rejected video input");
                return vec![Notice::destructive("Invalid URL", "Please enter a valid YouTube URL.")];
            }
        };

        self.loading_count.fetch_add(1, Ordering::SeqCst);
        self.loading_comments.fetch_add(1, Ordering::SeqCst);

        let count = async {
            let _loading = scopeguard::guard(&self.loading_count, |n| {
                n.fetch_sub(1, Ordering::SeqCst);
            });
            self.source.comment_count(&video_id).await
        };
        let comments = async {
            let _loading = scopeguard::guard(&self.loading_comments, |n| {
                n.fetch_sub(1, Ordering::SeqCst);
            });
            self.source.latest_comments(&video_id, self.page_size).await
        };
        let (count, comments) = futures::join!(count, comments);

        let mut notices = Vec::new();
        let mut state = self.state.lock().await;

        match count {
            Ok(n) => state.comment_count = Some(n),
            Err(e) => {
                warn!(video=%video_id, error=%e, "Comment count fetch failed");
                notices.push(Notice::destructive("Error fetching comment count", e.to_string()));
            }
        }

        match comments {
            Ok(page) => {
                state.summary = SentimentSummary::aggregate(
                    self.scorer.as_ref(),
                    page.iter().map(|c| c.text.as_str()),
                );
                state.monthly = MonthlyDistribution::from_dates(page.iter().map(|c| c.published_at));
                state.comments = page;
                info!(
                    video=%video_id,
                    fetched=state.comments.len(),
                    agree=state.summary.agree,
                    disagree=state.summary.disagree,
                    neutral=state.summary.neutral,
                    "Comments analyzed"
                );
            }
            Err(e) => {
                warn!(video=%video_id, error=%e, "Comment fetch failed");
                notices.push(Notice::destructive("Error fetching comments", e.to_string()));
            }
        }

        if notices.len() < 2 {
            state.video_id = Some(video_id);
        }
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::FetchError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tokio::sync::{Barrier, Notify};

    fn comment(text: &str, month: u32) -> Comment {
        Comment {
            text: text.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, month, 10, 12, 0, 0).unwrap(),
        }
    }

    /// Fixed scores keyed on a marker word.
    struct MarkerScorer;

    impl PolarityScorer for MarkerScorer {
        fn compound(&self, text: &str) -> f64 {
            if text.contains("good") {
                0.6
            } else if text.contains("bad") {
                -0.6
            } else {
                0.0
            }
        }
    }

    /// Fails whichever read is switched off; both reads meet at a barrier.
    struct FakeSource {
        count_ok: bool,
        comments_ok: bool,
        barrier: Barrier,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(count_ok: bool, comments_ok: bool) -> Self {
            Self {
                count_ok,
                comments_ok,
                barrier: Barrier::new(2),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CommentSource for FakeSource {
        async fn comment_count(&self, _video_id: &str) -> Result<u64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            if self.count_ok {
                Ok(803)
            } else {
                Err(FetchError::Status { status: 403, body: "quotaExceeded".into() })
            }
        }

        async fn latest_comments(&self, _video_id: &str, max: u32) -> Result<Vec<Comment>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            assert_eq!(max, 100);
            if self.comments_ok {
                Ok(vec![
                    comment("good explanation", 3),
                    comment("bad take", 3),
                    comment("first", 5),
                ])
            } else {
                Err(FetchError::VideoNotFound("x".into()))
            }
        }
    }

    /// Reads for ids starting with `s` wait until the gate opens.
    #[derive(Default)]
    struct GatedSource {
        gate: Notify,
    }

    impl GatedSource {
        async fn maybe_wait(&self, video_id: &str) {
            if video_id.starts_with('s') {
                self.gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl CommentSource for GatedSource {
        async fn comment_count(&self, video_id: &str) -> Result<u64, FetchError> {
            self.maybe_wait(video_id).await;
            Ok(1)
        }

        async fn latest_comments(&self, video_id: &str, _max: u32) -> Result<Vec<Comment>, FetchError> {
            self.maybe_wait(video_id).await;
            Ok(vec![comment("good", 1)])
        }
    }

    fn session(source: FakeSource) -> AnalysisSession {
        AnalysisSession::new(Arc::new(source), Box::new(MarkerScorer), 100)
    }

    /// A session over `source` whose state starts from `state`.
    fn session_with_state(source: FakeSource, state: AnalysisState) -> AnalysisSession {
        AnalysisSession {
            state: Mutex::new(state),
            ..session(source)
        }
    }

    async fn refresh(s: &AnalysisSession, input: &str) -> Vec<Notice> {
        tokio::time::timeout(Duration::from_secs(5), s.refresh(input))
            .await
            .expect("reads must run concurrently")
    }

    async fn analyzed_state() -> AnalysisState {
        let s = session(FakeSource::new(true, true));
        assert!(refresh(&s, "dQw4w9WgXcQ").await.is_empty());
        s.snapshot().await
    }

    #[tokio::test]
    async fn both_reads_succeed() {
        let s = session(FakeSource::new(true, true));
        let notices = refresh(&s, "https://youtu.be/dQw4w9WgXcQ").await;
        assert!(notices.is_empty());
        assert!(!s.is_loading());

        let st = s.snapshot().await;
        assert_eq!(st.video_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(st.comment_count, Some(803));
        assert_eq!(st.comments.len(), 3);
        assert_eq!(st.summary, SentimentSummary { agree: 1, disagree: 1, neutral: 1 });
        assert_eq!(st.monthly.get(3), 2);
        assert_eq!(st.monthly.get(5), 1);
    }

    #[tokio::test]
    async fn failed_count_keeps_previous_value() {
        let failing = session_with_state(FakeSource::new(false, true), analyzed_state().await);
        let notices = refresh(&failing, "dQw4w9WgXcQ").await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Error fetching comment count");
        assert!(!failing.is_loading());
        assert_eq!(failing.snapshot().await.comment_count, Some(803));
    }

    #[tokio::test]
    async fn failed_comments_keep_previous_analysis() {
        let before = analyzed_state().await;
        assert_eq!(before.comments.len(), 3);

        let failing = session_with_state(FakeSource::new(true, false), before.clone());
        let notices = refresh(&failing, "dQw4w9WgXcQ").await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Error fetching comments");
        assert!(!failing.is_loading());

        let after = failing.snapshot().await;
        assert_eq!(after.comments, before.comments);
        assert_eq!(after.summary, before.summary);
        assert_eq!(after.monthly, before.monthly);
        assert_eq!(after.comment_count, Some(803));
    }

    #[tokio::test]
    async fn first_fetch_failure_leaves_empty_analysis() {
        let s = session(FakeSource::new(true, false));
        refresh(&s, "dQw4w9WgXcQ").await;

        let st = s.snapshot().await;
        assert_eq!(st.comment_count, Some(803));
        assert!(st.comments.is_empty());
        assert_eq!(st.summary.percentages().agree, 0.0);
    }

    #[tokio::test]
    async fn overlapping_refreshes_stay_loading_until_the_last_finishes() {
        let source = Arc::new(GatedSource::default());
        let s = AnalysisSession::new(source.clone(), Box::new(MarkerScorer), 100);

        let slow = s.refresh("sssssssssss");
        let fast_then_release = async {
            assert!(s.refresh("fffffffffff").await.is_empty());
            assert!(s.is_loading(), "slow refresh is still running");
            source.gate.notify_waiters();
        };
        let (slow_notices, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            futures::join!(slow, fast_then_release)
        })
        .await
        .expect("slow refresh released");

        assert!(slow_notices.is_empty());
        assert!(!s.is_loading());
        assert_eq!(s.snapshot().await.video_id.as_deref(), Some("sssssssssss"));
    }

    #[tokio::test]
    async fn invalid_input_makes_no_request() {
        let source = Arc::new(FakeSource::new(true, true));
        let s = AnalysisSession::new(source.clone(), Box::new(MarkerScorer), 100);
        let notices = s.refresh("https://example.com/watch").await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Invalid URL");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(s.snapshot().await, AnalysisState::default());
    }
}
