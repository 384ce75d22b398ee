/// Data conditions found while building the article tree. None of these abort the build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildIssue {
    #[error("no article without an incoming question; nothing to render")]
    MissingRoot,
    #[error("{} articles have no incoming question; using `{chosen}`", candidates.len())]
    AmbiguousRoot {
        chosen: String,
        candidates: Vec<String>,
    },
    #[error("question `{question_id}` points at unknown article `{child_id}`")]
    DanglingReference {
        question_id: String,
        child_id: String,
    },
    #[error("question `{question_id}` leads back to `{article_id}` which is already on the path")]
    CycleDetected {
        question_id: String,
        article_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout algorithm panicked: {0}")]
    Panicked(String),
    #[error("layout algorithm failed: {0}")]
    Algorithm(String),
    #[error("layout result has no position for `{0}`")]
    MissingPosition(String),
    #[error("layout result has {actual} positions for {expected} nodes")]
    NodeCountMismatch { expected: usize, actual: usize },
    #[error("layout result has a non-finite position for `{0}`")]
    NonFinitePosition(String),
    #[error("layout task did not complete: {0}")]
    Join(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}
