/// Expected failures that handlers map to client errors. Anything else
/// surfacing from the store is an unexpected `anyhow::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("quest is not active")]
    QuestNotActive,

    #[error("quest has reached its completion limit")]
    QuestFull,

    #[error("quest has not been started by this user")]
    NotStarted,

    #[error("draft is missing {0}")]
    IncompleteDraft(&'static str),
}
